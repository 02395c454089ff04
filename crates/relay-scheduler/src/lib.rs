//! Cron Scheduler (§4.I/§4.J): a JSON-backed job store plus a tick loop
//! that fires due jobs through a caller-supplied [`engine::JobRunner`].
//!
//! This crate knows nothing about messages, sessions, or agents — it owns
//! scheduling mechanics only (storage, due-ness, backoff, concurrency).
//! The binary crate that does know those things implements [`engine::JobRunner`]
//! and hands it to a [`engine::Scheduler`].

pub mod engine;
pub mod error;
pub mod schedule;
pub mod store;
pub mod types;

pub use engine::{JobRunner, RunOutcome, Scheduler, SchedulerConfig};
pub use error::{Result, SchedulerError};
pub use schedule::{calc_next_run, parse_every_duration};
pub use store::JobStore;
pub use types::{is_heartbeat_job_id, Job, ScheduleType, SessionTarget, HEARTBEAT_ID_PREFIX};
