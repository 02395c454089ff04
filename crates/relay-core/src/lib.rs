pub mod config;
pub mod error;
pub mod ids;
pub mod message;
pub mod time;

pub use config::{AgentConfig, AgentModelsConfig, AgentTuningConfig, RelayConfig};
pub use error::{RelayError, Result};
pub use ids::{AgentId, RequestId};
pub use message::{Attachment, AttachmentKind, ChannelType, Message, Response};
