//! Invariants 1 and 2 (spec.md §8): per-session FIFO ordering and a
//! global concurrency cap, exercised as a black-box scenario against the
//! public `Queue` API rather than the crate's own unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use relay_queue::{Keyed, MessageHandler, Queue, QueueConfig};
use tokio::sync::Mutex;

struct Turn {
    session_key: String,
    seq: u32,
}

impl Keyed for Turn {
    fn session_key(&self) -> &str {
        &self.session_key
    }
}

struct SlowHandler {
    seen: Mutex<Vec<u32>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

#[async_trait]
impl MessageHandler<Turn> for SlowHandler {
    async fn handle(&self, turn: Turn) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.seen.lock().await.push(turn.seq);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// S2-flavored: a single session's lane never hands the next message to
/// the handler before the previous one finished, even under a global
/// concurrency budget that would otherwise let them race.
#[tokio::test]
async fn same_session_turns_are_serialized_in_order() {
    let handler = Arc::new(SlowHandler {
        seen: Mutex::new(Vec::new()),
        in_flight: AtomicUsize::new(0),
        peak_in_flight: AtomicUsize::new(0),
    });
    let queue = Queue::new(
        handler.clone(),
        QueueConfig {
            lane_buffer: 10,
            max_concurrent: 8,
        },
    );

    for seq in 0..6 {
        queue.enqueue(Turn { session_key: "agent:main:telegram:tg1:100".to_string(), seq }).await.unwrap();
    }

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(*handler.seen.lock().await, vec![0, 1, 2, 3, 4, 5]);
}

/// Invariant 2: with several distinct sessions in flight at once, no more
/// than `max_concurrent` handlers ever run at the same wall-clock instant.
#[tokio::test]
async fn distinct_sessions_are_capped_by_global_concurrency() {
    let handler = Arc::new(SlowHandler {
        seen: Mutex::new(Vec::new()),
        in_flight: AtomicUsize::new(0),
        peak_in_flight: AtomicUsize::new(0),
    });
    let queue = Queue::new(
        handler.clone(),
        QueueConfig {
            lane_buffer: 4,
            max_concurrent: 3,
        },
    );

    for seq in 0..10 {
        queue
            .enqueue(Turn { session_key: format!("agent:main:telegram:tg1:{seq}"), seq })
            .await
            .unwrap();
    }

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(handler.seen.lock().await.len(), 10);
    assert!(handler.peak_in_flight.load(Ordering::SeqCst) <= 3);
}
