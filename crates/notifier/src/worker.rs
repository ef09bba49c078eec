//! Queue worker — pops broadcast jobs from Redis and hands them to the broadcaster.
//!
//! Jobs are JSON `BroadcastJob` values pushed by the world-state poller with
//! `RPUSH <queue>`. One job is broadcast at a time; the fan-out inside each
//! broadcast is where the concurrency lives.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;

use relay_common::error::AppError;
use relay_common::types::BroadcastJob;

use crate::broadcaster::{BroadcastSummary, Broadcaster};

/// Seconds `BLPOP` waits before returning empty so the loop stays responsive.
const POP_TIMEOUT_SECS: u64 = 5;

/// Pause after a failed pop before asking the queue again.
const DEFAULT_QUEUE_BACKOFF: Duration = Duration::from_secs(2);

pub fn decode_job(raw: &str) -> Result<BroadcastJob, AppError> {
    Ok(serde_json::from_str(raw)?)
}

/// Source of raw broadcast jobs.
#[async_trait]
pub trait JobQueue: Send {
    /// Next raw job, or `None` when the queue stayed empty for a while.
    async fn pop(&mut self) -> Result<Option<String>, AppError>;
}

/// Redis list consumed with `BLPOP`.
pub struct RedisJobQueue {
    name: String,
    /// Dedicated connection: `BLPOP` would stall cache reads on a shared one.
    redis: ConnectionManager,
}

impl RedisJobQueue {
    pub fn new(name: String, redis: ConnectionManager) -> Self {
        Self { name, redis }
    }
}

#[async_trait]
impl JobQueue for RedisJobQueue {
    async fn pop(&mut self) -> Result<Option<String>, AppError> {
        let popped: Option<(String, String)> = redis::cmd("BLPOP")
            .arg(&self.name)
            .arg(POP_TIMEOUT_SECS)
            .query_async(&mut self.redis)
            .await?;
        Ok(popped.map(|(_, raw)| raw))
    }
}

/// What a single pass of the worker loop did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Idle,
    Broadcast(BroadcastSummary),
    Malformed,
    QueueError,
}

pub struct BroadcastWorker<Q: JobQueue = RedisJobQueue> {
    broadcaster: Broadcaster,
    queue: Q,
    backoff: Duration,
}

impl<Q: JobQueue> BroadcastWorker<Q> {
    pub fn new(broadcaster: Broadcaster, queue: Q) -> Self {
        Self {
            broadcaster,
            queue,
            backoff: DEFAULT_QUEUE_BACKOFF,
        }
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Pop and broadcast at most one job. Queue errors are logged and waited
    /// out here so the caller can simply loop.
    pub async fn poll_once(&mut self) -> PollOutcome {
        let raw = match self.queue.pop().await {
            Ok(Some(raw)) => raw,
            Ok(None) => return PollOutcome::Idle,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    backoff_ms = self.backoff.as_millis() as u64,
                    "Failed to pop broadcast job, retrying"
                );
                tokio::time::sleep(self.backoff).await;
                return PollOutcome::QueueError;
            }
        };

        let job = match decode_job(&raw) {
            Ok(job) => job,
            Err(e) => {
                tracing::warn!(error = %e, "Dropping malformed broadcast job");
                return PollOutcome::Malformed;
            }
        };

        let summary = self.broadcaster.broadcast(&job.payload, &job.event).await;
        tracing::info!(
            event_type = %job.event.event_type,
            platform = %job.event.platform,
            locale = %job.event.locale,
            delivered = summary.delivered,
            failed = summary.failed + summary.recovered + summary.ignored,
            "Broadcast finished"
        );
        PollOutcome::Broadcast(summary)
    }

    /// Consume the queue until the task is cancelled.
    pub async fn run(&mut self) {
        tracing::info!("Broadcast worker started");
        loop {
            self.poll_once().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Arc;

    use relay_common::config::ShardConfig;
    use serde_json::json;

    use super::*;
    use crate::testing::{MemoryCache, MemoryStore, RecordingSender, context};

    /// Replays a scripted sequence of pops, then reports an empty queue.
    struct ScriptedQueue {
        pops: VecDeque<Result<Option<String>, AppError>>,
    }

    impl ScriptedQueue {
        fn new(pops: Vec<Result<Option<String>, AppError>>) -> Self {
            Self { pops: pops.into() }
        }
    }

    #[async_trait]
    impl JobQueue for ScriptedQueue {
        async fn pop(&mut self) -> Result<Option<String>, AppError> {
            self.pops.pop_front().unwrap_or(Ok(None))
        }
    }

    fn connection_dropped() -> AppError {
        AppError::Redis(redis::RedisError::from((
            redis::ErrorKind::IoError,
            "connection dropped",
        )))
    }

    fn worker(queue: ScriptedQueue, sender: Arc<RecordingSender>) -> BroadcastWorker<ScriptedQueue> {
        let store = Arc::new(MemoryStore::new().with_context(context("C1", "en")));
        let cache = MemoryCache::new()
            .with("guilds", json!({ "G1": { "id": "G1", "channels": ["C1"] } }))
            .with("cetus:pc:en", json!([{ "channelId": "C1" }]));
        let broadcaster = Broadcaster::new(
            store,
            Arc::new(cache),
            sender,
            ShardConfig::unsharded(),
            ["cetus"],
        );
        BroadcastWorker::new(broadcaster, queue).with_backoff(Duration::from_millis(1))
    }

    const CETUS_JOB: &str =
        r#"{"payload":{"title":"Cetus is now night"},"platform":"pc","type":"cetus","locale":"en"}"#;

    #[test]
    fn test_decode_job_with_items() {
        let job = decode_job(
            r#"{"payload":{"title":"Invasion"},"platform":"pc","type":"invasions","locale":"en","items":["forma","catalyst"]}"#,
        )
        .unwrap();
        assert_eq!(job.event.items, vec!["forma", "catalyst"]);
    }

    #[test]
    fn test_decode_job_rejects_missing_type() {
        let err = decode_job(r#"{"payload":{},"platform":"pc"}"#).unwrap_err();
        assert!(matches!(err, AppError::Decode(_)));
    }

    #[tokio::test]
    async fn test_queue_error_is_survived() {
        let sender = Arc::new(RecordingSender::new());
        let queue = ScriptedQueue::new(vec![
            Err(connection_dropped()),
            Err(connection_dropped()),
            Ok(Some(CETUS_JOB.to_string())),
        ]);
        let mut worker = worker(queue, sender.clone());

        assert_eq!(worker.poll_once().await, PollOutcome::QueueError);
        assert_eq!(worker.poll_once().await, PollOutcome::QueueError);
        assert!(matches!(
            worker.poll_once().await,
            PollOutcome::Broadcast(summary) if summary.delivered == 1
        ));
        assert_eq!(sender.sent_to("C1"), 1);
    }

    #[tokio::test]
    async fn test_queue_error_waits_out_backoff() {
        let sender = Arc::new(RecordingSender::new());
        let queue = ScriptedQueue::new(vec![Err(connection_dropped())]);
        let mut worker = worker(queue, sender).with_backoff(Duration::from_millis(20));

        let started = std::time::Instant::now();
        assert_eq!(worker.poll_once().await, PollOutcome::QueueError);
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[tokio::test]
    async fn test_empty_and_malformed_pops_keep_going() {
        let sender = Arc::new(RecordingSender::new());
        let queue = ScriptedQueue::new(vec![
            Ok(None),
            Ok(Some("{not json".to_string())),
            Ok(Some(CETUS_JOB.to_string())),
        ]);
        let mut worker = worker(queue, sender.clone());

        assert_eq!(worker.poll_once().await, PollOutcome::Idle);
        assert_eq!(worker.poll_once().await, PollOutcome::Malformed);
        assert!(matches!(worker.poll_once().await, PollOutcome::Broadcast(_)));
        assert_eq!(sender.sent_to("C1"), 1);
    }
}
