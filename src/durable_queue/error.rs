#[derive(Debug, Clone, thiserror::Error)]
pub enum DurableQueueError {
    #[error("durable queue operation timed out")]
    Timeout,
    #[error("durable queue operation failed: {0}")]
    Failed(String),
}
