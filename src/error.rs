use crate::durable_queue::DurableQueueError;

/// Fatal, invariant-violation errors. These are never returned to a
/// caller: a controller that hits one of these has no well-defined way
/// to keep running, so it panics its task with this value as the
/// message (see the `JoinHandle` discussion in the crate's error
/// handling design) and leaves recovery to whatever supervises it.
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error("{producer_id}: message received without outstanding demand")]
    NoDemand { producer_id: String },

    #[error("{producer_id}: durable queue stored seqNr {stored} but {expected} was expected")]
    SeqNrMismatch {
        producer_id: String,
        expected: u64,
        stored: u64,
    },

    #[error("{consumer_id}: confirmed seqNr {confirmed} is greater than received seqNr {received}")]
    UnexpectedConfirmation {
        consumer_id: String,
        confirmed: u64,
        received: u64,
    },

    #[error("{producer_id}: durable queue failed after {attempts} attempts: {source}")]
    DurableQueueFailed {
        producer_id: String,
        attempts: u32,
        #[source]
        source: DurableQueueError,
    },
}
