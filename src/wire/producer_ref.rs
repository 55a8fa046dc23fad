use serde::{Deserialize, Serialize};

/// Identifies one epoch of one producer. Carried on every
/// [`super::SequencedMessage`] so the consumer side can tell a
/// retransmission from the same producer apart from the first message
/// of a newly (re)started one, without needing a comparable address
/// type for the underlying transport.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ProducerRef {
    pub producer_id: String,
    pub epoch: u64,
}
