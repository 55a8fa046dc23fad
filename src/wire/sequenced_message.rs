use super::ProducerRef;
use serde::{Deserialize, Serialize};

/// One delivery attempt of application message `A`. `first` marks the
/// first message of a producer epoch (it is what lets a consumer
/// controller deliver out of turn to bootstrap or rebind). `ack`
/// requests an `Ack` reply in addition to normal flow-controlled
/// confirmation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SequencedMessage<A> {
    pub producer_id: String,
    pub seq_nr: u64,
    pub msg: A,
    pub first: bool,
    pub ack: bool,
    pub producer_ref: ProducerRef,
}
