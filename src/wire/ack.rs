use serde::{Deserialize, Serialize};

/// Explicit confirmation sent in response to a [`super::SequencedMessage`]
/// with `ack = true`, independent of the windowed `Request` flow.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Ack {
    pub confirmed_seq_nr: u64,
}
