use serde::{Deserialize, Serialize};

/// Requests retransmission of every unconfirmed message from
/// `from_seq_nr` onward, used when the consumer detects a gap and
/// `support_resend` is in effect.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Resend {
    pub from_seq_nr: u64,
}
