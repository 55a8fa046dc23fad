use serde::{Deserialize, Serialize};

/// Consumer-to-producer flow control grant: demand is open up to
/// `up_to_seq_nr`, and everything up to `confirmed_seq_nr` has already
/// been delivered and processed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Request {
    pub confirmed_seq_nr: u64,
    pub up_to_seq_nr: u64,
    pub support_resend: bool,
    pub via_timeout: bool,
}

impl Request {
    pub fn is_valid(&self) -> bool {
        self.confirmed_seq_nr <= self.up_to_seq_nr
    }
}
