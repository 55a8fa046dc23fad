use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

/// Persistent record of one message handed to the durable queue by a
/// producer controller, before it is known to have been confirmed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessageSent<A> {
    pub seq_nr: u64,
    pub msg: A,
    pub ack: bool,
    pub qualifier: String,
}

/// Persistent record of a confirmation, keyed by an optional qualifier
/// for multi-destination producers (unused outside sharding, where the
/// qualifier distinguishes per-entity confirmation streams).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Confirmed {
    pub seq_nr: u64,
    pub qualifier: String,
}

/// Snapshot of everything a producer controller needs to resume after
/// a restart: where it left off, what has been confirmed, and what was
/// sent but never confirmed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct State<A> {
    pub current_seq_nr: u64,
    pub highest_confirmed_seq_nr: u64,
    pub confirmed_seq_nr_by_qualifier: HashMap<String, u64>,
    pub unconfirmed: VecDeque<MessageSent<A>>,
}

impl<A> Default for State<A> {
    fn default() -> Self {
        Self {
            current_seq_nr: 1,
            highest_confirmed_seq_nr: 0,
            confirmed_seq_nr_by_qualifier: HashMap::new(),
            unconfirmed: VecDeque::new(),
        }
    }
}
