//! The durable producer queue contract: an event-sourced-style journal
//! a producer controller consults on startup and writes to as it sends
//! and confirms messages, so that a crash between "sent" and
//! "confirmed" can be resumed without silently dropping or duplicating
//! work beyond what at-least-once already allows.

mod error;
mod in_memory;
mod state;

pub use error::DurableQueueError;
pub use in_memory::InMemoryDurableProducerQueue;
pub use state::{Confirmed, MessageSent, State};

use async_trait::async_trait;

#[async_trait]
pub trait DurableProducerQueue<A>: Send {
    async fn load_state(&mut self) -> Result<State<A>, DurableQueueError>;

    async fn store_message_sent(&mut self, message: MessageSent<A>) -> Result<u64, DurableQueueError>;

    async fn store_message_confirmed(&mut self, confirmed_seq_nr: u64, qualifier: String);
}
