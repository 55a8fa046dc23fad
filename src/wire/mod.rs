//! Wire formats exchanged between a producer controller and a consumer
//! controller. Every type here derives `Serialize`/`Deserialize` so the
//! format itself is testable independent of the transport.

mod ack;
mod producer_ref;
mod register_consumer;
mod request;
mod resend;
mod sequenced_message;

pub use ack::Ack;
pub use producer_ref::ProducerRef;
pub use register_consumer::RegisterConsumer;
pub use request::Request;
pub use resend::Resend;
pub use sequenced_message::SequencedMessage;
