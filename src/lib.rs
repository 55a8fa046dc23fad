//! A point-to-point, at-least-once reliable delivery protocol between
//! one producer and one consumer, with windowed flow control, optional
//! resend of lost messages, durable persistence of the producer's
//! outgoing queue across restarts, and fan-out wrappers for serving
//! many entities behind a sharded producer or consumer.
//!
//! The two halves are [`ProducerController`] and [`ConsumerController`].
//! Neither assumes anything about the transport carrying messages
//! between them: production callers wire [`transport::BoxedConsumerSend`]
//! to a real channel, tests wire it to something lossy.

pub mod config;
pub mod consumer_controller;
pub mod durable_queue;
pub mod error;
pub mod producer_controller;
pub mod retry;
pub mod sharding;
pub mod transport;
pub mod wire;

pub use config::Settings;
pub use consumer_controller::{ConsumerController, Delivery};
pub use durable_queue::{Confirmed, DurableProducerQueue, DurableQueueError, InMemoryDurableProducerQueue, MessageSent, State as DurableState};
pub use error::ControllerError;
pub use producer_controller::{ProducerController, RequestNext};
pub use sharding::{
    ProducerResolver, ShardingConsumerController, ShardingEnvelope, ShardingProducerController, ShardingRequestNext,
    ShardingRouterSend,
};
pub use wire::{Ack, ProducerRef, RegisterConsumer, Request, Resend, SequencedMessage};
