//! Fan-out wrappers that let the point-to-point controllers serve many
//! entities behind a single shared producer- or consumer-facing API,
//! addressed by entity id.

mod consumer_controller;
mod envelope;
mod producer_controller;

pub use consumer_controller::{ProducerResolver, ShardingConsumerController};
pub use envelope::ShardingEnvelope;
pub use producer_controller::{ShardingProducerController, ShardingRequestNext, ShardingRouterSend};
