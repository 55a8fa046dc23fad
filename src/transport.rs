use crate::wire::SequencedMessage;

///
/// The transmission function a ProducerController (or an inner, per-entity
/// ProducerController owned by a ShardingProducerController) uses to hand a
/// [`SequencedMessage`] to whatever carries it to the consumer side.
///
/// Production callers wire this to a real transport. Tests wire it to a
/// closure that can drop, delay or reorder calls, which is how the lossy
/// scenarios are driven deterministically without a real network. Swapped
/// out on every `RegisterConsumer`, which is how sharding rewraps outgoing
/// messages without the controller itself knowing about entity ids.
///
pub type BoxedConsumerSend<A> = Box<dyn Fn(SequencedMessage<A>) + Send + Sync>;
