/// Wraps a payload with the entity id it is addressed to or came from,
/// so a single producer- or consumer-facing channel can carry traffic
/// for many entities sharing one underlying sharded destination.
#[derive(Debug, Clone, PartialEq)]
pub struct ShardingEnvelope<A> {
    pub entity_id: String,
    pub msg: A,
}
