//! Wires a [`ShardingProducerController`] and a [`ShardingConsumerController`]
//! through a single shared router, and drives two independent entity
//! ids through it concurrently. There is no `RegisterConsumer`
//! handshake anywhere in this path: the first `SequencedMessage` for
//! each entity id is itself the registration on the consumer side, and
//! `ShardingProducerController::controller_for` registers the
//! router-wrapped `send` exactly once per entity on the producer side.

mod common;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use reliable_delivery::{
    ShardingConsumerController, ShardingEnvelope, ShardingProducerController, ShardingRouterSend,
};
use tokio::sync::mpsc;

static BEFORE_ALL: Once = Once::new();

const PRODUCER_ID_PREFIX: &str = "orders";

#[tokio::test]
async fn routes_independent_entities_through_a_shared_router() {
    BEFORE_ALL.call_once(common::init_test_environment);

    let settings = common::fast_settings();

    // The producer controller doesn't exist yet when the consumer's
    // resolver closure is built (each needs the other), so the
    // resolver reads the producer through a slot filled in once it is.
    let producer_slot: Arc<Mutex<Option<ShardingProducerController<String>>>> = Arc::new(Mutex::new(None));
    let resolver_slot = Arc::clone(&producer_slot);

    let sharding_consumer: ShardingConsumerController<String> = ShardingConsumerController::new(
        true,
        settings.clone(),
        Arc::new(move |producer_id: &str| {
            let entity_id = producer_id
                .strip_prefix(format!("{PRODUCER_ID_PREFIX}-").as_str())
                .expect("producer id carries the sharding prefix");
            resolver_slot
                .lock()
                .unwrap()
                .as_ref()
                .expect("producer resolved only after the sharding producer exists")
                .controller_for(entity_id)
        }),
    );

    let router_consumer = sharding_consumer.clone();
    let router: ShardingRouterSend<String> = Arc::new(move |envelope: ShardingEnvelope<_>| {
        router_consumer.dispatch(envelope.msg);
    });

    let (request_next_tx, mut request_next_rx) = mpsc::unbounded_channel();
    let sharding_producer = ShardingProducerController::new(PRODUCER_ID_PREFIX, settings, router, request_next_tx);
    *producer_slot.lock().unwrap() = Some(sharding_producer.clone());

    let (delivery_tx, mut delivery_rx) = mpsc::unbounded_channel();
    sharding_consumer.start(delivery_tx);

    let mut pending: HashMap<&str, Vec<String>> = HashMap::from([
        ("entity-1", vec!["e1-a".to_string(), "e1-b".to_string(), "e1-c".to_string()]),
        ("entity-2", vec!["e2-a".to_string(), "e2-b".to_string()]),
    ]);
    let total_messages: usize = pending.values().map(Vec::len).sum();

    let mut delivered: HashMap<String, Vec<(u64, String)>> = HashMap::new();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);

    while delivered.values().map(Vec::len).sum::<usize>() < total_messages {
        tokio::select! {
            Some(next) = request_next_rx.recv() => {
                if let Some(queue) = pending.get_mut(next.entity_id.as_str()) {
                    if !queue.is_empty() {
                        let msg = queue.remove(0);
                        next.send_next_to.message(&next.entity_id, msg, false);
                    }
                }
            }
            Some(delivery) = delivery_rx.recv() => {
                delivered
                    .entry(delivery.producer_id.clone())
                    .or_default()
                    .push((delivery.seq_nr, delivery.msg.clone()));
                delivery.confirm_to.confirmed(delivery.seq_nr);
            }
            _ = tokio::time::sleep_until(deadline) => {
                panic!("timed out, delivered so far: {delivered:?}");
            }
        }
    }

    let entity1_producer_id = format!("{PRODUCER_ID_PREFIX}-entity-1");
    let entity2_producer_id = format!("{PRODUCER_ID_PREFIX}-entity-2");

    assert_eq!(
        delivered[&entity1_producer_id],
        vec![(1, "e1-a".to_string()), (2, "e1-b".to_string()), (3, "e1-c".to_string())]
    );
    assert_eq!(
        delivered[&entity2_producer_id],
        vec![(1, "e2-a".to_string()), (2, "e2-b".to_string())]
    );
}
