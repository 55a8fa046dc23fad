use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use crate::config::Settings;
use crate::producer_controller::{ProducerController, RequestNext};
use crate::wire::SequencedMessage;

use super::ShardingEnvelope;

/// The opaque collaborator this component fans out to: whatever
/// carries a `SequencedMessage` addressed to an entity id to wherever
/// that entity's consumer-side controller lives. Cluster sharding
/// machinery itself is out of scope; this is its seam.
pub type ShardingRouterSend<A> = Arc<dyn Fn(ShardingEnvelope<SequencedMessage<A>>) + Send + Sync>;

/// Delivered to the application whenever any per-entity producer
/// controller has room for another message for its entity.
#[derive(Clone)]
pub struct ShardingRequestNext<A> {
    pub entity_id: String,
    pub current_seq_nr: u64,
    pub confirmed_seq_nr: u64,
    pub send_next_to: ShardingProducerController<A>,
}

impl<A> std::fmt::Debug for ShardingRequestNext<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardingRequestNext")
            .field("entity_id", &self.entity_id)
            .field("current_seq_nr", &self.current_seq_nr)
            .field("confirmed_seq_nr", &self.confirmed_seq_nr)
            .field("send_next_to", &"ShardingProducerController { .. }")
            .finish()
    }
}

struct Inner<A> {
    producer_id_prefix: String,
    settings: Settings,
    router: ShardingRouterSend<A>,
    controllers: HashMap<String, ProducerController<A>>,
    internal_tx: mpsc::UnboundedSender<(String, RequestNext<A>)>,
}

/// Fans a single producer-facing API out over one
/// [`crate::producer_controller::ProducerController`] per entity id, so
/// the entity a message is addressed to can be chosen per call instead
/// of being fixed for the controller's lifetime.
pub struct ShardingProducerController<A> {
    inner: Arc<Mutex<Inner<A>>>,
}

impl<A> Clone for ShardingProducerController<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A> ShardingProducerController<A>
where
    A: Clone + Send + Sync + 'static,
{
    pub fn new(
        producer_id_prefix: impl Into<String>,
        settings: Settings,
        router: ShardingRouterSend<A>,
        request_next_tx: mpsc::UnboundedSender<ShardingRequestNext<A>>,
    ) -> Self {
        let (internal_tx, mut internal_rx) = mpsc::unbounded_channel::<(String, RequestNext<A>)>();
        let inner = Arc::new(Mutex::new(Inner {
            producer_id_prefix: producer_id_prefix.into(),
            settings,
            router,
            controllers: HashMap::new(),
            internal_tx,
        }));

        let handle = Self { inner: Arc::clone(&inner) };
        tokio::spawn(async move {
            while let Some((entity_id, request_next)) = internal_rx.recv().await {
                let sharding_next = ShardingRequestNext {
                    entity_id,
                    current_seq_nr: request_next.current_seq_nr,
                    confirmed_seq_nr: request_next.confirmed_seq_nr,
                    send_next_to: handle.clone(),
                };
                if request_next_tx.send(sharding_next).is_err() {
                    break;
                }
            }
        });

        Self { inner }
    }

    /// Routes `msg` to the per-entity producer controller for
    /// `entity_id`, spawning one on first use.
    pub fn message(&self, entity_id: &str, msg: A, ack: bool) {
        self.controller_for(entity_id).message(msg, ack);
    }

    /// Returns the per-entity producer controller for `entity_id`,
    /// spawning one on first use. Exposed so a
    /// [`crate::sharding::ProducerResolver`] can resolve the same inner
    /// controller the consumer side's `Request`/`Resend`/`Ack` traffic
    /// must reach, rather than `message` being the only way in.
    pub fn controller_for(&self, entity_id: &str) -> ProducerController<A> {
        let mut guard = self.inner.lock().unwrap();
        if let Some(controller) = guard.controllers.get(entity_id) {
            return controller.clone();
        }

        let producer_id = format!("{}-{}", guard.producer_id_prefix, entity_id);
        let controller = ProducerController::new(producer_id, guard.settings.clone(), None);

        let router = Arc::clone(&guard.router);
        let entity_id_for_send = entity_id.to_string();
        controller.register_consumer(Box::new(move |msg| {
            router(ShardingEnvelope {
                entity_id: entity_id_for_send.clone(),
                msg,
            });
        }));

        let (req_tx, mut req_rx) = mpsc::unbounded_channel::<RequestNext<A>>();
        controller.start(req_tx);

        let internal_tx = guard.internal_tx.clone();
        let entity_id_owned = entity_id.to_string();
        tokio::spawn(async move {
            while let Some(next) = req_rx.recv().await {
                if internal_tx.send((entity_id_owned.clone(), next)).is_err() {
                    break;
                }
            }
        });

        guard.controllers.insert(entity_id.to_string(), controller.clone());
        controller
    }
}
