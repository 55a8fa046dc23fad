use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use crate::config::Settings;
use crate::consumer_controller::{ConsumerController, Delivery};
use crate::producer_controller::ProducerController;
use crate::wire::SequencedMessage;

/// Resolves the producer controller that should receive flow-control
/// traffic (Request/Resend/Ack) for a given producer id. Stands in for
/// whatever cluster sharding machinery would actually route that
/// traffic to the right node.
pub type ProducerResolver<A> = Arc<dyn Fn(&str) -> ProducerController<A> + Send + Sync>;

struct Inner<A> {
    resend_lost: bool,
    settings: Settings,
    producer_resolver: ProducerResolver<A>,
    deliver_to: Option<mpsc::UnboundedSender<Delivery<A>>>,
    controllers: HashMap<String, ConsumerController<A>>,
    stash: VecDeque<SequencedMessage<A>>,
}

/// Fans incoming `SequencedMessage`s in from many producers over one
/// [`crate::consumer_controller::ConsumerController`] per producer id.
/// Unlike the point-to-point consumer controller, there is no prior
/// `RegisterConsumer` handshake: the first `SequencedMessage` seen for
/// a producer id is itself the registration.
pub struct ShardingConsumerController<A> {
    inner: Arc<Mutex<Inner<A>>>,
}

impl<A> Clone for ShardingConsumerController<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A> ShardingConsumerController<A>
where
    A: Clone + Send + Sync + 'static,
{
    pub fn new(resend_lost: bool, settings: Settings, producer_resolver: ProducerResolver<A>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                resend_lost,
                settings,
                producer_resolver,
                deliver_to: None,
                controllers: HashMap::new(),
                stash: VecDeque::new(),
            })),
        }
    }

    /// Registers the mailbox deliveries for every entity are sent to,
    /// and replays anything received before this was called.
    pub fn start(&self, deliver_to: mpsc::UnboundedSender<Delivery<A>>) {
        let pending = {
            let mut guard = self.inner.lock().unwrap();
            guard.deliver_to = Some(deliver_to);
            guard.stash.drain(..).collect::<Vec<_>>()
        };
        for msg in pending {
            self.dispatch(msg);
        }
    }

    /// Routes an inbound `SequencedMessage` to the consumer controller
    /// for its producer id, creating one (and registering it with the
    /// resolved producer controller) on first use.
    pub fn dispatch(&self, msg: SequencedMessage<A>) {
        let (deliver_to, controller) = {
            let mut guard = self.inner.lock().unwrap();
            let Some(deliver_to) = guard.deliver_to.clone() else {
                if guard.stash.len() < guard.settings.sharding_buffer_size {
                    guard.stash.push_back(msg);
                } else {
                    tracing::trace!(producer_id = %msg.producer_id, "dropping message, sharding stash is full");
                }
                return;
            };

            let producer_id = msg.producer_id.clone();
            let controller = guard.controllers.get(&producer_id).cloned();
            (deliver_to, controller)
        };

        let controller = match controller {
            Some(controller) => controller,
            None => self.register_new_controller(&msg.producer_id, deliver_to),
        };

        controller.dispatch_sequenced_message(msg);
    }

    fn register_new_controller(
        &self,
        producer_id: &str,
        deliver_to: mpsc::UnboundedSender<Delivery<A>>,
    ) -> ConsumerController<A> {
        let mut guard = self.inner.lock().unwrap();
        if let Some(controller) = guard.controllers.get(producer_id) {
            return controller.clone();
        }

        let controller = ConsumerController::new(producer_id.to_string(), guard.resend_lost, guard.settings.clone());
        controller.start(deliver_to);

        // No RegisterConsumer handshake here: the first `SequencedMessage`
        // for this producer id is itself the registration (see the type
        // doc comment above). Bind the resolved producer controller only
        // to send Request/Resend/Ack back through, so it never overwrites
        // the `ShardingRouterSend`-wrapped `send` the per-entity producer
        // controller was already given.
        let producer = (guard.producer_resolver)(producer_id);
        controller.bind_producer(producer);

        guard.controllers.insert(producer_id.to_string(), controller.clone());
        controller
    }
}
