use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reliable_delivery::{
    ConsumerController, Delivery, DurableProducerQueue, DurableQueueError, DurableState as State, MessageSent,
    ProducerController, RequestNext, Settings,
};
use tokio::sync::mpsc;
use tracing::level_filters::LevelFilter;

/// Installs a test-writer tracing subscriber so the
/// `tracing::info!`/`warn!` instrumentation throughout the controllers
/// is visible under `cargo test -- --nocapture`. Callers guard this
/// behind a `std::sync::Once` (subscriber installation panics if
/// attempted twice in the same test binary).
pub fn init_test_environment() {
    tracing_subscriber::fmt()
        .with_max_level(LevelFilter::DEBUG)
        .with_target(false)
        .with_test_writer()
        .init();
}

/// A wired-up producer/consumer pair plus the two channels a test
/// drives them through: `request_next_rx` stands in for the
/// application producer, `delivery_rx` for the application consumer.
pub struct Harness {
    pub producer: ProducerController<String>,
    pub consumer: ConsumerController<String>,
    pub request_next_rx: mpsc::UnboundedReceiver<RequestNext<String>>,
    pub delivery_rx: mpsc::UnboundedReceiver<Delivery<String>>,
}

/// Wires a producer and consumer controller together with a
/// reliable, in-process transport: every `SequencedMessage` the
/// producer sends reaches the consumer directly, with no durable
/// queue backing the producer.
pub fn wire(producer_id: &str, settings: Settings, resend_lost: bool) -> Harness {
    wire_with_queue(producer_id, settings, resend_lost, None)
}

pub fn wire_with_queue(
    producer_id: &str,
    settings: Settings,
    resend_lost: bool,
    durable_queue: Option<Box<dyn DurableProducerQueue<String> + Send>>,
) -> Harness {
    let producer: ProducerController<String> = ProducerController::new(producer_id, settings.clone(), durable_queue);
    let consumer: ConsumerController<String> =
        ConsumerController::new(format!("{producer_id}-consumer"), resend_lost, settings);

    let (request_next_tx, request_next_rx) = mpsc::unbounded_channel();
    producer.start(request_next_tx);

    let (delivery_tx, delivery_rx) = mpsc::unbounded_channel();
    consumer.start(delivery_tx);
    consumer.register_to_producer_controller(producer.clone());

    Harness {
        producer,
        consumer,
        request_next_rx,
        delivery_rx,
    }
}

/// Like [`wire`], but every `SequencedMessage` the producer sends is
/// first passed through `dropped`: a seqNr present in that set is
/// dropped exactly once (removed from the set on the attempt that
/// drops it), so a later retransmission of the same seqNr gets
/// through. Stands in for the lossy, reordering transport the
/// protocol is specified against.
pub async fn wire_lossy(
    producer_id: &str,
    settings: Settings,
    resend_lost: bool,
    dropped: Arc<Mutex<HashSet<u64>>>,
) -> Harness {
    let producer: ProducerController<String> = ProducerController::new(producer_id, settings.clone(), None);
    let consumer: ConsumerController<String> =
        ConsumerController::new(format!("{producer_id}-consumer"), resend_lost, settings);

    let (request_next_tx, request_next_rx) = mpsc::unbounded_channel();
    producer.start(request_next_tx);

    let (delivery_tx, delivery_rx) = mpsc::unbounded_channel();
    consumer.start(delivery_tx);

    // Let the consumer register its own (unwrapped) send function with
    // the producer first, so it gets a producer handle to send
    // Request/Resend/Ack back through; then override the producer's
    // send function with the lossy one below (the producer keeps only
    // the most recently registered sender).
    consumer.register_to_producer_controller(producer.clone());
    tokio::time::sleep(Duration::from_millis(20)).await;

    let consumer_send = consumer.sequenced_message_sender();
    producer.register_consumer(Box::new(move |msg| {
        let should_drop = dropped.lock().unwrap().remove(&msg.seq_nr);
        if should_drop {
            return;
        }
        consumer_send(msg);
    }));

    Harness {
        producer,
        consumer,
        request_next_rx,
        delivery_rx,
    }
}

/// A durable queue test double whose state lives behind an `Arc`
/// reachable from outside the controller that owns it, so a test can
/// snapshot it (to persist "across a restart") or seed a fresh
/// instance from a prior snapshot, the way a real backing store would
/// be inspected and reloaded.
#[derive(Clone)]
pub struct SharedDurableQueue {
    state: Arc<Mutex<State<String>>>,
}

impl SharedDurableQueue {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State::default())),
        }
    }

    pub fn from_state(state: State<String>) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn snapshot(&self) -> State<String> {
        self.state.lock().unwrap().clone()
    }

    pub fn boxed(&self) -> Box<dyn DurableProducerQueue<String> + Send> {
        Box::new(self.clone())
    }
}

#[async_trait]
impl DurableProducerQueue<String> for SharedDurableQueue {
    async fn load_state(&mut self) -> Result<State<String>, DurableQueueError> {
        Ok(self.state.lock().unwrap().clone())
    }

    async fn store_message_sent(&mut self, message: MessageSent<String>) -> Result<u64, DurableQueueError> {
        let mut state = self.state.lock().unwrap();
        if message.seq_nr != state.current_seq_nr {
            return Err(DurableQueueError::Failed(format!(
                "expected seqNr {} but got {}",
                state.current_seq_nr, message.seq_nr
            )));
        }
        let seq_nr = message.seq_nr;
        state.unconfirmed.push_back(message);
        state.current_seq_nr += 1;
        Ok(seq_nr)
    }

    async fn store_message_confirmed(&mut self, confirmed_seq_nr: u64, qualifier: String) {
        let mut state = self.state.lock().unwrap();
        while let Some(front) = state.unconfirmed.front() {
            if front.seq_nr <= confirmed_seq_nr {
                state.unconfirmed.pop_front();
            } else {
                break;
            }
        }
        state.highest_confirmed_seq_nr = state.highest_confirmed_seq_nr.max(confirmed_seq_nr);
        state.confirmed_seq_nr_by_qualifier.insert(qualifier, confirmed_seq_nr);
    }
}

/// A `Settings` with short timers, so tests exercising retry/heartbeat
/// behavior don't have to wait out the 1s production defaults.
pub fn fast_settings() -> Settings {
    Settings {
        resend_first_interval_ms: 30,
        retry_interval_ms: 30,
        ..Settings::default()
    }
}
