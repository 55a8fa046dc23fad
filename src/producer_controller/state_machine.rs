use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, Mutex as TokioMutex};

use crate::config::Settings;
use crate::durable_queue::{DurableProducerQueue, DurableQueueError, MessageSent, State};
use crate::error::ControllerError;
use crate::transport::BoxedConsumerSend;
use crate::wire::{Ack, ProducerRef, Request, Resend, SequencedMessage};

use super::commands::ProducerCommand;
use super::{ProducerController, RequestNext};

type SharedDurableQueue<A> = Arc<TokioMutex<Box<dyn DurableProducerQueue<A> + Send>>>;

static NEXT_EPOCH: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, PartialEq, Eq)]
enum Phase {
    Gathering,
    Active,
}

pub(crate) struct ProducerControllerStateMachine<A> {
    producer_id: String,
    epoch: u64,
    settings: Settings,
    durable_queue: Option<SharedDurableQueue<A>>,
    self_tx: mpsc::UnboundedSender<ProducerCommand<A>>,

    phase: Phase,
    awaiting_load: bool,
    loaded_state: Option<State<A>>,

    producer_ref: Option<mpsc::UnboundedSender<RequestNext<A>>>,
    send: Option<BoxedConsumerSend<A>>,

    requested: bool,
    current_seq_nr: u64,
    confirmed_seq_nr: u64,
    requested_seq_nr: u64,
    first_seq_nr: u64,
    support_resend: bool,
    resend_first_active: bool,

    unconfirmed: VecDeque<SequencedMessage<A>>,
    reply_after_store: BTreeMap<u64, oneshot::Sender<u64>>,
    pending_store: Option<(A, bool)>,
}

impl<A> ProducerControllerStateMachine<A>
where
    A: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(
        producer_id: String,
        settings: Settings,
        durable_queue: Option<Box<dyn DurableProducerQueue<A> + Send>>,
        self_tx: mpsc::UnboundedSender<ProducerCommand<A>>,
    ) -> Self {
        let epoch = NEXT_EPOCH.fetch_add(1, Ordering::Relaxed);
        let awaiting_load = durable_queue.is_some();
        Self {
            producer_id,
            epoch,
            settings,
            durable_queue: durable_queue.map(|dq| Arc::new(TokioMutex::new(dq))),
            self_tx,
            phase: Phase::Gathering,
            awaiting_load,
            loaded_state: None,
            producer_ref: None,
            send: None,
            requested: false,
            current_seq_nr: 1,
            confirmed_seq_nr: 0,
            requested_seq_nr: 1,
            first_seq_nr: 1,
            support_resend: true,
            resend_first_active: false,
            unconfirmed: VecDeque::new(),
            reply_after_store: BTreeMap::new(),
            pending_store: None,
        }
    }

    #[tracing::instrument(name = "producer_controller", skip_all, fields(producer_id = %self.producer_id, epoch = self.epoch))]
    pub(crate) async fn run(mut self, mut cmd_rx: mpsc::UnboundedReceiver<ProducerCommand<A>>) {
        if let Some(durable_queue) = self.durable_queue.clone() {
            self.spawn_load_state(durable_queue);
        }

        let mut resend_first_timer = tokio::time::interval(self.settings.resend_first_interval());
        resend_first_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        resend_first_timer.tick().await;

        loop {
            tokio::select! {
                biased;

                cmd = cmd_rx.recv() => {
                    match cmd {
                        Some(cmd) => self.handle(cmd),
                        None => break,
                    }
                }

                _ = resend_first_timer.tick(), if self.resend_first_active => {
                    self.on_resend_first_tick();
                }
            }
        }
    }

    fn handle(&mut self, cmd: ProducerCommand<A>) {
        match cmd {
            ProducerCommand::Start { producer_ref } => self.on_start(producer_ref),
            ProducerCommand::RegisterConsumer { send } => self.on_register_consumer(send),
            ProducerCommand::Message { msg, ack } => self.on_message(msg, ack, None),
            ProducerCommand::MessageWithConfirmation { msg, ack, reply_to } => {
                self.on_message(msg, ack, Some(reply_to))
            }
            ProducerCommand::Request(request) => {
                if self.phase == Phase::Active {
                    self.on_request(request);
                }
            }
            ProducerCommand::Resend(resend) => {
                if self.phase == Phase::Active {
                    self.on_resend(resend);
                }
            }
            ProducerCommand::Ack(ack) => {
                if self.phase == Phase::Active {
                    self.on_ack_message(ack);
                }
            }
            ProducerCommand::LoadStateResult(result) => self.on_load_state_result(result),
            ProducerCommand::StoreMessageSentResult { seq_nr, result } => {
                self.on_store_message_sent_result(seq_nr, result)
            }
        }
    }

    fn on_start(&mut self, producer_ref: mpsc::UnboundedSender<RequestNext<A>>) {
        self.producer_ref = Some(producer_ref);
        if self.phase == Phase::Active && self.requested {
            self.emit_request_next();
        }
        self.try_activate();
    }

    fn on_register_consumer(&mut self, send: BoxedConsumerSend<A>) {
        self.send = Some(send);
        self.first_seq_nr = self.unconfirmed.front().map(|m| m.seq_nr).unwrap_or(self.current_seq_nr);
        if !self.unconfirmed.is_empty() {
            self.resend_first_active = true;
            self.on_resend_first_tick();
        }
        self.try_activate();
    }

    fn try_activate(&mut self) {
        if self.phase == Phase::Active {
            return;
        }
        if self.producer_ref.is_none() || self.send.is_none() || self.awaiting_load {
            return;
        }

        self.phase = Phase::Active;

        if let Some(state) = self.loaded_state.take() {
            self.current_seq_nr = state.current_seq_nr.max(1);
            self.confirmed_seq_nr = state.highest_confirmed_seq_nr;
            self.unconfirmed = state
                .unconfirmed
                .into_iter()
                .enumerate()
                .map(|(i, ms)| SequencedMessage {
                    producer_id: self.producer_id.clone(),
                    seq_nr: ms.seq_nr,
                    msg: ms.msg,
                    first: i == 0,
                    ack: ms.ack,
                    producer_ref: self.producer_ref_wire(),
                })
                .collect();
            if !self.unconfirmed.is_empty() {
                self.resend_first_active = true;
            }
        }

        self.first_seq_nr = self.unconfirmed.front().map(|m| m.seq_nr).unwrap_or(self.current_seq_nr);
        self.requested_seq_nr = self.current_seq_nr;

        self.grant_next_if_window_open();
        if !self.unconfirmed.is_empty() {
            self.retransmit_unconfirmed();
        }
    }

    fn on_message(&mut self, msg: A, ack: bool, reply_to: Option<oneshot::Sender<u64>>) {
        if !(self.requested && self.current_seq_nr <= self.requested_seq_nr) {
            panic!(
                "{}",
                ControllerError::NoDemand {
                    producer_id: self.producer_id.clone()
                }
            );
        }

        let seq_nr = self.current_seq_nr;
        if let Some(reply_to) = reply_to {
            self.reply_after_store.insert(seq_nr, reply_to);
        }

        match self.durable_queue.clone() {
            Some(durable_queue) => {
                self.requested = false;
                self.pending_store = Some((msg.clone(), ack));
                self.spawn_store_message_sent(durable_queue, seq_nr, msg, ack);
            }
            None => self.complete_send(seq_nr, msg, ack, false),
        }
    }

    fn on_store_message_sent_result(&mut self, seq_nr: u64, result: Result<u64, DurableQueueError>) {
        match result {
            Ok(stored_seq_nr) => {
                if stored_seq_nr != seq_nr {
                    panic!(
                        "{}",
                        ControllerError::SeqNrMismatch {
                            producer_id: self.producer_id.clone(),
                            expected: seq_nr,
                            stored: stored_seq_nr,
                        }
                    );
                }
                let (msg, ack) = self.pending_store.take().expect("pending store must be set");
                self.complete_send(seq_nr, msg, ack, true);
            }
            Err(err) => panic!(
                "{}",
                ControllerError::DurableQueueFailed {
                    producer_id: self.producer_id.clone(),
                    attempts: self.settings.durable_max_attempts,
                    source: err,
                }
            ),
        }
    }

    fn complete_send(&mut self, seq_nr: u64, msg: A, ack: bool, reply_now: bool) {
        let first = seq_nr == self.first_seq_nr;
        let sequenced = SequencedMessage {
            producer_id: self.producer_id.clone(),
            seq_nr,
            msg,
            first,
            ack,
            producer_ref: self.producer_ref_wire(),
        };

        if self.support_resend {
            self.unconfirmed.push_back(sequenced.clone());
        }
        if first {
            self.resend_first_active = true;
        }

        self.transmit(&sequenced);

        if reply_now {
            if let Some(reply_to) = self.reply_after_store.remove(&seq_nr) {
                let _ = reply_to.send(seq_nr);
            }
        }

        self.current_seq_nr += 1;
        self.grant_next_if_window_open();
    }

    fn on_request(&mut self, request: Request) {
        self.apply_ack(request.confirmed_seq_nr);
        self.support_resend = request.support_resend;
        if !self.support_resend {
            self.unconfirmed.clear();
        }

        if self.support_resend && (request.via_timeout || request.confirmed_seq_nr == self.first_seq_nr) {
            self.retransmit_unconfirmed();
        }

        let new_requested_seq_nr = if !self.support_resend && request.up_to_seq_nr < self.current_seq_nr {
            self.current_seq_nr + (request.up_to_seq_nr - request.confirmed_seq_nr)
        } else {
            request.up_to_seq_nr
        };

        let window_grew = new_requested_seq_nr > self.requested_seq_nr;
        self.requested_seq_nr = new_requested_seq_nr;

        if window_grew && !self.requested && self.current_seq_nr <= self.requested_seq_nr {
            self.requested = true;
            self.emit_request_next();
        }
    }

    fn on_ack_message(&mut self, ack: Ack) {
        self.apply_ack(ack.confirmed_seq_nr);
        if ack.confirmed_seq_nr == self.first_seq_nr && !self.unconfirmed.is_empty() {
            self.retransmit_unconfirmed();
        }
    }

    fn on_resend(&mut self, resend: Resend) {
        while let Some(front) = self.unconfirmed.front() {
            if front.seq_nr < resend.from_seq_nr {
                self.unconfirmed.pop_front();
            } else {
                break;
            }
        }
        self.retransmit_unconfirmed();
    }

    fn on_resend_first_tick(&mut self) {
        match self.unconfirmed.front().cloned() {
            Some(mut head) if head.seq_nr == self.first_seq_nr => {
                head.first = true;
                self.transmit(&head);
            }
            _ => {
                if self.current_seq_nr > self.first_seq_nr {
                    self.resend_first_active = false;
                }
            }
        }
    }

    fn apply_ack(&mut self, k: u64) {
        let to_reply: Vec<u64> = self.reply_after_store.range(..=k).map(|(&seq, _)| seq).collect();
        for seq in to_reply {
            if let Some(reply_to) = self.reply_after_store.remove(&seq) {
                let _ = reply_to.send(seq);
            }
        }

        while let Some(front) = self.unconfirmed.front() {
            if front.seq_nr <= k {
                self.unconfirmed.pop_front();
            } else {
                break;
            }
        }

        if k == self.first_seq_nr {
            self.resend_first_active = false;
        }

        if k > self.confirmed_seq_nr {
            self.confirmed_seq_nr = k;
            if let Some(durable_queue) = self.durable_queue.clone() {
                tokio::spawn(async move {
                    let mut dq = durable_queue.lock().await;
                    dq.store_message_confirmed(k, String::new()).await;
                });
            }
        }
    }

    fn grant_next_if_window_open(&mut self) {
        if self.current_seq_nr <= self.requested_seq_nr {
            self.requested = true;
            self.emit_request_next();
        } else {
            self.requested = false;
        }
    }

    fn emit_request_next(&self) {
        if let Some(producer_ref) = &self.producer_ref {
            let request_next = RequestNext {
                producer_id: self.producer_id.clone(),
                current_seq_nr: self.current_seq_nr,
                confirmed_seq_nr: self.confirmed_seq_nr,
                send_next_to: ProducerController {
                    cmd_tx: self.self_tx.clone(),
                },
            };
            let _ = producer_ref.send(request_next);
        }
    }

    fn retransmit_unconfirmed(&self) {
        for msg in &self.unconfirmed {
            self.transmit(msg);
        }
    }

    fn transmit(&self, msg: &SequencedMessage<A>) {
        if let Some(send) = &self.send {
            send(msg.clone());
        }
    }

    fn producer_ref_wire(&self) -> ProducerRef {
        ProducerRef {
            producer_id: self.producer_id.clone(),
            epoch: self.epoch,
        }
    }

    fn on_load_state_result(&mut self, result: Result<State<A>, DurableQueueError>) {
        match result {
            Ok(state) => {
                self.loaded_state = Some(state);
                self.awaiting_load = false;
                self.try_activate();
            }
            Err(err) => panic!(
                "{}",
                ControllerError::DurableQueueFailed {
                    producer_id: self.producer_id.clone(),
                    attempts: self.settings.durable_max_attempts,
                    source: err,
                }
            ),
        }
    }

    fn spawn_load_state(&self, durable_queue: SharedDurableQueue<A>) {
        let self_tx = self.self_tx.clone();
        let producer_id = self.producer_id.clone();
        let retry_interval = self.settings.retry_interval();
        let max_attempts = self.settings.durable_max_attempts;
        let op_timeout = self.settings.durable_load_timeout();

        tokio::spawn(async move {
            let result = crate::retry::retry(
                retry_interval,
                max_attempts,
                |attempt| tracing::info!(producer_id = %producer_id, attempt, "loading durable producer state"),
                |attempt, err: &DurableQueueError| {
                    tracing::warn!(producer_id = %producer_id, attempt, %err, "failed to load durable producer state")
                },
                || {
                    let durable_queue = Arc::clone(&durable_queue);
                    async move {
                        let mut dq = durable_queue.lock().await;
                        tokio::time::timeout(op_timeout, dq.load_state())
                            .await
                            .unwrap_or(Err(DurableQueueError::Timeout))
                    }
                },
            )
            .await;

            let _ = self_tx.send(ProducerCommand::LoadStateResult(result));
        });
    }

    fn spawn_store_message_sent(&self, durable_queue: SharedDurableQueue<A>, seq_nr: u64, msg: A, ack: bool) {
        let self_tx = self.self_tx.clone();
        let producer_id = self.producer_id.clone();
        let retry_interval = self.settings.retry_interval();
        let max_attempts = self.settings.durable_max_attempts;
        let op_timeout = self.settings.durable_store_timeout();

        tokio::spawn(async move {
            let result = crate::retry::retry(
                retry_interval,
                max_attempts,
                |attempt| tracing::info!(producer_id = %producer_id, seq_nr, attempt, "storing message sent"),
                |attempt, err: &DurableQueueError| {
                    tracing::warn!(producer_id = %producer_id, seq_nr, attempt, %err, "failed to store message sent")
                },
                || {
                    let durable_queue = Arc::clone(&durable_queue);
                    let message_sent = MessageSent {
                        seq_nr,
                        msg: msg.clone(),
                        ack,
                        qualifier: String::new(),
                    };
                    async move {
                        let mut dq = durable_queue.lock().await;
                        tokio::time::timeout(op_timeout, dq.store_message_sent(message_sent))
                            .await
                            .unwrap_or(Err(DurableQueueError::Timeout))
                    }
                },
            )
            .await;

            let _ = self_tx.send(ProducerCommand::StoreMessageSentResult { seq_nr, result });
        });
    }
}
