use std::collections::VecDeque;

use tokio::sync::mpsc;

use crate::config::Settings;
use crate::error::ControllerError;
use crate::producer_controller::ProducerController;
use crate::transport::BoxedConsumerSend;
use crate::wire::{Ack, ProducerRef, Request, Resend, SequencedMessage};

use super::commands::ConsumerCommand;
use super::{ConsumerController, Delivery};

#[derive(Debug, PartialEq, Eq)]
enum Phase {
    Idle,
    Active,
    WaitingForConfirmation,
    Resending,
}

struct OutstandingDelivery {
    seq_nr: u64,
    ack: bool,
    first: bool,
}

pub(crate) struct ConsumerControllerStateMachine<A> {
    consumer_id: String,
    resend_lost: bool,
    settings: Settings,
    self_tx: mpsc::UnboundedSender<ConsumerCommand<A>>,

    phase: Phase,
    consumer_ref: Option<mpsc::UnboundedSender<Delivery<A>>>,
    producer: Option<ProducerController<A>>,
    registering: Option<ProducerController<A>>,
    current_producer_ref: Option<ProducerRef>,

    received_seq_nr: u64,
    confirmed_seq_nr: u64,
    requested_seq_nr: u64,
    outstanding: Option<OutstandingDelivery>,

    stash: VecDeque<SequencedMessage<A>>,
}

impl<A> ConsumerControllerStateMachine<A>
where
    A: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(
        consumer_id: String,
        resend_lost: bool,
        settings: Settings,
        self_tx: mpsc::UnboundedSender<ConsumerCommand<A>>,
    ) -> Self {
        Self {
            consumer_id,
            resend_lost,
            settings,
            self_tx,
            phase: Phase::Idle,
            consumer_ref: None,
            producer: None,
            registering: None,
            current_producer_ref: None,
            received_seq_nr: 0,
            confirmed_seq_nr: 0,
            requested_seq_nr: 0,
            outstanding: None,
            stash: VecDeque::new(),
        }
    }

    #[tracing::instrument(name = "consumer_controller", skip_all, fields(consumer_id = %self.consumer_id))]
    pub(crate) async fn run(mut self, mut cmd_rx: mpsc::UnboundedReceiver<ConsumerCommand<A>>) {
        let mut retry_timer = tokio::time::interval(self.settings.retry_interval());
        retry_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        retry_timer.tick().await;

        loop {
            tokio::select! {
                biased;

                cmd = cmd_rx.recv() => {
                    match cmd {
                        Some(cmd) => self.handle(cmd),
                        None => break,
                    }
                }

                _ = retry_timer.tick() => {
                    self.on_retry_tick();
                }
            }
        }
    }

    fn handle(&mut self, cmd: ConsumerCommand<A>) {
        match cmd {
            ConsumerCommand::Start { consumer_ref } => self.on_start(consumer_ref),
            ConsumerCommand::RegisterToProducerController { producer } => self.on_register_to_producer(producer),
            ConsumerCommand::BindProducer { producer } => self.producer = Some(producer),
            ConsumerCommand::SequencedMessage(msg) => self.on_sequenced_message(msg),
            ConsumerCommand::Confirmed { seq_nr } => self.on_confirmed(seq_nr),
        }
    }

    fn on_start(&mut self, consumer_ref: mpsc::UnboundedSender<Delivery<A>>) {
        self.consumer_ref = Some(consumer_ref);
        if self.phase == Phase::Idle {
            if let Some(first) = self.stash.pop_front() {
                self.activate_with_first_message(first);
                self.drain_stash();
            }
        }
    }

    fn on_register_to_producer(&mut self, producer: ProducerController<A>) {
        self.registering = Some(producer.clone());
        producer.register_consumer(self.sequenced_message_sender());
    }

    fn on_sequenced_message(&mut self, msg: SequencedMessage<A>) {
        if self.registering.is_some() && !msg.first {
            return;
        }

        match self.phase {
            Phase::Idle => {
                if self.consumer_ref.is_some() {
                    self.activate_with_first_message(msg);
                    self.drain_stash();
                } else if self.stash.is_empty() {
                    self.stash.push_back(msg);
                }
            }
            Phase::Active => self.handle_active(msg),
            Phase::WaitingForConfirmation => self.handle_waiting_for_confirmation(msg),
            Phase::Resending => self.handle_resending(msg),
        }
    }

    fn activate_with_first_message(&mut self, msg: SequencedMessage<A>) {
        self.accept_producer(&msg);
        self.begin_active(msg.seq_nr);
        self.deliver(msg);
    }

    fn begin_active(&mut self, first_seq_nr: u64) {
        self.requested_seq_nr = first_seq_nr - 1 + self.settings.request_window;
        self.confirmed_seq_nr = 0;
        self.phase = Phase::Active;
        self.send_request(0, self.requested_seq_nr, false);
    }

    fn handle_active(&mut self, msg: SequencedMessage<A>) {
        let expected = self.received_seq_nr + 1;
        let producer_changed = self.current_producer_ref.as_ref() != Some(&msg.producer_ref);

        if msg.seq_nr == expected {
            self.accept_producer(&msg);
            self.deliver(msg);
            return;
        }

        if msg.first && (msg.seq_nr >= expected || producer_changed) {
            self.accept_producer(&msg);
            self.deliver(msg);
            return;
        }

        if msg.seq_nr > expected {
            if self.resend_lost {
                self.send_resend(expected);
                self.phase = Phase::Resending;
            } else {
                self.accept_producer(&msg);
                self.deliver(msg);
            }
            return;
        }

        if msg.first {
            self.send_request(self.confirmed_seq_nr, self.requested_seq_nr, true);
        }
    }

    fn handle_waiting_for_confirmation(&mut self, msg: SequencedMessage<A>) {
        if self.stash.len() >= self.settings.request_window as usize {
            tracing::trace!(seq_nr = msg.seq_nr, "dropping message, stash is full");
            return;
        }
        self.stash.push_back(msg);
    }

    fn handle_resending(&mut self, msg: SequencedMessage<A>) {
        let expected = self.received_seq_nr + 1;
        if msg.seq_nr == expected || (msg.first && msg.seq_nr >= expected) {
            self.accept_producer(&msg);
            self.phase = Phase::Active;
            self.deliver(msg);
        }
    }

    fn accept_producer(&mut self, msg: &SequencedMessage<A>) {
        self.current_producer_ref = Some(msg.producer_ref.clone());
        if msg.first {
            if let Some(producer) = self.registering.take() {
                self.producer = Some(producer);
            }
        }
    }

    fn deliver(&mut self, msg: SequencedMessage<A>) {
        self.received_seq_nr = msg.seq_nr;
        self.outstanding = Some(OutstandingDelivery {
            seq_nr: msg.seq_nr,
            ack: msg.ack,
            first: msg.first,
        });
        self.phase = Phase::WaitingForConfirmation;

        if let Some(consumer_ref) = &self.consumer_ref {
            let delivery = Delivery {
                producer_id: msg.producer_id,
                seq_nr: msg.seq_nr,
                msg: msg.msg,
                confirm_to: ConsumerController {
                    cmd_tx: self.self_tx.clone(),
                },
            };
            let _ = consumer_ref.send(delivery);
        }
    }

    fn on_confirmed(&mut self, k: u64) {
        if k > self.received_seq_nr {
            panic!(
                "{}",
                ControllerError::UnexpectedConfirmation {
                    consumer_id: self.consumer_id.clone(),
                    confirmed: k,
                    received: self.received_seq_nr,
                }
            );
        }
        if k < self.received_seq_nr {
            tracing::info!(
                consumer_id = %self.consumer_id,
                k,
                received_seq_nr = self.received_seq_nr,
                "late confirmation, consumer likely restarted"
            );
            return;
        }

        let outstanding = self.outstanding.take().expect("confirmed received with no outstanding delivery");
        self.confirmed_seq_nr = k;

        let half_window = self.settings.request_window / 2;
        if outstanding.first {
            self.requested_seq_nr = k - 1 + self.settings.request_window;
            self.send_request(k, self.requested_seq_nr, false);
        } else if self.requested_seq_nr >= k && self.requested_seq_nr - k == half_window {
            self.requested_seq_nr += half_window;
            self.send_request(k, self.requested_seq_nr, false);
        } else if outstanding.ack {
            self.send_ack(k);
        }

        self.phase = Phase::Active;
        self.drain_stash();
    }

    fn drain_stash(&mut self) {
        let pending: Vec<_> = self.stash.drain(..).collect();
        for msg in pending {
            if self.phase == Phase::WaitingForConfirmation {
                self.stash.push_back(msg);
            } else {
                self.on_sequenced_message(msg);
            }
        }
    }

    fn on_retry_tick(&mut self) {
        if let Some(producer) = &self.registering {
            producer.register_consumer(self.sequenced_message_sender());
        }
        match self.phase {
            Phase::Idle => {}
            Phase::Resending => self.send_resend(self.received_seq_nr + 1),
            Phase::Active | Phase::WaitingForConfirmation if self.producer.is_some() => {
                // Heartbeat: re-assert the current window on every tick so a
                // producer that lost our last Request (or whose window is
                // stuck because everything since was lost too, in
                // flow-control-only mode) gets a chance to recover it.
                self.send_request(self.confirmed_seq_nr, self.requested_seq_nr, true);
            }
            Phase::Active | Phase::WaitingForConfirmation => {}
        }
    }

    fn send_request(&self, confirmed_seq_nr: u64, up_to_seq_nr: u64, via_timeout: bool) {
        if let Some(producer) = self.producer.as_ref().or(self.registering.as_ref()) {
            producer.request(Request {
                confirmed_seq_nr,
                up_to_seq_nr,
                support_resend: self.resend_lost,
                via_timeout,
            });
        }
    }

    fn send_resend(&self, from_seq_nr: u64) {
        if let Some(producer) = &self.producer {
            producer.resend(Resend { from_seq_nr });
        }
    }

    fn send_ack(&self, confirmed_seq_nr: u64) {
        if let Some(producer) = &self.producer {
            producer.ack(Ack { confirmed_seq_nr });
        }
    }

    fn sequenced_message_sender(&self) -> BoxedConsumerSend<A> {
        let cmd_tx = self.self_tx.clone();
        Box::new(move |msg| {
            let _ = cmd_tx.send(ConsumerCommand::SequencedMessage(msg));
        })
    }
}
