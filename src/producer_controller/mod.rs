//! The producer-side half of the protocol: paces an application
//! producer against a consumer's demand, buffers unconfirmed messages
//! for resend, and optionally persists them through a
//! [`crate::durable_queue::DurableProducerQueue`] so they survive a
//! restart.

mod commands;
mod dto;
mod state_machine;

pub use dto::RequestNext;

use crate::config::Settings;
use crate::durable_queue::DurableProducerQueue;
use crate::transport::BoxedConsumerSend;
use crate::wire::{Ack, Request, Resend};
use commands::ProducerCommand;
use state_machine::ProducerControllerStateMachine;
use tokio::sync::{mpsc, oneshot};

/// Handle to a running producer controller. Cheap to clone; every
/// clone sends into the same command queue, so the controller itself
/// is the only owner of its state.
pub struct ProducerController<A> {
    cmd_tx: mpsc::UnboundedSender<ProducerCommand<A>>,
}

impl<A> Clone for ProducerController<A> {
    fn clone(&self) -> Self {
        Self {
            cmd_tx: self.cmd_tx.clone(),
        }
    }
}

impl<A> std::fmt::Debug for ProducerController<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProducerController").finish_non_exhaustive()
    }
}

impl<A> ProducerController<A>
where
    A: Clone + Send + Sync + 'static,
{
    pub fn new(
        producer_id: impl Into<String>,
        settings: Settings,
        durable_queue: Option<Box<dyn DurableProducerQueue<A> + Send>>,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let state_machine = ProducerControllerStateMachine::new(
            producer_id.into(),
            settings,
            durable_queue,
            cmd_tx.clone(),
        );
        tokio::spawn(state_machine.run(cmd_rx));
        Self { cmd_tx }
    }

    /// Registers the mailbox the controller should deliver `RequestNext`
    /// demand signals to.
    pub fn start(&self, producer_ref: mpsc::UnboundedSender<RequestNext<A>>) {
        let _ = self.cmd_tx.send(ProducerCommand::Start { producer_ref });
    }

    /// Wires the function the controller uses to transmit
    /// `SequencedMessage`s to the consumer side.
    pub fn register_consumer(&self, send: BoxedConsumerSend<A>) {
        let _ = self.cmd_tx.send(ProducerCommand::RegisterConsumer { send });
    }

    pub fn message(&self, msg: A, ack: bool) {
        let _ = self.cmd_tx.send(ProducerCommand::Message { msg, ack });
    }

    /// Like [`ProducerController::message`] but resolves the returned
    /// receiver's value (the message's `seqNr`) once it is confirmed.
    pub fn message_with_confirmation(&self, msg: A, ack: bool) -> oneshot::Receiver<u64> {
        let (reply_to, rx) = oneshot::channel();
        let _ = self.cmd_tx.send(ProducerCommand::MessageWithConfirmation { msg, ack, reply_to });
        rx
    }

    pub fn request(&self, request: Request) {
        let _ = self.cmd_tx.send(ProducerCommand::Request(request));
    }

    pub fn resend(&self, resend: Resend) {
        let _ = self.cmd_tx.send(ProducerCommand::Resend(resend));
    }

    pub fn ack(&self, ack: Ack) {
        let _ = self.cmd_tx.send(ProducerCommand::Ack(ack));
    }
}
