//! The consumer-side half of the protocol: deduplicates and reorders
//! incoming `SequencedMessage`s into an in-order `Delivery` stream,
//! drives windowed flow control, and optionally requests resend of
//! gaps.

mod commands;
mod dto;
mod state_machine;

pub use dto::Delivery;

use crate::config::Settings;
use crate::producer_controller::ProducerController;
use crate::transport::BoxedConsumerSend;
use commands::ConsumerCommand;
use state_machine::ConsumerControllerStateMachine;
use tokio::sync::mpsc;

/// Handle to a running consumer controller. Cheap to clone; handed
/// back to the application inside every [`Delivery`] as `confirm_to`.
pub struct ConsumerController<A> {
    cmd_tx: mpsc::UnboundedSender<ConsumerCommand<A>>,
}

impl<A> Clone for ConsumerController<A> {
    fn clone(&self) -> Self {
        Self {
            cmd_tx: self.cmd_tx.clone(),
        }
    }
}

impl<A> std::fmt::Debug for ConsumerController<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsumerController").finish_non_exhaustive()
    }
}

impl<A> ConsumerController<A>
where
    A: Clone + Send + Sync + 'static,
{
    pub fn new(consumer_id: impl Into<String>, resend_lost: bool, settings: Settings) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let state_machine = ConsumerControllerStateMachine::new(consumer_id.into(), resend_lost, settings, cmd_tx.clone());
        tokio::spawn(state_machine.run(cmd_rx));
        Self { cmd_tx }
    }

    pub fn start(&self, consumer_ref: mpsc::UnboundedSender<Delivery<A>>) {
        let _ = self.cmd_tx.send(ConsumerCommand::Start { consumer_ref });
    }

    pub fn register_to_producer_controller(&self, producer: ProducerController<A>) {
        let _ = self.cmd_tx.send(ConsumerCommand::RegisterToProducerController { producer });
    }

    /// Wires the producer controller to send `Request`/`Resend`/`Ack`
    /// flow-control traffic to, without performing the
    /// `RegisterConsumer` handshake. For callers (sharding) where the
    /// first `SequencedMessage` itself stands in for registration, so
    /// overwriting the producer's `send` here would discard whatever
    /// it was wired to instead.
    pub(crate) fn bind_producer(&self, producer: ProducerController<A>) {
        let _ = self.cmd_tx.send(ConsumerCommand::BindProducer { producer });
    }

    pub fn confirmed(&self, seq_nr: u64) {
        let _ = self.cmd_tx.send(ConsumerCommand::Confirmed { seq_nr });
    }

    /// The transmission function a producer controller should be given
    /// (via `register_consumer`) to deliver `SequencedMessage`s here.
    pub fn sequenced_message_sender(&self) -> BoxedConsumerSend<A> {
        let cmd_tx = self.cmd_tx.clone();
        Box::new(move |msg| {
            let _ = cmd_tx.send(ConsumerCommand::SequencedMessage(msg));
        })
    }

    pub(crate) fn dispatch_sequenced_message(&self, msg: crate::wire::SequencedMessage<A>) {
        let _ = self.cmd_tx.send(ConsumerCommand::SequencedMessage(msg));
    }
}
