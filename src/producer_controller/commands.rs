use crate::durable_queue::{DurableQueueError, State};
use crate::transport::BoxedConsumerSend;
use crate::wire::{Ack, Request, Resend};
use tokio::sync::{mpsc, oneshot};

use super::RequestNext;

pub(crate) enum ProducerCommand<A> {
    Start {
        producer_ref: mpsc::UnboundedSender<RequestNext<A>>,
    },
    RegisterConsumer {
        send: BoxedConsumerSend<A>,
    },
    Message {
        msg: A,
        ack: bool,
    },
    MessageWithConfirmation {
        msg: A,
        ack: bool,
        reply_to: oneshot::Sender<u64>,
    },
    Request(Request),
    Resend(Resend),
    Ack(Ack),
    LoadStateResult(Result<State<A>, DurableQueueError>),
    StoreMessageSentResult {
        seq_nr: u64,
        result: Result<u64, DurableQueueError>,
    },
}
