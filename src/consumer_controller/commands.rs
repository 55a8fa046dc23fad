use crate::producer_controller::ProducerController;
use crate::wire::SequencedMessage;
use tokio::sync::mpsc;

use super::Delivery;

pub(crate) enum ConsumerCommand<A> {
    Start {
        consumer_ref: mpsc::UnboundedSender<Delivery<A>>,
    },
    RegisterToProducerController {
        producer: ProducerController<A>,
    },
    BindProducer {
        producer: ProducerController<A>,
    },
    SequencedMessage(SequencedMessage<A>),
    Confirmed {
        seq_nr: u64,
    },
}
