use super::ProducerController;

/// Delivered to the application producer whenever the controller has
/// room to accept another message, i.e. demand is open. Carries a
/// clone of the controller's own handle so the application can push
/// straight back into it without holding any other reference.
#[derive(Debug, Clone)]
pub struct RequestNext<A> {
    pub producer_id: String,
    pub current_seq_nr: u64,
    pub confirmed_seq_nr: u64,
    pub send_next_to: ProducerController<A>,
}
