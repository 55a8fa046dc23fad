use super::ConsumerController;

/// Delivered to the application consumer for each message accepted by
/// the controller. Call `confirm_to.confirmed(seq_nr)` once processed.
#[derive(Debug, Clone)]
pub struct Delivery<A> {
    pub producer_id: String,
    pub seq_nr: u64,
    pub msg: A,
    pub confirm_to: ConsumerController<A>,
}
