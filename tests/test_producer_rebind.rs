//! Spec §4.2's "registering / producer rebinding": a consumer may be
//! pointed at a new producer at runtime via a second
//! `register_to_producer_controller` call. The handoff must neither
//! lose the in-flight delivery history with the old producer nor
//! duplicate anything once the new producer's messages start arriving.

mod common;

use std::sync::Once;
use std::time::Duration;

use reliable_delivery::{ConsumerController, ProducerController};
use tokio::sync::mpsc;

static BEFORE_ALL: Once = Once::new();

#[tokio::test]
async fn consumer_rebinds_to_a_fresh_producer_without_loss_or_duplication() {
    BEFORE_ALL.call_once(common::init_test_environment);

    let settings = common::fast_settings();
    let consumer: ConsumerController<String> = ConsumerController::new("p-rebind-consumer", true, settings.clone());

    let (delivery_tx, mut delivery_rx) = mpsc::unbounded_channel();
    consumer.start(delivery_tx);

    let producer_a: ProducerController<String> = ProducerController::new("p-rebind-a", settings.clone(), None);
    let (req_a_tx, mut req_a_rx) = mpsc::unbounded_channel();
    producer_a.start(req_a_tx);
    consumer.register_to_producer_controller(producer_a.clone());

    for m in ["a1", "a2"] {
        let next = req_a_rx.recv().await.expect("request next from producer a");
        next.send_next_to.message(m.to_string(), false);
    }
    for (expected_seq, expected_msg) in [(1u64, "a1"), (2, "a2")] {
        let delivery = tokio::time::timeout(Duration::from_secs(2), delivery_rx.recv())
            .await
            .expect("delivery within timeout")
            .expect("delivery channel open");
        assert_eq!(delivery.seq_nr, expected_seq);
        assert_eq!(delivery.msg, expected_msg);
        delivery.confirm_to.confirmed(delivery.seq_nr);
    }

    // Producer A is replaced at runtime: the consumer is pointed at a
    // brand new producer controller without ever having been told
    // producer A is gone.
    let producer_b: ProducerController<String> = ProducerController::new("p-rebind-b", settings, None);
    let (req_b_tx, mut req_b_rx) = mpsc::unbounded_channel();
    producer_b.start(req_b_tx);
    consumer.register_to_producer_controller(producer_b.clone());

    let next = req_b_rx.recv().await.expect("request next from producer b");
    next.send_next_to.message("b1".to_string(), false);

    let delivery = tokio::time::timeout(Duration::from_secs(2), delivery_rx.recv())
        .await
        .expect("delivery within timeout")
        .expect("delivery channel open");
    assert_eq!(delivery.producer_id, "p-rebind-b");
    assert_eq!(delivery.seq_nr, 1);
    assert_eq!(delivery.msg, "b1");
    delivery.confirm_to.confirmed(1);

    // Nothing further arrives: no stray retransmit from the abandoned
    // producer A, no duplicate of b1.
    let extra = tokio::time::timeout(Duration::from_millis(200), delivery_rx.recv()).await;
    assert!(extra.is_err(), "no delivery should follow the handoff's single b1 message");
}
