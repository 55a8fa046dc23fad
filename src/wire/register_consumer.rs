use serde::{Deserialize, Serialize};

/// Wire form of a consumer registering itself with a producer
/// controller. `consumer_ref` is an opaque address for the underlying
/// transport; in-process the registration is carried out-of-band via
/// [`crate::transport::BoxedConsumerSend`] instead of this struct, which
/// exists so the wire format itself round-trips through serde (see the
/// wire/persistent round-trip tests).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegisterConsumer {
    pub consumer_ref: String,
}
