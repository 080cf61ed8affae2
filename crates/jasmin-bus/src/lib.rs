//! The AMQP message fabric (§1 Message Bus): topology declaration,
//! publish/consume, the envelope headers every message carries, and the
//! reconnect/backoff policy shared with the SMPP Client Manager.

pub mod bus;
pub mod envelope;
pub mod error;
pub mod retry;
pub mod routing;

pub use bus::{MessageBus, REQUEUE_EXCHANGE};
pub use envelope::Envelope;
pub use error::BusError;
pub use retry::BackoffPolicy;
