//! The deliver_sm and dlr throwers (§4.4): two stateless consumers of the
//! message bus that forward classified MO messages and delivery receipts
//! to their HTTP or SMPP subscribers. Neither thrower holds durable state
//! of its own; everything it needs rides on the envelope/notification it
//! consumes, or lives in the UCS snapshot / bound-session registry it
//! shares with the rest of the gateway.

pub mod context;
pub mod deliver_sm;
pub mod dlr;
pub mod error;

pub use context::ThrowerContext;
pub use error::ThrowerError;
