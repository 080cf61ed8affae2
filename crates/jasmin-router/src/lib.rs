//! Router Core (§4.2, §4.5, §4.7): submit admission, deliver
//! classification, and failover/round-robin destination selection. Sits
//! behind both the HTTP API and the SMPP server adapter so `/send` and a
//! bound SMPP session share one admission path.

pub mod admission;
pub mod bound_sessions;
pub mod core;
pub mod deliver;
pub mod error;
pub mod failover;

pub use admission::{DlrRequest, DlrRequestOriginator, RateQuote, SubmitOutcome, SubmitRequest};
pub use bound_sessions::{BoundSessionError, BoundSessionRegistry, SessionSender};
pub use core::RouterCore;
pub use deliver::{DeliverOutcome, DlrLookupPayload};
pub use error::RouterError;
pub use failover::pick_destination;
