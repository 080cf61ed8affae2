//! The SMPP Server adapter (§4.8): accepts inbound ESME binds,
//! authenticates them against UCS SMPPs credentials, and converts their
//! submit_sm traffic into the same admission path HTTP `/send` uses.
//! The wire transport itself sits behind [`link::ServerTransport`] /
//! [`link::ServerLink`], mirroring the seam `jasmin-scm` draws on the
//! client side.

pub mod context;
pub mod error;
pub mod link;
pub mod listener;
pub mod session;

pub use context::SmppdContext;
pub use error::SmppdError;
