//! The standalone DLR lookup daemon (§2.1 supplement): an optional
//! deployment topology that decouples DLR/MO correlation from the router
//! process, mirroring `jasmin/bin/dlrlookupd.py`'s own separate-process
//! model. Consumes raw deliver_sm PDUs off `dlr.lookup.#` and resolves
//! them through [`jasmin_router::RouterCore::handle_deliver`] — the exact
//! path an in-process SMPP Client Manager would otherwise call directly.
//! Additive: the in-process path is unchanged, this is an alternative
//! wiring for installations that want the decoupling.

pub mod consume;
pub mod error;
pub mod lock;

pub use error::DlrLookupdError;
pub use lock::InstanceLock;
