//! The User & Credential Store (§3 Group/User/Connector/Route data model,
//! §4.6 admin surface, §3.1 persistence): the single source of truth every
//! other daemon in the workspace reads through `jasmin-router`'s admin
//! client or the in-process store directly.

pub mod admin;
pub mod error;
pub mod snapshot;
pub mod state;
pub mod store;

pub use error::UcsError;
pub use state::UcsState;
pub use store::UserCredentialStore;
