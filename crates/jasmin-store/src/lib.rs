//! Redis-backed hot store (§1 Hot Store): DLR correlation, concatenation
//! reassembly buffers, and per-user counters.

pub mod error;
pub mod keys;
pub mod store;

pub use error::StoreError;
pub use store::HotStore;
