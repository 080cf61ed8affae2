//! The HTTP submission surface (§6): `/ping`, `/send`, `/rate`,
//! `/balance` over the Router Core, served behind an axum router with
//! `serve`/`handlers`/`state` split the way a small axum gateway usually
//! is.

pub mod error;
pub mod handlers;
pub mod serve;
pub mod state;

pub use serve::run;
pub use state::AppState;
