//! Shared state handed to every handler: the Router Core wrapped for axum
//! extraction.

use jasmin_router::RouterCore;

#[derive(Clone)]
pub struct AppState {
    pub router: RouterCore,
}
