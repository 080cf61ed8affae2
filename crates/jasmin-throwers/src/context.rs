//! Collaborators a thrower task needs, bundled the way `RouterCore` and
//! `jasmin-scm`'s `SessionContext` bundle theirs.

use std::sync::Arc;
use std::time::Duration;

use jasmin_bus::MessageBus;
use jasmin_conf::ThrowerDefaults;
use jasmin_router::BoundSessionRegistry;
use jasmin_ucs::UserCredentialStore;

#[derive(Clone)]
pub struct ThrowerContext {
    pub bus: Arc<MessageBus>,
    pub ucs: UserCredentialStore,
    pub bound_sessions: BoundSessionRegistry,
    pub http: reqwest::Client,
    pub defaults: ThrowerDefaults,
}

impl ThrowerContext {
    pub fn new(bus: Arc<MessageBus>, ucs: UserCredentialStore, bound_sessions: BoundSessionRegistry, defaults: ThrowerDefaults) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(defaults.http_timeout_secs))
            .build()
            .expect("reqwest client builder never fails with only a timeout set");
        Self {
            bus,
            ucs,
            bound_sessions,
            http,
            defaults,
        }
    }
}
