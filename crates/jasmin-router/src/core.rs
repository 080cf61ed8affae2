//! The Router Core's dependencies bundled into one handle (§4.2, §4.7):
//! the UCS for credentials/routes, the hot store for DLR correlation and
//! reassembly, the message bus for publish, and the submit-admission
//! defaults that seed newly admitted messages.

use jasmin_bus::MessageBus;
use jasmin_conf::SubmitDefaults;
use jasmin_store::HotStore;
use jasmin_ucs::UserCredentialStore;

use crate::bound_sessions::BoundSessionRegistry;

#[derive(Clone)]
pub struct RouterCore {
    pub ucs: UserCredentialStore,
    pub store: HotStore,
    pub bus: std::sync::Arc<MessageBus>,
    pub submit_defaults: SubmitDefaults,
    /// `jasmin-smppd`'s bound downstream sessions, addressable by
    /// `system_id` for the throwers (§4.8). Not a constructor parameter:
    /// it starts empty for every `RouterCore` and is populated entirely
    /// through bind/unbind side effects, not at construction time.
    pub bound_sessions: BoundSessionRegistry,
}

impl RouterCore {
    pub fn new(
        ucs: UserCredentialStore,
        store: HotStore,
        bus: std::sync::Arc<MessageBus>,
        submit_defaults: SubmitDefaults,
    ) -> Self {
        Self {
            ucs,
            store,
            bus,
            submit_defaults,
            bound_sessions: BoundSessionRegistry::new(),
        }
    }
}
