//! The collaborators one accepted ESME session needs, bundled the way
//! `jasmin-scm::SessionContext` bundles a connector session's (§4.8).

use jasmin_router::RouterCore;
use jasmin_ucs::UserCredentialStore;

#[derive(Clone)]
pub struct SmppdContext {
    pub ucs: UserCredentialStore,
    pub router: RouterCore,
}
