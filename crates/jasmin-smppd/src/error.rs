use jasmin_proto::JasminError;

use crate::link::LinkError;

#[derive(Debug, thiserror::Error)]
pub enum SmppdError {
    #[error(transparent)]
    Link(#[from] LinkError),
    #[error(transparent)]
    Ucs(#[from] jasmin_ucs::UcsError),
    #[error(transparent)]
    Router(#[from] jasmin_router::RouterError),
}

impl From<SmppdError> for JasminError {
    fn from(err: SmppdError) -> Self {
        JasminError::Transport { reason: err.to_string() }
    }
}
