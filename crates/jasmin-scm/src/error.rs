use jasmin_proto::JasminError;

use crate::link::LinkError;

#[derive(Debug, thiserror::Error)]
pub enum ScmError {
    #[error(transparent)]
    Link(#[from] LinkError),
    #[error(transparent)]
    Bus(#[from] jasmin_bus::BusError),
    #[error(transparent)]
    Store(#[from] jasmin_store::StoreError),
    #[error(transparent)]
    Ucs(#[from] jasmin_ucs::UcsError),
    #[error("connector {0} is not registered")]
    UnknownConnector(String),
    #[error("connector {0} is already started")]
    AlreadyStarted(String),
    #[error("failed to encode or decode PDU body: {0}")]
    Encoding(#[from] Box<bincode::ErrorKind>),
}

impl From<ScmError> for JasminError {
    fn from(err: ScmError) -> Self {
        JasminError::Transport { reason: err.to_string() }
    }
}
