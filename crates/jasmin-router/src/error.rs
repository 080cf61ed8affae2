//! Router-local error folding: every failure mode this crate can hit maps
//! onto the shared `JasminError` taxonomy (§7) so the HTTP/SS edges need
//! only understand one enum.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RouterError {
    #[error(transparent)]
    Core(#[from] jasmin_proto::JasminError),

    #[error(transparent)]
    Ucs(#[from] jasmin_ucs::UcsError),

    #[error(transparent)]
    Store(#[from] jasmin_store::StoreError),

    #[error(transparent)]
    Bus(#[from] jasmin_bus::BusError),

    #[error("failed to encode PDU body: {0}")]
    Encoding(#[from] Box<bincode::ErrorKind>),
}

impl From<RouterError> for jasmin_proto::JasminError {
    fn from(err: RouterError) -> Self {
        match err {
            RouterError::Core(e) => e,
            other => jasmin_proto::JasminError::Transport {
                reason: other.to_string(),
            },
        }
    }
}
