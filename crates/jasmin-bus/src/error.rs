//! Bus-layer errors, kept distinct from `jasmin_proto::JasminError` since
//! they're transport failures the caller maps to `JasminError::Transport`
//! rather than router/charging semantics.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BusError {
    #[error("failed to connect to AMQP broker: {0}")]
    Connect(#[source] lapin::Error),

    #[error("failed to open AMQP channel: {0}")]
    Channel(#[source] lapin::Error),

    #[error("failed to declare bus topology: {0}")]
    Topology(#[source] lapin::Error),

    #[error("failed to publish message: {0}")]
    Publish(#[source] lapin::Error),

    #[error("failed to start consumer: {0}")]
    Consume(#[source] lapin::Error),
}

impl From<BusError> for jasmin_proto::JasminError {
    fn from(err: BusError) -> Self {
        jasmin_proto::JasminError::Transport {
            reason: err.to_string(),
        }
    }
}
