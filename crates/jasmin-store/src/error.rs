use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("redis connection pool error: {0}")]
    Pool(#[from] deadpool_redis::PoolError),

    #[error("failed to build redis connection pool: {0}")]
    CreatePool(#[from] deadpool_redis::CreatePoolError),

    #[error("redis command error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("failed to (de)serialize hot store record: {0}")]
    Serde(#[from] serde_json::Error),
}

impl From<StoreError> for jasmin_proto::JasminError {
    fn from(err: StoreError) -> Self {
        jasmin_proto::JasminError::Transport {
            reason: err.to_string(),
        }
    }
}
