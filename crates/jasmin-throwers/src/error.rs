#[derive(Debug, thiserror::Error)]
pub enum ThrowerError {
    #[error(transparent)]
    Bus(#[from] jasmin_bus::BusError),
    #[error("failed to decode notification body: {0}")]
    Decode(#[from] Box<bincode::ErrorKind>),
}
