#[derive(Debug, thiserror::Error)]
pub enum DlrLookupdError {
    #[error(transparent)]
    Bus(#[from] jasmin_bus::BusError),
}
