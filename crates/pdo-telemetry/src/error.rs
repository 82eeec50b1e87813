use crate::DeviceId;
use thiserror::Error;

pub type Result<T, E = TelemetryError> = core::result::Result<T, E>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TelemetryError {
    #[error("insufficient data: frame needs {needed} bytes, got {got}")]
    InsufficientData { needed: usize, got: usize },
    #[error("no telemetry for device {0}")]
    NotFound(DeviceId),
}
