use crate::{BusInfo, DeviceId, PdoFrame, Result};

/// A minimal blocking fieldbus interface delivering cyclic process data.
pub trait FieldBus {
    /// Open a bus by name (e.g., "mock0", or a capture path for replay).
    fn open(name: &str) -> Result<Self>
    where
        Self: Sized;

    /// Attempt to list available buses for this backend.
    fn list() -> Result<Vec<BusInfo>>;

    /// Identifiers of the devices currently exchanging process data.
    fn devices(&self) -> Vec<DeviceId>;

    /// Run one bus cycle and return the input frame of every device.
    fn read_cycle(&mut self) -> Result<Vec<PdoFrame>>;
}
