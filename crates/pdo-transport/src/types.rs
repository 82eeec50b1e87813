use core::fmt;
use time::OffsetDateTime;

/// Position of a slave on the bus.
pub type DeviceId = u8;

/// One device's input process data for one bus cycle.
///
/// The payload is opaque to the transport: length and content are whatever the
/// device (or capture) delivered and must be validated by the consumer.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PdoFrame {
    pub device_id: DeviceId,
    pub data: Vec<u8>,
    pub timestamp: Option<Timestamp>,
}

impl PdoFrame {
    pub fn new(device_id: DeviceId, data: &[u8]) -> Self {
        Self {
            device_id,
            data: data.to_vec(),
            timestamp: None,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl fmt::Display for PdoFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dev {:>3} [{}]", self.device_id, self.data.len())?;
        for b in &self.data {
            write!(f, " {b:02X}")?;
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Timestamp(pub OffsetDateTime);

#[derive(Clone, Debug)]
pub struct BusInfo {
    pub name: String,
    pub driver: String,
}
