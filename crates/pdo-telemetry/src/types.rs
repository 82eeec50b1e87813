use serde::{Deserialize, Serialize};

/// Position of a slave on the bus.
pub type DeviceId = u8;

/// Input process data of one drive, exactly as carried on the wire.
///
/// `mode_display`, `error_code` and `system_status` are device specific and
/// passed through uninterpreted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProcessData {
    pub status_word: u16,
    pub actual_position: i32,
    pub actual_velocity: i32,
    pub actual_torque: i16,
    pub mode_display: u8,
    pub error_code: u16,
    pub system_status: u16,
    /// Non-finite readings serialise as their raw bits, e.g. `"0x7fc00000"`.
    #[serde(with = "raw_float")]
    pub motor_temperature: f32,
}

/// Finite floats as JSON numbers, everything else as a hex bit pattern string.
mod raw_float {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Value(f32),
        Bits(String),
    }

    pub fn serialize<S: Serializer>(v: &f32, s: S) -> Result<S::Ok, S::Error> {
        if v.is_finite() {
            s.serialize_f32(*v)
        } else {
            s.serialize_str(&format!("{:#010x}", v.to_bits()))
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<f32, D::Error> {
        match Repr::deserialize(d)? {
            Repr::Value(v) => Ok(v),
            Repr::Bits(s) => {
                let hex = s.strip_prefix("0x").ok_or_else(|| {
                    D::Error::custom(format!("expected 0x bit pattern, got {s:?}"))
                })?;
                u32::from_str_radix(hex, 16)
                    .map(f32::from_bits)
                    .map_err(D::Error::custom)
            }
        }
    }
}

/// Snapshot of one device's state as published by the registry.
///
/// Only ever built from a complete [`ProcessData`], so a record that exists is
/// fully populated. Serialises as a flat object.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    #[serde(flatten)]
    pub data: ProcessData,
    /// Ingestion time in nanoseconds since the Unix epoch.
    pub timestamp: u64,
    pub device_id: DeviceId,
    pub data_valid: bool,
}

impl TelemetryRecord {
    pub fn new(device_id: DeviceId, timestamp: u64, data: ProcessData) -> Self {
        Self {
            data,
            timestamp,
            device_id,
            data_valid: true,
        }
    }
}
