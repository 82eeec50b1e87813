use crate::{ProcessData, Result, TelemetryError};

/// Minimum length of a drive input frame.
pub const FRAME_LEN: usize = 21;

// Byte offsets of the input image; all multi-byte fields are little-endian.
pub(crate) const STATUS_WORD: usize = 0;
pub(crate) const ACTUAL_POSITION: usize = 2;
pub(crate) const ACTUAL_VELOCITY: usize = 6;
pub(crate) const ACTUAL_TORQUE: usize = 10;
pub(crate) const MODE_DISPLAY: usize = 12;
pub(crate) const ERROR_CODE: usize = 13;
pub(crate) const SYSTEM_STATUS: usize = 15;
pub(crate) const MOTOR_TEMPERATURE: usize = 17;

/// Decode one device's input frame.
///
/// Fails with [`TelemetryError::InsufficientData`] if `data` is shorter than
/// [`FRAME_LEN`]; bytes past the last field are ignored. Every bit pattern of a
/// long-enough frame is a valid decode.
pub fn decode_frame(data: &[u8]) -> Result<ProcessData> {
    if data.len() < FRAME_LEN {
        return Err(TelemetryError::InsufficientData {
            needed: FRAME_LEN,
            got: data.len(),
        });
    }
    let r = FieldReader(data);
    Ok(ProcessData {
        status_word: u16::from_le_bytes(r.bytes(STATUS_WORD)?),
        actual_position: i32::from_le_bytes(r.bytes(ACTUAL_POSITION)?),
        actual_velocity: i32::from_le_bytes(r.bytes(ACTUAL_VELOCITY)?),
        actual_torque: i16::from_le_bytes(r.bytes(ACTUAL_TORQUE)?),
        mode_display: u8::from_le_bytes(r.bytes(MODE_DISPLAY)?),
        error_code: u16::from_le_bytes(r.bytes(ERROR_CODE)?),
        system_status: u16::from_le_bytes(r.bytes(SYSTEM_STATUS)?),
        motor_temperature: f32::from_le_bytes(r.bytes(MOTOR_TEMPERATURE)?),
    })
}

/// Checked fixed-width reads out of a frame.
struct FieldReader<'a>(&'a [u8]);

impl FieldReader<'_> {
    fn bytes<const N: usize>(&self, offset: usize) -> Result<[u8; N]> {
        let end = offset + N;
        self.0
            .get(offset..end)
            .and_then(|s| <[u8; N]>::try_from(s).ok())
            .ok_or(TelemetryError::InsufficientData {
                needed: end,
                got: self.0.len(),
            })
    }
}
