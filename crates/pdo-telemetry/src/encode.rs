use crate::decode::{
    ACTUAL_POSITION, ACTUAL_TORQUE, ACTUAL_VELOCITY, ERROR_CODE, FRAME_LEN, MODE_DISPLAY,
    MOTOR_TEMPERATURE, STATUS_WORD, SYSTEM_STATUS,
};
use crate::ProcessData;

/// Lay out `data` as a drive input frame, the inverse of [`crate::decode_frame`].
pub fn encode_frame(data: &ProcessData) -> [u8; FRAME_LEN] {
    let mut out = [0u8; FRAME_LEN];
    put(&mut out, STATUS_WORD, &data.status_word.to_le_bytes());
    put(&mut out, ACTUAL_POSITION, &data.actual_position.to_le_bytes());
    put(&mut out, ACTUAL_VELOCITY, &data.actual_velocity.to_le_bytes());
    put(&mut out, ACTUAL_TORQUE, &data.actual_torque.to_le_bytes());
    put(&mut out, MODE_DISPLAY, &[data.mode_display]);
    put(&mut out, ERROR_CODE, &data.error_code.to_le_bytes());
    put(&mut out, SYSTEM_STATUS, &data.system_status.to_le_bytes());
    put(&mut out, MOTOR_TEMPERATURE, &data.motor_temperature.to_le_bytes());
    out
}

fn put(out: &mut [u8; FRAME_LEN], offset: usize, bytes: &[u8]) {
    // Offsets are compile-time constants inside the frame.
    if let Some(dst) = out.get_mut(offset..offset + bytes.len()) {
        dst.copy_from_slice(bytes);
    }
}
