use crate::{BusInfo, DeviceId, FieldBus, PdoFrame, Result, Timestamp, TransportError};
use std::collections::VecDeque;
use std::fs;
use time::OffsetDateTime;

/// Plays back a text capture of process data, one cycle per `read_cycle` call.
///
/// Capture format, one frame per line:
///
/// ```text
/// # cycle device bytes
/// 1 1 3412 40420f00 b03cffff 6400 08 0000 ff00 00003642
/// 1 2 ...
/// ```
///
/// Hex bytes may be split over any number of whitespace-separated groups.
/// Lines sharing a cycle number must be contiguous.
pub struct ReplayBus {
    name: String,
    devices: Vec<DeviceId>,
    cycles: VecDeque<Vec<PdoFrame>>,
}

impl ReplayBus {
    pub fn from_capture(name: &str, text: &str) -> Result<Self> {
        let mut cycles: VecDeque<Vec<PdoFrame>> = VecDeque::new();
        let mut current: Option<u64> = None;
        let mut devices: Vec<DeviceId> = Vec::new();
        for line in text.lines() {
            let Some((cycle, frame)) = parse_capture_line(line)? else {
                continue;
            };
            if !devices.contains(&frame.device_id) {
                devices.push(frame.device_id);
            }
            if current == Some(cycle) {
                if let Some(frames) = cycles.back_mut() {
                    frames.push(frame);
                    continue;
                }
            }
            current = Some(cycle);
            cycles.push_back(vec![frame]);
        }
        devices.sort_unstable();
        tracing::info!(
            capture = name,
            cycles = cycles.len(),
            devices = devices.len(),
            "replay capture loaded"
        );
        Ok(Self {
            name: name.to_string(),
            devices,
            cycles,
        })
    }

    pub fn remaining_cycles(&self) -> usize {
        self.cycles.len()
    }
}

/// Parse one capture line into `(cycle, frame)`; blank lines and `#` comments yield `None`.
pub fn parse_capture_line(line: &str) -> Result<Option<(u64, PdoFrame)>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let mut parts = line.split_whitespace();
    let cycle = parts
        .next()
        .and_then(|s| s.parse::<u64>().ok())
        .ok_or(TransportError::InvalidFrame("cycle"))?;
    let device_id = parts
        .next()
        .and_then(|s| s.parse::<DeviceId>().ok())
        .ok_or(TransportError::InvalidFrame("device id"))?;
    let mut data = Vec::with_capacity(32);
    for group in parts {
        if group.len() % 2 != 0 {
            return Err(TransportError::InvalidFrame("odd hex length"));
        }
        for pair in group.as_bytes().chunks(2) {
            let byte = u8::from_str_radix(
                std::str::from_utf8(pair).map_err(|_| TransportError::InvalidFrame("utf8"))?,
                16,
            )
            .map_err(|_| TransportError::InvalidFrame("byte"))?;
            data.push(byte);
        }
    }
    Ok(Some((cycle, PdoFrame::new(device_id, &data))))
}

/// Render a frame as one capture line, the inverse of [`parse_capture_line`].
pub fn format_capture_line(cycle: u64, frame: &PdoFrame) -> String {
    let mut line = format!("{cycle} {} ", frame.device_id);
    for b in &frame.data {
        let _ = core::fmt::Write::write_fmt(&mut line, format_args!("{b:02x}"));
    }
    line.trim_end().to_string()
}

impl FieldBus for ReplayBus {
    fn open(path: &str) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => TransportError::InterfaceNotFound(path.to_string()),
            _ => TransportError::Io(e.to_string()),
        })?;
        Self::from_capture(path, &text)
    }

    fn list() -> Result<Vec<BusInfo>> {
        Err(TransportError::Unsupported(
            "replay captures are opened by path",
        ))
    }

    fn devices(&self) -> Vec<DeviceId> {
        self.devices.clone()
    }

    fn read_cycle(&mut self) -> Result<Vec<PdoFrame>> {
        let mut frames = self.cycles.pop_front().ok_or(TransportError::EndOfCapture)?;
        let now = Timestamp(OffsetDateTime::now_utc());
        for frame in &mut frames {
            frame.timestamp = Some(now);
        }
        tracing::trace!(capture = %self.name, frames = frames.len(), "replay cycle");
        Ok(frames)
    }
}
