use crate::{BusInfo, DeviceId, FieldBus, PdoFrame, Result, Timestamp, TransportError};
use time::OffsetDateTime;

/// Size of the drive input image the simulator emits.
pub const MOCK_FRAME_LEN: usize = 21;

// CiA 402 "operation enabled" and cyclic synchronous position mode
const STATUS_OP_ENABLED: u16 = 0x0237;
const MODE_CSP: u8 = 0x08;

#[derive(Clone, Debug)]
struct SimDrive {
    id: DeviceId,
    position: i32,
    velocity: i32,
    torque: i16,
    temperature: f32,
}

impl SimDrive {
    fn new(id: DeviceId) -> Self {
        Self {
            id,
            position: 0,
            velocity: 1_000 * i32::from(id),
            torque: 10 * i16::from(id),
            temperature: 30.0 + f32::from(id),
        }
    }

    fn step(&mut self) {
        self.position = self.position.wrapping_add(self.velocity);
        self.temperature = (self.temperature + 0.01).min(90.0);
    }

    // Layout is owned by `pdo_telemetry::encode_frame`; this crate sits below
    // it and cannot call it. pdo-telemetry tests compare the two byte for byte.
    fn input_image(&self) -> [u8; MOCK_FRAME_LEN] {
        let mut out = [0u8; MOCK_FRAME_LEN];
        out[0..2].copy_from_slice(&STATUS_OP_ENABLED.to_le_bytes());
        out[2..6].copy_from_slice(&self.position.to_le_bytes());
        out[6..10].copy_from_slice(&self.velocity.to_le_bytes());
        out[10..12].copy_from_slice(&self.torque.to_le_bytes());
        out[12] = MODE_CSP;
        // error_code stays zero
        out[15..17].copy_from_slice(&0x00FFu16.to_le_bytes());
        out[17..21].copy_from_slice(&self.temperature.to_le_bytes());
        out
    }
}

/// A simple in-process bus of simulated drives. Each bus instance is independent.
pub struct MockBus {
    name: String,
    drives: Vec<SimDrive>,
    cycle: u64,
    short_every: u64,
}

impl MockBus {
    pub fn with_devices(name: &str, ids: &[DeviceId]) -> Self {
        let mut ids = ids.to_vec();
        ids.sort_unstable();
        ids.dedup();
        Self {
            name: name.to_string(),
            drives: ids.into_iter().map(SimDrive::new).collect(),
            cycle: 0,
            short_every: 0,
        }
    }

    /// Truncate the first device's frame every `n` cycles (0 disables).
    pub fn with_short_frame_every(mut self, n: u64) -> Self {
        self.short_every = n;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }
}

impl FieldBus for MockBus {
    fn open(name: &str) -> Result<Self> {
        Ok(Self::with_devices(name, &[1, 2, 3]))
    }

    fn list() -> Result<Vec<BusInfo>> {
        Ok(vec![BusInfo {
            name: "mock0".to_string(),
            driver: "mock".to_string(),
        }])
    }

    fn devices(&self) -> Vec<DeviceId> {
        self.drives.iter().map(|d| d.id).collect()
    }

    fn read_cycle(&mut self) -> Result<Vec<PdoFrame>> {
        if self.drives.is_empty() {
            return Err(TransportError::InterfaceNotFound(format!(
                "{}: no devices",
                self.name
            )));
        }
        self.cycle += 1;
        let truncate = self.short_every > 0 && self.cycle % self.short_every == 0;
        let now = Timestamp(OffsetDateTime::now_utc());
        let mut frames = Vec::with_capacity(self.drives.len());
        for (i, drive) in self.drives.iter_mut().enumerate() {
            drive.step();
            let image = drive.input_image();
            let len = if truncate && i == 0 {
                MOCK_FRAME_LEN - 4
            } else {
                MOCK_FRAME_LEN
            };
            let mut frame = PdoFrame::new(drive.id, &image[..len]);
            frame.timestamp = Some(now);
            frames.push(frame);
        }
        tracing::trace!(
            bus = %self.name,
            cycle = self.cycle,
            frames = frames.len(),
            "mock cycle"
        );
        Ok(frames)
    }
}
