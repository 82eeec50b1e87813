use crate::{
    decode_frame, Clock, DeviceId, MetricsHub, Result, SystemClock, TelemetryError,
    TelemetryMetrics, TelemetryRecord,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};
use tracing::{debug, trace};

const SLOTS: usize = 1 << u8::BITS;

type Slot = RwLock<Option<TelemetryRecord>>;

/// Latest telemetry record per device.
///
/// Storage is partitioned per device id, one lock per slot, so ingests for
/// different devices never contend and a reader always copies out a whole
/// record. Share it between the cyclic writer and readers through an `Arc`.
pub struct TelemetryRegistry<C: Clock = SystemClock> {
    slots: Box<[Slot; SLOTS]>,
    known: AtomicUsize,
    clock: C,
    metrics: Option<TelemetryMetrics>,
}

/// Outcome of ingesting one bus cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub ingested: usize,
    pub rejected: Vec<(DeviceId, TelemetryError)>,
}

impl CycleReport {
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }
}

impl TelemetryRegistry<SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for TelemetryRegistry<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> TelemetryRegistry<C> {
    pub fn with_clock(clock: C) -> Self {
        Self {
            slots: Box::new(std::array::from_fn(|_| RwLock::new(None))),
            known: AtomicUsize::new(0),
            clock,
            metrics: None,
        }
    }

    /// Report ingests and decode failures to `hub`.
    pub fn with_metrics(mut self, hub: &MetricsHub) -> Self {
        self.metrics = Some(hub.telemetry.clone());
        self
    }

    /// Decode `buffer` and publish it as the latest record of `device_id`.
    ///
    /// On a decode error nothing is stored and the previous record, if any,
    /// stays published.
    pub fn ingest(&self, device_id: DeviceId, buffer: &[u8]) -> Result<()> {
        let data = match decode_frame(buffer) {
            Ok(data) => data,
            Err(e) => {
                debug!(device_id, error = %e, "frame rejected");
                if let Some(m) = &self.metrics {
                    m.decode_failures.inc();
                }
                return Err(e);
            }
        };

        let mut slot = self.slot(device_id).write().unwrap_or_else(PoisonError::into_inner);
        let now = self.clock.now_nanos();
        let (timestamp, first) = match slot.as_ref() {
            Some(prev) => (now.max(prev.timestamp), false),
            None => (now, true),
        };
        *slot = Some(TelemetryRecord::new(device_id, timestamp, data));
        drop(slot);

        if first {
            let known = self.known.fetch_add(1, Ordering::Relaxed) + 1;
            debug!(device_id, known, "device published");
            if let Some(m) = &self.metrics {
                m.known_devices.inc();
            }
        }
        if let Some(m) = &self.metrics {
            m.ingested_frames.inc();
        }
        trace!(device_id, timestamp, "telemetry updated");
        Ok(())
    }

    /// Copy of the latest record of `device_id`.
    pub fn get(&self, device_id: DeviceId) -> Result<TelemetryRecord> {
        let slot = self.slot(device_id).read().unwrap_or_else(PoisonError::into_inner);
        (*slot).ok_or(TelemetryError::NotFound(device_id))
    }

    pub fn contains(&self, device_id: DeviceId) -> bool {
        self.get(device_id).is_ok()
    }

    /// Device ids with a published record, ascending.
    pub fn known_devices(&self) -> Vec<DeviceId> {
        self.snapshot().iter().map(|r| r.device_id).collect()
    }

    /// Latest record of every known device, ascending by id.
    ///
    /// Each record is consistent on its own; records of different devices may
    /// come from different cycles.
    pub fn snapshot(&self) -> Vec<TelemetryRecord> {
        let mut out = Vec::with_capacity(self.len());
        for slot in self.slots.iter() {
            if let Some(rec) = *slot.read().unwrap_or_else(PoisonError::into_inner) {
                out.push(rec);
            }
        }
        out
    }

    pub fn len(&self) -> usize {
        self.known.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slot(&self, device_id: DeviceId) -> &Slot {
        &self.slots[usize::from(device_id)]
    }
}

#[cfg(feature = "transport")]
impl<C: Clock> TelemetryRegistry<C> {
    pub fn ingest_frame(&self, frame: &pdo_transport::PdoFrame) -> Result<()> {
        self.ingest(frame.device_id, &frame.data)
    }

    /// Ingest every frame of a bus cycle, collecting failures instead of stopping.
    pub fn ingest_cycle(&self, frames: &[pdo_transport::PdoFrame]) -> CycleReport {
        let mut report = CycleReport::default();
        for frame in frames {
            match self.ingest_frame(frame) {
                Ok(()) => report.ingested += 1,
                Err(e) => report.rejected.push((frame.device_id, e)),
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{encode_frame, ManualClock, ProcessData, FRAME_LEN};
    use std::sync::Arc;
    use std::thread;

    fn data(seed: i32) -> ProcessData {
        ProcessData {
            status_word: seed as u16,
            actual_position: seed * 1_000,
            actual_velocity: -seed,
            actual_torque: seed as i16,
            mode_display: seed as u8,
            error_code: (seed as u16).wrapping_mul(3),
            system_status: (seed as u16).wrapping_mul(7),
            motor_temperature: seed as f32 + 0.25,
        }
    }

    #[test]
    fn test_concrete_scenario() {
        let registry = TelemetryRegistry::new();
        let expected = ProcessData {
            status_word: 0x1234,
            actual_position: 1_000_000,
            actual_velocity: -50_000,
            actual_torque: 100,
            mode_display: 0x08,
            error_code: 0,
            system_status: 0x00FF,
            motor_temperature: 45.5,
        };
        registry.ingest(1, &encode_frame(&expected)).unwrap();

        let rec = registry.get(1).unwrap();
        assert_eq!(rec.data, expected);
        assert_eq!(rec.data.motor_temperature.to_bits(), 45.5f32.to_bits());
        assert_eq!(rec.device_id, 1);
        assert!(rec.data_valid);
        assert!(rec.timestamp > 0);
    }

    #[test]
    fn test_unknown_device_not_found() {
        let registry = TelemetryRegistry::new();
        assert_eq!(registry.get(7), Err(TelemetryError::NotFound(7)));
        assert!(!registry.contains(7));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_overwrite_keeps_only_second_frame() {
        let registry = TelemetryRegistry::new();
        registry.ingest(3, &encode_frame(&data(1))).unwrap();
        registry.ingest(3, &encode_frame(&data(2))).unwrap();
        let rec = registry.get(3).unwrap();
        assert_eq!(rec.data, data(2));
        assert_eq!(rec.device_id, 3);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_isolation_between_devices() {
        let registry = TelemetryRegistry::new();
        for id in 0..=u8::MAX {
            registry.ingest(id, &encode_frame(&data(i32::from(id)))).unwrap();
        }
        assert_eq!(registry.len(), SLOTS);
        for id in 0..=u8::MAX {
            let rec = registry.get(id).unwrap();
            assert_eq!(rec.device_id, id);
            assert_eq!(rec.data, data(i32::from(id)));
        }
        let ids = registry.known_devices();
        assert_eq!(ids.first(), Some(&0));
        assert_eq!(ids.last(), Some(&u8::MAX));
    }

    #[test]
    fn test_failed_ingest_keeps_last_known_good() {
        let registry = TelemetryRegistry::new();
        registry.ingest(5, &encode_frame(&data(9))).unwrap();
        let before = registry.get(5).unwrap();

        let err = registry.ingest(5, &[0u8; 10]).unwrap_err();
        assert_eq!(
            err,
            TelemetryError::InsufficientData {
                needed: FRAME_LEN,
                got: 10
            }
        );
        assert_eq!(registry.get(5).unwrap(), before);
    }

    #[test]
    fn test_failed_ingest_does_not_create_entry() {
        let registry = TelemetryRegistry::new();
        assert!(registry.ingest(6, &[]).is_err());
        assert_eq!(registry.get(6), Err(TelemetryError::NotFound(6)));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_timestamps_follow_clock() {
        let clock = Arc::new(ManualClock::new(1_000));
        let registry = TelemetryRegistry::with_clock(Arc::clone(&clock));
        registry.ingest(1, &encode_frame(&data(1))).unwrap();
        let first = registry.get(1).unwrap().timestamp;
        clock.advance(250);
        registry.ingest(1, &encode_frame(&data(2))).unwrap();
        let second = registry.get(1).unwrap().timestamp;
        assert_eq!(first, 1_000);
        assert_eq!(second, 1_250);
    }

    #[test]
    fn test_timestamp_never_goes_backwards() {
        let clock = Arc::new(ManualClock::new(5_000));
        let registry = TelemetryRegistry::with_clock(Arc::clone(&clock));
        registry.ingest(1, &encode_frame(&data(1))).unwrap();
        clock.set(4_000);
        registry.ingest(1, &encode_frame(&data(2))).unwrap();
        assert_eq!(registry.get(1).unwrap().timestamp, 5_000);

        // Other devices see the stepped clock as-is.
        registry.ingest(2, &encode_frame(&data(3))).unwrap();
        assert_eq!(registry.get(2).unwrap().timestamp, 4_000);
    }

    #[test]
    fn test_sequential_system_timestamps_non_decreasing() {
        let registry = TelemetryRegistry::new();
        registry.ingest(1, &encode_frame(&data(1))).unwrap();
        let first = registry.get(1).unwrap().timestamp;
        registry.ingest(1, &encode_frame(&data(2))).unwrap();
        let second = registry.get(1).unwrap().timestamp;
        assert!(second >= first);
    }

    #[test]
    fn test_metrics_track_ingest() {
        let hub = MetricsHub::new().unwrap();
        let registry = TelemetryRegistry::new().with_metrics(&hub);
        registry.ingest(1, &encode_frame(&data(1))).unwrap();
        registry.ingest(1, &encode_frame(&data(2))).unwrap();
        registry.ingest(2, &encode_frame(&data(3))).unwrap();
        let _ = registry.ingest(3, &[1, 2, 3]);
        assert_eq!(hub.telemetry.ingested_frames.get(), 3);
        assert_eq!(hub.telemetry.decode_failures.get(), 1);
        assert_eq!(hub.telemetry.known_devices.get(), 2);
    }

    #[test]
    fn test_concurrent_readers_never_see_torn_records() {
        let registry = Arc::new(TelemetryRegistry::new());
        // Every field of frame `n` is derived from `n`, so a mix is detectable.
        let frame = |n: i32| encode_frame(&data(n));
        registry.ingest(1, &frame(0)).unwrap();

        let writer = {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                for n in 1..2_000 {
                    registry.ingest(1, &frame(n)).unwrap();
                }
            })
        };
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    let mut last_ts = 0;
                    for _ in 0..2_000 {
                        let rec = registry.get(1).unwrap();
                        let n = rec.data.actual_position / 1_000;
                        assert_eq!(rec.data, data(n));
                        assert!(rec.timestamp >= last_ts);
                        last_ts = rec.timestamp;
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for r in readers {
            r.join().unwrap();
        }
        assert_eq!(registry.get(1).unwrap().data, data(1_999));
    }

    #[test]
    fn test_concurrent_writers_on_distinct_devices() {
        let registry = Arc::new(TelemetryRegistry::new());
        let handles: Vec<_> = (0u8..8)
            .map(|id| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    for n in 0..500 {
                        registry
                            .ingest(id, &encode_frame(&data(i32::from(id) * 10_000 + n)))
                            .unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(registry.len(), 8);
        for id in 0u8..8 {
            assert_eq!(
                registry.get(id).unwrap().data,
                data(i32::from(id) * 10_000 + 499)
            );
        }
    }

    #[test]
    fn test_known_devices_gauge_under_concurrent_first_ingest() {
        let hub = MetricsHub::new().unwrap();
        let registry = Arc::new(TelemetryRegistry::new().with_metrics(&hub));
        let handles: Vec<_> = (0u8..16)
            .map(|id| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || registry.ingest(id, &encode_frame(&data(1))).unwrap())
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(registry.len(), 16);
        assert_eq!(hub.telemetry.known_devices.get(), 16);
        assert_eq!(hub.telemetry.ingested_frames.get(), 16);
    }

    #[cfg(feature = "transport")]
    mod bus {
        use super::*;
        use pdo_transport::{FieldBus, MockBus, PdoFrame};

        #[test]
        fn test_ingest_cycle_reports_rejections() {
            let registry = TelemetryRegistry::new();
            let frames = vec![
                PdoFrame::new(1, &encode_frame(&data(1))),
                PdoFrame::new(2, &[0u8; 4]),
                PdoFrame::new(3, &encode_frame(&data(3))),
            ];
            let report = registry.ingest_cycle(&frames);
            assert_eq!(report.ingested, 2);
            assert!(!report.is_clean());
            assert_eq!(
                report.rejected,
                vec![(
                    2,
                    TelemetryError::InsufficientData {
                        needed: FRAME_LEN,
                        got: 4
                    }
                )]
            );
            assert_eq!(registry.known_devices(), vec![1, 3]);
        }

        #[test]
        fn test_mock_bus_cycles_publish() {
            let registry = TelemetryRegistry::new();
            let mut bus = MockBus::with_devices("mock0", &[1, 2]).with_short_frame_every(3);
            for _ in 0..3 {
                let frames = bus.read_cycle().unwrap();
                registry.ingest_cycle(&frames);
            }
            // Third cycle truncated device 1, so it still shows cycle two.
            assert_eq!(registry.get(1).unwrap().data.actual_position, 2_000);
            assert_eq!(registry.get(2).unwrap().data.actual_position, 6_000);
            assert_eq!(registry.get(2).unwrap().data.status_word, 0x0237);
        }

        #[test]
        fn test_mock_frames_follow_wire_layout() {
            let mut bus = MockBus::with_devices("mock0", &[3]);
            let frames = bus.read_cycle().unwrap();
            let expected = ProcessData {
                status_word: 0x0237,
                actual_position: 3_000,
                actual_velocity: 3_000,
                actual_torque: 30,
                mode_display: 0x08,
                error_code: 0,
                system_status: 0x00FF,
                motor_temperature: 33.0f32 + 0.01,
            };
            assert_eq!(frames[0].data, encode_frame(&expected).to_vec());
        }
    }
}
