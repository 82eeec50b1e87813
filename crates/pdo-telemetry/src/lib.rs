//! pdo-telemetry: decoding and publication of cyclic drive process data
//!
//! Raw input frames handed over by the bus transport are decoded by
//! [`decode_frame`] into [`ProcessData`] and published per device by the
//! [`TelemetryRegistry`], which stamps every record with its ingestion time.
//! The `transport` feature (default) adds helpers that ingest whole
//! `pdo_transport` bus cycles.

mod types;
pub use types::*;

mod error;
pub use error::{Result, TelemetryError};

mod decode;
pub use decode::{decode_frame, FRAME_LEN};

mod encode;
pub use encode::encode_frame;

mod clock;
pub use clock::{Clock, ManualClock, SystemClock};

mod registry;
pub use registry::{CycleReport, TelemetryRegistry};

mod metrics;
pub use metrics::{MetricsHub, TelemetryMetrics};

mod config;
pub use config::{load_config_file, parse_config, BackendKind, MonitorConfig};
