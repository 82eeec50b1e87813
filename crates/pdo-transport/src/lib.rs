//! pdo-transport: fieldbus process-data transport abstractions
//!
//! This crate provides the [`FieldBus`] trait through which a cyclic loop pulls one
//! process-data frame per device per bus cycle, with feature-gated backends. The default
//! build enables a `mock` backend of simulated drives and a `replay` backend that plays
//! back text captures, so binaries can compile and run on any host without a bus master.

mod types;
pub use types::{BusInfo, DeviceId, PdoFrame, Timestamp};

mod error;
pub use error::{Result, TransportError};

mod traits;
pub use traits::FieldBus;

#[cfg(feature = "mock")]
mod mock;

#[cfg(feature = "mock")]
pub use mock::{MockBus, MOCK_FRAME_LEN};

#[cfg(feature = "replay")]
mod replay;

#[cfg(feature = "replay")]
pub use replay::{format_capture_line, parse_capture_line, ReplayBus};
