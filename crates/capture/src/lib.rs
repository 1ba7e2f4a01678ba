//! # Sensor Capture
//!
//! Acquisition side of the sensor MCU driver.
//!
//! Responsibilities:
//! - Open the device and enable its data stream
//! - Run one acquisition thread per device (read, decode, clock sync, publish)
//! - Keep the MCU streaming with periodic keep-alive pings
//! - Serve the latest sample of each kind to consumers with a bounded wait
//!
//! ## Usage Example
//!
//! ```ignore
//! use capture::{MockHidBackend, SensorCapture, SyntheticReports};
//! use contracts::CaptureConfig;
//!
//! let (backend, _probe) = MockHidBackend::synthetic(info, SyntheticReports::default(), Some(800.0));
//! let mut capture = SensorCapture::open(CaptureConfig::default(), &backend, None)?;
//!
//! while let Some(imu) = capture.get_last_imu(Duration::from_millis(50)) {
//!     // Process sample
//! }
//! capture.stop();
//! ```

mod acquisition;
mod error;
mod metrics;
mod mock;
mod replay;
mod session;
mod store;

pub use acquisition::{Acquisition, AcquisitionState, CycleOutcome, SharedState};
pub use error::{CaptureError, Result};
pub use metrics::CaptureMetrics;
pub use mock::{
    MockHidBackend, MockHidDevice, MockProbe, MockRead, REPORT_RATE_HZ, SyntheticReports,
    TICKS_PER_REPORT,
};
pub use replay::{ReplayHidBackend, write_dump};
pub use session::SensorCapture;
pub use store::{ChannelStore, LatestSlot};
