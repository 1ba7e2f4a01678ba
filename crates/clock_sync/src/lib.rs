//! # Clock Sync
//!
//! MCU tick to host timestamp conversion.
//!
//! Responsibilities:
//! - anchor the MCU timeline on the host wall clock
//! - drift-scale re-estimation from frame-sync events
//! - host/video offset correction
//!
//! ## Usage Example
//!
//! ```ignore
//! use clock_sync::ClockSynchronizer;
//!
//! let mut sync = ClockSynchronizer::new(&config.clock, video_clock);
//! if let Some(ts) = sync.process(decoded.tick_ns, decoded.imu_valid(), decoded.sync) {
//!     imu.timestamp_ns = ts;
//! }
//! ```

mod clock;
mod drift;
mod offset;
mod synchronizer;

pub use clock::{HostClock, ManualHostClock, SystemHostClock};
pub use contracts::{ClockSyncConfig, FrameSyncInfo, SyncSnapshot};
pub use drift::{DriftEstimator, SyncPair};
pub use offset::OffsetAccumulator;
pub use synchronizer::ClockSynchronizer;
