//! # Contracts
//!
//! Frozen interface contracts shared by every crate of the sensor driver.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Time Model
//! - Every emitted timestamp is nanoseconds on the host clock (`u64`)
//! - MCU ticks are converted by the clock synchronizer before any sample leaves it

mod capture_config;
mod device;
mod error;
mod sample;
mod stats;
mod sync;
mod transport;

pub use capture_config::*;
pub use device::*;
pub use error::*;
pub use sample::*;
pub use stats::*;
pub use sync::*;
pub use transport::{HidBackend, HidDevice, TransportResult, VideoClock};
