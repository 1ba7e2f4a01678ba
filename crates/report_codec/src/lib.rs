//! # Report Codec
//!
//! Binary protocol of the camera's sensor MCU.
//!
//! - `RawReport`: packed 62-byte sensor report, parsed field by field
//! - `ReportDecoder`: raw integers to physical units, per firmware `ScalePolicy`
//! - feature payloads for stream control and keep-alive pings
//!
//! ```ignore
//! use report_codec::ReportDecoder;
//!
//! let decoder = ReportDecoder::for_firmware(info.firmware);
//! let decoded = decoder.decode(&bytes)?;
//! if let Some(imu) = decoded.imu {
//!     // ...
//! }
//! ```

mod decoder;
mod error;
mod feature;
pub mod layout;
mod report;

pub use decoder::{DecodedReport, ReportDecoder, ScalePolicy};
pub use error::{CodecError, Result};
pub use feature::{parse_stream_status, ping_request, stream_status_request};
pub use report::{ChannelMarker, RawReport};
