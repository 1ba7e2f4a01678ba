//! Feature report payloads (stream control and keep-alive)

use bytes::Bytes;

use crate::error::{CodecError, Result};
use crate::layout::{CMD_PING, REPORT_ID_REQUEST_SET, REPORT_ID_STREAM_STATUS, STREAM_STATUS_LEN};

/// Payload enabling or disabling the sensor data stream
pub fn stream_status_request(enable: bool) -> [u8; STREAM_STATUS_LEN] {
    [REPORT_ID_STREAM_STATUS, u8::from(enable)]
}

/// Keep-alive payload; the MCU stops streaming when pings stop
pub fn ping_request() -> [u8; 2] {
    [REPORT_ID_REQUEST_SET, CMD_PING]
}

/// Parse the stream status read back from the device
pub fn parse_stream_status(data: &Bytes) -> Result<bool> {
    if data.len() < STREAM_STATUS_LEN {
        return Err(CodecError::TooShort {
            len: data.len(),
            expected: STREAM_STATUS_LEN,
        });
    }
    if data[0] != REPORT_ID_STREAM_STATUS {
        return Err(CodecError::UnexpectedReportId {
            expected: REPORT_ID_STREAM_STATUS,
            found: data[0],
        });
    }
    Ok(data[1] == 1)
}
