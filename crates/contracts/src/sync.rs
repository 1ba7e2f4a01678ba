//! SyncSnapshot - Clock synchronizer diagnostics
//!
//! Read-only copy of the synchronizer estimate, published once per report
//! cycle for observers outside the acquisition thread.

use serde::{Deserialize, Serialize};

/// Clock synchronizer snapshot
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SyncSnapshot {
    /// Drift-scale factor (host duration / MCU duration)
    pub scale: f64,

    /// Host-to-video offset (ns), subtracted from every timestamp
    pub video_offset_ns: i64,

    /// Scale adjustments applied so far
    pub adjustments: u32,

    /// Samples waiting in the paired queues
    pub pending_pairs: usize,

    /// Frame-sync events observed
    pub sync_events: u64,

    /// Ticks that went backwards and were re-anchored
    pub tick_discontinuities: u64,

    /// Origin has been anchored
    pub anchored: bool,

    /// Last emitted timestamp (ns)
    pub last_timestamp_ns: Option<u64>,
}

impl Default for SyncSnapshot {
    fn default() -> Self {
        Self {
            scale: 1.0,
            video_offset_ns: 0,
            adjustments: 0,
            pending_pairs: 0,
            sync_events: 0,
            tick_discontinuities: 0,
            anchored: false,
            last_timestamp_ns: None,
        }
    }
}

/// Frame-synchronization fields of one report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameSyncInfo {
    /// Report coincides with a camera frame
    pub frame_sync: bool,

    /// Running count of frame-sync pulses seen by the MCU
    pub frame_sync_count: u32,

    /// Non-zero when the firmware supports video/sensor sync
    pub sync_capabilities: u8,
}

impl FrameSyncInfo {
    pub fn is_supported(&self) -> bool {
        self.sync_capabilities != 0
    }
}

/// Drift in parts-per-million implied by a scale factor
pub fn scale_to_ppm(scale: f64) -> f64 {
    (scale - 1.0) * 1e6
}
