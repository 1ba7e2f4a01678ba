//! Drift-scale estimation from paired sync timestamps.
//!
//! Pairs are kept in one ring so the host and MCU sides are always pushed
//! and cleared together.

use std::fmt;

use contracts::ClockSyncConfig;
use ringbuf::{traits::*, HeapRb};
use tracing::warn;

/// Host steady time and computed MCU timestamp captured at one sync event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncPair {
    pub host_ns: u64,
    pub mcu_ns: u64,
}

/// Drift estimator
///
/// Collects `capacity` pairs, then derives one multiplicative scale update
/// from the slope between a first and the last pair and starts over.
pub struct DriftEstimator {
    pairs: HeapRb<SyncPair>,
    capacity: usize,
    steady_first_index: usize,
    warmup_adjustments: u32,
    scale_min: f64,
    scale_max: f64,
    adjustments: u32,
}

impl fmt::Debug for DriftEstimator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriftEstimator")
            .field("len", &self.pairs.occupied_len())
            .field("capacity", &self.capacity)
            .field("adjustments", &self.adjustments)
            .finish()
    }
}

impl DriftEstimator {
    pub fn new(config: &ClockSyncConfig) -> Self {
        let capacity = config.queue_capacity.max(2);
        Self {
            pairs: HeapRb::new(capacity),
            capacity,
            steady_first_index: config.steady_first_index.min(capacity - 2),
            warmup_adjustments: config.warmup_adjustments,
            scale_min: config.scale_min,
            scale_max: config.scale_max,
            adjustments: 0,
        }
    }

    /// Record a pair; returns the clamped scale update once the queue is full
    pub fn push(&mut self, pair: SyncPair) -> Option<f64> {
        let _ = self.pairs.try_push(pair);
        if !self.pairs.is_full() {
            return None;
        }

        let first_index = self.first_index();
        let first = self.pairs.iter().nth(first_index).copied();
        let last = self.pairs.iter().last().copied();
        self.pairs.clear();

        let (first, last) = first.zip(last)?;
        let host_span = (last.host_ns as i128 - first.host_ns as i128) as f64;
        let mcu_span = (last.mcu_ns as i128 - first.mcu_ns as i128) as f64;
        if mcu_span == 0.0 {
            warn!(first_index, "sync pairs span no MCU time, skipping scale update");
            return None;
        }

        let update = (host_span / mcu_span).clamp(self.scale_min, self.scale_max);
        self.adjustments += 1;
        Some(update)
    }

    /// Midpoint during warm-up, the configured steady index afterwards
    fn first_index(&self) -> usize {
        if self.adjustments <= self.warmup_adjustments {
            self.capacity / 2
        } else {
            self.steady_first_index
        }
    }

    pub fn len(&self) -> usize {
        self.pairs.occupied_len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn adjustments(&self) -> u32 {
        self.adjustments
    }
}
