//! Channel Store - one latest-value slot per data kind
//!
//! The acquisition thread overwrites a slot on every qualifying report;
//! consumers wait for the slot's new-value flag with a bound. Each slot has
//! its own lock, so a slow IMU reader never delays environmental readers.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use contracts::{CamTempSample, EnvSample, ImuSample, MagSample, Sample, SampleStatus};

/// Single-slot latest-value cell
///
/// The new-value flag is the sample's own status: `NewValue` until taken,
/// `Valid` afterwards.
#[derive(Debug)]
pub struct LatestSlot<T: Sample> {
    value: Mutex<T>,
    fresh: Condvar,
}

impl<T: Sample> Default for LatestSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Sample> LatestSlot<T> {
    pub fn new() -> Self {
        Self {
            value: Mutex::new(T::default()),
            fresh: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, T> {
        self.value.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Overwrite the slot and mark it new
    pub fn publish(&self, mut sample: T) {
        sample.set_status(SampleStatus::NewValue);
        *self.lock() = sample;
        self.fresh.notify_all();
    }

    /// Wait up to `timeout` for an unread value
    ///
    /// Returns a copy and clears the new-value flag, or `None` once the bound
    /// elapses with nothing new.
    pub fn take(&self, timeout: Duration) -> Option<T> {
        let guard = self.lock();
        let (mut guard, _) = self
            .fresh
            .wait_timeout_while(guard, timeout, |value| {
                value.status() != SampleStatus::NewValue
            })
            .unwrap_or_else(PoisonError::into_inner);

        if guard.status() != SampleStatus::NewValue {
            return None;
        }
        let sample = guard.clone();
        guard.set_status(SampleStatus::Valid);
        Some(sample)
    }

    /// Current contents without consuming the new-value flag
    pub fn peek(&self) -> T {
        self.lock().clone()
    }

    pub fn has_new(&self) -> bool {
        self.lock().status() == SampleStatus::NewValue
    }
}

/// The four per-kind slots of one device
#[derive(Debug, Default)]
pub struct ChannelStore {
    pub imu: LatestSlot<ImuSample>,
    pub mag: LatestSlot<MagSample>,
    pub env: LatestSlot<EnvSample>,
    pub cam_temp: LatestSlot<CamTempSample>,
}

impl ChannelStore {
    pub fn new() -> Self {
        Self::default()
    }
}
