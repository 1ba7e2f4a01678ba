//! Host clock sources
//!
//! The synchronizer reads two host clocks: the wall clock anchors the
//! timestamp origin, the steady clock timestamps frame-sync events.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Host clock readings in nanoseconds
pub trait HostClock: Send + Sync {
    /// Wall clock, ns since the Unix epoch
    fn system_ns(&self) -> u64;

    /// Monotonic clock, ns since an arbitrary fixed point
    fn steady_ns(&self) -> u64;
}

/// Operating-system clocks
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemHostClock;

fn steady_epoch() -> Instant {
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    *EPOCH.get_or_init(Instant::now)
}

impl HostClock for SystemHostClock {
    fn system_ns(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
            .unwrap_or(0)
    }

    fn steady_ns(&self) -> u64 {
        u64::try_from(steady_epoch().elapsed().as_nanos()).unwrap_or(u64::MAX)
    }
}

/// Hand-driven clock
///
/// Both readings move together; used to replay a synthetic timeline.
#[derive(Debug, Default)]
pub struct ManualHostClock {
    system_origin_ns: u64,
    now_ns: AtomicU64,
}

impl ManualHostClock {
    pub fn new(system_origin_ns: u64) -> Self {
        Self {
            system_origin_ns,
            now_ns: AtomicU64::new(0),
        }
    }

    /// Set elapsed host time
    pub fn set(&self, elapsed_ns: u64) {
        self.now_ns.store(elapsed_ns, Ordering::Release);
    }

    pub fn advance(&self, delta_ns: u64) {
        self.now_ns.fetch_add(delta_ns, Ordering::AcqRel);
    }
}

impl HostClock for ManualHostClock {
    fn system_ns(&self) -> u64 {
        self.system_origin_ns + self.now_ns.load(Ordering::Acquire)
    }

    fn steady_ns(&self) -> u64 {
        self.now_ns.load(Ordering::Acquire)
    }
}
