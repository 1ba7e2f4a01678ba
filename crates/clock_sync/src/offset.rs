//! Host/video offset averaging

/// Averages `window` signed discrepancies into one offset correction
#[derive(Debug, Clone)]
pub struct OffsetAccumulator {
    window: u32,
    sum: i64,
    count: u32,
}

impl OffsetAccumulator {
    pub fn new(window: u32) -> Self {
        Self {
            window: window.max(1),
            sum: 0,
            count: 0,
        }
    }

    /// Add one discrepancy; returns the integer average when the window closes
    pub fn push(&mut self, discrepancy_ns: i64) -> Option<i64> {
        self.sum = self.sum.saturating_add(discrepancy_ns);
        self.count += 1;
        if self.count < self.window {
            return None;
        }
        let average = self.sum / i64::from(self.count);
        self.sum = 0;
        self.count = 0;
        Some(average)
    }

    pub fn pending(&self) -> u32 {
        self.count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_average_after_window() {
        let mut acc = OffsetAccumulator::new(3);
        assert_eq!(acc.push(10), None);
        assert_eq!(acc.push(20), None);
        assert_eq!(acc.push(31), Some(20));
        assert_eq!(acc.pending(), 0);
        assert_eq!(acc.push(5), None);
    }

    #[test]
    fn test_truncates_toward_zero() {
        let mut acc = OffsetAccumulator::new(3);
        acc.push(-1);
        acc.push(-1);
        assert_eq!(acc.push(0), Some(0));
    }
}
