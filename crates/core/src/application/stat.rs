// Concurrency statistics - windowed poll-yield observations

use std::collections::VecDeque;

/// Fixed-capacity sliding window of poll-yield samples. Owned by one worker;
/// fed and read only from that worker's scheduler task.
///
/// Each sample is `messages_received / batch_size` for one completed receive,
/// so the window mean approximates how full recent batches ran. The ceiling
/// scales the configured maximum by that mean: an idle queue decays toward
/// the minimum, a saturated one ramps toward the maximum.
#[derive(Debug)]
pub struct ConcurrencyStat {
    window: VecDeque<f64>,
    capacity: usize,
}

impl ConcurrencyStat {
    pub fn new(capacity: usize) -> Self {
        Self {
            window: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Record one poll-yield sample, evicting the oldest beyond capacity
    pub fn record(&mut self, sample: f64) {
        if self.window.len() == self.capacity {
            self.window.pop_front();
        }
        self.window.push_back(sample);
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    /// Mean of the window; `None` until the first sample lands
    pub fn mean(&self) -> Option<f64> {
        if self.window.is_empty() {
            return None;
        }
        Some(self.window.iter().sum::<f64>() / self.window.len() as f64)
    }

    /// Admission ceiling: `round(max * mean)` clamped to at least `min`;
    /// `min` while the window is empty. A heuristic signal, not a hard
    /// limit - the pool itself stays bounded by `max`.
    pub fn ceiling(&self, min: usize, max: usize) -> usize {
        match self.mean() {
            None => min,
            Some(mean) => {
                let scaled = (max as f64 * mean).round() as usize;
                scaled.max(min)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_window_yields_min() {
        let stat = ConcurrencyStat::new(100);
        assert_eq!(stat.ceiling(2, 50), 2);
    }

    #[test]
    fn test_ceiling_scales_max_by_mean() {
        let mut stat = ConcurrencyStat::new(100);
        // mean 0.5 over two samples
        stat.record(0.2);
        stat.record(0.8);
        assert_eq!(stat.ceiling(1, 10), 5);
    }

    #[test]
    fn test_ceiling_rounds_half_up() {
        let mut stat = ConcurrencyStat::new(100);
        stat.record(0.25);
        assert_eq!(stat.ceiling(1, 10), 3); // 2.5 rounds away from zero
    }

    #[test]
    fn test_ceiling_clamps_to_min() {
        let mut stat = ConcurrencyStat::new(100);
        stat.record(0.0);
        assert_eq!(stat.ceiling(3, 10), 3);
    }

    #[test]
    fn test_ceiling_is_idempotent_for_unchanged_window() {
        let mut stat = ConcurrencyStat::new(100);
        stat.record(0.7);
        stat.record(0.3);
        let first = stat.ceiling(1, 8);
        let second = stat.ceiling(1, 8);
        assert_eq!(first, second);
    }

    #[test]
    fn test_window_evicts_oldest_at_capacity() {
        let mut stat = ConcurrencyStat::new(3);
        stat.record(1.0);
        stat.record(1.0);
        stat.record(1.0);
        stat.record(0.0); // evicts one of the 1.0 samples
        assert_eq!(stat.len(), 3);
        let mean = stat.mean().unwrap();
        assert!((mean - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_full_batches_ramp_to_max() {
        let mut stat = ConcurrencyStat::new(100);
        for _ in 0..20 {
            stat.record(1.0);
        }
        assert_eq!(stat.ceiling(1, 16), 16);
    }
}
