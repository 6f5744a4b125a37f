//! Resolution schedule for the feature map.

use serde::{Deserialize, Serialize};

/// Linearly interpolates the per-dimension bin count over the evaluation
/// budget, so the archive starts coarse and refines as evidence accumulates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LinearMapSizer {
    start: usize,
    end: usize,
}

impl LinearMapSizer {
    /// A schedule from `start` to `end` bins per dimension.
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Resolution before any evaluations.
    pub fn start_size(&self) -> usize {
        self.start
    }

    /// Resolution once the budget is exhausted.
    pub fn end_size(&self) -> usize {
        self.end
    }

    /// Resolution at the given fraction of the evaluation budget, rounded to
    /// the nearest whole bin count. Portions past the budget clamp to the
    /// final size.
    pub fn size_at(&self, portion: f64) -> usize {
        let portion = portion.clamp(0.0, 1.0);
        let size = self.start as f64 + (self.end as f64 - self.start as f64) * portion;
        size.round() as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interpolates_between_endpoints() {
        let sizer = LinearMapSizer::new(20, 50);
        assert_eq!(sizer.size_at(0.0), 20);
        assert_eq!(sizer.size_at(0.5), 35);
        assert_eq!(sizer.size_at(1.0), 50);
    }

    #[test]
    fn test_clamps_past_the_budget() {
        let sizer = LinearMapSizer::new(20, 50);
        assert_eq!(sizer.size_at(1.5), 50);
        assert_eq!(sizer.size_at(-0.25), 20);
    }

    #[test]
    fn test_schedule_is_monotone() {
        let sizer = LinearMapSizer::new(10, 100);
        let mut last = 0;
        for step in 0..=20 {
            let size = sizer.size_at(step as f64 / 20.0);
            assert!(size >= last);
            last = size;
        }
        assert_eq!(last, 100);
    }

    #[test]
    fn test_rounds_to_the_nearest_bin_count() {
        let sizer = LinearMapSizer::new(10, 20);
        // 10 + 10 * 0.55 = 15.5 rounds up.
        assert_eq!(sizer.size_at(0.55), 16);
        assert_eq!(sizer.size_at(0.54), 15);
    }
}
