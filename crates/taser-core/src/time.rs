use crate::Real;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed-open time interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeInterval {
    pub start: Real,
    pub end: Real,
}

impl TimeInterval {
    pub fn new(start: Real, end: Real) -> Self {
        Self { start, end }
    }

    /// Returns `true` if `start <= t < end`.
    pub fn contains(&self, t: Real) -> bool {
        t >= self.start && t < self.end
    }

    pub fn duration(&self) -> Real {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// `n` evenly spaced samples starting at `start`, excluding `end`.
    pub fn linspace(&self, n: usize) -> Vec<Real> {
        let step = self.duration() / n.max(1) as Real;
        (0..n).map(|i| self.start + step * i as Real).collect()
    }
}

impl fmt::Display for TimeInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_is_closed_open() {
        let iv = TimeInterval::new(1.0, 2.0);
        assert!(iv.contains(1.0));
        assert!(iv.contains(1.999));
        assert!(!iv.contains(2.0));
        assert!(!iv.contains(0.5));
    }

    #[test]
    fn linspace_excludes_end() {
        let ts = TimeInterval::new(0.0, 1.0).linspace(4);
        assert_eq!(ts, vec![0.0, 0.25, 0.5, 0.75]);
        assert!(ts.iter().all(|t| TimeInterval::new(0.0, 1.0).contains(*t)));
    }
}
