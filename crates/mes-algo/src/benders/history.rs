use serde::{Deserialize, Serialize};

use super::solution::PlanningSolution;

/// Below this magnitude of the best upper bound the gap is absolute.
const ABSOLUTE_GAP_THRESHOLD: f64 = 1e-10;

/// Bound, time and solution histories of a run.
///
/// Entry `k` of every vector belongs to iteration `k + 1`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunHistory {
    /// Lower bounds; non-decreasing.
    pub lb: Vec<f64>,
    /// Upper bounds of the evaluated solutions; may fluctuate.
    pub ub: Vec<f64>,
    /// Running minimum of `ub`.
    pub ub_best: Vec<f64>,
    pub cpu_time: Vec<f64>,
    pub gamma: Vec<f64>,
    pub solutions: Vec<PlanningSolution>,
    best: Option<usize>,
}

impl RunHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one iteration. Returns `true` if `upper_bound` improved on the
    /// best upper bound so far, making `solution` the new incumbent.
    pub fn record_iteration(
        &mut self,
        master_lower_bound: f64,
        upper_bound: f64,
        cpu_time: f64,
        gamma: f64,
        solution: PlanningSolution,
    ) -> bool {
        let lb = self.lower_bound().max(master_lower_bound);
        let previous_best = self.best_upper_bound();
        let improved = upper_bound < previous_best;

        self.lb.push(lb);
        self.ub.push(upper_bound);
        self.ub_best.push(previous_best.min(upper_bound));
        self.cpu_time.push(cpu_time);
        self.gamma.push(gamma);
        self.solutions.push(solution);
        if improved {
            self.best = Some(self.solutions.len() - 1);
        }
        improved
    }

    pub fn iterations(&self) -> usize {
        self.lb.len()
    }

    pub fn lower_bound(&self) -> f64 {
        self.lb.last().copied().unwrap_or(f64::NEG_INFINITY)
    }

    pub fn best_upper_bound(&self) -> f64 {
        self.ub_best.last().copied().unwrap_or(f64::INFINITY)
    }

    /// Solution with the minimal upper bound so far.
    pub fn incumbent(&self) -> Option<&PlanningSolution> {
        self.best.and_then(|idx| self.solutions.get(idx))
    }

    /// `(UB_best − LB)/|UB_best|`, absolute when `|UB_best|` is near zero and
    /// `+∞` while no finite upper bound is known.
    pub fn gap(&self) -> f64 {
        let ub = self.best_upper_bound();
        let lb = self.lower_bound();
        if !ub.is_finite() || !lb.is_finite() {
            return f64::INFINITY;
        }
        if ub.abs() < ABSOLUTE_GAP_THRESHOLD {
            ub - lb
        } else {
            (ub - lb) / ub.abs()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn point(value: f64) -> PlanningSolution {
        PlanningSolution {
            lower_bound: 0.0,
            fixed_cost: value,
            values: BTreeMap::from([("capacity".to_string(), value)]),
            theta: vec![0.0],
        }
    }

    #[test]
    fn test_lower_bound_never_decreases() {
        let mut history = RunHistory::new();
        history.record_iteration(5.0, 20.0, 0.1, 0.0, point(1.0));
        history.record_iteration(4.0, 18.0, 0.2, 0.0, point(2.0));
        history.record_iteration(7.0, 19.0, 0.3, 0.0, point(3.0));
        assert_eq!(history.lb, vec![5.0, 5.0, 7.0]);
    }

    #[test]
    fn test_incumbent_tracks_minimal_upper_bound() {
        let mut history = RunHistory::new();
        assert!(history.incumbent().is_none());
        assert!(!history.record_iteration(0.0, f64::INFINITY, 0.1, 0.0, point(1.0)));
        assert!(history.incumbent().is_none());
        assert!(history.record_iteration(1.0, 12.0, 0.2, 0.0, point(2.0)));
        assert!(!history.record_iteration(2.0, 15.0, 0.3, 0.0, point(3.0)));

        assert_eq!(history.ub_best, vec![f64::INFINITY, 12.0, 12.0]);
        assert_eq!(history.incumbent().unwrap().values["capacity"], 2.0);
    }

    #[test]
    fn test_gap_rules() {
        let mut history = RunHistory::new();
        assert_eq!(history.gap(), f64::INFINITY);

        history.record_iteration(9.0, 10.0, 0.1, 0.0, point(1.0));
        assert!((history.gap() - 0.1).abs() < 1e-12);

        let mut near_zero = RunHistory::new();
        near_zero.record_iteration(-0.5, 0.0, 0.1, 0.0, point(1.0));
        assert_eq!(near_zero.gap(), 0.5);
    }
}
