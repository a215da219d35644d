/// Deterministic attempt budgeting for bounded sampling loops.
///
/// Budgets are expressed in attempts rather than wall-clock time, so every
/// rejection-sampling stage terminates after the same number of draws on every
/// run, regardless of machine speed.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct AttemptBudget {
    limit: u64,
    used: u64,
}

impl AttemptBudget {
    pub fn new(limit: u64) -> Self {
        Self { limit, used: 0 }
    }

    /// `max(floor, per_unit * units)`, the usual shape of a stage budget.
    pub fn scaled(floor: u64, per_unit: f64, units: usize) -> Self {
        let scaled = (per_unit * units as f64).floor().max(0.0) as u64;
        Self::new(floor.max(scaled))
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn used(&self) -> u64 {
        self.used
    }

    pub fn remaining(&self) -> u64 {
        self.limit - self.used
    }

    pub fn is_exhausted(&self) -> bool {
        self.used >= self.limit
    }

    /// Attempts to spend one attempt.
    ///
    /// Returns `true` if the budget still had an attempt left.
    pub fn try_consume(&mut self) -> bool {
        if self.used >= self.limit {
            return false;
        }
        self.used += 1;
        true
    }
}
