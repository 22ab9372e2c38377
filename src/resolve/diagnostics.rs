use std::ops::AddAssign;

use serde::Serialize;

/// Row-level anomalies of one call. None of these stop the call; callers
/// decide whether the counts are acceptable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Diagnostics {
    /// Source rows whose code has no crosswalk entry.
    pub unmapped: usize,
    /// Rows dropped because a disbursement target is not a known code.
    pub unknown_disbursement_targets: usize,
    /// Unallocated-bucket rows excluded on request.
    pub excluded_unallocated: usize,
    /// Pooled rows split across their targets.
    pub disbursed: usize,
    /// Rows rewritten to a current code.
    pub relabeled: usize,
    /// Rows whose code has no population figure.
    pub missing_population: usize,
}

impl Diagnostics {
    /// Rows that do not reach a destination. Unmapped rows kept with a
    /// null destination are included.
    pub fn dropped(&self) -> usize {
        self.unmapped + self.unknown_disbursement_targets + self.excluded_unallocated
    }
}

impl AddAssign for Diagnostics {
    fn add_assign(&mut self, other: Self) {
        self.unmapped += other.unmapped;
        self.unknown_disbursement_targets += other.unknown_disbursement_targets;
        self.excluded_unallocated += other.excluded_unallocated;
        self.disbursed += other.disbursed;
        self.relabeled += other.relabeled;
        self.missing_population += other.missing_population;
    }
}
