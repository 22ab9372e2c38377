//! Disbursement of known anomalous source codes.

mod preprocess;
mod rules;

pub use preprocess::Preprocessor;
pub use rules::{DisbursementPolicy, DisbursementRule, DisbursementRules, PoolTarget, ScopedRule};
