use std::collections::{btree_map::Entry, BTreeMap};

use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::{
    error::GeoError,
    geo::{GeoId, GeoType},
    resolve::{Diagnostics, MetricTags, SourceRow},
};
use super::rules::{DisbursementPolicy, DisbursementRule, DisbursementRules};

/// Rewrites rows whose code is a known anomaly before any crosswalk lookup:
/// pooled codes are split, superseded codes relabelled, and unallocated
/// buckets optionally excluded. Rows that end up sharing `(code, time)` are
/// merged.
///
/// Without a destination every rule applies regardless of its scope.
pub struct Preprocessor<'a> {
    rules: &'a DisbursementRules,
    tags: &'a MetricTags,
    policy: DisbursementPolicy,
    exclude_unallocated: bool,
    destination: Option<GeoType>,
}

impl<'a> Preprocessor<'a> {
    pub fn new(rules: &'a DisbursementRules, tags: &'a MetricTags) -> Self {
        Self { rules, tags, policy: DisbursementPolicy::default(), exclude_unallocated: false, destination: None }
    }

    pub fn policy(mut self, policy: DisbursementPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Drop unallocated-bucket rows; set when the call computes rates.
    pub fn exclude_unallocated(mut self, exclude: bool) -> Self {
        self.exclude_unallocated = exclude;
        self
    }

    /// Only apply rules scoped to re-keying into `to`.
    pub fn destination(mut self, to: GeoType) -> Self {
        self.destination = Some(to);
        self
    }

    pub fn preprocess(&self, rows: Vec<SourceRow>, from: GeoType) -> Result<(Vec<SourceRow>, Diagnostics), GeoError> {
        let mut diag = Diagnostics::default();
        let mut out = Vec::with_capacity(rows.len());

        for row in rows {
            if row.geo.ty() != from {
                return Err(GeoError::KindMismatch { expected: from, found: row.geo.ty() });
            }
            let rule = match self.destination {
                Some(to) => self.rules.get_for(&row.geo, to),
                None => self.rules.get(&row.geo),
            };
            match rule {
                None => out.push(row),
                Some(rule @ DisbursementRule::Pool(_)) => {
                    let Some(targets) = self.targets(rule, from) else {
                        diag.unknown_disbursement_targets += 1;
                        continue;
                    };
                    diag.disbursed += 1;
                    out.extend(targets.into_iter().map(|(geo, share)| self.split(&row, geo, share)));
                }
                Some(rule @ DisbursementRule::Relabel(_)) => {
                    let Some(mut targets) = self.targets(rule, from) else {
                        diag.unknown_disbursement_targets += 1;
                        continue;
                    };
                    diag.relabeled += 1;
                    let (geo, _) = targets.remove(0);
                    out.push(SourceRow { geo, ..row });
                }
            }
        }

        if self.exclude_unallocated {
            let before = out.len();
            out.retain(|row| !row.geo.is_unallocated());
            diag.excluded_unallocated = before - out.len();
        }

        if diag.unknown_disbursement_targets > 0 {
            warn!(rows = diag.unknown_disbursement_targets, "dropped rows with unknown disbursement targets");
        }
        debug!(disbursed = diag.disbursed, relabeled = diag.relabeled,
            excluded = diag.excluded_unallocated, "preprocessed rows");

        Ok((self.merge(out), diag))
    }

    /// Parsed targets with their shares, or `None` if any target is not a
    /// valid code of the source kind. Targets the crosswalk lacks are kept;
    /// the join counts them as unmapped.
    fn targets(&self, rule: &DisbursementRule, from: GeoType) -> Option<Vec<(GeoId, f64)>> {
        rule.shares(self.policy).into_iter()
            .map(|(code, share)| GeoId::parse(from, code).ok().map(|geo| (geo, share)))
            .collect()
    }

    /// Additive metrics take their share; everything else is copied.
    fn split(&self, row: &SourceRow, geo: GeoId, share: f64) -> SourceRow {
        let metrics = row.metrics.iter()
            .map(|(name, &value)| {
                let value = if self.tags.is_additive(name) { value * share } else { value };
                (name.clone(), value)
            })
            .collect();
        SourceRow { geo, time: row.time, metrics }
    }

    /// Sum additive metrics of rows sharing `(code, time)`; other metrics
    /// keep the first value seen.
    fn merge(&self, rows: Vec<SourceRow>) -> Vec<SourceRow> {
        let mut merged: BTreeMap<(GeoId, NaiveDate), SourceRow> = BTreeMap::new();
        for row in rows {
            match merged.entry((row.geo.clone(), row.time)) {
                Entry::Vacant(slot) => { slot.insert(row); }
                Entry::Occupied(mut slot) => {
                    let existing = slot.get_mut();
                    for (name, value) in row.metrics {
                        let additive = self.tags.is_additive(&name);
                        existing.metrics.entry(name)
                            .and_modify(|v| if additive { *v += value })
                            .or_insert(value);
                    }
                }
            }
        }
        merged.into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> NaiveDate { NaiveDate::from_ymd_opt(2020, 6, 1).unwrap() }

    fn row(code: &str, val: f64) -> SourceRow {
        SourceRow::new(GeoId::parse(GeoType::Fips, code).unwrap(), day()).with("val", val)
    }

    fn values(rows: &[SourceRow]) -> Vec<(String, f64)> {
        rows.iter().map(|r| (r.geo.id().to_string(), r.get("val").unwrap())).collect()
    }

    #[test]
    fn pooled_counts_merge_into_targets() {
        let rules = DisbursementRules::empty()
            .pool(GeoType::Fips, "51620", &["51093", "51175"]).unwrap();
        let tags = MetricTags::new().additive("val");
        let (rows, diag) = Preprocessor::new(&rules, &tags)
            .preprocess(vec![row("51093", 3.0), row("51175", 2.0), row("51620", 4.0)], GeoType::Fips)
            .unwrap();
        assert_eq!(values(&rows), vec![("51093".into(), 5.0), ("51175".into(), 4.0)]);
        assert_eq!(diag.disbursed, 1);
    }

    #[test]
    fn equal_split_across_three() {
        let rules = DisbursementRules::empty()
            .pool(GeoType::Fips, "00001", &["36061", "36005", "36047"]).unwrap();
        let tags = MetricTags::new().additive("val");
        let (rows, _) = Preprocessor::new(&rules, &tags)
            .preprocess(vec![row("00001", 12.0)], GeoType::Fips)
            .unwrap();
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|r| r.get("val") == Some(4.0)));
        assert!(rows.iter().all(|r| r.geo.id() != "00001"));
    }

    #[test]
    fn weighted_policy_and_non_additive_copy() {
        let rules = DisbursementRules::empty()
            .pool_weighted(GeoType::Fips, "51620", &[("51093", 0.75), ("51175", 0.25)]).unwrap();
        let tags = MetricTags::new().additive("val");
        let src = row("51620", 8.0).with("ratio", 0.3);
        let (rows, _) = Preprocessor::new(&rules, &tags)
            .policy(DisbursementPolicy::Weighted)
            .preprocess(vec![src], GeoType::Fips)
            .unwrap();
        assert_eq!(values(&rows), vec![("51093".into(), 6.0), ("51175".into(), 2.0)]);
        assert!(rows.iter().all(|r| r.get("ratio") == Some(0.3)));
    }

    #[test]
    fn relabels_without_changing_values() {
        let rules = DisbursementRules::builtin().unwrap();
        let tags = MetricTags::new().additive("val");
        let (rows, diag) = Preprocessor::new(&rules, &tags)
            .preprocess(vec![row("02158", 7.0)], GeoType::Fips)
            .unwrap();
        assert_eq!(values(&rows), vec![("02270".into(), 7.0)]);
        assert_eq!(diag.relabeled, 1);
    }

    #[test]
    fn unknown_targets_drop_the_row() {
        let rules = DisbursementRules::empty()
            .pool(GeoType::Fips, "51620", &["51093", "5117"]).unwrap();
        let tags = MetricTags::new().additive("val");
        let (rows, diag) = Preprocessor::new(&rules, &tags)
            .preprocess(vec![row("51620", 4.0), row("51093", 1.0)], GeoType::Fips)
            .unwrap();
        assert_eq!(values(&rows), vec![("51093".into(), 1.0)]);
        assert_eq!(diag.unknown_disbursement_targets, 1);
    }

    #[test]
    fn rules_only_apply_to_their_destinations() {
        let rules = DisbursementRules::builtin().unwrap();
        let tags = MetricTags::new().additive("val");
        let input = || vec![row("28039", 7.0), row("00001", 5.0)];

        let (county, diag) = Preprocessor::new(&rules, &tags)
            .destination(GeoType::Fips)
            .preprocess(input(), GeoType::Fips)
            .unwrap();
        assert!(county.iter().any(|r| r.geo.id() == "28039" && r.get("val") == Some(7.0)));
        assert!(county.iter().all(|r| r.geo.id() != "00001"));
        assert_eq!(diag.disbursed, 1);

        let (msa, diag) = Preprocessor::new(&rules, &tags)
            .destination(GeoType::Msa)
            .preprocess(input(), GeoType::Fips)
            .unwrap();
        assert!(msa.iter().all(|r| r.geo.id() != "28039"));
        let to_28059 = msa.iter().find(|r| r.geo.id() == "28059").unwrap();
        assert!((to_28059.get("val").unwrap() - 2.0).abs() < 1e-12);
        assert_eq!(diag.disbursed, 2);
    }

    #[test]
    fn unallocated_buckets_excluded_on_request() {
        let rules = DisbursementRules::empty();
        let tags = MetricTags::new().additive("val");
        let input = || vec![row("36000", 5.0), row("36061", 1.0)];

        let (kept, diag) = Preprocessor::new(&rules, &tags).preprocess(input(), GeoType::Fips).unwrap();
        assert_eq!(kept.len(), 2);
        assert_eq!(diag.excluded_unallocated, 0);

        let (rows, diag) = Preprocessor::new(&rules, &tags)
            .exclude_unallocated(true)
            .preprocess(input(), GeoType::Fips)
            .unwrap();
        assert_eq!(values(&rows), vec![("36061".into(), 1.0)]);
        assert_eq!(diag.excluded_unallocated, 1);
    }

    #[test]
    fn rejects_rows_of_another_kind() {
        let rules = DisbursementRules::empty();
        let tags = MetricTags::new();
        let zip = SourceRow::new(GeoId::parse(GeoType::Zip, "10001").unwrap(), day());
        let err = Preprocessor::new(&rules, &tags).preprocess(vec![zip], GeoType::Fips).unwrap_err();
        assert!(matches!(err, GeoError::KindMismatch { .. }));
    }
}
