use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::geo::GeoId;
use super::{
    metric::{MetricKind, MetricTags},
    rows::AggregatedRow,
};

/// Running sums for one destination group.
#[derive(Debug, Default)]
struct Sums {
    additive: BTreeMap<String, f64>,
    /// `(Σ value·weight, Σ weight)` per weighted-mean metric.
    means: BTreeMap<String, (f64, f64)>,
}

impl Sums {
    fn add(&mut self, tags: &MetricTags, metrics: &BTreeMap<String, f64>, weight: f64) {
        for (name, kind) in tags.iter() {
            match kind {
                MetricKind::Additive => if let Some(v) = metrics.get(name) {
                    *self.additive.entry(name.to_string()).or_default() += v * weight;
                },
                // Recomputed from the additive components in `finish`.
                MetricKind::Rate { .. } => {}
                MetricKind::WeightedMean { weight: column } => {
                    // A missing value contributes no weight either.
                    if let (Some(v), Some(w)) = (metrics.get(name), metrics.get(column)) {
                        let acc = self.means.entry(name.to_string()).or_default();
                        acc.0 += v * w * weight;
                        acc.1 += w * weight;
                    }
                }
            }
        }
    }

    fn finish(self, tags: &MetricTags) -> BTreeMap<String, f64> {
        let mut out = self.additive;
        for (name, kind) in tags.iter() {
            let value = match kind {
                MetricKind::Additive => continue,
                MetricKind::Rate { numerator, denominator, scale } => {
                    match (out.get(numerator), out.get(denominator)) {
                        (Some(n), Some(d)) if *d != 0.0 => n / d * scale,
                        _ => continue,
                    }
                }
                MetricKind::WeightedMean { .. } => match self.means.get(name) {
                    Some(&(num, den)) if den != 0.0 => num / den,
                    _ => continue,
                },
            };
            out.insert(name.to_string(), value);
        }
        out
    }
}

/// Fan-in side of the join: groups weighted contributions by
/// `(destination, time)` and reduces them per metric kind.
#[derive(Debug)]
pub(crate) struct Accumulator<'a> {
    tags: &'a MetricTags,
    groups: BTreeMap<(GeoId, NaiveDate), Sums>,
}

impl<'a> Accumulator<'a> {
    pub(crate) fn new(tags: &'a MetricTags) -> Self {
        Self { tags, groups: BTreeMap::new() }
    }

    pub(crate) fn add(&mut self, dest: GeoId, time: NaiveDate, metrics: &BTreeMap<String, f64>, weight: f64) {
        self.groups.entry((dest, time)).or_default().add(self.tags, metrics, weight);
    }

    /// Reduce a single row on its own, for rows that bypass grouping.
    pub(crate) fn reduce_one(tags: &MetricTags, metrics: &BTreeMap<String, f64>) -> BTreeMap<String, f64> {
        let mut sums = Sums::default();
        sums.add(tags, metrics, 1.0);
        sums.finish(tags)
    }

    #[inline] pub(crate) fn len(&self) -> usize { self.groups.len() }

    /// Rows ordered by destination, then time.
    pub(crate) fn finish(self) -> Vec<AggregatedRow> {
        let tags = self.tags;
        self.groups.into_iter()
            .map(|((geo, time), sums)| AggregatedRow { geo: Some(geo), time, metrics: sums.finish(tags) })
            .collect()
    }
}
