use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::GeoError;

/// How a metric behaves when rows are re-keyed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum MetricKind {
    /// Counts and other extensive quantities: apportioned by crosswalk
    /// weight, then summed.
    Additive,
    /// `numerator / denominator * scale`, recomputed from the aggregated
    /// components. Never apportioned.
    Rate { numerator: String, denominator: String, scale: f64 },
    /// `Σ(value·weight)/Σ(weight)`, for quantities that are already rates
    /// and have no raw components.
    WeightedMean { weight: String },
}

/// Metric name to kind. Metrics without a tag are dropped by the resolver.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricTags {
    tags: BTreeMap<String, MetricKind>,
}

impl MetricTags {
    pub fn new() -> Self { Self::default() }

    pub fn additive(mut self, name: &str) -> Self {
        self.tags.insert(name.to_string(), MetricKind::Additive);
        self
    }

    pub fn rate(mut self, name: &str, numerator: &str, denominator: &str, scale: f64) -> Self {
        self.tags.insert(name.to_string(), MetricKind::Rate {
            numerator: numerator.to_string(),
            denominator: denominator.to_string(),
            scale,
        });
        self
    }

    pub fn weighted_mean(mut self, name: &str, weight: &str) -> Self {
        self.tags.insert(name.to_string(), MetricKind::WeightedMean { weight: weight.to_string() });
        self
    }

    #[inline]
    pub fn get(&self, name: &str) -> Option<&MetricKind> { self.tags.get(name) }

    #[inline]
    pub fn is_additive(&self, name: &str) -> bool {
        matches!(self.tags.get(name), Some(MetricKind::Additive))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetricKind)> {
        self.tags.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Whether any rate or weighted mean reads `column`.
    pub fn references(&self, column: &str) -> bool {
        self.tags.values().any(|kind| match kind {
            MetricKind::Additive => false,
            MetricKind::Rate { numerator, denominator, .. } => numerator == column || denominator == column,
            MetricKind::WeightedMean { weight } => weight == column,
        })
    }

    /// Rate components and mean weights must themselves be additive, or
    /// there is nothing to recompute from.
    pub fn validate(&self) -> Result<(), GeoError> {
        let require_additive = |metric: &str, column: &str| {
            if self.is_additive(column) { return Ok(()) }
            Err(GeoError::InvalidMetricTags(format!(
                "{metric:?} reads {column:?}, which is not tagged additive"
            )))
        };
        for (name, kind) in &self.tags {
            match kind {
                MetricKind::Additive => {}
                MetricKind::Rate { numerator, denominator, scale } => {
                    require_additive(name, numerator)?;
                    require_additive(name, denominator)?;
                    if !scale.is_finite() || *scale == 0.0 {
                        return Err(GeoError::InvalidMetricTags(format!("{name:?} has scale {scale}")));
                    }
                }
                MetricKind::WeightedMean { weight } => require_additive(name, weight)?,
            }
        }
        Ok(())
    }
}
