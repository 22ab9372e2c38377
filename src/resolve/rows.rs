use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::geo::GeoId;

/// One observation keyed by a source geography. An absent metric is a
/// missing value and contributes nothing.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRow {
    pub geo: GeoId,
    pub time: NaiveDate,
    pub metrics: BTreeMap<String, f64>,
}

impl SourceRow {
    pub fn new(geo: GeoId, time: NaiveDate) -> Self {
        Self { geo, time, metrics: BTreeMap::new() }
    }

    /// Builder-style metric setter.
    pub fn with(mut self, name: &str, value: f64) -> Self {
        self.metrics.insert(name.to_string(), value);
        self
    }

    #[inline]
    pub fn get(&self, name: &str) -> Option<f64> { self.metrics.get(name).copied() }
}

/// One reduced observation keyed by a destination geography.
/// `geo` is `None` only for unmapped rows kept on request.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedRow {
    pub geo: Option<GeoId>,
    pub time: NaiveDate,
    pub metrics: BTreeMap<String, f64>,
}

impl AggregatedRow {
    #[inline]
    pub fn get(&self, name: &str) -> Option<f64> { self.metrics.get(name).copied() }
}

/// A source row paired with one of its destinations.
#[derive(Debug, Clone, PartialEq)]
pub struct MappedRow {
    pub row: SourceRow,
    pub dest: GeoId,
    pub weight: f64,
}
