use std::collections::BTreeSet;

use ahash::AHashMap;

use crate::geo::{GeoId, GeoType};

/// Scalar population count per code of one kind.
#[derive(Debug)]
pub struct PopulationTable {
    kind: GeoType,
    index: AHashMap<GeoId, f64>,
}

impl PopulationTable {
    pub fn new(kind: GeoType, counts: impl IntoIterator<Item = (GeoId, f64)>) -> Self {
        Self { kind, index: counts.into_iter().collect() }
    }

    #[inline] pub fn kind(&self) -> GeoType { self.kind }

    #[inline] pub fn get(&self, code: &GeoId) -> Option<f64> { self.index.get(code).copied() }

    #[inline] pub fn len(&self) -> usize { self.index.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.index.is_empty() }

    pub fn iter(&self) -> impl Iterator<Item = (&GeoId, f64)> {
        self.index.iter().map(|(code, &pop)| (code, pop))
    }

    /// Every code with a count, in order.
    pub fn codes(&self) -> BTreeSet<GeoId> { self.index.keys().cloned().collect() }

    /// Sum over every code in the table.
    pub fn total(&self) -> f64 { self.index.values().sum() }
}
