//! Population augmentation and population-weighted means.

use tracing::warn;

use crate::{
    error::GeoError,
    geo::GeoType,
    resolve::{MetricTags, Resolution, ResolveOptions, Resolver, SourceRow},
};

pub use crate::crosswalk::PopulationTable;

/// Column the augmenter writes.
pub const POPULATION: &str = "population";

impl Resolver {
    /// Attach a `population` metric to every row from the population table
    /// of `kind`. Rows whose code has no figure are left without one.
    pub fn with_population(&self, mut rows: Vec<SourceRow>, kind: GeoType) -> Result<Vec<SourceRow>, GeoError> {
        let missing = self.attach_population(&mut rows, kind, true)?;
        if missing > 0 {
            warn!(%kind, rows = missing, "codes without population");
        }
        Ok(rows)
    }

    /// Returns the number of rows left without a figure. Unless `overwrite`
    /// is set, rows that already carry a population keep it.
    pub(crate) fn attach_population(&self, rows: &mut [SourceRow], kind: GeoType, overwrite: bool) -> Result<usize, GeoError> {
        let table = self.store().population(kind)?;
        let mut missing = 0;
        for row in rows.iter_mut() {
            if row.geo.ty() != kind {
                return Err(GeoError::KindMismatch { expected: kind, found: row.geo.ty() });
            }
            if !overwrite && row.metrics.contains_key(POPULATION) { continue }
            match table.get(&row.geo) {
                Some(pop) => { row.metrics.insert(POPULATION.to_string(), pop); }
                None => missing += 1,
            }
        }
        Ok(missing)
    }

    /// `Σ(metric·weight)/Σ(weight)` per destination, for rates that are
    /// already computed and must be carried upward (state to nation).
    ///
    /// The output carries the mean under `metric` and the summed
    /// `weight_column`. When `weight_column` is `population` and rows lack it,
    /// it is attached first.
    pub fn weighted_aggregate(
        &self,
        rows: Vec<SourceRow>,
        from: GeoType,
        to: GeoType,
        metric: &str,
        weight_column: &str,
        opts: &ResolveOptions,
    ) -> Result<Resolution, GeoError> {
        if metric == weight_column {
            return Err(GeoError::InvalidMetricTags(format!("{metric:?} cannot weight itself")));
        }
        let tags = MetricTags::new()
            .additive(weight_column)
            .weighted_mean(metric, weight_column);
        self.resolve(rows, from, to, &tags, opts)
    }
}
