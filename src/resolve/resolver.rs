use std::sync::Arc;

use tracing::{debug, warn};

use crate::{
    crosswalk::CrosswalkStore,
    disburse::{DisbursementPolicy, DisbursementRules, Preprocessor},
    error::GeoError,
    geo::{GeoId, GeoType},
    population::POPULATION,
};
use super::{
    accumulate::Accumulator,
    diagnostics::Diagnostics,
    metric::MetricTags,
    rows::{AggregatedRow, MappedRow, SourceRow},
};

/// Per-call switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Pass rows with no crosswalk entry through with a null destination
    /// instead of dropping them.
    pub keep_unmapped: bool,
    /// Drop unallocated-bucket rows. Set this when the call produces rates.
    pub exclude_unallocated: bool,
    pub policy: DisbursementPolicy,
}

/// Result of a call: the reduced rows plus what was skipped along the way.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub rows: Vec<AggregatedRow>,
    pub diagnostics: Diagnostics,
}

/// The re-keying engine. Cheap to clone; share one per process.
#[derive(Debug, Clone)]
pub struct Resolver {
    store: Arc<CrosswalkStore>,
    rules: Arc<DisbursementRules>,
}

impl Resolver {
    /// A resolver with no disbursement rules.
    pub fn new(store: Arc<CrosswalkStore>) -> Self {
        Self { store, rules: Arc::new(DisbursementRules::empty()) }
    }

    pub fn with_rules(mut self, rules: DisbursementRules) -> Self {
        self.rules = Arc::new(rules);
        self
    }

    #[inline] pub fn store(&self) -> &CrosswalkStore { &self.store }

    #[inline] pub fn rules(&self) -> &DisbursementRules { &self.rules }

    /// Re-key `rows` from `from` to `to`.
    ///
    /// Additive metrics are multiplied by the crosswalk weight and summed per
    /// `(destination, time)`. Rates are never apportioned; they are
    /// recomputed from their summed components. Weighted means are reduced as
    /// `Σ(v·w·cw)/Σ(w·cw)`. Metrics without a tag are dropped.
    ///
    /// If a rate or mean reads `population` and some rows lack it, population
    /// is attached from the source kind's table, both before disbursement and
    /// again for rows split off a pooled code. Only disbursement rules scoped
    /// to `to` apply.
    #[tracing::instrument(level = "debug", skip(self, rows, tags), fields(rows = rows.len()))]
    pub fn resolve(
        &self,
        rows: Vec<SourceRow>,
        from: GeoType,
        to: GeoType,
        tags: &MetricTags,
        opts: &ResolveOptions,
    ) -> Result<Resolution, GeoError> {
        tags.validate()?;
        let path = self.store.path(from, to)?;

        let mut diagnostics = Diagnostics::default();
        let rows = self.prepare(rows, from, to, tags, opts, &mut diagnostics)?;

        let mut acc = Accumulator::new(tags);
        let mut unmapped = Vec::new();
        for row in rows {
            if !path.maps(&row.geo) {
                diagnostics.unmapped += 1;
                if opts.keep_unmapped {
                    unmapped.push(AggregatedRow {
                        geo: None,
                        time: row.time,
                        metrics: Accumulator::reduce_one(tags, &row.metrics),
                    });
                }
                continue;
            }
            for (dest, weight) in path.targets(&row.geo) {
                acc.add(dest, row.time, &row.metrics, weight);
            }
        }

        if diagnostics.unmapped > 0 {
            warn!(%from, %to, rows = diagnostics.unmapped, kept = opts.keep_unmapped, "source codes without crosswalk entries");
        }
        debug!(%from, %to, groups = acc.len(), "reduced rows");

        let mut out = acc.finish();
        out.extend(unmapped);
        Ok(Resolution { rows: out, diagnostics })
    }

    /// Fan-out only: each row paired with every destination and its weight,
    /// after disbursement. Rows without a destination are counted, not kept.
    pub fn add_geocode(
        &self,
        rows: Vec<SourceRow>,
        from: GeoType,
        to: GeoType,
        tags: &MetricTags,
        opts: &ResolveOptions,
    ) -> Result<(Vec<MappedRow>, Diagnostics), GeoError> {
        let path = self.store.path(from, to)?;
        let mut diagnostics = Diagnostics::default();
        let rows = self.prepare(rows, from, to, tags, opts, &mut diagnostics)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let targets: Vec<(GeoId, f64)> = path.targets(&row.geo).collect();
            if targets.is_empty() {
                diagnostics.unmapped += 1;
                continue;
            }
            out.extend(targets.into_iter().map(|(dest, weight)| MappedRow { row: row.clone(), dest, weight }));
        }
        Ok((out, diagnostics))
    }

    /// Population attachment, disbursement, then a second attachment for
    /// rows still lacking a figure (targets split off a pooled code that
    /// had none).
    fn prepare(
        &self,
        mut rows: Vec<SourceRow>,
        from: GeoType,
        to: GeoType,
        tags: &MetricTags,
        opts: &ResolveOptions,
        diagnostics: &mut Diagnostics,
    ) -> Result<Vec<SourceRow>, GeoError> {
        let needs_population = |rows: &[SourceRow]| {
            tags.references(POPULATION) && rows.iter().any(|r| r.get(POPULATION).is_none())
        };
        if needs_population(&rows) {
            self.attach_population(&mut rows, from, false)?;
        }

        let (mut rows, pre) = Preprocessor::new(&self.rules, tags)
            .policy(opts.policy)
            .exclude_unallocated(opts.exclude_unallocated)
            .destination(to)
            .preprocess(rows, from)?;
        *diagnostics += pre;

        if needs_population(&rows) {
            diagnostics.missing_population += self.attach_population(&mut rows, from, false)?;
        }
        Ok(rows)
    }
}
