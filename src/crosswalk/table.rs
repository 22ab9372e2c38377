use std::collections::BTreeSet;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::{error::GeoError, geo::{GeoId, GeoType}};

/// Default tolerance on per-code weight sums.
pub const DEFAULT_TOLERANCE: f64 = 1e-6;

/// How a table distributes a source quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableKind {
    /// One source code splits fractionally across destinations; weights sum to 1.
    Disaggregating,
    /// Each source code maps to exactly one destination with weight 1.
    Partition,
}

/// A single weighted mapping row.
#[derive(Debug, Clone, PartialEq)]
pub struct CrosswalkEntry {
    pub from: GeoId,
    pub to: GeoId,
    pub weight: f64,
}

/// Destination side of a mapping, stored per source code.
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    pub code: GeoId,
    pub weight: f64,
}

/// Immutable weighted mapping between two geography kinds, indexed by source
/// code for O(1) fan-out.
#[derive(Debug)]
pub struct CrosswalkTable {
    from: GeoType,
    to: GeoType,
    kind: TableKind,
    index: AHashMap<GeoId, SmallVec<[Target; 4]>>,
    len: usize,
}

impl CrosswalkTable {
    /// Build a table from entries, refusing any table that fails its integrity
    /// check: per-code weight sums of 1 for disaggregating tables, exactly one
    /// weight-1 entry per code for partitions.
    pub fn from_entries(
        from: GeoType,
        to: GeoType,
        kind: TableKind,
        entries: impl IntoIterator<Item = CrosswalkEntry>,
        tolerance: f64,
    ) -> Result<Self, GeoError> {
        let mut index: AHashMap<GeoId, SmallVec<[Target; 4]>> = AHashMap::new();
        let mut len = 0;

        for CrosswalkEntry { from: src, to: dst, weight } in entries {
            if src.ty() != from || dst.ty() != to {
                return Err(GeoError::MalformedTable {
                    file: format!("{from}_{to}"),
                    reason: format!("entry {src} -> {dst} does not belong in a {from} -> {to} table"),
                });
            }
            if !weight.is_finite() || weight < 0.0 || weight > 1.0 + tolerance {
                return Err(GeoError::CrosswalkIntegrity {
                    from, to,
                    code: src.id().to_string(),
                    weight_sum: weight,
                });
            }
            let targets = index.entry(src).or_default();
            if let Some(dup) = targets.iter().find(|t| t.code == dst) {
                return Err(GeoError::MalformedTable {
                    file: format!("{from}_{to}"),
                    reason: format!("duplicate mapping to {}", dup.code),
                });
            }
            targets.push(Target { code: dst, weight });
            len += 1;
        }

        let table = Self { from, to, kind, index, len };
        table.validate(tolerance)?;
        Ok(table)
    }

    fn validate(&self, tolerance: f64) -> Result<(), GeoError> {
        // Sort offenders so the reported code is stable across runs.
        let mut codes = self.index.keys().collect::<Vec<_>>();
        codes.sort_unstable();

        for code in codes {
            let targets = &self.index[code];
            match self.kind {
                TableKind::Disaggregating => {
                    let weight_sum = targets.iter().map(|t| t.weight).sum::<f64>();
                    if (weight_sum - 1.0).abs() >= tolerance {
                        return Err(GeoError::CrosswalkIntegrity {
                            from: self.from,
                            to: self.to,
                            code: code.id().to_string(),
                            weight_sum,
                        });
                    }
                }
                TableKind::Partition => {
                    if targets.len() != 1 {
                        return Err(GeoError::PartitionViolation {
                            from: self.from,
                            to: self.to,
                            code: code.id().to_string(),
                            entries: targets.len(),
                        });
                    }
                    if (targets[0].weight - 1.0).abs() >= tolerance {
                        return Err(GeoError::CrosswalkIntegrity {
                            from: self.from,
                            to: self.to,
                            code: code.id().to_string(),
                            weight_sum: targets[0].weight,
                        });
                    }
                }
            }
        }
        Ok(())
    }

    #[inline] pub fn from_type(&self) -> GeoType { self.from }

    #[inline] pub fn to_type(&self) -> GeoType { self.to }

    #[inline] pub fn kind(&self) -> TableKind { self.kind }

    /// Number of entries.
    #[inline] pub fn len(&self) -> usize { self.len }

    #[inline] pub fn is_empty(&self) -> bool { self.len == 0 }

    /// All destinations of `code`; empty if the code is not in the table.
    #[inline]
    pub fn targets(&self, code: &GeoId) -> &[Target] {
        self.index.get(code).map(|t| t.as_slice()).unwrap_or(&[])
    }

    #[inline]
    pub fn contains(&self, code: &GeoId) -> bool {
        self.index.contains_key(code)
    }

    /// Sorted set of source codes.
    pub fn from_codes(&self) -> BTreeSet<GeoId> {
        self.index.keys().cloned().collect()
    }

    /// Sorted set of destination codes.
    pub fn to_codes(&self) -> BTreeSet<GeoId> {
        self.index.values().flatten().map(|t| t.code.clone()).collect()
    }

    /// Source codes mapping (with any weight) into `dest`.
    pub fn sources_of(&self, dest: &GeoId) -> BTreeSet<GeoId> {
        self.index.iter()
            .filter(|(_, targets)| targets.iter().any(|t| &t.code == dest))
            .map(|(code, _)| code.clone())
            .collect()
    }

    /// Iterate all entries in unspecified order.
    pub fn entries(&self) -> impl Iterator<Item = CrosswalkEntry> + '_ {
        self.index.iter().flat_map(|(from, targets)| {
            targets.iter().map(move |t| CrosswalkEntry {
                from: from.clone(),
                to: t.code.clone(),
                weight: t.weight,
            })
        })
    }

    /// Compose `self` (a -> b) with `next` (b -> c) into a -> c by summing
    /// products of weights along shared intermediate codes. Weights are then
    /// rescaled so each source code sums to 1 again; source codes with no
    /// route through `next` are left out.
    pub fn compose(&self, next: &CrosswalkTable, tolerance: f64) -> Result<CrosswalkTable, GeoError> {
        if self.to != next.from {
            return Err(GeoError::UnsupportedGeographyPath { from: self.from, to: next.to });
        }

        let kind = match (self.kind, next.kind) {
            (TableKind::Partition, TableKind::Partition) => TableKind::Partition,
            _ => TableKind::Disaggregating,
        };

        let mut entries = Vec::with_capacity(self.len);
        let mut dropped = 0usize;
        for (src, mids) in &self.index {
            let mut acc: SmallVec<[Target; 4]> = SmallVec::new();
            for mid in mids {
                for dst in next.targets(&mid.code) {
                    let w = mid.weight * dst.weight;
                    match acc.iter_mut().find(|t| t.code == dst.code) {
                        Some(t) => t.weight += w,
                        None => acc.push(Target { code: dst.code.clone(), weight: w }),
                    }
                }
            }

            let total = acc.iter().map(|t| t.weight).sum::<f64>();
            if acc.is_empty() || total <= 0.0 {
                dropped += 1;
                continue;
            }
            entries.extend(acc.into_iter().map(|t| CrosswalkEntry {
                from: src.clone(),
                to: t.code,
                weight: t.weight / total,
            }));
        }

        if dropped > 0 {
            tracing::debug!(from = %self.from, via = %self.to, to = %next.to, dropped, "codes without a composed route");
        }

        CrosswalkTable::from_entries(self.from, next.to, kind, entries, tolerance)
    }
}
