use std::{
    collections::BTreeSet,
    sync::{Arc, Mutex, OnceLock},
};

use ahash::AHashMap;
use tracing::{debug, info};

use crate::{
    error::GeoError,
    geo::{GeoId, GeoType},
    io::hash::sha256_hex,
};
use super::{
    catalog::Catalog,
    load::{parse_crosswalk, parse_population},
    population::PopulationTable,
    source::TableSource,
    table::{CrosswalkTable, DEFAULT_TOLERANCE},
};

const KINDS: usize = GeoType::ALL.len();

/// Universal intermediate for two-hop lookups.
const HUB: GeoType = GeoType::Fips;

/// How one kind reaches another.
#[derive(Debug, Clone)]
pub enum CrosswalkPath {
    /// Same kind; every code maps to itself.
    Identity,
    /// Every code maps to the nation.
    Nation,
    /// Direct or composed table.
    Table(Arc<CrosswalkTable>),
}

impl CrosswalkPath {
    /// Destinations of `code` along this path as `(code, weight)` pairs.
    pub fn targets<'a>(&'a self, code: &'a GeoId) -> Box<dyn Iterator<Item = (GeoId, f64)> + 'a> {
        match self {
            CrosswalkPath::Identity => Box::new(std::iter::once((code.clone(), 1.0))),
            CrosswalkPath::Nation => Box::new(std::iter::once((GeoId::nation(), 1.0))),
            CrosswalkPath::Table(table) => Box::new(table.targets(code).iter().map(|t| (t.code.clone(), t.weight))),
        }
    }

    /// Whether `code` has at least one destination.
    pub fn maps(&self, code: &GeoId) -> bool {
        match self {
            CrosswalkPath::Identity | CrosswalkPath::Nation => true,
            CrosswalkPath::Table(table) => table.contains(code),
        }
    }
}

/// Load-once cache cell: the mutex is only taken until the value is set.
struct Slot<T> {
    cell: OnceLock<Arc<T>>,
    init: Mutex<()>,
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Self { cell: OnceLock::new(), init: Mutex::new(()) }
    }
}

impl<T> Slot<T> {
    fn get_or_try_load(&self, load: impl FnOnce() -> Result<T, GeoError>) -> Result<Arc<T>, GeoError> {
        if let Some(value) = self.cell.get() {
            return Ok(value.clone());
        }
        let _guard = self.init.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(value) = self.cell.get() {
            return Ok(value.clone());
        }
        // Failed loads are not cached; the next call retries.
        let value = Arc::new(load()?);
        let _ = self.cell.set(value.clone());
        Ok(value)
    }
}

/// Process-scoped cache of immutable crosswalk and population tables.
///
/// Tables are read from the source on first request, certified, and then
/// shared by every caller. Reads after the first load are lock-free.
pub struct CrosswalkStore {
    source: Box<dyn TableSource>,
    catalog: Catalog,
    tolerance: f64,
    verify_checksums: bool,
    tables: Vec<Slot<CrosswalkTable>>,
    populations: Vec<Slot<PopulationTable>>,
}

impl CrosswalkStore {
    pub fn new(source: impl TableSource + 'static, catalog: Catalog) -> Self {
        Self {
            source: Box::new(source),
            catalog,
            tolerance: DEFAULT_TOLERANCE,
            verify_checksums: true,
            tables: (0..KINDS * KINDS).map(|_| Slot::default()).collect(),
            populations: (0..KINDS).map(|_| Slot::default()).collect(),
        }
    }

    /// Use the catalog found in the source (`manifest.json` or the default layout).
    pub fn from_source(source: impl TableSource + 'static) -> Result<Self, GeoError> {
        let catalog = Catalog::from_source(&source)
            .map_err(|e| GeoError::Config(format!("{e:#}")))?;
        Ok(Self::new(source, catalog))
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_checksums(mut self, verify: bool) -> Self {
        self.verify_checksums = verify;
        self
    }

    #[inline] pub fn catalog(&self) -> &Catalog { &self.catalog }

    #[inline] pub fn tolerance(&self) -> f64 { self.tolerance }

    /// Whether any path exists between two kinds, without loading anything.
    pub fn has_path(&self, from: GeoType, to: GeoType) -> bool {
        from == to
            || to == GeoType::Nation
            || self.catalog.table(from, to).is_some()
            || (self.catalog.table(from, HUB).is_some() && self.catalog.table(HUB, to).is_some())
    }

    /// The table for `(from, to)`: the catalogued file if there is one,
    /// otherwise the composition `from -> fips -> to`.
    pub fn get(&self, from: GeoType, to: GeoType) -> Result<Arc<CrosswalkTable>, GeoError> {
        let slot = &self.tables[from.index() * KINDS + to.index()];
        slot.get_or_try_load(|| {
            if self.catalog.table(from, to).is_some() {
                return self.load_table(from, to);
            }
            if from != HUB && to != HUB
                && self.catalog.table(from, HUB).is_some()
                && self.catalog.table(HUB, to).is_some() {
                let first = self.get(from, HUB)?;
                let second = self.get(HUB, to)?;
                let composed = first.compose(&second, self.tolerance)?;
                debug!(%from, %to, entries = composed.len(), "composed crosswalk through fips");
                return Ok(composed);
            }
            Err(GeoError::UnsupportedGeographyPath { from, to })
        })
    }

    /// Resolve the mapping between two kinds.
    pub fn path(&self, from: GeoType, to: GeoType) -> Result<CrosswalkPath, GeoError> {
        match (from, to) {
            _ if from == to => Ok(CrosswalkPath::Identity),
            (_, GeoType::Nation) => Ok(CrosswalkPath::Nation),
            _ => Ok(CrosswalkPath::Table(self.get(from, to)?)),
        }
    }

    /// Population table for `kind`. Kinds without their own file are
    /// derived from county population through the county crosswalk.
    pub fn population(&self, kind: GeoType) -> Result<Arc<PopulationTable>, GeoError> {
        self.populations[kind.index()].get_or_try_load(|| match self.catalog.population(kind) {
            Some(spec) => {
                if !self.source.has(&spec.file) {
                    return Err(GeoError::PopulationUnavailable { kind });
                }
                let bytes = self.read(&spec.file, spec.sha256.as_deref())?;
                let table = parse_population(&spec.file, &bytes, kind)?;
                info!(%kind, file = %spec.file, codes = table.len(), "loaded population table");
                Ok(table)
            }
            None => self.derive_population(kind),
        })
    }

    fn derive_population(&self, kind: GeoType) -> Result<PopulationTable, GeoError> {
        if kind == HUB || self.catalog.population(HUB).is_none() || !self.has_path(HUB, kind) {
            return Err(GeoError::PopulationUnavailable { kind });
        }
        let counties = self.population(HUB)?;
        let path = self.path(HUB, kind)?;
        let mut totals: AHashMap<GeoId, f64> = AHashMap::new();
        for (code, pop) in counties.iter() {
            for (dest, weight) in path.targets(code) {
                *totals.entry(dest).or_default() += pop * weight;
            }
        }
        debug!(%kind, codes = totals.len(), "derived population from county table");
        Ok(PopulationTable::new(kind, totals))
    }

    /// Eagerly load a set of pairs, e.g. at process start.
    pub fn preload(&self, pairs: &[(GeoType, GeoType)]) -> Result<(), GeoError> {
        for &(from, to) in pairs {
            self.path(from, to)?;
        }
        Ok(())
    }

    /// All known codes of a kind.
    pub fn geo_values(&self, kind: GeoType) -> Result<BTreeSet<GeoId>, GeoError> {
        if kind == GeoType::Nation {
            return Ok(BTreeSet::from([GeoId::nation()]));
        }
        if let Some(spec) = self.catalog.tables().iter().find(|t| t.from == kind) {
            return Ok(self.get(spec.from, spec.to)?.from_codes());
        }
        if let Some(spec) = self.catalog.tables().iter().find(|t| t.to == kind) {
            return Ok(self.get(spec.from, spec.to)?.to_codes());
        }
        if self.catalog.population(kind).is_some() {
            return Ok(self.population(kind)?.codes());
        }
        Err(GeoError::UnsupportedGeographyPath { from: kind, to: kind })
    }

    /// All codes of `contained` kind lying within `container`, by inverting
    /// the partition table from `contained` to the container's kind.
    pub fn geos_within(&self, container: &GeoId, contained: GeoType) -> Result<BTreeSet<GeoId>, GeoError> {
        if container.ty() == GeoType::Nation {
            return self.geo_values(contained);
        }
        let table = self.get(contained, container.ty())?;
        Ok(table.sources_of(container))
    }

    fn load_table(&self, from: GeoType, to: GeoType) -> Result<CrosswalkTable, GeoError> {
        let spec = self.catalog.table(from, to)
            .ok_or(GeoError::UnsupportedGeographyPath { from, to })?;
        if !self.source.has(&spec.file) {
            return Err(GeoError::CrosswalkUnavailable { from, to, file: spec.file.clone() });
        }
        let bytes = self.read(&spec.file, spec.sha256.as_deref())?;
        let table = parse_crosswalk(&spec.file, &bytes, from, to, spec.kind, self.tolerance)?;
        info!(%from, %to, file = %spec.file, entries = table.len(), kind = ?spec.kind, "loaded crosswalk");
        Ok(table)
    }

    fn read(&self, file: &str, sha256: Option<&str>) -> Result<Arc<[u8]>, GeoError> {
        let bytes = self.source.get(file)
            .map_err(|e| GeoError::MalformedTable { file: file.to_string(), reason: format!("{e:#}") })?;
        if let (true, Some(expected)) = (self.verify_checksums, sha256) {
            let actual = sha256_hex(&bytes);
            if !actual.eq_ignore_ascii_case(expected) {
                return Err(GeoError::ChecksumMismatch {
                    file: file.to_string(),
                    expected: expected.to_string(),
                    actual,
                });
            }
        }
        Ok(bytes)
    }
}

impl std::fmt::Debug for CrosswalkStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrosswalkStore")
            .field("catalog", &self.catalog)
            .field("tolerance", &self.tolerance)
            .field("verify_checksums", &self.verify_checksums)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crosswalk::{source::MemSource, table::TableKind};

    fn fixture() -> CrosswalkStore {
        let src = MemSource::new()
            .with_file("zip_fips.csv", "zip,fips,weight\n10001,36061,0.8\n10001,36047,0.2\n07030,34017,1\n")
            .with_file("fips_msa.csv", "fips,msa\n36061,35620\n36047,35620\n34017,35620\n")
            .with_file("fips_state.csv", "fips,state\n36061,ny\n36047,ny\n34017,nj\n36000,ny\n")
            .with_file("fips_pop.csv", "fips,pop\n36061,1600000\n36047,2600000\n34017,670000\n");
        let catalog = Catalog::empty()
            .with_table(GeoType::Zip, GeoType::Fips, TableKind::Disaggregating, "zip_fips.csv")
            .with_table(GeoType::Fips, GeoType::Msa, TableKind::Partition, "fips_msa.csv")
            .with_table(GeoType::Fips, GeoType::State, TableKind::Partition, "fips_state.csv")
            .with_table(GeoType::Fips, GeoType::Hrr, TableKind::Disaggregating, "fips_hrr.csv")
            .with_population(GeoType::Fips, "fips_pop.csv");
        CrosswalkStore::new(src, catalog)
    }

    #[test]
    fn loads_and_caches_direct_tables() {
        let store = fixture();
        let a = store.get(GeoType::Fips, GeoType::State).unwrap();
        let b = store.get(GeoType::Fips, GeoType::State).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.len(), 4);
    }

    #[test]
    fn composes_two_hop_through_fips() {
        let store = fixture();
        assert!(store.has_path(GeoType::Zip, GeoType::Msa));
        let table = store.get(GeoType::Zip, GeoType::Msa).unwrap();
        let zip = GeoId::parse(GeoType::Zip, "10001").unwrap();
        let targets = table.targets(&zip);
        assert_eq!(targets.len(), 1);
        assert!((targets[0].weight - 1.0).abs() < 1e-12);
    }

    #[test]
    fn missing_file_is_unavailable() {
        let store = fixture();
        let err = store.get(GeoType::Fips, GeoType::Hrr).unwrap_err();
        assert!(matches!(err, GeoError::CrosswalkUnavailable { ref file, .. } if file == "fips_hrr.csv"));
    }

    #[test]
    fn unknown_pair_is_unsupported() {
        let store = fixture();
        assert!(!store.has_path(GeoType::Hrr, GeoType::Msa));
        let err = store.path(GeoType::Hrr, GeoType::Msa).unwrap_err();
        assert!(matches!(err, GeoError::UnsupportedGeographyPath { .. }));
    }

    #[test]
    fn identity_and_nation_need_no_table() {
        let store = fixture();
        assert!(matches!(store.path(GeoType::Hsa, GeoType::Hsa).unwrap(), CrosswalkPath::Identity));
        assert!(matches!(store.path(GeoType::Hrr, GeoType::Nation).unwrap(), CrosswalkPath::Nation));
    }

    #[test]
    fn integrity_failure_is_not_cached() {
        let src = MemSource::new().with_file("bad.csv", "zip,fips,weight\n10001,36061,0.5\n");
        let catalog = Catalog::empty()
            .with_table(GeoType::Zip, GeoType::Fips, TableKind::Disaggregating, "bad.csv");
        let store = CrosswalkStore::new(src, catalog);
        for _ in 0..2 {
            assert!(matches!(
                store.get(GeoType::Zip, GeoType::Fips),
                Err(GeoError::CrosswalkIntegrity { .. })
            ));
        }
    }

    #[test]
    fn checksum_is_verified() {
        let csv = "fips,state\n36061,ny\n";
        let src = MemSource::new().with_file("s.csv", csv);
        let catalog = Catalog::empty()
            .with_table(GeoType::Fips, GeoType::State, TableKind::Partition, "s.csv")
            .with_checksum("s.csv", &sha256_hex(b"something else"));
        let store = CrosswalkStore::new(src.clone(), catalog.clone());
        assert!(matches!(
            store.get(GeoType::Fips, GeoType::State),
            Err(GeoError::ChecksumMismatch { .. })
        ));

        let unchecked = CrosswalkStore::new(src.clone(), catalog).with_checksums(false);
        assert!(unchecked.get(GeoType::Fips, GeoType::State).is_ok());

        let good = Catalog::empty()
            .with_table(GeoType::Fips, GeoType::State, TableKind::Partition, "s.csv")
            .with_checksum("s.csv", &sha256_hex(csv.as_bytes()));
        assert!(CrosswalkStore::new(src, good).get(GeoType::Fips, GeoType::State).is_ok());
    }

    #[test]
    fn population_tables() {
        let store = fixture();
        let pop = store.population(GeoType::Fips).unwrap();
        assert_eq!(pop.get(&GeoId::parse(GeoType::Fips, "34017").unwrap()), Some(670000.0));
        assert!(matches!(store.population(GeoType::Zip), Err(GeoError::PopulationUnavailable { .. })));

        let states = store.population(GeoType::State).unwrap();
        assert_eq!(states.get(&GeoId::parse(GeoType::State, "ny").unwrap()), Some(4200000.0));
        assert_eq!(states.get(&GeoId::parse(GeoType::State, "nj").unwrap()), Some(670000.0));
    }

    #[test]
    fn geo_values_and_geos_within() {
        let store = fixture();
        assert_eq!(store.geo_values(GeoType::Nation).unwrap().len(), 1);
        let zips = store.geo_values(GeoType::Zip).unwrap();
        assert_eq!(zips.len(), 2);

        let ny = GeoId::parse(GeoType::State, "ny").unwrap();
        let counties = store.geos_within(&ny, GeoType::Fips).unwrap();
        let ids = counties.iter().map(GeoId::id).collect::<Vec<_>>();
        assert_eq!(ids, vec!["36000", "36047", "36061"]);
    }

    #[test]
    fn county_groups_within_a_state() {
        let src = MemSource::new()
            .with_file("fips_chng-fips_table.csv", "fips,chng-fips\n02013,02g01\n02016,02g01\n02020,02020\n")
            .with_file("chng-fips_state_table.csv", "chng-fips,state\n02g01,ak\n02020,ak\n01001,al\n");
        let store = CrosswalkStore::from_source(src).unwrap();

        let ak = GeoId::parse(GeoType::State, "ak").unwrap();
        let groups = store.geos_within(&ak, GeoType::ChngFips).unwrap();
        let ids = groups.iter().map(GeoId::id).collect::<Vec<_>>();
        assert_eq!(ids, vec!["02020", "02g01"]);

        let table = store.get(GeoType::Fips, GeoType::ChngFips).unwrap();
        let targets = table.targets(&GeoId::parse(GeoType::Fips, "02016").unwrap());
        assert_eq!(targets[0].code.id(), "02g01");
    }

    #[test]
    fn preload_surfaces_errors() {
        let store = fixture();
        assert!(store.preload(&[(GeoType::Zip, GeoType::Fips), (GeoType::Fips, GeoType::State)]).is_ok());
        assert!(store.preload(&[(GeoType::Fips, GeoType::Hrr)]).is_err());
    }
}
