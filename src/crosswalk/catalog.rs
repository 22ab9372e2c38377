use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::geo::GeoType;
use super::{source::TableSource, table::TableKind};

/// Name of the optional catalog file in a data directory.
pub const MANIFEST_FILE: &str = "manifest.json";

/// One crosswalk file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSpec {
    pub from: GeoType,
    pub to: GeoType,
    pub file: String,
    pub kind: TableKind,
    #[serde(default)]
    pub sha256: Option<String>,
}

/// One population file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PopulationSpec {
    pub kind: GeoType,
    pub file: String,
    #[serde(default)]
    pub sha256: Option<String>,
}

/// The set of tables a data directory provides.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default = "default_version")]
    version: String,
    #[serde(default)]
    tables: Vec<TableSpec>,
    #[serde(default)]
    populations: Vec<PopulationSpec>,
}

fn default_version() -> String { "1".into() }

impl Default for Catalog {
    /// File layout written by the crosswalk preparation step.
    fn default() -> Self {
        use GeoType::*;
        use TableKind::*;

        let tables = [
            (Zip, Fips, Disaggregating),
            (Zip, Msa, Disaggregating),
            (Zip, State, Disaggregating),
            (Zip, Hhs, Disaggregating),
            (Zip, Hrr, Partition),
            (Zip, Hsa, Partition),
            (Fips, Zip, Disaggregating),
            (Fips, Hrr, Disaggregating),
            (Fips, Msa, Partition),
            (Fips, State, Partition),
            (Fips, Hhs, Partition),
            (Fips, ChngFips, Partition),
            (ChngFips, State, Partition),
            (State, Hhs, Partition),
            (Uid, Fips, Disaggregating),
        ];

        Self {
            version: default_version(),
            tables: tables.into_iter()
                .map(|(from, to, kind)| TableSpec {
                    from, to, kind,
                    file: format!("{}_{}_table.csv", from.to_str(), to.to_str()),
                    sha256: None,
                })
                .collect(),
            populations: [Zip, Fips, State, Hhs, Nation].into_iter()
                .map(|kind| PopulationSpec {
                    kind,
                    file: format!("{}_pop.csv", kind.to_str()),
                    sha256: None,
                })
                .collect(),
        }
    }
}

impl Catalog {
    /// An empty catalog, to be filled with `with_table`/`with_population`.
    pub fn empty() -> Self {
        Self { version: default_version(), tables: Vec::new(), populations: Vec::new() }
    }

    pub fn with_table(mut self, from: GeoType, to: GeoType, kind: TableKind, file: &str) -> Self {
        self.tables.retain(|t| !(t.from == from && t.to == to));
        self.tables.push(TableSpec { from, to, kind, file: file.to_string(), sha256: None });
        self
    }

    pub fn with_population(mut self, kind: GeoType, file: &str) -> Self {
        self.populations.retain(|p| p.kind != kind);
        self.populations.push(PopulationSpec { kind, file: file.to_string(), sha256: None });
        self
    }

    /// Attach an expected SHA-256 to whichever catalogued file is named `file`.
    pub fn with_checksum(mut self, file: &str, sha256: &str) -> Self {
        for t in self.tables.iter_mut().filter(|t| t.file == file) {
            t.sha256 = Some(sha256.to_string());
        }
        for p in self.populations.iter_mut().filter(|p| p.file == file) {
            p.sha256 = Some(sha256.to_string());
        }
        self
    }

    /// Read `manifest.json` from the source, or fall back to the default layout.
    pub fn from_source(src: &dyn TableSource) -> Result<Self> {
        if !src.has(MANIFEST_FILE) {
            return Ok(Self::default());
        }
        let bytes = src.get(MANIFEST_FILE)
            .context("Failed to read manifest.json")?;
        let catalog: Catalog = serde_json::from_slice(&bytes)
            .context("Failed to parse manifest.json")?;
        Ok(catalog)
    }

    #[inline] pub fn version(&self) -> &str { &self.version }

    pub fn table(&self, from: GeoType, to: GeoType) -> Option<&TableSpec> {
        self.tables.iter().find(|t| t.from == from && t.to == to)
    }

    pub fn population(&self, kind: GeoType) -> Option<&PopulationSpec> {
        self.populations.iter().find(|p| p.kind == kind)
    }

    pub fn tables(&self) -> &[TableSpec] { &self.tables }
}
