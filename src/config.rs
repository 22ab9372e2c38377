//! Engine configuration read from JSON.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use serde::{Deserialize, Serialize};

use crate::{
    crosswalk::{CrosswalkStore, DiskSource, DEFAULT_TOLERANCE},
    disburse::DisbursementRules,
    error::GeoError,
    geo::GeoType,
    resolve::Resolver,
};

fn default_census_year() -> u16 { 2020 }
fn default_tolerance() -> f64 { DEFAULT_TOLERANCE }
fn default_true() -> bool { true }

/// Where the tables live and how strictly they are checked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrosswalkConfig {
    /// Data directory; tables are read from `root/<census_year>/`.
    pub root: PathBuf,
    #[serde(default = "default_census_year")]
    pub census_year: u16,
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    #[serde(default = "default_true")]
    pub verify_checksums: bool,
    /// Pairs loaded when the engine is built.
    #[serde(default)]
    pub preload: Vec<(GeoType, GeoType)>,
    /// Disbursement rule CSV replacing the built-in rules.
    #[serde(default)]
    pub rules: Option<PathBuf>,
}

impl CrosswalkConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            census_year: default_census_year(),
            tolerance: default_tolerance(),
            verify_checksums: true,
            preload: Vec::new(),
            rules: None,
        }
    }

    pub fn from_json(json: &str) -> Result<Self, GeoError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| GeoError::Config(format!("invalid config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, GeoError> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| GeoError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_json(&json)
    }

    /// Directory holding the tables for the configured vintage.
    pub fn data_dir(&self) -> PathBuf {
        self.root.join(self.census_year.to_string())
    }

    fn validate(&self) -> Result<(), GeoError> {
        if !self.tolerance.is_finite() || self.tolerance <= 0.0 {
            return Err(GeoError::Config(format!("tolerance {} out of range", self.tolerance)));
        }
        Ok(())
    }

    /// Open the store for this configuration and run the preload.
    pub fn open_store(&self) -> Result<CrosswalkStore, GeoError> {
        self.validate()?;
        let source = DiskSource::open(self.data_dir())
            .map_err(|e| GeoError::Config(format!("{e:#}")))?;
        let store = CrosswalkStore::from_source(source)?
            .with_tolerance(self.tolerance)
            .with_checksums(self.verify_checksums);
        store.preload(&self.preload)?;
        Ok(store)
    }

    pub fn load_rules(&self) -> Result<DisbursementRules, GeoError> {
        match &self.rules {
            Some(path) => DisbursementRules::from_csv_file(path),
            None => DisbursementRules::builtin(),
        }
    }
}

impl Resolver {
    /// Build the whole engine from a configuration.
    pub fn from_config(config: &CrosswalkConfig) -> Result<Self, GeoError> {
        let store = config.open_store()?;
        Ok(Resolver::new(Arc::new(store)).with_rules(config.load_rules()?))
    }
}
