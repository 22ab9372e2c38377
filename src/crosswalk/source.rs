use std::{collections::HashMap, path::PathBuf, sync::Arc};

use anyhow::{anyhow, bail, Context, Result};

/// Read-only access to table files by data-directory-relative path, e.g.
/// "zip_fips_table.csv", "fips_pop.csv", "manifest.json".
pub trait TableSource: Send + Sync {
    fn get(&self, rel: &str) -> Result<Arc<[u8]>>;
    fn has(&self, rel: &str) -> bool;
}

/// Tables stored as files under a directory.
#[derive(Debug, Clone)]
pub struct DiskSource {
    root: PathBuf,
}

impl DiskSource {
    /// Error unless `root` is an existing directory.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.exists() { bail!("Directory does not exist: {}", root.display()); }
        if !root.is_dir() { bail!("Path exists but is not a directory: {}", root.display()); }
        Ok(Self { root })
    }

    fn full(&self, rel: &str) -> PathBuf { self.root.join(rel) }
}

impl TableSource for DiskSource {
    fn get(&self, rel: &str) -> Result<Arc<[u8]>> {
        let path = self.full(rel);
        let bytes = std::fs::read(&path)
            .with_context(|| format!("[crosswalk::source] Failed to read {}", path.display()))?;
        Ok(Arc::from(bytes))
    }

    fn has(&self, rel: &str) -> bool { self.full(rel).is_file() }
}

/// Tables held in memory, keyed by relative path.
#[derive(Debug, Default, Clone)]
pub struct MemSource {
    files: HashMap<String, Arc<[u8]>>,
}

impl MemSource {
    pub fn new() -> Self { Self::default() }

    /// Add (or replace) a file.
    pub fn with_file(mut self, rel: &str, contents: impl AsRef<[u8]>) -> Self {
        self.files.insert(rel.to_string(), Arc::from(contents.as_ref()));
        self
    }
}

impl TableSource for MemSource {
    fn get(&self, rel: &str) -> Result<Arc<[u8]>> {
        self.files.get(rel).cloned()
            .ok_or_else(|| anyhow!("missing table file: {rel}"))
    }

    fn has(&self, rel: &str) -> bool { self.files.contains_key(rel) }
}
