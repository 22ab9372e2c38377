// Shared fixtures: a small data directory in the default catalog layout.

#![allow(dead_code)]

use std::{fs, path::Path, sync::Arc};

use chrono::NaiveDate;
use geocrosswalk::{CrosswalkStore, DiskSource, GeoId, GeoType, Resolver, SourceRow};
use tempfile::TempDir;

pub const ZIP_FIPS: &str = "\
zip,fips,weight
22101,51059,0.6
22101,51013,0.4
22201,51013,1
20001,11001,1
10001,36061,0.9
10001,36047,0.1
";

pub const FIPS_STATE: &str = "\
fips,state
51059,va
51013,va
51093,va
51175,va
51000,va
11001,dc
36061,ny
36047,ny
36005,ny
36081,ny
36085,ny
36000,ny
";

pub const FIPS_MSA: &str = "\
fips,msa
51059,47900
51013,47900
11001,47900
36061,35620
36047,35620
51093,47260
51175,47260
28059,37700
";

pub const STATE_HHS: &str = "\
state,hhs
va,3
dc,3
ny,2
";

pub const FIPS_POP: &str = "\
fips,pop
51059,1150000
51013,238000
51093,38000
51175,18000
11001,690000
36061,1600000
36047,2600000
36005,1400000
36081,2300000
36085,500000
";

pub const MANIFEST: &str = r#"{
  "version": "test",
  "tables": [
    {"from": "zip", "to": "fips", "file": "zip_fips_table.csv", "kind": "disaggregating"},
    {"from": "fips", "to": "state", "file": "fips_state_table.csv", "kind": "partition"},
    {"from": "fips", "to": "msa", "file": "fips_msa_table.csv", "kind": "partition"},
    {"from": "fips", "to": "hrr", "file": "fips_hrr_table.csv", "kind": "disaggregating"},
    {"from": "state", "to": "hhs", "file": "state_hhs_table.csv", "kind": "partition"}
  ],
  "populations": [
    {"kind": "fips", "file": "fips_pop.csv"}
  ]
}"#;

/// Tables only; no manifest, so the default catalog applies.
pub fn write_tables(dir: &Path) {
    fs::create_dir_all(dir).unwrap();
    fs::write(dir.join("zip_fips_table.csv"), ZIP_FIPS).unwrap();
    fs::write(dir.join("fips_state_table.csv"), FIPS_STATE).unwrap();
    fs::write(dir.join("fips_msa_table.csv"), FIPS_MSA).unwrap();
    fs::write(dir.join("state_hhs_table.csv"), STATE_HHS).unwrap();
    fs::write(dir.join("fips_pop.csv"), FIPS_POP).unwrap();
}

pub fn write_data_dir(root: &Path) {
    let dir = root.join("2020");
    write_tables(&dir);
    fs::write(dir.join("manifest.json"), MANIFEST).unwrap();
}

/// Temp dir with the fixture tables under `2020/`.
pub fn data_dir() -> TempDir {
    let tmp = tempfile::tempdir().unwrap();
    write_data_dir(tmp.path());
    tmp
}

pub fn store(tmp: &TempDir) -> CrosswalkStore {
    let source = DiskSource::open(tmp.path().join("2020")).unwrap();
    CrosswalkStore::from_source(source).unwrap()
}

pub fn resolver(tmp: &TempDir) -> Resolver {
    Resolver::new(Arc::new(store(tmp)))
}

pub fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2020, 7, d).unwrap()
}

pub fn row(kind: GeoType, code: &str, d: u32) -> SourceRow {
    SourceRow::new(GeoId::parse(kind, code).unwrap(), day(d))
}
