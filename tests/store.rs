// Integration tests for loading tables from disk:
//   default layout, manifest catalogs, checksums, integrity failures,
//   code enumeration, configuration

mod common;

use std::fs;

use geocrosswalk::{
    Catalog, CrosswalkConfig, CrosswalkStore, DiskSource, GeoError, GeoId, GeoType, MetricTags,
    ResolveOptions, Resolver, TableKind, MANIFEST_FILE,
};

#[test]
fn default_layout_without_manifest() {
    let tmp = tempfile::tempdir().unwrap();
    common::write_tables(tmp.path());
    let store = CrosswalkStore::from_source(DiskSource::open(tmp.path()).unwrap()).unwrap();

    assert_eq!(store.catalog().version(), "1");
    let table = store.get(GeoType::Zip, GeoType::Fips).unwrap();
    assert_eq!(table.kind(), TableKind::Disaggregating);
    assert_eq!(table.len(), 6);

    // Catalogued by default but not shipped in this directory.
    let err = store.get(GeoType::Zip, GeoType::Msa).unwrap_err();
    assert!(matches!(err, GeoError::CrosswalkUnavailable { ref file, .. } if file == "zip_msa_table.csv"));
}

#[test]
fn manifest_catalog_composes_missing_pairs() {
    let tmp = common::data_dir();
    let store = common::store(&tmp);
    assert_eq!(store.catalog().version(), "test");
    assert!(store.has_path(GeoType::Zip, GeoType::Msa));
    assert!(!store.has_path(GeoType::Zip, GeoType::Hhs));

    let composed = store.get(GeoType::Zip, GeoType::Msa).unwrap();
    let zip = GeoId::parse(GeoType::Zip, "10001").unwrap();
    let targets = composed.targets(&zip);
    assert_eq!(targets.len(), 1);
    assert_eq!(targets[0].code.id(), "35620");
}

#[test]
fn weights_not_summing_to_one_are_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    fs::write(tmp.path().join("zip_fips_table.csv"), "zip,fips,weight\n22101,51059,0.6\n22101,51013,0.3\n").unwrap();
    let store = CrosswalkStore::from_source(DiskSource::open(tmp.path()).unwrap()).unwrap();
    match store.get(GeoType::Zip, GeoType::Fips) {
        Err(GeoError::CrosswalkIntegrity { code, weight_sum, .. }) => {
            assert_eq!(code, "22101");
            assert!((weight_sum - 0.9).abs() < 1e-9);
        }
        other => panic!("expected integrity error, got {other:?}"),
    }
}

#[test]
fn partition_with_two_destinations_is_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    fs::write(tmp.path().join("fips_state_table.csv"), "fips,state\n51059,va\n51059,md\n").unwrap();
    let store = CrosswalkStore::from_source(DiskSource::open(tmp.path()).unwrap()).unwrap();
    assert!(matches!(
        store.get(GeoType::Fips, GeoType::State),
        Err(GeoError::PartitionViolation { entries: 2, .. })
    ));
}

#[test]
fn malformed_codes_are_fatal() {
    let tmp = tempfile::tempdir().unwrap();
    fs::write(tmp.path().join("fips_state_table.csv"), "fips,state\n6037,ca\n").unwrap();
    let store = CrosswalkStore::from_source(DiskSource::open(tmp.path()).unwrap()).unwrap();
    assert!(matches!(
        store.get(GeoType::Fips, GeoType::State),
        Err(GeoError::MalformedTable { .. })
    ));
}

#[test]
fn manifest_checksums_are_enforced() {
    let tmp = tempfile::tempdir().unwrap();
    common::write_tables(tmp.path());
    let manifest = Catalog::empty()
        .with_table(GeoType::Fips, GeoType::State, TableKind::Partition, "fips_state_table.csv")
        .with_checksum("fips_state_table.csv", &"0".repeat(64));
    fs::write(tmp.path().join(MANIFEST_FILE), serde_json::to_string(&manifest).unwrap()).unwrap();

    let open = || CrosswalkStore::from_source(DiskSource::open(tmp.path()).unwrap()).unwrap();
    assert!(matches!(
        open().get(GeoType::Fips, GeoType::State),
        Err(GeoError::ChecksumMismatch { .. })
    ));
    assert!(open().with_checksums(false).get(GeoType::Fips, GeoType::State).is_ok());
}

#[test]
fn enumerates_codes() {
    let tmp = common::data_dir();
    let store = common::store(&tmp);

    let states = store.geo_values(GeoType::State).unwrap();
    let ids: Vec<_> = states.iter().map(GeoId::id).collect();
    assert_eq!(ids, vec!["dc", "ny", "va"]);

    let region3 = GeoId::parse(GeoType::Hhs, "3").unwrap();
    let within = store.geos_within(&region3, GeoType::State).unwrap();
    let ids: Vec<_> = within.iter().map(GeoId::id).collect();
    assert_eq!(ids, vec!["dc", "va"]);

    let everywhere = store.geos_within(&GeoId::nation(), GeoType::State).unwrap();
    assert_eq!(everywhere.len(), 3);
}

#[test]
fn preload_loads_eagerly_and_reports_missing_files() {
    let tmp = common::data_dir();
    let store = common::store(&tmp);
    store.preload(&[(GeoType::Zip, GeoType::Fips), (GeoType::Fips, GeoType::Nation)]).unwrap();
    assert!(matches!(
        store.preload(&[(GeoType::Fips, GeoType::Hrr)]),
        Err(GeoError::CrosswalkUnavailable { .. })
    ));
}

#[test]
fn engine_from_config_file() {
    let tmp = common::data_dir();
    let config_path = tmp.path().join("config.json");
    let json = serde_json::json!({
        "root": tmp.path(),
        "preload": [["zip", "county"], ["county", "state_id"]],
    });
    fs::write(&config_path, json.to_string()).unwrap();

    let config = CrosswalkConfig::from_file(&config_path).unwrap();
    assert_eq!(config.preload, vec![(GeoType::Zip, GeoType::Fips), (GeoType::Fips, GeoType::State)]);
    let resolver = Resolver::from_config(&config).unwrap();
    assert!(!resolver.rules().is_empty());

    let tags = MetricTags::new().additive("cases");
    let rows = vec![common::row(GeoType::Fips, "00001", 1).with("cases", 5.0)];
    let res = resolver.resolve(rows, GeoType::Fips, GeoType::State, &tags, &ResolveOptions::default()).unwrap();
    // NYC pool lands entirely in ny.
    assert_eq!(res.rows.len(), 1);
    assert!((res.rows[0].get("cases").unwrap() - 5.0).abs() < 1e-9);

    // George County stays itself at county level.
    let rows = vec![common::row(GeoType::Fips, "28039", 1).with("cases", 7.0)];
    let res = resolver.resolve(rows, GeoType::Fips, GeoType::Fips, &tags, &ResolveOptions::default()).unwrap();
    assert_eq!(res.rows.len(), 1);
    assert_eq!(res.rows[0].geo.as_ref().unwrap().id(), "28039");

    let bad = CrosswalkConfig { preload: vec![(GeoType::Fips, GeoType::Hrr)], ..config };
    assert!(Resolver::from_config(&bad).is_err());
}
