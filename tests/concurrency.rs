// Integration tests for sharing one store across worker threads:
//   load-once caching, concurrent resolves

mod common;

use std::{sync::Arc, thread};

use geocrosswalk::{GeoType, MetricTags, ResolveOptions};

#[test]
fn concurrent_first_loads_share_one_table() {
    let tmp = common::data_dir();
    let store = common::store(&tmp);

    let tables = thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|_| s.spawn(|| store.get(GeoType::Zip, GeoType::Msa).unwrap()))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect::<Vec<_>>()
    });
    assert!(tables.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
}

#[test]
fn concurrent_resolves_agree() {
    let tmp = common::data_dir();
    let resolver = common::resolver(&tmp);
    let tags = MetricTags::new()
        .additive("cases")
        .additive("population")
        .rate("incidence", "cases", "population", 100_000.0);
    let rows = vec![
        common::row(GeoType::Fips, "51059", 1).with("cases", 115.0),
        common::row(GeoType::Fips, "51013", 1).with("cases", 24.0),
        common::row(GeoType::Fips, "11001", 2).with("cases", 69.0),
    ];
    let expected = resolver
        .resolve(rows.clone(), GeoType::Fips, GeoType::State, &tags, &ResolveOptions::default())
        .unwrap();

    thread::scope(|s| {
        for to in [GeoType::State, GeoType::Msa, GeoType::Nation, GeoType::State] {
            let resolver = resolver.clone();
            let (rows, tags, expected) = (rows.clone(), &tags, &expected);
            s.spawn(move || {
                let res = resolver.resolve(rows, GeoType::Fips, to, tags, &ResolveOptions::default()).unwrap();
                if to == GeoType::State {
                    assert_eq!(&res, expected);
                }
                let cases: f64 = res.rows.iter().filter_map(|r| r.get("cases")).sum();
                assert!((cases - 208.0).abs() < 1e-9);
            });
        }
    });
}
