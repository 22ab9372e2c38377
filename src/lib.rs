#![doc = "Geographic crosswalk and weighted-aggregation engine"]
mod config;
mod crosswalk;
mod disburse;
mod error;
mod frame;
mod geo;
mod io;
mod megacounty;
mod population;
mod resolve;

#[doc(inline)]
pub use geo::{GeoId, GeoType, UNALLOCATED_SUFFIX};

#[doc(inline)]
pub use error::GeoError;

#[doc(inline)]
pub use crosswalk::{
    Catalog, CrosswalkEntry, CrosswalkPath, CrosswalkStore, CrosswalkTable, DiskSource, MemSource,
    PopulationSpec, TableKind, TableSource, TableSpec, Target, DEFAULT_TOLERANCE, MANIFEST_FILE,
};

#[doc(inline)]
pub use disburse::{DisbursementPolicy, DisbursementRule, DisbursementRules, PoolTarget, Preprocessor, ScopedRule};

#[doc(inline)]
pub use resolve::{
    AggregatedRow, Diagnostics, MappedRow, MetricKind, MetricTags, Resolution, ResolveOptions, Resolver,
    SourceRow,
};

#[doc(inline)]
pub use population::{PopulationTable, POPULATION};

#[doc(inline)]
pub use megacounty::{fips_to_megacounty, MegacountyOptions};

#[doc(inline)]
pub use frame::{rows_from_csv, rows_from_frame, rows_to_csv_bytes, rows_to_frame, write_rows_csv, FrameColumns};

#[doc(inline)]
pub use config::CrosswalkConfig;
