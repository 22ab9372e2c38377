//! Weighted code-to-code mapping tables and the process-scoped cache that
//! loads and certifies them.

mod catalog;
mod load;
mod population;
mod source;
mod store;
mod table;

pub use catalog::{Catalog, PopulationSpec, TableSpec, MANIFEST_FILE};
pub use population::PopulationTable;
pub use source::{DiskSource, MemSource, TableSource};
pub use store::{CrosswalkPath, CrosswalkStore};
pub use table::{CrosswalkEntry, CrosswalkTable, TableKind, Target, DEFAULT_TOLERANCE};
