//! IO helpers, organized by format rather than domain.
//!
//! - `csv` - CSV reading and writing for crosswalk, population and rule tables
//! - `hash` - SHA-256 digests for catalogued file checksums

pub(crate) mod csv;
pub(crate) mod hash;
