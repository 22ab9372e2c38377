//! Error types for the crosswalk engine.
//!
//! Every variant here is a hard failure. Row-level anomalies (unmapped codes,
//! unknown disbursement targets) never become errors; they are counted in
//! [`Diagnostics`](crate::Diagnostics) instead.

use crate::geo::GeoType;

/// Error type for all fallible operations in the crate.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GeoError {
    /// A raw code has the wrong width or charset for its kind, or the kind is
    /// not one the engine knows.
    #[error("invalid {kind} code {value:?}: {reason}")]
    InvalidGeoCode {
        /// Kind name as given by the caller.
        kind: String,
        /// Offending raw value.
        value: String,
        /// What was wrong with it.
        reason: &'static str,
    },

    /// The backing file for a catalogued table is missing.
    #[error("crosswalk {from} -> {to} unavailable: missing file {file:?}")]
    CrosswalkUnavailable {
        from: GeoType,
        to: GeoType,
        file: String,
    },

    /// A disaggregating table whose weights for one source code do not sum to 1.
    #[error("crosswalk {from} -> {to} failed integrity check: weights for {code} sum to {weight_sum}")]
    CrosswalkIntegrity {
        from: GeoType,
        to: GeoType,
        code: String,
        weight_sum: f64,
    },

    /// A partition table mapping one source code to several destinations.
    #[error("partition {from} -> {to} maps {code} to {entries} destinations")]
    PartitionViolation {
        from: GeoType,
        to: GeoType,
        code: String,
        entries: usize,
    },

    /// A table file that could not be parsed.
    #[error("malformed table {file:?}: {reason}")]
    MalformedTable {
        file: String,
        reason: String,
    },

    /// A table file whose bytes do not match the catalogued checksum.
    #[error("checksum mismatch for {file:?}: expected {expected}, found {actual}")]
    ChecksumMismatch {
        file: String,
        expected: String,
        actual: String,
    },

    /// No population table is catalogued for a kind.
    #[error("no population table for {kind}")]
    PopulationUnavailable {
        kind: GeoType,
    },

    /// No direct or fips-mediated crosswalk between two kinds.
    #[error("no crosswalk path from {from} to {to}")]
    UnsupportedGeographyPath {
        from: GeoType,
        to: GeoType,
    },

    /// A row keyed by a different kind than the call declared.
    #[error("expected rows keyed by {expected}, found {found}")]
    KindMismatch {
        expected: GeoType,
        found: GeoType,
    },

    /// Metric tags that reference untagged or non-additive components.
    #[error("invalid metric tags: {0}")]
    InvalidMetricTags(String),

    /// A disbursement rule that cannot be certified at load time.
    #[error("invalid disbursement rule for {code:?}: {reason}")]
    InvalidDisbursementRule {
        code: String,
        reason: String,
    },

    /// Configuration could not be read or is inconsistent.
    #[error("configuration error: {0}")]
    Config(String),
}
