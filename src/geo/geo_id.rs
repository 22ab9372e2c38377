use std::{fmt, sync::Arc};

use crate::error::GeoError;
use super::{geo_type::GeoType, state};

/// Reserved county suffix marking observations not attributable to a county.
pub const UNALLOCATED_SUFFIX: &str = "000";

/// Validated, canonical geographic code.
/// Keep the canonical text (with leading zeros) but avoid repeated owned Strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GeoId {
    ty: GeoType,
    id: Arc<str>, // e.g., "06037" for fips, "ca" for state, "us" for nation
}

impl GeoId {
    /// Parse a raw code of the given kind, rejecting anything not already in
    /// (or trivially normalizable to) canonical form.
    pub fn parse(ty: GeoType, raw: &str) -> Result<Self, GeoError> {
        let raw = raw.trim();
        let invalid = |reason: &'static str| GeoError::InvalidGeoCode {
            kind: ty.to_str().to_string(),
            value: raw.to_string(),
            reason,
        };

        let canonical: String = match ty {
            GeoType::Zip | GeoType::Fips | GeoType::Msa => {
                if raw.len() != 5 || !all_digits(raw) {
                    return Err(invalid("expected exactly 5 digits"));
                }
                raw.to_string()
            }
            // County groups replace the county digits with letters, e.g. "02g01".
            GeoType::ChngFips => {
                let (prefix, rest) = raw.split_at_checked(2).unwrap_or((raw, ""));
                if raw.len() != 5 || !all_digits(prefix) || !rest.bytes().all(|b| b.is_ascii_alphanumeric()) {
                    return Err(invalid("expected a 2-digit state prefix and 3 alphanumerics"));
                }
                raw.to_string()
            }
            GeoType::State => {
                let lower = raw.to_ascii_lowercase();
                if lower.len() != 2 || !lower.bytes().all(|b| b.is_ascii_lowercase()) {
                    return Err(invalid("expected a 2-letter postal code"));
                }
                if !state::is_postal(&lower) {
                    return Err(invalid("unknown postal code"));
                }
                lower
            }
            GeoType::Hrr => numeric(raw, 3, 1..=999).ok_or_else(|| invalid("expected an integer 1-999"))?,
            GeoType::Hhs => numeric(raw, 2, 1..=10).ok_or_else(|| invalid("expected an integer 1-10"))?,
            GeoType::Hsa => numeric(raw, 6, 1..=999_999).ok_or_else(|| invalid("expected an integer of at most 6 digits"))?,
            GeoType::Uid => {
                if raw.is_empty() || raw.len() > 10 || !all_digits(raw) {
                    return Err(invalid("expected 1-10 digits"));
                }
                raw.to_string()
            }
            GeoType::Nation => {
                if !raw.eq_ignore_ascii_case("us") {
                    return Err(invalid("the only nation code is \"us\""));
                }
                "us".to_string()
            }
        };

        Ok(Self { ty, id: Arc::from(canonical) })
    }

    /// Parse a kind name and raw code together.
    pub fn parse_kind(kind: &str, raw: &str) -> Result<Self, GeoError> {
        Self::parse(kind.parse()?, raw)
    }

    /// Build a code from a number that lost its zero padding upstream
    /// (e.g. a FIPS column inferred as an integer).
    pub fn from_number(ty: GeoType, n: u64) -> Result<Self, GeoError> {
        match ty.fixed_width() {
            Some(width) => Self::parse(ty, &format!("{n:0>width$}")),
            None => Self::parse(ty, &n.to_string()),
        }
    }

    /// Parse a state from a postal code, 2-digit state FIPS code or full name.
    pub fn state_from_alias(raw: &str) -> Result<Self, GeoError> {
        let raw = raw.trim();
        let postal = if raw.len() == 2 && all_digits(raw) {
            state::postal_from_fips(raw)
        } else if raw.len() == 2 {
            Some(raw)
        } else {
            state::postal_from_name(raw)
        };
        match postal {
            Some(code) => Self::parse(GeoType::State, code),
            None => Err(GeoError::InvalidGeoCode {
                kind: GeoType::State.to_str().to_string(),
                value: raw.to_string(),
                reason: "not a state postal code, FIPS code or name",
            }),
        }
    }

    /// The nation code.
    pub fn nation() -> Self {
        Self { ty: GeoType::Nation, id: Arc::from("us") }
    }

    #[inline] pub fn ty(&self) -> GeoType { self.ty }

    #[inline] pub fn id(&self) -> &str { &self.id }

    /// Canonical string form.
    pub fn canonicalize(&self) -> String { self.id.to_string() }

    #[inline]
    fn is_county_like(&self) -> bool {
        matches!(self.ty, GeoType::Fips | GeoType::ChngFips)
    }

    /// True for a county code carrying the reserved "unallocated" suffix,
    /// i.e. a state-wide bucket with no county attribution.
    pub fn is_unallocated(&self) -> bool {
        self.is_county_like() && self.id.ends_with(UNALLOCATED_SUFFIX)
    }

    /// The state megacounty (`SS000`) a county or county group collapses
    /// into, of the same kind.
    pub fn megacounty(&self) -> Option<GeoId> {
        self.is_county_like().then(|| GeoId {
            ty: self.ty,
            id: Arc::from(format!("{}{}", &self.id[..2], UNALLOCATED_SUFFIX)),
        })
    }

    /// Returns the state a county belongs to by its 2-digit FIPS prefix.
    pub fn state_fips(&self) -> Option<GeoId> {
        if !self.is_county_like() { return None }
        state::postal_from_fips(&self.id[..2]).map(|postal| GeoId {
            ty: GeoType::State,
            id: Arc::from(postal),
        })
    }

    /// The 2-digit state FIPS code for a state id.
    pub fn state_code(&self) -> Option<&'static str> {
        (self.ty == GeoType::State).then(|| state::fips_from_postal(&self.id)).flatten()
    }
}

impl fmt::Display for GeoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ty, self.id)
    }
}

#[inline]
fn all_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Integer codes of source-defined width, canonicalised without leading zeros.
fn numeric(raw: &str, max_digits: usize, range: std::ops::RangeInclusive<u32>) -> Option<String> {
    let trimmed = raw.trim_start_matches('0');
    if !all_digits(raw) || trimmed.len() > max_digits { return None }
    let value: u32 = trimmed.parse().ok()?;
    range.contains(&value).then(|| value.to_string())
}
