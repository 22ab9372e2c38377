//! Static state reference table: 2-digit FIPS code, postal code and name.

/// (state FIPS code, lowercase postal code, name)
pub(crate) const STATES: [(&str, &str, &str); 57] = [
    ("01", "al", "Alabama"),
    ("02", "ak", "Alaska"),
    ("04", "az", "Arizona"),
    ("05", "ar", "Arkansas"),
    ("06", "ca", "California"),
    ("08", "co", "Colorado"),
    ("09", "ct", "Connecticut"),
    ("10", "de", "Delaware"),
    ("11", "dc", "District of Columbia"),
    ("12", "fl", "Florida"),
    ("13", "ga", "Georgia"),
    ("15", "hi", "Hawaii"),
    ("16", "id", "Idaho"),
    ("17", "il", "Illinois"),
    ("18", "in", "Indiana"),
    ("19", "ia", "Iowa"),
    ("20", "ks", "Kansas"),
    ("21", "ky", "Kentucky"),
    ("22", "la", "Louisiana"),
    ("23", "me", "Maine"),
    ("24", "md", "Maryland"),
    ("25", "ma", "Massachusetts"),
    ("26", "mi", "Michigan"),
    ("27", "mn", "Minnesota"),
    ("28", "ms", "Mississippi"),
    ("29", "mo", "Missouri"),
    ("30", "mt", "Montana"),
    ("31", "ne", "Nebraska"),
    ("32", "nv", "Nevada"),
    ("33", "nh", "New Hampshire"),
    ("34", "nj", "New Jersey"),
    ("35", "nm", "New Mexico"),
    ("36", "ny", "New York"),
    ("37", "nc", "North Carolina"),
    ("38", "nd", "North Dakota"),
    ("39", "oh", "Ohio"),
    ("40", "ok", "Oklahoma"),
    ("41", "or", "Oregon"),
    ("42", "pa", "Pennsylvania"),
    ("44", "ri", "Rhode Island"),
    ("45", "sc", "South Carolina"),
    ("46", "sd", "South Dakota"),
    ("47", "tn", "Tennessee"),
    ("48", "tx", "Texas"),
    ("49", "ut", "Utah"),
    ("50", "vt", "Vermont"),
    ("51", "va", "Virginia"),
    ("53", "wa", "Washington"),
    ("54", "wv", "West Virginia"),
    ("55", "wi", "Wisconsin"),
    ("56", "wy", "Wyoming"),
    ("60", "as", "American Samoa"),
    ("66", "gu", "Guam"),
    ("69", "mp", "Northern Mariana Islands"),
    ("72", "pr", "Puerto Rico"),
    ("74", "um", "U.S. Minor Outlying Islands"),
    ("78", "vi", "U.S. Virgin Islands"),
];

#[inline]
pub(crate) fn is_postal(code: &str) -> bool {
    STATES.iter().any(|&(_, postal, _)| postal == code)
}

pub(crate) fn postal_from_fips(prefix: &str) -> Option<&'static str> {
    STATES.iter().find(|&&(fips, _, _)| fips == prefix).map(|&(_, postal, _)| postal)
}

pub(crate) fn postal_from_name(name: &str) -> Option<&'static str> {
    STATES.iter()
        .find(|&&(_, _, full)| full.eq_ignore_ascii_case(name))
        .map(|&(_, postal, _)| postal)
}

pub(crate) fn fips_from_postal(code: &str) -> Option<&'static str> {
    STATES.iter().find(|&&(_, postal, _)| postal == code).map(|&(fips, _, _)| fips)
}
