//! CSV reading operations.

use std::{fs::File, io::Cursor, path::Path};

use anyhow::{Context, Result};
use polars::{frame::DataFrame, io::SerReader, prelude::{Column, CsvReadOptions, DataType}};

/// Read CSV bytes into a DataFrame with every column typed as a string,
/// so zero-padded codes (e.g. "06037") keep their leading zeros.
pub(crate) fn read_csv_bytes(bytes: &[u8]) -> Result<DataFrame> {
    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .into_reader_with_file_handle(Cursor::new(bytes))
        .finish()
        .context("[io::csv::read] Failed to read CSV from bytes")
}

/// Reads a CSV file from `path` with all columns as strings.
pub(crate) fn read_csv_file(path: &Path) -> Result<DataFrame> {
    let file = File::open(path)
        .with_context(|| format!("[io::csv::read] Failed to open CSV file: {}", path.display()))?;
    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .into_reader_with_file_handle(file)
        .finish()
        .with_context(|| format!("[io::csv::read] Failed to read CSV from {:?}", path))
}

/// First column among `names` present in `df`.
pub(crate) fn find_column<'a>(df: &'a DataFrame, names: &[&str]) -> Option<&'a Column> {
    names.iter().find_map(|name| df.column(name).ok())
}

/// Values of a column as owned strings, nulls and empty cells as `None`.
pub(crate) fn string_values(col: &Column) -> Result<Vec<Option<String>>> {
    let col = col.cast(&DataType::String)
        .with_context(|| format!("[io::csv::read] Column {:?} cannot be read as text", col.name()))?;
    Ok(col.str()?
        .into_iter()
        .map(|v| v.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string))
        .collect())
}

/// Values of a column as floats, nulls and unparseable cells as `None`.
pub(crate) fn f64_values(col: &Column) -> Result<Vec<Option<f64>>> {
    let col = col.cast(&DataType::Float64)
        .with_context(|| format!("[io::csv::read] Column {:?} cannot be read as numbers", col.name()))?;
    Ok(col.f64()?.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_leading_zeros() {
        let df = read_csv_bytes(b"fips,state\n01001,al\n06037,ca\n").unwrap();
        let fips = string_values(df.column("fips").unwrap()).unwrap();
        assert_eq!(fips, vec![Some("01001".to_string()), Some("06037".to_string())]);
    }

    #[test]
    fn empty_cells_are_none() {
        let df = read_csv_bytes(b"code,target,weight\n00001,36061,\n00001,36005,0.5\n").unwrap();
        let weights = string_values(df.column("weight").unwrap()).unwrap();
        assert_eq!(weights, vec![None, Some("0.5".to_string())]);
    }

    #[test]
    fn find_column_prefers_first_match() {
        let df = read_csv_bytes(b"from_code,zip\n1,2\n").unwrap();
        let col = find_column(&df, &["zip", "from_code"]).unwrap();
        assert_eq!(col.name().as_str(), "zip");
        assert!(find_column(&df, &["fips"]).is_none());
    }

    #[test]
    fn reads_numbers() {
        let df = read_csv_bytes(b"pop\n100\n2.5\n").unwrap();
        assert_eq!(f64_values(df.column("pop").unwrap()).unwrap(), vec![Some(100.0), Some(2.5)]);
    }
}
