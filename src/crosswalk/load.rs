//! Parsing of crosswalk and population files into validated tables.

use anyhow::{anyhow, bail, Result};

use crate::{
    error::GeoError,
    geo::{GeoId, GeoType},
    io::csv::{find_column, read_csv_bytes, string_values},
};
use super::{
    population::PopulationTable,
    table::{CrosswalkEntry, CrosswalkTable, TableKind},
};

/// Parse crosswalk CSV bytes (`from_code,to_code[,weight]` or named by kind)
/// and certify the result.
pub(crate) fn parse_crosswalk(
    file: &str,
    bytes: &[u8],
    from: GeoType,
    to: GeoType,
    kind: TableKind,
    tolerance: f64,
) -> Result<CrosswalkTable, GeoError> {
    let entries = read_entries(bytes, from, to, kind)
        .map_err(|e| GeoError::MalformedTable { file: file.to_string(), reason: format!("{e:#}") })?;
    CrosswalkTable::from_entries(from, to, kind, entries, tolerance)
        .map_err(|e| match e {
            GeoError::MalformedTable { reason, .. } => GeoError::MalformedTable { file: file.to_string(), reason },
            other => other,
        })
}

fn read_entries(bytes: &[u8], from: GeoType, to: GeoType, kind: TableKind) -> Result<Vec<CrosswalkEntry>> {
    let df = read_csv_bytes(bytes)?;
    let from_col = find_column(&df, &[from.to_str(), "from_code"])
        .ok_or_else(|| anyhow!("no {:?} or \"from_code\" column", from.to_str()))?;
    let to_col = find_column(&df, &[to.to_str(), "to_code"])
        .ok_or_else(|| anyhow!("no {:?} or \"to_code\" column", to.to_str()))?;

    let from_codes = string_values(from_col)?;
    let to_codes = string_values(to_col)?;
    let weights = match find_column(&df, &["weight"]) {
        Some(col) => string_values(col)?,
        None if kind == TableKind::Partition => vec![None; df.height()],
        None => bail!("disaggregating table has no \"weight\" column"),
    };

    from_codes.into_iter().zip(to_codes).zip(weights).enumerate()
        .map(|(row, ((src, dst), weight))| -> Result<CrosswalkEntry> {
            let line = row + 2; // header is line 1
            let src = src.ok_or_else(|| anyhow!("line {line}: empty {from} code"))?;
            let dst = dst.ok_or_else(|| anyhow!("line {line}: empty {to} code"))?;
            let weight = match weight {
                Some(w) => w.parse::<f64>()
                    .map_err(|_| anyhow!("line {line}: weight {w:?} is not a number"))?,
                None if kind == TableKind::Partition => 1.0,
                None => bail!("line {line}: missing weight"),
            };
            Ok(CrosswalkEntry {
                from: GeoId::parse(from, &src).map_err(|e| anyhow!("line {line}: {e}"))?,
                to: GeoId::parse(to, &dst).map_err(|e| anyhow!("line {line}: {e}"))?,
                weight,
            })
        })
        .collect()
}

/// Parse population CSV bytes (`<kind>|code`, `pop|population`).
pub(crate) fn parse_population(file: &str, bytes: &[u8], kind: GeoType) -> Result<PopulationTable, GeoError> {
    read_population(bytes, kind)
        .map_err(|e| GeoError::MalformedTable { file: file.to_string(), reason: format!("{e:#}") })
}

fn read_population(bytes: &[u8], kind: GeoType) -> Result<PopulationTable> {
    let df = read_csv_bytes(bytes)?;
    let code_col = find_column(&df, &[kind.to_str(), "code"])
        .ok_or_else(|| anyhow!("no {:?} or \"code\" column", kind.to_str()))?;
    let pop_col = find_column(&df, &["pop", "population"])
        .ok_or_else(|| anyhow!("no \"pop\" or \"population\" column"))?;

    let counts = string_values(code_col)?.into_iter().zip(string_values(pop_col)?).enumerate()
        .map(|(row, (code, pop))| -> Result<(GeoId, f64)> {
            let line = row + 2;
            let code = code.ok_or_else(|| anyhow!("line {line}: empty {kind} code"))?;
            let pop = pop.ok_or_else(|| anyhow!("line {line}: empty population"))?;
            let pop = pop.parse::<f64>()
                .map_err(|_| anyhow!("line {line}: population {pop:?} is not a number"))?;
            if !pop.is_finite() || pop < 0.0 {
                bail!("line {line}: population {pop} out of range");
            }
            Ok((GeoId::parse(kind, &code).map_err(|e| anyhow!("line {line}: {e}"))?, pop))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(PopulationTable::new(kind, counts))
}
