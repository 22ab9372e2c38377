//! Conversion between row tables and polars `DataFrame`s.

use std::{collections::BTreeSet, path::Path};

use anyhow::{anyhow, bail, Context, Result};
use chrono::NaiveDate;
use polars::prelude::{Column, DataFrame, DataType};

use crate::{
    geo::{GeoId, GeoType},
    io::csv::{f64_values, read_csv_file, string_values, write_csv, write_csv_bytes},
    resolve::{AggregatedRow, SourceRow},
};

/// Which frame columns hold the code, the date, and the metrics.
#[derive(Debug, Clone)]
pub struct FrameColumns {
    pub geo: String,
    pub time: String,
    pub metrics: Vec<String>,
}

impl FrameColumns {
    pub fn new(geo: &str, time: &str, metrics: &[&str]) -> Self {
        Self {
            geo: geo.to_string(),
            time: time.to_string(),
            metrics: metrics.iter().map(|m| m.to_string()).collect(),
        }
    }
}

/// Build source rows from a frame. String code columns are parsed strictly;
/// integer code columns (which lost their leading zeros upstream) are
/// zero-padded. Null metric cells are skipped.
pub fn rows_from_frame(df: &DataFrame, kind: GeoType, columns: &FrameColumns) -> Result<Vec<SourceRow>> {
    let geo = geo_values(df.column(&columns.geo)?, kind)?;
    let time = date_values(df.column(&columns.time)?)?;
    let mut metrics = Vec::with_capacity(columns.metrics.len());
    for name in &columns.metrics {
        metrics.push((name.as_str(), f64_values(df.column(name)?)?));
    }

    let mut rows = Vec::with_capacity(df.height());
    for (i, (geo, time)) in geo.into_iter().zip(time).enumerate() {
        let mut row = SourceRow::new(geo, time);
        for (name, values) in &metrics {
            if let Some(v) = values[i] {
                row.metrics.insert(name.to_string(), v);
            }
        }
        rows.push(row);
    }
    Ok(rows)
}

/// Read a CSV file straight into source rows.
pub fn rows_from_csv(path: &Path, kind: GeoType, columns: &FrameColumns) -> Result<Vec<SourceRow>> {
    let df = read_csv_file(path)?;
    rows_from_frame(&df, kind, columns)
        .with_context(|| format!("[frame] Failed to read rows from {}", path.display()))
}

/// One string code column, one `YYYY-MM-DD` date column, and one f64 column
/// per metric (sorted by name, null where absent). Unmapped rows have a null
/// code.
pub fn rows_to_frame(rows: &[AggregatedRow], geo_col: &str, time_col: &str) -> Result<DataFrame> {
    let names: BTreeSet<&str> = rows.iter()
        .flat_map(|r| r.metrics.keys().map(String::as_str))
        .collect();
    if names.contains(geo_col) || names.contains(time_col) {
        bail!("[frame] Metric name collides with {geo_col:?} or {time_col:?}");
    }

    let geo: Vec<Option<String>> = rows.iter().map(|r| r.geo.as_ref().map(GeoId::canonicalize)).collect();
    let time: Vec<String> = rows.iter().map(|r| r.time.format("%Y-%m-%d").to_string()).collect();

    let mut columns = vec![
        Column::new(geo_col.into(), geo),
        Column::new(time_col.into(), time),
    ];
    for name in names {
        let values: Vec<Option<f64>> = rows.iter().map(|r| r.get(name)).collect();
        columns.push(Column::new(name.into(), values));
    }
    DataFrame::new(columns).context("[frame] Failed to build output frame")
}

/// Write reduced rows as CSV.
pub fn write_rows_csv(rows: &[AggregatedRow], geo_col: &str, time_col: &str, path: &Path) -> Result<()> {
    let mut df = rows_to_frame(rows, geo_col, time_col)?;
    write_csv(&mut df, path)
}

/// Reduced rows as CSV bytes.
pub fn rows_to_csv_bytes(rows: &[AggregatedRow], geo_col: &str, time_col: &str) -> Result<Vec<u8>> {
    let mut df = rows_to_frame(rows, geo_col, time_col)?;
    write_csv_bytes(&mut df)
}

fn geo_values(col: &Column, kind: GeoType) -> Result<Vec<GeoId>> {
    if col.dtype().is_integer() {
        let col = col.cast(&DataType::UInt64)
            .with_context(|| format!("[frame] Column {:?} has negative codes", col.name()))?;
        return col.u64()?
            .into_iter()
            .enumerate()
            .map(|(i, v)| -> Result<GeoId> {
                let n = v.ok_or_else(|| anyhow!("[frame] row {i}: null {kind} code"))?;
                Ok(GeoId::from_number(kind, n)?)
            })
            .collect();
    }
    string_values(col)?
        .into_iter()
        .enumerate()
        .map(|(i, v)| -> Result<GeoId> {
            let raw = v.ok_or_else(|| anyhow!("[frame] row {i}: null {kind} code"))?;
            Ok(GeoId::parse(kind, &raw)?)
        })
        .collect()
}

fn date_values(col: &Column) -> Result<Vec<NaiveDate>> {
    string_values(col)?
        .into_iter()
        .enumerate()
        .map(|(i, v)| -> Result<NaiveDate> {
            let raw = v.ok_or_else(|| anyhow!("[frame] row {i}: null date"))?;
            parse_date(&raw).ok_or_else(|| anyhow!("[frame] row {i}: unrecognized date {raw:?}"))
        })
        .collect()
}

/// `YYYY-MM-DD` or `YYYYMMDD`.
fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y%m%d"))
        .ok()
}
