//! Collapse of sparsely reporting counties into state "megacounties".

use std::collections::BTreeMap;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    error::GeoError,
    geo::{GeoId, GeoType},
    resolve::{Accumulator, MetricTags, Resolution, SourceRow},
};

/// When a county keeps its own code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MegacountyOptions {
    /// Metric whose trailing sum is compared against `threshold`.
    pub threshold_metric: String,
    /// A county keeps its code on days where the trailing sum exceeds this.
    pub threshold: f64,
    /// Trailing window length in days, including the current day.
    pub window_days: u32,
}

/// Replace each county by its state megacounty (`SS000`) on days where the
/// trailing sum of the threshold metric over `window_days` does not exceed
/// `threshold`, then reduce by `(code, time)`.
///
/// Rows may be `fips` or `chng-fips`, but not a mix; megacounties keep the
/// kind of their input.
pub fn fips_to_megacounty(
    rows: Vec<SourceRow>,
    tags: &MetricTags,
    opts: &MegacountyOptions,
) -> Result<Resolution, GeoError> {
    tags.validate()?;
    if opts.window_days == 0 {
        return Err(GeoError::Config("megacounty window must be at least one day".into()));
    }

    let kind = match rows.first().map(|r| r.geo.ty()) {
        Some(GeoType::ChngFips) => GeoType::ChngFips,
        _ => GeoType::Fips,
    };
    let mut by_county: BTreeMap<GeoId, Vec<SourceRow>> = BTreeMap::new();
    for row in rows {
        if row.geo.ty() != kind {
            return Err(GeoError::KindMismatch { expected: kind, found: row.geo.ty() });
        }
        by_county.entry(row.geo.clone()).or_default().push(row);
    }

    let mut acc = Accumulator::new(tags);
    let mut collapsed = 0usize;
    for (county, mut series) in by_county {
        series.sort_by_key(|r| r.time);
        let sums = trailing_sums(&series, &opts.threshold_metric, opts.window_days);
        let mega = county.megacounty();
        for (row, sum) in series.iter().zip(sums) {
            let dest = match &mega {
                Some(mega) if sum <= opts.threshold => {
                    collapsed += 1;
                    mega.clone()
                }
                _ => county.clone(),
            };
            acc.add(dest, row.time, &row.metrics, 1.0);
        }
    }
    debug!(collapsed, groups = acc.len(), "megacounty rollup");
    Ok(Resolution { rows: acc.finish(), diagnostics: Default::default() })
}

/// Sum of `metric` over `[t - window + 1, t]` for each row of a sorted series.
/// Missing days and missing values count as zero.
fn trailing_sums(series: &[SourceRow], metric: &str, window_days: u32) -> Vec<f64> {
    let span = Days::new(u64::from(window_days - 1));
    let mut out = Vec::with_capacity(series.len());
    let mut start = 0;
    let mut running = 0.0;
    for (i, row) in series.iter().enumerate() {
        running += row.get(metric).unwrap_or(0.0);
        let earliest = row.time.checked_sub_days(span).unwrap_or(NaiveDate::MIN);
        while series[start].time < earliest {
            running -= series[start].get(metric).unwrap_or(0.0);
            start += 1;
        }
        debug_assert!(start <= i);
        out.push(running);
    }
    out
}
