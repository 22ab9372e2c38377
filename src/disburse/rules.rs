use std::path::Path;

use ahash::AHashMap;
use anyhow::{anyhow, bail, Context, Result};

use crate::{
    error::GeoError,
    geo::{GeoId, GeoType},
    io::csv::{find_column, read_csv_bytes, read_csv_file, string_values},
};

const BUILTIN_RULES: &str = include_str!("../../data/disbursement_rules.csv");

/// Tolerance on published pool weights.
const WEIGHT_TOLERANCE: f64 = 1e-6;

/// How a pooled row's additive metrics are split across its targets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DisbursementPolicy {
    /// Every listed target receives `1/n` of the value.
    #[default]
    Equal,
    /// Targets receive their published share; pools without published
    /// shares fall back to `Equal`.
    Weighted,
}

/// One destination of a pooled code. Kept raw: targets are only checked
/// against the codes a particular call knows about.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolTarget {
    pub code: String,
    pub weight: Option<f64>,
}

/// A known anomaly in source data.
#[derive(Debug, Clone, PartialEq)]
pub enum DisbursementRule {
    /// A code standing for several real codes.
    Pool(Vec<PoolTarget>),
    /// A superseded code and its current replacement.
    Relabel(String),
}

impl DisbursementRule {
    /// Shares of a pooled value per target under `policy`, in listing order.
    /// A target listed twice receives two shares.
    pub fn shares(&self, policy: DisbursementPolicy) -> Vec<(&str, f64)> {
        match self {
            DisbursementRule::Relabel(target) => vec![(target.as_str(), 1.0)],
            DisbursementRule::Pool(targets) => {
                let weighted = policy == DisbursementPolicy::Weighted
                    && targets.iter().all(|t| t.weight.is_some());
                let equal = 1.0 / targets.len() as f64;
                targets.iter()
                    .map(|t| (t.code.as_str(), if weighted { t.weight.unwrap_or(equal) } else { equal }))
                    .collect()
            }
        }
    }
}

/// A rule plus the destination kinds it is applied for. An empty scope
/// applies to every destination.
#[derive(Debug, Clone, PartialEq)]
pub struct ScopedRule {
    pub rule: DisbursementRule,
    pub applies_to: Vec<GeoType>,
}

impl ScopedRule {
    #[inline]
    pub fn applies(&self, to: GeoType) -> bool {
        self.applies_to.is_empty() || self.applies_to.contains(&to)
    }
}

/// The audited list of pooled and relabelled codes, keyed by source code.
#[derive(Debug, Clone, Default)]
pub struct DisbursementRules {
    rules: AHashMap<GeoId, ScopedRule>,
}

impl DisbursementRules {
    /// No rules; rows pass through untouched.
    pub fn empty() -> Self { Self::default() }

    /// Rules shipped with the crate.
    pub fn builtin() -> Result<Self, GeoError> {
        Self::from_csv_bytes(BUILTIN_RULES.as_bytes())
    }

    /// Parse a rule file with columns `geo_type,action,code,target` and
    /// optional `weight` and `applies_to` (destination kinds separated by
    /// `;`, empty for all).
    pub fn from_csv_bytes(bytes: &[u8]) -> Result<Self, GeoError> {
        let df = read_csv_bytes(bytes).map_err(malformed)?;
        Self::from_frame(&df)
    }

    pub fn from_csv_file(path: &Path) -> Result<Self, GeoError> {
        let df = read_csv_file(path).map_err(malformed)?;
        Self::from_frame(&df)
    }

    fn from_frame(df: &polars::frame::DataFrame) -> Result<Self, GeoError> {
        let rows = read_rows(df).map_err(malformed)?;
        let mut rules = Self::empty();
        for row in rows {
            rules = match row.action.as_str() {
                "pool" => rules.add_pool_target(row.ty, &row.code, row.target, row.weight)?,
                "relabel" => rules.relabel(row.ty, &row.code, &row.target)?,
                other => return Err(GeoError::InvalidDisbursementRule {
                    code: row.code,
                    reason: format!("unknown action {other:?}"),
                }),
            };
            if !row.applies_to.is_empty() {
                rules = rules.applies_to(row.ty, &row.code, &row.applies_to)?;
            }
        }
        rules.validate()?;
        Ok(rules)
    }

    /// Split `code` equally across `targets`.
    pub fn pool(self, ty: GeoType, code: &str, targets: &[&str]) -> Result<Self, GeoError> {
        let mut rules = self;
        for target in targets {
            rules = rules.add_pool_target(ty, code, target.to_string(), None)?;
        }
        rules.validate()?;
        Ok(rules)
    }

    /// Split `code` across `targets` with published shares summing to 1.
    pub fn pool_weighted(self, ty: GeoType, code: &str, targets: &[(&str, f64)]) -> Result<Self, GeoError> {
        let mut rules = self;
        for &(target, weight) in targets {
            rules = rules.add_pool_target(ty, code, target.to_string(), Some(weight))?;
        }
        rules.validate()?;
        Ok(rules)
    }

    /// Rewrite `code` to `target` without changing values.
    pub fn relabel(mut self, ty: GeoType, code: &str, target: &str) -> Result<Self, GeoError> {
        let key = GeoId::parse(ty, code)?;
        if self.rules.contains_key(&key) {
            return Err(GeoError::InvalidDisbursementRule {
                code: code.to_string(),
                reason: "code already has a rule".into(),
            });
        }
        let rule = DisbursementRule::Relabel(target.trim().to_string());
        self.rules.insert(key, ScopedRule { rule, applies_to: Vec::new() });
        Ok(self)
    }

    /// Restrict the rule for `code` to the given destination kinds.
    pub fn applies_to(mut self, ty: GeoType, code: &str, kinds: &[GeoType]) -> Result<Self, GeoError> {
        let key = GeoId::parse(ty, code)?;
        let Some(scoped) = self.rules.get_mut(&key) else {
            return Err(GeoError::InvalidDisbursementRule {
                code: code.to_string(),
                reason: "scope given for a code without a rule".into(),
            });
        };
        for &kind in kinds {
            if !scoped.applies_to.contains(&kind) {
                scoped.applies_to.push(kind);
            }
        }
        Ok(self)
    }

    fn add_pool_target(mut self, ty: GeoType, code: &str, target: String, weight: Option<f64>) -> Result<Self, GeoError> {
        let key = GeoId::parse(ty, code)?;
        let entry = self.rules.entry(key)
            .or_insert_with(|| ScopedRule { rule: DisbursementRule::Pool(Vec::new()), applies_to: Vec::new() });
        match &mut entry.rule {
            DisbursementRule::Pool(targets) => targets.push(PoolTarget { code: target.trim().to_string(), weight }),
            DisbursementRule::Relabel(_) => return Err(GeoError::InvalidDisbursementRule {
                code: code.to_string(),
                reason: "code is both pooled and relabelled".into(),
            }),
        }
        Ok(self)
    }

    fn validate(&self) -> Result<(), GeoError> {
        for (code, scoped) in &self.rules {
            let DisbursementRule::Pool(targets) = &scoped.rule else { continue };
            let invalid = |reason: String| GeoError::InvalidDisbursementRule { code: code.id().to_string(), reason };

            let weighted = targets.iter().filter(|t| t.weight.is_some()).count();
            if weighted == 0 { continue }
            if weighted != targets.len() {
                return Err(invalid(format!("{weighted} of {} targets have a weight", targets.len())));
            }
            let mut sum = 0.0;
            for w in targets.iter().filter_map(|t| t.weight) {
                if !w.is_finite() || w < 0.0 {
                    return Err(invalid(format!("weight {w} out of range")));
                }
                sum += w;
            }
            if (sum - 1.0).abs() > WEIGHT_TOLERANCE {
                return Err(invalid(format!("weights sum to {sum}")));
            }
        }
        Ok(())
    }

    /// Rule for a code, if any, whatever its scope.
    #[inline]
    pub fn get(&self, code: &GeoId) -> Option<&DisbursementRule> { self.rules.get(code).map(|s| &s.rule) }

    /// Rule for a code when re-keying to `to`.
    pub fn get_for(&self, code: &GeoId, to: GeoType) -> Option<&DisbursementRule> {
        self.rules.get(code).filter(|s| s.applies(to)).map(|s| &s.rule)
    }

    #[inline]
    pub fn scoped(&self, code: &GeoId) -> Option<&ScopedRule> { self.rules.get(code) }

    #[inline] pub fn len(&self) -> usize { self.rules.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.rules.is_empty() }

    /// Combine two rule sets; rules in `other` replace rules for the same code.
    pub fn extend(mut self, other: DisbursementRules) -> Self {
        self.rules.extend(other.rules);
        self
    }
}

fn malformed(e: anyhow::Error) -> GeoError {
    GeoError::MalformedTable { file: "disbursement rules".into(), reason: format!("{e:#}") }
}

struct RuleRow {
    ty: GeoType,
    action: String,
    code: String,
    target: String,
    weight: Option<f64>,
    applies_to: Vec<GeoType>,
}

fn read_rows(df: &polars::frame::DataFrame) -> Result<Vec<RuleRow>> {
    let column = |name: &str| -> Result<Vec<Option<String>>> {
        let col = find_column(df, &[name])
            .ok_or_else(|| anyhow!("[disburse::rules] missing column {name:?}"))?;
        string_values(col)
    };
    let optional = |name: &str| -> Result<Vec<Option<String>>> {
        match find_column(df, &[name]) {
            Some(col) => string_values(col),
            None => Ok(vec![None; df.height()]),
        }
    };
    let kinds = column("geo_type")?;
    let actions = column("action")?;
    let codes = column("code")?;
    let targets = column("target")?;
    let weights = optional("weight")?;
    let scopes = optional("applies_to")?;

    let mut out = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let line = i + 2;
        let (Some(kind), Some(action), Some(code), Some(target)) =
            (&kinds[i], &actions[i], &codes[i], &targets[i]) else {
            bail!("[disburse::rules] line {line}: empty cell");
        };
        let ty: GeoType = kind.parse()
            .with_context(|| format!("[disburse::rules] line {line}: unknown geo_type {kind:?}"))?;
        let weight = weights[i].as_deref()
            .map(|w| w.parse::<f64>()
                .with_context(|| format!("[disburse::rules] line {line}: bad weight {w:?}")))
            .transpose()?;
        let applies_to = scopes[i].as_deref().unwrap_or("")
            .split(';')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(|k| k.parse::<GeoType>()
                .with_context(|| format!("[disburse::rules] line {line}: unknown destination kind {k:?}")))
            .collect::<Result<Vec<_>>>()?;
        out.push(RuleRow {
            ty,
            action: action.to_ascii_lowercase(),
            code: code.clone(),
            target: target.clone(),
            weight,
            applies_to,
        });
    }
    Ok(out)
}
