//! Metric set behind the marketing dashboard's charts and summary cards.

use crate::aggregate::group_sums;
use crate::aggregate::mean_by;
use crate::aggregate::period_change;
use crate::aggregate::period_totals;
use crate::aggregate::rank_by;
use crate::aggregate::scatter;
use crate::aggregate::sum_by;
use crate::aggregate::total;
use crate::aggregate::typed;
use crate::aggregate::MetricSummary;
use crate::aggregate::ScatterPoint;
use crate::error::InsightSheetError;
use crate::normalize::table::NormalizedTable;
use crate::normalize::table::Value;
use crate::schema::SemanticType;
use indexmap::IndexMap;
use serde::Serialize;
use std::fmt::Display;
use tracing::debug;

const SPEND_COLUMNS: [&str; 2] = ["mobile_spend", "desktop_spend"];
const YEAR_OVER_YEAR: usize = 12;
const TOP_N: usize = 10;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum PriorityCategory {
    Low,
    Medium,
    High,
    Critical,
}

impl PriorityCategory {
    /// Right-closed bins: `(-inf, 0.5]`, `(0.5, 1]`, `(1, 2]`, `(2, inf)`.
    pub fn from_score(score: f64) -> Self {
        if score <= 0.5 {
            Self::Low
        } else if score <= 1.0 {
            Self::Medium
        } else if score <= 2.0 {
            Self::High
        } else {
            Self::Critical
        }
    }
}

impl Display for PriorityCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
            Self::Critical => "Critical",
        };
        write!(f, "{name}")
    }
}

/// One tactic from the outer join of Low Hanging Fruit and IE Matrix.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TacticScore {
    pub tactic: String,
    pub funnel_stage: Value,
    pub effort: Value,
    pub projected_cost: Value,
    pub lift: Value,
    pub impact: Value,
    /// Effort as rated in the IE Matrix
    pub matrix_effort: Value,
    /// `lift × 100 / effort`
    pub priority_score: Value,
    pub priority_category: Option<PriorityCategory>,
    /// `lift × 100 / projected cost`
    pub cost_efficiency: Value,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Dashboard {
    pub metrics: IndexMap<String, MetricSummary>,
    pub tactics: Vec<TacticScore>,
    /// Effort (x) against impact (y) per IE Matrix tactic
    pub effort_impact: Vec<ScatterPoint>,
}

impl Dashboard {
    pub fn metric(&self, name: &str) -> Option<&MetricSummary> {
        self.metrics.get(name)
    }

    fn insert(&mut self, name: &str, mut summary: MetricSummary) {
        debug!(metric = name, entries = summary.len(), "Computed metric");
        summary.metric = name.to_owned();
        self.metrics.insert(name.to_owned(), summary);
    }
}

/// Computes every dashboard metric whose source tables are present.
/// Tables are keyed by their schema key.
pub fn build(tables: &IndexMap<String, NormalizedTable>) -> Result<Dashboard, InsightSheetError> {
    let mut dashboard = Dashboard::default();

    if let Some(ppc) = tables.get("ppc_spend") {
        let spend = period_totals(ppc, "year_month", &SPEND_COLUMNS)?;
        let yoy = period_change(&spend, YEAR_OVER_YEAR);
        dashboard.insert("ppc_total_spend", spend);
        dashboard.insert("ppc_spend_yoy", yoy);
        if ppc.column_index("domain").is_some() {
            let (sums, kind) = group_sums(ppc, "domain", &SPEND_COLUMNS)?;
            let mut by_domain = MetricSummary::new("", kind);
            by_domain.entries = sums
                .into_iter()
                .map(|(domain, sum)| (domain, sum.map(|sum| typed(kind, sum)).unwrap_or(Value::Missing)))
                .collect();
            dashboard.insert("ppc_spend_by_domain", by_domain);
        }
        let mut by_channel = MetricSummary::new("", SemanticType::Currency);
        for channel in SPEND_COLUMNS {
            by_channel.entries.insert(channel.to_owned(), total(ppc, channel)?);
        }
        dashboard.insert("ppc_spend_by_channel", by_channel);
    }

    if let Some(traffic) = tables.get("traffic_data") {
        dashboard.insert("visits_by_domain", sum_by(traffic, "domain", "monthly_visits")?);
        dashboard.insert("top_domains_by_visits", rank_by(traffic, "domain", "monthly_visits", TOP_N)?);
        if traffic.column_index("yoy_growth").is_some() {
            dashboard.insert("growth_by_domain", mean_by(traffic, "domain", "yoy_growth")?);
        }
    }

    let tactics = tables.get("tactics");
    let matrix = tables.get("ie_matrix");
    if tactics.is_some() || matrix.is_some() {
        dashboard.tactics = score_tactics(tactics, matrix)?;
        let mut priority = MetricSummary::new("", SemanticType::Number);
        let mut efficiency = MetricSummary::new("", SemanticType::Number);
        for score in &dashboard.tactics {
            priority.entries.entry(score.tactic.to_owned()).or_insert_with(|| score.priority_score.to_owned());
            efficiency.entries.entry(score.tactic.to_owned()).or_insert_with(|| score.cost_efficiency.to_owned());
        }
        dashboard.insert("tactic_priority_score", priority);
        dashboard.insert("tactic_cost_efficiency", efficiency);
    }
    if let Some(matrix) = matrix {
        dashboard.effort_impact = scatter(matrix, "tactic", "effort", "impact")?;
    }

    if let Some(keywords) = tables.get("keywords") {
        dashboard.insert("top_keywords_by_volume", rank_by(keywords, "keyword", "search_volume", TOP_N)?);
        if keywords.column_index("clicks").is_some() {
            dashboard.insert("clicks_by_keyword", sum_by(keywords, "keyword", "clicks")?);
        }
    }

    if let Some(vitals) = tables.get("web_vitals") {
        dashboard.insert("lcp_by_url", mean_by(vitals, "url", "lcp_seconds")?);
        let mut companies = MetricSummary::new("", SemanticType::Text);
        for url in vitals.column_values("url").into_iter().flatten().filter_map(Value::as_text) {
            if let Some(company) = company_label(url) {
                companies.entries.entry(url.to_owned()).or_insert(Value::Text(company));
            }
        }
        dashboard.insert("company_by_url", companies);
    }

    Ok(dashboard)
}

fn tactic_key(value: &Value) -> Option<String> {
    let key = value.as_text()?.trim().to_lowercase();
    (!key.is_empty()).then_some(key)
}

fn value_at(table: &NormalizedTable, row: usize, column: &str) -> Value {
    table.get(row, column).cloned().unwrap_or_default()
}

/// `lift × 100 / divisor`, a zero divisor counting as one.
fn ratio(lift: &Value, divisor: &Value) -> Value {
    match (lift.as_f64(), divisor.as_f64()) {
        (Some(lift), Some(divisor)) => {
            let divisor = if divisor == 0.0 { 1.0 } else { divisor };
            Value::Number(lift * 100.0 / divisor)
        }
        _ => Value::Missing,
    }
}

/// Outer join on tactic name, compared case-insensitively. Low Hanging Fruit
/// rows come first in source order, then tactics found only in the matrix.
pub fn score_tactics(
    tactics: Option<&NormalizedTable>,
    matrix: Option<&NormalizedTable>,
) -> Result<Vec<TacticScore>, InsightSheetError> {
    let mut ratings = IndexMap::<String, (String, Value, Value)>::new();
    if let Some(matrix) = matrix {
        for row in 0..matrix.len() {
            let name = value_at(matrix, row, "tactic");
            let Some(key) = tactic_key(&name) else { continue };
            ratings
                .entry(key)
                .or_insert_with(|| (name.to_string(), value_at(matrix, row, "impact"), value_at(matrix, row, "effort")));
        }
    }

    let mut scores = Vec::new();
    let mut joined = Vec::new();
    if let Some(tactics) = tactics {
        for row in 0..tactics.len() {
            let name = value_at(tactics, row, "tactic");
            let Some(key) = tactic_key(&name) else { continue };
            let (impact, matrix_effort) = match ratings.get(&key) {
                Some((_, impact, effort)) => {
                    joined.push(key);
                    (impact.to_owned(), effort.to_owned())
                }
                None => (Value::Missing, Value::Missing),
            };
            let effort = value_at(tactics, row, "effort");
            let projected_cost = value_at(tactics, row, "projected_cost");
            let lift = value_at(tactics, row, "lift");
            let priority_score = ratio(&lift, &effort);
            scores.push(TacticScore {
                tactic: name.to_string().trim().to_owned(),
                funnel_stage: value_at(tactics, row, "funnel_stage"),
                priority_category: priority_score.as_f64().map(PriorityCategory::from_score),
                cost_efficiency: ratio(&lift, &projected_cost),
                priority_score,
                effort,
                projected_cost,
                lift,
                impact,
                matrix_effort,
            });
        }
    }

    for (key, (name, impact, matrix_effort)) in ratings {
        if joined.contains(&key) {
            continue;
        }
        scores.push(TacticScore {
            tactic: name.trim().to_owned(),
            funnel_stage: Value::Missing,
            effort: Value::Missing,
            projected_cost: Value::Missing,
            lift: Value::Missing,
            impact,
            matrix_effort,
            priority_score: Value::Missing,
            priority_category: None,
            cost_efficiency: Value::Missing,
        });
    }
    Ok(scores)
}

/// Company name from a page URL: `https://www.acme-corp.com/x` gives `Acme-Corp`.
pub fn company_label(url: &str) -> Option<String> {
    let url = url.trim();
    let lower = url.to_ascii_lowercase();
    let mut host = url;
    for scheme in ["https://", "http://"] {
        if lower.starts_with(scheme) {
            host = &url[scheme.len()..];
            break;
        }
    }
    if host.to_ascii_lowercase().starts_with("www.") {
        host = &host[4..];
    }
    let host = host.split(['/', '?', '#', ':']).next().unwrap_or_default();
    let label = host.split('.').next().unwrap_or_default();
    if label.is_empty() {
        return None;
    }

    let mut company = String::with_capacity(label.len());
    let mut word_start = true;
    for c in label.chars() {
        if c.is_alphabetic() {
            if word_start {
                company.extend(c.to_uppercase());
            } else {
                company.extend(c.to_lowercase());
            }
            word_start = false;
        } else {
            company.push(c);
            word_start = true;
        }
    }
    Some(company)
}
