//! # Aggregator
//!
//! Pure functions from normalized tables to chart-ready summaries. Missing
//! values are skipped by every aggregate, and a group without any present
//! value aggregates to missing rather than zero.

pub mod dashboard;

use crate::error::InsightSheetError;
use crate::normalize::table::NormalizedTable;
use crate::normalize::table::Value;
use crate::schema::SemanticType;
use chrono::Datelike;
use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AggregateError {
    #[error("Table '{table}' has no column '{column}'")]
    UnknownColumn { table: String, column: String },

    #[error("Column '{column}' of table '{table}' is {kind}, expected {expected}")]
    ColumnType {
        table: String,
        column: String,
        kind: SemanticType,
        expected: &'static str,
    },
}

/// Aggregated values keyed by a business identifier from the source table.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MetricSummary {
    pub metric: String,
    /// Type of the entry values
    pub unit: SemanticType,
    pub entries: IndexMap<String, Value>,
}

impl MetricSummary {
    pub fn new(metric: &str, unit: SemanticType) -> Self {
        Self {
            metric: metric.to_owned(),
            unit,
            entries: IndexMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One plotted point, copied through from a table row.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ScatterPoint {
    pub label: String,
    pub x: Value,
    pub y: Value,
}

fn column(table: &NormalizedTable, name: &str) -> Result<usize, AggregateError> {
    table.column_index(name).ok_or_else(|| AggregateError::UnknownColumn {
        table: table.key.to_owned(),
        column: name.to_owned(),
    })
}

fn numeric_column(table: &NormalizedTable, name: &str) -> Result<(usize, SemanticType), AggregateError> {
    let index = column(table, name)?;
    let kind = table.columns[index].kind;
    match kind {
        SemanticType::Currency | SemanticType::Percentage | SemanticType::Integer | SemanticType::Number => Ok((index, kind)),
        _ => Err(AggregateError::ColumnType {
            table: table.key.to_owned(),
            column: name.to_owned(),
            kind,
            expected: "numeric",
        }),
    }
}

/// Wraps a sum in the value type of its source column.
pub(crate) fn typed(kind: SemanticType, value: f64) -> Value {
    match kind {
        SemanticType::Currency => Value::Currency(value),
        SemanticType::Percentage => Value::Percentage(value),
        SemanticType::Integer if value.fract() == 0.0 => Value::Integer(value as i64),
        _ => Value::Number(value),
    }
}

/// Group key of a row: the rendered value, `None` when missing or blank.
fn group_key(value: &Value) -> Option<String> {
    let key = value.to_string();
    if value.is_missing() || key.trim().is_empty() {
        None
    } else {
        Some(key)
    }
}

/// Sum of the present values of one column; missing if none is present.
pub fn total(table: &NormalizedTable, name: &str) -> Result<Value, InsightSheetError> {
    let (index, kind) = numeric_column(table, name)?;
    let sum = table
        .rows
        .iter()
        .filter_map(|row| row.values[index].as_f64())
        .fold(None, |sum: Option<f64>, value| Some(sum.unwrap_or(0.0) + value));
    Ok(sum.map(|sum| typed(kind, sum)).unwrap_or(Value::Missing))
}

/// Per-group sums over several value columns, groups in first-seen order.
pub(crate) fn group_sums(
    table: &NormalizedTable,
    group: &str,
    values: &[&str],
) -> Result<(IndexMap<String, Option<f64>>, SemanticType), InsightSheetError> {
    let group_index = column(table, group)?;
    let mut kind = SemanticType::Number;
    let mut indexes = Vec::with_capacity(values.len());
    for (position, name) in values.iter().enumerate() {
        let (index, column_kind) = numeric_column(table, name)?;
        kind = if position == 0 || kind == column_kind { column_kind } else { SemanticType::Number };
        indexes.push(index);
    }

    let mut sums = IndexMap::<String, Option<f64>>::new();
    for row in &table.rows {
        let Some(key) = group_key(&row.values[group_index]) else { continue };
        let sum = sums.entry(key).or_insert(None);
        for index in &indexes {
            if let Some(value) = row.values[*index].as_f64() {
                *sum = Some(sum.unwrap_or(0.0) + value);
            }
        }
    }
    Ok((sums, kind))
}

/// Sum of `value` grouped by `group`.
pub fn sum_by(table: &NormalizedTable, group: &str, value: &str) -> Result<MetricSummary, InsightSheetError> {
    let (sums, kind) = group_sums(table, group, &[value])?;
    let mut summary = MetricSummary::new(&format!("{value}_by_{group}"), kind);
    summary.entries = sums
        .into_iter()
        .map(|(key, sum)| (key, sum.map(|sum| typed(kind, sum)).unwrap_or(Value::Missing)))
        .collect();
    Ok(summary)
}

/// Mean of `value` grouped by `group`.
pub fn mean_by(table: &NormalizedTable, group: &str, value: &str) -> Result<MetricSummary, InsightSheetError> {
    let group_index = column(table, group)?;
    let (value_index, kind) = numeric_column(table, value)?;
    let mut accumulators = IndexMap::<String, (f64, usize)>::new();
    for row in &table.rows {
        let Some(key) = group_key(&row.values[group_index]) else { continue };
        let accumulator = accumulators.entry(key).or_insert((0.0, 0));
        if let Some(value) = row.values[value_index].as_f64() {
            accumulator.0 += value;
            accumulator.1 += 1;
        }
    }

    let unit = if kind == SemanticType::Integer { SemanticType::Number } else { kind };
    let mut summary = MetricSummary::new(&format!("mean_{value}_by_{group}"), unit);
    summary.entries = accumulators
        .into_iter()
        .map(|(key, (sum, count))| {
            let mean = if count == 0 { Value::Missing } else { typed(unit, sum / count as f64) };
            (key, mean)
        })
        .collect();
    Ok(summary)
}

/// Number of rows per group.
pub fn count_by(table: &NormalizedTable, group: &str) -> Result<MetricSummary, InsightSheetError> {
    let group_index = column(table, group)?;
    let mut counts = IndexMap::<String, i64>::new();
    for row in &table.rows {
        if let Some(key) = group_key(&row.values[group_index]) {
            *counts.entry(key).or_insert(0) += 1;
        }
    }
    let mut summary = MetricSummary::new(&format!("count_by_{group}"), SemanticType::Integer);
    summary.entries = counts.into_iter().map(|(key, count)| (key, Value::Integer(count))).collect();
    Ok(summary)
}

/// The `top_n` labels with the largest values, descending. Rows with a
/// missing label or value are skipped; ties keep source order and a repeated
/// label keeps its first, highest, entry.
pub fn rank_by(table: &NormalizedTable, label: &str, value: &str, top_n: usize) -> Result<MetricSummary, InsightSheetError> {
    let label_index = column(table, label)?;
    let (value_index, kind) = numeric_column(table, value)?;
    let mut ranked = table
        .rows
        .iter()
        .filter_map(|row| {
            let key = group_key(&row.values[label_index])?;
            let number = row.values[value_index].as_f64()?;
            Some((key, number, row.values[value_index].to_owned()))
        })
        .collect::<Vec<_>>();
    ranked.sort_by(|(_, a, _), (_, b, _)| b.total_cmp(a));

    let mut summary = MetricSummary::new(&format!("top_{label}_by_{value}"), kind);
    for (key, _, value) in ranked {
        if summary.entries.len() >= top_n {
            break;
        }
        summary.entries.entry(key).or_insert(value);
    }
    Ok(summary)
}

/// Two columns copied through unchanged for plotting, one point per labelled row.
pub fn scatter(table: &NormalizedTable, label: &str, x: &str, y: &str) -> Result<Vec<ScatterPoint>, InsightSheetError> {
    let label_index = column(table, label)?;
    let x_index = column(table, x)?;
    let y_index = column(table, y)?;
    Ok(table
        .rows
        .iter()
        .filter_map(|row| {
            Some(ScatterPoint {
                label: group_key(&row.values[label_index])?,
                x: row.values[x_index].to_owned(),
                y: row.values[y_index].to_owned(),
            })
        })
        .collect())
}

/// Monthly totals of the sum of several value columns, in calendar order.
/// Each month is keyed by its earliest date in the table, so a sheet of
/// month starts gives `2024-01-01` and every key is a value of `date`.
pub fn period_totals(table: &NormalizedTable, date: &str, values: &[&str]) -> Result<MetricSummary, InsightSheetError> {
    let date_index = column(table, date)?;
    if table.columns[date_index].kind != SemanticType::Date {
        Err(AggregateError::ColumnType {
            table: table.key.to_owned(),
            column: date.to_owned(),
            kind: table.columns[date_index].kind,
            expected: "date",
        })?
    }
    let mut kind = SemanticType::Number;
    let mut indexes = Vec::with_capacity(values.len());
    for (position, name) in values.iter().enumerate() {
        let (index, column_kind) = numeric_column(table, name)?;
        kind = if position == 0 || kind == column_kind { column_kind } else { SemanticType::Number };
        indexes.push(index);
    }

    let mut buckets = BTreeMap::<(i32, u32), (NaiveDate, Option<f64>)>::new();
    for row in &table.rows {
        let Some(day) = row.values[date_index].as_date() else { continue };
        let (earliest, sum) = buckets.entry((day.year(), day.month())).or_insert((day, None));
        *earliest = (*earliest).min(day);
        for index in &indexes {
            if let Some(value) = row.values[*index].as_f64() {
                *sum = Some(sum.unwrap_or(0.0) + value);
            }
        }
    }

    let mut summary = MetricSummary::new(&format!("{}_by_month", values.join("_plus_")), kind);
    summary.entries = buckets
        .into_iter()
        .map(|(_, (day, sum))| (day.to_string(), sum.map(|sum| typed(kind, sum)).unwrap_or(Value::Missing)))
        .collect();
    Ok(summary)
}

/// Relative change of each entry against the entry `lag` positions earlier,
/// as a fraction. Missing for the first `lag` entries and wherever either
/// side is missing or the earlier value is zero.
pub fn period_change(series: &MetricSummary, lag: usize) -> MetricSummary {
    let values = series.entries.values().map(Value::as_f64).collect::<Vec<_>>();
    let mut summary = MetricSummary::new(&format!("{}_change_{lag}", series.metric), SemanticType::Percentage);
    summary.entries = series
        .entries
        .keys()
        .enumerate()
        .map(|(position, key)| {
            let change = position
                .checked_sub(lag)
                .filter(|_| lag > 0)
                .and_then(|earlier| values[earlier])
                .filter(|earlier| *earlier != 0.0)
                .zip(values[position])
                .map(|(earlier, current)| Value::Percentage((current - earlier) / earlier))
                .unwrap_or(Value::Missing);
            (key.to_owned(), change)
        })
        .collect();
    summary
}
