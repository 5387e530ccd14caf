use crate::error::InsightSheetError;
use crate::schema::SemanticType;
use crate::workbook::cell::format_number;
use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::Serialize;
use std::fmt::Display;

/// A typed cell value. Missing is explicit and distinct from zero or "".
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Missing,
    Date(NaiveDate),
    Currency(f64),
    /// Fraction, 0.12 for 12%
    Percentage(f64),
    Integer(i64),
    Number(f64),
    Text(String),
}

impl Value {
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }

    /// Numeric payload of currency, percentage, integer and number values.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Currency(value) | Self::Percentage(value) | Self::Number(value) => Some(*value),
            Self::Integer(value) => Some(*value as f64),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Self::Date(date) => Some(*date),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Semantic type of a present value.
    pub fn kind(&self) -> Option<SemanticType> {
        match self {
            Self::Missing => None,
            Self::Date(_) => Some(SemanticType::Date),
            Self::Currency(_) => Some(SemanticType::Currency),
            Self::Percentage(_) => Some(SemanticType::Percentage),
            Self::Integer(_) => Some(SemanticType::Integer),
            Self::Number(_) => Some(SemanticType::Number),
            Self::Text(_) => Some(SemanticType::Text),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Missing => Ok(()),
            Self::Date(date) => write!(f, "{date}"),
            Self::Currency(value) | Self::Number(value) => write!(f, "{}", format_number(*value)),
            Self::Percentage(value) => {
                let percent = (*value * 100.0 * 1e6).round() / 1e6;
                write!(f, "{}%", format_number(percent))
            }
            Self::Integer(value) => write!(f, "{value}"),
            Self::Text(text) => write!(f, "{text}"),
        }
    }
}

/// Output column: canonical name, declared type and the header it was read from.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Column {
    pub name: String,
    pub kind: SemanticType,
    /// Header text in the workbook, `None` for an absent optional column
    pub header: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Row {
    /// 1-based row number in the worksheet
    pub source_row: usize,
    pub values: Vec<Value>,
}

/// One sheet in canonical form: schema columns in schema order, source rows in
/// source order with every value typed or explicitly missing.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NormalizedTable {
    /// Dashboard key from the schema registry
    pub key: String,
    /// Worksheet name
    pub sheet: String,
    pub columns: Vec<Column>,
    pub rows: Vec<Row>,
}

impl NormalizedTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column.name == name)
    }

    /// Values of one column in row order.
    pub fn column_values<'a>(&'a self, name: &str) -> Option<impl Iterator<Item = &'a Value> + 'a> {
        let index = self.column_index(name)?;
        Some(self.rows.iter().map(move |row| &row.values[index]))
    }

    /// Value at a row position (0-based, not the source row number).
    pub fn get(&self, row: usize, name: &str) -> Option<&Value> {
        let index = self.column_index(name)?;
        self.rows.get(row).and_then(|row| row.values.get(index))
    }

    /// Rows as records keyed by column name, in column order.
    pub fn to_records(&self) -> Vec<IndexMap<String, Value>> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .zip(&row.values)
                    .map(|(column, value)| (column.name.to_owned(), value.to_owned()))
                    .collect()
            })
            .collect()
    }

    /// JSON array of records, the form the dashboard keeps per upload.
    pub fn to_json(&self) -> Result<String, InsightSheetError> {
        Ok(serde_json::to_string(&self.to_records())?)
    }
}
