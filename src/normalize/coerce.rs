//! Conversion of raw cells to schema types. Validation and normalization call
//! the same functions, so a value validation accepts always normalizes.

use crate::config::PipelineConfig;
use crate::normalize::table::Value;
use crate::schema::SemanticType;
use crate::workbook::cell::parse_iso_datetime;
use crate::workbook::cell::CellType;
use crate::workbook::cell::DateSystem;
use crate::workbook::cell::RawCell;
use chrono::NaiveDate;
use chrono::NaiveDateTime;
use regex::Regex;
use std::sync::LazyLock;

static GROUPED_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{1,3}(,\d{3})+|\d+)?(\.\d+)?([eE][-+]?\d+)?$").expect("Hardcode regex pattern")
});
static UNIT_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(.*\d)\s*(ms|px|s|x)$").expect("Hardcode regex pattern")
});
static NUMERIC_MONTH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{4})[-/.](\d{1,2})$|^(\d{4})(\d{2})$").expect("Hardcode regex pattern")
});
static NAMED_MONTH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z]{3,9})\.?[\s\-']+(\d{4})$").expect("Hardcode regex pattern")
});

const CURRENCY_SYMBOLS: &[char] = &['$', '€', '£', '¥'];

/// Result of coercing one cell to a semantic type.
#[derive(Clone, Debug, PartialEq)]
pub enum Coercion {
    /// The stored value already has the expected type
    Exact(Value),
    /// Parsed from text or reinterpreted (symbols stripped, serial read as date)
    Reformatted(Value),
    /// Blank, a configured missing marker, or an error cell mapped to missing
    Missing,
    /// Cannot be represented in the expected type
    Invalid,
}

impl Coercion {
    /// The coerced value, `Missing` for blank cells, `None` when invalid.
    pub fn into_value(self) -> Option<Value> {
        match self {
            Self::Exact(value) | Self::Reformatted(value) => Some(value),
            Self::Missing => Some(Value::Missing),
            Self::Invalid => None,
        }
    }
}

/// Coerces an optional raw cell (`None` is a blank cell) to `kind`.
pub fn coerce_cell(
    cell: Option<&RawCell>,
    kind: SemanticType,
    system: DateSystem,
    config: &PipelineConfig,
) -> Coercion {
    let cell = match cell {
        Some(cell) => cell,
        None => return Coercion::Missing,
    };
    match cell.kind {
        CellType::Error if config.errors_as_missing => return Coercion::Missing,
        CellType::Error => return Coercion::Invalid,
        CellType::Text if config.is_missing_text(&cell.value) => return Coercion::Missing,
        _ => (),
    }

    match kind {
        SemanticType::Text => coerce_text(cell, system),
        SemanticType::Date => coerce_date(cell, system, config),
        SemanticType::Currency => coerce_number(cell, false).map(Value::Currency),
        SemanticType::Number => coerce_number(cell, true).map(Value::Number),
        SemanticType::Percentage => coerce_percentage(cell),
        SemanticType::Integer => coerce_integer(cell),
    }
}

impl Coercion {
    fn map<F: FnOnce(f64) -> Value>(self, wrap: F) -> Coercion {
        match self {
            Self::Exact(Value::Number(value)) => Self::Exact(wrap(value)),
            Self::Reformatted(Value::Number(value)) => Self::Reformatted(wrap(value)),
            other => other,
        }
    }
}

fn coerce_text(cell: &RawCell, system: DateSystem) -> Coercion {
    let text = cell.to_text(system);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        Coercion::Missing
    } else {
        Coercion::Exact(Value::Text(trimmed.to_owned()))
    }
}

/// Numbers for `currency` and `number` columns, carried as `Value::Number`.
fn coerce_number(cell: &RawCell, allow_percent: bool) -> Coercion {
    match cell.kind {
        kind if kind.is_numeric() => match cell.as_f64() {
            Some(value) => Coercion::Exact(Value::Number(value)),
            None => Coercion::Invalid,
        },
        CellType::Text => match parse_numeric_text(&cell.value) {
            Some(numeric) if numeric.percent && !allow_percent => Coercion::Invalid,
            Some(numeric) if numeric.percent => Coercion::Reformatted(Value::Number(numeric.value / 100.0)),
            Some(numeric) => Coercion::Reformatted(Value::Number(numeric.value)),
            None => Coercion::Invalid,
        },
        _ => Coercion::Invalid,
    }
}

fn coerce_percentage(cell: &RawCell) -> Coercion {
    match cell.kind {
        kind if kind.is_numeric() => match cell.as_f64() {
            Some(value) => Coercion::Exact(Value::Percentage(value)),
            None => Coercion::Invalid,
        },
        CellType::Text => match parse_numeric_text(&cell.value) {
            Some(numeric) if numeric.currency => Coercion::Invalid,
            Some(numeric) if numeric.percent => Coercion::Reformatted(Value::Percentage(numeric.value / 100.0)),
            Some(numeric) => Coercion::Reformatted(Value::Percentage(numeric.value)),
            None => Coercion::Invalid,
        },
        _ => Coercion::Invalid,
    }
}

fn coerce_integer(cell: &RawCell) -> Coercion {
    let (value, exact) = match cell.kind {
        kind if kind.is_numeric() => match cell.as_f64() {
            Some(value) => (value, true),
            None => return Coercion::Invalid,
        },
        CellType::Text => match parse_numeric_text(&cell.value) {
            Some(numeric) if !numeric.percent && !numeric.currency => (numeric.value, false),
            _ => return Coercion::Invalid,
        },
        _ => return Coercion::Invalid,
    };
    if value.fract() != 0.0 || value.abs() >= i64::MAX as f64 {
        return Coercion::Invalid;
    }
    let value = Value::Integer(value as i64);
    if exact {
        Coercion::Exact(value)
    } else {
        Coercion::Reformatted(value)
    }
}

fn coerce_date(cell: &RawCell, system: DateSystem, config: &PipelineConfig) -> Coercion {
    match cell.kind {
        CellType::NumberDate | CellType::NumberDateTime | CellType::IsoDateTime => {
            match cell.as_datetime(system) {
                Some(datetime) => Coercion::Exact(Value::Date(datetime.date())),
                None => Coercion::Invalid,
            }
        }
        CellType::Number => {
            let serial = match cell.as_f64() {
                Some(serial) => serial,
                None => return Coercion::Invalid,
            };
            // 202401 written as a plain number is a year-month, not a serial
            if is_compact_month(serial) {
                return match parse_compact_month(serial) {
                    Some(date) => Coercion::Reformatted(Value::Date(date)),
                    None => Coercion::Invalid,
                };
            }
            match system.serial_to_datetime(serial).filter(|_| serial >= 1.0) {
                Some(datetime) => Coercion::Reformatted(Value::Date(datetime.date())),
                None => Coercion::Invalid,
            }
        }
        CellType::Text => match parse_date_text(&cell.value, config) {
            Some(date) => Coercion::Reformatted(Value::Date(date)),
            None => Coercion::Invalid,
        },
        _ => Coercion::Invalid,
    }
}

fn is_compact_month(value: f64) -> bool {
    value.fract() == 0.0 && (190_001.0..=299_912.0).contains(&value)
}

/// `None` for a month outside 1-12, such as `202413`.
fn parse_compact_month(value: f64) -> Option<NaiveDate> {
    if !is_compact_month(value) {
        return None;
    }
    let value = value as i64;
    NaiveDate::from_ymd_opt((value / 100) as i32, (value % 100) as u32, 1)
}

/// Parses a date stored as text: configured patterns, ISO timestamps, then
/// month-only forms mapped to the first of the month.
pub fn parse_date_text(text: &str, config: &PipelineConfig) -> Option<NaiveDate> {
    let text = text.trim();
    for format in &config.date_formats {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return Some(date);
        }
        if let Ok(datetime) = NaiveDateTime::parse_from_str(text, format) {
            return Some(datetime.date());
        }
    }
    if let Some(datetime) = parse_iso_datetime(text) {
        return Some(datetime.date());
    }
    if let Some(captures) = NUMERIC_MONTH.captures(text) {
        let year = captures.get(1).or_else(|| captures.get(3))?.as_str().parse::<i32>().ok()?;
        let month = captures.get(2).or_else(|| captures.get(4))?.as_str().parse::<u32>().ok()?;
        return NaiveDate::from_ymd_opt(year, month, 1);
    }
    if let Some(captures) = NAMED_MONTH.captures(text) {
        let candidate = format!("1 {} {}", &captures[1], &captures[2]);
        return NaiveDate::parse_from_str(&candidate, "%d %B %Y").ok();
    }
    None
}

/// A number parsed from display text.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct NumericText {
    pub value: f64,
    /// Text ended with `%`; `value` is as written (12 for "12%")
    pub percent: bool,
    /// Text carried a currency symbol
    pub currency: bool,
}

/// Parses display text such as `$1,200.50`, `(1,200)`, `12%`, `2.3s` or `-€40`.
pub fn parse_numeric_text(text: &str) -> Option<NumericText> {
    let mut text = text.trim();
    let mut negative = false;
    if let Some(inner) = text.strip_prefix('(').and_then(|inner| inner.strip_suffix(')')) {
        negative = true;
        text = inner.trim();
    }

    let mut percent = false;
    if let Some(rest) = text.strip_suffix('%') {
        percent = true;
        text = rest.trim_end();
    }

    let mut currency = false;
    for _ in 0..2 {
        if let Some(rest) = text.strip_prefix(['-', '\u{2212}']) {
            negative = !negative;
            text = rest.trim_start();
        } else if let Some(rest) = text.strip_prefix('+') {
            text = rest.trim_start();
        }
        if let Some(rest) = text.strip_prefix(CURRENCY_SYMBOLS) {
            currency = true;
            text = rest.trim_start();
        }
    }
    if let Some(rest) = text.strip_suffix(CURRENCY_SYMBOLS) {
        currency = true;
        text = rest.trim_end();
    }

    let unit_free;
    if !percent && !currency {
        if let Some(captures) = UNIT_SUFFIX.captures(text) {
            unit_free = captures[1].to_owned();
            text = &unit_free;
        }
    }

    if text.is_empty() || text == "." || !GROUPED_NUMBER.is_match(text) {
        return None;
    }
    let value = text.replace(',', "").parse::<f64>().ok().filter(|value| value.is_finite())?;
    Some(NumericText {
        value: if negative { -value } else { value },
        percent,
        currency,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(value: &str) -> RawCell {
        RawCell { row: 1, col: 0, kind: CellType::Text, value: value.to_owned() }
    }

    fn number(value: f64) -> RawCell {
        RawCell { row: 1, col: 0, kind: CellType::Number, value: value.to_string() }
    }

    fn coerce(cell: &RawCell, kind: SemanticType) -> Coercion {
        coerce_cell(Some(cell), kind, DateSystem::Excel1900, &PipelineConfig::default())
    }

    fn ymd(year: i32, month: u32, day: u32) -> Value {
        Value::Date(NaiveDate::from_ymd_opt(year, month, day).unwrap())
    }

    #[test]
    fn numeric_text_forms() {
        let parse = |text: &str| parse_numeric_text(text).map(|numeric| numeric.value);
        assert_eq!(parse("$1,200.50"), Some(1200.5));
        assert_eq!(parse("(1,200)"), Some(-1200.0));
        assert_eq!(parse("-€40"), Some(-40.0));
        assert_eq!(parse("$-40"), Some(-40.0));
        assert_eq!(parse("40 £"), Some(40.0));
        assert_eq!(parse("2.3s"), Some(2.3));
        assert_eq!(parse("180 ms"), Some(180.0));
        assert_eq!(parse("1.5x"), Some(1.5));
        assert_eq!(parse(".5"), Some(0.5));
        assert_eq!(parse("1e3"), Some(1000.0));
        assert_eq!(parse("12,34"), None);
        assert_eq!(parse("abc"), None);
        assert_eq!(parse("$"), None);
        assert_eq!(parse("s"), None);
        assert_eq!(parse_numeric_text("12%"), Some(NumericText { value: 12.0, percent: true, currency: false }));
    }

    #[test]
    fn currency_and_number() {
        assert_eq!(coerce(&number(5000.0), SemanticType::Currency), Coercion::Exact(Value::Currency(5000.0)));
        assert_eq!(coerce(&text("$1,200"), SemanticType::Currency), Coercion::Reformatted(Value::Currency(1200.0)));
        assert_eq!(coerce(&text("12%"), SemanticType::Currency), Coercion::Invalid);
        assert_eq!(coerce(&text("2.3s"), SemanticType::Number), Coercion::Reformatted(Value::Number(2.3)));
        assert_eq!(coerce(&text("fast"), SemanticType::Number), Coercion::Invalid);
        let flag = RawCell { row: 1, col: 0, kind: CellType::Boolean, value: "1".to_owned() };
        assert_eq!(coerce(&flag, SemanticType::Number), Coercion::Invalid);
        assert_eq!(coerce(&flag, SemanticType::Text), Coercion::Exact(Value::Text("TRUE".to_owned())));
    }

    #[test]
    fn percentages_are_fractions() {
        assert_eq!(coerce(&text("12%"), SemanticType::Percentage), Coercion::Reformatted(Value::Percentage(0.12)));
        assert_eq!(coerce(&text(" 5 % "), SemanticType::Percentage), Coercion::Reformatted(Value::Percentage(0.05)));
        assert_eq!(coerce(&number(0.2), SemanticType::Percentage), Coercion::Exact(Value::Percentage(0.2)));
        assert_eq!(coerce(&text("0.3"), SemanticType::Percentage), Coercion::Reformatted(Value::Percentage(0.3)));
        assert_eq!(coerce(&text("$5"), SemanticType::Percentage), Coercion::Invalid);
    }

    #[test]
    fn integers_reject_fractions() {
        assert_eq!(coerce(&number(3.0), SemanticType::Integer), Coercion::Exact(Value::Integer(3)));
        assert_eq!(coerce(&text("5,400"), SemanticType::Integer), Coercion::Reformatted(Value::Integer(5400)));
        assert_eq!(coerce(&number(2.5), SemanticType::Integer), Coercion::Invalid);
        assert_eq!(coerce(&text("$3"), SemanticType::Integer), Coercion::Invalid);
    }

    #[test]
    fn dates_from_serials_and_text() {
        let styled = RawCell { row: 1, col: 0, kind: CellType::NumberDate, value: "45306".to_owned() };
        assert_eq!(coerce(&styled, SemanticType::Date), Coercion::Exact(ymd(2024, 1, 15)));
        assert_eq!(coerce(&number(45306.0), SemanticType::Date), Coercion::Reformatted(ymd(2024, 1, 15)));
        assert_eq!(coerce(&number(202401.0), SemanticType::Date), Coercion::Reformatted(ymd(2024, 1, 1)));
        assert_eq!(coerce(&number(202413.0), SemanticType::Date), Coercion::Invalid);
        assert_eq!(coerce(&number(202400.0), SemanticType::Date), Coercion::Invalid);
        assert_eq!(coerce(&text("2024-01-15"), SemanticType::Date), Coercion::Reformatted(ymd(2024, 1, 15)));
        assert_eq!(coerce(&text("01/15/2024"), SemanticType::Date), Coercion::Reformatted(ymd(2024, 1, 15)));
        assert_eq!(coerce(&text("2024-01"), SemanticType::Date), Coercion::Reformatted(ymd(2024, 1, 1)));
        assert_eq!(coerce(&text("202403"), SemanticType::Date), Coercion::Reformatted(ymd(2024, 3, 1)));
        assert_eq!(coerce(&text("Jan 2024"), SemanticType::Date), Coercion::Reformatted(ymd(2024, 1, 1)));
        assert_eq!(coerce(&text("September 2023"), SemanticType::Date), Coercion::Reformatted(ymd(2023, 9, 1)));
        assert_eq!(coerce(&text("2024-13"), SemanticType::Date), Coercion::Invalid);
        assert_eq!(coerce(&text("soon"), SemanticType::Date), Coercion::Invalid);
        assert_eq!(coerce(&number(-3.0), SemanticType::Date), Coercion::Invalid);
    }

    #[test]
    fn blanks_markers_and_errors() {
        assert_eq!(coerce_cell(None, SemanticType::Integer, DateSystem::Excel1900, &PipelineConfig::default()), Coercion::Missing);
        assert_eq!(coerce(&text("N/A"), SemanticType::Currency), Coercion::Missing);
        assert_eq!(coerce(&text("  "), SemanticType::Text), Coercion::Missing);

        let error = RawCell { row: 1, col: 0, kind: CellType::Error, value: "#DIV/0!".to_owned() };
        assert_eq!(coerce(&error, SemanticType::Number), Coercion::Invalid);
        let config = PipelineConfig::default().with_errors_as_missing(true);
        assert_eq!(coerce_cell(Some(&error), SemanticType::Number, DateSystem::Excel1900, &config), Coercion::Missing);
    }

    #[test]
    fn text_renders_numbers_and_dates() {
        assert_eq!(coerce(&number(3.0), SemanticType::Text), Coercion::Exact(Value::Text("3".to_owned())));
        let styled = RawCell { row: 1, col: 0, kind: CellType::NumberDate, value: "45306".to_owned() };
        assert_eq!(coerce(&styled, SemanticType::Text), Coercion::Exact(Value::Text("2024-01-15".to_owned())));
        assert_eq!(coerce(&text(" SEO Audit "), SemanticType::Text), Coercion::Exact(Value::Text("SEO Audit".to_owned())));
    }
}
