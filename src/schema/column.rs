use crate::schema::SchemaError;
use serde::Deserialize;
use serde::Serialize;
use std::fmt::Display;

/// Business type a column's values are coerced to.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum SemanticType {
    /// Calendar date (time of day dropped)
    Date,
    /// Monetary amount, currency symbols stripped
    Currency,
    /// Fraction, so that 12% is 0.12
    Percentage,
    /// Whole number
    Integer,
    /// Any finite number
    Number,
    Text,
}

impl SemanticType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Date => "date",
            Self::Currency => "currency",
            Self::Percentage => "percentage",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Text => "text",
        }
    }

    /// Parses a type name, case-insensitive, accepting common aliases.
    pub fn parse(name: &str) -> Result<Self, SchemaError> {
        match name.trim().to_ascii_uppercase().as_str() {
            "DATE" | "MONTH" | "DATETIME" => Ok(Self::Date),
            "CURRENCY" | "MONEY" => Ok(Self::Currency),
            "PERCENTAGE" | "PERCENT" | "PCT" => Ok(Self::Percentage),
            "INTEGER" | "INT" | "BIGINT" | "COUNT" => Ok(Self::Integer),
            "NUMBER" | "FLOAT" | "DOUBLE" | "DECIMAL" | "NUMERIC" => Ok(Self::Number),
            "TEXT" | "STRING" | "VARCHAR" => Ok(Self::Text),
            _ => Err(SchemaError::UnknownType(name.to_owned())),
        }
    }
}

impl TryFrom<String> for SemanticType {
    type Error = SchemaError;

    fn try_from(name: String) -> Result<Self, Self::Error> {
        Self::parse(&name)
    }
}

impl Display for SemanticType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

fn default_required() -> bool {
    true
}

/// One expected column: canonical name, accepted header spellings and type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(rename = "type")]
    pub kind: SemanticType,
    #[serde(default = "default_required")]
    pub required: bool,
}

impl ColumnSchema {
    pub fn new(name: &str, kind: SemanticType) -> Self {
        Self {
            name: name.to_owned(),
            aliases: Vec::new(),
            kind,
            required: true,
        }
    }

    pub fn alias(mut self, alias: &str) -> Self {
        self.aliases.push(alias.to_owned());
        self
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Canonical name followed by every alias.
    pub fn spellings(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.aliases.iter().map(|alias| alias.as_str()))
    }

    /// Whether a header cell names this column.
    pub fn matches(&self, header: &str) -> bool {
        let header = normalize_header(header);
        self.spellings().any(|spelling| normalize_header(spelling) == header)
    }
}

/// Trimmed, lower-cased, whitespace-collapsed form used for header comparison.
pub fn normalize_header(header: &str) -> String {
    header
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
