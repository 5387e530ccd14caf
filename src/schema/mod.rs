//! # Schema Registry
//!
//! Declares which sheets the dashboard expects, the columns each sheet must
//! carry, the header spellings accepted for them and the type every column is
//! coerced to. Validation and normalization both read this one description.

pub mod column;
pub mod registry;

use thiserror::Error;

pub use column::ColumnSchema;
pub use column::SemanticType;
pub use registry::SchemaRegistry;
pub use registry::SheetSchema;

#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Unknown semantic type '{0}'")]
    UnknownType(String),

    #[error("Sheet '{0}' is declared more than once")]
    DuplicateSheet(String),

    #[error("Sheet '{sheet}' declares column '{column}' more than once")]
    DuplicateColumn { sheet: String, column: String },

    #[error("Sheet '{0}' declares no columns")]
    NoColumns(String),

    #[error("Unknown sheet key '{0}'")]
    UnknownSheet(String),
}
