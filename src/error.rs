use thiserror::Error;

/// Main error type for the workbook ingestion pipeline.
/// Aggregates errors from the standard library, dependencies and internal modules.
#[derive(Error, Debug)]
pub enum InsightSheetError {
    #[error("{0}")]
    WithContextError(String),

    /// The upload is not a spreadsheet container this crate can read.
    /// Fatal: nothing downstream of the reader runs.
    #[error("File unreadable: {0}")]
    UnreadableFile(String),

    /// One or more error-severity findings were reported.
    #[error("Validation failed with {} error(s)", .0.errors().count())]
    Validation(crate::validation::ValidationReport),

    // Standard library errors
    #[error("{0}")]
    IoError(#[from] std::io::Error),

    #[error("{0}")]
    ParseIntError(#[from] std::num::ParseIntError),

    #[error("{0}")]
    ParseFloatError(#[from] std::num::ParseFloatError),

    #[error("{0}")]
    ParseDateTimeError(#[from] chrono::ParseError),

    #[error("{0}")]
    StringEncodingError(#[from] std::str::Utf8Error),

    // Third-party library errors
    #[error("{0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("{0}")]
    XmlError(#[from] quick_xml::Error),

    #[error("{0}")]
    XmlEncodingError(#[from] quick_xml::encoding::EncodingError),

    #[error("{0}")]
    XmlAttributeError(#[from] quick_xml::events::attributes::AttrError),

    #[error("{0}")]
    TomlError(#[from] toml::de::Error),

    #[error("{0}")]
    JsonError(#[from] serde_json::Error),

    // Helper module errors
    #[error("{0}")]
    XmlHelperError(#[from] crate::helpers::xml::XmlError),

    // Pipeline module errors
    #[error("{0}")]
    WorkbookError(#[from] crate::workbook::WorkbookError),

    #[error("{0}")]
    SchemaError(#[from] crate::schema::SchemaError),

    #[error("{0}")]
    NormalizeError(#[from] crate::normalize::NormalizeError),

    #[error("{0}")]
    AggregateError(#[from] crate::aggregate::AggregateError),
}

pub(crate) trait ResultMessage {
    fn with_prefix(self, message: &str) -> Self;
}

impl<T> ResultMessage for Result<T, InsightSheetError> {
    fn with_prefix(self, message: &str) -> Self {
        self.map_err(|e| InsightSheetError::WithContextError(format!("{}: {}", message, e)))
    }
}
