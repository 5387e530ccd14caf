//! Pipeline settings. A value of [`PipelineConfig`] is passed explicitly to
//! every stage; nothing is read from global state.

use crate::error::InsightSheetError;
use crate::error::ResultMessage;
use serde::Deserialize;
use serde::Serialize;
use std::path::Path;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Fraction of non-missing values in a column allowed to be uncoercible.
    /// Within tolerance they become missing with a warning; beyond it the
    /// column gets a `type_mismatch` error.
    pub tolerance: f64,
    /// Cell texts treated as blank (compared after trimming)
    pub missing_values: Vec<String>,
    /// Map spreadsheet error cells (`#DIV/0!`, `#N/A`) to missing instead of
    /// counting them as uncoercible
    pub errors_as_missing: bool,
    /// chrono patterns tried in order for dates stored as text
    pub date_formats: Vec<String>,
    /// Cell references quoted per finding
    pub max_examples: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            tolerance: 0.0,
            missing_values: ["", "N/A", "NA", "n/a", "#N/A", "-", "null"]
                .iter()
                .map(|value| value.to_string())
                .collect(),
            errors_as_missing: false,
            date_formats: [
                "%Y-%m-%d",
                "%Y/%m/%d",
                "%m/%d/%Y",
                "%d.%m.%Y",
                "%b %d, %Y",
                "%B %d, %Y",
                "%d %b %Y",
                "%Y-%m-%d %H:%M:%S",
            ]
            .iter()
            .map(|format| format.to_string())
            .collect(),
            max_examples: 3,
        }
    }
}

impl PipelineConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, InsightSheetError> {
        let config: PipelineConfig = toml::from_str(source)?;
        if !(0.0..=1.0).contains(&config.tolerance) {
            return Err(InsightSheetError::WithContextError(format!(
                "tolerance must be between 0 and 1, got {}",
                config.tolerance
            )));
        }
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, InsightSheetError> {
        let path = path.as_ref();
        let prefix = path.display().to_string();
        std::fs::read_to_string(path)
            .map_err(InsightSheetError::from)
            .and_then(|source| Self::from_toml_str(&source))
            .with_prefix(&prefix)
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_errors_as_missing(mut self, errors_as_missing: bool) -> Self {
        self.errors_as_missing = errors_as_missing;
        self
    }

    /// Whether trimmed cell text is one of the configured blank markers.
    pub fn is_missing_text(&self, text: &str) -> bool {
        let text = text.trim();
        text.is_empty() || self.missing_values.iter().any(|marker| marker.trim() == text)
    }
}
