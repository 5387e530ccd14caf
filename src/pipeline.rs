//! Reader, validator and normalizer run in order over one upload.

use crate::aggregate::dashboard;
use crate::aggregate::dashboard::Dashboard;
use crate::config::PipelineConfig;
use crate::error::InsightSheetError;
use crate::normalize::normalize;
use crate::normalize::table::NormalizedTable;
use crate::schema::SchemaRegistry;
use crate::validation::validate;
use crate::validation::ValidationReport;
use crate::workbook::Upload;
use crate::workbook::Workbook;
use indexmap::IndexMap;
use tracing::info;
use tracing::warn;

/// Result of one pipeline run: a table per clean sheet and the full report.
#[derive(Clone, Debug, PartialEq)]
pub struct Ingestion {
    file_name: String,
    tables: IndexMap<String, NormalizedTable>,
    report: ValidationReport,
}

impl Ingestion {
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Normalized tables keyed by schema key, in registry order.
    pub fn tables(&self) -> &IndexMap<String, NormalizedTable> {
        &self.tables
    }

    pub fn table(&self, key: &str) -> Option<&NormalizedTable> {
        self.tables.get(key)
    }

    pub fn report(&self) -> &ValidationReport {
        &self.report
    }

    pub fn into_parts(self) -> (IndexMap<String, NormalizedTable>, ValidationReport) {
        (self.tables, self.report)
    }

    /// Dashboard metrics over whichever tables were produced.
    pub fn dashboard(&self) -> Result<Dashboard, InsightSheetError> {
        dashboard::build(&self.tables)
    }

    /// All-or-nothing view: any error finding becomes [`InsightSheetError::Validation`].
    pub fn into_validated(self) -> Result<IndexMap<String, NormalizedTable>, InsightSheetError> {
        if self.report.has_errors() {
            Err(InsightSheetError::Validation(self.report))
        } else {
            Ok(self.tables)
        }
    }
}

/// Runs the pipeline over one uploaded workbook. Only an unreadable file
/// fails the call; validation problems are returned in the report and
/// sheets with error findings or without any cells are left out of the tables.
pub fn ingest(upload: Upload, registry: &SchemaRegistry, config: &PipelineConfig) -> Result<Ingestion, InsightSheetError> {
    let workbook = Workbook::open(upload)?;
    let file_name = workbook.file_name().to_owned();
    let sheets = workbook.into_raw_sheets()?;
    let report = validate(&sheets, registry, config);

    let mut tables = IndexMap::new();
    for schema in registry.sheets() {
        let Some(sheet) = sheets.get(&schema.name) else { continue };
        if report.sheet_has_errors(&schema.name) {
            warn!(sheet = %schema.name, "Skipped sheet with validation errors");
            continue;
        }
        if sheet.is_empty() {
            warn!(sheet = %schema.name, "Skipped empty sheet");
            continue;
        }
        match normalize(sheet, schema, config) {
            Ok(table) => {
                tables.insert(schema.key.to_owned(), table);
            }
            Err(error) => warn!(sheet = %schema.name, %error, "Skipped sheet that failed to normalize"),
        }
    }

    info!(
        file = %file_name,
        tables = tables.len(),
        errors = report.errors().count(),
        warnings = report.warnings().count(),
        "Ingested workbook"
    );
    Ok(Ingestion { file_name, tables, report })
}
