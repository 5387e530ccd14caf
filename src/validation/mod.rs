//! # Sheet Validator
//!
//! Checks the extracted sheets against the schema registry and collects every
//! problem into a [`ValidationReport`]. Validation never stops at the first
//! finding: each expected sheet and each of its columns is examined.

pub mod report;

use crate::config::PipelineConfig;
use crate::normalize::coerce::coerce_cell;
use crate::normalize::coerce::Coercion;
use crate::schema::SchemaRegistry;
use crate::schema::SheetSchema;
use crate::workbook::cell::CellType;
use crate::workbook::reference::index_to_reference;
use crate::workbook::sheet::RawSheet;
use indexmap::IndexMap;
use tracing::debug;
use tracing::warn;

pub use report::Finding;
pub use report::FindingKind;
pub use report::Severity;
pub use report::ValidationReport;

/// Where each schema column was found in a sheet's header row.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ColumnBinding {
    /// Per schema column: (sheet column index, header text), `None` if absent
    pub positions: Vec<Option<(usize, String)>>,
    /// Headers naming an already bound column: (schema column index, sheet column, header)
    pub duplicates: Vec<(usize, usize, String)>,
}

impl ColumnBinding {
    /// Sheet column indexes of the bound schema columns.
    pub fn bound_columns(&self) -> Vec<usize> {
        self.positions.iter().flatten().map(|(col, _)| *col).collect()
    }
}

/// Resolves header cells to schema columns. The left-most header wins when
/// two headers name the same column; unknown headers are ignored.
pub fn bind_columns(sheet: &RawSheet, schema: &SheetSchema) -> ColumnBinding {
    let mut binding = ColumnBinding {
        positions: vec![None; schema.columns.len()],
        duplicates: Vec::new(),
    };
    for (col, header) in sheet.header() {
        if let Some(index) = schema.match_header(&header) {
            if binding.positions[index].is_none() {
                binding.positions[index] = Some((col, header));
            } else {
                binding.duplicates.push((index, col, header));
            }
        }
    }
    binding
}

/// Whether every projected cell of a row is blank or a missing marker.
pub(crate) fn is_blank_row(sheet: &RawSheet, row: usize, cols: &[usize], config: &PipelineConfig) -> bool {
    sheet.row(row, cols).iter().all(|cell| match cell {
        None => true,
        Some(cell) => cell.kind == CellType::Text && config.is_missing_text(&cell.value),
    })
}

/// Whether `invalid` uncoercible values out of `present` non-missing values
/// stay within the configured tolerance.
pub(crate) fn within_tolerance(invalid: usize, present: usize, config: &PipelineConfig) -> bool {
    invalid == 0 || (present > 0 && invalid as f64 / present as f64 <= config.tolerance && config.tolerance > 0.0)
}

/// Validates every sheet the registry declares.
pub fn validate(
    sheets: &IndexMap<String, RawSheet>,
    registry: &SchemaRegistry,
    config: &PipelineConfig,
) -> ValidationReport {
    let mut report = ValidationReport::new();
    for schema in registry.sheets() {
        match sheets.get(&schema.name) {
            Some(sheet) => {
                report.found(&schema.name);
                validate_sheet(sheet, schema, config, &mut report);
            }
            None => {
                report.missing(&schema.name);
                let finding = if schema.required {
                    Finding::new(&schema.name, Severity::Error, FindingKind::MissingSheet, format!(
                        "Missing required sheet '{}'", schema.name
                    ))
                } else {
                    Finding::new(&schema.name, Severity::Warning, FindingKind::MissingSheet, format!(
                        "Missing optional sheet '{}', some charts will be empty", schema.name
                    ))
                };
                push(&mut report, finding);
            }
        }
    }
    report
}

/// Validates one present sheet against its schema entry, appending findings.
pub fn validate_sheet(sheet: &RawSheet, schema: &SheetSchema, config: &PipelineConfig, report: &mut ValidationReport) {
    let empty_severity = if schema.required { Severity::Error } else { Severity::Warning };
    if sheet.is_empty() {
        push(report, Finding::new(&schema.name, empty_severity, FindingKind::EmptySheet, format!(
            "Sheet '{}' is empty", schema.name
        )));
        return;
    }

    let binding = bind_columns(sheet, schema);
    debug!(sheet = %schema.name, bound = binding.bound_columns().len(), expected = schema.columns.len(), "Resolved header");

    for (column, position) in schema.columns.iter().zip(&binding.positions) {
        if position.is_some() {
            continue;
        }
        let expected = column.aliases.first().unwrap_or(&column.name);
        let finding = if column.required {
            Finding::new(&schema.name, Severity::Error, FindingKind::MissingColumn, format!(
                "Missing required column '{}' (expected header '{}')", column.name, expected
            ))
        } else {
            Finding::new(&schema.name, Severity::Warning, FindingKind::MissingColumn, format!(
                "Missing optional column '{}' (expected header '{}'), values will be empty", column.name, expected
            ))
        };
        push(report, finding.column(&column.name));
    }

    for (index, col, header) in &binding.duplicates {
        let column = &schema.columns[*index];
        let header_row = sheet.header_row().unwrap_or_default();
        push(report, Finding::new(&schema.name, Severity::Warning, FindingKind::DuplicateColumn, format!(
            "Header '{}' also names column '{}', the left-most header is used", header, column.name
        ))
        .column(&column.name)
        .cells(1, vec![index_to_reference(header_row, *col)]));
    }

    let cols = binding.bound_columns();
    let rows = sheet
        .data_rows()
        .filter(|row| !is_blank_row(sheet, *row, &cols, config))
        .collect::<Vec<_>>();
    if rows.is_empty() {
        push(report, Finding::new(&schema.name, empty_severity, FindingKind::EmptySheet, format!(
            "Sheet '{}' has no data rows (only headers)", schema.name
        )));
        return;
    }

    for (column, position) in schema.columns.iter().zip(&binding.positions) {
        let Some((col, _)) = position else { continue };
        let mut tally = Tally::default();
        for row in &rows {
            let cell = sheet.get(*row, *col);
            let reference = || index_to_reference(*row, *col);
            match coerce_cell(cell, column.kind, sheet.date_system(), config) {
                Coercion::Exact(_) => tally.present += 1,
                Coercion::Reformatted(_) => {
                    tally.present += 1;
                    tally.reformatted.record(reference(), config.max_examples);
                }
                Coercion::Missing => {
                    if cell.map(|cell| cell.kind == CellType::Error).unwrap_or(false) {
                        tally.errors.record(reference(), config.max_examples);
                    }
                }
                Coercion::Invalid => {
                    tally.present += 1;
                    tally.invalid.record(reference(), config.max_examples);
                }
            }
        }

        let kind = column.kind;
        if tally.invalid.count > 0 {
            let finding = if within_tolerance(tally.invalid.count, tally.present, config) {
                Finding::new(&schema.name, Severity::Warning, FindingKind::ToleratedValue, format!(
                    "{} value(s) in column '{}' cannot be read as {} and are treated as missing",
                    tally.invalid.count, column.name, kind
                ))
            } else {
                Finding::new(&schema.name, Severity::Error, FindingKind::TypeMismatch, format!(
                    "{} value(s) in column '{}' cannot be read as {}",
                    tally.invalid.count, column.name, kind
                ))
            };
            push(report, finding.column(&column.name).cells(tally.invalid.count, tally.invalid.examples));
        }
        if tally.reformatted.count > 0 {
            push(report, Finding::new(&schema.name, Severity::Warning, FindingKind::CoercedValue, format!(
                "{} value(s) in column '{}' were reformatted to {}",
                tally.reformatted.count, column.name, kind
            ))
            .column(&column.name)
            .cells(tally.reformatted.count, tally.reformatted.examples));
        }
        if tally.errors.count > 0 {
            push(report, Finding::new(&schema.name, Severity::Warning, FindingKind::ErrorValue, format!(
                "{} error cell(s) in column '{}' are treated as missing",
                tally.errors.count, column.name
            ))
            .column(&column.name)
            .cells(tally.errors.count, tally.errors.examples));
        }
    }
}

fn push(report: &mut ValidationReport, finding: Finding) {
    if finding.severity == Severity::Warning {
        warn!(sheet = %finding.sheet, kind = %finding.kind, "{}", finding.message);
    }
    report.push(finding);
}

#[derive(Default)]
struct Cells {
    count: usize,
    examples: Vec<String>,
}

impl Cells {
    fn record(&mut self, reference: String, max_examples: usize) {
        self.count += 1;
        if self.examples.len() < max_examples {
            self.examples.push(reference);
        }
    }
}

/// Per-column coercion counts.
#[derive(Default)]
struct Tally {
    /// Non-missing values, valid or not
    present: usize,
    reformatted: Cells,
    invalid: Cells,
    errors: Cells,
}
