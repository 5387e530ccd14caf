//! # Table Normalizer
//!
//! Projects a validated [`RawSheet`] onto its schema entry: schema columns in
//! schema order under their canonical names, values coerced to the declared
//! types, blank cells explicitly missing and fully blank rows dropped.

pub mod coerce;
pub mod table;

use crate::config::PipelineConfig;
use crate::error::InsightSheetError;
use crate::normalize::coerce::coerce_cell;
use crate::normalize::coerce::Coercion;
use crate::normalize::table::Column;
use crate::normalize::table::NormalizedTable;
use crate::normalize::table::Row;
use crate::normalize::table::Value;
use crate::schema::SemanticType;
use crate::schema::SheetSchema;
use crate::validation::bind_columns;
use crate::validation::is_blank_row;
use crate::validation::within_tolerance;
use crate::workbook::reference::index_to_reference;
use crate::workbook::sheet::RawSheet;
use thiserror::Error;
use tracing::info;

/// Raised when a sheet that should have failed validation reaches the normalizer.
#[derive(Error, Debug)]
pub enum NormalizeError {
    #[error("Value at '{sheet}'!{reference} in column '{column}' cannot be read as {kind}")]
    Uncoercible {
        sheet: String,
        column: String,
        reference: String,
        kind: SemanticType,
    },

    #[error("Sheet '{sheet}' has no column for required field '{column}'")]
    MissingColumn { sheet: String, column: String },

    #[error("Sheet '{0}' has no data rows")]
    EmptySheet(String),
}

/// Builds the normalized table for one sheet. Refuses, rather than returning
/// a partial table, when the sheet holds anything validation rejects.
pub fn normalize(sheet: &RawSheet, schema: &SheetSchema, config: &PipelineConfig) -> Result<NormalizedTable, InsightSheetError> {
    let binding = bind_columns(sheet, schema);
    let cols = binding.bound_columns();
    let rows = sheet
        .data_rows()
        .filter(|row| !is_blank_row(sheet, *row, &cols, config))
        .collect::<Vec<_>>();
    if rows.is_empty() && schema.required {
        Err(NormalizeError::EmptySheet(schema.name.to_owned()))?
    }

    let mut columns = Vec::with_capacity(schema.columns.len());
    let mut values_by_column = Vec::<Vec<Value>>::with_capacity(schema.columns.len());
    for (column, position) in schema.columns.iter().zip(&binding.positions) {
        columns.push(Column {
            name: column.name.to_owned(),
            kind: column.kind,
            header: position.as_ref().map(|(_, header)| header.to_owned()),
        });

        let Some((col, _)) = position else {
            if column.required {
                Err(NormalizeError::MissingColumn {
                    sheet: schema.name.to_owned(),
                    column: column.name.to_owned(),
                })?
            }
            values_by_column.push(vec![Value::Missing; rows.len()]);
            continue;
        };

        let mut values = Vec::with_capacity(rows.len());
        let mut present = 0usize;
        let mut invalid = Vec::<usize>::new();
        for row in &rows {
            match coerce_cell(sheet.get(*row, *col), column.kind, sheet.date_system(), config) {
                Coercion::Exact(value) | Coercion::Reformatted(value) => {
                    present += 1;
                    values.push(value);
                }
                Coercion::Missing => values.push(Value::Missing),
                Coercion::Invalid => {
                    present += 1;
                    invalid.push(*row);
                    values.push(Value::Missing);
                }
            }
        }
        if let Some(row) = invalid.first() {
            if !within_tolerance(invalid.len(), present, config) {
                Err(NormalizeError::Uncoercible {
                    sheet: schema.name.to_owned(),
                    column: column.name.to_owned(),
                    reference: index_to_reference(*row, *col),
                    kind: column.kind,
                })?
            }
        }
        values_by_column.push(values);
    }

    let mut columns_iter = values_by_column.into_iter().map(|values| values.into_iter()).collect::<Vec<_>>();
    let rows = rows
        .iter()
        .map(|row| Row {
            source_row: row + 1,
            values: columns_iter
                .iter_mut()
                .map(|values| values.next().unwrap_or_default())
                .collect(),
        })
        .collect::<Vec<_>>();

    info!(sheet = %schema.name, key = %schema.key, rows = rows.len(), "Normalized table");
    Ok(NormalizedTable {
        key: schema.key.to_owned(),
        sheet: schema.name.to_owned(),
        columns,
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaRegistry;
    use crate::testing::{XlsxFixture, C};
    use crate::workbook::Upload;
    use crate::workbook::Workbook;
    use chrono::NaiveDate;

    fn read(fixture: XlsxFixture, name: &str) -> RawSheet {
        let mut workbook = Workbook::open(Upload::new(fixture.build())).expect("fixture workbook");
        workbook.read_sheet(name).expect("fixture sheet")
    }

    fn tactics_sheet() -> RawSheet {
        read(XlsxFixture::new().sheet("Low Hanging Fruit", vec![
            vec![C::S("Notes"), C::S("Expected Lift %"), C::S("Tactics"), C::S("Total Effort")],
            vec![C::S("first"), C::S("12%"), C::S("SEO Audit"), C::N(3.0)],
            vec![C::Blank, C::Blank, C::Blank, C::Blank],
            vec![C::S("second"), C::S("5%"), C::S("Paid Refresh"), C::Blank],
        ]), "Low Hanging Fruit")
    }

    #[test]
    fn projects_renames_and_coerces() -> Result<(), InsightSheetError> {
        let registry = SchemaRegistry::default();
        let table = normalize(&tactics_sheet(), registry.sheet("tactics")?, &PipelineConfig::default())?;

        let names = table.columns.iter().map(|column| column.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, ["tactic", "funnel_stage", "effort", "projected_cost", "lift"]);
        assert_eq!(table.columns[0].header.as_deref(), Some("Tactics"));
        assert_eq!(table.columns[1].header, None);

        assert_eq!(table.len(), 2);
        assert_eq!(table.rows[0].source_row, 2);
        assert_eq!(table.rows[1].source_row, 4);
        assert_eq!(table.rows[0].values, [
            Value::Text("SEO Audit".to_owned()),
            Value::Missing,
            Value::Integer(3),
            Value::Missing,
            Value::Percentage(0.12),
        ]);
        assert_eq!(table.get(1, "effort"), Some(&Value::Missing));
        assert_eq!(table.get(1, "lift"), Some(&Value::Percentage(0.05)));
        Ok(())
    }

    #[test]
    fn normalization_is_idempotent() -> Result<(), InsightSheetError> {
        let registry = SchemaRegistry::default();
        let sheet = tactics_sheet();
        let schema = registry.sheet("tactics")?;
        let config = PipelineConfig::default();
        assert_eq!(normalize(&sheet, schema, &config)?, normalize(&sheet, schema, &config)?);
        Ok(())
    }

    #[test]
    fn resolves_aliases_and_units() -> Result<(), InsightSheetError> {
        let sheet = read(XlsxFixture::new().sheet("Core Web Vitals", vec![
            vec![C::S("URL"), C::S("LCP (s)")],
            vec![C::S("https://acme.com"), C::S("2.3s")],
        ]), "Core Web Vitals");
        let registry = SchemaRegistry::default();
        let table = normalize(&sheet, registry.sheet("web_vitals")?, &PipelineConfig::default())?;
        assert_eq!(table.get(0, "lcp_seconds"), Some(&Value::Number(2.3)));
        assert_eq!(table.get(0, "cls"), Some(&Value::Missing));
        Ok(())
    }

    #[test]
    fn dates_from_month_text() -> Result<(), InsightSheetError> {
        let sheet = read(XlsxFixture::new().sheet("Similarweb PPC Spend", vec![
            vec![C::S("YearMonth"), C::S("Mobile Spend"), C::S("Desktop Spend")],
            vec![C::S("Jan 2024"), C::S("$1,000"), C::N(500.0)],
            vec![C::D(45352.0), C::S("(200)"), C::N(0.0)],
        ]), "Similarweb PPC Spend");
        let registry = SchemaRegistry::default();
        let table = normalize(&sheet, registry.sheet("ppc_spend")?, &PipelineConfig::default())?;
        let months = table.column_values("year_month").unwrap().filter_map(Value::as_date).collect::<Vec<_>>();
        assert_eq!(months, [NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()]);
        assert_eq!(table.get(1, "mobile_spend"), Some(&Value::Currency(-200.0)));
        assert_eq!(table.get(1, "desktop_spend"), Some(&Value::Currency(0.0)));
        Ok(())
    }

    #[test]
    fn refuses_values_validation_rejects() {
        let sheet = read(XlsxFixture::new().sheet("Low Hanging Fruit", vec![
            vec![C::S("Tactics"), C::S("Total Effort"), C::S("Expected Lift %")],
            vec![C::S("SEO Audit"), C::S("three"), C::N(0.1)],
        ]), "Low Hanging Fruit");
        let registry = SchemaRegistry::default();
        let schema = registry.sheet("tactics").unwrap();
        let result = normalize(&sheet, schema, &PipelineConfig::default());
        assert!(matches!(
            result,
            Err(InsightSheetError::NormalizeError(NormalizeError::Uncoercible { ref reference, .. })) if reference == "B2"
        ));

        let tolerant = PipelineConfig::default().with_tolerance(1.0);
        let table = normalize(&sheet, schema, &tolerant).expect("tolerated");
        assert_eq!(table.get(0, "effort"), Some(&Value::Missing));
    }

    #[test]
    fn refuses_missing_required_column() {
        let sheet = read(XlsxFixture::new().sheet("Low Hanging Fruit", vec![
            vec![C::S("Tactics"), C::S("Total Effort")],
            vec![C::S("SEO Audit"), C::N(3.0)],
        ]), "Low Hanging Fruit");
        let registry = SchemaRegistry::default();
        let result = normalize(&sheet, registry.sheet("tactics").unwrap(), &PipelineConfig::default());
        assert!(matches!(
            result,
            Err(InsightSheetError::NormalizeError(NormalizeError::MissingColumn { ref column, .. })) if column == "lift"
        ));
    }
}
