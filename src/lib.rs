//! # Insight Sheet
//!
//! Ingestion pipeline for the marketing-analytics workbook behind a dashboard.
//! An uploaded spreadsheet is read, checked against a schema registry, turned
//! into typed tables and aggregated into chart-ready metrics.
//!
//! ## Stages
//!
//! - **Workbook Reader**: opens `.xlsx`/`.xlsm` and `.ods` uploads from memory and
//!   extracts every worksheet as a grid of raw cells
//! - **Sheet Validator**: reports missing sheets, missing columns, uncoercible
//!   values and empty sheets without stopping at the first problem
//! - **Table Normalizer**: projects each clean sheet onto its canonical columns
//!   with typed values and explicit missing markers
//! - **Aggregator**: pure functions from tables to [`aggregate::MetricSummary`]
//!   values, plus the dashboard's own formulas
//!
//! ## Example
//!
//! ```no_run
//! use insight_sheet::{ingest, PipelineConfig, SchemaRegistry, Upload};
//!
//! let bytes = std::fs::read("report.xlsx")?;
//! let ingestion = ingest(Upload::new(bytes).with_file_name("report.xlsx"), &SchemaRegistry::default(), &PipelineConfig::default())?;
//! for finding in ingestion.report().findings() {
//!     println!("{finding}");
//! }
//! let dashboard = ingestion.dashboard()?;
//! println!("{} metrics, {} tactics", dashboard.metrics.len(), dashboard.tactics.len());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod aggregate;
pub mod config;
pub mod error;
pub mod normalize;
pub mod pipeline;
pub mod schema;
pub mod validation;
pub mod workbook;

mod helpers {
    pub(crate) mod xml;
    pub(crate) mod zip;
}

#[cfg(test)]
mod testing;

pub use crate::config::PipelineConfig;
pub use crate::error::InsightSheetError;
pub use crate::pipeline::ingest;
pub use crate::pipeline::Ingestion;
pub use crate::schema::SchemaRegistry;
pub use crate::workbook::Upload;
