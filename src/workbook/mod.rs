//! # Workbook Reader
//!
//! Opens an uploaded spreadsheet container and extracts every worksheet as a
//! [`RawSheet`] of uninterpreted cells. Office Open XML (.xlsx, .xlsm) and
//! OpenDocument (.ods) workbooks are detected by content, never by file name.

pub mod cell;
pub(crate) mod ods;
pub mod reference;
pub mod sheet;
pub mod upload;
pub(crate) mod xlsx;

use crate::error::InsightSheetError;
use crate::helpers::zip::ZipHelper;
use crate::workbook::ods::OdsSpreadsheet;
use crate::workbook::sheet::RawSheet;
use crate::workbook::xlsx::XlsxSpreadsheet;
use indexmap::IndexMap;
use serde::Serialize;
use std::fmt::Display;
use std::io::Cursor;
use thiserror::Error;
use tracing::debug;
use tracing::info;
use zip::ZipArchive;

pub use upload::Upload;

/// In-memory reader over the uploaded bytes
pub(crate) type UploadReader = Cursor<Vec<u8>>;

const ZIP_SIGNATURE: &[u8] = b"PK\x03\x04";
const CFB_SIGNATURE: &[u8] = b"\xD0\xCF\x11\xE0\xA1\xB1\x1A\xE1";
const ODS_MIME_TYPE: &[u8] = b"application/vnd.oasis.opendocument.spreadsheet";

#[derive(Error, Debug)]
pub enum WorkbookError {
    #[error("Missing package part '{0}'")]
    MissingPart(String),

    #[error("Workbook contains no worksheets")]
    NoSheets,

    #[error("Sheet '{0}' not found")]
    SheetNotFound(String),

    #[error("Shared string index {0} out of range")]
    SharedStringIndex(usize),

    #[error("Workbook is password protected")]
    PasswordProtected,

    #[error("Sheet '{sheet}' expands to more than {limit} cells")]
    TooManyCells { sheet: String, limit: usize },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkbookFormat {
    Xlsx,
    Ods,
}

impl Display for WorkbookFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Xlsx => write!(f, "xlsx"),
            Self::Ods => write!(f, "ods"),
        }
    }
}

/// One container format's sheet extraction.
pub(crate) trait Spreadsheet {
    fn format(&self) -> WorkbookFormat;

    /// Worksheet names in workbook order.
    fn sheet_names(&self) -> Vec<String>;

    fn read_sheet(&mut self, name: &str) -> Result<RawSheet, InsightSheetError>;
}

/// An opened upload. Owns the file bytes until [`Workbook::into_raw_sheets`].
pub struct Workbook {
    file_name: String,
    sheet_names: Vec<String>,
    inner: Box<dyn Spreadsheet + Send>,
}

impl Workbook {
    /// Detects the container format and reads the sheet directory.
    /// Every failure is reported as [`InsightSheetError::UnreadableFile`].
    pub fn open(upload: Upload) -> Result<Self, InsightSheetError> {
        let file_name = upload.display_name().to_owned();
        let inner = open_spreadsheet(upload.bytes)
            .map_err(|error| match error {
                InsightSheetError::UnreadableFile(reason) => reason,
                error => error.to_string(),
            })
            .map_err(|reason| InsightSheetError::UnreadableFile(format!("{file_name}: {reason}")))?;
        let sheet_names = inner.sheet_names();
        info!(file = %file_name, format = %inner.format(), sheets = sheet_names.len(), "Opened workbook");
        Ok(Workbook { file_name, sheet_names, inner })
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn format(&self) -> WorkbookFormat {
        self.inner.format()
    }

    pub fn sheet_names(&self) -> &[String] {
        &self.sheet_names
    }

    pub fn read_sheet(&mut self, name: &str) -> Result<RawSheet, InsightSheetError> {
        let sheet = self.inner.read_sheet(name)?;
        debug!(sheet = name, cells = sheet.cells().len(), "Extracted sheet");
        Ok(sheet)
    }

    /// Extracts every worksheet in workbook order and releases the file bytes.
    /// A damaged worksheet part makes the whole file unreadable.
    pub fn into_raw_sheets(mut self) -> Result<IndexMap<String, RawSheet>, InsightSheetError> {
        let mut sheets = IndexMap::with_capacity(self.sheet_names.len());
        for name in std::mem::take(&mut self.sheet_names) {
            let sheet = self.read_sheet(&name).map_err(|error| {
                InsightSheetError::UnreadableFile(format!("{}: sheet '{}': {}", self.file_name, name, error))
            })?;
            sheets.insert(name, sheet);
        }
        Ok(sheets)
    }
}

fn open_spreadsheet(bytes: Vec<u8>) -> Result<Box<dyn Spreadsheet + Send>, InsightSheetError> {
    if bytes.starts_with(CFB_SIGNATURE) {
        return Err(InsightSheetError::UnreadableFile(
            "legacy .xls or encrypted workbooks are not supported".to_owned(),
        ));
    }
    if !bytes.starts_with(ZIP_SIGNATURE) {
        return Err(InsightSheetError::UnreadableFile("not a spreadsheet file".to_owned()));
    }

    let mut zip = ZipArchive::new(Cursor::new(bytes))?;
    if zip.contains("xl/workbook.xml") {
        Ok(Box::new(XlsxSpreadsheet::open(zip)?))
    } else if zip.contains("xl/workbook.bin") {
        Err(InsightSheetError::UnreadableFile("binary .xlsb workbooks are not supported".to_owned()))
    } else if zip.read_prefix("mimetype", ODS_MIME_TYPE.len() as u64)?.as_deref() == Some(ODS_MIME_TYPE) {
        Ok(Box::new(OdsSpreadsheet::open(zip)?))
    } else {
        Err(InsightSheetError::UnreadableFile("archive is not a spreadsheet".to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{zip_package, OdsFixture, XlsxFixture, C};

    fn unreadable(bytes: Vec<u8>) -> String {
        match Workbook::open(Upload::new(bytes).with_file_name("input.xlsx")) {
            Err(InsightSheetError::UnreadableFile(message)) => message,
            Err(error) => panic!("unexpected error: {error}"),
            Ok(_) => panic!("expected unreadable file"),
        }
    }

    #[test]
    fn rejects_plain_text() {
        let message = unreadable(b"Domain,Monthly Visits\nexample.com,100\n".to_vec());
        assert!(message.starts_with("input.xlsx: "), "{message}");
    }

    #[test]
    fn rejects_legacy_and_truncated_containers() {
        let mut legacy = CFB_SIGNATURE.to_vec();
        legacy.extend_from_slice(&[0u8; 504]);
        assert!(unreadable(legacy).contains("legacy"));

        let mut truncated = XlsxFixture::new().sheet("Sheet1", vec![vec![C::S("x")]]).build();
        truncated.truncate(truncated.len() / 2);
        unreadable(truncated);

        unreadable(zip_package(&[("readme.txt", "hello")]));
        unreadable(Vec::new());
    }

    #[test]
    fn detects_format_by_content() -> Result<(), InsightSheetError> {
        let xlsx = XlsxFixture::new().sheet("Sheet1", vec![vec![C::S("x")]]).build();
        let ods = OdsFixture::new().sheet("Sheet1", vec![vec!["x"]]).build();
        assert_eq!(Workbook::open(Upload::new(xlsx).with_file_name("data.ods"))?.format(), WorkbookFormat::Xlsx);
        assert_eq!(Workbook::open(Upload::new(ods).with_file_name("data.xlsx"))?.format(), WorkbookFormat::Ods);
        Ok(())
    }

    #[test]
    fn extracts_sheets_in_workbook_order() -> Result<(), InsightSheetError> {
        let bytes = XlsxFixture::new()
            .sheet("Keyword Reports", vec![vec![C::S("Keyword")], vec![C::S("crm")]])
            .sheet("IE Matrix", vec![vec![C::S("Marketing Tactic")]])
            .build();
        let sheets = Workbook::open(Upload::new(bytes))?.into_raw_sheets()?;
        assert_eq!(sheets.keys().collect::<Vec<_>>(), ["Keyword Reports", "IE Matrix"]);
        assert_eq!(sheets["Keyword Reports"].cells().len(), 2);
        Ok(())
    }
}
