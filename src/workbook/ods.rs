use crate::error::InsightSheetError;
use crate::error::ResultMessage;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::xml::XmlTextHelper;
use crate::helpers::zip::ZipHelper;
use crate::match_xml_events;
use crate::workbook::cell::CellType;
use crate::workbook::cell::DateSystem;
use crate::workbook::cell::RawCell;
use crate::workbook::sheet::RawSheet;
use crate::workbook::Spreadsheet;
use crate::workbook::UploadReader;
use crate::workbook::WorkbookError;
use crate::workbook::WorkbookFormat;
use quick_xml::events::Event;
use quick_xml::name::QName;
use zip::ZipArchive;

const PART_CONTENT: &str = "content.xml";
const PART_MANIFEST: &str = "META-INF/manifest.xml";

const TABLE: QName = QName(b"table:table");
const TABLE_ROW: QName = QName(b"table:table-row");
const TABLE_CELL: QName = QName(b"table:table-cell");
const TABLE_COVERED_CELL: QName = QName(b"table:covered-table-cell");
const ANNOTATION: QName = QName(b"office:annotation");
const PARAGRAPH: QName = QName(b"text:p");
const SPACES: QName = QName(b"text:s");
const LINE_BREAK: QName = QName(b"text:line-break");
const FILE_ENTRY: QName = QName(b"manifest:file-entry");
const ENCRYPTION_DATA: QName = QName(b"manifest:encryption-data");

/// Trailing repeats beyond this are formatting padding, not data.
const MAX_REPEAT: usize = 1 << 16;
/// Upper bound on cells materialized from one sheet's repeated blocks.
const MAX_CELLS: usize = 1 << 20;

/// OpenDocument spreadsheet (.ods) held in memory.
pub(crate) struct OdsSpreadsheet {
    zip: ZipArchive<UploadReader>,
    sheet_names: Vec<String>,
}

impl OdsSpreadsheet {
    pub(crate) fn open(mut zip: ZipArchive<UploadReader>) -> Result<Self, InsightSheetError> {
        if is_password_protected(&mut zip).with_prefix(PART_MANIFEST)? {
            Err(WorkbookError::PasswordProtected)?
        }
        let sheet_names = load_sheet_names(&mut zip).with_prefix(PART_CONTENT)?;
        if sheet_names.is_empty() {
            Err(WorkbookError::NoSheets)?
        }
        Ok(OdsSpreadsheet { zip, sheet_names })
    }
}

impl Spreadsheet for OdsSpreadsheet {
    fn format(&self) -> WorkbookFormat {
        WorkbookFormat::Ods
    }

    fn sheet_names(&self) -> Vec<String> {
        self.sheet_names.to_owned()
    }

    fn read_sheet(&mut self, name: &str) -> Result<RawSheet, InsightSheetError> {
        if !self.sheet_names.iter().any(|sheet_name| sheet_name == name) {
            Err(WorkbookError::SheetNotFound(name.to_owned()))?
        }
        let mut reader = self.zip
            .xml_reader(PART_CONTENT)?
            .ok_or_else(|| WorkbookError::MissingPart(PART_CONTENT.to_owned()))?;

        let mut found = false;
        match_xml_events!(reader => {
            Event::Start(event) if event.name() == TABLE => {
                if event.get_attribute_value("table:name")?.as_deref() == Some(name) {
                    found = true;
                    break;
                }
            }
        });
        if !found {
            Err(WorkbookError::SheetNotFound(name.to_owned()))?
        }

        // ODS stores typed values in attributes, so there is no date system to apply
        let mut sheet = RawSheet::new(name, DateSystem::default());
        let mut row = 0usize;
        let mut col = 0usize;
        let mut cells = 0usize;
        let mut row_count = 1usize;
        let mut col_count = 1usize;
        let mut kind = None::<CellType>;
        let mut value = String::new();
        let mut text_context = false;
        let mut annotation_context = false;
        match_xml_events!(reader => {
            Event::End(event) if event.name() == TABLE => break,
            Event::Start(event) if event.name() == TABLE_ROW => {
                row_count = event.parse_attribute_value("table:number-rows-repeated")?.unwrap_or(1);
                col = 0;
            }
            Event::End(event) if event.name() == TABLE_ROW => row = row.saturating_add(row_count),
            Event::Start(event) if event.name() == TABLE_CELL || event.name() == TABLE_COVERED_CELL => {
                value.clear();
                col_count = event.parse_attribute_value("table:number-columns-repeated")?.unwrap_or(1);
                let value_type = event.get_attribute_value("office:value-type")?;
                let is_error = event.get_attribute_value("calcext:value-type")?.as_deref() == Some("error");
                kind = match value_type.as_deref() {
                    None => None,
                    Some(_) if is_error => Some(CellType::Error),
                    Some("string") => Some(CellType::Text),
                    Some("boolean") => Some(CellType::Boolean),
                    Some("date") => Some(CellType::IsoDateTime),
                    Some("time") => Some(CellType::IsoDuration),
                    // float, percentage, currency
                    Some(_) => Some(CellType::Number),
                };
                match kind {
                    Some(CellType::Boolean) => {
                        let is_true = event.get_attribute_value("office:boolean-value")?
                            .map(|flag| flag != "false" && flag != "0")
                            .unwrap_or(false);
                        value.push_str(if is_true { "1" } else { "0" });
                    }
                    Some(CellType::IsoDateTime) => if let Some(data) = event.get_attribute_value("office:date-value")? {
                        value.push_str(&data);
                    }
                    Some(CellType::IsoDuration) => if let Some(data) = event.get_attribute_value("office:time-value")? {
                        value.push_str(&data);
                    }
                    Some(CellType::Number) => if let Some(data) = event.get_attribute_value("office:value")? {
                        value.push_str(&data);
                    }
                    _ => (),
                }
                // Strings and error texts come from the paragraphs
                text_context = matches!(kind, Some(CellType::Text) | Some(CellType::Error));
            }
            Event::End(event) if event.name() == TABLE_CELL || event.name() == TABLE_COVERED_CELL => {
                if let Some(kind) = kind.take() {
                    if !value.is_empty() && row < MAX_REPEAT && col < MAX_REPEAT {
                        let rows = row_count.min(MAX_REPEAT - row);
                        let cols = col_count.min(MAX_REPEAT - col);
                        cells = cells.saturating_add(rows.saturating_mul(cols));
                        if cells > MAX_CELLS {
                            Err(WorkbookError::TooManyCells { sheet: name.to_owned(), limit: MAX_CELLS })?
                        }
                        for row_offset in 0..rows {
                            for col_offset in 0..cols {
                                sheet.push(RawCell {
                                    row: row + row_offset,
                                    col: col + col_offset,
                                    kind,
                                    value: value.to_owned(),
                                });
                            }
                        }
                    }
                }
                col = col.saturating_add(col_count);
                text_context = false;
                annotation_context = false;
            }
            Event::Start(event) if text_context && event.name() == ANNOTATION => annotation_context = true,
            Event::End(event) if text_context && event.name() == ANNOTATION => annotation_context = false,
            Event::Start(event) if text_context && !annotation_context && event.name() == PARAGRAPH => {
                if !value.is_empty() {
                    value.push('\n');
                }
            }
            Event::Start(event) if text_context && !annotation_context && event.name() == SPACES => {
                let count = event.parse_attribute_value("text:c")?.unwrap_or(1usize);
                value.extend(std::iter::repeat(' ').take(count.min(MAX_REPEAT)));
            }
            Event::Start(event) if text_context && !annotation_context && event.name() == LINE_BREAK => value.push('\n'),
            Event::Text(event) if text_context && !annotation_context => value.push_bytes_text(&event)?,
            Event::GeneralRef(event) if text_context && !annotation_context => value.push_bytes_ref(&event)?,
        });
        Ok(sheet)
    }
}

fn load_sheet_names(zip: &mut ZipArchive<UploadReader>) -> Result<Vec<String>, InsightSheetError> {
    let mut reader = zip
        .xml_reader(PART_CONTENT)?
        .ok_or_else(|| WorkbookError::MissingPart(PART_CONTENT.to_owned()))?;
    let mut names = Vec::new();
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TABLE => {
            if let Some(name) = event.get_attribute_value("table:name")? {
                names.push(name.to_string());
            }
        }
    });
    Ok(names)
}

/// Encrypted packages list `manifest:encryption-data` under a file entry.
fn is_password_protected(zip: &mut ZipArchive<UploadReader>) -> Result<bool, InsightSheetError> {
    let mut reader = match zip.xml_reader(PART_MANIFEST)? {
        Some(reader) => reader,
        None => return Ok(false),
    };
    let mut in_file_entry = false;
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == FILE_ENTRY => in_file_entry = true,
        Event::End(event) if event.name() == FILE_ENTRY => in_file_entry = false,
        Event::Start(event) if in_file_entry && event.name() == ENCRYPTION_DATA => return Ok(true),
    });
    Ok(false)
}
