use crate::error::InsightSheetError;
use crate::error::ResultMessage;
use crate::helpers::xml::attribute_value;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::xml::XmlReader;
use crate::helpers::xml::XmlTextHelper;
use crate::helpers::zip::ZipHelper;
use crate::match_xml_events;
use crate::workbook::cell::CellType;
use crate::workbook::cell::DateSystem;
use crate::workbook::cell::RawCell;
use crate::workbook::reference::reference_to_index;
use crate::workbook::sheet::RawSheet;
use crate::workbook::Spreadsheet;
use crate::workbook::UploadReader;
use crate::workbook::WorkbookError;
use crate::workbook::WorkbookFormat;
use quick_xml::events::Event;
use quick_xml::name::QName;
use std::borrow::Cow;
use std::collections::HashMap;
use std::io::BufReader;
use zip::read::ZipFile;
use zip::ZipArchive;

const PART_WORKBOOK: &str = "xl/workbook.xml";
const PART_WORKBOOK_RELATIONSHIPS: &str = "xl/_rels/workbook.xml.rels";
const PART_STYLES: &str = "xl/styles.xml";
const PART_SHARED_STRINGS: &str = "xl/sharedStrings.xml";

const TAG_RELATIONSHIP: &[u8] = b"Relationship";
const TAG_CUSTOM_FORMATS: QName = QName(b"numFmts");
const TAG_CUSTOM_FORMAT: QName = QName(b"numFmt");
const TAG_FORMAT_INDEXES: QName = QName(b"cellXfs");
const TAG_FORMAT_INDEX: QName = QName(b"xf");
const TAG_SHARED_STRING_ITEM: QName = QName(b"si");
const TAG_PHONETIC_TEXT: QName = QName(b"rPh"); // ruby annotations for East Asian text
const TAG_TEXT: QName = QName(b"t");
const TAG_WORKBOOK_PROPERTIES: QName = QName(b"workbookPr");
const TAG_SHEET: QName = QName(b"sheet");
const TAG_ROW: QName = QName(b"row");
const TAG_CELL: QName = QName(b"c");
const TAG_INLINE_STRING: QName = QName(b"is");
const TAG_VALUE: QName = QName(b"v");

/// Office Open XML workbook (.xlsx / .xlsm) held in memory.
pub(crate) struct XlsxSpreadsheet {
    zip: ZipArchive<UploadReader>,
    date_system: DateSystem,
    /// Cell kind for numbers, indexed by style id
    number_formats: Vec<CellType>,
    shared_strings: Vec<String>,
    /// (sheet name, part path) in workbook order
    sheets: Vec<(String, String)>,
}

impl XlsxSpreadsheet {
    pub(crate) fn open(mut zip: ZipArchive<UploadReader>) -> Result<Self, InsightSheetError> {
        let (sheets, date_system) = load_workbook(&mut zip).with_prefix(PART_WORKBOOK)?;
        if sheets.is_empty() {
            Err(WorkbookError::NoSheets)?
        }
        let number_formats = load_number_formats(&mut zip).with_prefix(PART_STYLES)?;
        let shared_strings = load_shared_strings(&mut zip).with_prefix(PART_SHARED_STRINGS)?;
        Ok(XlsxSpreadsheet {
            zip,
            date_system,
            number_formats,
            shared_strings,
            sheets,
        })
    }

    fn style_kind(&self, style: &str) -> Result<CellType, InsightSheetError> {
        let index = style.trim().parse::<usize>()?;
        // Stylesheets may omit cellXfs entirely; unknown styles are plain numbers
        Ok(self.number_formats.get(index).copied().unwrap_or(CellType::Number))
    }

    fn shared_string(&self, value: &str) -> Result<String, InsightSheetError> {
        let index = value.trim().parse::<usize>()?;
        self.shared_strings
            .get(index)
            .cloned()
            .ok_or_else(|| WorkbookError::SharedStringIndex(index).into())
    }
}

impl Spreadsheet for XlsxSpreadsheet {
    fn format(&self) -> WorkbookFormat {
        WorkbookFormat::Xlsx
    }

    fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|(name, _)| name.to_owned()).collect()
    }

    fn read_sheet(&mut self, name: &str) -> Result<RawSheet, InsightSheetError> {
        let path = self.sheets
            .iter()
            .find(|(sheet_name, _)| sheet_name == name)
            .map(|(_, path)| path.to_owned())
            .ok_or_else(|| WorkbookError::SheetNotFound(name.to_owned()))?;

        let mut sheet = RawSheet::new(name, self.date_system);
        let mut pending = Vec::<(usize, usize, Option<String>, Option<String>, String)>::new();
        {
            let mut reader = self.zip
                .xml_reader(&path)?
                .ok_or_else(|| WorkbookError::MissingPart(path.to_owned()))?;
            let mut row_count = 0usize;
            let mut col_count = 0usize;
            let mut row = 0usize;
            let mut col = 0usize;
            let mut cell_type = None::<String>;
            let mut style = None::<String>;
            let mut value = String::new();
            match_xml_events!(reader => {
                Event::Start(event) if event.name() == TAG_ROW => {
                    if let Some(number) = event.parse_attribute_value::<usize>("r")? {
                        row_count = number.saturating_sub(1);
                    }
                    col_count = 0;
                }
                Event::End(event) if event.name() == TAG_ROW => {
                    row_count += 1;
                }
                Event::Start(event) if event.name() == TAG_CELL => {
                    (row, col) = event.get_attribute_value("r")?
                        .and_then(|reference| reference_to_index(&reference))
                        .unwrap_or((row_count, col_count));
                    col_count = col + 1;
                    cell_type = event.get_attribute_value("t")?.map(|t| t.to_string());
                    style = event.get_attribute_value("s")?.map(|s| s.to_string());
                    value.clear();
                }
                Event::Start(event) if event.name() == TAG_INLINE_STRING => {
                    value = read_string_value(&mut reader, TAG_INLINE_STRING, false)?;
                }
                Event::Start(event) if event.name() == TAG_VALUE => {
                    value = read_string_value(&mut reader, TAG_VALUE, true)?;
                }
                Event::End(event) if event.name() == TAG_CELL => {
                    if !value.is_empty() {
                        pending.push((row, col, cell_type.take(), style.take(), std::mem::take(&mut value)));
                    }
                }
            });
        }

        for (row, col, cell_type, style, value) in pending {
            let kind = match cell_type.as_deref() {
                Some("s") => {
                    let text = self.shared_string(&value)?;
                    if !text.is_empty() {
                        sheet.push(RawCell { row, col, kind: CellType::Text, value: text });
                    }
                    continue;
                }
                Some("inlineStr") | Some("str") => CellType::Text,
                Some("b") => CellType::Boolean,
                Some("e") => CellType::Error,
                Some("d") => CellType::IsoDateTime,
                _ => match style.as_deref() {
                    Some(style) if !style.is_empty() => self.style_kind(style)?,
                    _ => CellType::Number,
                },
            };
            sheet.push(RawCell { row, col, kind, value });
        }
        Ok(sheet)
    }
}

/// Maps relationship ids to worksheet part paths.
fn load_relationships(zip: &mut ZipArchive<UploadReader>) -> Result<HashMap<String, String>, InsightSheetError> {
    let mut reader = zip.xml_reader(PART_WORKBOOK_RELATIONSHIPS)?
        .ok_or_else(|| WorkbookError::MissingPart(PART_WORKBOOK_RELATIONSHIPS.to_owned()))?;
    let mut relationships: HashMap<String, String> = HashMap::new();
    match_xml_events!(reader => {
        Event::Start(event) if event.local_name().as_ref() == TAG_RELATIONSHIP => {
            let id = event.get_attribute_value("Id")?;
            let kind = event.get_attribute_value("Type")?;
            let target = event.get_attribute_value("Target")?;
            if kind.map(|it| it.ends_with("/worksheet")).unwrap_or(true) {
                if let Some((id, target)) = id.zip(target) {
                    relationships.insert(id.to_string(), to_zip_path(target));
                }
            }
        }
    });
    Ok(relationships)
}

/// Worksheet (name, path) pairs in workbook order, plus the date system.
fn load_workbook(zip: &mut ZipArchive<UploadReader>) -> Result<(Vec<(String, String)>, DateSystem), InsightSheetError> {
    let relationships = load_relationships(zip)?;
    let mut reader = zip.xml_reader(PART_WORKBOOK)?
        .ok_or_else(|| WorkbookError::MissingPart(PART_WORKBOOK.to_owned()))?;
    let mut sheets: Vec<(String, String)> = Vec::new();
    let mut date_system = DateSystem::Excel1900;
    match_xml_events!(reader => {
        Event::Start(event) if event.local_name().as_ref() == TAG_SHEET.as_ref() => {
            let mut name = None::<Cow<str>>;
            let mut id = None::<Cow<str>>;
            for result in event.attributes() {
                let attribute = result?;
                let key = attribute.key.local_name();
                if key.as_ref() == b"name" {
                    name = Some(attribute_value(&attribute)?);
                } else if key.as_ref() == b"id" {
                    id = Some(attribute_value(&attribute)?);
                }
            }
            if let Some((name, id)) = name.zip(id) {
                // Chartsheets and macro sheets have no worksheet relationship
                if let Some(path) = relationships.get(id.as_ref()) {
                    sheets.push((name.to_string(), path.to_owned()));
                }
            }
        }
        Event::Start(event) if event.local_name().as_ref() == TAG_WORKBOOK_PROPERTIES.as_ref() => {
            let is_1904 = event.get_attribute_value("date1904")?
                .map(|value| value.eq("1") || value.eq_ignore_ascii_case("true"))
                .unwrap_or(false);
            if is_1904 {
                date_system = DateSystem::Excel1904;
            }
        }
    });
    Ok((sheets, date_system))
}

/// Cell kinds for numbers, indexed by `cellXfs` position.
fn load_number_formats(zip: &mut ZipArchive<UploadReader>) -> Result<Vec<CellType>, InsightSheetError> {
    let mut reader = match zip.xml_reader(PART_STYLES)? {
        Some(reader) => reader,
        None => return Ok(Vec::new()),
    };

    let mut custom_formats = HashMap::<String, CellType>::new();
    let mut custom_formats_context = false;
    let mut format_indexes = Vec::<String>::new();
    let mut format_indexes_context = false;

    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TAG_CUSTOM_FORMATS => custom_formats_context = true,
        Event::End(event) if event.name() == TAG_CUSTOM_FORMATS => custom_formats_context = false,
        Event::Start(event) if custom_formats_context && event.name() == TAG_CUSTOM_FORMAT => {
            let id = event.get_attribute_value("numFmtId")?;
            let format = event.get_attribute_value("formatCode")?;
            if let Some((id, format)) = id.zip(format) {
                custom_formats.insert(id.to_string(), CellType::from_custom_number_format(&format));
            }
        }
        Event::Start(event) if event.name() == TAG_FORMAT_INDEXES => format_indexes_context = true,
        Event::End(event) if event.name() == TAG_FORMAT_INDEXES => break,
        Event::Start(event) if format_indexes_context && event.name() == TAG_FORMAT_INDEX => {
            let id = event.get_attribute_value("numFmtId")?.map(|id| id.to_string());
            format_indexes.push(id.unwrap_or_else(|| "0".to_owned()));
        }
    });

    Ok(format_indexes
        .iter()
        .map(|id| {
            custom_formats
                .get(id)
                .copied()
                .or_else(|| CellType::from_builtin_number_format_id(id))
                .unwrap_or(CellType::Number)
        })
        .collect())
}

fn load_shared_strings(zip: &mut ZipArchive<UploadReader>) -> Result<Vec<String>, InsightSheetError> {
    let mut shared_strings = Vec::<String>::new();
    let mut reader = match zip.xml_reader(PART_SHARED_STRINGS)? {
        Some(reader) => reader,
        None => return Ok(shared_strings),
    };
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TAG_SHARED_STRING_ITEM => {
            let string = read_string_value(&mut reader, TAG_SHARED_STRING_ITEM, false)?;
            shared_strings.push(string);
        }
    });
    Ok(shared_strings)
}

/// Relationship targets are relative to `xl/` unless absolute.
fn to_zip_path(path: Cow<'_, str>) -> String {
    if let Some(absolute) = path.strip_prefix('/') {
        absolute.to_owned()
    } else if path.starts_with("xl/") {
        path.to_string()
    } else {
        format!("xl/{path}")
    }
}

/// Collects the text of a string element up to `end_tag`, skipping phonetic runs.
/// `is_text_content` is set for `<v>` whose character data is the value itself.
fn read_string_value(
    reader: &mut XmlReader<BufReader<ZipFile<'_, UploadReader>>>,
    end_tag: QName,
    is_text_content: bool,
) -> Result<String, InsightSheetError> {
    let mut is_phonetic_text = false;
    let mut is_text = is_text_content;
    let mut text = String::new();
    match_xml_events!(reader => {
        Event::End(event) if event.name() == end_tag => break,
        Event::Start(event) if event.name() == TAG_PHONETIC_TEXT => is_phonetic_text = true,
        Event::End(event) if event.name() == TAG_PHONETIC_TEXT => is_phonetic_text = false,
        Event::Start(event) if !is_phonetic_text && event.name() == TAG_TEXT => is_text = true,
        Event::End(event) if is_text && event.name() == TAG_TEXT => is_text = false,
        Event::Text(event) if is_text => text.push_bytes_text(&event)?,
        Event::CData(event) if is_text => text.push_str(&String::from_utf8_lossy(&event)),
        Event::GeneralRef(event) if is_text => text.push_bytes_ref(&event)?,
    });
    Ok(text)
}
