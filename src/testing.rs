//! In-memory workbook builders for tests.

use chrono::NaiveDate;
use quick_xml::escape::escape;
use std::io::Cursor;
use std::io::Write;
use zip::write::SimpleFileOptions;
use zip::CompressionMethod;
use zip::ZipWriter;

/// Builds a ZIP package from (path, contents) pairs, stored uncompressed.
pub(crate) fn zip_package(parts: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    for (name, contents) in parts {
        writer.start_file(*name, options).expect("start zip entry");
        writer.write_all(contents.as_bytes()).expect("write zip entry");
    }
    writer.finish().expect("finish zip").into_inner()
}

/// 1900-system serial for a calendar date.
pub(crate) fn serial(year: i32, month: u32, day: u32) -> f64 {
    let base = NaiveDate::from_ymd_opt(1899, 12, 30).unwrap();
    let date = NaiveDate::from_ymd_opt(year, month, day).unwrap();
    (date - base).num_days() as f64
}

/// One XLSX cell in a fixture row.
#[derive(Clone, Debug)]
pub(crate) enum C {
    /// Inline string
    S(&'static str),
    /// Shared string
    Shared(&'static str),
    /// Plain number
    N(f64),
    /// Number styled with built-in date format 14
    D(f64),
    /// Number styled with a custom date format code
    Custom(f64),
    B(bool),
    /// Error value such as `#N/A`
    E(&'static str),
    Blank,
}

/// XLSX package builder: every sheet is a list of rows starting at A1.
#[derive(Default)]
pub(crate) struct XlsxFixture {
    date_1904: bool,
    sheets: Vec<(String, Vec<Vec<C>>)>,
}

impl XlsxFixture {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn date_1904(mut self, date_1904: bool) -> Self {
        self.date_1904 = date_1904;
        self
    }

    pub(crate) fn sheet(mut self, name: &str, rows: Vec<Vec<C>>) -> Self {
        self.sheets.push((name.to_owned(), rows));
        self
    }

    pub(crate) fn build(&self) -> Vec<u8> {
        let mut shared_strings = Vec::<&str>::new();
        let mut worksheets = Vec::<String>::new();
        for (_, rows) in &self.sheets {
            let mut xml = String::from(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#);
            for (row, cells) in rows.iter().enumerate() {
                xml.push_str(&format!(r#"<row r="{}">"#, row + 1));
                for (col, cell) in cells.iter().enumerate() {
                    let reference = crate::workbook::reference::index_to_reference(row, col);
                    let cell = match cell {
                        C::S(text) => format!(r#"<c r="{reference}" t="inlineStr"><is><t>{}</t></is></c>"#, escape(*text)),
                        C::Shared(text) => {
                            shared_strings.push(*text);
                            format!(r#"<c r="{reference}" t="s"><v>{}</v></c>"#, shared_strings.len() - 1)
                        }
                        C::N(number) => format!(r#"<c r="{reference}"><v>{number}</v></c>"#),
                        C::D(number) => format!(r#"<c r="{reference}" s="1"><v>{number}</v></c>"#),
                        C::Custom(number) => format!(r#"<c r="{reference}" s="2"><v>{number}</v></c>"#),
                        C::B(flag) => format!(r#"<c r="{reference}" t="b"><v>{}</v></c>"#, u8::from(*flag)),
                        C::E(error) => format!(r#"<c r="{reference}" t="e"><v>{}</v></c>"#, escape(*error)),
                        C::Blank => format!(r#"<c r="{reference}" s="0"/>"#),
                    };
                    xml.push_str(&cell);
                }
                xml.push_str("</row>");
            }
            xml.push_str("</sheetData></worksheet>");
            worksheets.push(xml);
        }

        let mut sheet_entries = String::new();
        let mut relationships = String::new();
        let mut overrides = String::new();
        for (index, (name, _)) in self.sheets.iter().enumerate() {
            let number = index + 1;
            sheet_entries.push_str(&format!(r#"<sheet name="{}" sheetId="{number}" r:id="rId{number}"/>"#, escape(name.as_str())));
            relationships.push_str(&format!(r#"<Relationship Id="rId{number}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{number}.xml"/>"#));
            overrides.push_str(&format!(r#"<Override PartName="/xl/worksheets/sheet{number}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#));
        }
        relationships.push_str(r#"<Relationship Id="rIdStyles" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>"#);
        relationships.push_str(r#"<Relationship Id="rIdStrings" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings" Target="sharedStrings.xml"/>"#);

        let content_types = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>{overrides}</Types>"#
        );
        let root_relationships = r#"<?xml version="1.0" encoding="UTF-8"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;
        let workbook = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><workbookPr date1904="{}"/><sheets>{sheet_entries}</sheets></workbook>"#,
            u8::from(self.date_1904)
        );
        let workbook_relationships = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">{relationships}</Relationships>"#
        );
        let styles = r#"<?xml version="1.0" encoding="UTF-8"?><styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><numFmts count="1"><numFmt numFmtId="164" formatCode="dd/mm/yyyy"/></numFmts><cellXfs count="3"><xf numFmtId="0"/><xf numFmtId="14" applyNumberFormat="1"/><xf numFmtId="164" applyNumberFormat="1"/></cellXfs></styleSheet>"#;
        let strings = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="{0}" uniqueCount="{0}">{1}</sst>"#,
            shared_strings.len(),
            shared_strings
                .iter()
                .map(|text| format!("<si><t>{}</t><rPh sb=\"0\" eb=\"1\"><t>ignored</t></rPh></si>", escape(*text)))
                .collect::<String>()
        );

        let worksheet_paths = (1..=worksheets.len())
            .map(|number| format!("xl/worksheets/sheet{number}.xml"))
            .collect::<Vec<_>>();
        let mut parts: Vec<(&str, &str)> = vec![
            ("[Content_Types].xml", content_types.as_str()),
            ("_rels/.rels", root_relationships),
            ("xl/workbook.xml", workbook.as_str()),
            ("xl/_rels/workbook.xml.rels", workbook_relationships.as_str()),
            ("xl/styles.xml", styles),
            ("xl/sharedStrings.xml", strings.as_str()),
        ];
        for (path, xml) in worksheet_paths.iter().zip(&worksheets) {
            parts.push((path.as_str(), xml.as_str()));
        }
        zip_package(&parts)
    }
}

/// ODS package builder. `sheet` writes string cells, `raw_sheet` takes table rows as XML.
#[derive(Default)]
pub(crate) struct OdsFixture {
    encrypted: bool,
    tables: Vec<(String, String)>,
}

impl OdsFixture {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn encrypted(mut self, encrypted: bool) -> Self {
        self.encrypted = encrypted;
        self
    }

    pub(crate) fn sheet(self, name: &str, rows: Vec<Vec<&str>>) -> Self {
        let rows = rows
            .iter()
            .map(|cells| {
                let cells = cells
                    .iter()
                    .map(|text| format!(r#"<table:table-cell office:value-type="string"><text:p>{}</text:p></table:table-cell>"#, escape(*text)))
                    .collect::<String>();
                format!("<table:table-row>{cells}</table:table-row>")
            })
            .collect::<String>();
        self.raw_sheet(name, &rows)
    }

    pub(crate) fn raw_sheet(mut self, name: &str, rows: &str) -> Self {
        self.tables.push((name.to_owned(), rows.to_owned()));
        self
    }

    pub(crate) fn build(&self) -> Vec<u8> {
        let tables = self.tables
            .iter()
            .map(|(name, rows)| format!(r#"<table:table table:name="{}">{rows}</table:table>"#, escape(name.as_str())))
            .collect::<String>();
        let content = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><office:document-content xmlns:office="urn:oasis:names:tc:opendocument:xmlns:office:1.0" xmlns:table="urn:oasis:names:tc:opendocument:xmlns:table:1.0" xmlns:text="urn:oasis:names:tc:opendocument:xmlns:text:1.0" xmlns:calcext="urn:org:documentfoundation:names:experimental:calc:xmlns:calcext:1.0" office:version="1.3"><office:body><office:spreadsheet>{tables}</office:spreadsheet></office:body></office:document-content>"#
        );
        let encryption = if self.encrypted {
            r#"<manifest:encryption-data manifest:checksum-type="SHA1/1K"/>"#
        } else {
            ""
        };
        let manifest = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><manifest:manifest xmlns:manifest="urn:oasis:names:tc:opendocument:xmlns:manifest:1.0"><manifest:file-entry manifest:full-path="/" manifest:media-type="application/vnd.oasis.opendocument.spreadsheet"/><manifest:file-entry manifest:full-path="content.xml" manifest:media-type="text/xml">{encryption}</manifest:file-entry></manifest:manifest>"#
        );
        zip_package(&[
            ("mimetype", "application/vnd.oasis.opendocument.spreadsheet"),
            ("content.xml", content.as_str()),
            ("META-INF/manifest.xml", manifest.as_str()),
        ])
    }
}

/// A workbook with all six dashboard sheets populated with valid data.
pub(crate) fn marketing_workbook() -> XlsxFixture {
    let mut ppc = vec![vec![C::S("YearMonth"), C::S("Domain"), C::S("Mobile Spend"), C::S("Desktop Spend")]];
    for month in 0..14u32 {
        let (year, month) = (2023 + (month / 12) as i32, month % 12 + 1);
        ppc.push(vec![
            C::D(serial(year, month, 1)),
            C::S("acme.com"),
            C::N(1000.0 + 10.0 * f64::from(month)),
            C::N(500.0),
        ]);
    }

    XlsxFixture::new()
        .sheet("Similarweb Lead Enrichment", vec![
            vec![C::S("Domain"), C::S("Monthly Visits"), C::S("YoY Growth %")],
            vec![C::S("acme.com"), C::N(120000.0), C::N(0.15)],
            vec![C::S("globex.com"), C::N(80000.0), C::S("-5%")],
            vec![C::S("initech.com"), C::N(250000.0), C::N(0.3)],
        ])
        .sheet("Similarweb PPC Spend", ppc)
        .sheet("Low Hanging Fruit", vec![
            vec![C::S("Tactics"), C::S("Focus (Funnel Stage)"), C::S("Total Effort"), C::S("Projected Cost"), C::S("Expected Lift %")],
            vec![C::S("SEO Audit"), C::S("Awareness"), C::N(3.0), C::N(5000.0), C::S("12%")],
            vec![C::S("Paid Refresh"), C::S("Conversion"), C::Blank, C::N(2000.0), C::S("5%")],
            vec![C::S("CRO Testing"), C::S("Consideration"), C::N(4.0), C::S("$1,200"), C::N(0.2)],
        ])
        .sheet("IE Matrix", vec![
            vec![C::S("Marketing Tactic"), C::S("Impact"), C::S("Effort")],
            vec![C::S("SEO Audit"), C::N(8.0), C::N(3.0)],
            vec![C::S("cro testing"), C::N(9.0), C::N(4.0)],
            vec![C::S("Email Nurture"), C::N(6.0), C::N(2.0)],
        ])
        .sheet("Core Web Vitals", vec![
            vec![C::S("URL"), C::S("LCP (s)"), C::S("CLS")],
            vec![C::S("https://www.acme.com"), C::S("2.3s"), C::N(0.05)],
            vec![C::S("http://globex.com/home"), C::N(3.1), C::N(0.12)],
        ])
        .sheet("Keyword Reports", vec![
            vec![C::S("Keyword"), C::S("Search Volume"), C::S("Clicks"), C::S("Position")],
            vec![C::S("crm software"), C::N(12000.0), C::N(800.0), C::N(3.0)],
            vec![C::S("sales crm"), C::S("5,400"), C::N(300.0), C::N(5.0)],
            vec![C::S("free crm"), C::N(22000.0), C::N(1500.0), C::N(2.0)],
        ])
}
