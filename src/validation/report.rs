use serde::Serialize;
use std::fmt::Display;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// The sheet is not normalized
    Error,
    /// Recorded for the user, the sheet still normalizes
    Warning,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    MissingSheet,
    MissingColumn,
    TypeMismatch,
    CoercedValue,
    EmptySheet,
    DuplicateColumn,
    ToleratedValue,
    ErrorValue,
}

impl FindingKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::MissingSheet => "missing_sheet",
            Self::MissingColumn => "missing_column",
            Self::TypeMismatch => "type_mismatch",
            Self::CoercedValue => "coerced_value",
            Self::EmptySheet => "empty_sheet",
            Self::DuplicateColumn => "duplicate_column",
            Self::ToleratedValue => "tolerated_value",
            Self::ErrorValue => "error_value",
        }
    }
}

impl Display for FindingKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One problem found in an upload. Cell-level problems are grouped per
/// (sheet, column, kind) with a count and a few example references.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Finding {
    pub sheet: String,
    pub severity: Severity,
    pub kind: FindingKind,
    /// Canonical column name, for column-level findings
    pub column: Option<String>,
    pub message: String,
    /// Number of affected cells (1 for sheet and column findings)
    pub count: usize,
    /// A1-style references of the first affected cells
    pub examples: Vec<String>,
}

impl Finding {
    pub(crate) fn new(sheet: &str, severity: Severity, kind: FindingKind, message: String) -> Self {
        Self {
            sheet: sheet.to_owned(),
            severity,
            kind,
            column: None,
            message,
            count: 1,
            examples: Vec::new(),
        }
    }

    pub(crate) fn column(mut self, column: &str) -> Self {
        self.column = Some(column.to_owned());
        self
    }

    pub(crate) fn cells(mut self, count: usize, examples: Vec<String>) -> Self {
        self.count = count;
        self.examples = examples;
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl Display for Finding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let severity = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "[{}] {}: {}", severity, self.sheet, self.message)?;
        if !self.examples.is_empty() {
            write!(f, " ({})", self.examples.join(", "))?;
        }
        Ok(())
    }
}

/// Every finding for one upload, plus which expected sheets were present.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ValidationReport {
    findings: Vec<Finding>,
    sheets_found: Vec<String>,
    sheets_missing: Vec<String>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, finding: Finding) {
        self.findings.push(finding);
    }

    pub(crate) fn found(&mut self, sheet: &str) {
        self.sheets_found.push(sheet.to_owned());
    }

    pub(crate) fn missing(&mut self, sheet: &str) {
        self.sheets_missing.push(sheet.to_owned());
    }

    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    pub fn errors(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|finding| finding.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|finding| finding.severity == Severity::Warning)
    }

    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }

    pub fn sheet_has_errors(&self, sheet: &str) -> bool {
        self.errors().any(|finding| finding.sheet == sheet)
    }

    pub fn findings_for<'a>(&'a self, sheet: &'a str) -> impl Iterator<Item = &'a Finding> + 'a {
        self.findings.iter().filter(move |finding| finding.sheet == sheet)
    }

    /// Findings of one kind, across all sheets.
    pub fn findings_of(&self, kind: FindingKind) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(move |finding| finding.kind == kind)
    }

    /// Expected sheets present in the workbook, in registry order.
    pub fn sheets_found(&self) -> &[String] {
        &self.sheets_found
    }

    /// Expected sheets absent from the workbook, in registry order.
    pub fn sheets_missing(&self) -> &[String] {
        &self.sheets_missing
    }
}
