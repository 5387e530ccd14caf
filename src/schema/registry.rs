use crate::error::InsightSheetError;
use crate::error::ResultMessage;
use crate::schema::column::normalize_header;
use crate::schema::ColumnSchema;
use crate::schema::SchemaError;
use serde::Deserialize;
use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;

const DEFAULT_SCHEMA: &str = include_str!("default_schema.toml");

fn default_required() -> bool {
    true
}

/// Expected layout of one worksheet.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SheetSchema {
    /// Identifier the dashboard uses for the normalized table
    pub key: String,
    /// Exact worksheet name in the workbook
    pub name: String,
    #[serde(default = "default_required")]
    pub required: bool,
    pub columns: Vec<ColumnSchema>,
}

impl SheetSchema {
    pub fn new(key: &str, name: &str, columns: Vec<ColumnSchema>) -> Self {
        Self {
            key: key.to_owned(),
            name: name.to_owned(),
            required: true,
            columns,
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn column(&self, name: &str) -> Option<&ColumnSchema> {
        self.columns.iter().find(|column| column.name == name)
    }

    /// Index of the schema column a header cell names, if any.
    pub fn match_header(&self, header: &str) -> Option<usize> {
        self.columns.iter().position(|column| column.matches(header))
    }

    fn validate(&self) -> Result<(), SchemaError> {
        if self.columns.is_empty() {
            return Err(SchemaError::NoColumns(self.name.to_owned()));
        }
        let mut spellings = HashSet::new();
        for column in &self.columns {
            for spelling in column.spellings().map(normalize_header).collect::<HashSet<_>>() {
                if !spellings.insert(spelling) {
                    return Err(SchemaError::DuplicateColumn {
                        sheet: self.name.to_owned(),
                        column: column.name.to_owned(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Every sheet the pipeline knows about, in dashboard order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SchemaRegistry {
    sheets: Vec<SheetSchema>,
}

impl SchemaRegistry {
    pub fn new(sheets: Vec<SheetSchema>) -> Result<Self, InsightSheetError> {
        let registry = Self { sheets };
        registry.validate()?;
        Ok(registry)
    }

    pub fn from_toml_str(source: &str) -> Result<Self, InsightSheetError> {
        let registry: SchemaRegistry = toml::from_str(source)?;
        registry.validate()?;
        Ok(registry)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, InsightSheetError> {
        let path = path.as_ref();
        let prefix = path.display().to_string();
        std::fs::read_to_string(path)
            .map_err(InsightSheetError::from)
            .and_then(|source| Self::from_toml_str(&source))
            .with_prefix(&prefix)
    }

    pub fn sheets(&self) -> &[SheetSchema] {
        &self.sheets
    }

    /// Sheet schema by dashboard key.
    pub fn sheet(&self, key: &str) -> Result<&SheetSchema, SchemaError> {
        self.sheets
            .iter()
            .find(|sheet| sheet.key == key)
            .ok_or_else(|| SchemaError::UnknownSheet(key.to_owned()))
    }

    /// Sheet schema by exact worksheet name.
    pub fn sheet_by_name(&self, name: &str) -> Option<&SheetSchema> {
        self.sheets.iter().find(|sheet| sheet.name == name)
    }

    fn validate(&self) -> Result<(), SchemaError> {
        let mut keys = HashSet::new();
        let mut names = HashSet::new();
        for sheet in &self.sheets {
            if !keys.insert(sheet.key.as_str()) {
                return Err(SchemaError::DuplicateSheet(sheet.key.to_owned()));
            }
            if !names.insert(sheet.name.as_str()) {
                return Err(SchemaError::DuplicateSheet(sheet.name.to_owned()));
            }
            sheet.validate()?;
        }
        Ok(())
    }
}

impl Default for SchemaRegistry {
    /// The six dashboard sheets.
    fn default() -> Self {
        Self::from_toml_str(DEFAULT_SCHEMA).expect("Bundled schema registry")
    }
}
