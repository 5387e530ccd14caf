use crate::workbook::cell::DateSystem;
use crate::workbook::cell::RawCell;
use serde::Serialize;
use std::collections::HashMap;

/// One worksheet's populated cells, exactly as extracted from the container.
#[derive(Clone, Debug, Serialize)]
pub struct RawSheet {
    /// Sheet name as declared by the workbook
    pub(crate) name: String,
    /// Epoch for numeric date serials in this workbook
    pub(crate) date_system: DateSystem,
    /// Populated cells in row-major order
    pub(crate) cells: Vec<RawCell>,
    /// Position lookup into `cells`
    #[serde(skip)]
    indexes: HashMap<(usize, usize), usize>,
    /// Actual data range (determined from cell data)
    pub(crate) row_lower_bound: Option<usize>,
    pub(crate) row_upper_bound: Option<usize>,
    pub(crate) col_lower_bound: Option<usize>,
    pub(crate) col_upper_bound: Option<usize>,
}

impl RawSheet {
    pub(crate) fn new(name: &str, date_system: DateSystem) -> Self {
        Self {
            name: name.to_owned(),
            date_system,
            cells: Vec::new(),
            indexes: HashMap::new(),
            row_lower_bound: None,
            row_upper_bound: None,
            col_lower_bound: None,
            col_upper_bound: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn date_system(&self) -> DateSystem {
        self.date_system
    }

    pub fn cells(&self) -> &[RawCell] {
        &self.cells
    }

    /// Returns true if the sheet contains no cells.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Adds a cell; a later cell at an occupied position replaces the earlier one.
    pub(crate) fn push(&mut self, cell: RawCell) {
        self.update_bound(cell.row, cell.col);
        match self.indexes.get(&(cell.row, cell.col)) {
            Some(&index) => self.cells[index] = cell,
            None => {
                self.indexes.insert((cell.row, cell.col), self.cells.len());
                self.cells.push(cell);
            }
        }
    }

    fn update_bound(&mut self, row: usize, col: usize) {
        if self.row_lower_bound.map(|lower| row < lower).unwrap_or(true) {
            self.row_lower_bound = Some(row);
        }
        if self.row_upper_bound.map(|upper| upper < row).unwrap_or(true) {
            self.row_upper_bound = Some(row);
        }
        if self.col_lower_bound.map(|lower| col < lower).unwrap_or(true) {
            self.col_lower_bound = Some(col);
        }
        if self.col_upper_bound.map(|upper| upper < col).unwrap_or(true) {
            self.col_upper_bound = Some(col);
        }
    }

    /// Cell at (row, column), if populated.
    pub fn get(&self, row: usize, col: usize) -> Option<&RawCell> {
        self.indexes
            .get(&(row, col))
            .and_then(|index| self.cells.get(*index))
    }

    /// Index of the header row: the first populated row.
    pub fn header_row(&self) -> Option<usize> {
        self.row_lower_bound
    }

    /// Non-blank header cells as (column index, trimmed text), left to right.
    pub fn header(&self) -> Vec<(usize, String)> {
        let (Some(row), Some(col_lower), Some(col_upper)) =
            (self.row_lower_bound, self.col_lower_bound, self.col_upper_bound)
        else {
            return Vec::new();
        };
        (col_lower..=col_upper)
            .filter_map(|col| self.get(row, col))
            .map(|cell| (cell.col, cell.to_text(self.date_system).trim().to_owned()))
            .filter(|(_, title)| !title.is_empty())
            .collect()
    }

    /// Row indexes below the header, including rows with no populated cell.
    pub fn data_rows(&self) -> std::ops::Range<usize> {
        match (self.row_lower_bound, self.row_upper_bound) {
            (Some(lower), Some(upper)) => (lower + 1)..(upper + 1),
            _ => 0..0,
        }
    }

    /// Cells of one row for the given columns, `None` where blank.
    pub fn row(&self, row: usize, cols: &[usize]) -> Vec<Option<&RawCell>> {
        cols.iter().map(|col| self.get(row, *col)).collect()
    }
}
