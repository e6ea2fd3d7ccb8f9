use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::errors::ServiceError;

/// Cell grid as returned by the values endpoints, row-major
pub type Rows = Vec<Vec<String>>;

/// The value-range calls the spreadsheet store needs.
///
/// Ranges use A1 notation: `Orders`, `Orders!A5`, `Orders!A2:H`.
#[async_trait]
pub trait SheetsApi: Send + Sync {
    /// Reads a range; trailing empty rows and cells are omitted.
    async fn get_values(&self, range: &str) -> Result<Rows, ServiceError>;
    /// Writes `rows` starting at the top-left cell of `range`.
    async fn update_values(&self, range: &str, rows: Rows) -> Result<(), ServiceError>;
    /// Blanks every cell in `range`.
    async fn clear_values(&self, range: &str) -> Result<(), ServiceError>;
}

/// Parsed A1 range with zero-based coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct A1Range {
    pub sheet: String,
    pub start_col: usize,
    pub start_row: usize,
    /// Inclusive; `None` means unbounded
    pub end_col: Option<usize>,
    pub end_row: Option<usize>,
}

impl A1Range {
    pub fn parse(range: &str) -> Result<Self, ServiceError> {
        let (sheet, cells) = match range.split_once('!') {
            Some((sheet, cells)) => (sheet, Some(cells)),
            None => (range, None),
        };
        let sheet = sheet.trim_matches('\'').to_string();
        if sheet.is_empty() {
            return Err(ServiceError::InvalidOperation(format!(
                "Invalid range: {}",
                range
            )));
        }

        let Some(cells) = cells else {
            return Ok(Self {
                sheet,
                start_col: 0,
                start_row: 0,
                end_col: None,
                end_row: None,
            });
        };

        let (start, end) = match cells.split_once(':') {
            Some((start, end)) => (start, Some(end)),
            None => (cells, None),
        };
        let (start_col, start_row) = parse_cell(start)
            .ok_or_else(|| ServiceError::InvalidOperation(format!("Invalid range: {}", range)))?;
        let start_col = start_col.unwrap_or(0);
        let start_row = start_row.unwrap_or(0);

        let (end_col, end_row) = match end {
            Some(end) => parse_cell(end).ok_or_else(|| {
                ServiceError::InvalidOperation(format!("Invalid range: {}", range))
            })?,
            // A single cell
            None => (Some(start_col), Some(start_row)),
        };

        Ok(Self {
            sheet,
            start_col,
            start_row,
            end_col,
            end_row,
        })
    }
}

/// `B12` -> (Some(1), Some(11)); `H` -> (Some(7), None)
fn parse_cell(cell: &str) -> Option<(Option<usize>, Option<usize>)> {
    let letters: String = cell.chars().take_while(|c| c.is_ascii_alphabetic()).collect();
    let digits = &cell[letters.len()..];

    let col = if letters.is_empty() {
        None
    } else {
        let n = letters
            .to_ascii_uppercase()
            .bytes()
            .fold(0usize, |acc, b| acc * 26 + (b - b'A' + 1) as usize);
        Some(n - 1)
    };
    let row = if digits.is_empty() {
        None
    } else {
        let n: usize = digits.parse().ok()?;
        Some(n.checked_sub(1)?)
    };

    if col.is_none() && row.is_none() {
        return None;
    }
    Some((col, row))
}

/// In-process spreadsheet used by tests and local demos
#[derive(Debug, Default)]
pub struct MemorySheetsApi {
    sheets: Mutex<HashMap<String, Rows>>,
    reads: AtomicUsize,
}

impl MemorySheetsApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces a sheet's contents, header row included
    pub fn seed(&self, sheet: &str, rows: Rows) {
        self.lock().insert(sheet.to_string(), rows);
    }

    /// Raw grid of a sheet, for assertions
    pub fn snapshot(&self, sheet: &str) -> Rows {
        self.lock().get(sheet).cloned().unwrap_or_default()
    }

    /// Number of `get_values` calls served so far
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Rows>> {
        self.sheets
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn trim_grid(rows: &mut Rows) {
    for row in rows.iter_mut() {
        while row.last().is_some_and(|c| c.is_empty()) {
            row.pop();
        }
    }
    while rows.last().is_some_and(|r| r.is_empty()) {
        rows.pop();
    }
}

#[async_trait]
impl SheetsApi for MemorySheetsApi {
    async fn get_values(&self, range: &str) -> Result<Rows, ServiceError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let range = A1Range::parse(range)?;
        let sheets = self.lock();
        let grid = sheets.get(&range.sheet).cloned().unwrap_or_default();

        let mut out: Rows = grid
            .into_iter()
            .enumerate()
            .filter(|(r, _)| *r >= range.start_row && range.end_row.map_or(true, |e| *r <= e))
            .map(|(_, row)| {
                row.into_iter()
                    .enumerate()
                    .filter(|(c, _)| {
                        *c >= range.start_col && range.end_col.map_or(true, |e| *c <= e)
                    })
                    .map(|(_, v)| v)
                    .collect()
            })
            .collect();
        trim_grid(&mut out);
        Ok(out)
    }

    async fn update_values(&self, range: &str, rows: Rows) -> Result<(), ServiceError> {
        let range = A1Range::parse(range)?;
        let mut sheets = self.lock();
        let grid = sheets.entry(range.sheet.clone()).or_default();

        for (i, values) in rows.into_iter().enumerate() {
            let r = range.start_row + i;
            if grid.len() <= r {
                grid.resize(r + 1, Vec::new());
            }
            let row = &mut grid[r];
            for (j, value) in values.into_iter().enumerate() {
                let c = range.start_col + j;
                if row.len() <= c {
                    row.resize(c + 1, String::new());
                }
                row[c] = value;
            }
        }
        trim_grid(grid);
        Ok(())
    }

    async fn clear_values(&self, range: &str) -> Result<(), ServiceError> {
        let range = A1Range::parse(range)?;
        let mut sheets = self.lock();
        if let Some(grid) = sheets.get_mut(&range.sheet) {
            for (r, row) in grid.iter_mut().enumerate() {
                if r < range.start_row || range.end_row.is_some_and(|e| r > e) {
                    continue;
                }
                for (c, cell) in row.iter_mut().enumerate() {
                    if c >= range.start_col && range.end_col.map_or(true, |e| c <= e) {
                        cell.clear();
                    }
                }
            }
            trim_grid(grid);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn parses_a1_ranges() {
        let whole = A1Range::parse("Orders").unwrap();
        assert_eq!((whole.start_row, whole.end_row), (0, None));

        let cell = A1Range::parse("Orders!A5").unwrap();
        assert_eq!((cell.start_col, cell.start_row), (0, 4));
        assert_eq!((cell.end_col, cell.end_row), (Some(0), Some(4)));

        let open = A1Range::parse("Orders!A2:H").unwrap();
        assert_eq!((open.start_row, open.end_col, open.end_row), (1, Some(7), None));

        let wide = A1Range::parse("'Shops'!AA1:AB3").unwrap();
        assert_eq!(wide.sheet, "Shops");
        assert_eq!((wide.start_col, wide.end_col), (26, Some(27)));

        assert!(A1Range::parse("Orders!").is_err());
        assert!(A1Range::parse("!A1").is_err());
    }

    #[tokio::test]
    async fn update_then_read_back() {
        let api = MemorySheetsApi::new();
        api.update_values("Shops!A1", vec![row(&["Name"])]).await.unwrap();
        api.update_values("Shops!A3", vec![row(&["Bakehouse"])])
            .await
            .unwrap();

        let rows = api.get_values("Shops").await.unwrap();
        assert_eq!(rows, vec![row(&["Name"]), vec![], row(&["Bakehouse"])]);
        assert_eq!(api.read_count(), 1);
    }

    #[tokio::test]
    async fn clear_blanks_cells_and_trims() {
        let api = MemorySheetsApi::new();
        api.seed(
            "Orders",
            vec![row(&["Variety ID", "Shop ID"]), row(&["1", "2"]), row(&["3", "4"])],
        );

        api.clear_values("Orders!A3:B3").await.unwrap();
        assert_eq!(api.snapshot("Orders").len(), 2);

        api.clear_values("Orders!A2:H").await.unwrap();
        assert_eq!(
            api.get_values("Orders").await.unwrap(),
            vec![row(&["Variety ID", "Shop ID"])]
        );
    }
}
