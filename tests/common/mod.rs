//! In-memory spreadsheet backend for integration tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use transferdesk::errors::{DomainError, Result};
use transferdesk::sheets::types::{Request, ValueInputMode};
use transferdesk::sheets::SheetsApi;

struct Tab {
    id: i64,
    title: String,
    grid: Vec<Vec<Value>>,
}

struct State {
    locale: String,
    next_id: i64,
    tabs: Vec<Tab>,
}

/// Stores tabs as dense grids and interprets the same A1 ranges and
/// structural requests the real client issues.
pub struct FakeSheets {
    state: Mutex<State>,
}

fn empty_cell() -> Value {
    Value::String(String::new())
}

fn cell_is_empty(v: &Value) -> bool {
    match v {
        Value::String(s) => s.is_empty(),
        Value::Null => true,
        _ => false,
    }
}

/// `(title, start_col, start_row, end_col, end_row)`; rows are 1-based and
/// optional (open-ended), columns 0-based.
fn parse_range(range: &str) -> (String, usize, Option<usize>, usize, Option<usize>) {
    let (title, cells) = if let Some(rest) = range.strip_prefix('\'') {
        let end = rest.find('\'').expect("unterminated sheet title quote");
        (rest[..end].to_string(), &rest[end + 2..])
    } else {
        let (t, c) = range.split_once('!').expect("range without sheet title");
        (t.to_string(), c)
    };

    let parse_ref = |r: &str| -> (usize, Option<usize>) {
        let letters: String = r.chars().take_while(|c| c.is_ascii_uppercase()).collect();
        let digits: String = r.chars().skip_while(|c| c.is_ascii_uppercase()).collect();
        let col = letters
            .chars()
            .fold(0usize, |acc, c| acc * 26 + (c as usize - 'A' as usize + 1))
            - 1;
        (col, digits.parse().ok())
    };

    let (a, b) = cells.split_once(':').unwrap_or((cells, cells));
    let (c1, r1) = parse_ref(a);
    let (c2, r2) = parse_ref(b);
    (title, c1, r1, c2, r2)
}

impl FakeSheets {
    /// A spreadsheet with an empty `Master` tab and locale `de_AT`.
    pub fn new() -> Arc<Self> {
        Self::with_locale("de_AT")
    }

    pub fn with_locale(locale: &str) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(State {
                locale: locale.to_string(),
                next_id: 1,
                tabs: vec![Tab {
                    id: 0,
                    title: "Master".to_string(),
                    grid: Vec::new(),
                }],
            }),
        })
    }

    pub fn grid(&self, title: &str) -> Vec<Vec<Value>> {
        let state = self.state.lock().unwrap();
        state
            .tabs
            .iter()
            .find(|t| t.title == title)
            .map(|t| t.grid.clone())
            .unwrap_or_default()
    }

    pub fn set_grid(&self, title: &str, grid: Vec<Vec<Value>>) {
        let mut state = self.state.lock().unwrap();
        if let Some(tab) = state.tabs.iter_mut().find(|t| t.title == title) {
            tab.grid = grid;
        }
    }

    pub fn sheet_titles(&self) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state.tabs.iter().map(|t| t.title.clone()).collect()
    }
}

#[async_trait]
impl SheetsApi for FakeSheets {
    async fn values_get(&self, range: &str) -> Result<Vec<Vec<Value>>> {
        let (title, c1, r1, c2, r2) = parse_range(range);
        let state = self.state.lock().unwrap();
        let Some(tab) = state.tabs.iter().find(|t| t.title == title) else {
            return Ok(Vec::new());
        };

        let start = r1.unwrap_or(1).saturating_sub(1);
        let end = r2.unwrap_or(tab.grid.len()).min(tab.grid.len());
        if start >= end {
            return Ok(Vec::new());
        }

        let mut out: Vec<Vec<Value>> = tab.grid[start..end]
            .iter()
            .map(|row| {
                let mut cells: Vec<Value> = (c1..=c2)
                    .map(|c| row.get(c).cloned().unwrap_or_else(empty_cell))
                    .collect();
                while cells.last().map(cell_is_empty).unwrap_or(false) {
                    cells.pop();
                }
                cells
            })
            .collect();
        while out.last().map(|r| r.is_empty()).unwrap_or(false) {
            out.pop();
        }
        Ok(out)
    }

    async fn values_update(
        &self,
        range: &str,
        rows: Vec<Vec<Value>>,
        _mode: ValueInputMode,
    ) -> Result<()> {
        let (title, c1, r1, _, _) = parse_range(range);
        let mut state = self.state.lock().unwrap();
        let tab = state
            .tabs
            .iter_mut()
            .find(|t| t.title == title)
            .ok_or_else(|| DomainError::NotFound(format!("sheet {} not found", title)))?;

        let start = r1.unwrap_or(1) - 1;
        for (i, cells) in rows.into_iter().enumerate() {
            while tab.grid.len() <= start + i {
                tab.grid.push(Vec::new());
            }
            let row = &mut tab.grid[start + i];
            for (j, cell) in cells.into_iter().enumerate() {
                while row.len() <= c1 + j {
                    row.push(empty_cell());
                }
                row[c1 + j] = cell;
            }
        }
        Ok(())
    }

    async fn values_append(&self, range: &str, rows: Vec<Vec<Value>>) -> Result<()> {
        let (title, c1, _, _, _) = parse_range(range);
        let mut state = self.state.lock().unwrap();
        let tab = state
            .tabs
            .iter_mut()
            .find(|t| t.title == title)
            .ok_or_else(|| DomainError::NotFound(format!("sheet {} not found", title)))?;

        while tab
            .grid
            .last()
            .map(|r| r.iter().all(cell_is_empty))
            .unwrap_or(false)
        {
            tab.grid.pop();
        }
        for cells in rows {
            let mut row = vec![empty_cell(); c1];
            row.extend(cells);
            tab.grid.push(row);
        }
        Ok(())
    }

    async fn batch_update(&self, requests: Vec<Request>) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        for req in requests {
            if let Some(add) = req.add_sheet {
                let id = state.next_id;
                state.next_id += 1;
                state.tabs.push(Tab {
                    id,
                    title: add.properties.title.unwrap_or_default(),
                    grid: Vec::new(),
                });
            } else if let Some(del) = req.delete_sheet {
                state.tabs.retain(|t| t.id != del.sheet_id);
            } else if let Some(ins) = req.insert_dimension {
                let tab = state
                    .tabs
                    .iter_mut()
                    .find(|t| t.id == ins.range.sheet_id)
                    .ok_or_else(|| DomainError::NotFound("sheet id not found".into()))?;
                let at = ins.range.start_index as usize;
                let count = (ins.range.end_index - ins.range.start_index) as usize;
                match ins.range.dimension.as_str() {
                    "ROWS" => {
                        for _ in 0..count {
                            if at <= tab.grid.len() {
                                tab.grid.insert(at, Vec::new());
                            }
                        }
                    }
                    "COLUMNS" => {
                        for row in &mut tab.grid {
                            for _ in 0..count {
                                while row.len() < at {
                                    row.push(empty_cell());
                                }
                                row.insert(at, empty_cell());
                            }
                        }
                    }
                    other => {
                        return Err(DomainError::InvalidInput(format!(
                            "dimension {}",
                            other
                        )))
                    }
                }
            } else if let Some(sort) = req.sort_range {
                let tab = state
                    .tabs
                    .iter_mut()
                    .find(|t| t.id == sort.range.sheet_id)
                    .ok_or_else(|| DomainError::NotFound("sheet id not found".into()))?;
                let start = sort.range.start_row_index.unwrap_or(0) as usize;
                let end = (sort.range.end_row_index.unwrap_or(tab.grid.len() as i64) as usize)
                    .min(tab.grid.len());
                if start < end {
                    let mut section: Vec<Vec<Value>> = tab.grid[start..end].to_vec();
                    section.sort_by(|a, b| {
                        for spec in &sort.sort_specs {
                            let i = spec.dimension_index as usize;
                            let av = a.get(i).map(|v| v.to_string()).unwrap_or_default();
                            let bv = b.get(i).map(|v| v.to_string()).unwrap_or_default();
                            let ord = av.cmp(&bv);
                            if ord != std::cmp::Ordering::Equal {
                                return ord;
                            }
                        }
                        std::cmp::Ordering::Equal
                    });
                    tab.grid.splice(start..end, section);
                }
            }
            // Formatting requests (repeatCell, borders, properties) carry no
            // observable value content; ignored here.
        }
        Ok(())
    }

    async fn sheet_id(&self, title: &str) -> Result<Option<i64>> {
        let state = self.state.lock().unwrap();
        Ok(state.tabs.iter().find(|t| t.title == title).map(|t| t.id))
    }

    async fn locale(&self) -> Result<String> {
        Ok(self.state.lock().unwrap().locale.clone())
    }

    async fn invalidate_metadata(&self) {}
}
