use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use super::row::parse_cell;
use super::{SheetError, Worksheet};

/// A worksheet held in memory. Every write is recorded.
#[derive(Debug, Default)]
pub struct MemoryWorksheet {
    cells: Mutex<Vec<Vec<Value>>>,
    writes: Mutex<Vec<String>>,
    fail_writes: bool,
}

impl MemoryWorksheet {
    pub fn new(cells: Vec<Vec<Value>>) -> Self {
        Self {
            cells: Mutex::new(cells),
            ..Self::default()
        }
    }

    /// Every `write_range` call fails with a 503 after being recorded.
    pub fn failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    pub async fn cells(&self) -> Vec<Vec<Value>> {
        self.cells.lock().await.clone()
    }

    /// Ranges written so far, in call order.
    pub async fn writes(&self) -> Vec<String> {
        self.writes.lock().await.clone()
    }
}

#[async_trait]
impl Worksheet for MemoryWorksheet {
    async fn read_values(&self) -> Result<Vec<Vec<Value>>, SheetError> {
        Ok(self.cells().await)
    }

    async fn write_range(&self, range: &str, values: Vec<Vec<Value>>) -> Result<(), SheetError> {
        self.writes.lock().await.push(range.to_string());
        if self.fail_writes {
            return Err(SheetError::Api {
                status: 503,
                message: "write rejected".to_string(),
            });
        }

        let start = range.split(':').next().unwrap_or(range);
        let (column, row) =
            parse_cell(start).ok_or_else(|| SheetError::InvalidRange(range.to_string()))?;

        let mut cells = self.cells.lock().await;
        for (r, line) in values.into_iter().enumerate() {
            if cells.len() <= row + r {
                cells.resize(row + r + 1, Vec::new());
            }
            let target = &mut cells[row + r];
            for (c, value) in line.into_iter().enumerate() {
                if target.len() <= column + c {
                    target.resize(column + c + 1, Value::from(""));
                }
                target[column + c] = value;
            }
        }
        Ok(())
    }
}
