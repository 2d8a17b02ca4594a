//! In-memory store, used by pipeline and schema tests.

use tokio::sync::RwLock;

use crate::error::{Result, StoreError};
use crate::{Row, RowStore};

#[derive(Default)]
pub struct MemoryStore {
    rows: RwLock<Vec<Row>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(rows: Vec<Row>) -> Self {
        Self {
            rows: RwLock::new(rows),
        }
    }
}

impl RowStore for MemoryStore {
    async fn list_rows(&self) -> Result<Vec<Row>> {
        Ok(self.rows.read().await.clone())
    }

    async fn append_row(&self, row: Row) -> Result<()> {
        self.rows.write().await.push(row);
        Ok(())
    }

    async fn replace_row(&self, index: usize, row: Row) -> Result<()> {
        let mut rows = self.rows.write().await;
        let slot = rows
            .get_mut(index)
            .ok_or(StoreError::RowOutOfRange(index))?;
        *slot = row;
        Ok(())
    }

    async fn delete_row(&self, index: usize) -> Result<()> {
        let mut rows = self.rows.write().await;
        if index >= rows.len() {
            return Err(StoreError::RowOutOfRange(index));
        }
        rows.remove(index);
        Ok(())
    }
}
