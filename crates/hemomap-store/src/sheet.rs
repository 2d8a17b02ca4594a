//! CSV-file sheet store.
//!
//! One file, header row first, one data row per donor. Reads and writes go
//! through `tokio::fs` with the CSV codec applied to in-memory buffers, and
//! every mutation rewrites the whole file; an internal mutex keeps
//! concurrent read-modify-write cycles from interleaving. That matches the
//! contract in the crate docs: the store serializes its own writes, nothing
//! more.

use std::path::PathBuf;

use tokio::fs;
use tokio::sync::Mutex;
use tracing::info;

use crate::error::{Result, StoreError};
use crate::{schema, Row, RowStore};

pub struct SheetStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl SheetStore {
    /// Open the sheet at `path`, creating a header-only file when missing.
    /// An existing file whose header does not match schema v1 is rejected.
    pub async fn open(path: PathBuf) -> Result<Self> {
        if fs::try_exists(&path).await? {
            let (header, rows) = read_sheet(&path).await?;
            schema::check_header(&header)?;
            info!(path = %path.display(), rows = rows.len(), "Opened donor sheet");
        } else {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent).await?;
                }
            }
            write_sheet(&path, &[]).await?;
            info!(path = %path.display(), "Created empty donor sheet");
        }

        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }
}

impl RowStore for SheetStore {
    async fn list_rows(&self) -> Result<Vec<Row>> {
        let (_, rows) = read_sheet(&self.path).await?;
        Ok(rows)
    }

    async fn append_row(&self, row: Row) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let (_, mut rows) = read_sheet(&self.path).await?;
        rows.push(row);
        write_sheet(&self.path, &rows).await
    }

    async fn replace_row(&self, index: usize, row: Row) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let (_, mut rows) = read_sheet(&self.path).await?;
        let slot = rows
            .get_mut(index)
            .ok_or(StoreError::RowOutOfRange(index))?;
        *slot = row;
        write_sheet(&self.path, &rows).await
    }

    async fn delete_row(&self, index: usize) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let (_, mut rows) = read_sheet(&self.path).await?;
        if index >= rows.len() {
            return Err(StoreError::RowOutOfRange(index));
        }
        rows.remove(index);
        write_sheet(&self.path, &rows).await
    }
}

/// Read the whole file and split it into (header, data rows).
async fn read_sheet(path: &PathBuf) -> Result<(Row, Vec<Row>)> {
    let bytes = fs::read(path).await?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes.as_slice());

    let mut all = Vec::new();
    for result in reader.records() {
        let record = result?;
        all.push(record.iter().map(str::to_string).collect::<Row>());
    }

    if all.is_empty() {
        return Err(StoreError::Schema("Sheet file has no header row".into()));
    }
    let header = all.remove(0);
    Ok((header, all))
}

/// Rewrite the whole file: schema header first, then `rows`.
async fn write_sheet(path: &PathBuf, rows: &[Row]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&schema::header())?;
    for row in rows {
        writer.write_record(row)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| StoreError::Schema(format!("CSV flush failed: {e}")))?;

    fs::write(path, bytes).await?;
    Ok(())
}
