//! # hemomap-store
//!
//! Row storage for donor records.
//!
//! The backing "sheet" honors a deliberately small contract: whole-sheet
//! listing plus positional append/replace/delete. No transactions and no
//! secondary indexes; a caller that needs read-modify-write atomicity must
//! serialize itself (the submit pipeline holds a per-username lock around
//! its lookup/apply sequence).

use std::future::Future;

pub mod memory;
pub mod schema;
pub mod sheet;

mod error;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sheet::SheetStore;

/// One sheet row: positional string cells aligned to the schema header.
pub type Row = Vec<String>;

/// Positional row storage. Indices refer to data rows (header excluded) as
/// of the most recent listing; there is no stable row identifier beyond
/// that.
pub trait RowStore {
    fn list_rows(&self) -> impl Future<Output = Result<Vec<Row>>> + Send;
    fn append_row(&self, row: Row) -> impl Future<Output = Result<()>> + Send;
    fn replace_row(&self, index: usize, row: Row) -> impl Future<Output = Result<()>> + Send;
    fn delete_row(&self, index: usize) -> impl Future<Output = Result<()>> + Send;
}
