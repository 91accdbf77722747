use std::io;

use thiserror::Error;

use crate::common::PageId;
use crate::concurrency::TransactionId;

#[derive(Debug, Error)]
pub enum DbError {
    /// The lock on `page_id` was not granted before the deadline. The
    /// transaction must be ended with an abort.
    #[error("Transaction {tid} aborted while waiting for a lock on page {page_id}")]
    TransactionAborted { tid: TransactionId, page_id: PageId },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Page cache is full: all {capacity} cached pages are dirty")]
    CapacityExceeded { capacity: usize },

    #[error("Lock protocol violation: {0}")]
    Protocol(String),

    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Unknown table: {0}")]
    UnknownTable(String),

    #[error("Table already exists: {0}")]
    TableExists(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("No more tuples")]
    NoSuchElement,

    #[error("Iterator has not been opened")]
    NotOpen,
}

impl DbError {
    pub fn is_abort(&self) -> bool {
        matches!(self, DbError::TransactionAborted { .. })
    }
}

pub type Result<T> = std::result::Result<T, DbError>;
