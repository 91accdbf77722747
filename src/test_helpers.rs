use std::sync::Arc;

use tempfile::{tempdir, TempDir};

use crate::buffer::page_cache::PageCache;
use crate::catalog::Catalog;
use crate::common::TableId;
use crate::concurrency::TransactionId;
use crate::config::Config;
use crate::error::Result;
use crate::storage::PageStore;
use crate::tuple::schema::{ColumnDefinition, Schema, TypeId};
use crate::tuple::Tuple;

/// A catalog and page cache working on a temporary data directory.
pub struct TestDb {
    pub cache: PageCache,
    pub catalog: Arc<Catalog>,
    // dropped last, removes the directory
    _data_dir: TempDir,
}

impl TestDb {
    pub fn new(pool_size: usize) -> Result<Self> {
        Self::with_config(Config::default().with_pool_size(pool_size))
    }

    pub fn with_page_size(pool_size: usize, page_size: usize) -> Result<Self> {
        Self::with_config(
            Config::default()
                .with_pool_size(pool_size)
                .with_page_size(page_size),
        )
    }

    pub fn with_config(config: Config) -> Result<Self> {
        let data_dir = tempdir()?;
        let catalog = Arc::new(Catalog::new(data_dir.path(), config.page_size)?);
        let cache = PageCache::new(Arc::clone(&catalog), &config)?;
        Ok(Self {
            cache,
            catalog,
            _data_dir: data_dir,
        })
    }

    /// Creates a table of `columns` integer columns named `c0`, `c1`, ...
    pub fn create_int_table(&self, name: &str, columns: usize) -> Result<TableId> {
        let schema = Schema::new(
            (0..columns)
                .map(|i| ColumnDefinition::new(TypeId::Integer, format!("c{i}")))
                .collect(),
        );
        self.catalog.add_table(name, schema)
    }

    /// Creates a two column integer table with `pages` empty pages.
    pub fn create_table_with_pages(&self, name: &str, pages: usize) -> Result<TableId> {
        let table_id = self.create_int_table(name, 2)?;
        let store = self.catalog.get_store(table_id)?;
        let PageStore::Heap(heap) = store.as_ref();
        for _ in 0..pages {
            heap.append_empty_page()?;
        }
        Ok(table_id)
    }

    /// Inserts `rows` in a transaction of their own and commits it.
    pub fn insert_rows(&self, table_id: TableId, rows: &[Tuple]) -> Result<()> {
        let tid = TransactionId::new();
        for row in rows {
            self.cache.apply_insert(tid, table_id, &mut row.clone())?;
        }
        self.cache.end_transaction(tid, true)
    }

    /// All rows of the table, read in a transaction of their own.
    pub fn scan(&self, table_id: TableId) -> Result<Vec<Tuple>> {
        let tid = TransactionId::new();
        let rows = self.scan_with(tid, table_id);
        self.cache.end_transaction(tid, true)?;
        rows
    }

    pub fn scan_with(&self, tid: TransactionId, table_id: TableId) -> Result<Vec<Tuple>> {
        self.catalog
            .get_store(table_id)?
            .iter(&self.cache, tid)
            .collect()
    }
}
