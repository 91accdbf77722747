use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::info;

use crate::common::{TableId, USER_DATA_TABLE_ID_START};
use crate::error::{DbError, Result};
use crate::storage::file_manager::PageFile;
use crate::storage::heap::table::HeapFile;
use crate::storage::PageStore;
use crate::tuple::schema::{ColumnDefinition, Schema, TypeId};

const TABLE_FILE_EXTENSION: &str = "dat";

/// Catalog keeps track of the tables of one data directory.
/// Every table is stored in its own file `<data_directory>/<name>.dat`.
pub struct Catalog {
    data_directory: PathBuf,
    page_size: usize,
    next_table_id: AtomicU16,
    table_name_to_id: DashMap<String, TableId>,
    table_id_to_store: DashMap<TableId, Arc<PageStore>>,
}

impl Catalog {
    pub fn new(data_directory: impl Into<PathBuf>, page_size: usize) -> Result<Self> {
        let data_directory = data_directory.into();
        if !data_directory.is_dir() {
            return Err(DbError::Storage(format!(
                "Could not create catalog. {} is not a directory",
                data_directory.display()
            )));
        }

        Ok(Self {
            data_directory,
            page_size,
            next_table_id: AtomicU16::new(USER_DATA_TABLE_ID_START),
            table_name_to_id: DashMap::new(),
            table_id_to_store: DashMap::new(),
        })
    }

    pub fn data_directory(&self) -> &Path {
        &self.data_directory
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Registers a table and opens its file, creating it if necessary.
    pub fn add_table(&self, name: &str, schema: Schema) -> Result<TableId> {
        match self.table_name_to_id.entry(name.to_owned()) {
            Entry::Occupied(_) => Err(DbError::TableExists(name.to_owned())),
            Entry::Vacant(entry) => {
                let path = self
                    .data_directory
                    .join(format!("{name}.{TABLE_FILE_EXTENSION}"));
                let file = PageFile::open(path, self.page_size)?;
                let table_id = self.next_table_id.fetch_add(1, Ordering::Relaxed);
                let heap = HeapFile::new(table_id, file, schema)?;
                info!(table = name, table_id, pages = heap.num_pages(), "registered table");

                self.table_id_to_store
                    .insert(table_id, Arc::new(PageStore::Heap(heap)));
                entry.insert(table_id);
                Ok(table_id)
            }
        }
    }

    pub fn get_table_id(&self, table_name: &str) -> Option<TableId> {
        self.table_name_to_id.get(table_name).map(|kv| *kv.value())
    }

    /// Looks up a table id by name, failing with `UnknownTable`.
    pub fn table_id(&self, table_name: &str) -> Result<TableId> {
        self.get_table_id(table_name)
            .ok_or_else(|| DbError::UnknownTable(table_name.to_owned()))
    }

    pub fn table_name(&self, table_id: TableId) -> Option<String> {
        self.table_name_to_id
            .iter()
            .find(|kv| *kv.value() == table_id)
            .map(|kv| kv.key().to_owned())
    }

    pub fn get_store(&self, table_id: TableId) -> Result<Arc<PageStore>> {
        self.table_id_to_store
            .get(&table_id)
            .map(|store| Arc::clone(store.value()))
            .ok_or_else(|| DbError::UnknownTable(format!("table with id {table_id}")))
    }

    pub fn get_schema(&self, table_id: TableId) -> Result<Schema> {
        Ok(self.get_store(table_id)?.schema().clone())
    }

    /// Names of all tables, sorted.
    pub fn list_tables(&self) -> Vec<String> {
        let mut tables = self
            .table_name_to_id
            .iter()
            .map(|kv| kv.key().to_owned())
            .collect::<Vec<_>>();
        tables.sort();
        tables
    }

    /// Adds every table described in a schema file and returns their ids.
    ///
    /// Each line describes one table as `name (column type, column type, ...)`
    /// where type is `int` or `string`. A trailing `pk` after a column type is
    /// accepted and ignored. Empty lines and lines starting with `#` are skipped.
    pub fn load_schema(&self, path: impl AsRef<Path>) -> Result<Vec<TableId>> {
        let content = fs::read_to_string(path.as_ref())?;
        let mut table_ids = Vec::new();
        for (line_no, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (name, schema) = parse_table_line(line).map_err(|e| {
                DbError::SchemaMismatch(format!(
                    "{}:{}: {e}",
                    path.as_ref().display(),
                    line_no + 1
                ))
            })?;
            table_ids.push(self.add_table(&name, schema)?);
        }
        Ok(table_ids)
    }
}

fn parse_table_line(line: &str) -> std::result::Result<(String, Schema), String> {
    let (name, rest) = line
        .split_once('(')
        .ok_or_else(|| "expected '(' after table name".to_owned())?;
    let name = name.trim();
    if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return Err(format!("invalid table name '{name}'"));
    }
    let columns = rest
        .trim_end()
        .strip_suffix(')')
        .ok_or_else(|| "expected ')' at end of line".to_owned())?;

    let columns = columns
        .split(',')
        .map(parse_column)
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok((name.to_owned(), Schema::new(columns)))
}

fn parse_column(column: &str) -> std::result::Result<ColumnDefinition, String> {
    let parts = column.split_whitespace().collect::<Vec<_>>();
    match parts.as_slice() {
        [name, type_id] | [name, type_id, "pk"] => {
            let type_id = type_id.parse::<TypeId>().map_err(|e| e.to_string())?;
            Ok(ColumnDefinition::new(type_id, *name))
        }
        _ => Err(format!("invalid column definition '{}'", column.trim())),
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use anyhow::Result;
    use tempfile::tempdir;

    use super::Catalog;
    use crate::common::DEFAULT_PAGE_SIZE;
    use crate::error::DbError;
    use crate::tuple::schema::{ColumnDefinition, Schema, TypeId};

    fn schema() -> Schema {
        Schema::new(vec![
            ColumnDefinition::new(TypeId::Integer, "id"),
            ColumnDefinition::new(TypeId::Text, "name"),
        ])
    }

    #[test]
    fn add_table_allocates_sequential_ids() -> Result<()> {
        let data_dir = tempdir()?;
        let catalog = Catalog::new(data_dir.path(), DEFAULT_PAGE_SIZE)?;

        let users = catalog.add_table("users", schema())?;
        let orders = catalog.add_table("orders", schema())?;
        assert_eq!((users, orders), (1, 2));
        assert!(data_dir.path().join("users.dat").is_file());

        assert_eq!(catalog.get_table_id("orders"), Some(orders));
        assert_eq!(catalog.table_name(users).as_deref(), Some("users"));
        assert_eq!(catalog.get_schema(users)?, schema());
        assert_eq!(catalog.list_tables(), vec!["orders", "users"]);
        assert_eq!(catalog.get_store(orders)?.table_id(), orders);
        Ok(())
    }

    #[test]
    fn duplicate_and_unknown_tables_fail() -> Result<()> {
        let data_dir = tempdir()?;
        let catalog = Catalog::new(data_dir.path(), DEFAULT_PAGE_SIZE)?;
        catalog.add_table("users", schema())?;

        assert!(matches!(
            catalog.add_table("users", schema()),
            Err(DbError::TableExists(_))
        ));
        assert!(matches!(catalog.get_store(7), Err(DbError::UnknownTable(_))));
        assert!(matches!(
            catalog.table_id("missing"),
            Err(DbError::UnknownTable(_))
        ));
        Ok(())
    }

    #[test]
    fn data_directory_must_exist() {
        assert!(Catalog::new("/definitely/not/here", DEFAULT_PAGE_SIZE).is_err());
    }

    #[test]
    fn load_schema_file() -> Result<()> {
        let data_dir = tempdir()?;
        let schema_file = data_dir.path().join("catalog.txt");
        fs::write(
            &schema_file,
            "# test tables\n\
             users (id int pk, name string)\n\
             \n\
             scores (user_id INT, score int)\n",
        )?;
        let catalog = Catalog::new(data_dir.path(), DEFAULT_PAGE_SIZE)?;

        let ids = catalog.load_schema(&schema_file)?;
        assert_eq!(ids.len(), 2);
        assert_eq!(catalog.get_schema(ids[0])?, schema());
        let scores = catalog.get_schema(catalog.table_id("scores")?)?;
        assert_eq!(scores.columns()[0].column_name(), "user_id");
        assert_eq!(scores.tuple_size(), 8);
        Ok(())
    }

    #[test]
    fn malformed_schema_lines_are_reported() -> Result<()> {
        let data_dir = tempdir()?;
        let catalog = Catalog::new(data_dir.path(), DEFAULT_PAGE_SIZE)?;
        for line in [
            "users id int",
            "users (id int",
            "users (id float)",
            "users (id)",
            "(id int)",
        ] {
            let schema_file = data_dir.path().join("bad.txt");
            fs::write(&schema_file, line)?;
            assert!(
                matches!(
                    catalog.load_schema(&schema_file),
                    Err(DbError::SchemaMismatch(_))
                ),
                "{line}"
            );
        }
        assert!(catalog.list_tables().is_empty());
        Ok(())
    }
}
