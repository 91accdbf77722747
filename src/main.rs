use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Error, Result};
use clap::{Parser, Subcommand};
use heapdb::buffer::page_cache::PageCache;
use heapdb::catalog::Catalog;
use heapdb::common::{DEFAULT_LOCK_TIMEOUT, DEFAULT_PAGE_SIZE, DEFAULT_POOL_SIZE};
use heapdb::concurrency::Transaction;
use heapdb::config::Config;
use heapdb::executors::aggregate_executor::{AggregateExecutor, AggregateOp};
use heapdb::executors::delete_executor::DeleteExecutor;
use heapdb::executors::filter_executor::{FilterExecutor, Predicate};
use heapdb::executors::insert_executor::InsertExecutor;
use heapdb::executors::seq_scan_executor::SeqScanExecutor;
use heapdb::executors::values_executor::ValuesExecutor;
use heapdb::executors::{collect, Executor};
use heapdb::tuple::value::Value;
use heapdb::tuple::Tuple;
use tracing::Level;

#[derive(Parser)]
#[command(version, about = "Query heap tables stored in a data directory")]
struct CliConfig {
    #[arg(long, help = "Directory where table files are stored")]
    data: PathBuf,

    #[arg(long, help = "Schema file describing the tables, one per line")]
    schema: PathBuf,

    #[arg(long, default_value_t = DEFAULT_POOL_SIZE, help = "Number of pages the page cache holds")]
    pool_size: usize,

    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE, help = "Page size in bytes, must match existing files")]
    page_size: usize,

    #[arg(long, default_value_t = DEFAULT_LOCK_TIMEOUT.as_millis() as u64, help = "How long to wait for a page lock")]
    lock_timeout_ms: u64,

    #[arg(short, long, action = clap::ArgAction::Count, help = "Log more, repeat for even more")]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List all tables
    Tables,
    /// Show the columns of a table
    Columns { table: String },
    /// Print the rows of a table
    Scan {
        table: String,
        #[arg(long, help = "Only rows matching 'column op value'")]
        filter: Option<String>,
    },
    /// Insert one row, one value per column
    Insert { table: String, values: Vec<String> },
    /// Delete the rows matching a filter
    Delete {
        table: String,
        #[arg(long, help = "Rows matching 'column op value'")]
        filter: String,
    },
    /// Compute min, max, sum, avg or count over a column
    Aggregate {
        table: String,
        op: String,
        column: String,
        #[arg(long)]
        group_by: Option<String>,
    },
}

impl CliConfig {
    fn db_config(&self) -> Config {
        Config::default()
            .with_pool_size(self.pool_size)
            .with_page_size(self.page_size)
            .with_lock_timeout(Duration::from_millis(self.lock_timeout_ms))
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

fn column_index(executor: &dyn Executor, column: &str) -> Result<usize> {
    executor
        .schema()
        .column_index(column)
        .ok_or_else(|| Error::msg(format!("Unknown column {column}")))
}

fn scan<'a>(
    txn: &Transaction<'a>,
    catalog: &Catalog,
    table: &str,
    filter: Option<&str>,
) -> Result<Box<dyn Executor + 'a>> {
    let table_id = catalog.table_id(table)?;
    let scan = SeqScanExecutor::new(txn.cache(), txn.tid(), table_id)?;
    match filter {
        Some(filter) => {
            let predicate = Predicate::parse(scan.schema(), filter)
                .with_context(|| format!("Invalid filter '{filter}'"))?;
            Ok(Box::new(FilterExecutor::new(predicate, Box::new(scan))?))
        }
        None => Ok(Box::new(scan)),
    }
}

fn run(command: &Command, txn: &Transaction, catalog: &Catalog) -> Result<Vec<Tuple>> {
    let tuples = match command {
        Command::Tables => catalog
            .list_tables()
            .into_iter()
            .map(|name| Tuple::new(vec![Value::String(name)]))
            .collect(),
        Command::Columns { table } => {
            let schema = catalog.get_schema(catalog.table_id(table)?)?;
            schema
                .columns()
                .iter()
                .map(|column| {
                    Tuple::new(vec![
                        Value::String(column.column_name().to_owned()),
                        Value::String(column.type_id().to_string()),
                    ])
                })
                .collect()
        }
        Command::Scan { table, filter } => {
            collect(scan(txn, catalog, table, filter.as_deref())?.as_mut())?
        }
        Command::Insert { table, values } => {
            let table_id = catalog.table_id(table)?;
            let schema = catalog.get_schema(table_id)?;
            if values.len() != schema.columns().len() {
                return Err(Error::msg(format!(
                    "Table {table} has {} columns, got {} values",
                    schema.columns().len(),
                    values.len()
                )));
            }
            let row = schema
                .columns()
                .iter()
                .zip(values)
                .map(|(column, value)| Value::parse(column.type_id(), value))
                .collect::<heapdb::error::Result<Vec<_>>>()?;
            let values = ValuesExecutor::new(schema, vec![Tuple::new(row)]);
            let mut insert =
                InsertExecutor::new(txn.cache(), txn.tid(), table_id, Box::new(values))?;
            collect(&mut insert)?
        }
        Command::Delete { table, filter } => {
            let child = scan(txn, catalog, table, Some(filter))?;
            let mut delete = DeleteExecutor::new(txn.cache(), txn.tid(), child);
            collect(&mut delete)?
        }
        Command::Aggregate {
            table,
            op,
            column,
            group_by,
        } => {
            let child = scan(txn, catalog, table, None)?;
            let agg_column = column_index(child.as_ref(), column)?;
            let group_by = match group_by {
                Some(group_by) => Some(column_index(child.as_ref(), group_by)?),
                None => None,
            };
            let op = op.parse::<AggregateOp>()?;
            let mut aggregate = AggregateExecutor::new(child, agg_column, group_by, op)?;
            collect(&mut aggregate)?
        }
    };
    Ok(tuples)
}

fn main() -> Result<()> {
    let config = CliConfig::parse();
    init_logging(config.verbose);
    let db_config = config.db_config();

    let catalog = Arc::new(
        Catalog::new(&config.data, db_config.page_size)
            .with_context(|| format!("Failed to open data directory {}", config.data.display()))?,
    );
    catalog
        .load_schema(&config.schema)
        .with_context(|| format!("Failed to load schema {}", config.schema.display()))?;
    let cache = PageCache::new(Arc::clone(&catalog), &db_config)
        .context("Failed to create page cache")?;

    let txn = Transaction::begin(&cache);
    let tuples = match run(&config.command, &txn, &catalog) {
        Ok(tuples) => {
            txn.commit().context("Failed to commit")?;
            tuples
        }
        Err(e) => {
            txn.abort().context("Failed to abort")?;
            return Err(e);
        }
    };

    let mut writer = BufWriter::new(std::io::stdout().lock());
    for tuple in tuples {
        writeln!(writer, "{tuple}")?;
    }
    writer.flush()?;

    Ok(())
}
