//! Inspect command implementation.

use super::{CliError, Format};
use distsync_codec::Value;
use distsync_core::{catalog, lift_all, KeyLookup};
use distsync_storage::{FileStore, StorageResult, StoreAdapter, STORE_FORMAT_VERSION};
use serde::Serialize;
use std::path::Path;

/// Store inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Store path.
    pub path: String,
    /// File size in bytes.
    pub file_size: u64,
    /// Store format version.
    pub format_version: u8,
    /// Per-table statistics, in table name order.
    pub tables: Vec<TableStats>,
}

/// Statistics for a single table.
#[derive(Debug, Serialize)]
pub struct TableStats {
    /// Table name.
    pub name: String,
    /// Number of records.
    pub records: usize,
    /// Natural keys, if requested and the table is a catalog type.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keys: Option<Vec<Value>>,
}

/// Runs the inspect command.
pub fn run(path: &Path, show_keys: bool, format: Format) -> Result<(), Box<dyn std::error::Error>> {
    let result = inspect(path, show_keys)?;

    // Output
    match format {
        Format::Json => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Format::Text => {
            print_text_output(&result);
        }
    }

    Ok(())
}

fn inspect(path: &Path, show_keys: bool) -> Result<InspectResult, Box<dyn std::error::Error>> {
    if !path.exists() {
        return Err(CliError::MissingStore {
            path: path.to_path_buf(),
        }
        .into());
    }
    let store = FileStore::open(path)?;

    let mut tables: Vec<TableStats> = store
        .tables()?
        .into_iter()
        .map(|name| -> StorageResult<TableStats> {
            let records = store.count(&name)?;
            Ok(TableStats {
                name,
                records,
                keys: None,
            })
        })
        .collect::<StorageResult<_>>()?;
    tables.sort_by(|a, b| a.name.cmp(&b.name));

    if show_keys {
        let schema = catalog::schema()?;
        let mut lookup = KeyLookup::new();
        // Parents first, so children can name them.
        for entity in schema.entities() {
            let records = lift_all(entity, store.fetch_all(entity.name())?, &mut lookup)?;
            if let Some(stats) = tables.iter_mut().find(|t| t.name == entity.name()) {
                stats.keys = Some(records.iter().map(|r| r.key.to_value()).collect());
            }
        }
    }

    Ok(InspectResult {
        path: path.display().to_string(),
        file_size: std::fs::metadata(path)?.len(),
        format_version: STORE_FORMAT_VERSION,
        tables,
    })
}

fn print_text_output(result: &InspectResult) {
    println!("distsync Store Inspection");
    println!("=========================");
    println!();
    println!("Path:    {}", result.path);
    println!("Size:    {}", format_size(result.file_size));
    println!("Format:  v{}", result.format_version);
    println!();
    println!("Tables:");
    for table in &result.tables {
        println!("  {:<16} {} records", table.name, table.records);
        if let Some(keys) = &table.keys {
            for key in keys {
                println!("    {key}");
            }
        }
    }
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} bytes", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
