//! Init command implementation.

use distsync_core::catalog;
use distsync_storage::FileStore;
use std::path::Path;
use tracing::info;

/// Runs the init command.
///
/// Creates an empty store with the catalog's tables. An existing file is
/// left untouched.
pub fn run(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    if path.exists() {
        println!("Store already exists at {}", path.display());
        return Ok(());
    }
    FileStore::create(path, catalog::TABLES)?;
    info!(path = %path.display(), "created store");
    println!("Created empty store at {}", path.display());
    Ok(())
}
