//! Load entries from an export dump.

use anyhow::{bail, Context, Result};
use std::path::Path;
use sync_client::SyncEngine;
use sync_store::ImportMode;

/// Run the import command. Returns the number of entries written.
pub fn run(engine: &SyncEngine, input: &Path, fill_missing: bool) -> Result<usize> {
    let json = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;

    let mode = if fill_missing {
        ImportMode::FillMissing
    } else {
        ImportMode::Overwrite
    };

    let Some(written) = engine.store().import(&json, mode) else {
        bail!("{} is not a valid export dump", input.display());
    };

    println!("Imported {} entries from {}", written, input.display());
    Ok(written)
}
