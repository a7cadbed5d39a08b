//! Dump every live entry as JSON.

use anyhow::{Context, Result};
use std::path::Path;
use sync_client::SyncEngine;

/// Run the export command, writing to `output` or stdout.
pub fn run(engine: &SyncEngine, output: Option<&Path>) -> Result<()> {
    let json = engine
        .store()
        .export()
        .context("Failed to export store contents")?;

    match output {
        Some(path) => {
            std::fs::write(path, &json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Exported {} entries to {}", engine.store().keys().len(), path.display());
        }
        None => println!("{}", json),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::temp_engine;
    use serde_json::Value;

    #[test]
    fn export_to_file() {
        let (dir, engine) = temp_engine();
        engine.store().set("user", &"ada", None);
        let path = dir.path().join("dump.json");

        run(&engine, Some(&path)).unwrap();

        let dump: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(dump["user"]["value"], "ada");
    }

    #[test]
    fn export_to_stdout() {
        let (_dir, engine) = temp_engine();
        assert!(run(&engine, None).is_ok());
    }

    #[test]
    fn export_to_missing_directory_fails() {
        let (dir, engine) = temp_engine();
        let path = dir.path().join("missing").join("dump.json");
        assert!(run(&engine, Some(&path)).is_err());
    }
}
