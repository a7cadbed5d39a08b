//! Drop every pending operation.

use anyhow::{bail, Result};
use sync_client::SyncEngine;

/// Run the clear command. Returns the number of operations dropped.
pub fn run(engine: &SyncEngine) -> Result<usize> {
    let pending = engine.manager().pending_count();
    if !engine.manager().clear_pending_operations() {
        bail!("Failed to clear the sync queue");
    }

    println!("Dropped {} pending operation(s)", pending);
    Ok(pending)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::temp_engine;
    use sync_types::{OperationKind, Priority};

    #[test]
    fn clear_drops_everything() {
        let (_dir, engine) = temp_engine();
        for endpoint in ["/teachers", "/users"] {
            engine
                .manager()
                .add_operation(OperationKind::Create, endpoint, None, Priority::Medium)
                .unwrap();
        }

        assert_eq!(run(&engine).unwrap(), 2);
        assert_eq!(engine.manager().pending_count(), 0);
        assert_eq!(run(&engine).unwrap(), 0);
    }
}
