// SPDX-FileCopyrightText: 2026 Aina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Schema migrations embedded from `migrations/` with refinery.

use aina_core::AinaError;
use tracing::info;

mod embedded {
    refinery::embed_migrations!("migrations");
}

/// Bring the schema up to date. Already-applied versions are skipped
/// (refinery records them in `refinery_schema_history`).
pub fn run_migrations(conn: &mut rusqlite::Connection) -> Result<(), AinaError> {
    let report = embedded::migrations::runner()
        .run(conn)
        .map_err(|e| AinaError::Storage {
            source: Box::new(e),
        })?;
    for migration in report.applied_migrations() {
        info!(
            version = migration.version(),
            name = migration.name(),
            "applied schema migration"
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tables(conn: &rusqlite::Connection) -> Vec<String> {
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .unwrap();
        stmt.query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap()
    }

    #[test]
    fn creates_schema_and_is_rerunnable() {
        let mut conn = rusqlite::Connection::open_in_memory().unwrap();
        run_migrations(&mut conn).unwrap();
        let first = tables(&conn);
        for table in ["tenants", "conversations", "messages", "ledger_entries"] {
            assert!(first.iter().any(|t| t == table), "missing {table}: {first:?}");
        }

        run_migrations(&mut conn).unwrap();
        assert_eq!(tables(&conn), first);
    }
}
