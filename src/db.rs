use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::Path;

/// Initialize the database with all required tables
pub fn init_database(db_path: &Path) -> Result<()> {
    let conn = Connection::open(db_path)
        .context("Failed to open database")?;

    conn.execute_batch("PRAGMA journal_mode=WAL;")?;

    create_schema(&conn)?;

    log::info!("Database initialized successfully");
    Ok(())
}

/// Create all database tables
fn create_schema(conn: &Connection) -> Result<()> {
    // Source files the user picked from the text directory
    conn.execute(
        "CREATE TABLE IF NOT EXISTS tracked_files (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            file_path TEXT NOT NULL UNIQUE,
            processed_at INTEGER NOT NULL
        )",
        [],
    )?;

    // Lines marked by the user; content is a snapshot, never re-read
    conn.execute(
        "CREATE TABLE IF NOT EXISTS selected_lines (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            file_id INTEGER NOT NULL,
            line_number INTEGER NOT NULL,
            content TEXT NOT NULL,
            selected_at INTEGER NOT NULL,
            FOREIGN KEY (file_id) REFERENCES tracked_files(id) ON DELETE CASCADE,
            UNIQUE(file_id, line_number)
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_selected_lines_file
         ON selected_lines(file_id, line_number)",
        [],
    )?;

    log::info!("Database schema created successfully");
    Ok(())
}

/// Get a database connection with foreign keys enforced
pub fn get_connection(db_path: &Path) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    Ok(conn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_init_database() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");

        init_database(&db_path).unwrap();

        // Verify database was created
        assert!(db_path.exists());

        // Verify tables exist
        let conn = get_connection(&db_path).unwrap();
        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table'")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();

        assert!(tables.contains(&"tracked_files".to_string()));
        assert!(tables.contains(&"selected_lines".to_string()));
    }

    #[test]
    fn test_init_is_idempotent() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");

        init_database(&db_path).unwrap();
        init_database(&db_path).unwrap();
    }

    #[test]
    fn test_connection_enforces_foreign_keys() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        init_database(&db_path).unwrap();

        let conn = get_connection(&db_path).unwrap();
        let enabled: i64 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(enabled, 1);

        let orphan = conn.execute(
            "INSERT INTO selected_lines (file_id, line_number, content, selected_at)
             VALUES (999, 1, 'x', 0)",
            [],
        );
        assert!(orphan.is_err());
    }
}
