use crate::db;
use crate::error::{AppError, AppResult};
use crate::lines;
use crate::models::{iso8601, FileSummary, SelectedLine, TrackedFile};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashSet;
use std::path::Path;

/// Repository over `tracked_files` and `selected_lines`.
///
/// Every write that covers more than one row runs in a single transaction,
/// so a page submit or a select-all either lands completely or not at all.
pub struct SelectionLedger {
    conn: Connection,
}

impl SelectionLedger {
    pub fn open(db_path: &Path) -> AppResult<Self> {
        Ok(Self {
            conn: db::get_connection(db_path)?,
        })
    }

    /// Find the tracked file for `file_path`, creating it on first use.
    /// Returns the record and whether it was just created.
    pub fn get_or_create_file(&mut self, file_path: &str, name: &str) -> AppResult<(TrackedFile, bool)> {
        let now = chrono::Utc::now().timestamp();
        let tx = self.conn.transaction()?;

        let inserted = tx.execute(
            "INSERT INTO tracked_files (name, file_path, processed_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(file_path) DO NOTHING",
            params![name, file_path, now],
        )?;

        let file = tx.query_row(
            "SELECT id, name, file_path, processed_at FROM tracked_files WHERE file_path = ?",
            params![file_path],
            parse_file_row,
        )?;

        tx.commit()?;

        if inserted > 0 {
            log::info!("Tracking new file {} as id {}", file_path, file.id);
        }
        Ok((file, inserted > 0))
    }

    pub fn get_file(&self, file_id: i64) -> AppResult<TrackedFile> {
        self.conn
            .query_row(
                "SELECT id, name, file_path, processed_at FROM tracked_files WHERE id = ?",
                params![file_id],
                parse_file_row,
            )
            .optional()?
            .ok_or_else(|| AppError::NotFound(format!("tracked file {}", file_id)))
    }

    /// All tracked files, most recently picked first
    pub fn list_files(&self) -> AppResult<Vec<TrackedFile>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, file_path, processed_at FROM tracked_files
             ORDER BY processed_at DESC, id DESC",
        )?;

        let files = stmt
            .query_map([], parse_file_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(files)
    }

    /// Tracked files with their selection counts, ordered by name
    pub fn list_file_summaries(&self) -> AppResult<Vec<FileSummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT f.id, f.name, f.file_path, f.processed_at, COUNT(s.id)
             FROM tracked_files f
             LEFT JOIN selected_lines s ON s.file_id = f.id
             GROUP BY f.id
             ORDER BY f.name, f.id",
        )?;

        let summaries = stmt
            .query_map([], |row| {
                Ok(FileSummary {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    file_path: row.get(2)?,
                    processed_at: iso8601(row.get(3)?),
                    selected_count: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(summaries)
    }

    /// (tracked file count, selected line count) across the whole ledger
    pub fn totals(&self) -> AppResult<(i64, i64)> {
        let totals = self.conn.query_row(
            "SELECT (SELECT COUNT(*) FROM tracked_files), (SELECT COUNT(*) FROM selected_lines)",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(totals)
    }

    /// Persist the checkbox state of one page.
    ///
    /// `checked[i]` decides the fate of line `start_offset + i + 1`: checked
    /// lines are replaced with the page's current content, unchecked lines
    /// are removed. Returns how many lines of the page ended up selected.
    pub fn toggle_page(
        &mut self,
        file_id: i64,
        page_lines: &[String],
        start_offset: usize,
        checked: &[bool],
    ) -> AppResult<usize> {
        if page_lines.len() != checked.len() {
            return Err(AppError::validation(format!(
                "expected {} checkbox states, got {}",
                page_lines.len(),
                checked.len()
            )));
        }

        let now = chrono::Utc::now().timestamp();
        let tx = self.conn.transaction()?;
        let mut selected = 0;
        {
            let mut delete = tx.prepare(
                "DELETE FROM selected_lines WHERE file_id = ? AND line_number = ?",
            )?;
            let mut insert = tx.prepare(
                "INSERT INTO selected_lines (file_id, line_number, content, selected_at)
                 VALUES (?, ?, ?, ?)",
            )?;

            for (i, (line, &is_checked)) in page_lines.iter().zip(checked).enumerate() {
                let line_number = (start_offset + i + 1) as i64;
                delete.execute(params![file_id, line_number])?;
                if is_checked {
                    insert.execute(params![file_id, line_number, line, now])?;
                    selected += 1;
                }
            }
        }
        tx.commit()?;

        log::info!(
            "File {}: {} of {} lines selected from offset {}",
            file_id,
            selected,
            page_lines.len(),
            start_offset
        );
        Ok(selected)
    }

    /// Re-read the file from its stored path and select every line.
    pub fn select_all(&mut self, file: &TrackedFile) -> AppResult<usize> {
        let file_lines = lines::read_lines(Path::new(&file.file_path))?;

        let now = chrono::Utc::now().timestamp();
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM selected_lines WHERE file_id = ?", params![file.id])?;
        {
            let mut insert = tx.prepare(
                "INSERT INTO selected_lines (file_id, line_number, content, selected_at)
                 VALUES (?, ?, ?, ?)",
            )?;
            for (i, line) in file_lines.iter().enumerate() {
                insert.execute(params![file.id, (i + 1) as i64, line, now])?;
            }
        }
        tx.commit()?;

        log::info!("File {}: selected all {} lines", file.id, file_lines.len());
        Ok(file_lines.len())
    }

    /// Remove every selection of the file, returning how many were removed.
    pub fn clear_all(&self, file_id: i64) -> AppResult<usize> {
        let removed = self
            .conn
            .execute("DELETE FROM selected_lines WHERE file_id = ?", params![file_id])?;
        log::info!("File {}: cleared {} selections", file_id, removed);
        Ok(removed)
    }

    pub fn list_selected(&self, file_id: i64) -> AppResult<Vec<SelectedLine>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, file_id, line_number, content, selected_at FROM selected_lines
             WHERE file_id = ? ORDER BY line_number",
        )?;

        let selected = stmt
            .query_map(params![file_id], |row| {
                Ok(SelectedLine {
                    id: row.get(0)?,
                    file_id: row.get(1)?,
                    line_number: row.get(2)?,
                    content: row.get(3)?,
                    selected_at: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(selected)
    }

    /// Selected line numbers within `first..=last`
    pub fn selected_line_numbers(&self, file_id: i64, first: i64, last: i64) -> AppResult<HashSet<i64>> {
        let mut stmt = self.conn.prepare(
            "SELECT line_number FROM selected_lines
             WHERE file_id = ? AND line_number BETWEEN ? AND ?",
        )?;

        let numbers = stmt
            .query_map(params![file_id, first, last], |row| row.get(0))?
            .collect::<Result<HashSet<i64>, _>>()?;

        Ok(numbers)
    }

    /// Forget a tracked file; its selections go with it.
    pub fn delete_file(&self, file_id: i64) -> AppResult<()> {
        let deleted = self
            .conn
            .execute("DELETE FROM tracked_files WHERE id = ?", params![file_id])?;
        if deleted == 0 {
            return Err(AppError::NotFound(format!("tracked file {}", file_id)));
        }
        log::info!("Deleted tracked file {}", file_id);
        Ok(())
    }
}

fn parse_file_row(row: &rusqlite::Row) -> rusqlite::Result<TrackedFile> {
    Ok(TrackedFile {
        id: row.get(0)?,
        name: row.get(1)?,
        file_path: row.get(2)?,
        processed_at: row.get(3)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::{tempdir, TempDir};

    fn setup(content: &str) -> (TempDir, SelectionLedger, TrackedFile) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        db::init_database(&db_path).unwrap();

        let text_path = dir.path().join("room_test.txt");
        fs::write(&text_path, content).unwrap();

        let mut ledger = SelectionLedger::open(&db_path).unwrap();
        let (file, created) = ledger
            .get_or_create_file(&text_path.to_string_lossy(), "room_test.txt")
            .unwrap();
        assert!(created);

        (dir, ledger, file)
    }

    fn owned(lines: &[&str]) -> Vec<String> {
        lines.iter().map(|s| s.to_string()).collect()
    }

    fn numbers(ledger: &SelectionLedger, file_id: i64) -> Vec<i64> {
        ledger
            .list_selected(file_id)
            .unwrap()
            .iter()
            .map(|s| s.line_number)
            .collect()
    }

    #[test]
    fn test_get_or_create_reuses_path() {
        let (_dir, mut ledger, file) = setup("a\n");

        let (again, created) = ledger.get_or_create_file(&file.file_path, "renamed").unwrap();
        assert!(!created);
        assert_eq!(again.id, file.id);
        assert_eq!(again.name, "room_test.txt");
        assert_eq!(ledger.list_files().unwrap().len(), 1);
    }

    #[test]
    fn test_get_file_not_found() {
        let (_dir, ledger, _file) = setup("a\n");
        assert!(matches!(ledger.get_file(42), Err(AppError::NotFound(_))));
    }

    #[test]
    fn test_toggle_on_then_off() {
        let (_dir, mut ledger, file) = setup("a\nb\nc\n");
        let page = owned(&["a", "b", "c"]);

        let selected = ledger.toggle_page(file.id, &page, 0, &[true, true, false]).unwrap();
        assert_eq!(selected, 2);
        assert_eq!(numbers(&ledger, file.id), vec![1, 2]);

        ledger.toggle_page(file.id, &page, 0, &[false, true, false]).unwrap();
        assert_eq!(numbers(&ledger, file.id), vec![2]);

        // Same state twice is harmless
        ledger.toggle_page(file.id, &page, 0, &[false, true, false]).unwrap();
        assert_eq!(numbers(&ledger, file.id), vec![2]);
    }

    #[test]
    fn test_toggle_uses_offset_and_snapshots_content() {
        let (_dir, mut ledger, file) = setup("");

        ledger
            .toggle_page(file.id, &owned(&["first", "second"]), 100, &[false, true])
            .unwrap();
        ledger
            .toggle_page(file.id, &owned(&["x"]), 0, &[true])
            .unwrap();

        let selected = ledger.list_selected(file.id).unwrap();
        assert_eq!(selected.len(), 2);
        assert_eq!(selected[0].line_number, 1);
        assert_eq!(selected[1].line_number, 102);
        assert_eq!(selected[1].content, "second");

        // Re-selecting replaces the snapshot rather than duplicating it
        ledger
            .toggle_page(file.id, &owned(&["first", "edited"]), 100, &[false, true])
            .unwrap();
        let selected = ledger.list_selected(file.id).unwrap();
        assert_eq!(selected.len(), 2);
        assert_eq!(selected[1].content, "edited");
    }

    #[test]
    fn test_toggle_rejects_mismatched_flags() {
        let (_dir, mut ledger, file) = setup("a\nb\n");

        let result = ledger.toggle_page(file.id, &owned(&["a", "b"]), 0, &[true]);
        assert!(matches!(result, Err(AppError::Validation(_))));
        assert!(ledger.list_selected(file.id).unwrap().is_empty());
    }

    #[test]
    fn test_select_all_then_clear_all() {
        let (_dir, mut ledger, file) = setup("one\ntwo\nthree\nfour\n");
        ledger.toggle_page(file.id, &owned(&["old"]), 9, &[true]).unwrap();

        let count = ledger.select_all(&file).unwrap();
        assert_eq!(count, 4);

        let selected = ledger.list_selected(file.id).unwrap();
        let contents: Vec<&str> = selected.iter().map(|s| s.content.as_str()).collect();
        assert_eq!(numbers(&ledger, file.id), vec![1, 2, 3, 4]);
        assert_eq!(contents, vec!["one", "two", "three", "four"]);

        assert_eq!(ledger.clear_all(file.id).unwrap(), 4);
        assert!(ledger.list_selected(file.id).unwrap().is_empty());
    }

    #[test]
    fn test_select_all_missing_file_keeps_selection() {
        let (_dir, mut ledger, file) = setup("a\nb\n");
        ledger.toggle_page(file.id, &owned(&["a"]), 0, &[true]).unwrap();
        fs::remove_file(&file.file_path).unwrap();

        let result = ledger.select_all(&file);
        assert!(matches!(result, Err(AppError::FileAccess { .. })));
        assert_eq!(numbers(&ledger, file.id), vec![1]);
    }

    #[test]
    fn test_selected_line_numbers_in_range() {
        let (_dir, mut ledger, file) = setup("");
        let page = owned(&["a", "b", "c", "d", "e"]);
        ledger
            .toggle_page(file.id, &page, 0, &[true, false, true, false, true])
            .unwrap();

        let in_range = ledger.selected_line_numbers(file.id, 2, 4).unwrap();
        assert_eq!(in_range, HashSet::from([3]));
    }

    #[test]
    fn test_delete_file_cascades() {
        let (_dir, mut ledger, file) = setup("a\nb\n");
        ledger.select_all(&file).unwrap();

        ledger.delete_file(file.id).unwrap();

        assert!(ledger.list_files().unwrap().is_empty());
        assert_eq!(ledger.totals().unwrap(), (0, 0));
        assert!(matches!(ledger.delete_file(file.id), Err(AppError::NotFound(_))));
    }

    #[test]
    fn test_summaries_count_selections() {
        let (dir, mut ledger, file) = setup("a\nb\nc\n");
        ledger.select_all(&file).unwrap();
        let other_path = dir.path().join("another.txt");
        ledger
            .get_or_create_file(&other_path.to_string_lossy(), "another.txt")
            .unwrap();

        let summaries = ledger.list_file_summaries().unwrap();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].name, "another.txt");
        assert_eq!(summaries[0].selected_count, 0);
        assert_eq!(summaries[1].selected_count, 3);
        assert_eq!(ledger.totals().unwrap(), (2, 3));
    }
}
