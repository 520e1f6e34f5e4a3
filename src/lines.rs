use crate::error::{AppError, AppResult};
use std::fs;
use std::path::Path;

/// Read a UTF-8 text file into its lines, line endings removed.
///
/// A missing file, a permission problem and invalid UTF-8 all surface as
/// `AppError::FileAccess` so callers can report them uniformly.
pub fn read_lines(path: &Path) -> AppResult<Vec<String>> {
    let text = fs::read_to_string(path).map_err(|e| AppError::file_access(path, e))?;
    Ok(split_lines(&text))
}

/// Split on `\n`, `\r\n` or a lone `\r`. A final terminator does not start
/// an extra empty line.
pub fn split_lines(text: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut rest = text;

    while !rest.is_empty() {
        let Some(end) = rest.find(['\r', '\n']) else {
            lines.push(rest.to_string());
            break;
        };
        lines.push(rest[..end].to_string());
        let width = if rest[end..].starts_with("\r\n") { 2 } else { 1 };
        rest = &rest[end + width..];
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_split_lines_strips_endings() {
        assert_eq!(split_lines("a\nb\r\nc"), vec!["a", "b", "c"]);
        assert_eq!(split_lines("a\n\n"), vec!["a", ""]);
        assert_eq!(split_lines("trailing\r\r\n"), vec!["trailing", ""]);
        assert!(split_lines("").is_empty());
    }

    #[test]
    fn test_split_lines_on_bare_carriage_returns() {
        assert_eq!(split_lines("t1\rt2\rt3\n"), vec!["t1", "t2", "t3"]);
        assert_eq!(split_lines("a\r\nb\rc\n\rd"), vec!["a", "b", "c", "", "d"]);
    }

    #[test]
    fn test_read_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("room_1.txt");
        fs::write(&path, "12:00:01 21.5C\n12:00:02 21.6C\n").unwrap();

        let lines = read_lines(&path).unwrap();
        assert_eq!(lines, vec!["12:00:01 21.5C", "12:00:02 21.6C"]);
    }

    #[test]
    fn test_read_lines_errors() {
        let dir = tempdir().unwrap();

        let missing = read_lines(&dir.path().join("gone.txt"));
        assert!(matches!(missing, Err(AppError::FileAccess { .. })));

        let binary = dir.path().join("binary.txt");
        fs::write(&binary, [0xff, 0xfe, 0x00, 0x41]).unwrap();
        assert!(matches!(read_lines(&binary), Err(AppError::FileAccess { .. })));
    }
}
