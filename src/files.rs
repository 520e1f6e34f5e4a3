use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use crate::models::AvailableFile;
use std::path::Path;
use walkdir::WalkDir;

/// Name filter applied to entries of the text directory
#[derive(Debug, Clone)]
pub struct FileFilter {
    extension: String,
    prefix: Option<String>,
}

impl FileFilter {
    pub fn new(extension: &str, prefix: Option<&str>) -> Self {
        Self {
            extension: extension.trim_start_matches('.').to_lowercase(),
            prefix: prefix.filter(|p| !p.is_empty()).map(str::to_lowercase),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(&config.extension, config.name_prefix.as_deref())
    }

    /// Case-insensitive extension and prefix match on a bare file name
    pub fn matches(&self, file_name: &str) -> bool {
        let lower = file_name.to_lowercase();
        if !lower.ends_with(&format!(".{}", self.extension)) {
            return false;
        }
        match &self.prefix {
            Some(prefix) => lower.starts_with(prefix.as_str()),
            None => true,
        }
    }
}

/// List eligible files directly inside `dir`, sorted by name.
pub fn list_available_files(dir: &Path, filter: &FileFilter) -> AppResult<Vec<AvailableFile>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| AppError::file_access(dir, e.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let name = entry.file_name().to_string_lossy().to_string();
        if !filter.matches(&name) {
            continue;
        }

        let metadata = entry
            .metadata()
            .map_err(|e| AppError::file_access(entry.path(), e.into()))?;
        let modified = metadata
            .modified()
            .map(|t| chrono::DateTime::<chrono::Utc>::from(t).timestamp())
            .unwrap_or(0);

        files.push(AvailableFile {
            name,
            path: entry.path().to_string_lossy().to_string(),
            size: metadata.len(),
            modified,
        });
    }

    files.sort_by(|a, b| a.name.cmp(&b.name));
    log::info!("Found {} eligible files in {}", files.len(), dir.display());
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_filter_extension_and_prefix() {
        let any = FileFilter::new("txt", None);
        assert!(any.matches("notes.txt"));
        assert!(any.matches("NOTES.TXT"));
        assert!(!any.matches("notes.md"));
        assert!(!any.matches("txt"));

        let rooms = FileFilter::new(".txt", Some("room_"));
        assert!(rooms.matches("Room_kitchen.txt"));
        assert!(!rooms.matches("kitchen.txt"));

        let empty_prefix = FileFilter::new("txt", Some(""));
        assert!(empty_prefix.matches("anything.txt"));
    }

    #[test]
    fn test_list_available_files() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("room_b.txt"), "one\ntwo\n").unwrap();
        fs::write(dir.path().join("room_a.txt"), "x").unwrap();
        fs::write(dir.path().join("other.txt"), "x").unwrap();
        fs::write(dir.path().join("room_c.csv"), "x").unwrap();
        fs::create_dir(dir.path().join("room_dir.txt")).unwrap();
        fs::write(dir.path().join("room_dir.txt").join("room_nested.txt"), "x").unwrap();

        let filter = FileFilter::new("txt", Some("room_"));
        let files = list_available_files(dir.path(), &filter).unwrap();

        let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["room_a.txt", "room_b.txt"]);
        assert_eq!(files[1].size, 8);
        assert!(files[0].modified > 0);
    }

    #[test]
    fn test_missing_directory_is_file_access_error() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope");

        let result = list_available_files(&missing, &FileFilter::new("txt", None));
        assert!(matches!(result, Err(AppError::FileAccess { .. })));
    }
}
