use rusqlite::{params, Connection, Result as SqliteResult};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

pub const DEFAULT_PAGE_SIZE: usize = 100;

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// Directory holding the text files users may pick from
    pub text_directory: String,

    /// Required file name prefix (e.g. "room_"); None accepts any name
    pub name_prefix: Option<String>,

    /// File extension without the dot, matched case-insensitively
    pub extension: String,

    /// Lines shown per page in the viewer
    pub page_size: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            text_directory: "text_files".to_string(),
            name_prefix: None,
            extension: "txt".to_string(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl AppConfig {
    pub fn text_directory(&self) -> &Path {
        Path::new(&self.text_directory)
    }
}

pub struct ConfigManager {
    db_path: PathBuf,
    config: Arc<Mutex<AppConfig>>,
}

impl ConfigManager {
    pub fn new(db_path: PathBuf) -> SqliteResult<Self> {
        let config = Arc::new(Mutex::new(AppConfig::default()));
        let manager = Self { db_path, config };

        // Initialize database table if needed
        manager.init_table()?;

        Ok(manager)
    }

    fn get_connection(&self) -> SqliteResult<Connection> {
        Connection::open(&self.db_path)
    }

    fn init_table(&self) -> SqliteResult<()> {
        let conn = self.get_connection()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS settings (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                text_directory TEXT NOT NULL,
                name_prefix TEXT,
                extension TEXT NOT NULL DEFAULT 'txt',
                page_size INTEGER NOT NULL DEFAULT 100,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )",
            [],
        )?;

        Ok(())
    }

    /// Load settings from database
    pub async fn load(&self) -> SqliteResult<AppConfig> {
        let conn = self.get_connection()?;

        let result: Result<(String, Option<String>, String, i64), rusqlite::Error> = conn.query_row(
            "SELECT text_directory, name_prefix, extension, page_size FROM settings WHERE id = 1",
            [],
            |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                ))
            },
        );

        match result {
            Ok((text_directory, name_prefix, extension, page_size)) => {
                let page_size = if page_size > 0 {
                    page_size as usize
                } else {
                    DEFAULT_PAGE_SIZE
                };

                let config = AppConfig {
                    text_directory,
                    name_prefix,
                    extension,
                    page_size,
                };

                *self.config.lock().await = config.clone();
                Ok(config)
            }
            Err(rusqlite::Error::QueryReturnedNoRows) => {
                // First time - insert default settings
                let default_config = AppConfig::default();
                self.save(&default_config).await?;
                Ok(default_config)
            }
            Err(e) => Err(e),
        }
    }

    /// Save settings to database
    pub async fn save(&self, config: &AppConfig) -> SqliteResult<()> {
        let conn = self.get_connection()?;

        let now = chrono::Utc::now().timestamp();

        // Try to update first
        let updated = conn.execute(
            "UPDATE settings SET
                text_directory = ?1,
                name_prefix = ?2,
                extension = ?3,
                page_size = ?4,
                updated_at = ?5
            WHERE id = 1",
            params![
                &config.text_directory,
                &config.name_prefix,
                &config.extension,
                config.page_size as i64,
                now,
            ],
        )?;

        // If no rows updated, insert new record
        if updated == 0 {
            conn.execute(
                "INSERT INTO settings (id, text_directory, name_prefix, extension, page_size, created_at, updated_at)
                VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    &config.text_directory,
                    &config.name_prefix,
                    &config.extension,
                    config.page_size as i64,
                    now,
                    now,
                ],
            )?;
        }

        // Update in-memory config
        *self.config.lock().await = config.clone();

        Ok(())
    }

    /// Get current config (from memory)
    pub async fn get(&self) -> AppConfig {
        self.config.lock().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_config_default() {
        let temp_file = NamedTempFile::new().unwrap();
        let manager = ConfigManager::new(temp_file.path().to_path_buf()).unwrap();

        let config = manager.load().await.unwrap();
        assert_eq!(config.extension, "txt");
        assert_eq!(config.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(config.name_prefix, None);
    }

    #[tokio::test]
    async fn test_config_save_load() {
        let temp_file = NamedTempFile::new().unwrap();
        let manager = ConfigManager::new(temp_file.path().to_path_buf()).unwrap();

        let config = AppConfig {
            text_directory: "/srv/logs".to_string(),
            name_prefix: Some("room_".to_string()),
            page_size: 25,
            ..AppConfig::default()
        };

        manager.save(&config).await.unwrap();

        let reopened = ConfigManager::new(temp_file.path().to_path_buf()).unwrap();
        let loaded = reopened.load().await.unwrap();
        assert_eq!(loaded, config);
    }
}
