use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};

// Keys of the client-side state, one JSON or plain-text value each.
pub const HISTORY_KEY: &str = "historyData";
pub const VISITOR_KEY: &str = "fakejob_user";
pub const WELCOMED_KEY: &str = "fakejob_welcomed";
pub const PENDING_URL_KEY: &str = "pendingUrl";

/// Small persistent key/value store for client state.
pub struct Database {
    conn: Connection,
    path: PathBuf,
}

impl Database {
    pub fn open() -> Result<Self> {
        let path = Self::default_path()?;
        Self::open_at(&path)
    }

    pub fn open_at(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open store at {}", path.display()))?;
        let db = Self {
            conn,
            path: path.to_path_buf(),
        };
        db.init()?;
        Ok(db)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let db = Self {
            conn: Connection::open_in_memory()?,
            path: PathBuf::from(":memory:"),
        };
        db.init()?;
        Ok(db)
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn default_path() -> Result<PathBuf> {
        // Use XDG data directory or fallback
        if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "fakejob") {
            Ok(proj_dirs.data_dir().join("fakejob.db"))
        } else {
            Ok(PathBuf::from("fakejob.db"))
        }
    }

    fn init(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS client_state (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            );
            "#,
        )?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Result<Option<String>> {
        self.conn
            .query_row(
                "SELECT value FROM client_state WHERE key = ?1",
                [key],
                |row| row.get(0),
            )
            .optional()
            .with_context(|| format!("Failed to read '{}'", key))
    }

    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO client_state (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = datetime('now')",
                params![key, value],
            )
            .with_context(|| format!("Failed to write '{}'", key))?;
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM client_state WHERE key = ?1", [key])?;
        Ok(())
    }

    /// Read and delete in one go, for one-shot handoff values.
    pub fn take(&self, key: &str) -> Result<Option<String>> {
        let value = self.get(key)?;
        if value.is_some() {
            self.remove(key)?;
        }
        Ok(value)
    }

    pub fn updated_at(&self, key: &str) -> Result<Option<String>> {
        self.conn
            .query_row(
                "SELECT updated_at FROM client_state WHERE key = ?1",
                [key],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to read timestamp")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_overwrite() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.get(HISTORY_KEY).unwrap(), None);

        db.set(HISTORY_KEY, "[]").unwrap();
        assert_eq!(db.get(HISTORY_KEY).unwrap(), Some("[]".to_string()));

        db.set(HISTORY_KEY, "[1]").unwrap();
        assert_eq!(db.get(HISTORY_KEY).unwrap(), Some("[1]".to_string()));
        assert!(db.updated_at(HISTORY_KEY).unwrap().is_some());
    }

    #[test]
    fn test_take_is_one_shot() {
        let db = Database::open_in_memory().unwrap();
        db.set(PENDING_URL_KEY, "https://jobs.example.com/1").unwrap();

        assert_eq!(
            db.take(PENDING_URL_KEY).unwrap(),
            Some("https://jobs.example.com/1".to_string())
        );
        assert_eq!(db.take(PENDING_URL_KEY).unwrap(), None);
    }

    #[test]
    fn test_remove_missing_key_is_ok() {
        let db = Database::open_in_memory().unwrap();
        db.remove(VISITOR_KEY).unwrap();
        assert_eq!(db.get(VISITOR_KEY).unwrap(), None);
    }
}
