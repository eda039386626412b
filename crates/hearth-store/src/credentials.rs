//! Session token storage.

use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use crate::database::{Database, DatabaseHandle};
use crate::error::{Result, StoreError};

const SESSION_TOKEN_KEY: &str = "session_token";

/// Where the session token lives between runs.
pub trait TokenStore: Send + Sync {
    fn load_token(&self) -> Result<Option<String>>;
    fn save_token(&self, token: &str) -> Result<()>;
    fn clear_token(&self) -> Result<()>;
}

impl Database {
    pub fn get_credential(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn()
            .query_row(
                "SELECT value FROM credentials WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    pub fn set_credential(&self, key: &str, value: &str) -> Result<()> {
        self.conn().execute(
            "INSERT INTO credentials (key, value, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value,
                                            updated_at = excluded.updated_at",
            params![key, value, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Returns `true` if a row was deleted.
    pub fn delete_credential(&self, key: &str) -> Result<bool> {
        let affected = self
            .conn()
            .execute("DELETE FROM credentials WHERE key = ?1", params![key])?;
        Ok(affected > 0)
    }
}

impl TokenStore for DatabaseHandle {
    fn load_token(&self) -> Result<Option<String>> {
        self.with(|db| db.get_credential(SESSION_TOKEN_KEY))
    }

    fn save_token(&self, token: &str) -> Result<()> {
        self.with(|db| db.set_credential(SESSION_TOKEN_KEY, token))
    }

    fn clear_token(&self) -> Result<()> {
        self.with(|db| db.delete_credential(SESSION_TOKEN_KEY).map(|_| ()))
    }
}

/// Token store that forgets everything on exit.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self) -> Result<std::sync::MutexGuard<'_, Option<String>>> {
        self.token
            .lock()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))
    }
}

impl TokenStore for MemoryTokenStore {
    fn load_token(&self) -> Result<Option<String>> {
        Ok(self.slot()?.clone())
    }

    fn save_token(&self, token: &str) -> Result<()> {
        *self.slot()? = Some(token.to_string());
        Ok(())
    }

    fn clear_token(&self) -> Result<()> {
        *self.slot()? = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let handle = DatabaseHandle::new(Database::open_in(dir.path()).unwrap());
        assert_eq!(handle.load_token().unwrap(), None);

        handle.save_token("first").unwrap();
        handle.save_token("second").unwrap();
        drop(handle);

        let handle = DatabaseHandle::new(Database::open_in(dir.path()).unwrap());
        assert_eq!(handle.load_token().unwrap().as_deref(), Some("second"));

        handle.clear_token().unwrap();
        assert_eq!(handle.load_token().unwrap(), None);
    }

    #[test]
    fn test_memory_store_round_trip() {
        let store = MemoryTokenStore::new();
        store.save_token("abc").unwrap();
        assert_eq!(store.load_token().unwrap().as_deref(), Some("abc"));
        store.clear_token().unwrap();
        assert_eq!(store.load_token().unwrap(), None);
    }
}
