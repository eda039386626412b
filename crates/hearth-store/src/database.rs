//! Database connection management.
//!
//! [`Database`] owns a [`rusqlite::Connection`] and runs migrations before
//! handing it out. [`DatabaseHandle`] shares one database between the
//! persistence task and the session's credential lookups.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use directories::ProjectDirs;
use rusqlite::Connection;

use crate::error::{Result, StoreError};
use crate::migrations;

/// Wrapper around a [`rusqlite::Connection`].
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) the default application database.
    ///
    /// The file lives in the platform data directory:
    /// - Linux:   `~/.local/share/hearth/hearth.db`
    /// - macOS:   `~/Library/Application Support/chat.hearth.hearth/hearth.db`
    /// - Windows: `{FOLDERID_RoamingAppData}\hearth\hearth\data\hearth.db`
    pub fn open_default() -> Result<Self> {
        let data_dir = default_data_dir()?;
        Self::open_in(&data_dir)
    }

    /// Open (or create) `hearth.db` inside `dir`, creating the directory.
    pub fn open_in(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let db_path = dir.join("hearth.db");

        tracing::info!(path = %db_path.display(), "opening database");

        Self::open_at(&db_path)
    }

    /// Open (or create) a database at an explicit path.
    pub fn open_at(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// Open a throwaway in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        // In-memory databases report "memory" here, which is fine.
        conn.pragma_update(None, "journal_mode", "WAL")?;

        migrations::run_migrations(&conn)?;

        Ok(Self { conn })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn conn_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    /// Return the filesystem path of the open database (if any).
    pub fn path(&self) -> Option<PathBuf> {
        self.conn.path().map(PathBuf::from)
    }
}

/// Platform data directory for the application.
pub fn default_data_dir() -> Result<PathBuf> {
    let project_dirs = ProjectDirs::from("chat", "hearth", "hearth").ok_or(StoreError::NoDataDir)?;
    Ok(project_dirs.data_dir().to_path_buf())
}

/// Cloneable, thread-safe handle to a [`Database`].
#[derive(Clone)]
pub struct DatabaseHandle {
    inner: Arc<Mutex<Database>>,
}

impl DatabaseHandle {
    pub fn new(db: Database) -> Self {
        Self {
            inner: Arc::new(Mutex::new(db)),
        }
    }

    /// Run `f` with exclusive access to the database.
    pub fn with<T>(&self, f: impl FnOnce(&mut Database) -> Result<T>) -> Result<T> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))?;
        f(&mut guard)
    }
}
