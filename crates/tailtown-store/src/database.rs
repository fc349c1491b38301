//! Database connection management.
//!
//! The [`Database`] struct owns a [`rusqlite::Connection`] and guarantees that
//! migrations are run before any other operation.  It also carries the
//! [`MessageFeed`] and the monotonic clock used to stamp messages.

use std::cell::Cell;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use directories::ProjectDirs;
use rusqlite::Connection;

use crate::error::{Result, StoreError};
use crate::feed::MessageFeed;
use crate::migrations;
use crate::timestamp;

/// Wrapper around a [`rusqlite::Connection`].
pub struct Database {
    conn: Connection,
    feed: MessageFeed,
    /// Last timestamp handed out by [`Database::server_timestamp`].
    last_stamp: Cell<Option<DateTime<Utc>>>,
}

impl Database {
    /// Open (or create) the default application database.
    ///
    /// The database file is placed in the platform-appropriate data directory:
    /// - Linux:   `~/.local/share/tailtown/tailtown.db`
    /// - macOS:   `~/Library/Application Support/com.tailtown.tailtown/tailtown.db`
    /// - Windows: `{FOLDERID_RoamingAppData}\tailtown\tailtown\data\tailtown.db`
    pub fn new() -> Result<Self> {
        let project_dirs =
            ProjectDirs::from("com", "tailtown", "tailtown").ok_or(StoreError::NoDataDir)?;

        let data_dir = project_dirs.data_dir();
        std::fs::create_dir_all(data_dir)?;

        let db_path = data_dir.join("tailtown.db");

        tracing::info!(path = %db_path.display(), "opening database");

        Self::open_at(&db_path)
    }

    /// Open (or create) a database at an explicit path.
    pub fn open_at(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::init(conn)
    }

    /// Open a private, throwaway in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;

        migrations::run_migrations(&conn)?;

        Ok(Self {
            conn,
            feed: MessageFeed::new(),
            last_stamp: Cell::new(None),
        })
    }

    /// Return a reference to the underlying `rusqlite::Connection`.
    ///
    /// Callers should prefer the typed helpers, which apply the authorization
    /// rules; direct access bypasses them.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Handle on the message-log change feed.
    pub fn feed(&self) -> &MessageFeed {
        &self.feed
    }

    /// Return the filesystem path of the open database (if any).
    pub fn path(&self) -> Option<PathBuf> {
        self.conn
            .path()
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
    }

    /// Store-assigned timestamp, strictly later than any previously assigned
    /// one from this handle, even if the wall clock stalls or steps back.
    pub(crate) fn server_timestamp(&self) -> DateTime<Utc> {
        let now = timestamp::now();
        let stamp = match self.last_stamp.get() {
            Some(last) if last >= now => last + Duration::microseconds(1),
            _ => now,
        };
        self.last_stamp.set(Some(stamp));
        stamp
    }
}
