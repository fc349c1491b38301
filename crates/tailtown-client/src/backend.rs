//! Shared handle on the store.
//!
//! The [`Database`] is synchronous, so every call is moved onto tokio's
//! blocking pool and the calling task suspends until the round-trip ends.
//! The lock is never held across an `.await`.

use std::path::Path;
use std::sync::{Arc, Mutex};

use tailtown_store::{Database, MessageFeed};

use crate::config::ClientConfig;
use crate::error::ClientError;

#[derive(Clone)]
pub struct Backend {
    db: Arc<Mutex<Database>>,
    feed: MessageFeed,
}

impl Backend {
    pub fn new(db: Database) -> Self {
        let feed = db.feed().clone();
        Self {
            db: Arc::new(Mutex::new(db)),
            feed,
        }
    }

    /// Open the database named by `config`, or the platform default.
    pub fn open(config: &ClientConfig) -> Result<Self, ClientError> {
        let db = match config.database_path {
            Some(ref path) => Database::open_at(Path::new(path))?,
            None => Database::new()?,
        };
        Ok(Self::new(db))
    }

    pub fn in_memory() -> Result<Self, ClientError> {
        Ok(Self::new(Database::open_in_memory()?))
    }

    /// Run `f` against the database on the blocking pool.
    pub(crate) async fn call<T, F>(&self, f: F) -> Result<T, ClientError>
    where
        F: FnOnce(&Database) -> tailtown_store::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || {
            let guard = db
                .lock()
                .map_err(|e| ClientError::Internal(format!("Lock poisoned: {e}")))?;
            f(&guard).map_err(ClientError::from)
        })
        .await
        .map_err(|e| ClientError::Internal(format!("Store task failed: {e}")))?
    }

    /// Change notices for message logs.
    pub fn feed(&self) -> &MessageFeed {
        &self.feed
    }
}
