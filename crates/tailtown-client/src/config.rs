//! Client configuration loaded from environment variables.
//!
//! All settings have defaults so the client starts with zero configuration.

use std::path::PathBuf;

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Database file to open.
    /// Env: `TAILTOWN_DB_PATH`
    /// Default: `None` (platform data directory, see `Database::new`).
    pub database_path: Option<PathBuf>,

    /// Tracing filter used when `RUST_LOG` is unset.
    /// Env: `TAILTOWN_LOG`
    /// Default: `tailtown_client=debug,tailtown_store=info,warn`
    pub log_filter: String,

    /// Longest last-message preview shown in the conversation list, in
    /// characters, including the ellipsis.
    /// Env: `TAILTOWN_PREVIEW_LEN`
    /// Default: `50`
    pub preview_len: usize,

    /// Problems found while loading, held until logging is up.
    warnings: Vec<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            log_filter: "tailtown_client=debug,tailtown_store=info,warn".to_string(),
            preview_len: 50,
            warnings: Vec::new(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(path) = lookup("TAILTOWN_DB_PATH").filter(|p| !p.trim().is_empty()) {
            config.database_path = Some(PathBuf::from(path));
        }

        if let Some(filter) = lookup("TAILTOWN_LOG").filter(|f| !f.trim().is_empty()) {
            config.log_filter = filter;
        }

        if let Some(val) = lookup("TAILTOWN_PREVIEW_LEN") {
            match val.parse::<usize>() {
                Ok(n) if n > 3 => config.preview_len = n,
                _ => config.warnings.push(format!(
                    "Invalid TAILTOWN_PREVIEW_LEN {val:?}, using default {}",
                    config.preview_len
                )),
            }
        }

        config
    }

    /// Settings that were ignored while loading.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }
}
