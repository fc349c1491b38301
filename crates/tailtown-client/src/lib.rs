//! # tailtown-client
//!
//! Client library for the TailTown pet-adoption marketplace: the two-party
//! chat session model, listings, favorites, auth with an explicit session
//! context, and role-gated navigation.  The `tailtown` binary is a terminal
//! front end over these commands.

pub mod auth;
pub mod backend;
pub mod chat;
pub mod commands;
pub mod config;
pub mod error;
pub mod events;
pub mod session;
pub mod state;
pub mod subscription;

use tracing_subscriber::{fmt, EnvFilter};

use crate::config::ClientConfig;

pub use crate::error::ClientError;

/// Install the global tracing subscriber.  `RUST_LOG` wins over the
/// configured filter.  Logs go to stderr so they do not interleave with the
/// prompt.  Warnings collected while loading `config` are emitted once the
/// subscriber is in place.
pub fn init_tracing(config: &ClientConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_filter));

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    for warning in config.warnings() {
        tracing::warn!("{warning}");
    }
}
