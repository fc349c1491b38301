//! # tailtown-store
//!
//! Embedded document store backing the TailTown client, built on SQLite.
//!
//! The store plays the part of the marketplace backend: it owns accounts,
//! user profiles, pet listings, chat sessions and their message logs, and it
//! enforces the authorization rules that decide who may write what.  The
//! crate exposes a synchronous [`Database`] handle with typed helpers for
//! every document kind, plus a [`MessageFeed`] that announces message-log
//! changes to live subscribers.

pub mod accounts;
pub mod chats;
pub mod database;
pub mod feed;
pub mod listings;
pub mod messages;
pub mod migrations;
pub mod models;
pub mod rules;
pub mod users;

mod error;
mod timestamp;

pub use database::Database;
pub use error::{Result, StoreError};
pub use feed::{FeedNotice, MessageFeed};
pub use models::*;
