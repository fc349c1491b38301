//! Command handlers backing the terminal front end.
//!
//! Each sub-module groups related commands by domain.  Handlers take the
//! [`ClientState`](crate::state::ClientState) explicitly and return
//! serializable DTOs, so any front end can render them.

pub mod account;
pub mod chat;
pub mod favorites;
pub mod listings;
pub mod navigation;
