//! Application state shared by every command.
//!
//! [`ClientState`] is built once at start-up and passed by reference to the
//! command handlers.  All of its parts are cheap handles, so the struct itself
//! needs no outer lock.

use crate::auth::AuthClient;
use crate::backend::Backend;
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::session::SessionContext;

pub struct ClientState {
    pub config: ClientConfig,
    /// Store handle shared with the auth client and subscriptions.
    pub backend: Backend,
    pub auth: AuthClient,
    /// Current-user context following `auth`.
    pub session: SessionContext,
}

impl ClientState {
    /// Open the configured store and start following auth.  Must be called
    /// inside a tokio runtime.
    pub fn start(config: ClientConfig) -> Result<Self, ClientError> {
        let backend = Backend::open(&config)?;
        Ok(Self::with_backend(config, backend))
    }

    pub fn with_backend(config: ClientConfig, backend: Backend) -> Self {
        let auth = AuthClient::new(backend.clone());
        let session = SessionContext::start(&auth, backend.clone());
        Self {
            config,
            backend,
            auth,
            session,
        }
    }

    /// Throwaway state over an in-memory store.
    pub fn in_memory() -> Result<Self, ClientError> {
        Ok(Self::with_backend(ClientConfig::default(), Backend::in_memory()?))
    }

    pub fn shutdown(&self) {
        self.session.shutdown();
    }
}
