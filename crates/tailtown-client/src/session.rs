//! Explicit, injectable current-user context.
//!
//! A [`SessionContext`] is created once at process start from an
//! [`AuthClient`].  It follows the auth stream with a single background
//! task, resolves the signed-in identity's profile, and republishes the
//! outcome as an [`AuthState`].  Components that need the current user take
//! a `&SessionContext`; nothing reads auth state from a global.

use tailtown_shared::types::{email_local_part, Role};
use tailtown_store::UserProfile;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::auth::AuthClient;
use crate::backend::Backend;
use crate::error::ClientError;

/// The signed-in identity and, when it could be loaded, its profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub uid: String,
    pub email: String,
    pub profile: Option<UserProfile>,
}

impl CurrentUser {
    pub fn role(&self) -> Option<Role> {
        self.profile.as_ref().map(|p| p.role)
    }

    /// Profile name, else the email local part, else the email itself.
    pub fn display_name(&self) -> &str {
        match self.profile {
            Some(ref p) if !p.name.trim().is_empty() => &p.name,
            _ => email_local_part(&self.email).unwrap_or(&self.email),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    /// The first auth value has not been resolved yet.
    Loading,
    SignedOut,
    SignedIn(CurrentUser),
}

impl AuthState {
    pub fn user(&self) -> Option<&CurrentUser> {
        match self {
            AuthState::SignedIn(user) => Some(user),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, AuthState::Loading)
    }
}

pub struct SessionContext {
    state: watch::Receiver<AuthState>,
    task: JoinHandle<()>,
}

impl SessionContext {
    /// Subscribe to `auth` and start resolving sessions.  Must be called
    /// inside a tokio runtime.
    pub fn start(auth: &AuthClient, backend: Backend) -> Self {
        let (state_tx, state_rx) = watch::channel(AuthState::Loading);
        let mut sessions = auth.watch();

        let task = tokio::spawn(async move {
            loop {
                let session = sessions.borrow_and_update().clone();
                let next = match session {
                    None => AuthState::SignedOut,
                    Some(session) => {
                        let uid = session.uid.clone();
                        let lookup = backend.call(move |db| db.get_user_profile(&uid)).await;
                        let profile = match lookup {
                            Ok(profile) => Some(profile),
                            Err(ClientError::NotFound(_)) => {
                                warn!(uid = %session.uid, "signed-in user has no profile");
                                None
                            }
                            Err(e) => {
                                warn!(uid = %session.uid, error = %e, "failed to load profile");
                                None
                            }
                        };
                        AuthState::SignedIn(CurrentUser {
                            uid: session.uid,
                            email: session.email,
                            profile,
                        })
                    }
                };
                debug!(state = ?state_label(&next), "auth state resolved");
                state_tx.send_replace(next);

                if sessions.changed().await.is_err() {
                    break;
                }
            }
        });

        Self {
            state: state_rx,
            task,
        }
    }

    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    pub fn current_user(&self) -> Option<CurrentUser> {
        self.state.borrow().user().cloned()
    }

    /// The current user or [`ClientError::NotSignedIn`].
    pub fn require_user(&self) -> Result<CurrentUser, ClientError> {
        self.current_user().ok_or(ClientError::NotSignedIn)
    }

    pub fn watch(&self) -> watch::Receiver<AuthState> {
        self.state.clone()
    }

    /// Wait until the state satisfies `pred` and return it.
    pub async fn wait_for<F>(&self, pred: F) -> Result<AuthState, ClientError>
    where
        F: FnMut(&AuthState) -> bool,
    {
        let mut rx = self.state.clone();
        let state = rx
            .wait_for(pred)
            .await
            .map_err(|_| ClientError::Internal("session context stopped".to_string()))?;
        Ok(state.clone())
    }

    /// Wait for the first resolved state.
    pub async fn resolved(&self) -> Result<AuthState, ClientError> {
        self.wait_for(|s| !s.is_loading()).await
    }

    /// Wait until `uid` is the resolved signed-in user.
    pub async fn signed_in_as(&self, uid: &str) -> Result<CurrentUser, ClientError> {
        let state = self
            .wait_for(|s| s.user().is_some_and(|u| u.uid == uid))
            .await?;
        state.user().cloned().ok_or(ClientError::NotSignedIn)
    }

    /// Wait until the resolved state is signed out.
    pub async fn signed_out(&self) -> Result<(), ClientError> {
        self.wait_for(|s| matches!(s, AuthState::SignedOut)).await?;
        Ok(())
    }

    /// Stop following the auth stream.  The last state stays readable.
    pub fn shutdown(&self) {
        if !self.task.is_finished() {
            debug!("session context shut down");
        }
        self.task.abort();
    }
}

impl Drop for SessionContext {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn state_label(state: &AuthState) -> &'static str {
    match state {
        AuthState::Loading => "loading",
        AuthState::SignedOut => "signed-out",
        AuthState::SignedIn(_) => "signed-in",
    }
}
