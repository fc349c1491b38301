//! Email/password auth collaborator.
//!
//! [`AuthClient`] owns the process-wide "current session changed" stream.
//! Every sign-in, registration and sign-out replaces the value on a
//! `tokio::sync::watch` channel; [`SessionContext`](crate::session::SessionContext)
//! is its single subscriber in the application.

use std::sync::Arc;

use tailtown_shared::constants::MIN_PASSWORD_LEN;
use tailtown_shared::types::Role;
use tailtown_store::{AuthSession, UserProfile};
use tokio::sync::watch;
use tracing::info;

use crate::backend::Backend;
use crate::error::ClientError;

#[derive(Clone)]
pub struct AuthClient {
    backend: Backend,
    tx: Arc<watch::Sender<Option<AuthSession>>>,
}

impl AuthClient {
    /// Starts signed out.
    pub fn new(backend: Backend) -> Self {
        let (tx, _rx) = watch::channel(None);
        Self {
            backend,
            tx: Arc::new(tx),
        }
    }

    /// Subscribe to session changes.  The receiver sees the current value
    /// first.
    pub fn watch(&self) -> watch::Receiver<Option<AuthSession>> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> Option<AuthSession> {
        self.tx.borrow().clone()
    }

    /// Create an account and its profile, then sign in as it.
    ///
    /// The profile is written before the new session is published, so
    /// session observers always find it.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        name: &str,
        role: Role,
    ) -> Result<(AuthSession, UserProfile), ClientError> {
        validate_email(email)?;
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ClientError::invalid(format!(
                "Password should be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        let name = name.trim();
        if name.is_empty() {
            return Err(ClientError::invalid("Name is required"));
        }

        let (email, password, name) = (email.to_string(), password.to_string(), name.to_string());
        let (session, profile) = self
            .backend
            .call(move |db| {
                let session = db.create_account(&email, &password)?;
                let profile = UserProfile {
                    id: session.uid.clone(),
                    name,
                    email: session.email.clone(),
                    role,
                    favorite_pet_ids: Vec::new(),
                    created_at: session.signed_in_at,
                };
                db.put_user_profile(&session.uid, &profile)?;
                Ok((session, profile))
            })
            .await?;

        info!(uid = %session.uid, role = %profile.role, "account registered");
        self.tx.send_replace(Some(session.clone()));
        Ok((session, profile))
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<AuthSession, ClientError> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(ClientError::invalid("Email and password are required"));
        }
        let (email, password) = (email.to_string(), password.to_string());
        let session = self
            .backend
            .call(move |db| db.verify_account(&email, &password))
            .await?;

        info!(uid = %session.uid, "signed in");
        self.tx.send_replace(Some(session.clone()));
        Ok(session)
    }

    pub fn logout(&self) {
        if let Some(previous) = self.tx.send_replace(None) {
            info!(uid = %previous.uid, "signed out");
        }
    }
}

fn validate_email(email: &str) -> Result<(), ClientError> {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain))
            if !local.is_empty() && !domain.is_empty() && !domain.contains('@') =>
        {
            Ok(())
        }
        _ => Err(ClientError::invalid("Invalid email address")),
    }
}
