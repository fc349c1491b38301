//! Email/password accounts.
//!
//! Credentials are kept as an Argon2id hash in PHC string form, salt and
//! parameters included.  The store only needs to tell a matching pair from a
//! non-matching one; token issuance and session lifetime are left to the
//! caller.

use argon2::password_hash::{PasswordHasher, SaltString};
use argon2::{Argon2, PasswordHash, PasswordVerifier};
use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::AuthSession;
use crate::timestamp;

fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(rand::thread_rng());
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| StoreError::PasswordHash(e.to_string()))
}

fn password_matches(password: &str, stored: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::warn!(error = %e, "stored password hash is malformed");
            false
        }
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl Database {
    /// Register a new account and return its session.  The issued identity
    /// is a random 32-character lowercase hex string.
    pub fn create_account(&self, email: &str, password: &str) -> Result<AuthSession> {
        let email = normalize_email(email);

        let exists: Option<String> = self
            .conn()
            .query_row(
                "SELECT uid FROM accounts WHERE email = ?1",
                params![email],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_some() {
            return Err(StoreError::Conflict(format!("email already registered: {email}")));
        }

        let password_hash = hash_password(password)?;
        let uid = Uuid::new_v4().simple().to_string();
        let now = timestamp::now();

        self.conn().execute(
            "INSERT INTO accounts (uid, email, password_hash, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![uid, email, password_hash, timestamp::encode(&now)],
        )?;

        tracing::info!(%uid, "account created");

        Ok(AuthSession {
            uid,
            email,
            signed_in_at: now,
        })
    }

    /// Check an email/password pair and return a fresh session.
    pub fn verify_account(&self, email: &str, password: &str) -> Result<AuthSession> {
        let email = normalize_email(email);

        let row: Option<(String, String)> = self
            .conn()
            .query_row(
                "SELECT uid, password_hash FROM accounts WHERE email = ?1",
                params![email],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((uid, stored)) = row else {
            return Err(StoreError::InvalidCredentials);
        };

        if !password_matches(password, &stored) {
            tracing::debug!(%uid, "password mismatch");
            return Err(StoreError::InvalidCredentials);
        }

        Ok(AuthSession {
            uid,
            email,
            signed_in_at: timestamp::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_then_login() {
        let db = Database::open_in_memory().unwrap();
        let created = db.create_account("Sam@Example.com", "hunter22").unwrap();
        assert_eq!(created.uid.len(), 32);
        assert_eq!(created.email, "sam@example.com");

        let session = db.verify_account("sam@example.com", "hunter22").unwrap();
        assert_eq!(session.uid, created.uid);
    }

    #[test]
    fn wrong_password_and_unknown_email_are_indistinguishable() {
        let db = Database::open_in_memory().unwrap();
        db.create_account("sam@example.com", "hunter22").unwrap();

        assert!(matches!(
            db.verify_account("sam@example.com", "nope"),
            Err(StoreError::InvalidCredentials)
        ));
        assert!(matches!(
            db.verify_account("who@example.com", "hunter22"),
            Err(StoreError::InvalidCredentials)
        ));
    }

    #[test]
    fn password_is_stored_as_argon2id() {
        let db = Database::open_in_memory().unwrap();
        let created = db.create_account("sam@example.com", "hunter22").unwrap();

        let stored: String = db
            .conn()
            .query_row(
                "SELECT password_hash FROM accounts WHERE uid = ?1",
                params![created.uid],
                |row| row.get(0),
            )
            .unwrap();
        assert!(stored.starts_with("$argon2id$"));
        assert!(!stored.contains("hunter22"));

        // Fresh salt per account.
        let other = db.create_account("kit@example.com", "hunter22").unwrap();
        let other_stored: String = db
            .conn()
            .query_row(
                "SELECT password_hash FROM accounts WHERE uid = ?1",
                params![other.uid],
                |row| row.get(0),
            )
            .unwrap();
        assert_ne!(stored, other_stored);
    }

    #[test]
    fn malformed_stored_hash_rejects_login() {
        let db = Database::open_in_memory().unwrap();
        let created = db.create_account("sam@example.com", "hunter22").unwrap();
        db.conn()
            .execute(
                "UPDATE accounts SET password_hash = 'garbage' WHERE uid = ?1",
                params![created.uid],
            )
            .unwrap();

        assert!(matches!(
            db.verify_account("sam@example.com", "hunter22"),
            Err(StoreError::InvalidCredentials)
        ));
    }

    #[test]
    fn duplicate_email_conflicts() {
        let db = Database::open_in_memory().unwrap();
        db.create_account("sam@example.com", "hunter22").unwrap();
        assert!(matches!(
            db.create_account(" SAM@example.com ", "other1"),
            Err(StoreError::Conflict(_))
        ));
    }
}
