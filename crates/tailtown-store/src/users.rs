//! CRUD operations for [`UserProfile`] records, including the favourites set.

use rusqlite::params;

use crate::database::Database;
use crate::error::{not_found, Result};
use crate::models::UserProfile;
use crate::rules;
use crate::timestamp::{self, conversion};

impl Database {
    /// Create or replace a profile.  Only its owner may write it.
    pub fn put_user_profile(&self, actor: &str, profile: &UserProfile) -> Result<()> {
        rules::ensure_profile_owner(actor, &profile.id)?;

        self.conn().execute(
            "INSERT INTO users (uid, name, email, role, favorite_pet_ids, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(uid) DO UPDATE SET
                 name = excluded.name,
                 email = excluded.email,
                 role = excluded.role,
                 favorite_pet_ids = excluded.favorite_pet_ids",
            params![
                profile.id,
                profile.name,
                profile.email,
                profile.role.as_str(),
                serde_json::to_string(&profile.favorite_pet_ids)?,
                timestamp::encode(&profile.created_at),
            ],
        )?;

        tracing::debug!(uid = %profile.id, role = %profile.role, "profile written");
        Ok(())
    }

    /// Fetch a profile by identity.
    pub fn get_user_profile(&self, uid: &str) -> Result<UserProfile> {
        self.conn()
            .query_row(
                "SELECT uid, name, email, role, favorite_pet_ids, created_at
                 FROM users WHERE uid = ?1",
                params![uid],
                row_to_profile,
            )
            .map_err(not_found)
    }

    /// Add a listing id to the owner's favourites.  Adding an id that is
    /// already present is a no-op.
    pub fn add_favorite(&self, actor: &str, uid: &str, pet_id: &str) -> Result<Vec<String>> {
        self.update_favorites(actor, uid, |ids| {
            if !ids.iter().any(|id| id == pet_id) {
                ids.push(pet_id.to_string());
            }
        })
    }

    /// Remove every occurrence of a listing id from the owner's favourites.
    pub fn remove_favorite(&self, actor: &str, uid: &str, pet_id: &str) -> Result<Vec<String>> {
        self.update_favorites(actor, uid, |ids| ids.retain(|id| id != pet_id))
    }

    fn update_favorites(
        &self,
        actor: &str,
        uid: &str,
        edit: impl FnOnce(&mut Vec<String>),
    ) -> Result<Vec<String>> {
        rules::ensure_profile_owner(actor, uid)?;

        let mut profile = self.get_user_profile(uid)?;
        edit(&mut profile.favorite_pet_ids);

        self.conn().execute(
            "UPDATE users SET favorite_pet_ids = ?1 WHERE uid = ?2",
            params![serde_json::to_string(&profile.favorite_pet_ids)?, uid],
        )?;

        tracing::debug!(%uid, count = profile.favorite_pet_ids.len(), "favorites updated");
        Ok(profile.favorite_pet_ids)
    }
}

fn row_to_profile(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserProfile> {
    let id: String = row.get(0)?;
    let name: String = row.get(1)?;
    let email: String = row.get(2)?;
    let role_str: String = row.get(3)?;
    let favorites_json: String = row.get(4)?;
    let created_str: String = row.get(5)?;

    let role = role_str.parse().map_err(|e| conversion(3, e))?;
    let favorite_pet_ids = serde_json::from_str(&favorites_json).map_err(|e| conversion(4, e))?;
    let created_at = timestamp::decode(5, &created_str)?;

    Ok(UserProfile {
        id,
        name,
        email,
        role,
        favorite_pet_ids,
        created_at,
    })
}
