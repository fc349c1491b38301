//! Document shapes persisted by the store.
//!
//! Every struct derives `Serialize` and `Deserialize` with camelCase field
//! names so that the JSON form matches the documents the client relies on.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tailtown_shared::types::{ListingStatus, PetType, Role};

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// One registered identity with its role and profile fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    /// Identity issued by the account registry.
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    /// Listing ids this user marked as favourite, without duplicates.
    pub favorite_pet_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Listing
// ---------------------------------------------------------------------------

/// A pet offered for adoption.
///
/// `seller_id` is not referentially enforced; readers must tolerate a seller
/// whose profile no longer exists.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub pet_type: PetType,
    pub breed: String,
    pub age: u32,
    pub description: String,
    pub image_url: Option<String>,
    pub seller_id: String,
    pub status: ListingStatus,
    pub created_at: DateTime<Utc>,
}

/// Fields supplied by the creator of a listing.  The store fills in the id,
/// status and creation time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewListing {
    pub name: String,
    pub pet_type: PetType,
    pub breed: String,
    pub age: u32,
    pub description: String,
    pub image_url: Option<String>,
    pub seller_id: String,
}

/// Exact-match filter for listing queries.  `None` fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingFilter {
    pub pet_type: Option<PetType>,
    pub breed: Option<String>,
}

// ---------------------------------------------------------------------------
// Chat session
// ---------------------------------------------------------------------------

/// Display snapshot of a participant, captured when the session was created.
///
/// Cached at write time: later profile edits are not reflected here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParticipantInfo {
    pub name: String,
    pub role: String,
}

/// Copy of the most recent message of a session.
///
/// Cached at write time and recomputable from the message log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LastMessage {
    pub text: String,
    pub sender_id: String,
    pub timestamp: DateTime<Utc>,
}

/// A two-party conversation keyed by a deterministic function of both
/// participant identities.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
    pub id: String,
    /// Exactly two identities in ascending order.
    pub participants: [String; 2],
    pub participant_info: BTreeMap<String, ParticipantInfo>,
    pub last_message: Option<LastMessage>,
    pub last_message_timestamp: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ChatSession {
    pub fn has_participant(&self, id: &str) -> bool {
        self.participants.iter().any(|p| p == id)
    }

    /// The participant that is not `me`, if `me` takes part at all.
    pub fn counterpart_of(&self, me: &str) -> Option<&str> {
        match &self.participants {
            [a, b] if a == me => Some(b),
            [a, b] if b == me => Some(a),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// One entry of a session's append-only message log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub chat_id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub text: String,
    /// Assigned by the store, never by the sender's clock.
    pub timestamp: DateTime<Utc>,
    pub is_read: bool,
}

// ---------------------------------------------------------------------------
// Account
// ---------------------------------------------------------------------------

/// Result of a successful sign-up or sign-in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AuthSession {
    pub uid: String,
    pub email: String,
    pub signed_in_at: DateTime<Utc>,
}
