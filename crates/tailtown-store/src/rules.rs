//! Store-side authorization rules.
//!
//! These checks run inside the store for every write made through the typed
//! helpers, whatever the client decided beforehand.  Client-side role checks
//! only shape navigation.

use tailtown_shared::constants::CHAT_ID_SEPARATOR;

use crate::error::{Result, StoreError};
use crate::models::{ChatSession, UserProfile};

fn deny(reason: impl Into<String>) -> StoreError {
    let reason = reason.into();
    tracing::warn!(%reason, "store rule rejected write");
    StoreError::PermissionDenied(reason)
}

/// Only the owner of a profile may write it.
pub fn ensure_profile_owner(actor: &str, profile_id: &str) -> Result<()> {
    if actor.is_empty() || actor != profile_id {
        return Err(deny("profiles can only be written by their owner"));
    }
    Ok(())
}

/// Listings are created by Sellers and Admins, on their own behalf.
pub fn ensure_can_list(
    actor: &str,
    actor_profile: Option<&UserProfile>,
    seller_id: &str,
) -> Result<()> {
    if actor != seller_id {
        return Err(deny("listings must name the creating user as seller"));
    }
    match actor_profile {
        Some(profile) if profile.role.can_list_pets() => Ok(()),
        Some(profile) => Err(deny(format!(
            "role {} may not create listings",
            profile.role
        ))),
        None => Err(deny("listing creator has no profile")),
    }
}

/// Session documents are written only by a participant, and must be
/// well-formed: two distinct ascending participants, an id derived from them
/// and a snapshot entry for each.
pub fn ensure_session_write(actor: &str, session: &ChatSession) -> Result<()> {
    let [low, high] = &session.participants;
    if low.is_empty() || high.is_empty() || low >= high {
        return Err(deny("participants must be two distinct ordered identities"));
    }
    if session.id != format!("{low}{CHAT_ID_SEPARATOR}{high}") {
        return Err(deny("chat id does not match its participants"));
    }
    if !session.has_participant(actor) {
        return Err(deny("only participants may write a chat"));
    }
    if session.participant_info.len() != 2
        || !session.participant_info.contains_key(low)
        || !session.participant_info.contains_key(high)
    {
        return Err(deny("participant info must cover exactly both participants"));
    }
    Ok(())
}

/// Summary updates are made by a participant.
pub fn ensure_participant(actor: &str, session: &ChatSession) -> Result<()> {
    if !session.has_participant(actor) {
        return Err(deny("only participants may update a chat"));
    }
    Ok(())
}

/// A message is appended by its sender, to a session holding both sender and
/// receiver.
pub fn ensure_message_append(
    actor: &str,
    session: &ChatSession,
    sender_id: &str,
    receiver_id: &str,
) -> Result<()> {
    if actor != sender_id {
        return Err(deny("messages can only be sent as yourself"));
    }
    if sender_id == receiver_id
        || !session.has_participant(sender_id)
        || !session.has_participant(receiver_id)
    {
        return Err(deny("sender and receiver must be the chat's participants"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::Utc;
    use tailtown_shared::types::Role;

    use super::*;
    use crate::models::ParticipantInfo;

    fn session(low: &str, high: &str) -> ChatSession {
        let mut info = BTreeMap::new();
        for id in [low, high] {
            info.insert(
                id.to_string(),
                ParticipantInfo {
                    name: id.to_uppercase(),
                    role: "User".into(),
                },
            );
        }
        ChatSession {
            id: format!("{low}_{high}"),
            participants: [low.to_string(), high.to_string()],
            participant_info: info,
            last_message: None,
            last_message_timestamp: None,
            created_at: Utc::now(),
        }
    }

    fn profile(id: &str, role: Role) -> UserProfile {
        UserProfile {
            id: id.into(),
            name: "n".into(),
            email: "n@example.com".into(),
            role,
            favorite_pet_ids: vec![],
            created_at: Utc::now(),
        }
    }

    #[test]
    fn profile_owner_only() {
        assert!(ensure_profile_owner("u1", "u1").is_ok());
        assert!(matches!(
            ensure_profile_owner("u2", "u1"),
            Err(StoreError::PermissionDenied(_))
        ));
        assert!(ensure_profile_owner("", "").is_err());
    }

    #[test]
    fn buyers_cannot_list() {
        let buyer = profile("u1", Role::Buyer);
        let admin = profile("u2", Role::Admin);
        assert!(ensure_can_list("u1", Some(&buyer), "u1").is_err());
        assert!(ensure_can_list("u2", Some(&admin), "u2").is_ok());
        assert!(ensure_can_list("u2", Some(&admin), "u3").is_err());
        assert!(ensure_can_list("u4", None, "u4").is_err());
    }

    #[test]
    fn session_shape_is_checked() {
        let good = session("u1", "u2");
        assert!(ensure_session_write("u1", &good).is_ok());
        assert!(ensure_session_write("u3", &good).is_err());

        let mut bad_id = good.clone();
        bad_id.id = "u2_u1".into();
        assert!(ensure_session_write("u1", &bad_id).is_err());

        let mut unordered = good.clone();
        unordered.participants = ["u2".into(), "u1".into()];
        assert!(ensure_session_write("u1", &unordered).is_err());

        let mut missing_info = good;
        missing_info.participant_info.remove("u2");
        assert!(ensure_session_write("u1", &missing_info).is_err());
    }

    #[test]
    fn messages_are_sent_as_yourself() {
        let s = session("u1", "u2");
        assert!(ensure_message_append("u1", &s, "u1", "u2").is_ok());
        assert!(ensure_message_append("u2", &s, "u1", "u2").is_err());
        assert!(ensure_message_append("u1", &s, "u1", "u3").is_err());
        assert!(ensure_message_append("u1", &s, "u1", "u1").is_err());
    }
}
