//! Chat session documents.
//!
//! `participant_info` and `last_message` are stored as JSON snapshots.  They
//! are written once (participant info, at creation) or recomputed from the
//! message log (last message) and are never joined against live profiles.

use std::collections::BTreeMap;

use rusqlite::params;

use crate::database::Database;
use crate::error::{not_found, Result};
use crate::models::{ChatSession, LastMessage, ParticipantInfo};
use crate::rules;
use crate::timestamp::{self, conversion};

const CHAT_COLUMNS: &str = "id, participant_low, participant_high, participant_info,
                            last_message, last_message_ts, created_at";

impl Database {
    /// Fetch a session by its derived id.
    pub fn get_chat_session(&self, id: &str) -> Result<ChatSession> {
        self.conn()
            .query_row(
                &format!("SELECT {CHAT_COLUMNS} FROM chats WHERE id = ?1"),
                params![id],
                row_to_session,
            )
            .map_err(not_found)
    }

    /// Write a session document keyed on its id.
    ///
    /// Concurrent creators of the same pair derive identical documents, so
    /// the later write simply replaces the participant snapshot.  The summary
    /// fields and `created_at` of an existing document are left untouched.
    pub fn put_chat_session(&self, actor: &str, session: &ChatSession) -> Result<()> {
        rules::ensure_session_write(actor, session)?;

        let last_message = session
            .last_message
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        self.conn().execute(
            "INSERT INTO chats (id, participant_low, participant_high, participant_info,
                                last_message, last_message_ts, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(id) DO UPDATE SET participant_info = excluded.participant_info",
            params![
                session.id,
                session.participants[0],
                session.participants[1],
                serde_json::to_string(&session.participant_info)?,
                last_message,
                session.last_message_timestamp.as_ref().map(timestamp::encode),
                timestamp::encode(&session.created_at),
            ],
        )?;

        tracing::debug!(chat_id = %session.id, "chat session written");
        Ok(())
    }

    /// Recompute a session's summary from the newest message of its log.
    ///
    /// Idempotent: calling it again after a partial failure converges on the
    /// same summary.  Returns the summary written (`None` for an empty log).
    pub fn refresh_chat_summary(&self, actor: &str, chat_id: &str) -> Result<Option<LastMessage>> {
        let session = self.get_chat_session(chat_id)?;
        rules::ensure_participant(actor, &session)?;

        let latest = self.latest_message(chat_id)?;
        let summary = latest.map(|m| LastMessage {
            text: m.text,
            sender_id: m.sender_id,
            timestamp: m.timestamp,
        });

        let json = summary.as_ref().map(serde_json::to_string).transpose()?;
        self.conn().execute(
            "UPDATE chats SET last_message = ?1, last_message_ts = ?2 WHERE id = ?3",
            params![
                json,
                summary.as_ref().map(|s| timestamp::encode(&s.timestamp)),
                chat_id,
            ],
        )?;

        tracing::debug!(%chat_id, has_summary = summary.is_some(), "chat summary refreshed");
        Ok(summary)
    }

    /// Every session `uid` takes part in, most recently active first.
    /// Sessions without messages come last, newest created first.
    pub fn list_chat_sessions_for(&self, uid: &str) -> Result<Vec<ChatSession>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {CHAT_COLUMNS} FROM chats
             WHERE participant_low = ?1 OR participant_high = ?1
             ORDER BY last_message_ts IS NULL ASC, last_message_ts DESC, created_at DESC"
        ))?;

        let rows = stmt.query_map(params![uid], row_to_session)?;

        let mut sessions = Vec::new();
        for row in rows {
            sessions.push(row?);
        }
        Ok(sessions)
    }
}

fn row_to_session(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChatSession> {
    let id: String = row.get(0)?;
    let low: String = row.get(1)?;
    let high: String = row.get(2)?;
    let info_json: String = row.get(3)?;
    let last_json: Option<String> = row.get(4)?;
    let last_ts: Option<String> = row.get(5)?;
    let created_str: String = row.get(6)?;

    let participant_info: BTreeMap<String, ParticipantInfo> =
        serde_json::from_str(&info_json).map_err(|e| conversion(3, e))?;
    let last_message: Option<LastMessage> = last_json
        .map(|j| serde_json::from_str(&j))
        .transpose()
        .map_err(|e| conversion(4, e))?;
    let last_message_timestamp = last_ts
        .map(|ts| timestamp::decode(5, &ts))
        .transpose()?;

    Ok(ChatSession {
        id,
        participants: [low, high],
        participant_info,
        last_message,
        last_message_timestamp,
        created_at: timestamp::decode(6, &created_str)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;

    fn session(low: &str, high: &str) -> ChatSession {
        let mut info = BTreeMap::new();
        info.insert(
            low.to_string(),
            ParticipantInfo {
                name: "Low".into(),
                role: "Buyer".into(),
            },
        );
        info.insert(
            high.to_string(),
            ParticipantInfo {
                name: "High".into(),
                role: "Seller".into(),
            },
        );
        ChatSession {
            id: format!("{low}_{high}"),
            participants: [low.to_string(), high.to_string()],
            participant_info: info,
            last_message: None,
            last_message_timestamp: None,
            created_at: timestamp::now(),
        }
    }

    #[test]
    fn put_then_get() {
        let db = Database::open_in_memory().unwrap();
        let s = session("u1", "u2");
        db.put_chat_session("u1", &s).unwrap();
        assert_eq!(db.get_chat_session("u1_u2").unwrap(), s);
        assert!(matches!(db.get_chat_session("u1_u3"), Err(StoreError::NotFound)));
    }

    #[test]
    fn repeated_put_keeps_one_document() {
        let db = Database::open_in_memory().unwrap();
        let s = session("u1", "u2");
        db.put_chat_session("u1", &s).unwrap();
        db.put_chat_session("u2", &s).unwrap();

        let count: i64 = db
            .conn()
            .query_row("SELECT COUNT(*) FROM chats", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn outsiders_cannot_write() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(
            db.put_chat_session("u9", &session("u1", "u2")),
            Err(StoreError::PermissionDenied(_))
        ));
    }

    #[test]
    fn list_orders_by_activity_with_silent_sessions_last() {
        let db = Database::open_in_memory().unwrap();
        for s in [
            session("u1", "u2"),
            session("u1", "u3"),
            session("u1", "u4"),
            session("u5", "u6"),
        ] {
            db.put_chat_session(&s.participants[0], &s).unwrap();
        }
        db.append_message("u1", "u1_u3", "u1", "u3", "first").unwrap();
        db.refresh_chat_summary("u1", "u1_u3").unwrap();
        db.append_message("u1", "u1_u2", "u1", "u2", "second").unwrap();
        db.refresh_chat_summary("u1", "u1_u2").unwrap();

        let ids: Vec<String> = db
            .list_chat_sessions_for("u1")
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, vec!["u1_u2", "u1_u3", "u1_u4"]);
    }

    #[test]
    fn refresh_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        db.put_chat_session("u1", &session("u1", "u2")).unwrap();
        assert_eq!(db.refresh_chat_summary("u1", "u1_u2").unwrap(), None);

        db.append_message("u2", "u1_u2", "u2", "u1", "hello").unwrap();
        let first = db.refresh_chat_summary("u1", "u1_u2").unwrap();
        let second = db.refresh_chat_summary("u2", "u1_u2").unwrap();
        assert_eq!(first, second);

        let stored = db.get_chat_session("u1_u2").unwrap();
        let last = stored.last_message.unwrap();
        assert_eq!(last.text, "hello");
        assert_eq!(last.sender_id, "u2");
        assert_eq!(stored.last_message_timestamp, Some(last.timestamp));
    }
}
