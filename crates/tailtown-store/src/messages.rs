use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

use crate::database::Database;
use crate::error::Result;
use crate::models::Message;
use crate::rules;
use crate::timestamp;

const MESSAGE_COLUMNS: &str = "id, chat_id, sender_id, receiver_id, text, timestamp, is_read";

impl Database {
    /// Append a message to a session's log with a store-assigned timestamp,
    /// then announce the change on the [`MessageFeed`](crate::MessageFeed).
    ///
    /// The session summary is not touched here; see
    /// [`Database::refresh_chat_summary`].
    pub fn append_message(
        &self,
        actor: &str,
        chat_id: &str,
        sender_id: &str,
        receiver_id: &str,
        text: &str,
    ) -> Result<Message> {
        let session = self.get_chat_session(chat_id)?;
        rules::ensure_message_append(actor, &session, sender_id, receiver_id)?;

        let message = Message {
            id: Uuid::new_v4().simple().to_string(),
            chat_id: chat_id.to_string(),
            sender_id: sender_id.to_string(),
            receiver_id: receiver_id.to_string(),
            text: text.to_string(),
            timestamp: self.server_timestamp(),
            is_read: false,
        };

        self.conn().execute(
            "INSERT INTO messages (id, chat_id, sender_id, receiver_id, text, timestamp, is_read)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                message.id,
                message.chat_id,
                message.sender_id,
                message.receiver_id,
                message.text,
                timestamp::encode(&message.timestamp),
                message.is_read,
            ],
        )?;

        tracing::debug!(msg_id = %message.id, %chat_id, "message appended");
        self.feed().publish(chat_id);
        Ok(message)
    }

    /// The whole log of a session, oldest first.  Equal timestamps keep
    /// insertion order.
    pub fn get_messages_for_chat(&self, chat_id: &str) -> Result<Vec<Message>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages
             WHERE chat_id = ?1
             ORDER BY timestamp ASC, seq ASC"
        ))?;

        let rows = stmt.query_map(params![chat_id], row_to_message)?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }

    pub(crate) fn latest_message(&self, chat_id: &str) -> Result<Option<Message>> {
        Ok(self
            .conn()
            .query_row(
                &format!(
                    "SELECT {MESSAGE_COLUMNS} FROM messages
                     WHERE chat_id = ?1
                     ORDER BY timestamp DESC, seq DESC
                     LIMIT 1"
                ),
                params![chat_id],
                row_to_message,
            )
            .optional()?)
    }
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let ts_str: String = row.get(5)?;

    Ok(Message {
        id: row.get(0)?,
        chat_id: row.get(1)?,
        sender_id: row.get(2)?,
        receiver_id: row.get(3)?,
        text: row.get(4)?,
        timestamp: timestamp::decode(5, &ts_str)?,
        is_read: row.get(6)?,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::error::StoreError;
    use crate::models::{ChatSession, ParticipantInfo};

    fn open_chat(db: &Database) {
        let mut info = BTreeMap::new();
        for id in ["u1", "u2"] {
            info.insert(id.to_string(), ParticipantInfo { name: id.into(), role: "User".into() });
        }
        let session = ChatSession {
            id: "u1_u2".into(),
            participants: ["u1".into(), "u2".into()],
            participant_info: info,
            last_message: None,
            last_message_timestamp: None,
            created_at: timestamp::now(),
        };
        db.put_chat_session("u1", &session).unwrap();
    }

    #[test]
    fn log_is_time_ordered_with_insertion_tiebreak() {
        let db = Database::open_in_memory().unwrap();
        open_chat(&db);

        let texts = ["one", "two", "three", "four"];
        for (i, t) in texts.iter().enumerate() {
            let (from, to) = if i % 2 == 0 { ("u1", "u2") } else { ("u2", "u1") };
            db.append_message(from, "u1_u2", from, to, t).unwrap();
        }

        let log = db.get_messages_for_chat("u1_u2").unwrap();
        let got: Vec<&str> = log.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(got, texts);
        assert!(log.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
        assert!(log.iter().all(|m| !m.is_read));
    }

    #[test]
    fn append_requires_existing_chat_and_sender_identity() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(
            db.append_message("u1", "u1_u2", "u1", "u2", "hi"),
            Err(StoreError::NotFound)
        ));

        open_chat(&db);
        assert!(matches!(
            db.append_message("u2", "u1_u2", "u1", "u2", "spoofed"),
            Err(StoreError::PermissionDenied(_))
        ));
        assert!(db.get_messages_for_chat("u1_u2").unwrap().is_empty());
    }

    #[tokio::test]
    async fn append_publishes_a_notice() {
        let db = Database::open_in_memory().unwrap();
        open_chat(&db);
        let mut rx = db.feed().subscribe();

        db.append_message("u1", "u1_u2", "u1", "u2", "ping").unwrap();
        assert_eq!(rx.recv().await.unwrap().chat_id, "u1_u2");
    }
}
