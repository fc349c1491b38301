//! Two-party chat sessions.
//!
//! A session id is a pure function of its two participants, so both sides
//! resolve the same document without coordination.  The session document is
//! created lazily by whichever side opens it first; its `participant_info`
//! is a snapshot taken at that moment and is never refreshed.
//!
//! Sending is two store writes: the message is appended to the log, then the
//! session summary is recomputed from the newest message.  A failure between
//! the two leaves the message stored with a stale summary; calling
//! [`refresh_summary`] (or sending again) repairs it, since the summary is
//! always derived from the log.

use std::collections::BTreeMap;

use chrono::{SubsecRound, Utc};
use tailtown_shared::constants::{CHAT_ID_SEPARATOR, DEFAULT_PARTICIPANT_ROLE};
use tailtown_shared::types::{email_local_part, short_id};
use tailtown_store::{ChatSession, LastMessage, Message, ParticipantInfo};
use tracing::{debug, info, warn};

use crate::backend::Backend;
use crate::error::ClientError;
use crate::subscription::{self, Subscription};

/// One side of a conversation as known to the caller.  Only `id` is
/// required; the rest feeds the display snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Participant {
    pub id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
}

impl Participant {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    /// Snapshot written into a new session: name falls back to the email
    /// local part, then to a label built from the identity.
    fn snapshot(&self) -> ParticipantInfo {
        let name = non_blank(self.name.as_deref())
            .or_else(|| self.email.as_deref().and_then(email_local_part))
            .map(str::to_string)
            .unwrap_or_else(|| format!("User {}", short_id(&self.id)));
        let role = non_blank(self.role.as_deref())
            .unwrap_or(DEFAULT_PARTICIPANT_ROLE)
            .to_string();
        ParticipantInfo { name, role }
    }
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.filter(|v| !v.trim().is_empty())
}

fn is_blank(s: &str) -> bool {
    s.trim().is_empty()
}

/// Stable id for the conversation between `a` and `b`, independent of
/// argument order.
pub fn derive_session_id(a: &str, b: &str) -> Result<String, ClientError> {
    if is_blank(a) || is_blank(b) {
        return Err(ClientError::invalid(
            "Cannot derive a chat id from an empty identity",
        ));
    }
    let (low, high) = if a < b { (a, b) } else { (b, a) };
    Ok(format!("{low}{CHAT_ID_SEPARATOR}{high}"))
}

/// Return the session between `local` and `remote`, creating it if needed.
///
/// The hit path performs no write.  Two callers racing on the same pair may
/// both create; they write the same derived document, so the store keeps a
/// single session either way.
pub async fn get_or_create_session(
    backend: &Backend,
    local: &Participant,
    remote: &Participant,
) -> Result<ChatSession, ClientError> {
    if is_blank(&local.id) {
        return Err(ClientError::invalid(
            "Local user information is incomplete (missing identity)",
        ));
    }
    if is_blank(&remote.id) {
        return Err(ClientError::invalid(
            "Remote user information is incomplete (missing identity)",
        ));
    }

    let chat_id = derive_session_id(&local.id, &remote.id)?;
    debug!(%chat_id, local = %local.id, remote = %remote.id, "resolving chat session");

    let lookup_id = chat_id.clone();
    match backend.call(move |db| db.get_chat_session(&lookup_id)).await {
        Ok(existing) => {
            debug!(%chat_id, "chat session already exists");
            return Ok(existing);
        }
        Err(ClientError::NotFound(_)) => {}
        Err(e) => return Err(e),
    }

    let mut participants = [local.id.clone(), remote.id.clone()];
    participants.sort();

    let mut participant_info = BTreeMap::new();
    participant_info.insert(local.id.clone(), local.snapshot());
    participant_info.insert(remote.id.clone(), remote.snapshot());

    let session = ChatSession {
        id: chat_id.clone(),
        participants,
        participant_info,
        last_message: None,
        last_message_timestamp: None,
        created_at: Utc::now().trunc_subsecs(6),
    };

    let actor = local.id.clone();
    let to_write = session.clone();
    backend
        .call(move |db| db.put_chat_session(&actor, &to_write))
        .await
        .map_err(|e| {
            if let ClientError::PermissionDenied(ref reason) = e {
                warn!(%chat_id, %reason, "chat creation rejected by store rules");
            }
            e
        })?;

    info!(%chat_id, "chat session created");
    Ok(session)
}

/// Append `text` (trimmed) to a session's log and update its summary.
pub async fn send_message(
    backend: &Backend,
    chat_id: &str,
    sender_id: &str,
    receiver_id: &str,
    text: &str,
) -> Result<Message, ClientError> {
    let text = text.trim();
    if is_blank(chat_id) || is_blank(sender_id) || is_blank(receiver_id) || text.is_empty() {
        return Err(ClientError::invalid(
            "Cannot send message with missing or invalid information",
        ));
    }

    let (chat, sender, receiver, body) = (
        chat_id.to_string(),
        sender_id.to_string(),
        receiver_id.to_string(),
        text.to_string(),
    );
    let message = backend
        .call(move |db| db.append_message(&sender, &chat, &sender, &receiver, &body))
        .await
        .map_err(|e| e.with_not_found(format!("Chat {chat_id} does not exist")))?;

    if let Err(e) = refresh_summary(backend, sender_id, chat_id).await {
        warn!(%chat_id, msg_id = %message.id, error = %e, "message stored but summary not updated");
        return Err(e);
    }

    info!(msg_id = %message.id, %chat_id, "message sent");
    Ok(message)
}

/// Recompute a session's `last_message` from its log.  Safe to repeat.
pub async fn refresh_summary(
    backend: &Backend,
    actor: &str,
    chat_id: &str,
) -> Result<Option<LastMessage>, ClientError> {
    let (actor, chat) = (actor.to_string(), chat_id.to_string());
    backend
        .call(move |db| db.refresh_chat_summary(&actor, &chat))
        .await
}

/// Standing subscription to a session's message log.  `on_update` receives
/// the full log, oldest first, once on establishment and after every append.
///
/// An invalid `chat_id` is reported to `on_error` before this returns, and
/// the returned handle is inert.
pub fn subscribe_messages<U, E>(
    backend: &Backend,
    chat_id: &str,
    on_update: U,
    mut on_error: E,
) -> Subscription
where
    U: FnMut(Vec<Message>) + Send + 'static,
    E: FnMut(ClientError) + Send + 'static,
{
    if is_blank(chat_id) {
        warn!("refusing to subscribe to an empty chat id");
        on_error(ClientError::invalid(
            "Chat id is invalid or empty for listening to messages",
        ));
        return Subscription::inert();
    }
    subscription::spawn(backend.clone(), chat_id.to_string(), on_update, on_error)
}

/// Sessions `user_id` takes part in, most recently active first; sessions
/// with no messages come last.  A point-in-time read.
pub async fn list_sessions_for(
    backend: &Backend,
    user_id: &str,
) -> Result<Vec<ChatSession>, ClientError> {
    if is_blank(user_id) {
        return Err(ClientError::invalid("User id is required to list chats"));
    }
    let uid = user_id.to_string();
    let sessions = backend
        .call(move |db| db.list_chat_sessions_for(&uid))
        .await?;
    debug!(user = %user_id, count = sessions.len(), "chat sessions listed");
    Ok(sessions)
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use tokio::sync::mpsc;

    use super::*;

    fn buyer() -> Participant {
        Participant::new("u1").named("Bea").with_role("Buyer")
    }

    fn seller() -> Participant {
        Participant::new("u2").named("Sol").with_role("Seller")
    }

    async fn chat_count(backend: &Backend) -> i64 {
        backend
            .call(|db| {
                Ok(db
                    .conn()
                    .query_row("SELECT COUNT(*) FROM chats", [], |r| r.get(0))?)
            })
            .await
            .unwrap()
    }

    #[test]
    fn session_id_is_order_independent() {
        let pairs = [("u1", "u2"), ("zed", "abe"), ("a_b", "a"), ("X", "x")];
        for (a, b) in pairs {
            assert_eq!(derive_session_id(a, b).unwrap(), derive_session_id(b, a).unwrap());
        }
        assert_eq!(derive_session_id("u1", "u2").unwrap(), "u1_u2");
        assert_eq!(derive_session_id("u2", "u1").unwrap(), "u1_u2");
    }

    #[test]
    fn session_id_rejects_blank_identities() {
        for (a, b) in [("", "u2"), ("u1", ""), ("   ", "u2"), ("u1", "\t")] {
            assert!(matches!(
                derive_session_id(a, b),
                Err(ClientError::InvalidArgument(_))
            ));
        }
    }

    #[test]
    fn snapshot_fallbacks() {
        let full = buyer().snapshot();
        assert_eq!(full.name, "Bea");
        assert_eq!(full.role, "Buyer");

        let by_email = Participant::new("abcdefgh").with_email("kit@example.com").snapshot();
        assert_eq!(by_email.name, "kit");
        assert_eq!(by_email.role, "User");

        let bare = Participant::new("abcdefgh").named("  ").snapshot();
        assert_eq!(bare.name, "User abcdef");
    }

    #[tokio::test]
    async fn create_then_reuse_in_either_order() {
        let backend = Backend::in_memory().unwrap();

        let first = get_or_create_session(&backend, &buyer(), &seller()).await.unwrap();
        assert_eq!(first.id, "u1_u2");
        assert_eq!(first.participants, ["u1".to_string(), "u2".to_string()]);
        assert_eq!(first.participant_info["u1"].name, "Bea");
        assert_eq!(first.participant_info["u2"].role, "Seller");
        assert!(first.last_message.is_none());

        let second = get_or_create_session(&backend, &seller(), &buyer()).await.unwrap();
        assert_eq!(second.id, first.id);
        assert_eq!(second.participant_info.len(), 2);
        assert_eq!(second.participant_info, first.participant_info);
        assert_eq!(chat_count(&backend).await, 1);
    }

    #[tokio::test]
    async fn hit_path_keeps_the_original_snapshot() {
        let backend = Backend::in_memory().unwrap();
        get_or_create_session(&backend, &buyer(), &seller()).await.unwrap();

        let renamed = Participant::new("u1").named("Beatrice").with_role("Buyer");
        let again = get_or_create_session(&backend, &renamed, &seller()).await.unwrap();
        assert_eq!(again.participant_info["u1"].name, "Bea");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_creation_yields_one_session() {
        let backend = Backend::in_memory().unwrap();

        let mut handles = Vec::new();
        for i in 0..8 {
            let backend = backend.clone();
            handles.push(tokio::spawn(async move {
                let (a, b) = if i % 2 == 0 { (buyer(), seller()) } else { (seller(), buyer()) };
                get_or_create_session(&backend, &a, &b).await.unwrap().id
            }));
        }
        for h in handles {
            assert_eq!(h.await.unwrap(), "u1_u2");
        }
        assert_eq!(chat_count(&backend).await, 1);
    }

    #[tokio::test]
    async fn blank_identity_performs_no_write() {
        let backend = Backend::in_memory().unwrap();
        let err = get_or_create_session(&backend, &Participant::new(""), &seller())
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::InvalidArgument(_)));

        let err = get_or_create_session(&backend, &buyer(), &Participant::new("  "))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::InvalidArgument(_)));
        assert_eq!(chat_count(&backend).await, 0);
    }

    #[tokio::test]
    async fn self_chat_is_denied_by_the_store() {
        let backend = Backend::in_memory().unwrap();
        let err = get_or_create_session(&backend, &buyer(), &buyer()).await.unwrap_err();
        assert!(matches!(err, ClientError::PermissionDenied(_)));
    }

    #[tokio::test]
    async fn send_updates_summary_visible_to_both_sides() {
        let backend = Backend::in_memory().unwrap();
        let session = get_or_create_session(&backend, &buyer(), &seller()).await.unwrap();

        let msg = send_message(&backend, &session.id, "u1", "u2", "  hello  ").await.unwrap();
        assert_eq!(msg.text, "hello");
        assert!(!msg.is_read);

        for user in ["u1", "u2"] {
            let sessions = list_sessions_for(&backend, user).await.unwrap();
            assert_eq!(sessions.len(), 1);
            let last = sessions[0].last_message.as_ref().unwrap();
            assert_eq!(last.text, "hello");
            assert_eq!(last.sender_id, "u1");
            assert_eq!(sessions[0].last_message_timestamp, Some(msg.timestamp));
        }
    }

    #[tokio::test]
    async fn blank_text_appends_nothing() {
        let backend = Backend::in_memory().unwrap();
        let session = get_or_create_session(&backend, &buyer(), &seller()).await.unwrap();

        for text in ["", "   ", "\n\t"] {
            let err = send_message(&backend, &session.id, "u1", "u2", text).await.unwrap_err();
            assert!(matches!(err, ClientError::InvalidArgument(_)));
        }
        let err = send_message(&backend, "", "u1", "u2", "hi").await.unwrap_err();
        assert!(matches!(err, ClientError::InvalidArgument(_)));

        let log = backend
            .call(|db| db.get_messages_for_chat("u1_u2"))
            .await
            .unwrap();
        assert!(log.is_empty());
    }

    #[tokio::test]
    async fn sending_to_a_missing_chat_is_not_found() {
        let backend = Backend::in_memory().unwrap();
        let err = send_message(&backend, "u1_u2", "u1", "u2", "hi").await.unwrap_err();
        assert!(matches!(err, ClientError::NotFound(_)));
    }

    #[tokio::test]
    async fn list_requires_user_and_orders_silent_last() {
        let backend = Backend::in_memory().unwrap();
        assert!(matches!(
            list_sessions_for(&backend, "").await,
            Err(ClientError::InvalidArgument(_))
        ));

        let third = Participant::new("u3").named("Tia");
        get_or_create_session(&backend, &buyer(), &seller()).await.unwrap();
        let quiet = get_or_create_session(&backend, &buyer(), &third).await.unwrap();
        send_message(&backend, "u1_u2", "u2", "u1", "still available?").await.unwrap();

        let ids: Vec<String> = list_sessions_for(&backend, "u1")
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, vec!["u1_u2".to_string(), quiet.id]);
    }

    #[tokio::test]
    async fn invalid_subscription_fails_synchronously() {
        let backend = Backend::in_memory().unwrap();
        let errors = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&errors);

        let sub = subscribe_messages(
            &backend,
            "  ",
            |_| panic!("no updates expected"),
            move |e| sink.lock().unwrap().push(e.to_string()),
        );

        assert_eq!(errors.lock().unwrap().len(), 1);
        assert!(!sub.is_active());
        sub.unsubscribe();
        sub.unsubscribe();
    }

    #[tokio::test]
    async fn subscription_delivers_ordered_snapshots() {
        let backend = Backend::in_memory().unwrap();
        let session = get_or_create_session(&backend, &buyer(), &seller()).await.unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let sub = subscribe_messages(
            &backend,
            &session.id,
            move |msgs| {
                let _ = tx.send(msgs);
            },
            |e| panic!("unexpected error: {e}"),
        );

        let initial = rx.recv().await.unwrap();
        assert!(initial.is_empty());

        for (from, to, text) in [("u1", "u2", "t1"), ("u2", "u1", "t2"), ("u1", "u2", "t3")] {
            send_message(&backend, &session.id, from, to, text).await.unwrap();
        }

        let mut last = Vec::new();
        while last.len() < 3 {
            let snapshot = tokio::time::timeout(Duration::from_secs(5), rx.recv())
                .await
                .expect("snapshot in time")
                .unwrap();
            assert!(snapshot.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
            last = snapshot;
        }
        let texts: Vec<&str> = last.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["t1", "t2", "t3"]);

        sub.unsubscribe();
    }

    #[tokio::test]
    async fn subscription_ignores_other_chats() {
        let backend = Backend::in_memory().unwrap();
        get_or_create_session(&backend, &buyer(), &seller()).await.unwrap();
        let third = Participant::new("u3");
        get_or_create_session(&backend, &buyer(), &third).await.unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let _sub = subscribe_messages(
            &backend,
            "u1_u2",
            move |msgs: Vec<Message>| {
                let _ = tx.send(msgs.len());
            },
            |_| {},
        );
        assert_eq!(rx.recv().await.unwrap(), 0);

        send_message(&backend, "u1_u3", "u1", "u3", "elsewhere").await.unwrap();
        send_message(&backend, "u1_u2", "u1", "u2", "here").await.unwrap();

        assert_eq!(rx.recv().await.unwrap(), 1);
    }
}
