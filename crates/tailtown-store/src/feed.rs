//! Change notifications for message logs.
//!
//! Every append to a session's message log publishes a [`FeedNotice`] on a
//! broadcast channel.  Live subscribers filter notices by chat id and
//! re-read the log; a notice carries no message data, so a subscriber that
//! lags behind only needs to re-read once to catch up.

use tokio::sync::broadcast;

/// Capacity of the broadcast ring.  Slow receivers past this depth observe
/// `RecvError::Lagged` and must re-read.
const FEED_CAPACITY: usize = 256;

/// A message log changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedNotice {
    pub chat_id: String,
}

/// Cloneable publisher for [`FeedNotice`]s.
#[derive(Debug, Clone)]
pub struct MessageFeed {
    tx: broadcast::Sender<FeedNotice>,
}

impl MessageFeed {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(FEED_CAPACITY);
        Self { tx }
    }

    /// Register a new receiver.  Only notices published after this call are
    /// delivered to it.
    pub fn subscribe(&self) -> broadcast::Receiver<FeedNotice> {
        self.tx.subscribe()
    }

    pub fn publish(&self, chat_id: &str) {
        // No receivers is not an error: nobody has the chat open.
        let delivered = self
            .tx
            .send(FeedNotice {
                chat_id: chat_id.to_string(),
            })
            .unwrap_or(0);
        tracing::trace!(chat_id, delivered, "message feed notice");
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for MessageFeed {
    fn default() -> Self {
        Self::new()
    }
}
