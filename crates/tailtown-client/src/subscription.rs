//! Live message-log subscriptions.
//!
//! A subscription is a tokio task that listens on the store's
//! [`MessageFeed`](tailtown_store::MessageFeed) and re-reads the whole log of
//! its chat whenever a notice for that chat arrives.  The feed receiver is
//! registered before the first read, so no append can fall between the
//! initial snapshot and the first notice.
//!
//! Callbacks are held behind a mutex and invoked while it is locked.
//! [`Subscription::unsubscribe`] raises a cancellation flag and then empties
//! the slot under the same lock, so once it returns no callback can run
//! again.  Called from inside a callback it only raises the flag; the
//! delivering task drops the callbacks as soon as the callback returns.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, ThreadId};

use tailtown_store::{FeedNotice, Message};
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::broadcast::Receiver;
use tokio::task::AbortHandle;
use tracing::{debug, trace, warn};

use crate::backend::Backend;
use crate::error::ClientError;

struct Callbacks {
    on_update: Box<dyn FnMut(Vec<Message>) + Send>,
    on_error: Box<dyn FnMut(ClientError) + Send>,
}

/// State shared between a [`Subscription`] handle and its task.
struct Shared {
    cancelled: AtomicBool,
    /// Thread currently running a callback, if any.
    delivering: Mutex<Option<ThreadId>>,
    callbacks: Mutex<Option<Callbacks>>,
}

impl Shared {
    fn new(callbacks: Option<Callbacks>) -> Self {
        Self {
            cancelled: AtomicBool::new(callbacks.is_none()),
            delivering: Mutex::new(None),
            callbacks: Mutex::new(callbacks),
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    fn delivering(&self) -> MutexGuard<'_, Option<ThreadId>> {
        match self.delivering.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn on_delivering_thread(&self) -> bool {
        *self.delivering() == Some(thread::current().id())
    }
}

/// Handle on a standing message subscription.  Dropping it unsubscribes.
pub struct Subscription {
    chat_id: Option<String>,
    shared: Arc<Shared>,
    abort: Option<AbortHandle>,
}

impl Subscription {
    /// A handle that was never attached to a stream.
    pub(crate) fn inert() -> Self {
        Self {
            chat_id: None,
            shared: Arc::new(Shared::new(None)),
            abort: None,
        }
    }

    pub fn chat_id(&self) -> Option<&str> {
        self.chat_id.as_deref()
    }

    /// Whether callbacks may still fire.
    pub fn is_active(&self) -> bool {
        !self.shared.is_cancelled()
    }

    /// Stop delivery.  Safe to call any number of times, including from
    /// inside this subscription's own callbacks.
    pub fn unsubscribe(&self) {
        let first = !self.shared.cancelled.swap(true, Ordering::AcqRel);
        if let Some(abort) = &self.abort {
            abort.abort();
        }
        if first {
            debug!(chat_id = ?self.chat_id, "message subscription cancelled");
        }

        // The delivering task holds the callback lock while a callback runs.
        if self.shared.on_delivering_thread() {
            return;
        }
        let taken = match self.shared.callbacks.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        drop(taken);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("chat_id", &self.chat_id)
            .field("active", &self.is_active())
            .finish()
    }
}

enum Delivery {
    Messages(Vec<Message>),
    Error(ClientError),
}

/// Hand one result to the callbacks.  Returns `false` once unsubscribed.
fn deliver(shared: &Shared, delivery: Delivery) -> bool {
    if shared.is_cancelled() {
        return false;
    }
    let mut guard = match shared.callbacks.lock() {
        Ok(guard) => guard,
        Err(_) => return false,
    };
    let Some(callbacks) = guard.as_mut() else {
        return false;
    };
    if shared.is_cancelled() {
        return false;
    }

    *shared.delivering() = Some(thread::current().id());
    match delivery {
        Delivery::Messages(messages) => (callbacks.on_update)(messages),
        Delivery::Error(e) => (callbacks.on_error)(e),
    }
    *shared.delivering() = None;

    if shared.is_cancelled() {
        // Cancelled from inside the callback.  Release the lock before the
        // callbacks drop, since they may own the handle.
        let spent = guard.take();
        drop(guard);
        drop(spent);
        return false;
    }
    true
}

/// Empty the backlog after a lag.  Returns `false` if the feed closed.
fn drain(notices: &mut Receiver<FeedNotice>) -> bool {
    loop {
        match notices.try_recv() {
            Ok(_) | Err(TryRecvError::Lagged(_)) => continue,
            Err(TryRecvError::Empty) => return true,
            Err(TryRecvError::Closed) => return false,
        }
    }
}

pub(crate) fn spawn<U, E>(
    backend: Backend,
    chat_id: String,
    on_update: U,
    on_error: E,
) -> Subscription
where
    U: FnMut(Vec<Message>) + Send + 'static,
    E: FnMut(ClientError) + Send + 'static,
{
    let shared = Arc::new(Shared::new(Some(Callbacks {
        on_update: Box::new(on_update),
        on_error: Box::new(on_error),
    })));

    let mut notices = backend.feed().subscribe();
    let task_shared = Arc::clone(&shared);
    let task_chat = chat_id.clone();

    let handle = tokio::spawn(async move {
        debug!(chat_id = %task_chat, "message subscription started");
        loop {
            let read_chat = task_chat.clone();
            let delivery = match backend
                .call(move |db| db.get_messages_for_chat(&read_chat))
                .await
            {
                Ok(messages) => {
                    trace!(chat_id = %task_chat, count = messages.len(), "delivering snapshot");
                    Delivery::Messages(messages)
                }
                Err(e) => {
                    warn!(chat_id = %task_chat, error = %e, "message snapshot read failed");
                    Delivery::Error(e)
                }
            };
            if !deliver(&task_shared, delivery) {
                break;
            }

            // Wait for the next change to this chat.
            let keep_going = loop {
                match notices.recv().await {
                    Ok(notice) if notice.chat_id == task_chat => break true,
                    Ok(_) => continue,
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(chat_id = %task_chat, skipped, "message feed lagged, re-reading");
                        // One snapshot covers every queued notice.
                        break drain(&mut notices);
                    }
                    Err(RecvError::Closed) => break false,
                }
            };
            if !keep_going {
                break;
            }
        }
        debug!(chat_id = %task_chat, "message subscription ended");
    });

    Subscription {
        chat_id: Some(chat_id),
        shared,
        abort: Some(handle.abort_handle()),
    }
}
