//! Pending search selections, one per conversation.
//!
//! Every terminal transition of a session (resolved, expired, superseded)
//! goes through an atomic removal keyed by the session's id, so whichever
//! path removes the entry first owns the session and every other path sees
//! nothing.

use dashmap::DashMap;
use ncm_catalog::Track;
use ncm_channels::{ChannelId, InboundMessage, SenderId};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::AbortHandle;
use tokio::time::Instant;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConversationKey {
    channel_id: ChannelId,
    conversation_id: String,
}

impl ConversationKey {
    pub fn new(channel_id: impl Into<ChannelId>, conversation_id: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            conversation_id: conversation_id.into(),
        }
    }

    pub fn of(inbound: &InboundMessage) -> Self {
        Self::new(inbound.channel_id.clone(), inbound.reply_recipient())
    }
}

/// Where to deliver messages for a session after the originating request is gone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyTarget {
    pub channel_id: ChannelId,
    pub recipient_id: String,
}

impl ReplyTarget {
    pub fn of(inbound: &InboundMessage) -> Self {
        Self {
            channel_id: inbound.channel_id.clone(),
            recipient_id: inbound.reply_recipient().to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchSession {
    pub id: Uuid,
    pub key: ConversationKey,
    pub candidates: Arc<[Track]>,
    pub created_at: Instant,
    pub owner: SenderId,
    pub reply_target: ReplyTarget,
}

impl SearchSession {
    pub fn new(
        key: ConversationKey,
        candidates: Vec<Track>,
        owner: SenderId,
        reply_target: ReplyTarget,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            key,
            candidates: candidates.into(),
            created_at: Instant::now(),
            owner,
            reply_target,
        }
    }

    /// The instant the reply window closes.
    pub fn expires_at(&self, ttl: Duration) -> Instant {
        self.created_at + ttl
    }

    pub fn is_expired_at(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.created_at) > ttl
    }

    /// 1-based lookup, matching the numbers shown to the user.
    pub fn candidate(&self, index: usize) -> Option<&Track> {
        index.checked_sub(1).and_then(|i| self.candidates.get(i))
    }
}

struct PendingEntry {
    session: SearchSession,
    expiry: Option<AbortHandle>,
}

impl PendingEntry {
    fn cancel_expiry(&self) {
        if let Some(handle) = &self.expiry {
            handle.abort();
        }
    }
}

#[derive(Default)]
pub struct SelectionStore {
    entries: DashMap<ConversationKey, PendingEntry>,
}

impl SelectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `session` under its key, silently replacing (and returning)
    /// whatever was pending there before.
    pub fn put(&self, session: SearchSession) -> Option<SearchSession> {
        let key = session.key.clone();
        let previous = self.entries.insert(
            key,
            PendingEntry {
                session,
                expiry: None,
            },
        )?;
        previous.cancel_expiry();
        Some(previous.session)
    }

    pub fn get(&self, key: &ConversationKey) -> Option<SearchSession> {
        self.entries.get(key).map(|e| e.session.clone())
    }

    /// Unconditional eviction. The engine only ever takes sessions by id.
    #[allow(dead_code)]
    pub fn remove(&self, key: &ConversationKey) -> Option<SearchSession> {
        let (_, entry) = self.entries.remove(key)?;
        entry.cancel_expiry();
        Some(entry.session)
    }

    /// Removes the entry only if it still holds session `id`.
    ///
    /// `Some` means the caller now exclusively owns the session's terminal
    /// transition; `None` means another path got there first.
    pub fn take_if(&self, key: &ConversationKey, id: Uuid) -> Option<SearchSession> {
        let (_, entry) = self
            .entries
            .remove_if(key, |_, entry| entry.session.id == id)?;
        entry.cancel_expiry();
        Some(entry.session)
    }

    /// Runs `on_expire` once at `deadline` unless session `id` has left the
    /// store by then. The timer is aborted when the session is taken through
    /// any other path.
    pub fn schedule_expiry<F, Fut>(
        self: &Arc<Self>,
        key: ConversationKey,
        id: Uuid,
        deadline: Instant,
        on_expire: F,
    ) where
        F: FnOnce(SearchSession) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let store = Arc::clone(self);
        let task_key = key.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            // Not take_if: aborting our own handle would cancel `on_expire`.
            let expired = store
                .entries
                .remove_if(&task_key, |_, entry| entry.session.id == id)
                .map(|(_, entry)| entry.session);
            match expired {
                Some(session) => {
                    tracing::debug!(session_id = %id, "selection expired");
                    on_expire(session).await;
                }
                None => tracing::trace!(session_id = %id, "expiry found nothing to evict"),
            }
        });

        if let Some(mut entry) = self.entries.get_mut(&key) {
            if entry.session.id == id {
                entry.expiry = Some(handle.abort_handle());
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
