//! Search-and-select interaction flow.
//!
//! A search command lists catalog matches and leaves a pending selection for
//! the conversation. The searching user then replies with a number to get a
//! direct link, or the selection times out.

use crate::commands;
use crate::config::AppConfig;
use crate::selection::{ConversationKey, ReplyTarget, SearchSession, SelectionStore};
use anyhow::Result;
use ncm_catalog::{Catalog, LinkOptions, Track};
use ncm_channels::{ChannelAdapter, InboundMessage, MessageId, OutboundMessage};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

const SEARCH_FAILED_MESSAGE: &str = "❌ search failed, please try again later";
const LATE_REPLY_MESSAGE: &str = "⏰ reply timed out, please resend the command";
const EXPIRED_MESSAGE: &str = "⏰ selection timed out, please resend the command";

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub commands: Vec<String>,
    pub limit: u32,
    pub selection_ttl: Duration,
    pub link_options: LinkOptions,
}

impl EngineSettings {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            commands: cfg.command_prefixes(),
            limit: cfg.catalog.limit,
            selection_ttl: cfg.interaction.selection_ttl(),
            link_options: LinkOptions::new(cfg.catalog.level.clone(), cfg.catalog.cookie.clone()),
        }
    }
}

/// What an inbound message did. Only used for logging and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Ignored,
    Usage,
    NotFound,
    SearchFailed,
    Listed { candidates: usize },
    Resolved { track_id: String, linked: bool },
    TimedOut,
}

pub struct InteractionEngine {
    settings: EngineSettings,
    catalog: Arc<dyn Catalog>,
    store: Arc<SelectionStore>,
    channels: HashMap<String, Arc<dyn ChannelAdapter>>,
}

impl InteractionEngine {
    pub fn new(
        settings: EngineSettings,
        catalog: Arc<dyn Catalog>,
        store: Arc<SelectionStore>,
        channels: HashMap<String, Arc<dyn ChannelAdapter>>,
    ) -> Self {
        Self {
            settings,
            catalog,
            store,
            channels,
        }
    }

    pub fn store(&self) -> &Arc<SelectionStore> {
        &self.store
    }

    #[tracing::instrument(
        level = "info",
        skip_all,
        fields(channel_id = %inbound.channel_id, sender_id = %inbound.sender_id)
    )]
    pub async fn handle_inbound(&self, inbound: &InboundMessage) -> Result<Outcome> {
        let key = ConversationKey::of(inbound);

        if let Some(keyword) = commands::parse_search(&self.settings.commands, &inbound.content) {
            return self.start_search(key, inbound, keyword).await;
        }

        match self.store.get(&key) {
            Some(session) => self.resolve_selection(session, inbound).await,
            None => Ok(Outcome::Ignored),
        }
    }

    async fn start_search(
        &self,
        key: ConversationKey,
        inbound: &InboundMessage,
        keyword: &str,
    ) -> Result<Outcome> {
        let target = ReplyTarget::of(inbound);
        let reply_to = inbound.message_id.clone();

        if keyword.is_empty() {
            let usage = format!("usage: {} <keyword>", self.primary_command());
            self.reply(&target, usage, Some(reply_to)).await?;
            return Ok(Outcome::Usage);
        }

        let tracks = match self.catalog.search(keyword, self.settings.limit).await {
            Ok(tracks) => tracks,
            Err(e) => {
                if e.is_upstream_unavailable() {
                    tracing::warn!(%e, keyword, "catalog search failed");
                } else {
                    tracing::error!(%e, keyword, "catalog search failed");
                }
                self.reply(&target, SEARCH_FAILED_MESSAGE.to_string(), Some(reply_to))
                    .await?;
                return Ok(Outcome::SearchFailed);
            }
        };

        if tracks.is_empty() {
            let not_found = format!("❌ no songs found for \"{keyword}\"");
            self.reply(&target, not_found, Some(reply_to)).await?;
            return Ok(Outcome::NotFound);
        }

        let listing = render_listing(&tracks, self.settings.selection_ttl);
        let candidates = tracks.len();
        let session = SearchSession::new(key.clone(), tracks, inbound.sender_id.clone(), target);
        let session_id = session.id;
        if let Some(previous) = self.store.put(session.clone()) {
            tracing::debug!(superseded = %previous.id, "new search replaced pending selection");
        }

        if let Err(e) = self
            .reply(&session.reply_target, listing, Some(reply_to))
            .await
        {
            // No listing, no selection: drop the session we just stored.
            self.store.take_if(&key, session_id);
            return Err(e);
        }
        self.schedule_expiry(&session)?;

        tracing::info!(%session_id, candidates, "awaiting selection");
        Ok(Outcome::Listed { candidates })
    }

    async fn resolve_selection(
        &self,
        session: SearchSession,
        inbound: &InboundMessage,
    ) -> Result<Outcome> {
        if inbound.sender_id != session.owner {
            return Ok(Outcome::Ignored);
        }

        if session.is_expired_at(Instant::now(), self.settings.selection_ttl) {
            let Some(session) = self.store.take_if(&session.key, session.id) else {
                return Ok(Outcome::Ignored);
            };
            tracing::info!(session_id = %session.id, "selection reply arrived after expiry");
            self.reply(
                &session.reply_target,
                LATE_REPLY_MESSAGE.to_string(),
                Some(inbound.message_id.clone()),
            )
            .await?;
            return Ok(Outcome::TimedOut);
        }

        let Some(index) = commands::parse_selection(&inbound.content) else {
            return Ok(Outcome::Ignored);
        };
        if session.candidate(index).is_none() {
            return Ok(Outcome::Ignored);
        }
        let Some(session) = self.store.take_if(&session.key, session.id) else {
            return Ok(Outcome::Ignored);
        };
        let Some(track) = session.candidate(index) else {
            return Ok(Outcome::Ignored);
        };

        let link = self
            .catalog
            .fetch_direct_link(&track.id, &self.settings.link_options)
            .await;
        let linked = link.is_some();
        tracing::info!(session_id = %session.id, track_id = %track.id, linked, "selection resolved");

        self.reply(
            &session.reply_target,
            render_resolution(track, link.as_deref()),
            Some(inbound.message_id.clone()),
        )
        .await?;
        Ok(Outcome::Resolved {
            track_id: track.id.clone(),
            linked,
        })
    }

    fn schedule_expiry(&self, session: &SearchSession) -> Result<()> {
        let channel = self.channel(&session.reply_target)?;
        self.store.schedule_expiry(
            session.key.clone(),
            session.id,
            session.expires_at(self.settings.selection_ttl),
            move |expired| async move {
                let recipient = expired.reply_target.recipient_id.as_str();
                if let Err(e) = channel
                    .send(recipient, OutboundMessage::text(EXPIRED_MESSAGE))
                    .await
                {
                    tracing::warn!(%e, session_id = %expired.id, "failed to deliver timeout notice");
                }
            },
        );
        Ok(())
    }

    async fn reply(
        &self,
        target: &ReplyTarget,
        content: String,
        reply_to: Option<MessageId>,
    ) -> Result<()> {
        let channel = self.channel(target)?;
        let mut message = OutboundMessage::text(content);
        if let Some(id) = reply_to {
            message = message.in_reply_to(id);
        }
        channel.send(&target.recipient_id, message).await
    }

    fn channel(&self, target: &ReplyTarget) -> Result<Arc<dyn ChannelAdapter>> {
        self.channels
            .get(target.channel_id.as_str())
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("unknown channel: {}", target.channel_id))
    }

    fn primary_command(&self) -> &str {
        self.settings
            .commands
            .first()
            .map(String::as_str)
            .unwrap_or("/music")
    }
}

/// One `<n>. <title> - <artists> [<album>]` line per track.
pub fn render_candidates(tracks: &[Track]) -> String {
    tracks
        .iter()
        .enumerate()
        .map(|(i, track)| format!("{}. {track}", i + 1))
        .collect::<Vec<_>>()
        .join("\n")
}

/// The numbered candidates followed by the reply window.
fn render_listing(tracks: &[Track], ttl: Duration) -> String {
    format!("{}\nreply within {}s", render_candidates(tracks), ttl.as_secs())
}

fn render_resolution(track: &Track, link: Option<&str>) -> String {
    match link {
        Some(link) => format!("✅ {track}\ndirect link: {link}"),
        None => format!(
            "❌ failed to fetch the direct link for {} - {}",
            track.display_title(),
            track.display_artists()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use ncm_catalog::CatalogError;
    use ncm_channels::{SenderId, ThreadId};
    use std::sync::Mutex;
    use tokio::sync::mpsc;

    const TTL: Duration = Duration::from_secs(30);

    #[derive(Default)]
    struct FakeCatalog {
        results: Mutex<HashMap<String, Vec<Track>>>,
        links: Mutex<HashMap<String, String>>,
        fail_search: bool,
        link_requests: Mutex<Vec<String>>,
    }

    impl FakeCatalog {
        fn with_results(self, keyword: &str, tracks: Vec<Track>) -> Self {
            self.results
                .lock()
                .expect("lock")
                .insert(keyword.to_string(), tracks);
            self
        }

        fn with_link(self, track_id: &str, link: &str) -> Self {
            self.links
                .lock()
                .expect("lock")
                .insert(track_id.to_string(), link.to_string());
            self
        }

        fn link_requests(&self) -> Vec<String> {
            self.link_requests.lock().expect("lock").clone()
        }
    }

    #[async_trait]
    impl Catalog for FakeCatalog {
        async fn search(&self, keyword: &str, limit: u32) -> ncm_catalog::Result<Vec<Track>> {
            if self.fail_search {
                return Err(CatalogError::Upstream {
                    status: 503,
                    body: "down".to_string(),
                });
            }
            let mut tracks = self
                .results
                .lock()
                .expect("lock")
                .get(keyword)
                .cloned()
                .unwrap_or_default();
            tracks.truncate(limit as usize);
            Ok(tracks)
        }

        async fn fetch_direct_link(&self, track_id: &str, _options: &LinkOptions) -> Option<String> {
            self.link_requests
                .lock()
                .expect("lock")
                .push(track_id.to_string());
            self.links.lock().expect("lock").get(track_id).cloned()
        }
    }

    #[derive(Default)]
    struct RecordingChannel {
        sent: Mutex<Vec<(String, String)>>,
    }

    impl RecordingChannel {
        fn sent(&self) -> Vec<(String, String)> {
            self.sent.lock().expect("lock").clone()
        }

        fn texts(&self) -> Vec<String> {
            self.sent().into_iter().map(|(_, text)| text).collect()
        }
    }

    #[async_trait]
    impl ChannelAdapter for RecordingChannel {
        fn channel_id(&self) -> &str {
            "telegram"
        }

        async fn start(&self, _tx: mpsc::Sender<InboundMessage>) -> Result<()> {
            Ok(())
        }

        async fn send(&self, recipient_id: &str, message: OutboundMessage) -> Result<()> {
            self.sent
                .lock()
                .expect("lock")
                .push((recipient_id.to_string(), message.content));
            Ok(())
        }
    }

    struct BrokenChannel;

    #[async_trait]
    impl ChannelAdapter for BrokenChannel {
        fn channel_id(&self) -> &str {
            "telegram"
        }

        async fn start(&self, _tx: mpsc::Sender<InboundMessage>) -> Result<()> {
            Ok(())
        }

        async fn send(&self, _recipient_id: &str, _message: OutboundMessage) -> Result<()> {
            Err(anyhow::anyhow!("telegram sendMessage failed: 502"))
        }
    }

    fn track(id: &str, title: &str, artist: &str, album: &str) -> Track {
        Track {
            id: id.to_string(),
            title: title.to_string(),
            artists: vec![artist.to_string()],
            album: album.to_string(),
        }
    }

    fn yesterday_results() -> Vec<Track> {
        vec![
            track("1", "Yesterday", "Beatles", "Help!"),
            track("2", "Yesterday (Live)", "Beatles", "Anthology"),
        ]
    }

    fn build_engine(catalog: FakeCatalog) -> (InteractionEngine, Arc<FakeCatalog>, Arc<RecordingChannel>) {
        let catalog = Arc::new(catalog);
        let channel = Arc::new(RecordingChannel::default());
        let mut channels: HashMap<String, Arc<dyn ChannelAdapter>> = HashMap::new();
        channels.insert("telegram".to_string(), channel.clone());
        let settings = EngineSettings {
            commands: vec!["/music".to_string(), "下载音乐".to_string()],
            limit: 5,
            selection_ttl: TTL,
            link_options: LinkOptions::default(),
        };
        let engine = InteractionEngine::new(
            settings,
            catalog.clone(),
            Arc::new(SelectionStore::new()),
            channels,
        );
        (engine, catalog, channel)
    }

    fn message(sender: &str, chat: &str, content: &str) -> InboundMessage {
        InboundMessage {
            message_id: format!("{sender}-{content}").into(),
            channel_id: "telegram".into(),
            sender_id: SenderId::new(sender),
            thread_id: Some(ThreadId::new(chat)),
            is_group: true,
            content: content.to_string(),
            received_at: Utc::now(),
        }
    }

    async fn settle() {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn undeliverable_listing_leaves_no_pending_selection() {
        let catalog = Arc::new(FakeCatalog::default().with_results("Yesterday", yesterday_results()));
        let mut channels: HashMap<String, Arc<dyn ChannelAdapter>> = HashMap::new();
        channels.insert("telegram".to_string(), Arc::new(BrokenChannel));
        let engine = InteractionEngine::new(
            EngineSettings {
                commands: vec!["/music".to_string()],
                limit: 5,
                selection_ttl: TTL,
                link_options: LinkOptions::default(),
            },
            catalog,
            Arc::new(SelectionStore::new()),
            channels,
        );

        let result = engine
            .handle_inbound(&message("alice", "chat", "/music Yesterday"))
            .await;
        assert!(result.is_err());
        assert!(engine.store().is_empty());

        let outcome = engine
            .handle_inbound(&message("alice", "chat", "1"))
            .await
            .expect("reply");
        assert_eq!(outcome, Outcome::Ignored);
    }

    #[test]
    fn candidates_render_without_reply_window() {
        let rendered = render_candidates(&yesterday_results());
        assert_eq!(
            rendered,
            "1. Yesterday - Beatles [Help!]\n2. Yesterday (Live) - Beatles [Anthology]"
        );
        assert!(!rendered.contains("reply within"));
    }

    #[tokio::test(start_paused = true)]
    async fn yesterday_scenario_end_to_end() {
        let catalog = FakeCatalog::default()
            .with_results("Yesterday", yesterday_results())
            .with_link("1", "https://x/1.mp3");
        let (engine, catalog, channel) = build_engine(catalog);

        let outcome = engine
            .handle_inbound(&message("alice", "chat", "/music Yesterday"))
            .await
            .expect("search");
        assert_eq!(outcome, Outcome::Listed { candidates: 2 });
        assert_eq!(
            channel.texts(),
            vec![
                "1. Yesterday - Beatles [Help!]\n2. Yesterday (Live) - Beatles [Anthology]\nreply within 30s"
                    .to_string()
            ]
        );

        let outcome = engine
            .handle_inbound(&message("alice", "chat", "1"))
            .await
            .expect("select");
        assert_eq!(
            outcome,
            Outcome::Resolved {
                track_id: "1".to_string(),
                linked: true
            }
        );
        assert_eq!(catalog.link_requests(), vec!["1".to_string()]);
        assert_eq!(
            channel.texts()[1],
            "✅ Yesterday - Beatles [Help!]\ndirect link: https://x/1.mp3"
        );

        let outcome = engine
            .handle_inbound(&message("alice", "chat", "2"))
            .await
            .expect("after resolve");
        assert_eq!(outcome, Outcome::Ignored);

        tokio::time::advance(TTL + Duration::from_secs(1)).await;
        settle().await;
        assert_eq!(channel.sent().len(), 2, "no timeout notice after resolution");
        assert!(engine.store().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn every_index_resolves_to_listed_candidate() {
        let results: Vec<Track> = (1..=4)
            .map(|i| track(&format!("id{i}"), &format!("song {i}"), "a", "b"))
            .collect();
        for i in 1..=results.len() {
            let (engine, catalog, _channel) =
                build_engine(FakeCatalog::default().with_results("q", results.clone()));
            engine
                .handle_inbound(&message("alice", "chat", "/music q"))
                .await
                .expect("search");
            let outcome = engine
                .handle_inbound(&message("alice", "chat", &i.to_string()))
                .await
                .expect("select");
            assert_eq!(
                outcome,
                Outcome::Resolved {
                    track_id: format!("id{i}"),
                    linked: false
                }
            );
            assert_eq!(catalog.link_requests(), vec![format!("id{i}")]);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn zero_results_reply_not_found_once_without_session() {
        let (engine, _catalog, channel) = build_engine(FakeCatalog::default());

        let outcome = engine
            .handle_inbound(&message("alice", "chat", "下载音乐 nothing here"))
            .await
            .expect("search");
        assert_eq!(outcome, Outcome::NotFound);
        assert_eq!(
            channel.texts(),
            vec!["❌ no songs found for \"nothing here\"".to_string()]
        );
        assert!(engine.store().is_empty());

        tokio::time::advance(TTL * 2).await;
        settle().await;
        assert_eq!(channel.sent().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn search_failure_is_generic_and_creates_no_session() {
        let catalog = FakeCatalog {
            fail_search: true,
            ..FakeCatalog::default()
        };
        let (engine, _catalog, channel) = build_engine(catalog);

        let outcome = engine
            .handle_inbound(&message("alice", "chat", "/music Yesterday"))
            .await
            .expect("search");
        assert_eq!(outcome, Outcome::SearchFailed);
        assert_eq!(channel.texts(), vec![SEARCH_FAILED_MESSAGE.to_string()]);
        assert!(!channel.texts()[0].contains("503"));
        assert!(engine.store().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn empty_keyword_gets_usage() {
        let (engine, _catalog, channel) = build_engine(FakeCatalog::default());
        let outcome = engine
            .handle_inbound(&message("alice", "chat", "/music   "))
            .await
            .expect("usage");
        assert_eq!(outcome, Outcome::Usage);
        assert_eq!(channel.texts(), vec!["usage: /music <keyword>".to_string()]);
        assert!(engine.store().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn other_users_cannot_touch_the_session() {
        let catalog = FakeCatalog::default().with_results("Yesterday", yesterday_results());
        let (engine, catalog, channel) = build_engine(catalog);
        engine
            .handle_inbound(&message("alice", "chat", "/music Yesterday"))
            .await
            .expect("search");
        let before = engine
            .store()
            .get(&ConversationKey::new("telegram", "chat"))
            .expect("session");

        for text in ["1", "2", "hello"] {
            let outcome = engine
                .handle_inbound(&message("mallory", "chat", text))
                .await
                .expect("ignored");
            assert_eq!(outcome, Outcome::Ignored);
        }
        let after = engine
            .store()
            .get(&ConversationKey::new("telegram", "chat"))
            .expect("session still pending");
        assert_eq!(before.id, after.id);
        assert_eq!(channel.sent().len(), 1);
        assert!(catalog.link_requests().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn unrelated_and_out_of_range_replies_are_ignored() {
        let catalog = FakeCatalog::default().with_results("Yesterday", yesterday_results());
        let (engine, catalog, channel) = build_engine(catalog);
        engine
            .handle_inbound(&message("alice", "chat", "/music Yesterday"))
            .await
            .expect("search");

        for text in ["nice song", "0", "3", "-1", "1 please"] {
            let outcome = engine
                .handle_inbound(&message("alice", "chat", text))
                .await
                .expect("ignored");
            assert_eq!(outcome, Outcome::Ignored, "reply {text:?}");
        }
        assert_eq!(channel.sent().len(), 1);
        assert!(catalog.link_requests().is_empty());

        let outcome = engine
            .handle_inbound(&message("alice", "chat", "2"))
            .await
            .expect("select");
        assert!(matches!(outcome, Outcome::Resolved { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn sessions_are_scoped_per_conversation() {
        let catalog = FakeCatalog::default().with_results("Yesterday", yesterday_results());
        let (engine, _catalog, _channel) = build_engine(catalog);
        engine
            .handle_inbound(&message("alice", "chat-a", "/music Yesterday"))
            .await
            .expect("search");

        let outcome = engine
            .handle_inbound(&message("alice", "chat-b", "1"))
            .await
            .expect("other chat");
        assert_eq!(outcome, Outcome::Ignored);
        assert_eq!(engine.store().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_link_still_consumes_session() {
        let catalog = FakeCatalog::default().with_results("Yesterday", yesterday_results());
        let (engine, _catalog, channel) = build_engine(catalog);
        engine
            .handle_inbound(&message("alice", "chat", "/music Yesterday"))
            .await
            .expect("search");

        let outcome = engine
            .handle_inbound(&message("alice", "chat", "2"))
            .await
            .expect("select");
        assert_eq!(
            outcome,
            Outcome::Resolved {
                track_id: "2".to_string(),
                linked: false
            }
        );
        assert_eq!(
            channel.texts()[1],
            "❌ failed to fetch the direct link for Yesterday (Live) - Beatles"
        );
        assert!(engine.store().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn timer_expiry_notifies_once_and_blocks_later_replies() {
        let catalog = FakeCatalog::default().with_results("Yesterday", yesterday_results());
        let (engine, catalog, channel) = build_engine(catalog);
        engine
            .handle_inbound(&message("alice", "chat", "/music Yesterday"))
            .await
            .expect("search");

        tokio::time::advance(TTL + Duration::from_secs(1)).await;
        settle().await;
        assert_eq!(channel.sent().len(), 2);
        assert_eq!(channel.sent()[1], ("chat".to_string(), EXPIRED_MESSAGE.to_string()));
        assert!(engine.store().is_empty());

        let outcome = engine
            .handle_inbound(&message("alice", "chat", "1"))
            .await
            .expect("late");
        assert_eq!(outcome, Outcome::Ignored);
        assert_eq!(channel.sent().len(), 2);
        assert!(catalog.link_requests().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn late_reply_without_timer_times_out_once() {
        let (engine, catalog, channel) = build_engine(FakeCatalog::default());
        let inbound = message("alice", "chat", "/music x");
        let session = SearchSession::new(
            ConversationKey::of(&inbound),
            yesterday_results(),
            inbound.sender_id.clone(),
            ReplyTarget::of(&inbound),
        );
        engine.store().put(session);

        tokio::time::advance(TTL + Duration::from_secs(1)).await;

        let outcome = engine
            .handle_inbound(&message("alice", "chat", "1"))
            .await
            .expect("late");
        assert_eq!(outcome, Outcome::TimedOut);
        assert_eq!(channel.texts(), vec![LATE_REPLY_MESSAGE.to_string()]);
        assert!(engine.store().is_empty());
        assert!(catalog.link_requests().is_empty());

        let outcome = engine
            .handle_inbound(&message("alice", "chat", "1"))
            .await
            .expect("after timeout");
        assert_eq!(outcome, Outcome::Ignored);
        assert_eq!(channel.sent().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn late_reply_from_other_user_is_still_ignored() {
        let (engine, _catalog, channel) = build_engine(FakeCatalog::default());
        let inbound = message("alice", "chat", "/music x");
        engine.store().put(SearchSession::new(
            ConversationKey::of(&inbound),
            yesterday_results(),
            inbound.sender_id.clone(),
            ReplyTarget::of(&inbound),
        ));
        tokio::time::advance(TTL + Duration::from_secs(1)).await;

        let outcome = engine
            .handle_inbound(&message("bob", "chat", "1"))
            .await
            .expect("ignored");
        assert_eq!(outcome, Outcome::Ignored);
        assert!(channel.sent().is_empty());
        assert_eq!(engine.store().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn new_search_silently_supersedes_pending_one() {
        let catalog = FakeCatalog::default()
            .with_results("Yesterday", yesterday_results())
            .with_results("Help", vec![track("9", "Help!", "Beatles", "Help!")]);
        let (engine, catalog, channel) = build_engine(catalog);

        engine
            .handle_inbound(&message("alice", "chat", "/music Yesterday"))
            .await
            .expect("first search");
        tokio::time::advance(Duration::from_secs(20)).await;
        engine
            .handle_inbound(&message("bob", "chat", "/music Help"))
            .await
            .expect("second search");
        assert_eq!(channel.sent().len(), 2, "supersede sends no notice");

        // The first session's window has passed; its timer must not evict the new one.
        tokio::time::advance(Duration::from_secs(15)).await;
        settle().await;
        assert_eq!(channel.sent().len(), 2);

        let outcome = engine
            .handle_inbound(&message("alice", "chat", "1"))
            .await
            .expect("old owner");
        assert_eq!(outcome, Outcome::Ignored);

        let outcome = engine
            .handle_inbound(&message("bob", "chat", "1"))
            .await
            .expect("new owner");
        assert_eq!(
            outcome,
            Outcome::Resolved {
                track_id: "9".to_string(),
                linked: false
            }
        );
        assert_eq!(catalog.link_requests(), vec!["9".to_string()]);

        tokio::time::advance(TTL).await;
        settle().await;
        assert_eq!(channel.sent().len(), 3);
    }

    #[test]
    fn listing_numbers_from_one_and_names_the_window() {
        let listing = render_listing(&yesterday_results(), Duration::from_secs(45));
        let lines: Vec<&str> = listing.lines().collect();
        assert_eq!(lines[0], "1. Yesterday - Beatles [Help!]");
        assert_eq!(lines[1], "2. Yesterday (Live) - Beatles [Anthology]");
        assert_eq!(lines[2], "reply within 45s");
    }
}
