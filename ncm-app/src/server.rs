//! Process wiring: config → catalog → channels → engine → gateway loop.

use crate::config::AppConfig;
use crate::engine::{EngineSettings, InteractionEngine, render_candidates};
use crate::gateway::Gateway;
use crate::selection::SelectionStore;
use anyhow::Result;
use ncm_catalog::{ApiGateway, Catalog, CatalogClient, LinkOptions, Track};
use ncm_channels::{ChannelAdapter, ConsoleAdapter, InboundMessage, TelegramAdapter};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const INBOUND_QUEUE_CAPACITY: usize = 256;
const GATEWAY_DRAIN_TIMEOUT: Duration = Duration::from_secs(15);

fn build_catalog(cfg: &AppConfig) -> Result<CatalogClient> {
    let gateway = ApiGateway::new(&cfg.catalog.api_base_url)?;
    Ok(CatalogClient::new(gateway).with_token(cfg.catalog.token.clone()))
}

fn build_channels(cfg: &AppConfig) -> Result<HashMap<String, Arc<dyn ChannelAdapter>>> {
    let mut channels: HashMap<String, Arc<dyn ChannelAdapter>> = HashMap::new();
    if cfg.channels.telegram.enabled {
        let telegram = TelegramAdapter::new(&cfg.channels.telegram.bot_token)?;
        channels.insert(telegram.channel_id().to_string(), Arc::new(telegram));
    }
    if cfg.channels.console.enabled {
        let console = ConsoleAdapter::new(&cfg.channels.console.sender_id);
        channels.insert(console.channel_id().to_string(), Arc::new(console));
    }
    Ok(channels)
}

#[tracing::instrument(level = "info", skip_all)]
pub async fn serve(config_path: Option<PathBuf>) -> Result<()> {
    let cfg = AppConfig::load(config_path).await?;
    let catalog: Arc<dyn Catalog> = Arc::new(build_catalog(&cfg)?);
    let channels = build_channels(&cfg)?;
    if channels.is_empty() {
        return Err(anyhow::anyhow!(
            "no channels enabled; enable channels.telegram or channels.console"
        ));
    }

    let (inbound_tx, inbound_rx) = mpsc::channel::<InboundMessage>(INBOUND_QUEUE_CAPACITY);
    for (id, channel) in &channels {
        channel
            .start(inbound_tx.clone())
            .await
            .map_err(|e| anyhow::anyhow!("start channel {id}: {e}"))?;
    }
    drop(inbound_tx);

    let store = Arc::new(SelectionStore::new());
    let engine = Arc::new(InteractionEngine::new(
        EngineSettings::from_config(&cfg),
        catalog,
        store.clone(),
        channels.clone(),
    ));
    let gateway = Arc::new(Gateway::new(engine, inbound_rx));
    let shutdown = CancellationToken::new();
    let mut gateway_handle = gateway.start(shutdown.child_token());
    tracing::info!(
        channel_count = channels.len(),
        channels = ?channels.keys().collect::<Vec<_>>(),
        api_base_url = %cfg.catalog.api_base_url,
        "gateway started"
    );

    tokio::select! {
        _ = shutdown_signal(shutdown.clone()) => {}
        res = &mut gateway_handle => {
            if let Err(e) = res {
                tracing::error!(%e, "gateway task failed");
            }
            return Ok(());
        }
    }

    if tokio::time::timeout(GATEWAY_DRAIN_TIMEOUT, gateway_handle)
        .await
        .is_err()
    {
        tracing::warn!(?GATEWAY_DRAIN_TIMEOUT, "gateway did not stop in time");
    }
    if !store.is_empty() {
        tracing::info!(pending = store.len(), "dropping pending selections on shutdown");
    }
    tracing::info!("shutdown complete");
    Ok(())
}

pub async fn doctor(config_path: Option<PathBuf>) -> Result<()> {
    let cfg = AppConfig::load(config_path).await?;
    let catalog = build_catalog(&cfg)?;
    let channels = build_channels(&cfg)?;
    tracing::info!(
        api_base_url = %catalog.gateway().base_url(),
        min_interval = ?catalog.gateway().min_interval(),
        limit = cfg.catalog.limit,
        level = ?cfg.catalog.level,
        cookie_configured = cfg.catalog.cookie.is_some(),
        token_configured = cfg.catalog.token.is_some(),
        selection_ttl = ?cfg.interaction.selection_ttl(),
        commands = ?cfg.command_prefixes(),
        channels = ?channels.keys().collect::<Vec<_>>(),
        "config ok"
    );
    if channels.is_empty() {
        tracing::warn!("no channels enabled; serve will refuse to start");
    }
    Ok(())
}

pub async fn search_once(config_path: Option<PathBuf>, keyword: &str) -> Result<()> {
    let cfg = AppConfig::load(config_path).await?;
    let catalog = build_catalog(&cfg)?;
    let tracks = catalog.search(keyword, cfg.catalog.limit).await?;
    println!("{}", search_report(keyword, &tracks));
    Ok(())
}

/// Candidate lines plus their ids, for `link <id>` follow-ups. There is no
/// session behind a one-shot search, so no reply window is shown.
fn search_report(keyword: &str, tracks: &[Track]) -> String {
    if tracks.is_empty() {
        return format!("no songs found for {keyword:?}");
    }
    let ids: Vec<String> = tracks
        .iter()
        .enumerate()
        .map(|(i, track)| format!("#{} id={}", i + 1, track.id))
        .collect();
    format!("{}\n{}", render_candidates(tracks), ids.join("\n"))
}

pub async fn link_once(config_path: Option<PathBuf>, track_id: &str) -> Result<()> {
    let cfg = AppConfig::load(config_path).await?;
    let catalog = build_catalog(&cfg)?;
    let options = LinkOptions::new(cfg.catalog.level.clone(), cfg.catalog.cookie.clone());
    match catalog.fetch_direct_link(track_id, &options).await {
        Some(link) => {
            println!("{link}");
            Ok(())
        }
        None => Err(anyhow::anyhow!("no direct link available for track {track_id}")),
    }
}

async fn shutdown_signal(shutdown: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let mut terminate = match signal(SignalKind::terminate()) {
            Ok(sig) => sig,
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler; falling back to ctrl_c only");
                if let Err(ctrlc_err) = tokio::signal::ctrl_c().await {
                    tracing::error!(error = %ctrlc_err, "failed to await ctrl-c signal");
                }
                shutdown.cancel();
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::warn!("received ctrl-c; beginning graceful shutdown");
            }
            _ = terminate.recv() => {
                tracing::warn!("received SIGTERM; beginning graceful shutdown");
            }
        }
    }
    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to await ctrl-c signal");
        } else {
            tracing::warn!("received ctrl-c; beginning graceful shutdown");
        }
    }
    shutdown.cancel();
}
