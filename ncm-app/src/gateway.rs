//! Inbound multiplexer: all channel adapters feed into a single queue that
//! is drained into the interaction engine in arrival order.

use crate::engine::InteractionEngine;
use ncm_channels::InboundMessage;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub struct Gateway {
    engine: Arc<InteractionEngine>,
    inbound_rx: Mutex<mpsc::Receiver<InboundMessage>>,
}

impl Gateway {
    pub fn new(engine: Arc<InteractionEngine>, inbound_rx: mpsc::Receiver<InboundMessage>) -> Self {
        Self {
            engine,
            inbound_rx: Mutex::new(inbound_rx),
        }
    }

    pub fn start(self: Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.run_loop(shutdown).await;
        })
    }

    #[tracing::instrument(level = "info", skip_all)]
    async fn run_loop(&self, shutdown: CancellationToken) {
        let mut rx = self.inbound_rx.lock().await;
        loop {
            let inbound = tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("gateway loop stopping on shutdown");
                    return;
                }
                msg = rx.recv() => msg,
            };
            let Some(inbound) = inbound else {
                tracing::info!("all inbound channels closed; gateway loop exiting");
                return;
            };

            match self.engine.handle_inbound(&inbound).await {
                Ok(outcome) => tracing::debug!(?outcome, "inbound handled"),
                Err(e) => tracing::warn!(%e, "handle_inbound failed"),
            }
        }
    }
}
