use crate::types::{InboundMessage, OutboundMessage};
use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

#[async_trait]
pub trait ChannelAdapter: Send + Sync {
    /// Unique channel identifier: "telegram", "console".
    fn channel_id(&self) -> &str;

    /// Start receiving messages. Push to tx for each inbound message.
    async fn start(&self, tx: mpsc::Sender<InboundMessage>) -> Result<()>;

    /// Send a message to a specific chat on this platform.
    ///
    /// Must be callable from detached tasks, not just from the handler of
    /// the message being answered.
    async fn send(&self, recipient_id: &str, message: OutboundMessage) -> Result<()>;
}
