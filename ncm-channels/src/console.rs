use crate::traits::ChannelAdapter;
use crate::types::{InboundMessage, OutboundMessage};
use anyhow::Result;
use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

const CONSOLE_CHANNEL_ID: &str = "console";
const CONSOLE_THREAD_ID: &str = "console";

/// Local terminal channel: every stdin line is a message from one fixed
/// sender, replies are printed to stdout.
#[derive(Clone)]
pub struct ConsoleAdapter {
    sender_id: String,
    next_message_id: Arc<AtomicU64>,
}

impl ConsoleAdapter {
    pub fn new(sender_id: &str) -> Self {
        Self {
            sender_id: sender_id.to_string(),
            next_message_id: Arc::new(AtomicU64::new(1)),
        }
    }

    async fn pump_lines<R>(&self, reader: R, tx: mpsc::Sender<InboundMessage>) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await? {
            let Some(inbound) = self.build_inbound(&line) else {
                continue;
            };
            if tx.send(inbound).await.is_err() {
                break;
            }
        }
        tracing::info!("console input closed");
        Ok(())
    }

    fn build_inbound(&self, line: &str) -> Option<InboundMessage> {
        let content = line.trim();
        if content.is_empty() {
            return None;
        }
        let id = self.next_message_id.fetch_add(1, Ordering::Relaxed);
        Some(InboundMessage {
            message_id: format!("console:{id}").into(),
            channel_id: CONSOLE_CHANNEL_ID.into(),
            sender_id: self.sender_id.as_str().into(),
            thread_id: Some(CONSOLE_THREAD_ID.into()),
            is_group: false,
            content: content.to_string(),
            received_at: Utc::now(),
        })
    }
}

#[async_trait::async_trait]
impl ChannelAdapter for ConsoleAdapter {
    fn channel_id(&self) -> &str {
        CONSOLE_CHANNEL_ID
    }

    async fn start(&self, tx: mpsc::Sender<InboundMessage>) -> Result<()> {
        let adapter = self.clone();
        tokio::spawn(async move {
            let stdin = BufReader::new(tokio::io::stdin());
            if let Err(e) = adapter.pump_lines(stdin, tx).await {
                tracing::error!(%e, "console reader exited");
            }
        });
        Ok(())
    }

    async fn send(&self, _recipient_id: &str, message: OutboundMessage) -> Result<()> {
        println!("{}", message.content);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lines_become_messages_from_fixed_sender() {
        let adapter = ConsoleAdapter::new("me");
        let (tx, mut rx) = mpsc::channel(8);
        let input: &[u8] = b"/music Yesterday\n\n   \n1\n";

        adapter
            .pump_lines(BufReader::new(input), tx)
            .await
            .expect("pump");

        let first = rx.recv().await.expect("first");
        let second = rx.recv().await.expect("second");
        assert!(rx.recv().await.is_none());

        assert_eq!(first.content, "/music Yesterday");
        assert_eq!(second.content, "1");
        assert_eq!(first.sender_id.as_str(), "me");
        assert_eq!(first.reply_recipient(), "console");
        assert_ne!(first.message_id, second.message_id);
    }
}
