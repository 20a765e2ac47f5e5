//! Channel adapters for ncm-directlink.
//!
//! Adapters are pure I/O: they convert platform messages to/from
//! `InboundMessage` / `OutboundMessage`.

mod console;
mod telegram;
mod traits;
mod types;

pub use console::ConsoleAdapter;
pub use telegram::TelegramAdapter;
pub use traits::ChannelAdapter;
pub use types::{ChannelId, InboundMessage, MessageId, OutboundMessage, SenderId, ThreadId};
