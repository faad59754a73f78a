pub mod telegram;

use anyhow::Result;
use async_trait::async_trait;

/// Who sent a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sender {
    pub id: u64,
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: Option<String>,
}

impl Sender {
    /// Human-readable label like "Alice Jones (@alice)", or just the name
    /// when the user has no public username.
    pub fn label(&self) -> String {
        let name = [Some(self.first_name.as_str()), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        match &self.username {
            Some(username) => format!("{} (@{})", name, username),
            None => name,
        }
    }
}

/// The message an incoming message replies to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepliedMessage {
    /// Absent for messages posted on behalf of a channel
    pub sender: Option<Sender>,
    /// Text or caption, or a `[<kind> message]` placeholder for media
    pub text: String,
}

/// A message received from the chat platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    pub chat_id: i64,
    pub sender: Option<Sender>,
    /// The message text; empty when the message carries none
    pub text: String,
    pub reply_to: Option<RepliedMessage>,
}

/// Outbound side of a chat platform
#[async_trait]
pub trait ChatSink: Send + Sync {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<()>;

    /// Show the "typing..." indicator in a chat
    async fn send_typing(&self, chat_id: i64) -> Result<()>;
}
