use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::config::RelayConfig;
use crate::llm::{ChatMessage, Completion, CompletionRequest};
use crate::platform::{ChatSink, IncomingMessage, RepliedMessage};

/// Telegram rejects messages longer than this many characters
pub const MAX_REPLY_LEN: usize = 4096;

pub const FALLBACK_REPLY: &str =
    "Sorry, something went wrong while talking to Grok. Please try again later.";

const EMPTY_REPLY: &str = "(empty response)";

/// Who the bot is, fetched once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotIdentity {
    pub id: u64,
    /// Lower-cased `@username`
    pub handle: String,
    pub display_name: String,
}

impl BotIdentity {
    pub fn new(id: u64, username: &str, first_name: &str) -> Self {
        let display_name = if first_name.trim().is_empty() {
            "Bot".to_string()
        } else {
            first_name.to_string()
        };
        Self {
            id,
            handle: format!("@{}", username.trim_start_matches('@').to_lowercase()),
            display_name,
        }
    }
}

/// What the relay did with a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Not addressed to the bot, or nothing to answer
    Ignored,
    /// Bare mention, a usage hint was sent
    Hinted,
    /// The completion was relayed to the chat
    Replied,
    /// The completion failed and the fallback notice was sent
    Failed,
}

/// Turns messages that mention the bot into Grok completions and posts the
/// answer back into the same chat. Holds no per-chat state, so one instance
/// is shared by every handler task.
pub struct Relay {
    completion: Arc<dyn Completion>,
    identity: BotIdentity,
    system_prompt: String,
    config: RelayConfig,
}

impl Relay {
    pub fn new(
        completion: Arc<dyn Completion>,
        identity: BotIdentity,
        system_prompt: String,
        config: RelayConfig,
    ) -> Self {
        Self {
            completion,
            identity,
            system_prompt,
            config,
        }
    }

    /// Handle one inbound message. Never fails: API errors are logged and
    /// at most one message is sent back to the chat.
    pub async fn handle(&self, message: &IncomingMessage, sink: &dyn ChatSink) -> Outcome {
        if message.text.trim().is_empty() {
            return Outcome::Ignored;
        }

        let mentioned = contains_handle(&message.text, &self.identity.handle);
        if !mentioned && !self.replies_to_bot(message) {
            return Outcome::Ignored;
        }

        let chat_id = message.chat_id;
        let prompt = if mentioned {
            strip_handle(&message.text, &self.identity.handle)
        } else {
            message.text.trim().to_string()
        };

        if prompt.is_empty() {
            let hint = format!(
                "Add a prompt after mentioning me, e.g. {} what's up?",
                self.identity.handle
            );
            self.send(chat_id, &hint, sink).await;
            return Outcome::Hinted;
        }

        info!(
            "Prompt in chat {} from {}: {}",
            chat_id,
            message
                .sender
                .as_ref()
                .map(|s| s.id.to_string())
                .unwrap_or_else(|| "unknown".to_string()),
            prompt
        );

        let replied_line = message
            .reply_to
            .as_ref()
            .map(|reply| self.summarize(reply));

        if let Err(e) = sink.send_typing(chat_id).await {
            debug!("Failed to send typing indicator to chat {}: {:#}", chat_id, e);
        }

        let request = self.build_request(&prompt, replied_line.as_deref());

        match self.completion.complete(&request).await {
            Ok(answer) => {
                let answer = if answer.trim().is_empty() {
                    warn!("Grok returned an empty answer for chat {}", chat_id);
                    EMPTY_REPLY.to_string()
                } else {
                    truncate_reply(&answer, MAX_REPLY_LEN)
                };
                debug!("Replying to chat {} with {} chars", chat_id, answer.chars().count());
                self.send(chat_id, &answer, sink).await;
                Outcome::Replied
            }
            Err(e) => {
                error!("Completion failed for chat {}: {:#}", chat_id, e);
                self.send(chat_id, FALLBACK_REPLY, sink).await;
                Outcome::Failed
            }
        }
    }

    fn replies_to_bot(&self, message: &IncomingMessage) -> bool {
        message
            .reply_to
            .as_ref()
            .and_then(|reply| reply.sender.as_ref())
            .is_some_and(|sender| sender.id == self.identity.id)
    }

    /// One-line summary of a replied-to message, e.g. `> Alice (@alice): hi`.
    fn summarize(&self, reply: &RepliedMessage) -> String {
        let label = match &reply.sender {
            Some(sender) if sender.id == self.identity.id => {
                format!("{} (you)", self.identity.display_name)
            }
            Some(sender) => sender.label(),
            None => "Unknown".to_string(),
        };
        let text = snippet(&reply.text, self.config.max_snippet_len);
        format!("> {}: {}", label, text)
    }

    fn build_request(&self, prompt: &str, replied_line: Option<&str>) -> CompletionRequest {
        let mut blocks = Vec::with_capacity(2);
        if let Some(line) = replied_line {
            blocks.push(format!("Replied message:\n{}", line));
        }
        blocks.push(format!("User prompt:\n{}", prompt));

        CompletionRequest {
            messages: vec![
                ChatMessage::system(self.system_prompt.clone()),
                ChatMessage::user(blocks.join("\n\n")),
            ],
        }
    }

    async fn send(&self, chat_id: i64, text: &str, sink: &dyn ChatSink) {
        if let Err(e) = sink.send_message(chat_id, text).await {
            error!("Failed to send message to chat {}: {:#}", chat_id, e);
        }
    }
}

/// Byte offsets of every case-insensitive occurrence of an ASCII handle.
fn handle_matches<'a>(text: &'a str, handle: &'a str) -> impl Iterator<Item = usize> + 'a {
    text.char_indices().map(|(i, _)| i).filter(move |&i| {
        text.get(i..i + handle.len())
            .is_some_and(|candidate| candidate.eq_ignore_ascii_case(handle))
    })
}

fn contains_handle(text: &str, handle: &str) -> bool {
    handle_matches(text, handle).next().is_some()
}

/// Remove every occurrence of the handle and trim what is left.
fn strip_handle(text: &str, handle: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for start in handle_matches(text, handle) {
        if start < cursor {
            continue;
        }
        out.push_str(&text[cursor..start]);
        cursor = start + handle.len();
    }
    out.push_str(&text[cursor..]);
    out.trim().to_string()
}

/// Flatten to one line and cap at `max_len` characters.
fn snippet(text: &str, max_len: usize) -> String {
    let flat = text.replace(['\r', '\n'], " ");
    if flat.chars().count() <= max_len {
        return flat;
    }
    let mut cut: String = flat.chars().take(max_len.saturating_sub(1)).collect();
    cut.push('…');
    cut
}

/// Cut a reply to Telegram's length limit on a character boundary.
fn truncate_reply(text: &str, max_len: usize) -> String {
    match text.char_indices().nth(max_len) {
        None => text.to_string(),
        Some(_) => {
            let mut cut: String = text.chars().take(max_len.saturating_sub(1)).collect();
            cut.push('…');
            cut
        }
    }
}
