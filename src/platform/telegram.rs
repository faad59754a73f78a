use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{ChatAction, User};
use tracing::{debug, info};

use crate::platform::{ChatSink, IncomingMessage, RepliedMessage, Sender};
use crate::relay::{BotIdentity, Relay};

/// Sends relay output through the Bot API
pub struct TelegramSink {
    bot: Bot,
}

impl TelegramSink {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl ChatSink for TelegramSink {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        self.bot
            .send_message(ChatId(chat_id), text.to_string())
            .await
            .with_context(|| format!("Failed to send message to chat {}", chat_id))?;
        Ok(())
    }

    async fn send_typing(&self, chat_id: i64) -> Result<()> {
        self.bot
            .send_chat_action(ChatId(chat_id), ChatAction::Typing)
            .await
            .with_context(|| format!("Failed to send chat action to chat {}", chat_id))?;
        Ok(())
    }
}

/// Ask Telegram who we are
pub async fn fetch_identity(bot: &Bot) -> Result<BotIdentity> {
    let me = bot
        .get_me()
        .await
        .context("Failed to call getMe, check BOT_TOKEN")?;
    let username = me
        .user
        .username
        .as_deref()
        .context("Bot account has no username")?;
    Ok(BotIdentity::new(me.user.id.0, username, &me.user.first_name))
}

/// Run the long-polling dispatcher until Ctrl-C
pub async fn run(bot: Bot, relay: Arc<Relay>) -> Result<()> {
    info!("Starting Telegram dispatcher...");

    let handler = Update::filter_message()
        .filter(|msg: Message| msg.chat.is_group() || msg.chat.is_supergroup())
        .endpoint(handle_message);

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![relay])
        .default_handler(|upd| async move {
            debug!("Unhandled update: {:?}", upd.id);
        })
        .error_handler(LoggingErrorHandler::with_custom_text("telegram"))
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

async fn handle_message(bot: Bot, msg: Message, relay: Arc<Relay>) -> ResponseResult<()> {
    let incoming = to_incoming(&msg);
    let sink = TelegramSink::new(bot);

    let outcome = relay.handle(&incoming, &sink).await;
    debug!("Message {:?} in chat {}: {:?}", msg.id, msg.chat.id.0, outcome);

    Ok(())
}

fn to_sender(user: &User) -> Sender {
    Sender {
        id: user.id.0,
        first_name: user.first_name.clone(),
        last_name: user.last_name.clone(),
        username: user.username.clone(),
    }
}

fn to_incoming(msg: &Message) -> IncomingMessage {
    IncomingMessage {
        chat_id: msg.chat.id.0,
        sender: msg.from.as_ref().map(to_sender),
        text: msg.text().or(msg.caption()).unwrap_or_default().to_string(),
        reply_to: msg.reply_to_message().map(|replied| RepliedMessage {
            sender: replied.from.as_ref().map(to_sender),
            text: summary_text(replied),
        }),
    }
}

/// Text or caption, or a placeholder naming the kind of media
fn summary_text(msg: &Message) -> String {
    if let Some(text) = msg.text().or(msg.caption()) {
        return text.to_string();
    }

    let kind = if msg.photo().is_some() {
        "photo"
    } else if msg.video().is_some() {
        "video"
    } else if msg.animation().is_some() {
        "animation"
    } else if msg.sticker().is_some() {
        "sticker"
    } else if msg.voice().is_some() {
        "voice"
    } else if msg.audio().is_some() {
        "audio"
    } else if msg.document().is_some() {
        "document"
    } else {
        "non-text"
    };
    format!("[{} message]", kind)
}
