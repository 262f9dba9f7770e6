// 🤖 Bot - command surface over the messaging channel
// `/check <identity>` answers a status query, `/start` and `/help` print
// usage. Anything malformed gets usage text back, never a crash.

use crate::app::App;
use crate::error::Result;
use crate::telegram::{Messenger, TelegramClient, Update};
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub const USAGE: &str = "Membership status bot\n\n\
    /check <email or telegram username> - show membership status and expiry\n\
    /help - show this message";

pub const CHECK_USAGE: &str = "Usage: /check <email or telegram username>";

/// Pause after a failed getUpdates call before polling again
const RETRY_DELAY: Duration = Duration::from_secs(5);

// ============================================================================
// COMMANDS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Check(String),
    /// `/check` without an identity
    CheckUsage,
    Help,
    Unknown(String),
}

impl Command {
    /// Parse message text; `None` when the text is not a command at all
    ///
    /// Accepts the `/check@BotName` form Telegram uses in group chats.
    pub fn parse(text: &str) -> Option<Command> {
        let text = text.trim();
        let body = text.strip_prefix('/')?;

        let (head, rest) = match body.split_once(char::is_whitespace) {
            Some((head, rest)) => (head, rest.trim()),
            None => (body, ""),
        };
        let name = head.split('@').next().unwrap_or("").to_lowercase();

        let command = match name.as_str() {
            "check" if rest.is_empty() => Command::CheckUsage,
            "check" => Command::Check(rest.to_string()),
            "start" | "help" => Command::Help,
            _ => Command::Unknown(name),
        };
        Some(command)
    }
}

/// Reply text for a message, or `None` for non-command chatter
pub async fn reply_to(app: &App, text: &str) -> Option<String> {
    let reply = match Command::parse(text)? {
        Command::Check(query) => app.check(&query).await,
        Command::CheckUsage => CHECK_USAGE.to_string(),
        Command::Help => USAGE.to_string(),
        Command::Unknown(name) => {
            debug!(command = %name, "Unknown command");
            USAGE.to_string()
        }
    };
    Some(reply)
}

/// Answer one incoming update through `messenger`
///
/// Send failures are logged; the caller keeps going.
pub async fn handle_update(app: &App, messenger: &dyn Messenger, update: &Update) {
    let Some(message) = &update.message else {
        return;
    };
    let Some(text) = message.text.as_deref() else {
        return;
    };
    let Some(reply) = reply_to(app, text).await else {
        return;
    };

    let chat_id = message.chat.id.to_string();
    if let Err(e) = messenger.send_text(&chat_id, &reply).await {
        error!(chat = %chat_id, error = %e, "Failed to send reply");
    }
}

// ============================================================================
// LONG POLLING
// ============================================================================

/// One getUpdates round; returns the offset for the next round
pub async fn poll_once(
    app: &App,
    telegram: &TelegramClient,
    offset: Option<i64>,
    timeout_secs: u64,
) -> Result<Option<i64>> {
    let updates = telegram.get_updates(offset, timeout_secs).await?;

    let mut next = offset;
    for update in &updates {
        next = Some(update.update_id + 1);
        handle_update(app, telegram, update).await;
    }
    Ok(next)
}

/// Poll forever; transport errors are logged and retried
pub async fn run_polling(app: &App, telegram: &TelegramClient, timeout_secs: u64) {
    info!("Bot polling started");
    let mut offset = None;

    loop {
        match poll_once(app, telegram, offset, timeout_secs).await {
            Ok(next) => offset = next,
            Err(e) => {
                warn!(error = %e, "Polling failed, retrying");
                tokio::time::sleep(RETRY_DELAY).await;
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
