//! Classification of inbound chat text into bot commands and free text

use std::fmt;

/// A bot command sent as `/name` or `/name@botname`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotCommand {
    /// Static usage instructions (`/help`, also `/start`)
    Help,
    /// Begin the guided dialogue
    Workflow,
    /// Abandon the dialogue
    Cancel,
    /// Any other slash command; never treated as free text
    Unknown(String),
}

impl fmt::Display for BotCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BotCommand::Help => write!(f, "help"),
            BotCommand::Workflow => write!(f, "workflow"),
            BotCommand::Cancel => write!(f, "cancel"),
            BotCommand::Unknown(name) => write!(f, "{name}"),
        }
    }
}

/// What an inbound message means before any session is consulted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Command(BotCommand),
    Text(String),
}

/// Parse a message body
///
/// A message is a command when it starts with `/`. The command name ends at
/// the first whitespace or `@` (Telegram appends `@botname` in group chats);
/// anything after the name is ignored. Everything else is free text and is
/// passed through untouched.
pub fn parse(text: &str) -> Input {
    let Some(rest) = text.strip_prefix('/') else {
        return Input::Text(text.to_string());
    };

    let name = rest
        .split(|c: char| c.is_whitespace() || c == '@')
        .next()
        .unwrap_or_default();

    let command = match name {
        "help" | "start" => BotCommand::Help,
        "workflow" => BotCommand::Workflow,
        "cancel" => BotCommand::Cancel,
        other => BotCommand::Unknown(other.to_string()),
    };
    Input::Command(command)
}

/// Reply to `/help`
pub const HELP_TEXT: &str = "Send /workflow to start working with the bot.\n\
Follow the bots instructions:\n\
1. Choose the target branch for workflow\n\
2. Choose the workflow mode (create or delete infrastructure)\n\
3. Choose version of the app by replying to the bot \
(either version or \"latest\" can be used).";
