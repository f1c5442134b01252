//! Parsing of prefixed chat commands such as `!buy 50 discord.gg/abc en`.

use std::{fmt, num::NonZeroU64};

use crate::client::Language;

/// A command a user can issue in chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Register,
    Coins,
    Daily,
    Farm,
    Buy {
        coins: NonZeroU64,
        invite: String,
        language: Language,
        alt_filter: bool,
    },
    Pay {
        receiver: String,
        coins: NonZeroU64,
    },
    /// Without a guild id, the guild the command was sent in.
    Info {
        guild_id: Option<String>,
    },
    /// Without a guild id, the guild the command was sent in.
    Check {
        guild_id: Option<String>,
    },
    CheckAll,
    Stats,
    Help,
}

/// A recognized command with unusable arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageError {
    /// Usage line for the command, without the prefix.
    pub usage: &'static str,
    pub reason: String,
}

impl fmt::Display for UsageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (usage: {})", self.reason, self.usage)
    }
}

const BUY_USAGE: &str = "buy <coins> <invite> <en|fr> [alt]";
const PAY_USAGE: &str = "pay <user> <coins>";
const INFO_USAGE: &str = "info [server id]";
const CHECK_USAGE: &str = "check [server id]";

/// Usage lines for every command, in the order they are listed by `help`.
pub const USAGE: &[(&str, &str)] = &[
    ("register", "Create your account"),
    ("coins", "Show your balance"),
    ("daily", "Claim your daily reward"),
    ("farm", "List servers you can join to earn coins"),
    (BUY_USAGE, "Buy an ad for your server"),
    (PAY_USAGE, "Send coins to someone"),
    (INFO_USAGE, "Show a server's ad status"),
    (CHECK_USAGE, "Check whether you can leave a server"),
    ("checkall", "List servers you can leave"),
    ("stats", "Show this bot's local statistics"),
    ("help", "Show this message"),
];

/// Parse a chat message.
///
/// Returns `None` when the message is not addressed to the bot: no prefix, or an unknown
/// command name.
pub fn parse(prefix: &str, content: &str) -> Option<Result<Command, UsageError>> {
    let rest = content.trim_start().strip_prefix(prefix)?;
    let mut words = rest.split_whitespace();
    let name = words.next()?.to_ascii_lowercase();
    let args: Vec<&str> = words.collect();

    let command = match name.as_str() {
        "register" => Ok(Command::Register),
        "coins" | "balance" => Ok(Command::Coins),
        "daily" => Ok(Command::Daily),
        "farm" => Ok(Command::Farm),
        "buy" => parse_buy(&args),
        "pay" => parse_pay(&args),
        "info" => parse_guild(&args, INFO_USAGE).map(|guild_id| Command::Info { guild_id }),
        "check" => parse_guild(&args, CHECK_USAGE).map(|guild_id| Command::Check { guild_id }),
        "checkall" => Ok(Command::CheckAll),
        "stats" => Ok(Command::Stats),
        "help" => Ok(Command::Help),
        _ => return None,
    };
    Some(command)
}

fn usage(usage: &'static str, reason: impl Into<String>) -> UsageError {
    UsageError {
        usage,
        reason: reason.into(),
    }
}

fn parse_buy(args: &[&str]) -> Result<Command, UsageError> {
    let (coins, invite, language, alt) = match args {
        [coins, invite, language] => (coins, invite, language, None),
        [coins, invite, language, alt] => (coins, invite, language, Some(alt)),
        _ => return Err(usage(BUY_USAGE, "wrong number of arguments")),
    };

    let coins = parse_coins(coins, BUY_USAGE)?;
    let language = language
        .parse::<Language>()
        .map_err(|e: anyhow::Error| usage(BUY_USAGE, e.to_string()))?;
    let alt_filter = match alt {
        None => false,
        Some(alt) => parse_flag(alt)
            .ok_or_else(|| usage(BUY_USAGE, format!("'{alt}' is not yes or no")))?,
    };

    Ok(Command::Buy {
        coins,
        invite: invite.to_string(),
        language,
        alt_filter,
    })
}

fn parse_pay(args: &[&str]) -> Result<Command, UsageError> {
    let [receiver, coins] = args else {
        return Err(usage(PAY_USAGE, "wrong number of arguments"));
    };
    let receiver = parse_user(receiver)
        .ok_or_else(|| usage(PAY_USAGE, format!("'{receiver}' is not a user")))?;
    let coins = parse_coins(coins, PAY_USAGE)?;
    Ok(Command::Pay { receiver, coins })
}

fn parse_guild(args: &[&str], usage_line: &'static str) -> Result<Option<String>, UsageError> {
    match args {
        [] => Ok(None),
        [id] if is_snowflake(id) => Ok(Some(id.to_string())),
        [id] => Err(usage(usage_line, format!("'{id}' is not a server id"))),
        _ => Err(usage(usage_line, "too many arguments")),
    }
}

fn parse_coins(s: &str, usage_line: &'static str) -> Result<NonZeroU64, UsageError> {
    s.parse()
        .map_err(|_| usage(usage_line, format!("'{s}' is not a positive number of coins")))
}

/// Accept a raw user id or a mention (`<@123>`, `<@!123>`).
fn parse_user(s: &str) -> Option<String> {
    let id = s
        .strip_prefix("<@")
        .and_then(|s| s.strip_suffix('>'))
        .map(|s| s.trim_start_matches('!'))
        .unwrap_or(s);
    is_snowflake(id).then(|| id.to_string())
}

fn is_snowflake(s: &str) -> bool {
    !s.is_empty() && s.len() <= 20 && s.bytes().all(|b| b.is_ascii_digit())
}

fn parse_flag(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "true" | "yes" | "y" | "on" | "1" => Some(true),
        "false" | "no" | "n" | "off" | "0" => Some(false),
        _ => None,
    }
}
