//! Chat replies built from rewards service results.

use std::time::Duration;

use serde_json::Value;

use crate::{
    client::ServiceResult,
    command::{Command, UsageError, USAGE},
    counter::CounterRecord,
};

/// Most guild ids listed in a single reply; Discord caps messages at 2000 characters.
const MAX_LISTED: usize = 40;

/// Shown instead of transport details, which only go to the logs.
const UNAVAILABLE: &str = "❌ The rewards service is unavailable right now, please try again later.";

/// Construct the reply for a command that called the rewards service.
///
/// # Panics
///
/// On `Stats` and `Help`, which are answered locally with [`stats`] and [`help`].
pub fn render(command: &Command, result: &ServiceResult, prefix: &str) -> String {
    match command {
        Command::Register => {
            if !result.is_success() {
                return failure(result, "Failed to register. Maybe you already have an account?");
            }
            format!(
                "✅ Registered! You have **{} coins**.",
                text(result.field("coins"))
            )
        }
        Command::Coins => {
            if !result.is_success() {
                return failure(
                    result,
                    &format!("You are not registered yet. Use `{prefix}register` to create an account."),
                );
            }
            format!("💰 You have **{} coins**.", text(result.field("coins")))
        }
        Command::Daily => {
            if !result.is_success() {
                return failure(result, "Could not claim your daily reward.");
            }
            let ready = result
                .field("ready")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            if ready {
                format!(
                    "🎁 You received **{} coins**!",
                    text(result.field("amount"))
                )
            } else {
                let remaining = result.field("remaining_time");
                let wait = match remaining.and_then(millis) {
                    Some(remaining) => format_remaining_time(remaining),
                    None => text(remaining),
                };
                format!("⏳ Your daily reward is not ready yet. You must wait **{wait}**.")
            }
        }
        Command::Farm => {
            if !result.is_success() {
                return failure(result, "Could not fetch servers to farm.");
            }
            let guilds = guild_ids(result.data());
            if guilds.is_empty() {
                return "🌿 No servers to farm right now, come back later.".to_string();
            }
            format!("🌱 Join these servers to earn coins:\n{}", list(&guilds))
        }
        Command::Buy { .. } => {
            if !result.is_success() {
                return failure(result, "Could not buy the ad.");
            }
            match result.confirmation_link() {
                Some(link) => format!(
                    "🔗 Your purchase needs confirmation before the ad starts: {link}"
                ),
                None => "🎉 Ad purchased! It is running now.".to_string(),
            }
        }
        Command::Pay { receiver, coins } => {
            if !result.is_success() {
                return failure(result, "Failed to send coins.");
            }
            match result.confirmation_link() {
                Some(link) => format!(
                    "🔗 Confirm the transfer of **{coins} coins** to <@{receiver}> here: {link}"
                ),
                None => format!("💸 Sent **{coins} coins** to <@{receiver}>!"),
            }
        }
        Command::Info { .. } => {
            if !result.is_success() {
                return failure(result, "Could not get server info.");
            }
            format!(
                "📌 **Server info**\n\
                Name: {}\n\
                Invite: {}\n\
                Ad running: {}\n\
                Invitations requested: {}\n\
                Invitations left: {}",
                text(result.field("name")),
                text(result.field("invite")),
                yes_no(result.field("ad")),
                text(result.field("invitation_request")),
                text(result.field("invitation_update")),
            )
        }
        Command::Check { .. } => {
            if !result.is_success() {
                return failure(result, "Could not check this server.");
            }
            format!(
                "🚪 You can leave this server: **{}**",
                yes_no(result.field("check"))
            )
        }
        Command::CheckAll => {
            if !result.is_success() {
                return failure(result, "Could not check your servers.");
            }
            let guilds = guild_ids(result.field("check"));
            if guilds.is_empty() {
                return "📜 There are no servers you can leave yet.".to_string();
            }
            format!("📜 Servers you can leave:\n{}", list(&guilds))
        }
        Command::Stats | Command::Help => {
            unreachable!("{command:?} is answered without calling the rewards service")
        }
    }
}

/// Local counters, for `stats`.
pub fn stats(record: &CounterRecord) -> String {
    format!(
        "📊 **Bot statistics**\nAccounts registered: {}\nUsers farming: {}",
        record.registered_count,
        record.farmed_user_ids.len()
    )
}

/// The list of commands, for `help`.
pub fn help(prefix: &str) -> String {
    let mut response = "**Commands**".to_string();
    for (usage, description) in USAGE {
        response.push_str(&format!("\n`{prefix}{usage}`: {description}"));
    }
    response
}

pub fn usage(error: &UsageError, prefix: &str) -> String {
    format!(
        "⚠️ {}\nUsage: `{prefix}{}`",
        error.reason, error.usage
    )
}

/// Tell the user a guild command needs a guild.
pub fn no_guild() -> String {
    "⚠️ Run this in a server, or pass a server id.".to_string()
}

/// Domain failures and 4xx refusals show the service's own message, other faults a generic one.
fn failure(result: &ServiceResult, fallback: &str) -> String {
    if let Some(message) = result.rejection() {
        return format!("❌ {message}");
    }
    if result.fault().is_some() {
        return UNAVAILABLE.to_string();
    }
    match result.message() {
        Some(message) => format!("❌ {message}"),
        None => format!("❌ {fallback}"),
    }
}

/// Render the remaining wait as at most three units, e.g. `1h 30m`.
pub fn format_remaining_time(remaining: Duration) -> String {
    humantime::Duration::from(Duration::from_secs(remaining.as_secs()))
        .to_string()
        .split(' ')
        .take(3)
        .collect::<Vec<_>>()
        .join(" ")
}

/// A duration in milliseconds, whether sent as an integer or a float.
fn millis(value: &Value) -> Option<Duration> {
    if let Some(ms) = value.as_u64() {
        return Some(Duration::from_millis(ms));
    }
    let ms = value.as_f64().filter(|ms| ms.is_finite())?;
    Some(Duration::from_secs_f64(ms.max(0.0) / 1000.0))
}

fn text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => "unknown".to_string(),
        Some(other) => other.to_string(),
    }
}

fn yes_no(value: Option<&Value>) -> &'static str {
    match value {
        Some(Value::Bool(true)) => "yes",
        Some(Value::Bool(false)) => "no",
        _ => "unknown",
    }
}

fn guild_ids(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|ids| ids.iter().map(|id| text(Some(id))).collect())
        .unwrap_or_default()
}

fn list(ids: &[String]) -> String {
    let mut response = ids
        .iter()
        .take(MAX_LISTED)
        .map(|id| format!("- `{id}`"))
        .collect::<Vec<_>>()
        .join("\n");
    if ids.len() > MAX_LISTED {
        response.push_str(&format!("\n…and {} more", ids.len() - MAX_LISTED));
    }
    response
}
