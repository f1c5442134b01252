use std::{fmt, num::NonZeroU64, str::FromStr, sync::OnceLock};

use regex::Regex;
use reqwest::Method;
use serde_json::{Map, Value};

use crate::config::AuthScheme;

/// The fixed set of rewards service endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    CreateUser,
    GetUser,
    Daily,
    Farm,
    Buy,
    Pay,
    Info,
    Check,
    CheckAll,
}

impl Endpoint {
    /// Path of the endpoint relative to the service base address.
    pub fn path(self) -> &'static str {
        match self {
            Endpoint::CreateUser => "user/create",
            Endpoint::GetUser => "user/get",
            Endpoint::Daily => "join4join/daily",
            Endpoint::Farm => "join4join/farm",
            Endpoint::Buy => "join4join/buy",
            Endpoint::Pay => "join4join/pay",
            Endpoint::Info => "join4join/info",
            Endpoint::Check => "join4join/check",
            Endpoint::CheckAll => "join4join/check/all",
        }
    }

    /// HTTP method for this endpoint under the given authentication scheme.
    ///
    /// Only the legacy secret-key scheme reads users with `GET`.
    pub fn method(self, auth: AuthScheme) -> Method {
        match (self, auth) {
            (Endpoint::GetUser, AuthScheme::SecretKey) => Method::GET,
            _ => Method::POST,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Language filter applied to a purchased ad.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    English,
    French,
}

impl Language {
    pub fn code(self) -> &'static str {
        match self {
            Language::English => "en",
            Language::French => "fr",
        }
    }
}

impl FromStr for Language {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "en" | "english" => Ok(Language::English),
            "fr" | "french" => Ok(Language::French),
            _ => Err(anyhow::anyhow!("unknown language '{s}', expected 'en' or 'fr'")),
        }
    }
}

/// A single call to the rewards service: which endpoint, and the payload to send it.
///
/// Requests are built through the per-operation constructors and are immutable afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceRequest {
    endpoint: Endpoint,
    payload: Map<String, Value>,
}

impl ServiceRequest {
    fn new(endpoint: Endpoint) -> Self {
        ServiceRequest {
            endpoint,
            payload: Map::new(),
        }
    }

    fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.payload.insert(key.to_string(), value.into());
        self
    }

    pub fn register_user(user_id: &str) -> Self {
        Self::new(Endpoint::CreateUser).with("user_id", user_id)
    }

    pub fn get_user(user_id: &str) -> Self {
        Self::new(Endpoint::GetUser).with("user_id", user_id)
    }

    pub fn claim_daily(user_id: &str) -> Self {
        Self::new(Endpoint::Daily).with("user_id", user_id)
    }

    pub fn activate_farm(user_id: &str) -> Self {
        Self::new(Endpoint::Farm).with("user_id", user_id)
    }

    pub fn purchase_ad(
        user_id: &str,
        coins: NonZeroU64,
        invite: &str,
        language: Language,
        alt_filter: bool,
    ) -> Self {
        Self::new(Endpoint::Buy)
            .with("user_id", user_id)
            .with("coins", coins.get())
            .with("invite", normalize_invite(invite))
            .with("filter_language", language.code())
            .with("filter_account", encode_flag(alt_filter))
    }

    pub fn transfer_coins(receiver_id: &str, donor_id: &str, coins: NonZeroU64) -> Self {
        Self::new(Endpoint::Pay)
            .with("user_receiver", receiver_id)
            .with("user_donator", donor_id)
            .with("coins", coins.get())
    }

    pub fn get_guild_info(guild_id: &str) -> Self {
        Self::new(Endpoint::Info).with("guild_id", guild_id)
    }

    pub fn can_leave_guild(guild_id: &str, user_id: &str) -> Self {
        Self::new(Endpoint::Check)
            .with("guild_id", guild_id)
            .with("user_id", user_id)
    }

    pub fn list_leavable_guilds(user_id: &str) -> Self {
        Self::new(Endpoint::CheckAll).with("user_id", user_id)
    }

    pub fn endpoint(&self) -> Endpoint {
        self.endpoint
    }

    pub fn payload(&self) -> &Map<String, Value> {
        &self.payload
    }

    /// The payload flattened to string pairs, for query-string encoding.
    pub(super) fn query_pairs(&self) -> Vec<(String, String)> {
        self.payload
            .iter()
            .map(|(key, value)| {
                let value = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (key.clone(), value)
            })
            .collect()
    }
}

/// The service reads the alt-account filter as a lower-case string.
fn encode_flag(flag: bool) -> Value {
    Value::String(flag.to_string())
}

/// Reduce an invite URL to its bare code.
///
/// `https://discord.gg/abc`, `discord.com/invite/abc` and `abc` all become `abc`.
pub fn normalize_invite(invite: &str) -> String {
    static PREFIX: OnceLock<Regex> = OnceLock::new();
    let prefix = PREFIX.get_or_init(|| {
        Regex::new(r"(?i)^(?:https?://)?(?:www\.)?(?:discord\.gg|discord(?:app)?\.com/invite)/")
            .expect("invite prefix regex is valid")
    });

    let code = prefix.replace(invite.trim(), "");
    code.split(['/', '?', '#'])
        .next()
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn invite_urls_reduce_to_the_code() {
        for invite in [
            "https://discord.gg/abc123",
            "discord.com/invite/abc123",
            "abc123",
            "http://www.discord.gg/abc123",
            "https://discordapp.com/invite/abc123/",
            "  HTTPS://Discord.GG/abc123?event=1  ",
        ] {
            assert_eq!(normalize_invite(invite), "abc123", "input: {invite:?}");
        }
    }

    #[test]
    fn purchase_payload_matches_service_keys() {
        let request = ServiceRequest::purchase_ad(
            "42",
            NonZeroU64::new(50).unwrap(),
            "https://discord.gg/xyz",
            Language::French,
            true,
        );
        assert_eq!(request.endpoint(), Endpoint::Buy);
        assert_eq!(
            Value::Object(request.payload().clone()),
            json!({
                "user_id": "42",
                "coins": 50,
                "invite": "xyz",
                "filter_language": "fr",
                "filter_account": "true",
            })
        );
    }

    #[test]
    fn transfer_names_both_parties() {
        let request = ServiceRequest::transfer_coins("7", "42", NonZeroU64::new(10).unwrap());
        assert_eq!(request.endpoint().path(), "join4join/pay");
        assert_eq!(
            Value::Object(request.payload().clone()),
            json!({ "user_receiver": "7", "user_donator": "42", "coins": 10 })
        );
    }

    #[test]
    fn query_pairs_stringify_numbers() {
        let request = ServiceRequest::transfer_coins("7", "42", NonZeroU64::new(10).unwrap());
        let mut pairs = request.query_pairs();
        pairs.sort();
        assert_eq!(
            pairs,
            vec![
                ("coins".to_string(), "10".to_string()),
                ("user_donator".to_string(), "42".to_string()),
                ("user_receiver".to_string(), "7".to_string()),
            ]
        );
    }

    #[test]
    fn only_legacy_user_lookup_uses_get() {
        assert_eq!(
            Endpoint::GetUser.method(AuthScheme::SecretKey),
            Method::GET
        );
        assert_eq!(Endpoint::GetUser.method(AuthScheme::Header), Method::POST);
        assert_eq!(Endpoint::Farm.method(AuthScheme::SecretKey), Method::POST);
    }

    #[test]
    fn language_accepts_codes_and_names() {
        assert_eq!("EN".parse::<Language>().unwrap(), Language::English);
        assert_eq!("french".parse::<Language>().unwrap(), Language::French);
        assert!("de".parse::<Language>().is_err());
    }
}
