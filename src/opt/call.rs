use std::num::NonZeroU64;

use clap::{Parser, Subcommand};

use crate::{
    client::{ApiClient, Language, ServiceRequest},
    config::Credential,
};

use super::ConfigOpts;

/// Issue one rewards service operation from the terminal.
#[derive(Debug, Clone, Parser)]
pub struct Call {
    #[clap(flatten)]
    opts: ConfigOpts,
    #[clap(subcommand)]
    operation: Operation,
}

#[derive(Debug, Clone, Subcommand)]
enum Operation {
    /// Create an account.
    Register { user_id: String },
    /// Look up an account.
    User { user_id: String },
    /// Claim the daily reward.
    Daily { user_id: String },
    /// List servers to join for coins.
    Farm { user_id: String },
    /// Buy an ad for a server.
    Buy {
        user_id: String,
        coins: NonZeroU64,
        /// Invite code or invite URL.
        invite: String,
        /// Language filter: "en" or "fr".
        language: Language,
        /// Exclude alt accounts.
        #[clap(long)]
        alt: bool,
    },
    /// Transfer coins from one user to another.
    Pay {
        receiver_id: String,
        donor_id: String,
        coins: NonZeroU64,
    },
    /// Show a server's ad status.
    Info { guild_id: String },
    /// Check whether a user may leave a server.
    Check { guild_id: String, user_id: String },
    /// List the servers a user may leave.
    CheckAll { user_id: String },
}

impl Operation {
    fn request(&self) -> ServiceRequest {
        match self {
            Operation::Register { user_id } => ServiceRequest::register_user(user_id),
            Operation::User { user_id } => ServiceRequest::get_user(user_id),
            Operation::Daily { user_id } => ServiceRequest::claim_daily(user_id),
            Operation::Farm { user_id } => ServiceRequest::activate_farm(user_id),
            Operation::Buy {
                user_id,
                coins,
                invite,
                language,
                alt,
            } => ServiceRequest::purchase_ad(user_id, *coins, invite, *language, *alt),
            Operation::Pay {
                receiver_id,
                donor_id,
                coins,
            } => ServiceRequest::transfer_coins(receiver_id, donor_id, *coins),
            Operation::Info { guild_id } => ServiceRequest::get_guild_info(guild_id),
            Operation::Check { guild_id, user_id } => {
                ServiceRequest::can_leave_guild(guild_id, user_id)
            }
            Operation::CheckAll { user_id } => ServiceRequest::list_leavable_guilds(user_id),
        }
    }
}

impl Call {
    pub async fn exec(self) -> anyhow::Result<()> {
        let config = self.opts.config()?;
        let client = ApiClient::new(&config, Credential::from_env()?)?;

        let result = client.call(self.operation.request()).await;
        println!("{}", serde_json::to_string_pretty(&result)?);
        if let Some(raw) = result.raw() {
            eprintln!("raw response: {raw}");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Endpoint;

    #[test]
    fn operations_map_to_endpoints() {
        let call = Call::parse_from(["call", "check-all", "42"]);
        assert_eq!(call.operation.request().endpoint(), Endpoint::CheckAll);

        let call = Call::parse_from(["call", "pay", "7", "42", "10"]);
        let request = call.operation.request();
        assert_eq!(request.endpoint(), Endpoint::Pay);
        assert_eq!(request.payload()["user_receiver"], "7");
    }

    #[test]
    fn buy_normalizes_the_invite() {
        let call = Call::parse_from(["call", "buy", "42", "5", "discord.gg/abc", "en"]);
        let request = call.operation.request();
        assert_eq!(request.payload()["invite"], "abc");
        assert_eq!(request.payload()["filter_account"], "false");
    }

    #[test]
    fn zero_coins_are_rejected() {
        assert!(Call::try_parse_from(["call", "pay", "7", "42", "0"]).is_err());
    }
}
