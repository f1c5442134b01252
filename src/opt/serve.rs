use std::{env, sync::Arc};

use anyhow::Context;
use clap::Parser;
use serenity::prelude::GatewayIntents;
use tokio::sync::mpsc;

use crate::{
    action::{Action, ActionQueue},
    client::ApiClient,
    config::{AuthScheme, Config, Credential, DISCORD_TOKEN_VAR},
    counter::CounterStore,
    Handler, Worker,
};

use super::ConfigOpts;

#[derive(Debug, Clone, Parser)]
pub struct Serve {
    #[clap(flatten)]
    opts: ConfigOpts,
    /// Prefix that marks a chat message as a command.
    #[clap(long)]
    prefix: Option<String>,
}

impl Serve {
    /// Run the bot, listening for commands, and responding as appropriate.
    ///
    /// This function should never return, unless an error of some kind is encountered.
    pub async fn exec(self) -> anyhow::Result<()> {
        let mut config = self.opts.config()?;
        if let Some(prefix) = self.prefix {
            config.prefix = prefix;
        }

        Self::preflight_checks(&config).context("failed preflight checks")?;

        let discord_token = env::var(DISCORD_TOKEN_VAR)?;
        let client = ApiClient::new(&config, Credential::from_env()?)?;

        // Load the counters up front, so a corrupt file stops us before we go online
        let counters = Arc::new(CounterStore::new(config.counter_path()?));
        let record = counters
            .load()
            .await
            .context("failed to load the local counters")?;
        tracing::info!(
            path = %counters.path().display(),
            registered_count = record.registered_count,
            farmers = record.farmed_user_ids.len(),
            "loaded local counters"
        );

        let (send_actions, actions) = mpsc::channel(config.queue_size);

        // Make a worker to run the discord client
        let mut discord_client = Self::discord_client(&discord_token, &config, send_actions).await?;
        let http = discord_client.cache_and_http.http.clone();

        // Make a worker to handle the action queue
        let worker = Worker::new(actions, client, counters, http, config.prefix.clone());
        let worker = tokio::spawn(worker.run());
        let discord = tokio::spawn(async move { discord_client.start().await });

        tokio::select! {
            result = worker => result.context("command worker panicked")?.context("error in command worker"),
            result = discord => result.context("discord client panicked")?.context("error in discord client service"),
        }
    }

    /// Configures a new discord [`Client`][serenity::Client].
    ///
    /// This will configure a [`Handler`] to handle events, and will send the commands it sees
    /// to the provided [`mpsc`] channel.
    async fn discord_client(
        token: impl AsRef<str>,
        config: &Config,
        action_tx: mpsc::Sender<Action>,
    ) -> anyhow::Result<serenity::Client> {
        let handler = Handler::new(config.prefix.clone());

        tracing::debug!("configuring discord client");
        let discord_client = serenity::Client::builder(
            &token,
            GatewayIntents::non_privileged() | GatewayIntents::MESSAGE_CONTENT,
        )
        .event_handler(handler)
        .await?;

        // Put the sending end of the action queue into the global TypeMap
        discord_client
            .data
            .write()
            .await
            .insert::<ActionQueue>(action_tx);

        Ok(discord_client)
    }

    /// Perform sanity checks on the configuration prior to running.
    fn preflight_checks(config: &Config) -> anyhow::Result<()> {
        if config.prefix.trim().is_empty() {
            anyhow::bail!("the command prefix must not be empty");
        }
        if config.queue_size == 0 {
            anyhow::bail!("the queue size must be at least 1");
        }
        if config.timeout.is_zero() {
            anyhow::bail!("the timeout must be greater than zero");
        }
        if config.auth == AuthScheme::SecretKey {
            tracing::warn!(
                "the secret-key authentication scheme is deprecated, prefer --auth header"
            );
        }

        tracing::debug!("checking discord token...");
        env::var(DISCORD_TOKEN_VAR)
            .with_context(|| format!("missing environment variable {DISCORD_TOKEN_VAR}"))?;

        tracing::info!(
            base_url = %config.base_url,
            timeout = %humantime::Duration::from(config.timeout),
            auth = %config.auth,
            prefix = %config.prefix,
            "configured rewards service"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn empty_prefix_fails_preflight() {
        let config = Config {
            prefix: " ".to_string(),
            ..Config::default()
        };
        assert!(Serve::preflight_checks(&config).is_err());
    }

    #[test]
    fn zero_timeout_fails_preflight() {
        let config = Config {
            timeout: Duration::ZERO,
            ..Config::default()
        };
        assert!(Serve::preflight_checks(&config).is_err());
    }
}
