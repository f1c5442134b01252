use std::sync::Arc;

use serenity::{http::Http, model::channel::Message};
use tokio::sync::mpsc;
use tracing::Instrument;

use crate::{
    action::Action,
    client::{ApiClient, ServiceResult},
    command::Command,
    counter::CounterStore,
    reply,
};

/// Drains the action queue one command at a time: calls the rewards service, updates the local
/// counters and replies in the originating channel.
pub struct Worker {
    /// Actions to perform.
    actions: mpsc::Receiver<Action>,
    /// The rewards service client.
    client: ApiClient,
    /// Local usage counters.
    counters: Arc<CounterStore>,
    /// Discord http for dispatching replies.
    http: Arc<Http>,
    /// Command prefix, for usage hints in replies.
    prefix: String,
}

impl Worker {
    pub fn new(
        actions: mpsc::Receiver<Action>,
        client: ApiClient,
        counters: Arc<CounterStore>,
        http: Arc<Http>,
        prefix: impl Into<String>,
    ) -> Self {
        Worker {
            actions,
            client,
            counters,
            http,
            prefix: prefix.into(),
        }
    }

    /// Run the worker until the queue closes.
    ///
    /// Only a failure of the local counter file ends it early.
    pub async fn run(mut self) -> anyhow::Result<()> {
        while let Some(action) = self.actions.recv().await {
            let response = match &action {
                Action::Run { message, command } => self.execute(message, command).await?,
                Action::Usage { error, .. } => reply::usage(error, &self.prefix),
            };
            self.reply(action.message(), response).await;
        }

        Ok(())
    }

    async fn reply(&self, message: &Message, response: String) {
        message
            .channel_id
            .say(&self.http, response)
            .await
            .map(|_| ())
            .unwrap_or_else(|e| tracing::error!(error = ?e, "failed to reply"));
    }

    /// Perform a command, returning the text to reply with.
    async fn execute(&self, message: &Message, command: &Command) -> anyhow::Result<String> {
        let user_id = message.author.id.0.to_string();
        let guild_id = message.guild_id.map(|id| id.0.to_string());
        let span = tracing::info_span!("command", user_id = %user_id, ?command);
        self.perform(command, user_id, guild_id)
            .instrument(span)
            .await
    }

    async fn perform(
        &self,
        command: &Command,
        user_id: String,
        guild_id: Option<String>,
    ) -> anyhow::Result<String> {
        let result = match command {
            Command::Help => return Ok(reply::help(&self.prefix)),
            Command::Stats => {
                let record = self.counters.load().await?;
                return Ok(reply::stats(&record));
            }
            Command::Register => self.client.register_user(&user_id).await,
            Command::Coins => self.client.get_user(&user_id).await,
            Command::Daily => self.client.claim_daily(&user_id).await,
            Command::Farm => self.client.activate_farm(&user_id).await,
            Command::Buy {
                coins,
                invite,
                language,
                alt_filter,
            } => {
                self.client
                    .purchase_ad(&user_id, *coins, invite, *language, *alt_filter)
                    .await
            }
            Command::Pay { receiver, coins } => {
                self.client
                    .transfer_coins(receiver, &user_id, *coins)
                    .await
            }
            Command::Info { guild_id: explicit } => {
                let Some(guild_id) = explicit.clone().or(guild_id) else {
                    return Ok(reply::no_guild());
                };
                self.client.get_guild_info(&guild_id).await
            }
            Command::Check { guild_id: explicit } => {
                let Some(guild_id) = explicit.clone().or(guild_id) else {
                    return Ok(reply::no_guild());
                };
                self.client.can_leave_guild(&guild_id, &user_id).await
            }
            Command::CheckAll => self.client.list_leavable_guilds(&user_id).await,
        };

        record(&self.counters, command, &user_id, &result).await?;
        Ok(reply::render(command, &result, &self.prefix))
    }
}

/// Update the local counters after a successful registration or farm activation.
async fn record(
    counters: &CounterStore,
    command: &Command,
    user_id: &str,
    result: &ServiceResult,
) -> anyhow::Result<()> {
    if !result.is_success() {
        return Ok(());
    }
    match command {
        Command::Register => {
            let record = counters.record_registration().await?;
            tracing::info!(registered_count = record.registered_count, "user registered");
        }
        Command::Farm => {
            let record = counters.record_farm_activation(user_id).await?;
            tracing::debug!(farmers = record.farmed_user_ids.len(), "farm activated");
        }
        _ => {}
    }
    Ok(())
}
