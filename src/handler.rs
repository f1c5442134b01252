use serenity::{
    async_trait,
    client::{Context, EventHandler},
    model::{channel::Message, gateway::Ready},
};

use crate::{
    action::{Action, ActionQueue},
    command::{self, Command, UsageError},
};

/// Watches chat messages for commands and queues them for the worker.
pub struct Handler {
    prefix: String,
}

impl Handler {
    pub fn new(prefix: impl Into<String>) -> Self {
        Handler {
            prefix: prefix.into(),
        }
    }

    /// The action to queue for a message, if it is a command for us.
    fn action(&self, message: Message) -> Option<Action> {
        match self.command(message.author.bot, &message.content)? {
            Ok(command) => Some(Action::Run { message, command }),
            Err(error) => Some(Action::Usage { message, error }),
        }
    }

    fn command(&self, from_bot: bool, content: &str) -> Option<Result<Command, UsageError>> {
        // Don't trigger on messages from bots, ourselves included
        if from_bot {
            tracing::trace!("ignoring message from a bot");
            return None;
        }
        command::parse(&self.prefix, content)
    }
}

#[async_trait]
impl EventHandler for Handler {
    async fn message(&self, ctx: Context, message: Message) {
        let user_id = message.author.id.0;
        let Some(action) = self.action(message) else {
            return;
        };
        match &action {
            Action::Run { command, .. } => tracing::debug!(user_id, ?command, "queueing command"),
            Action::Usage { error, .. } => tracing::debug!(user_id, %error, "bad command arguments"),
        }

        // Clone the sender out so the lock isn't held while waiting for queue capacity
        let queue = ctx.data.read().await.get::<ActionQueue>().cloned();
        match queue {
            Some(queue) => {
                if queue.send(action).await.is_err() {
                    tracing::error!("action queue is closed, dropping command");
                }
            }
            None => tracing::error!("action queue missing from client data"),
        }
    }

    async fn ready(&self, _ctx: Context, ready: Ready) {
        tracing::info!(
            user_name = %ready.user.name,
            guilds = ready.guilds.len(),
            "connected to discord"
        );
    }
}
