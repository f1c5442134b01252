use serenity::{model::channel::Message, prelude::TypeMapKey};
use tokio::sync::mpsc;

use crate::command::{Command, UsageError};

/// `TypeMap` key for the action queue.
pub struct ActionQueue;

/// Associate the `ActionQueue` key with an `mpsc::Sender` for `Action`s in the `TypeMap`.
impl TypeMapKey for ActionQueue {
    type Value = mpsc::Sender<Action>;
}

/// Work handed from the Discord handler to the [`Worker`](crate::Worker).
#[derive(Debug, Clone)]
pub enum Action {
    Run {
        /// The originating message.
        message: Message,
        /// The command parsed from it.
        command: Command,
    },
    Usage {
        /// The originating message, which named a command but with unusable arguments.
        message: Message,
        error: UsageError,
    },
}

impl Action {
    pub fn message(&self) -> &Message {
        match self {
            Action::Run { message, .. } | Action::Usage { message, .. } => message,
        }
    }
}
