use std::{path::PathBuf, time::Duration};

use clap::Parser;
use url::Url;

use crate::config::{AuthScheme, Config};

mod call;
mod serve;
mod stats;

#[derive(Debug, Clone, Parser)]
#[clap(author, version, about)]
pub struct Opt {
    #[clap(subcommand)]
    pub command: Command,
}

impl Opt {
    pub async fn exec(self) -> anyhow::Result<()> {
        match self.command {
            Command::Serve(serve) => serve.exec().await,
            Command::Call(call) => call.exec().await,
            Command::Stats(stats) => stats.exec().await,
        }
    }
}

#[derive(Debug, Clone, Parser)]
pub enum Command {
    /// Run the bot.
    Serve(serve::Serve),
    /// Call a single rewards service operation and print the result as JSON.
    Call(call::Call),
    /// Print the local counters.
    Stats(stats::Stats),
}

/// Options shared by every subcommand, layered over the config file.
#[derive(Debug, Clone, clap::Args)]
pub struct ConfigOpts {
    /// Path to a TOML config file.
    #[clap(long, short)]
    config: Option<PathBuf>,
    /// Base address of the rewards service API.
    #[clap(long)]
    base_url: Option<Url>,
    /// Timeout for each call to the rewards service (e.g. "10s").
    #[clap(long, parse(try_from_str = humantime::parse_duration))]
    timeout: Option<Duration>,
    /// How to pass the API key to the rewards service.
    #[clap(long, arg_enum)]
    auth: Option<AuthScheme>,
    /// Path to the directory to use to store data [default: platform appdata directory].
    #[clap(long, short)]
    data_dir: Option<PathBuf>,
}

impl ConfigOpts {
    /// Load the config file, then apply the command-line overrides.
    pub fn config(&self) -> anyhow::Result<Config> {
        let mut config = Config::load(self.config.as_deref())?;
        if let Some(base_url) = &self.base_url {
            config.base_url = base_url.clone();
        }
        if let Some(timeout) = self.timeout {
            config.timeout = timeout;
        }
        if let Some(auth) = self.auth {
            config.auth = auth;
        }
        if let Some(data_dir) = &self.data_dir {
            config.data_dir = Some(data_dir.clone());
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_line_overrides_defaults() {
        let opt = Opt::parse_from([
            "join4join-bot",
            "stats",
            "--timeout",
            "3s",
            "--auth",
            "secret-key",
            "--data-dir",
            "/tmp/bot",
        ]);
        let Command::Stats(stats) = opt.command else {
            panic!("expected the stats subcommand");
        };
        let config = stats.opts.config().unwrap();
        assert_eq!(config.timeout, Duration::from_secs(3));
        assert_eq!(config.auth, AuthScheme::SecretKey);
        assert_eq!(config.data_dir, Some(PathBuf::from("/tmp/bot")));
        assert_eq!(config.base_url, Config::default().base_url);
    }

    #[test]
    fn call_parses_operation_arguments() {
        let opt = Opt::parse_from([
            "join4join-bot",
            "call",
            "buy",
            "42",
            "50",
            "https://discord.gg/abc",
            "fr",
            "--alt",
        ]);
        assert!(matches!(opt.command, Command::Call(_)));
    }
}
