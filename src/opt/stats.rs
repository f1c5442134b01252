use clap::Parser;

use crate::counter::CounterStore;

use super::ConfigOpts;

#[derive(Debug, Clone, Parser)]
pub struct Stats {
    #[clap(flatten)]
    pub(super) opts: ConfigOpts,
}

impl Stats {
    pub async fn exec(self) -> anyhow::Result<()> {
        let store = CounterStore::new(self.opts.config()?.counter_path()?);
        let record = store.load().await?;
        tracing::debug!(path = %store.path().display(), "loaded counters");
        println!("{}", serde_json::to_string_pretty(&record)?);
        Ok(())
    }
}
