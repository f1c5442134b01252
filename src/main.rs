mod action;

mod client;

mod command;

mod config;

mod counter;

mod handler;
pub use handler::Handler;

mod opt;
pub use opt::Opt;

mod reply;

mod worker;
pub use worker::Worker;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    use clap::Parser;
    Opt::parse().exec().await
}
