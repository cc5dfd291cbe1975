//! Seeker CLI entry point
//!
//! # Modes
//!
//! - `seeker` — interactive prompt loop with multi-turn context
//! - `seeker "question"` — one-shot: stream the answer and exit
//! - `seeker -r <id>` — resume a saved session interactively

mod app;
mod args;
mod commands;
mod console;

use app::App;
use args::Cli;
use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Set RUST_LOG=debug for verbose logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut app = App::new(&cli).await?;

    match &cli.query {
        Some(query) => app.run_query(query).await,
        None => app.run_interactive().await,
    }
}
