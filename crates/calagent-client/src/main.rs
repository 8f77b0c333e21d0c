//! calagent CLI entry point.

use std::io;
use std::process::ExitCode;

use clap::Parser;

use calagent_client::cli::{Cli, Command};
use calagent_client::commands::{self, auth, chat, events};
use calagent_client::config::Settings;
use calagent_client::error::ClientResult;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> ClientResult<()> {
    let settings = Settings::load(cli.config.as_deref())?;

    calagent_core::init_tracing(settings.tracing_config(cli.debug)?)?;

    let mut out = io::stdout();
    match cli.command {
        Command::List {
            max_results,
            calendar_id,
        } => {
            let provider = commands::google_provider(&settings)?;
            events::list(&provider, &mut out, max_results, &calendar_id).await
        }
        Command::Calendars => {
            let provider = commands::google_provider(&settings)?;
            events::calendars(&provider, &mut out).await
        }
        Command::Search(args) => {
            let provider = commands::google_provider(&settings)?;
            events::search(&provider, &mut out, args).await
        }
        Command::Get {
            event_id,
            calendar_id,
        } => {
            let provider = commands::google_provider(&settings)?;
            events::get(&provider, &mut out, &event_id, &calendar_id).await
        }
        Command::Create(args) => {
            let provider = commands::google_provider(&settings)?;
            events::create(&provider, &mut out, args).await
        }
        Command::Update(args) => {
            let provider = commands::google_provider(&settings)?;
            events::update(&provider, &mut out, args).await
        }
        Command::Delete { event_id } => {
            let provider = commands::google_provider(&settings)?;
            events::delete(&provider, &mut out, &event_id).await
        }
        Command::Auth { status: true, .. } => auth::status(&settings, &mut out),
        Command::Auth { refresh: true, .. } => auth::refresh(&settings).await,
        Command::Auth { .. } => auth::authenticate(&settings).await,
        Command::Chat => chat::run(&settings).await,
    }
}
