//! Interactive chat with the calendar assistant.

use std::sync::Arc;

use calagent_agent::{Agent, calendar_tools};
use calagent_providers::{CalendarProvider, ErrorProvider, ProviderError};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::warn;

use crate::config::Settings;
use crate::error::{ClientError, ClientResult};

pub async fn run(settings: &Settings) -> ClientResult<()> {
    let agent = Agent::new(settings.model_config()?, calendar_tools(calendar(settings)))?;
    let mut conversation = agent.conversation();
    let mut rl = DefaultEditor::new()
        .map_err(|e| ClientError::Config(format!("failed to start line editor: {}", e)))?;

    println!(
        "Calendar assistant ({} / {}). Type 'exit' or press Ctrl-D to quit.",
        agent.config().provider,
        agent.config().model
    );

    loop {
        let line = match rl.readline("you> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(err) => {
                warn!("readline failed: {}", err);
                break;
            }
        };

        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if matches!(input, "exit" | "quit") {
            break;
        }
        let _ = rl.add_history_entry(input);

        match agent.send(&mut conversation, input).await {
            Ok(reply) => println!("\n{}\n", reply.trim()),
            Err(e) => eprintln!("error: {}", e),
        }
    }

    Ok(())
}

/// The Google provider, or a stand-in that reports why it could not be
/// built on every call so the assistant can explain it.
fn calendar(settings: &Settings) -> Arc<dyn CalendarProvider> {
    match crate::commands::google_provider(settings) {
        Ok(provider) => Arc::new(provider),
        Err(e) => {
            warn!("calendar unavailable: {}", e);
            let error = match e {
                ClientError::Provider(err) => err,
                other => ProviderError::configuration(other.to_string()),
            };
            Arc::new(ErrorProvider::new("google", error))
        }
    }
}
