//! `devforge run <text>`

use crate::client::ServiceClient;
use crate::error::{CliError, ExitCode, Result};
use crate::output;
use crate::selection::{candidate_table, SelectionPrompt};
use colored::Colorize;
use devforge_core::{ResponseEnvelope, Status};
use llm::{CommandParser, ParsedCommand};
use std::path::PathBuf;
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Where generated code is written
    pub output: Option<PathBuf>,
    pub verbose: bool,
}

/// Parse `text`, send it to the service and settle any ambiguity
///
/// The service must already be reachable through `client`.
pub async fn handle_run(
    parser: &CommandParser,
    client: &ServiceClient,
    prompt: &dyn SelectionPrompt,
    text: &str,
    options: &RunOptions,
) -> Result<ExitCode> {
    let parsed = parser.parse(text).await?;
    if options.verbose {
        println!("{}", format!("Parsed: {:?}", parsed).yellow());
    }

    let request = match parsed {
        ParsedCommand::ServerInfo => {
            super::info::print_info(&client.system_info().await?);
            return Ok(ExitCode::Success);
        }
        ParsedCommand::Action(request) => request,
    };

    debug!(task = %request.task, "Dispatching");
    let mut envelope = client.dispatch(&request).await?;

    if envelope.status == Status::Ambiguous {
        envelope = settle(client, prompt, envelope).await?;
    }

    output::print_envelope(&envelope, options.verbose);
    if envelope.is_success() {
        if let Some(code) = output::generated_code(&envelope) {
            output::emit_code(code, options.output.as_deref())?;
        }
    }
    Ok(ExitCode::for_status(envelope.status))
}

/// Ask for a choice and apply it; leaves the envelope ambiguous when the user declines
async fn settle(
    client: &ServiceClient,
    prompt: &dyn SelectionPrompt,
    envelope: ResponseEnvelope,
) -> Result<ResponseEnvelope> {
    let candidates = envelope.candidates();
    let session_id = envelope
        .session_id()
        .ok_or_else(|| CliError::Protocol("ambiguous response without session_id".to_string()))?
        .to_string();

    println!("{}", envelope.message.cyan().bold());
    println!("{}", candidate_table(&candidates));

    if !prompt.is_interactive() {
        println!(
            "{}",
            format!("Re-run in a terminal to choose, or select via the API with session {}", session_id).yellow()
        );
        return Ok(envelope);
    }

    match prompt.choose(&candidates)? {
        Some(choice) => {
            println!("{}", format!("You selected: {}", choice).green());
            // Table rows are numbered from 1, session indices from 0
            let index = choice
                .checked_sub(1)
                .ok_or_else(|| CliError::Protocol("selection numbers start at 1".to_string()))?;
            client.select(&session_id, index).await
        }
        None => {
            let cancelled = client.cancel(&session_id).await?;
            debug!(status = %cancelled.status, "Selection cancelled");
            println!("{}", "Selection cancelled".yellow());
            Ok(envelope)
        }
    }
}
