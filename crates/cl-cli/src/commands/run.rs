//! Run command implementation

use std::path::Path;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};

use cl_client::{RemoteSessionController, SocketIoTransport};
use cl_core::config::ClientConfig;
use cl_core::SessionState;

use crate::output::print_warning;
use crate::terminal::TerminalPresentation;

/// Execute the run command
///
/// Sends the file to the executor, streams its output, forwards stdin lines
/// as program input, and stops the program on Ctrl+C. Returns once the
/// session is idle again.
pub async fn run_command(config: &ClientConfig, file: &Path, quiet: bool) -> Result<()> {
    let source = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read source file: {:?}", file))?;

    let transport = SocketIoTransport::new(config).context("Invalid transport configuration")?;
    tracing::info!(
        url = transport.url(),
        namespace = transport.namespace(),
        file = %file.display(),
        "Starting remote run"
    );

    let presentation = TerminalPresentation::new(source, quiet);
    let mut controller = RemoteSessionController::new(transport, presentation, config);

    controller.connect();
    let waited = tokio::time::timeout(config.transport.handshake_timeout, async {
        while !controller.session().is_connected() && !controller.presentation().failed() {
            if !controller.step().await {
                break;
            }
        }
    })
    .await;
    if waited.is_err() {
        tracing::debug!("No connection within handshake timeout");
    }
    if controller.presentation().failed() {
        anyhow::bail!("Could not reach the server at {}", config.server_url);
    }

    controller.run_from_editor().await;

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    while controller.state() != SessionState::Idle
        && !controller.presentation().controls().reconnect_visible
    {
        tokio::select! {
            event = controller.next_event() => match event {
                Some(event) => controller.handle_event(event).await,
                None => break,
            },
            line = stdin.next_line(), if stdin_open => match line {
                Ok(Some(line)) => controller.submit_input(&line).await,
                Ok(None) => stdin_open = false,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to read stdin");
                    stdin_open = false;
                }
            },
            _ = tokio::signal::ctrl_c() => controller.request_stop().await,
        }
    }

    if controller.presentation().failed() {
        anyhow::bail!("Could not reach the server at {}", config.server_url);
    }
    if controller.state() != SessionState::Idle {
        print_warning("Connection lost before the program finished");
    }

    Ok(())
}
