//! Conversation command.
//!
//! Either sends a single message and prints the answer, or runs an
//! interactive loop where each line is one turn.

use std::sync::Arc;

use ragchat_conversation::RequestLifecycle;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;
use tracing::info;

use super::init_common_components;
use crate::render;

/// Input parameters for the Chat command strategy.
#[derive(Debug, Clone)]
pub struct ChatInput {
    /// Optional single message to send (non-interactive mode)
    pub message: Option<String>,
    /// Print the transcript as JSON after a single message
    pub json: bool,
}

/// Strategy for executing the Chat command.
#[derive(Debug, Clone, Copy)]
pub struct ChatStrategy;

impl super::CommandStrategy for ChatStrategy {
    type Input = ChatInput;

    async fn execute(&self, input: Self::Input) -> anyhow::Result<()> {
        let common = init_common_components()?;
        let lifecycle = Arc::new(common.lifecycle());

        match input.message {
            Some(msg) => single_turn(&lifecycle, &msg, input.json).await,
            None => run_interactive(lifecycle).await,
        }
    }
}

async fn single_turn(
    lifecycle: &RequestLifecycle,
    message: &str,
    json: bool,
) -> anyhow::Result<()> {
    lifecycle.submit(message).await;

    let store = lifecycle.store();
    if store.is_empty() {
        anyhow::bail!("Nothing to send: message is empty");
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&store.snapshot())?);
    } else if let Some(reply) = store.last() {
        println!("{}", reply.content());
    }

    Ok(())
}

async fn run_interactive(lifecycle: Arc<RequestLifecycle>) -> anyhow::Result<()> {
    let session_id = lifecycle.identity().get_or_create_session_id()?;
    println!("=== Conversation Session: {session_id} ===");
    println!("Type 'exit', 'quit', or Ctrl+D to end the session.\n");

    let renderer = tokio::spawn(render::render_transcript(
        lifecycle.store().subscribe(),
        lifecycle.subscribe_state(),
    ));

    let mut pending: Option<JoinHandle<()>> = None;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    render::prompt()?;
    while let Some(line) = lines.next_line().await? {
        match classify_line(&line, lifecycle.is_sending()) {
            LineAction::Exit => break,
            LineAction::Blank => render::prompt()?,
            LineAction::Busy => {
                println!("(still waiting for the previous answer, message not sent)");
                render::prompt()?;
            }
            LineAction::Send(input) => pending = Some(lifecycle.dispatch(input)),
        }
    }

    if let Some(turn) = pending {
        turn.await?;
    }

    let total_turns = lifecycle.store().len() / 2;
    info!("Conversation ended: {total_turns} turns");

    // Dropping the last handle closes the store channel and stops the renderer.
    drop(lifecycle);
    renderer.await?;

    println!("\nSession ended. Total turns: {total_turns}");
    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
enum LineAction<'a> {
    Exit,
    Blank,
    /// A turn is outstanding; the line is not sent.
    Busy,
    Send(&'a str),
}

fn classify_line(line: &str, sending: bool) -> LineAction<'_> {
    let input = line.trim();
    if matches!(input, "exit" | "quit" | "q") {
        LineAction::Exit
    } else if input.is_empty() {
        LineAction::Blank
    } else if sending {
        LineAction::Busy
    } else {
        LineAction::Send(input)
    }
}
