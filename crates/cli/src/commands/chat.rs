//! `forgeloop chat`: interactive or single-message mode.

use std::sync::Arc;
use std::time::Duration;

use forgeloop_agent::{AgentLoop, TerminalState};
use forgeloop_config::AppConfig;
use forgeloop_core::event::{EventBus, ProgressEvent};
use forgeloop_core::message::{Conversation, Role};
use forgeloop_core::provider::ProviderKind;
use forgeloop_tools::{ToolRouter, file_tool_set};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

/// Upper bound on waiting for queued progress output at exit.
const PRINTER_DRAIN: Duration = Duration::from_secs(1);

pub async fn run(message: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if !config.provider.has_api_key() {
        let vendor_var = match config.provider.kind {
            ProviderKind::Anthropic => "ANTHROPIC_API_KEY",
            ProviderKind::OpenAi => "OPENAI_API_KEY",
        };
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    FORGELOOP_API_KEY");
        eprintln!("    {vendor_var}");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let event_bus = Arc::new(EventBus::default());
    let provider = forgeloop_providers::build_provider(&config, Some(event_bus.clone()))?;

    let workspace_root = config.tools.workspace_root_or_cwd();
    let mut router = ToolRouter::new().with_events(event_bus.clone());
    router.register(Arc::new(file_tool_set(&workspace_root)))?;

    let agent = AgentLoop::new(provider, Arc::new(router), event_bus.clone())
        .with_max_iterations(config.orchestration.max_iterations);

    let printer = tokio::spawn(print_events(event_bus.subscribe()));
    let mut conv = Conversation::new();

    if let Some(msg) = message {
        let outcome = agent.run_turn(&mut conv, msg).await;
        report(&conv, &outcome);
    } else {
        println!();
        println!("  forgeloop interactive mode");
        println!();
        println!("  Provider:   {}", config.provider.kind);
        println!("  Model:      {}", config.provider.model_or_default());
        println!("  Workspace:  {}", workspace_root.display());
        println!("  Max rounds: {}", agent.max_iterations());
        println!();
        println!("  Type your message and press Enter.");
        println!("  Type 'exit' or Ctrl+D to quit.");
        println!();

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            let prompt = line.trim();
            if prompt.is_empty() {
                continue;
            }
            if prompt == "exit" || prompt == "quit" {
                break;
            }

            let outcome = agent.run_turn(&mut conv, prompt).await;
            report(&conv, &outcome);
        }

        println!();
        println!("  Goodbye!");
        println!();
    }

    // Dropping every sender closes the bus; the printer drains what is queued, then exits.
    drop(agent);
    drop(event_bus);
    if tokio::time::timeout(PRINTER_DRAIN, printer).await.is_err() {
        tracing::debug!("Progress printer did not finish draining");
    }
    Ok(())
}

/// Print the final assistant text and how the turn ended.
fn report(conv: &Conversation, outcome: &TerminalState) {
    if let Some(last) = conv.last().filter(|m| m.role == Role::Assistant) {
        if !last.content.is_empty() {
            println!();
            for line in last.content.lines() {
                println!("  Assistant > {line}");
            }
        }
    }

    match outcome {
        TerminalState::Completed => println!(),
        TerminalState::Failed(e) => eprintln!("\n  [Error] {e}\n"),
        other => eprintln!("\n  [Stopped] {other}\n"),
    }
}

async fn print_events(rx: broadcast::Receiver<Arc<ProgressEvent>>) {
    drain_events(rx, |line| eprintln!("  {line}")).await;
}

/// Hand tool and retry echoes to `sink` until every sender is gone.
///
/// Events still queued when the bus closes are delivered before returning.
async fn drain_events<F>(mut rx: broadcast::Receiver<Arc<ProgressEvent>>, mut sink: F)
where
    F: FnMut(String),
{
    loop {
        match rx.recv().await {
            Ok(event) => match event.as_ref() {
                ProgressEvent::ToolCallStarted { .. }
                | ProgressEvent::ToolCallFinished { .. }
                | ProgressEvent::RetryScheduled { .. } => sink(event.to_string()),
                _ => tracing::debug!("{event}"),
            },
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Progress printer fell behind");
            }
            Err(RecvError::Closed) => break,
        }
    }
}
