//! Ask command - answers one question in the terminal

use std::io::Write;

use clap::Args;

use crate::api::types::Speaker;
use crate::config::AppConfig;
use crate::domain::llm::Message;
use crate::infrastructure::agent::WorkflowRun;
use crate::infrastructure::logging;

#[derive(Args, Debug)]
pub struct AskArgs {
    /// Question about the data
    pub question: String,
}

/// Run one turn, printing every message as it is produced
pub async fn run(args: AskArgs) -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load()?;
    logging::init_logging(&config.logging_config());

    let database = crate::connect_database(&config).await?;
    let agent = crate::build_agent(&config, database)?;

    let mut out = std::io::stdout().lock();
    write_turn(agent.start_turn(args.question.clone()), &args.question, &mut out).await?;

    Ok(())
}

/// Write every message of the turn as it is produced, then the token total.
/// The answer is the last message written.
async fn write_turn(
    mut run: WorkflowRun,
    question: &str,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    writeln!(out, "{}\n", render_message(&Message::user(question)))?;

    while let Some(step) = run.next_step().await? {
        for message in &step.messages {
            writeln!(out, "{}\n", render_message(message))?;
        }
    }

    let outcome = run.finish().await?;
    writeln!(
        out,
        "The total number of tokens used in this conversation was: {}",
        outcome.usage.total_tokens()
    )?;

    Ok(())
}

/// Render a transcript message with its speaker label
fn render_message(message: &Message) -> String {
    let label = Speaker::of(message).label();
    let calls = message.tool_calls();

    if calls.is_empty() {
        return format!("{}: {}", label, message.content_text().unwrap_or_default());
    }

    let mut out = String::new();
    if let Some(text) = message.content_text().filter(|t| !t.is_empty()) {
        out.push_str(&format!("{}: {}\n", label, text));
    }
    out.push_str(&format!("{}: Using the following tools:", label));
    for call in calls {
        out.push_str(&format!("\n  - {} {}", call.name, call.arguments));
    }
    out
}
