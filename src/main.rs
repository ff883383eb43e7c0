//! # Boardroom - command-line entry point
//!
//! Loads configuration, connects the OpenAI-compatible backend, runs one
//! command and prints the cost of the session it was charged to.

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]
#![deny(clippy::expect_used)]

use std::io::Write;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use futures::StreamExt;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use boardroom::boardroom_backend::OpenAiBackend;
use boardroom::boardroom_core::{BoardroomConfig, SessionId};
use boardroom::cli::{Cli, Commands};
use boardroom::{Boardroom, EmailRequest, Question};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let start_time = Instant::now();

    let mut config = BoardroomConfig::load(cli.config.as_deref())
        .context("Failed to load configuration")?;
    if let Commands::Email { no_rewrite: true, .. } = cli.command {
        config.mail.rewrite_body = false;
    }

    let backend = OpenAiBackend::from_settings(config.backend.clone())
        .context("Failed to create the chat-completions backend")?;
    let boardroom = Boardroom::new(&config, Arc::new(backend))?;

    let session = match cli.command.session() {
        Some(id) => SessionId::new(id).context("Invalid session id")?,
        None => SessionId::generate(),
    };
    info!(session = %session, "Session started");

    run_command(&boardroom, &session, cli.command).await?;

    print_cost(&boardroom, &session);
    info!(elapsed_ms = start_time.elapsed().as_millis(), "Done");
    Ok(())
}

async fn run_command(boardroom: &Boardroom, session: &SessionId, command: Commands) -> Result<()> {
    match command {
        Commands::Meeting { topic, .. } => {
            let summary = boardroom
                .run(&topic, session)
                .await
                .context("Board meeting failed")?;
            println!("{summary}");
        }
        Commands::Ask {
            question,
            system,
            memory,
            ..
        } => {
            let question = Question {
                system_message: system,
                text: question,
            };
            let answer = if memory {
                boardroom.ask_with_memory(session, &question).await
            } else {
                boardroom.ask(session, &question).await
            }
            .context("Question failed")?;
            println!("{answer}");
        }
        Commands::Email {
            recipient,
            subject,
            body,
            ..
        } => {
            let outcome = boardroom
                .send_email(session, EmailRequest::new(recipient, subject, body))
                .await
                .context("Email flow failed")?;
            println!("{outcome}");
        }
        Commands::Poem { topic, lines, .. } => {
            let mut chunks = boardroom.write_poem(session, &topic, lines).stream();
            let mut stdout = std::io::stdout();
            while let Some(chunk) = chunks.next().await {
                let text = chunk.context("Poem stream failed")?;
                write!(stdout, "{text}")?;
                stdout.flush()?;
            }
            writeln!(stdout)?;
        }
    }
    Ok(())
}

fn print_cost(boardroom: &Boardroom, session: &SessionId) {
    match boardroom.breakdown(session) {
        Ok(lines) => {
            for line in &lines {
                println!(
                    "  {}: {} tokens in, {} tokens out, {}",
                    line.model, line.usage.input_tokens, line.usage.output_tokens, line.cost
                );
            }
            match boardroom.cost(session) {
                Ok(total) => println!("Session {session} cost: {total}"),
                Err(e) => warn!(session = %session, error = %e, "Failed to total session cost"),
            }
        }
        Err(e) => warn!(session = %session, error = %e, "Failed to price session"),
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
