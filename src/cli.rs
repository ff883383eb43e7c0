//! CLI command definitions using clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::poem::DEFAULT_LINES;

/// Boardroom - parallel advisors with session accounting
#[derive(Parser, Debug)]
#[command(name = "boardroom")]
#[command(version)]
#[command(about = "Ask a board of AI advisors, send email, write poems")]
#[command(
    long_about = "Boardroom asks its CFO, CTO and CEO advisors in parallel, answers questions with or without memory, sends guarded email and streams poems. The cost of the session is printed after every command."
)]
pub struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ask every advisor about a topic and print the summary
    Meeting {
        /// Topic under discussion
        topic: String,

        /// Session to charge (generated if omitted)
        #[arg(short, long)]
        session: Option<String>,
    },

    /// Ask a single question
    Ask {
        /// The question
        question: String,

        /// System message for the model
        #[arg(long, default_value = "You are a helpful assistant")]
        system: String,

        /// Use and update the session's chat memory
        #[arg(short, long, default_value_t = false)]
        memory: bool,

        /// Session to charge (generated if omitted)
        #[arg(short, long)]
        session: Option<String>,
    },

    /// Send an email through the guarded mail flow
    Email {
        /// Recipient address
        #[arg(short, long)]
        recipient: String,

        /// Subject line
        #[arg(long)]
        subject: String,

        /// Message body
        #[arg(short, long)]
        body: String,

        /// Send the body as written instead of rewriting it
        #[arg(long, default_value_t = false)]
        no_rewrite: bool,

        /// Session to charge (generated if omitted)
        #[arg(short, long)]
        session: Option<String>,
    },

    /// Stream a poem about a topic
    Poem {
        /// What the poem is about
        topic: String,

        /// Number of lines
        #[arg(short, long, default_value_t = DEFAULT_LINES)]
        lines: u32,

        /// Session to charge (generated if omitted)
        #[arg(short, long)]
        session: Option<String>,
    },
}

impl Commands {
    /// The session named on the command line, if any.
    #[must_use]
    pub fn session(&self) -> Option<&str> {
        match self {
            Self::Meeting { session, .. }
            | Self::Ask { session, .. }
            | Self::Email { session, .. }
            | Self::Poem { session, .. } => session.as_deref(),
        }
    }
}
