#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

//! # Boardroom
//!
//! A board of advisors asked in parallel, plus free-form questions, a guarded
//! email flow and streamed poems. Every model call is retried under a
//! resilience policy and charged to the session it was made for.
//!
//! The building blocks live in the workspace crates and are re-exported here.

pub use boardroom_backend;
pub use boardroom_core;
pub use boardroom_orchestrator;
pub use boardroom_session;

pub mod advisors;
pub mod boardroom;
pub mod cli;
pub mod conversation;
pub mod error;
pub mod mail;
pub mod metering;
pub mod poem;

pub use advisors::{Advisor, board_meeting, summarize};
pub use boardroom::Boardroom;
pub use conversation::{Conversation, Question};
pub use error::{Error, Result};
pub use mail::{
    EmailFormatValidator, EmailOutputValidator, EmailRequest, EmailSender, InputGuardrail,
    LogEmailSender, Mailer, OutputGuardrail,
};
pub use metering::{MeteredBackend, Metering};
pub use poem::PoemWriter;
