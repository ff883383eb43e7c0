//! # boardroom-core
//!
//! Shared types for Boardroom: the core error type, result helpers,
//! session identity, conversational turns, text chunks and configuration.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod chunk;
pub mod config;
pub mod error;
pub mod result;
pub mod session;
pub mod turn;

pub use chunk::Chunk;
pub use config::{
    BackendSettings, BoardroomConfig, MailSettings, MemorySettings, ResilienceSettings,
    UsageSettings,
};
pub use error::Error;
pub use result::{Result, ResultExt};
pub use session::SessionId;
pub use turn::{Role, Turn};
