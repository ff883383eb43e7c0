#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

//! # boardroom-backend
//!
//! Text-generation backends for Boardroom.
//!
//! The engine only sees the [`CompletionBackend`] trait. [`OpenAiBackend`]
//! implements it for any server speaking the OpenAI chat-completions
//! protocol, including streamed responses over Server-Sent Events.
//!
//! ## Example
//!
//! ```ignore
//! use boardroom_backend::{CompletionBackend, CompletionRequest, OpenAiBackend};
//!
//! let backend = OpenAiBackend::from_settings(config.backend)?;
//! let completion = backend
//!     .complete(CompletionRequest::new().system("You are a professional poet").user("Write a haiku"))
//!     .await?;
//! println!("{} ({} tokens out)", completion.text, completion.usage.output_tokens);
//! ```

pub mod backend;
pub mod error;
pub mod openai;
pub mod sse;
pub mod types;

pub use backend::{CompletionBackend, EventStream};
pub use error::{Error, Result};
pub use openai::OpenAiBackend;
pub use sse::{SseData, SseDecoder};
pub use types::{Completion, CompletionRequest, Message, StreamEvent, TokenUsage};
