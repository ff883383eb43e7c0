//! # boardroom-orchestrator
//!
//! Fan-out/join orchestration of independent workers over a shared scope,
//! with bounded retry, per-attempt timeouts and fallbacks around every
//! invocation.
//!
//! ```text
//! seed Scope ──┬── ResilientInvoker(cfo) ──┐
//!              ├── ResilientInvoker(cto) ──┼── join ── merge ── reduce
//!              └── ResilientInvoker(ceo) ──┘
//! ```

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod parallel;
pub mod resilience;
pub mod scope;
pub mod stream;
pub mod worker;

pub use boardroom_core::Chunk;
pub use error::{AttemptFailure, Error, Result, WorkerError, WorkerFailure};
pub use parallel::{ParallelOrchestrator, ParallelOrchestratorBuilder};
pub use resilience::{ResiliencePolicy, ResilientInvoker, Settled, ValueSource};
pub use scope::{SESSION_KEY, Scope, TOPIC_KEY};
pub use stream::{ChunkStream, RestartableStream};
pub use worker::{Fallback, FnWorker, Worker, WorkerSpec, WorkerSpecBuilder};
