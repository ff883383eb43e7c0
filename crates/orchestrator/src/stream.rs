//! Lazy, restartable chunk streams.
//!
//! Opening a stream (up to and including its first chunk) goes through a
//! [`ResilientInvoker`], so a backend that fails before producing anything is
//! retried like any other worker. Once a chunk has been handed to the caller
//! the stream is never reopened; a later failure ends it with
//! `Error::StreamInterrupted`.

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::stream::{self, BoxStream};
use futures::{FutureExt, StreamExt};
use tracing::{debug, warn};

use boardroom_core::Chunk;

use crate::error::{Error, Result, WorkerError};
use crate::resilience::ResilientInvoker;
use crate::worker::Fallback;

/// Raw chunks produced by a backend.
pub type ChunkStream = BoxStream<'static, std::result::Result<Chunk, WorkerError>>;

type Opener = Arc<dyn Fn() -> BoxFuture<'static, std::result::Result<ChunkStream, WorkerError>> + Send + Sync>;

enum State {
    Pending,
    Open { chunks: ChunkStream, delivered: usize },
    Finished,
}

/// A chunk source that can be consumed any number of times; each call to
/// [`Self::stream`] opens a fresh sequence.
#[derive(Clone)]
pub struct RestartableStream {
    name: String,
    invoker: ResilientInvoker,
    opener: Opener,
}

impl RestartableStream {
    pub fn new<F, Fut>(name: impl Into<String>, invoker: ResilientInvoker, opener: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<ChunkStream, WorkerError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            invoker,
            opener: Arc::new(move || opener().boxed()),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Open the stream. Nothing happens until the first item is polled.
    ///
    /// Yields text chunks in order and ends after the completion marker. If
    /// the stream cannot be opened, or breaks off after delivering chunks,
    /// the final item is an error.
    #[must_use]
    pub fn stream(&self) -> BoxStream<'static, Result<String>> {
        let name = self.name.clone();
        let invoker = self.invoker.clone();
        let opener = Arc::clone(&self.opener);

        stream::unfold(State::Pending, move |state| {
            let name = name.clone();
            let invoker = invoker.clone();
            let opener = Arc::clone(&opener);
            async move { advance(state, &name, &invoker, &opener).await }
        })
        .boxed()
    }
}

impl std::fmt::Debug for RestartableStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestartableStream")
            .field("name", &self.name)
            .field("invoker", &self.invoker)
            .finish_non_exhaustive()
    }
}

async fn advance(
    state: State,
    name: &str,
    invoker: &ResilientInvoker,
    opener: &Opener,
) -> Option<(Result<String>, State)> {
    match state {
        State::Pending => {
            let open = || {
                let opener = Arc::clone(opener);
                async move {
                    let mut chunks = opener().await?;
                    match chunks.next().await {
                        Some(Ok(first)) => Ok((first, chunks)),
                        Some(Err(e)) => Err(e),
                        None => Err(WorkerError::failed("stream closed before the first chunk")),
                    }
                }
            };
            let no_fallback: Option<&Fallback<(), (Chunk, ChunkStream)>> = None;

            match invoker.invoke(name, &(), open, no_fallback).await {
                Ok(settled) => {
                    let (first, chunks) = settled.value;
                    debug!(stream = name, attempts = settled.attempts, "Stream opened");
                    match first {
                        Chunk::Text(text) => Some((Ok(text), State::Open { chunks, delivered: 1 })),
                        Chunk::Done => None,
                    }
                }
                Err(e) => Some((Err(e), State::Finished)),
            }
        }
        State::Open {
            mut chunks,
            delivered,
        } => match chunks.next().await {
            Some(Ok(Chunk::Text(text))) => Some((
                Ok(text),
                State::Open {
                    chunks,
                    delivered: delivered.saturating_add(1),
                },
            )),
            Some(Ok(Chunk::Done)) => {
                debug!(stream = name, delivered, "Stream completed");
                None
            }
            Some(Err(e)) => {
                warn!(stream = name, delivered, error = %e, "Stream interrupted");
                Some((
                    Err(Error::stream_interrupted(name, delivered, e.to_string())),
                    State::Finished,
                ))
            }
            None => {
                warn!(stream = name, delivered, "Stream ended without completion marker");
                Some((
                    Err(Error::stream_interrupted(
                        name,
                        delivered,
                        "ended without completion marker",
                    )),
                    State::Finished,
                ))
            }
        },
        State::Finished => None,
    }
}
