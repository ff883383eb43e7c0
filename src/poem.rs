//! Streamed poem generation.

use futures::StreamExt;

use boardroom_backend::{CompletionBackend, CompletionRequest, StreamEvent};
use boardroom_core::{Chunk, SessionId};
use boardroom_orchestrator::{ChunkStream, RestartableStream, ResilientInvoker, WorkerError};

use crate::metering::Metering;

pub const DEFAULT_LINES: u32 = 4;

const POET_PROMPT: &str = "You are a professional poet";

fn poem_request(topic: &str, lines: u32) -> CompletionRequest {
    CompletionRequest::new()
        .system(POET_PROMPT)
        .user(format!(
            "Write a poem about {topic}.\nThe poem should be {lines} lines long."
        ))
}

/// Writes poems as restartable chunk streams.
#[derive(Debug, Clone)]
pub struct PoemWriter {
    metering: Metering,
    invoker: ResilientInvoker,
}

impl PoemWriter {
    pub fn new(metering: Metering, invoker: ResilientInvoker) -> Self {
        Self { metering, invoker }
    }

    /// A stream of the poem's text. No request is made until it is polled.
    #[must_use]
    pub fn write(&self, session: &SessionId, topic: &str, lines: u32) -> RestartableStream {
        let backend = self.metering.for_session(session);
        let request = poem_request(topic, lines);

        RestartableStream::new("poem", self.invoker.clone(), move || {
            let backend = backend.clone();
            let request = request.clone();
            async move {
                let events = backend
                    .stream(request)
                    .await
                    .map_err(|e| WorkerError::failed(e.to_string()))?;
                let chunks: ChunkStream = events
                    .filter_map(|event| async move {
                        match event {
                            Ok(StreamEvent::Delta(text)) => Some(Ok(Chunk::Text(text))),
                            Ok(StreamEvent::Done) => Some(Ok(Chunk::Done)),
                            Ok(StreamEvent::Usage { .. }) => None,
                            Err(e) => Some(Err(WorkerError::failed(e.to_string()))),
                        }
                    })
                    .boxed();
                Ok(chunks)
            }
        })
    }
}
