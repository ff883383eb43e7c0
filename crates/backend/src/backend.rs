//! The text-generation backend seam.

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::Result;
use crate::types::{Completion, CompletionRequest, StreamEvent};

/// Events of one streamed completion.
pub type EventStream = BoxStream<'static, Result<StreamEvent>>;

/// Anything that turns a chat request into generated text.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Model used when a request does not name one.
    fn default_model(&self) -> &str;

    /// Run the request to completion.
    async fn complete(&self, request: CompletionRequest) -> Result<Completion>;

    /// Start a streamed completion.
    ///
    /// A well-formed stream ends with [`StreamEvent::Done`]; one that ends
    /// without it was cut off.
    async fn stream(&self, request: CompletionRequest) -> Result<EventStream>;
}
