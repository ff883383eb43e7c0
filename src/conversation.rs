//! Free-form questions, with or without session memory.

use std::sync::Arc;

use tracing::debug;

use boardroom_backend::{CompletionBackend, CompletionRequest};
use boardroom_core::{SessionId, Turn};
use boardroom_orchestrator::{Fallback, ResilientInvoker, WorkerError};
use boardroom_session::ChatMemoryStore;

use crate::error::Result;
use crate::metering::Metering;

/// One question for the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub system_message: String,
    pub text: String,
}

/// Answers questions through the metered backend.
#[derive(Debug, Clone)]
pub struct Conversation {
    metering: Metering,
    memory: Arc<ChatMemoryStore>,
    invoker: ResilientInvoker,
}

impl Conversation {
    pub fn new(metering: Metering, memory: Arc<ChatMemoryStore>, invoker: ResilientInvoker) -> Self {
        Self {
            metering,
            memory,
            invoker,
        }
    }

    /// Ask without reading or writing session memory.
    ///
    /// # Errors
    ///
    /// Returns `Exhausted` if every attempt against the backend failed.
    pub async fn ask(&self, session: &SessionId, question: &Question) -> Result<String> {
        let request = CompletionRequest::new()
            .system(&question.system_message)
            .user(&question.text);
        self.complete(session, "ask", question, request).await
    }

    /// Ask with the session's prior turns as context, then remember the
    /// question and the answer.
    ///
    /// Nothing is remembered if the call fails.
    ///
    /// # Errors
    ///
    /// Returns `Exhausted` if every attempt against the backend failed.
    pub async fn ask_with_memory(&self, session: &SessionId, question: &Question) -> Result<String> {
        let window = self.memory.get(session);
        let history = window.snapshot();
        debug!(session = %session, turns = history.len(), "Asking with memory");

        let request = CompletionRequest::new()
            .system(&question.system_message)
            .history(&history)
            .user(&question.text);
        let answer = self.complete(session, "ask-with-memory", question, request).await?;

        window.extend([Turn::user(&question.text), Turn::assistant(&answer)]);
        Ok(answer)
    }

    async fn complete(
        &self,
        session: &SessionId,
        name: &str,
        question: &Question,
        request: CompletionRequest,
    ) -> Result<String> {
        let backend = self.metering.for_session(session);
        let operation = || {
            let backend = backend.clone();
            let request = request.clone();
            async move {
                backend
                    .complete(request)
                    .await
                    .map(|completion| completion.text)
                    .map_err(|e| WorkerError::failed(e.to_string()))
            }
        };

        let no_fallback: Option<&Fallback<Question, String>> = None;
        let settled = self.invoker.invoke(name, question, operation, no_fallback).await?;
        Ok(settled.value)
    }
}
