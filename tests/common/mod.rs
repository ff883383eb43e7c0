//! A scripted completion backend for end-to-end flow tests.

#![allow(dead_code)]

use std::sync::Mutex;
use std::sync::PoisonError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream;

use boardroom_backend::{
    Completion, CompletionBackend, CompletionRequest, Error, EventStream, Result, StreamEvent,
    TokenUsage,
};
use boardroom_core::{BoardroomConfig, ResilienceSettings, Role};

pub const MODEL: &str = "gpt-4.1-nano";

/// One million input tokens per call: $0.40 on the model above.
pub const USAGE: TokenUsage = TokenUsage {
    input_tokens: 1_000_000,
    output_tokens: 0,
};

struct Rule {
    needle: String,
    reply: Option<String>,
    failures_left: usize,
}

/// Answers by matching the system message against registered needles.
///
/// Without a matching reply the backend echoes the last user message.
pub struct ScriptedBackend {
    model: String,
    rules: Mutex<Vec<Rule>>,
    requests: Mutex<Vec<CompletionRequest>>,
    calls: AtomicUsize,
    cut_stream: Option<usize>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self {
            model: MODEL.to_string(),
            rules: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            cut_stream: None,
        }
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    /// Reply with `text` when the system message contains `needle`.
    pub fn reply_when(self, needle: &str, text: &str) -> Self {
        self.push_rule(needle, Some(text.to_string()), 0)
    }

    /// Fail the first `times` calls whose system message contains `needle`.
    pub fn fail_when(self, needle: &str, times: usize) -> Self {
        self.push_rule(needle, None, times)
    }

    /// End streams after `deltas` text events without the end marker.
    pub fn cut_streams_after(mut self, deltas: usize) -> Self {
        self.cut_stream = Some(deltas);
        self
    }

    fn push_rule(self, needle: &str, reply: Option<String>, failures_left: usize) -> Self {
        self.rules
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Rule {
                needle: needle.to_string(),
                reply,
                failures_left,
            });
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn answer(&self, request: &CompletionRequest) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        let system = request
            .messages
            .iter()
            .find(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .unwrap_or_default();

        let mut rules = self.rules.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(rule) = rules
            .iter_mut()
            .find(|rule| rule.failures_left > 0 && system.contains(&rule.needle))
        {
            rule.failures_left -= 1;
            return Err(Error::api(503, "scripted failure"));
        }
        if let Some(reply) = rules
            .iter()
            .filter(|rule| system.contains(&rule.needle))
            .find_map(|rule| rule.reply.clone())
        {
            return Ok(reply);
        }
        drop(rules);

        let last_user = request
            .messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.clone())
            .unwrap_or_default();
        Ok(format!("echo: {last_user}"))
    }
}

#[async_trait]
impl CompletionBackend for ScriptedBackend {
    fn default_model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: CompletionRequest) -> Result<Completion> {
        let text = self.answer(&request)?;
        Ok(Completion {
            text,
            model: self.model.clone(),
            usage: USAGE,
        })
    }

    async fn stream(&self, request: CompletionRequest) -> Result<EventStream> {
        let text = self.answer(&request)?;
        let deltas: Vec<StreamEvent> = text
            .split_inclusive(' ')
            .map(|word| StreamEvent::Delta(word.to_string()))
            .collect();

        let events: Vec<Result<StreamEvent>> = match self.cut_stream {
            Some(limit) => deltas.into_iter().take(limit).map(Ok).collect(),
            None => deltas
                .into_iter()
                .chain([
                    StreamEvent::Usage {
                        model: self.model.clone(),
                        usage: USAGE,
                    },
                    StreamEvent::Done,
                ])
                .map(Ok)
                .collect(),
        };
        Ok(stream::iter(events).boxed())
    }
}

/// Configuration with fast retries suitable for tests.
pub fn fast_config(max_retries: u32) -> BoardroomConfig {
    let resilience = ResilienceSettings {
        max_retries,
        delay: Duration::from_millis(1),
        jitter: Duration::ZERO,
        timeout: Duration::from_secs(5),
    };
    let mut config = BoardroomConfig::default();
    config.resilience = resilience.clone();
    config.mail.resilience = resilience;
    config
}
