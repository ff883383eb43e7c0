//! Usage metering around a completion backend.
//!
//! Every completed model call is reported to the [`UsageAccountant`] under
//! the session it was made for. Pricing failures are logged and do not fail
//! the call; they resurface when the session cost is queried.

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use tracing::{error, info};

use boardroom_backend::{
    Completion, CompletionBackend, CompletionRequest, EventStream, Result, StreamEvent,
    TokenUsage,
};
use boardroom_core::SessionId;
use boardroom_session::{ModelUsage, UsageAccountant};

/// Shared backend plus the accountant its calls are charged to.
#[derive(Clone)]
pub struct Metering {
    backend: Arc<dyn CompletionBackend>,
    accountant: Arc<UsageAccountant>,
}

impl Metering {
    pub fn new(backend: Arc<dyn CompletionBackend>, accountant: Arc<UsageAccountant>) -> Self {
        Self {
            backend,
            accountant,
        }
    }

    /// A backend whose calls are charged to `session`.
    #[must_use]
    pub fn for_session(&self, session: &SessionId) -> MeteredBackend {
        MeteredBackend {
            inner: Arc::clone(&self.backend),
            accountant: Arc::clone(&self.accountant),
            session: session.clone(),
        }
    }

    #[must_use]
    pub fn accountant(&self) -> &Arc<UsageAccountant> {
        &self.accountant
    }
}

impl std::fmt::Debug for Metering {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metering")
            .field("default_model", &self.backend.default_model())
            .finish_non_exhaustive()
    }
}

/// Decorator recording token usage for one session.
#[derive(Clone)]
pub struct MeteredBackend {
    inner: Arc<dyn CompletionBackend>,
    accountant: Arc<UsageAccountant>,
    session: SessionId,
}

impl MeteredBackend {
    #[must_use]
    pub fn session(&self) -> &SessionId {
        &self.session
    }
}

fn charge(accountant: &UsageAccountant, session: &SessionId, model: &str, usage: TokenUsage) {
    info!(
        session = %session,
        model,
        input_tokens = usage.input_tokens,
        output_tokens = usage.output_tokens,
        total_tokens = usage.input_tokens.saturating_add(usage.output_tokens),
        "PRICING"
    );

    let tokens = ModelUsage::new(usage.input_tokens, 0, usage.output_tokens);
    match accountant.record(session, model, tokens) {
        Ok(cost) => info!(session = %session, model, cost = %cost, "Model call charged"),
        Err(e) => error!(session = %session, model, error = %e, "Failed to price model call"),
    }
}

#[async_trait]
impl CompletionBackend for MeteredBackend {
    fn default_model(&self) -> &str {
        self.inner.default_model()
    }

    async fn complete(&self, request: CompletionRequest) -> Result<Completion> {
        let completion = self.inner.complete(request).await?;
        charge(&self.accountant, &self.session, &completion.model, completion.usage);
        Ok(completion)
    }

    async fn stream(&self, request: CompletionRequest) -> Result<EventStream> {
        let events = self.inner.stream(request).await?;
        let accountant = Arc::clone(&self.accountant);
        let session = self.session.clone();

        Ok(events
            .inspect(move |event| {
                if let Ok(StreamEvent::Usage { model, usage }) = event {
                    charge(&accountant, &session, model, *usage);
                }
            })
            .boxed())
    }
}
