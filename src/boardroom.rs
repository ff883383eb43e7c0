//! The application facade wiring every flow to one backend, one memory store
//! and one accountant.

use std::sync::Arc;

use tracing::info;

use boardroom_backend::CompletionBackend;
use boardroom_core::{BoardroomConfig, SessionId};
use boardroom_orchestrator::{ParallelOrchestrator, ResiliencePolicy, ResilientInvoker, RestartableStream, Scope};
use boardroom_session::{ChatMemoryStore, Cost, ModelCost, UsageAccountant};

use crate::advisors::{board_meeting, summarize};
use crate::conversation::{Conversation, Question};
use crate::error::Result;
use crate::mail::{EmailRequest, EmailSender, LogEmailSender, Mailer};
use crate::metering::Metering;
use crate::poem::PoemWriter;

/// Every Boardroom flow behind one handle. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Boardroom {
    meeting: Arc<ParallelOrchestrator>,
    conversation: Conversation,
    mailer: Mailer,
    poems: PoemWriter,
    memory: Arc<ChatMemoryStore>,
    accountant: Arc<UsageAccountant>,
}

impl Boardroom {
    /// Wire the flows with a sender that only logs.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: &BoardroomConfig, backend: Arc<dyn CompletionBackend>) -> Result<Self> {
        Self::with_email_sender(config, backend, Arc::new(LogEmailSender))
    }

    /// Wire the flows with a custom email sender.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn with_email_sender(
        config: &BoardroomConfig,
        backend: Arc<dyn CompletionBackend>,
        sender: Arc<dyn EmailSender>,
    ) -> Result<Self> {
        config.validate()?;

        let memory = Arc::new(ChatMemoryStore::from_settings(&config.memory)?);
        let accountant = Arc::new(UsageAccountant::from_settings(&config.usage));
        let metering = Metering::new(backend, Arc::clone(&accountant));

        let policy = ResiliencePolicy::from(&config.resilience);
        let invoker = ResilientInvoker::new(policy.clone());

        let meeting = Arc::new(board_meeting(&metering, policy)?);
        let conversation = Conversation::new(metering.clone(), Arc::clone(&memory), invoker.clone());
        let mailer = Mailer::new(conversation.clone(), sender, config.mail.clone());
        let poems = PoemWriter::new(metering, invoker);

        Ok(Self {
            meeting,
            conversation,
            mailer,
            poems,
            memory,
            accountant,
        })
    }

    /// Ask every advisor about `topic` in parallel and return the summary.
    ///
    /// # Errors
    ///
    /// Returns the join failure naming every advisor that could not answer.
    pub async fn run(&self, topic: &str, session: &SessionId) -> Result<String> {
        info!(session = %session, topic, "Board meeting started");
        let summary = self
            .meeting
            .run(Scope::seeded(topic, session), summarize)
            .await?;
        Ok(summary)
    }

    /// # Errors
    ///
    /// Returns an error if every attempt failed.
    pub async fn ask(&self, session: &SessionId, question: &Question) -> Result<String> {
        self.conversation.ask(session, question).await
    }

    /// # Errors
    ///
    /// Returns an error if every attempt failed.
    pub async fn ask_with_memory(&self, session: &SessionId, question: &Question) -> Result<String> {
        self.conversation.ask_with_memory(session, question).await
    }

    /// # Errors
    ///
    /// Returns an error only if the body rewrite failed; a failed send
    /// yields the fallback message.
    pub async fn send_email(&self, session: &SessionId, email: EmailRequest) -> Result<String> {
        self.mailer.send(session, email).await
    }

    #[must_use]
    pub fn write_poem(&self, session: &SessionId, topic: &str, lines: u32) -> RestartableStream {
        self.poems.write(session, topic, lines)
    }

    /// Cost of everything charged to `session` so far.
    ///
    /// # Errors
    ///
    /// Returns an error if a model used in the session has no price.
    pub fn cost(&self, session: &SessionId) -> Result<Cost> {
        Ok(self.accountant.total_cost(session)?)
    }

    /// Per-model cost of `session`, in first-use order.
    ///
    /// # Errors
    ///
    /// Returns an error if a model used in the session has no price.
    pub fn breakdown(&self, session: &SessionId) -> Result<Vec<ModelCost>> {
        Ok(self.accountant.breakdown(session)?)
    }

    #[must_use]
    pub fn meeting(&self) -> &ParallelOrchestrator {
        &self.meeting
    }

    #[must_use]
    pub fn memory(&self) -> &ChatMemoryStore {
        &self.memory
    }

    #[must_use]
    pub fn accountant(&self) -> &UsageAccountant {
        &self.accountant
    }
}
