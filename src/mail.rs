//! The email flow: optional body rewrite, guarded send, structural fallback.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use boardroom_core::{MailSettings, SessionId};
use boardroom_orchestrator::{AttemptFailure, Fallback, ResiliencePolicy, ResilientInvoker, WorkerError};

use crate::conversation::{Conversation, Question};
use crate::error::Result;

/// The message the user asked to send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailRequest {
    pub recipient: String,
    pub subject: String,
    pub body: String,
}

impl EmailRequest {
    pub fn new(
        recipient: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            recipient: recipient.into(),
            subject: subject.into(),
            body: body.into(),
        }
    }
}

/// The side-effecting delivery tool.
#[async_trait]
pub trait EmailSender: Send + Sync {
    /// Deliver the email and return a confirmation message.
    async fn send(&self, email: &EmailRequest) -> std::result::Result<String, WorkerError>;
}

/// Sender that only logs the message.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogEmailSender;

#[async_trait]
impl EmailSender for LogEmailSender {
    async fn send(&self, email: &EmailRequest) -> std::result::Result<String, WorkerError> {
        info!(
            recipient = %email.recipient,
            subject = %email.subject,
            body = %email.body,
            "Sending email"
        );
        Ok("Email sent successfully".to_string())
    }
}

/// Check run on the tool's arguments before it is called.
pub trait InputGuardrail: Send + Sync {
    fn name(&self) -> &str;

    /// # Errors
    ///
    /// Returns the rejection reason.
    fn validate(&self, email: &EmailRequest) -> std::result::Result<(), String>;
}

/// Check run on the tool's result before it is returned.
pub trait OutputGuardrail: Send + Sync {
    fn name(&self) -> &str;

    /// # Errors
    ///
    /// Returns the rejection reason.
    fn validate(&self, email: &EmailRequest, output: &str) -> std::result::Result<(), String>;
}

/// Rejects recipients that are not a plausible address and subjects that
/// would break the header.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmailFormatValidator;

impl InputGuardrail for EmailFormatValidator {
    fn name(&self) -> &str {
        "EmailFormatValidator"
    }

    fn validate(&self, email: &EmailRequest) -> std::result::Result<(), String> {
        let recipient = email.recipient.trim();
        let valid_address = recipient
            .split_once('@')
            .is_some_and(|(local, domain)| {
                !local.is_empty()
                    && !domain.contains('@')
                    && domain.split('.').filter(|part| !part.is_empty()).count() >= 2
                    && !recipient.contains(char::is_whitespace)
            });

        if !valid_address {
            return Err(format!("'{}' is not a valid email address", email.recipient));
        }
        if email.subject.contains(['\r', '\n']) {
            return Err("subject must be a single line".to_string());
        }
        Ok(())
    }
}

/// Rejects empty confirmations from the sender.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmailOutputValidator;

impl OutputGuardrail for EmailOutputValidator {
    fn name(&self) -> &str {
        "EmailOutputValidator"
    }

    fn validate(&self, _email: &EmailRequest, output: &str) -> std::result::Result<(), String> {
        if output.trim().is_empty() {
            Err("sender returned an empty confirmation".to_string())
        } else {
            Ok(())
        }
    }
}

/// Value returned when every send attempt failed.
#[must_use]
pub fn fallback_message(email: &EmailRequest) -> String {
    format!(
        "FALLBACK: Failed to send email to {} with subject {} and body {}",
        email.recipient, email.subject, email.body
    )
}

/// Sends email through guardrails, retrying and falling back as configured.
#[derive(Clone)]
pub struct Mailer {
    conversation: Conversation,
    sender: Arc<dyn EmailSender>,
    input_guardrails: Vec<Arc<dyn InputGuardrail>>,
    output_guardrails: Vec<Arc<dyn OutputGuardrail>>,
    invoker: ResilientInvoker,
    fallback: Fallback<EmailRequest, String>,
    settings: MailSettings,
}

impl Mailer {
    /// Mailer with the standard guardrails.
    pub fn new(conversation: Conversation, sender: Arc<dyn EmailSender>, settings: MailSettings) -> Self {
        Self {
            conversation,
            sender,
            input_guardrails: vec![Arc::new(EmailFormatValidator)],
            output_guardrails: vec![Arc::new(EmailOutputValidator)],
            invoker: ResilientInvoker::new(ResiliencePolicy::from(&settings.resilience)),
            fallback: Arc::new(|email: &EmailRequest, _: &AttemptFailure| fallback_message(email)),
            settings,
        }
    }

    #[must_use]
    pub fn with_input_guardrail(mut self, guardrail: Arc<dyn InputGuardrail>) -> Self {
        self.input_guardrails.push(guardrail);
        self
    }

    #[must_use]
    pub fn with_output_guardrail(mut self, guardrail: Arc<dyn OutputGuardrail>) -> Self {
        self.output_guardrails.push(guardrail);
        self
    }

    /// Rewrite the body if configured, then send.
    ///
    /// A failed send never surfaces as an error: the fallback message built
    /// from the request is returned instead.
    ///
    /// # Errors
    ///
    /// Returns an error only if the body rewrite fails.
    pub async fn send(&self, session: &SessionId, email: EmailRequest) -> Result<String> {
        let email = if self.settings.rewrite_body {
            let question = Question {
                system_message: self.settings.rewrite_instruction.clone(),
                text: email.body.clone(),
            };
            let body = self.conversation.ask(session, &question).await?;
            EmailRequest { body, ..email }
        } else {
            email
        };

        let operation = || self.deliver(&email);
        let settled = self
            .invoker
            .invoke("EmailSender", &email, operation, Some(&self.fallback))
            .await?;

        info!(
            session = %session,
            recipient = %email.recipient,
            attempts = settled.attempts,
            fallback = settled.is_fallback(),
            "Email flow finished"
        );
        Ok(settled.value)
    }

    async fn deliver(&self, email: &EmailRequest) -> std::result::Result<String, WorkerError> {
        for guardrail in &self.input_guardrails {
            guardrail
                .validate(email)
                .map_err(|reason| WorkerError::gate_rejected(guardrail.name(), reason))?;
        }

        let output = self.sender.send(email).await?;

        for guardrail in &self.output_guardrails {
            guardrail
                .validate(email, &output)
                .map_err(|reason| WorkerError::gate_rejected(guardrail.name(), reason))?;
        }
        Ok(output)
    }
}

impl std::fmt::Debug for Mailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mailer")
            .field("input_guardrails", &self.input_guardrails.len())
            .field("output_guardrails", &self.output_guardrails.len())
            .field("invoker", &self.invoker)
            .field("rewrite_body", &self.settings.rewrite_body)
            .finish_non_exhaustive()
    }
}
