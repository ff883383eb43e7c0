//! The board meeting: three advisors asked in parallel, then summarized.

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use boardroom_backend::{CompletionBackend, CompletionRequest};
use boardroom_orchestrator::{
    ParallelOrchestrator, ResiliencePolicy, Scope, TOPIC_KEY, Worker, WorkerError, WorkerSpec,
};

use crate::metering::Metering;

const CFO_PROMPT: &str = "\
You are the CFO of a small company that develops software and simple hardware products.
You are asked to give your input to the current topic and must comment on the topic from a financial perspective.
Your strategic goals are:
- Increase the company's revenue by 20% in the next 6 months
- Reduce the company's expenses by 10% in the next 6 months
";

const CTO_PROMPT: &str = "\
You are the CTO of a small company that develops software and simple hardware products.
You are asked to give your input to the current topic and must comment on the topic from a technical perspective.
Your strategic goals are:
- Ensure that the company can deliver high quality products
- Ensure that the company can deliver products on time
- Ensure that the company can deliver products with a low cost
- Ensure that the company can deliver products with a low risk
- Ensure that the company can remain innovative
- Ensure that the company can deliver products with a low complexity
- Ensure that the company can deliver new products
";

const CEO_PROMPT: &str = "\
You are the CEO of a small company that develops software and simple hardware products.
You are asked to give your input to the current topic and must comment on the topic from a business perspective.
Your strategic goals are:
- Ensure that the company goals are met
- Ensure that the company is profitable
- Ensure that the company is sustainable
";

/// A seat at the board meeting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advisor {
    Cfo,
    Cto,
    Ceo,
}

impl Advisor {
    pub const ALL: [Self; 3] = [Self::Cfo, Self::Cto, Self::Ceo];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Cfo => "Chief Financial Officer",
            Self::Cto => "Chief Technical Officer",
            Self::Ceo => "Chief Executive Officer",
        }
    }

    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Cfo => "This agent gives financial input to the current topic",
            Self::Cto => "This agent gives technical input to the current topic",
            Self::Ceo => "This agent gives business input to the current topic",
        }
    }

    /// Scope key the advisor's answer is stored under.
    #[must_use]
    pub const fn output_key(self) -> &'static str {
        match self {
            Self::Cfo => "cfoInput",
            Self::Cto => "ctoInput",
            Self::Ceo => "ceoInput",
        }
    }

    #[must_use]
    pub const fn system_prompt(self) -> &'static str {
        match self {
            Self::Cfo => CFO_PROMPT,
            Self::Cto => CTO_PROMPT,
            Self::Ceo => CEO_PROMPT,
        }
    }

    /// Label used in the meeting summary.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Cfo => "CFO",
            Self::Cto => "CTO",
            Self::Ceo => "CEO",
        }
    }
}

/// Asks the model for one advisor's view on the scope's topic.
struct AdvisorWorker {
    advisor: Advisor,
    metering: Metering,
}

#[async_trait]
impl Worker for AdvisorWorker {
    async fn invoke(&self, scope: &Scope) -> Result<Value, WorkerError> {
        let topic = scope
            .get_str(TOPIC_KEY)
            .ok_or_else(|| WorkerError::missing_input(TOPIC_KEY))?;
        let session = scope
            .session_id()
            .map_err(|e| WorkerError::failed(e.to_string()))?;

        let request = CompletionRequest::new()
            .system(self.advisor.system_prompt())
            .user(topic);

        let completion = self
            .metering
            .for_session(&session)
            .complete(request)
            .await
            .map_err(|e| WorkerError::failed(e.to_string()))?;

        info!(
            advisor = self.advisor.label(),
            session = %session,
            chars = completion.text.len(),
            "Advisor answered"
        );
        Ok(Value::String(completion.text))
    }
}

/// Worker specs for every advisor, in meeting order.
///
/// # Errors
///
/// Returns an orchestrator error if a spec is incomplete.
pub fn advisor_specs(metering: &Metering) -> boardroom_orchestrator::Result<Vec<WorkerSpec>> {
    Advisor::ALL
        .into_iter()
        .map(|advisor| {
            WorkerSpec::builder(advisor.name())
                .description(advisor.description())
                .output_key(advisor.output_key())
                .worker(AdvisorWorker {
                    advisor,
                    metering: metering.clone(),
                })
                .build()
        })
        .collect()
}

/// The parallel board meeting.
///
/// # Errors
///
/// Returns an orchestrator error if the worker set is invalid.
pub fn board_meeting(
    metering: &Metering,
    policy: ResiliencePolicy,
) -> boardroom_orchestrator::Result<ParallelOrchestrator> {
    ParallelOrchestrator::builder("Meeting Member Inputs Agent")
        .default_policy(policy)
        .workers(advisor_specs(metering)?)
        .build()
}

/// Reduce a completed meeting scope to the summary text.
#[must_use]
pub fn summarize(scope: &Scope) -> String {
    let topic = scope.get_str(TOPIC_KEY).unwrap_or_default();
    let inputs = Advisor::ALL.into_iter().map(|advisor| {
        format!(
            "{} Input: {}",
            advisor.label(),
            scope.get_str(advisor.output_key()).unwrap_or_default()
        )
    });

    std::iter::once(format!("Topic: {topic}"))
        .chain(inputs)
        .collect::<Vec<_>>()
        .join("\n")
}
