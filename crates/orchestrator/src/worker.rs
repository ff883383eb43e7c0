//! Worker trait and worker specifications.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{AttemptFailure, Error, Result, WorkerError};
use crate::resilience::ResiliencePolicy;
use crate::scope::Scope;

/// A unit of computation producing one named value from a read-only scope.
///
/// Workers must not depend on each other's output within the same fan-out;
/// they all see the seed snapshot.
#[async_trait]
pub trait Worker: Send + Sync {
    /// Compute this worker's output.
    async fn invoke(&self, scope: &Scope) -> std::result::Result<Value, WorkerError>;
}

/// Terminal-failure substitute. Receives the original input and the last failure.
///
/// Must be total: there is no recovery tier behind it.
pub type Fallback<I, T> = Arc<dyn Fn(&I, &AttemptFailure) -> T + Send + Sync>;

/// Adapter turning an async closure into a [`Worker`].
pub struct FnWorker<F> {
    f: F,
}

impl<F> FnWorker<F> {
    pub const fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> Worker for FnWorker<F>
where
    F: Fn(Scope) -> Fut + Send + Sync,
    Fut: Future<Output = std::result::Result<Value, WorkerError>> + Send,
{
    async fn invoke(&self, scope: &Scope) -> std::result::Result<Value, WorkerError> {
        (self.f)(scope.clone()).await
    }
}

/// A registered worker: identity, declared output key, the callable unit and
/// its optional resilience overrides.
#[derive(Clone)]
pub struct WorkerSpec {
    name: String,
    description: String,
    output_key: String,
    worker: Arc<dyn Worker>,
    policy: Option<ResiliencePolicy>,
    fallback: Option<Fallback<Scope, Value>>,
}

impl WorkerSpec {
    /// Start building a spec for the named worker.
    pub fn builder(name: impl Into<String>) -> WorkerSpecBuilder {
        WorkerSpecBuilder {
            name: name.into(),
            description: String::new(),
            output_key: None,
            worker: None,
            policy: None,
            fallback: None,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    #[must_use]
    pub fn output_key(&self) -> &str {
        &self.output_key
    }

    #[must_use]
    pub fn worker(&self) -> &Arc<dyn Worker> {
        &self.worker
    }

    /// Per-worker policy override, if any.
    #[must_use]
    pub const fn policy(&self) -> Option<&ResiliencePolicy> {
        self.policy.as_ref()
    }

    #[must_use]
    pub const fn fallback(&self) -> Option<&Fallback<Scope, Value>> {
        self.fallback.as_ref()
    }
}

impl fmt::Debug for WorkerSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerSpec")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("output_key", &self.output_key)
            .field("policy", &self.policy)
            .field("has_fallback", &self.fallback.is_some())
            .finish_non_exhaustive()
    }
}

/// Builder for [`WorkerSpec`].
pub struct WorkerSpecBuilder {
    name: String,
    description: String,
    output_key: Option<String>,
    worker: Option<Arc<dyn Worker>>,
    policy: Option<ResiliencePolicy>,
    fallback: Option<Fallback<Scope, Value>>,
}

impl WorkerSpecBuilder {
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn output_key(mut self, key: impl Into<String>) -> Self {
        self.output_key = Some(key.into());
        self
    }

    #[must_use]
    pub fn worker(mut self, worker: impl Worker + 'static) -> Self {
        self.worker = Some(Arc::new(worker));
        self
    }

    #[must_use]
    pub fn shared_worker(mut self, worker: Arc<dyn Worker>) -> Self {
        self.worker = Some(worker);
        self
    }

    #[must_use]
    pub const fn policy(mut self, policy: ResiliencePolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    #[must_use]
    pub fn fallback<F>(mut self, fallback: F) -> Self
    where
        F: Fn(&Scope, &AttemptFailure) -> Value + Send + Sync + 'static,
    {
        self.fallback = Some(Arc::new(fallback));
        self
    }

    /// Finish the spec.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidWorkerSpec` if the name or output key is blank
    /// or no worker was supplied.
    pub fn build(self) -> Result<WorkerSpec> {
        if self.name.trim().is_empty() {
            return Err(Error::invalid_worker_spec(&self.name, "name must not be empty"));
        }

        let output_key = self
            .output_key
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| Error::invalid_worker_spec(&self.name, "output key is required"))?;

        let worker = self
            .worker
            .ok_or_else(|| Error::invalid_worker_spec(&self.name, "worker is required"))?;

        Ok(WorkerSpec {
            name: self.name,
            description: self.description,
            output_key,
            worker,
            policy: self.policy,
            fallback: self.fallback,
        })
    }
}
