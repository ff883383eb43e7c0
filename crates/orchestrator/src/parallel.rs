//! Fan-out/join orchestration.
//!
//! Every worker is dispatched as its own task against the same read-only
//! seed snapshot. The run waits for all of them to settle, merges each
//! declared output into the scope and only then hands the scope to the
//! reducer.

use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use itertools::Itertools;
use serde_json::Value;
use tracing::{debug, error, info};

use crate::error::{Error, Result, WorkerFailure};
use crate::resilience::{ResiliencePolicy, ResilientInvoker, Settled};
use crate::scope::Scope;
use crate::worker::WorkerSpec;

/// Dispatches a fixed set of workers concurrently and joins their results.
#[derive(Debug, Clone)]
pub struct ParallelOrchestrator {
    name: String,
    workers: Vec<WorkerSpec>,
    default_policy: ResiliencePolicy,
}

impl ParallelOrchestrator {
    /// Start building an orchestrator.
    pub fn builder(name: impl Into<String>) -> ParallelOrchestratorBuilder {
        ParallelOrchestratorBuilder {
            name: name.into(),
            workers: Vec::new(),
            default_policy: ResiliencePolicy::default(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn workers(&self) -> &[WorkerSpec] {
        &self.workers
    }

    /// Output keys in declaration order.
    pub fn output_keys(&self) -> impl Iterator<Item = &str> {
        self.workers.iter().map(WorkerSpec::output_key)
    }

    /// Policy applied to workers without their own override.
    #[must_use]
    pub const fn default_policy(&self) -> &ResiliencePolicy {
        &self.default_policy
    }

    /// Run every worker against `seed` and merge the settled values.
    ///
    /// # Errors
    ///
    /// - `Error::SeedKeyConflict` if the seed already holds a declared output key
    /// - `Error::JoinFailed` if any worker produced no value
    pub async fn fan_out(&self, seed: Scope) -> Result<Scope> {
        let conflicts: Vec<String> = self
            .output_keys()
            .filter(|key| seed.contains_key(key))
            .map(ToString::to_string)
            .collect();
        if !conflicts.is_empty() {
            return Err(Error::SeedKeyConflict { keys: conflicts });
        }

        let started = Instant::now();
        let snapshot = Arc::new(seed);

        debug!(
            orchestrator = %self.name,
            workers = self.workers.len(),
            "Dispatching workers"
        );

        let handles = self.workers.iter().map(|spec| {
            let spec = spec.clone();
            let invoker = ResilientInvoker::new(
                spec.policy().cloned().unwrap_or_else(|| self.default_policy.clone()),
            );
            let snapshot = Arc::clone(&snapshot);
            tokio::spawn(async move { invoker.invoke_worker(&spec, snapshot).await })
        });

        let settled = join_all(handles).await;

        let mut values: Vec<(&str, Value)> = Vec::with_capacity(self.workers.len());
        let mut failures = Vec::new();

        for (spec, outcome) in self.workers.iter().zip(settled) {
            match outcome {
                Ok(Ok(Settled { value, .. })) => values.push((spec.output_key(), value)),
                Ok(Err(e)) => failures.push(WorkerFailure {
                    worker: spec.name().to_string(),
                    reason: e.to_string(),
                }),
                Err(join_error) => failures.push(WorkerFailure {
                    worker: spec.name().to_string(),
                    reason: format!("task aborted: {join_error}"),
                }),
            }
        }

        if !failures.is_empty() {
            error!(
                orchestrator = %self.name,
                failed = %failures.iter().map(|f| f.worker.as_str()).join(", "),
                "Join failed"
            );
            return Err(Error::JoinFailed { failures });
        }

        // Every task has settled, so this is the only remaining reference.
        let mut scope = Arc::try_unwrap(snapshot).unwrap_or_else(|shared| (*shared).clone());
        for (key, value) in values {
            scope.insert(key, value);
        }

        info!(
            orchestrator = %self.name,
            workers = self.workers.len(),
            elapsed_ms = started.elapsed().as_millis(),
            "Workers joined"
        );

        Ok(scope)
    }

    /// Fan out, join, then reduce the populated scope into one result.
    ///
    /// The reducer runs once on the calling task and never runs if the join
    /// failed.
    ///
    /// # Errors
    ///
    /// Returns any error from [`Self::fan_out`].
    pub async fn run<R, F>(&self, seed: Scope, reduce: F) -> Result<R>
    where
        F: FnOnce(&Scope) -> R,
    {
        let scope = self.fan_out(seed).await?;
        Ok(reduce(&scope))
    }
}

/// Builder for [`ParallelOrchestrator`].
#[derive(Debug)]
pub struct ParallelOrchestratorBuilder {
    name: String,
    workers: Vec<WorkerSpec>,
    default_policy: ResiliencePolicy,
}

impl ParallelOrchestratorBuilder {
    #[must_use]
    pub fn worker(mut self, spec: WorkerSpec) -> Self {
        self.workers.push(spec);
        self
    }

    #[must_use]
    pub fn workers(mut self, specs: impl IntoIterator<Item = WorkerSpec>) -> Self {
        self.workers.extend(specs);
        self
    }

    #[must_use]
    pub fn default_policy(mut self, policy: ResiliencePolicy) -> Self {
        self.default_policy = policy;
        self
    }

    /// Validate the worker set and build the orchestrator.
    ///
    /// # Errors
    ///
    /// - `Error::NoWorkers` if no worker was registered
    /// - `Error::DuplicateOutputKeys` if two workers declare the same key
    pub fn build(self) -> Result<ParallelOrchestrator> {
        if self.workers.is_empty() {
            return Err(Error::no_workers(self.name));
        }

        let duplicates: Vec<String> = self
            .workers
            .iter()
            .map(WorkerSpec::output_key)
            .duplicates()
            .map(ToString::to_string)
            .collect();
        if !duplicates.is_empty() {
            return Err(Error::DuplicateOutputKeys { keys: duplicates });
        }

        Ok(ParallelOrchestrator {
            name: self.name,
            workers: self.workers,
            default_policy: self.default_policy,
        })
    }
}
