//! Per-session, per-model token usage and cost.
//!
//! Each session owns one ledger behind its own mutex, so concurrent
//! recordings for the same session serialize while different sessions never
//! contend. Ledgers live in a bounded cache and are dropped after they sit
//! idle for the configured time.

use std::ops::AddAssign;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use indexmap::IndexMap;
use moka::policy::EvictionPolicy;
use moka::sync::Cache;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use boardroom_core::{SessionId, UsageSettings};

use crate::error::Result;
use crate::pricing::{Cost, PricingTable};

/// Cumulative token counts for one (session, model) pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelUsage {
    pub input_tokens: u64,
    pub cached_input_tokens: u64,
    pub output_tokens: u64,
}

impl ModelUsage {
    #[must_use]
    pub const fn new(input_tokens: u64, cached_input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            cached_input_tokens,
            output_tokens,
        }
    }

    #[must_use]
    pub const fn total_tokens(&self) -> u64 {
        self.input_tokens
            .saturating_add(self.cached_input_tokens)
            .saturating_add(self.output_tokens)
    }
}

impl AddAssign for ModelUsage {
    fn add_assign(&mut self, rhs: Self) {
        self.input_tokens = self.input_tokens.saturating_add(rhs.input_tokens);
        self.cached_input_tokens = self.cached_input_tokens.saturating_add(rhs.cached_input_tokens);
        self.output_tokens = self.output_tokens.saturating_add(rhs.output_tokens);
    }
}

/// One line of a session's cost breakdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelCost {
    pub model: String,
    pub usage: ModelUsage,
    pub cost: Cost,
}

type Ledger = Arc<Mutex<IndexMap<String, ModelUsage>>>;

fn lock(ledger: &Ledger) -> MutexGuard<'_, IndexMap<String, ModelUsage>> {
    // The map is only mutated by `AddAssign`, which cannot leave it half-updated.
    ledger.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Records model usage per session and prices it.
#[derive(Clone)]
pub struct UsageAccountant {
    pricing: Arc<PricingTable>,
    ledgers: Cache<SessionId, Ledger>,
}

impl UsageAccountant {
    /// Accountant using the built-in pricing table and default eviction.
    #[must_use]
    pub fn new() -> Self {
        Self::with_pricing(PricingTable::default(), &UsageSettings::default())
    }

    /// Accountant with a custom pricing table.
    #[must_use]
    pub fn with_pricing(pricing: PricingTable, settings: &UsageSettings) -> Self {
        Self {
            pricing: Arc::new(pricing),
            ledgers: Cache::builder()
                .max_capacity(settings.max_sessions)
                .time_to_idle(settings.idle_ttl)
                .eviction_policy(EvictionPolicy::lru())
                .build(),
        }
    }

    #[must_use]
    pub fn from_settings(settings: &UsageSettings) -> Self {
        Self::with_pricing(PricingTable::default(), settings)
    }

    #[must_use]
    pub fn pricing(&self) -> &PricingTable {
        &self.pricing
    }

    /// Add one model call's token counts to the session ledger and return
    /// the cost of this call alone.
    ///
    /// The counts are accumulated even when the model has no pricing entry,
    /// so later totals for the session keep reporting the problem.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownModel` if the model has no pricing entry.
    pub fn record(&self, session: &SessionId, model: &str, usage: ModelUsage) -> Result<Cost> {
        let ledger = self.ledgers.get_with_by_ref(session, Ledger::default);
        {
            let mut models = lock(&ledger);
            *models.entry(model.to_string()).or_default() += usage;
        }

        let cost = self.pricing.cost(model, &usage)?;
        debug!(
            session = %session,
            model,
            input_tokens = usage.input_tokens,
            cached_input_tokens = usage.cached_input_tokens,
            output_tokens = usage.output_tokens,
            cost = %cost,
            "Usage recorded"
        );
        Ok(cost)
    }

    /// Total cost of every model the session used. Unknown sessions cost nothing.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownModel` if any recorded model has no pricing entry.
    pub fn total_cost(&self, session: &SessionId) -> Result<Cost> {
        self.breakdown(session)
            .map(|lines| lines.into_iter().map(|line| line.cost).sum())
    }

    /// Per-model usage and cost for the session, in first-use order.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownModel` if any recorded model has no pricing entry.
    pub fn breakdown(&self, session: &SessionId) -> Result<Vec<ModelCost>> {
        let snapshot: Vec<(String, ModelUsage)> = self
            .ledgers
            .get(session)
            .map(|ledger| lock(&ledger).iter().map(|(m, u)| (m.clone(), *u)).collect())
            .unwrap_or_default();

        snapshot
            .into_iter()
            .map(|(model, usage)| {
                let cost = self.pricing.cost(&model, &usage)?;
                Ok(ModelCost { model, usage, cost })
            })
            .collect()
    }

    /// Cumulative counts for one model in a session.
    #[must_use]
    pub fn usage(&self, session: &SessionId, model: &str) -> Option<ModelUsage> {
        self.ledgers
            .get(session)
            .and_then(|ledger| lock(&ledger).get(model).copied())
    }

    /// Models the session has used, in first-use order.
    #[must_use]
    pub fn models(&self, session: &SessionId) -> Vec<String> {
        self.ledgers
            .get(session)
            .map(|ledger| lock(&ledger).keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Forget a session's ledger.
    pub fn reset(&self, session: &SessionId) {
        self.ledgers.invalidate(session);
        info!(session = %session, "Usage ledger reset");
    }
}

impl Default for UsageAccountant {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for UsageAccountant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UsageAccountant")
            .field("sessions", &self.ledgers.entry_count())
            .finish_non_exhaustive()
    }
}
