//! Model pricing and cost arithmetic.
//!
//! Rates are USD per one million tokens. Costs are computed in decimal
//! arithmetic: each of the three terms is rounded half away from zero to ten
//! fractional digits, then the terms are summed without further rounding.

use std::fmt;
use std::iter::Sum;
use std::ops::Add;
use std::sync::LazyLock;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::usage::ModelUsage;

const TOKENS_PER_RATE_UNIT: u32 = 1_000_000;
const COST_SCALE: u32 = 10;

static BUILTIN: LazyLock<PricingTable> = LazyLock::new(|| {
    PricingTable::new([
        PricingEntry::new("gpt-4.1-nano", Decimal::new(40, 2), Decimal::new(10, 2), Decimal::new(160, 2)),
        PricingEntry::new("gpt-4.1-mini", Decimal::new(40, 2), Decimal::new(10, 2), Decimal::new(160, 2)),
        PricingEntry::new("gpt-4.1", Decimal::new(200, 2), Decimal::new(50, 2), Decimal::new(800, 2)),
        PricingEntry::new("gpt-4o-mini", Decimal::new(15, 2), Decimal::new(75, 3), Decimal::new(60, 2)),
        PricingEntry::new("gpt-4o", Decimal::new(250, 2), Decimal::new(125, 2), Decimal::new(1000, 2)),
        PricingEntry::new("o4-mini", Decimal::new(110, 2), Decimal::new(275, 3), Decimal::new(440, 2)),
    ])
});

/// An amount of money in USD.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cost(Decimal);

impl Cost {
    pub const ZERO: Self = Self(Decimal::ZERO);

    #[must_use]
    pub const fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    #[must_use]
    pub const fn amount(self) -> Decimal {
        self.0
    }

    #[must_use]
    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    /// Checked addition.
    #[must_use]
    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }
}

impl Add for Cost {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl Sum for Cost {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl From<Decimal> for Cost {
    fn from(amount: Decimal) -> Self {
        Self(amount)
    }
}

impl fmt::Display for Cost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}", self.0.normalize())
    }
}

/// Per-million-token rates for every model whose name starts with `prefix`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingEntry {
    pub prefix: String,
    pub input: Decimal,
    pub cached_input: Decimal,
    pub output: Decimal,
}

impl PricingEntry {
    pub fn new(prefix: impl Into<String>, input: Decimal, cached_input: Decimal, output: Decimal) -> Self {
        Self {
            prefix: prefix.into(),
            input,
            cached_input,
            output,
        }
    }

    /// Price a set of token counts at this entry's rates.
    ///
    /// # Errors
    ///
    /// Returns `Error::CostOverflow` if the arithmetic leaves the decimal range.
    pub fn cost(&self, usage: &ModelUsage) -> Result<Cost> {
        let overflow = || Error::cost_overflow(&self.prefix);
        let input = term(usage.input_tokens, self.input).ok_or_else(overflow)?;
        let cached = term(usage.cached_input_tokens, self.cached_input).ok_or_else(overflow)?;
        let output = term(usage.output_tokens, self.output).ok_or_else(overflow)?;

        input
            .checked_add(cached)
            .and_then(|sum| sum.checked_add(output))
            .map(Cost)
            .ok_or_else(overflow)
    }
}

fn term(tokens: u64, rate: Decimal) -> Option<Decimal> {
    Decimal::from(tokens)
        .checked_div(Decimal::from(TOKENS_PER_RATE_UNIT))?
        .checked_mul(rate)
        .map(|d| d.round_dp_with_strategy(COST_SCALE, RoundingStrategy::MidpointAwayFromZero))
}

/// Immutable model-prefix pricing table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricingTable {
    // Longest prefix first, so the first match is the most specific one.
    entries: Vec<PricingEntry>,
}

impl PricingTable {
    pub fn new(entries: impl IntoIterator<Item = PricingEntry>) -> Self {
        let mut entries: Vec<PricingEntry> = entries.into_iter().collect();
        entries.sort_by(|a, b| b.prefix.len().cmp(&a.prefix.len()).then_with(|| a.prefix.cmp(&b.prefix)));
        Self { entries }
    }

    /// The process-wide table of known models.
    #[must_use]
    pub fn builtin() -> &'static Self {
        &BUILTIN
    }

    /// Find the entry with the longest prefix of `model`.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownModel` if no prefix matches.
    pub fn lookup(&self, model: &str) -> Result<&PricingEntry> {
        self.entries
            .iter()
            .find(|entry| model.starts_with(entry.prefix.as_str()))
            .ok_or_else(|| Error::unknown_model(model))
    }

    /// Price token counts for a model.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownModel` if the model has no entry, or
    /// `Error::CostOverflow` if the arithmetic overflows.
    pub fn cost(&self, model: &str, usage: &ModelUsage) -> Result<Cost> {
        self.lookup(model)?.cost(usage)
    }

    pub fn entries(&self) -> impl Iterator<Item = &PricingEntry> {
        self.entries.iter()
    }
}

impl Default for PricingTable {
    fn default() -> Self {
        BUILTIN.clone()
    }
}
