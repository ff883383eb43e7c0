//! Property and concurrency tests for session memory and usage accounting.
//!
//! Validates:
//! - A memory window never exceeds its capacity and keeps the newest turns
//! - Concurrent recordings for one session lose no tokens
//! - Incremental costs add up to the session total
//! - A full session cache never drops the session just written

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

use std::sync::Arc;

use boardroom_core::{MemorySettings, SessionId, Turn, UsageSettings};
use boardroom_session::{ChatMemoryStore, Cost, ModelUsage, PricingTable, UsageAccountant};
use proptest::prelude::*;

fn session(id: &str) -> Result<SessionId, TestCaseError> {
    SessionId::new(id).map_err(|e| TestCaseError::fail(e.to_string()))
}

proptest! {
    /// Property: window length = min(appends, capacity), holding the newest turns in order
    #[test]
    fn prop_window_is_bounded_fifo(capacity in 1usize..20, appends in 0usize..60) {
        let store = ChatMemoryStore::new(capacity).map_err(|e| TestCaseError::fail(e.to_string()))?;
        let s = session("prop")?;

        for i in 0..appends {
            store.append(&s, Turn::user(i.to_string()));
        }

        let contents: Vec<String> = store.snapshot(&s).into_iter().map(|t| t.content).collect();
        let expected: Vec<String> = (appends.saturating_sub(capacity)..appends)
            .map(|i| i.to_string())
            .collect();
        prop_assert_eq!(contents.len(), appends.min(capacity));
        prop_assert_eq!(contents, expected);
    }

    /// Property: the sum of incremental costs equals the total for a single-model session
    #[test]
    fn prop_incremental_costs_sum_to_total(
        calls in prop::collection::vec((0u64..5_000_000, 0u64..5_000_000, 0u64..5_000_000), 1..10),
    ) {
        let accountant = UsageAccountant::new();
        let s = session("prop")?;

        let mut incremental = Cost::ZERO;
        for (input, cached, output) in calls {
            let cost = accountant
                .record(&s, "gpt-4.1-nano", ModelUsage::new(input, cached, output))
                .map_err(|e| TestCaseError::fail(e.to_string()))?;
            incremental = incremental + cost;
        }

        let total = accountant
            .total_cost(&s)
            .map_err(|e| TestCaseError::fail(e.to_string()))?;
        prop_assert_eq!(total, incremental);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_records_accumulate_exactly() -> Result<(), Box<dyn std::error::Error>> {
    const TASKS: u64 = 64;
    const TOKENS: u64 = 1_250;

    let accountant = Arc::new(UsageAccountant::new());
    let s = SessionId::new("concurrent")?;

    let handles: Vec<_> = (0..TASKS)
        .map(|_| {
            let accountant = Arc::clone(&accountant);
            let s = s.clone();
            tokio::spawn(async move {
                accountant.record(&s, "gpt-4o-mini", ModelUsage::new(TOKENS, TOKENS, TOKENS))
            })
        })
        .collect();

    for handle in handles {
        handle.await??;
    }

    let usage = accountant
        .usage(&s, "gpt-4o-mini")
        .ok_or("no usage recorded")?;
    assert_eq!(usage, ModelUsage::new(TASKS * TOKENS, TASKS * TOKENS, TASKS * TOKENS));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_memory_and_usage_share_a_session() -> Result<(), Box<dyn std::error::Error>> {
    let memory = ChatMemoryStore::new(10)?;
    let accountant = UsageAccountant::new();
    let s = SessionId::generate();

    memory.append(&s, Turn::user("What is our runway?"));
    accountant.record(&s, "gpt-4.1-nano", ModelUsage::new(1_000_000, 0, 0))?;
    memory.append(&s, Turn::assistant("Eighteen months."));
    accountant.record(&s, "gpt-4.1-nano", ModelUsage::new(1_000_000, 0, 1_000_000))?;

    assert_eq!(memory.snapshot(&s).len(), 2);
    assert_eq!(accountant.total_cost(&s)?.to_string(), "$2.4");
    Ok(())
}

#[test]
fn test_full_ledger_cache_keeps_the_session_just_recorded() -> Result<(), Box<dyn std::error::Error>> {
    let settings = UsageSettings {
        max_sessions: 2,
        ..UsageSettings::default()
    };
    let accountant = UsageAccountant::with_pricing(PricingTable::default(), &settings);

    for i in 0..50 {
        let s = SessionId::new(format!("s{i}"))?;
        accountant.record(&s, "gpt-4.1-nano", ModelUsage::new(1_000_000, 0, 0))?;
        accountant.record(&s, "gpt-4.1-nano", ModelUsage::new(1_000_000, 0, 0))?;

        assert_eq!(accountant.total_cost(&s)?.to_string(), "$0.8", "session s{i}");
        assert_eq!(
            accountant.usage(&s, "gpt-4.1-nano"),
            Some(ModelUsage::new(2_000_000, 0, 0)),
            "session s{i}"
        );
    }
    Ok(())
}

#[test]
fn test_full_memory_cache_keeps_the_window_just_appended() -> Result<(), Box<dyn std::error::Error>> {
    let settings = MemorySettings {
        max_sessions: 2,
        ..MemorySettings::default()
    };
    let memory = ChatMemoryStore::from_settings(&settings)?;

    for i in 0..50 {
        let s = SessionId::new(format!("s{i}"))?;
        memory.append(&s, Turn::user("Where do we cut?"));
        memory.append(&s, Turn::assistant("Travel."));

        let contents: Vec<String> = memory.snapshot(&s).into_iter().map(|t| t.content).collect();
        assert_eq!(contents, vec!["Where do we cut?", "Travel."], "session s{i}");
    }
    Ok(())
}
