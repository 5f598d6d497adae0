//! Conformance test suite for `RecordStore` implementations.
//!
//! A backend-agnostic suite that any `RecordStore` implementation can run
//! to verify correctness. The suite covers:
//!
//! - **Accounts**: reads, settings updates, missing-account errors
//! - **Balance**: conditional debit semantics, credit bookkeeping,
//!   monotonic totals
//! - **Generations**: creation, duplicate detection, status-transition
//!   compare-and-swap, listing order
//! - **Transactions**: append-only inserts, id uniqueness, listing order
//!   and limits
//! - **Concurrency**: racing debits and status transitions have exactly
//!   one winner
//!
//! # Usage
//!
//! Backend crates call [`run_conformance_suite`] with a factory function
//! that creates a fresh, empty store for each test:
//!
//! ```ignore
//! use cadenza_storage::conformance::run_conformance_suite;
//!
//! #[tokio::test(flavor = "multi_thread")]
//! async fn postgres_conformance() {
//!     let report = run_conformance_suite(|| async {
//!         create_test_postgres_store().await
//!     }).await;
//!     assert!(report.failed == 0, "{report}");
//! }
//! ```

mod account;
mod balance;
mod concurrent;
mod generation;
mod transaction;

use std::fmt;
use std::future::Future;

use cadenza_core::{GenerationStatus, ModelTier, TransactionKind};

use crate::record::{AccountRecord, GenerationRecord, TransactionRecord};
use crate::RecordStore;

/// Result of a single conformance test.
#[derive(Debug, Clone)]
pub struct TestResult {
    /// Test category (e.g. "balance", "concurrent").
    pub category: String,
    /// Test name (e.g. "debit_rejects_insufficient_balance").
    pub name: String,
    /// Whether the test passed.
    pub passed: bool,
    /// Error message if the test failed.
    pub message: Option<String>,
}

impl TestResult {
    fn from_result(category: &str, name: &str, result: Result<(), String>) -> Self {
        match result {
            Ok(()) => Self {
                category: category.to_string(),
                name: name.to_string(),
                passed: true,
                message: None,
            },
            Err(msg) => Self {
                category: category.to_string(),
                name: name.to_string(),
                passed: false,
                message: Some(msg),
            },
        }
    }
}

/// Aggregated report from a full conformance suite run.
#[derive(Debug, Clone)]
pub struct ConformanceReport {
    pub results: Vec<TestResult>,
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Conformance: {}/{} passed ({} failed)",
            self.passed, self.total, self.failed
        )?;
        for r in &self.results {
            if !r.passed {
                writeln!(
                    f,
                    "  FAIL [{}/{}]: {}",
                    r.category,
                    r.name,
                    r.message.as_deref().unwrap_or("(no message)")
                )?;
            }
        }
        Ok(())
    }
}

/// Run the full conformance suite against a storage backend.
///
/// The `factory` function is called once per test to create a fresh, empty
/// store, ensuring test isolation.
pub async fn run_conformance_suite<S, F, Fut>(factory: F) -> ConformanceReport
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.extend(account::run_account_tests(&factory).await);
    results.extend(balance::run_balance_tests(&factory).await);
    results.extend(generation::run_generation_tests(&factory).await);
    results.extend(transaction::run_transaction_tests(&factory).await);
    results.extend(concurrent::run_concurrent_tests(&factory).await);

    let passed = results.iter().filter(|r| r.passed).count();
    let total = results.len();

    ConformanceReport {
        results,
        passed,
        failed: total - passed,
        total,
    }
}

// ── Helpers: record constructors with sensible defaults ──────────────────────

fn make_account(user_id: &str, balance: i64) -> AccountRecord {
    AccountRecord {
        user_id: user_id.to_string(),
        email: format!("{user_id}@example.com"),
        display_name: Some("Test User".to_string()),
        token_balance: balance,
        total_purchased: balance,
        total_used: 0,
        default_model: ModelTier::Tier1,
        auto_download: false,
        email_notifications: true,
        created_at: "2025-01-01T00:00:00Z".to_string(),
        updated_at: "2025-01-01T00:00:00Z".to_string(),
    }
}

fn make_generation(id: &str, user_id: &str) -> GenerationRecord {
    GenerationRecord {
        id: id.to_string(),
        user_id: user_id.to_string(),
        prompt: "a slow ambient pad with warm analog texture".to_string(),
        title: None,
        model: ModelTier::Tier1,
        duration_seconds: 60,
        status: GenerationStatus::Pending,
        tokens_reserved: 10,
        error_message: None,
        created_at: "2025-01-01T00:00:00Z".to_string(),
        completed_at: None,
    }
}

fn make_transaction(
    id: &str,
    user_id: &str,
    kind: TransactionKind,
    token_amount: i64,
) -> TransactionRecord {
    TransactionRecord {
        id: id.to_string(),
        user_id: user_id.to_string(),
        generation_id: None,
        kind,
        token_amount,
        price_usd: None,
        package_name: None,
        payment_ref: None,
        created_at: "2025-01-01T00:00:00Z".to_string(),
    }
}

