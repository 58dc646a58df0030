//! In-process spend accounting with a daily budget. Buckets are keyed by
//! UTC date and pruned lazily on access, so day rollover needs no timer.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::models::CostSummary;

/// Time source, swappable so tests can pin the date.
pub trait Clock: Send + Sync {
    fn now_utc(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Fixed-time clock for tests.
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now_utc(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Result of recording one expense.
#[derive(Debug, Clone)]
pub struct CostReceipt {
    pub amount: f64,
    pub daily_total: f64,
    pub daily_limit: f64,
    pub limit_exceeded: bool,
    pub date: String,
}

struct LedgerState {
    daily_totals: HashMap<String, f64>,
    entries: HashMap<String, CostEntry>,
}

#[derive(Debug, Clone)]
struct CostEntry {
    amount: f64,
    source: String,
    date: String,
}

/// Daily spend ledger. Cheap to clone behind an `Arc`; all mutation goes
/// through one mutex so concurrent requests never lose an expense.
pub struct CostLedger {
    state: Mutex<LedgerState>,
    daily_limit: f64,
    clock: Arc<dyn Clock>,
}

impl CostLedger {
    pub fn new(daily_limit: f64) -> Self {
        Self::with_clock(daily_limit, Arc::new(SystemClock))
    }

    pub fn with_clock(daily_limit: f64, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(LedgerState {
                daily_totals: HashMap::new(),
                entries: HashMap::new(),
            }),
            daily_limit,
            clock,
        }
    }

    fn today(&self) -> String {
        self.clock.now_utc().format("%Y-%m-%d").to_string()
    }

    fn prune_stale(state: &mut LedgerState, today: &str) {
        state.daily_totals.retain(|date, _| date.as_str() >= today);
        state.entries.retain(|_, entry| entry.date.as_str() >= today);
    }

    /// Record an expense against today's bucket. `request_id` keys a
    /// per-request detail entry when provided.
    pub fn add_cost(&self, amount: f64, request_id: Option<&str>, source: &str) -> CostReceipt {
        let today = self.today();
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        Self::prune_stale(&mut state, &today);

        let total = state.daily_totals.entry(today.clone()).or_insert(0.0);
        *total += amount;
        let daily_total = *total;

        if let Some(request_id) = request_id {
            state.entries.insert(
                request_id.to_string(),
                CostEntry {
                    amount,
                    source: source.to_string(),
                    date: today.clone(),
                },
            );
        }
        drop(state);

        let limit_exceeded = daily_total >= self.daily_limit;
        info!(
            amount = format!("{amount:.4}"),
            daily_total = format!("{daily_total:.2}"),
            daily_limit = format!("{:.2}", self.daily_limit),
            source,
            "Cost recorded"
        );
        if limit_exceeded {
            warn!(
                daily_total = format!("{daily_total:.2}"),
                daily_limit = format!("{:.2}", self.daily_limit),
                "Daily cost limit exceeded"
            );
        }

        CostReceipt {
            amount,
            daily_total,
            daily_limit: self.daily_limit,
            limit_exceeded,
            date: today,
        }
    }

    /// `(limit_exceeded, current_cost, limit)` for today. Callers gate
    /// paid work on this before spending anything.
    pub fn check_limit(&self) -> (bool, f64, f64) {
        let today = self.today();
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        Self::prune_stale(&mut state, &today);
        let current = state.daily_totals.get(&today).copied().unwrap_or(0.0);
        (current >= self.daily_limit, current, self.daily_limit)
    }

    pub fn daily_cost(&self) -> f64 {
        self.check_limit().1
    }

    pub fn summary(&self) -> CostSummary {
        let today = self.today();
        let (limit_exceeded, daily_total, daily_limit) = self.check_limit();
        CostSummary {
            date: today,
            daily_total,
            daily_limit,
            limit_exceeded,
            remaining_budget: (daily_limit - daily_total).max(0.0),
        }
    }

    /// Amount recorded under a request id, if any.
    pub fn request_cost(&self, request_id: &str) -> Option<(f64, String)> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state
            .entries
            .get(request_id)
            .map(|entry| (entry.amount, entry.source.clone()))
    }
}
