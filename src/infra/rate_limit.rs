//! Per-operation sliding-window call budgets.
//!
//! Counters are process-local; with several instances each one enforces its
//! own budget independently.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use metrics::counter;
use serde::Deserialize;
use thiserror::Error;

const METRIC_RATE_LIMIT_REJECTED: &str = "hackhub_rate_limit_rejected_total";

/// Logical operations that carry their own budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Resolve,
    ListCollection,
    HackathonById,
    HackathonEvent,
    HackathonList,
    Nonprofit,
    NonprofitList,
    TeamList,
    News,
    SaveNews,
    SaveNonprofit,
    UpdateNonprofit,
    RemoveNonprofit,
    SaveHackathon,
    LinkProblemStatements,
    JoinTeam,
    LeaveTeam,
    CreateTeam,
}

impl Operation {
    pub const ALL: [Operation; 18] = [
        Operation::Resolve,
        Operation::ListCollection,
        Operation::HackathonById,
        Operation::HackathonEvent,
        Operation::HackathonList,
        Operation::Nonprofit,
        Operation::NonprofitList,
        Operation::TeamList,
        Operation::News,
        Operation::SaveNews,
        Operation::SaveNonprofit,
        Operation::UpdateNonprofit,
        Operation::RemoveNonprofit,
        Operation::SaveHackathon,
        Operation::LinkProblemStatements,
        Operation::JoinTeam,
        Operation::LeaveTeam,
        Operation::CreateTeam,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Resolve => "resolve",
            Operation::ListCollection => "list_collection",
            Operation::HackathonById => "hackathon_by_id",
            Operation::HackathonEvent => "hackathon_event",
            Operation::HackathonList => "hackathon_list",
            Operation::Nonprofit => "nonprofit",
            Operation::NonprofitList => "nonprofit_list",
            Operation::TeamList => "team_list",
            Operation::News => "news",
            Operation::SaveNews => "save_news",
            Operation::SaveNonprofit => "save_nonprofit",
            Operation::UpdateNonprofit => "update_nonprofit",
            Operation::RemoveNonprofit => "remove_nonprofit",
            Operation::SaveHackathon => "save_hackathon",
            Operation::LinkProblemStatements => "link_problem_statements",
            Operation::JoinTeam => "join_team",
            Operation::LeaveTeam => "leave_team",
            Operation::CreateTeam => "create_team",
        }
    }

    /// Budget used when configuration does not override it.
    pub fn default_budget(self) -> Budget {
        let (calls, seconds) = match self {
            Operation::Resolve => (2000, 60),
            Operation::ListCollection => (200, 60),
            Operation::HackathonById | Operation::HackathonEvent => (2000, 60),
            Operation::HackathonList => (200, 60),
            Operation::Nonprofit => (1000, 60),
            Operation::NonprofitList => (20, 60),
            Operation::TeamList => (2000, 30),
            Operation::News | Operation::SaveNews => (30, 60),
            Operation::SaveNonprofit
            | Operation::UpdateNonprofit
            | Operation::RemoveNonprofit
            | Operation::LinkProblemStatements
            | Operation::JoinTeam
            | Operation::LeaveTeam => (100, 60),
            Operation::SaveHackathon => (50, 60),
            Operation::CreateTeam => (20, 60),
        };
        Budget::new(calls, Duration::from_secs(seconds))
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown operation `{0}`")]
pub struct UnknownOperation(String);

impl FromStr for Operation {
    type Err = UnknownOperation;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Operation::ALL
            .into_iter()
            .find(|op| op.as_str() == value)
            .ok_or_else(|| UnknownOperation(value.to_string()))
    }
}

/// At most `max_calls` within any `window`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Budget {
    pub max_calls: u32,
    pub window: Duration,
}

impl Budget {
    pub fn new(max_calls: u32, window: Duration) -> Self {
        Self { max_calls, window }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("rate limit exceeded for `{operation}`; retry in {retry_after:?}")]
pub struct RateLimitExceeded {
    pub operation: Operation,
    pub retry_after: Duration,
}

#[derive(Debug, Clone)]
pub struct RateLimiter {
    budgets: Arc<HashMap<Operation, Budget>>,
    calls: Arc<DashMap<Operation, Vec<Instant>>>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(HashMap::new())
    }
}

impl RateLimiter {
    /// Operations missing from `overrides` use [`Operation::default_budget`].
    pub fn new(overrides: HashMap<Operation, Budget>) -> Self {
        let budgets = Operation::ALL
            .into_iter()
            .map(|op| (op, overrides.get(&op).copied().unwrap_or(op.default_budget())))
            .collect();
        Self {
            budgets: Arc::new(budgets),
            calls: Arc::new(DashMap::new()),
        }
    }

    pub fn budget(&self, operation: Operation) -> Budget {
        self.budgets
            .get(&operation)
            .copied()
            .unwrap_or(operation.default_budget())
    }

    /// Record a call to `operation`, returning the calls left in the window.
    pub fn check(&self, operation: Operation) -> Result<u32, RateLimitExceeded> {
        self.check_at(operation, Instant::now())
    }

    pub fn check_at(&self, operation: Operation, now: Instant) -> Result<u32, RateLimitExceeded> {
        let Budget { max_calls, window } = self.budget(operation);

        let mut entry = self.calls.entry(operation).or_default();
        entry.retain(|instant| now.saturating_duration_since(*instant) < window);

        let remaining = max_calls.saturating_sub(entry.len() as u32);
        if remaining == 0 {
            let retry_after = entry
                .first()
                .map(|oldest| window.saturating_sub(now.saturating_duration_since(*oldest)))
                .unwrap_or(window);
            counter!(METRIC_RATE_LIMIT_REJECTED, "operation" => operation.as_str()).increment(1);
            return Err(RateLimitExceeded {
                operation,
                retry_after,
            });
        }

        entry.push(now);
        // after push, one fewer slot remains
        Ok(remaining - 1)
    }
}
