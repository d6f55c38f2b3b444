//! Structured outcomes of mutating passes
//!
//! Every add/remove call the reconciler issues is recorded here, so callers
//! and tests can see what was kept and what was dropped without scraping logs.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::endpoint::Endpoint;
use crate::traits::RecordInput;

/// Which mutating operation produced a report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// `adjust_endpoints`: remove-then-add probe per value
    Adjust,
    /// `apply_changes`: all removals, then all additions
    Apply,
}

/// Kind of provider call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Remove,
    Add,
}

/// Result of one provider call for one value
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValueOutcome {
    pub phase: Phase,
    pub input: RecordInput,
    /// Error text when the call failed
    pub error: Option<String>,
}

impl ValueOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Per-value outcomes of one mutating pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MutationReport {
    pub operation: Operation,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub outcomes: Vec<ValueOutcome>,
}

impl MutationReport {
    pub(crate) fn begin(operation: Operation) -> Self {
        Self {
            operation,
            started_at: Utc::now(),
            finished_at: None,
            outcomes: Vec::new(),
        }
    }

    pub(crate) fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Outcomes of one phase, in call order
    pub fn phase(&self, phase: Phase) -> impl Iterator<Item = &ValueOutcome> {
        self.outcomes.iter().filter(move |o| o.phase == phase)
    }

    /// Failed calls, in call order
    pub fn failures(&self) -> impl Iterator<Item = &ValueOutcome> {
        self.outcomes.iter().filter(|o| !o.succeeded())
    }

    pub fn succeeded_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.succeeded()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.failures().count()
    }
}

/// Result of `adjust_endpoints`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Adjustment {
    /// One endpoint per input endpoint, holding only the values that persisted
    pub endpoints: Vec<Endpoint>,
    pub report: MutationReport,
}

impl Adjustment {
    /// Values that were accepted by the provider
    pub fn kept_count(&self) -> usize {
        self.endpoints.iter().map(|ep| ep.targets.len()).sum()
    }

    /// Values that were dropped because the add call failed
    pub fn dropped_count(&self) -> usize {
        self.report.phase(Phase::Add).filter(|o| !o.succeeded()).count()
    }
}
