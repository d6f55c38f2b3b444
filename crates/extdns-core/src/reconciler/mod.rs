//! Reconciliation adapter
//!
//! The Reconciler is the external-dns facing side of the provider:
//! - `records()`: list provider records as filtered, merged endpoints
//! - `adjust_endpoints()`: keep only the values the provider will persist
//! - `apply_changes()`: remove old values, then add new ones
//!
//! ## Architecture
//!
//! ```text
//!                 ┌──────────────┐
//!  external-dns ──│  Reconciler  │── ReconcileEvent ──▶ (optional listener)
//!                 └──────────────┘
//!                   │          │
//!                   ▼          ▼
//!         ┌──────────────┐  ┌──────────────┐
//!         │ DomainFilter │  │ RecordClient │
//!         │  (matches)   │  │ list/add/rm  │
//!         └──────────────┘  └──────────────┘
//! ```
//!
//! ## Failure policy
//!
//! Only listing errors are returned. A failed add or remove is logged,
//! recorded in the [`MutationReport`] and skipped; the next cycle re-reads
//! the provider and external-dns re-plans from there. Nothing is retried.

pub mod report;
pub mod translate;

pub use report::{Adjustment, MutationReport, Operation, Phase, ValueOutcome};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::ReconcilerConfig;
use crate::endpoint::{ChangeSet, Endpoint};
use crate::error::Result;
use crate::filter::DomainFilter;
use crate::traits::{RecordClient, RecordInput};

/// Events emitted by the Reconciler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileEvent {
    /// Provider listing succeeded
    RecordsListed {
        /// Rows returned by the provider
        listed: usize,
        /// Endpoints left after filtering and merging
        endpoints: usize,
    },

    /// Provider listing failed
    ListFailed { error: String },

    /// A single add or remove call completed
    ValueProcessed(ValueOutcome),

    /// `adjust_endpoints` finished
    AdjustFinished {
        endpoints: usize,
        kept: usize,
        dropped: usize,
    },

    /// `apply_changes` finished
    ApplyFinished { succeeded: usize, failed: usize },
}

/// Reconciliation adapter between external-dns and a record client
///
/// ## Threading
///
/// Calls are issued one at a time and awaited in order. The reconciler holds
/// no mutable state; running two passes at once is possible but the provider
/// sees interleaved writes.
pub struct Reconciler {
    /// Provider CRUD client
    client: Box<dyn RecordClient>,

    /// Names in scope
    domain_filter: DomainFilter,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<ReconcileEvent>,
}

impl Reconciler {
    /// Create a new reconciler
    ///
    /// # Returns
    ///
    /// A tuple of (reconciler, event_receiver) where event_receiver yields
    /// reconcile events
    pub fn new(
        client: Box<dyn RecordClient>,
        domain_filter: DomainFilter,
        config: &ReconcilerConfig,
    ) -> Result<(Self, mpsc::Receiver<ReconcileEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.event_channel_capacity);

        let reconciler = Self {
            client,
            domain_filter,
            event_tx: tx,
        };

        Ok((reconciler, rx))
    }

    /// The filter used to scope records
    pub fn domain_filter(&self) -> &DomainFilter {
        &self.domain_filter
    }

    /// Name of the underlying record client
    pub fn client_name(&self) -> &'static str {
        self.client.client_name()
    }

    /// List the provider's records as endpoints
    ///
    /// # Returns
    ///
    /// - `Ok(Vec<Endpoint>)`: Supported, in-scope endpoints in listing order
    /// - `Err(Error)`: The listing error, unmodified
    pub async fn records(&self) -> Result<Vec<Endpoint>> {
        let records = match self.client.list_records().await {
            Ok(records) => records,
            Err(e) => {
                self.emit_event(ReconcileEvent::ListFailed {
                    error: e.to_string(),
                });
                return Err(e);
            }
        };

        let endpoints = translate::endpoints_from_records(&records, &self.domain_filter);
        debug!(
            "Listed {} record(s) from {}, {} endpoint(s) in scope",
            records.len(),
            self.client.client_name(),
            endpoints.len()
        );

        self.emit_event(ReconcileEvent::RecordsListed {
            listed: records.len(),
            endpoints: endpoints.len(),
        });

        Ok(endpoints)
    }

    /// Keep only the target values the provider actually persists
    ///
    /// The provider has no validation call, so each value is probed by
    /// writing it: a best-effort remove of the exact value, then an add.
    /// Values whose add fails are dropped. Every input endpoint comes back,
    /// possibly with no targets.
    ///
    /// This mutates the provider on every call.
    pub async fn adjust_endpoints(&self, endpoints: Vec<Endpoint>) -> Result<Adjustment> {
        let mut report = MutationReport::begin(Operation::Adjust);
        let mut adjusted = Vec::with_capacity(endpoints.len());

        for endpoint in endpoints {
            let mut accepted = Vec::with_capacity(endpoint.targets.len());

            for input in translate::record_inputs(&endpoint) {
                // The value may legitimately not exist yet.
                let removal = self.client.remove_record(&input).await;
                if let Err(e) = &removal {
                    debug!("Pre-add removal of {} failed: {}", input, e);
                }
                self.record_outcome(&mut report, Phase::Remove, input.clone(), removal);

                let addition = self.client.add_record(&input).await;
                match &addition {
                    Ok(()) => accepted.push(input.value.clone()),
                    Err(e) => warn!("Dropping {}: provider rejected it: {}", input, e),
                }
                self.record_outcome(&mut report, Phase::Add, input, addition);
            }

            adjusted.push(endpoint.with_targets(accepted));
        }

        report.finish();
        let adjustment = Adjustment {
            endpoints: adjusted,
            report,
        };

        info!(
            "Adjusted {} endpoint(s): {} value(s) kept, {} dropped",
            adjustment.endpoints.len(),
            adjustment.kept_count(),
            adjustment.dropped_count()
        );
        self.emit_event(ReconcileEvent::AdjustFinished {
            endpoints: adjustment.endpoints.len(),
            kept: adjustment.kept_count(),
            dropped: adjustment.dropped_count(),
        });

        Ok(adjustment)
    }

    /// Apply a change set: every removal first, then every addition
    ///
    /// Individual failures are logged and skipped. The pass succeeds as a
    /// whole regardless; see the returned report for per-value outcomes.
    pub async fn apply_changes(&self, changes: ChangeSet) -> Result<MutationReport> {
        let mut report = MutationReport::begin(Operation::Apply);

        if changes.is_empty() {
            debug!("No changes to apply");
        }

        for endpoint in &changes.to_delete {
            for input in translate::record_inputs(endpoint) {
                self.remove_value(&mut report, input).await;
            }
        }

        for endpoint in &changes.to_create {
            for input in translate::record_inputs(endpoint) {
                self.add_value(&mut report, input).await;
            }
        }

        report.finish();

        info!(
            "Applied changes: {} call(s) succeeded, {} failed",
            report.succeeded_count(),
            report.failed_count()
        );
        self.emit_event(ReconcileEvent::ApplyFinished {
            succeeded: report.succeeded_count(),
            failed: report.failed_count(),
        });

        Ok(report)
    }

    async fn remove_value(&self, report: &mut MutationReport, input: RecordInput) {
        let result = self.client.remove_record(&input).await;
        match &result {
            Ok(()) => debug!("Removed {}", input),
            Err(e) => warn!("Failed to remove {}: {}", input, e),
        }
        self.record_outcome(report, Phase::Remove, input, result);
    }

    async fn add_value(&self, report: &mut MutationReport, input: RecordInput) {
        let result = self.client.add_record(&input).await;
        match &result {
            Ok(()) => debug!("Added {}", input),
            Err(e) => warn!("Failed to add {}: {}", input, e),
        }
        self.record_outcome(report, Phase::Add, input, result);
    }

    fn record_outcome(
        &self,
        report: &mut MutationReport,
        phase: Phase,
        input: RecordInput,
        result: Result<()>,
    ) {
        let outcome = ValueOutcome {
            phase,
            input,
            error: result.err().map(|e| e.to_string()),
        };
        self.emit_event(ReconcileEvent::ValueProcessed(outcome.clone()));
        report.outcomes.push(outcome);
    }

    /// Emit a reconcile event
    fn emit_event(&self, event: ReconcileEvent) {
        // Dropped when the listener is slow or gone.
        if self.event_tx.try_send(event).is_err() {
            debug!("Reconcile event dropped: channel full or closed");
        }
    }
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("client", &self.client.client_name())
            .field("domain_filter", &self.domain_filter)
            .finish()
    }
}
