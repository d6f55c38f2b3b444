//! Test doubles and common utilities for reconciler contract tests
//!
//! This module provides a record client that records every call it receives
//! and can be told to reject specific values, so tests can assert on call
//! order and on partial-failure handling.

#![allow(dead_code)]

use extdns_core::error::{Error, Result};
use extdns_core::traits::{ProviderRecord, RecordClient, RecordInput};
use extdns_core::{DomainFilter, MemoryRecordClient, ReconcileEvent, Reconciler, ReconcilerConfig};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// A provider call as seen by the double
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    List,
    Add(RecordInput),
    Remove(RecordInput),
}

impl Call {
    pub fn is_add(&self) -> bool {
        matches!(self, Call::Add(_))
    }

    pub fn is_remove(&self) -> bool {
        matches!(self, Call::Remove(_))
    }
}

/// A RecordClient that logs calls and delegates storage to MemoryRecordClient
pub struct RecordingRecordClient {
    store: MemoryRecordClient,
    calls: Mutex<Vec<Call>>,
    /// Adds of these values fail
    rejected_values: Mutex<HashSet<String>>,
    /// Every add and remove fails
    fail_writes: AtomicBool,
    /// Listing fails
    fail_listing: AtomicBool,
}

impl RecordingRecordClient {
    pub fn new() -> Arc<Self> {
        Self::with_records(Vec::new())
    }

    pub fn with_records(records: Vec<ProviderRecord>) -> Arc<Self> {
        Arc::new(Self {
            store: MemoryRecordClient::with_records(records),
            calls: Mutex::new(Vec::new()),
            rejected_values: Mutex::new(HashSet::new()),
            fail_writes: AtomicBool::new(false),
            fail_listing: AtomicBool::new(false),
        })
    }

    /// Make every add of `value` fail
    pub fn reject_value(&self, value: &str) {
        self.rejected_values.lock().unwrap().insert(value.to_string());
    }

    /// Make every add and remove fail
    pub fn fail_all_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    /// Make listing fail
    pub fn fail_listing(&self) {
        self.fail_listing.store(true, Ordering::SeqCst);
    }

    /// All calls received so far, in order
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Forget recorded calls (stored records are kept)
    pub fn reset_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    /// Current stored records
    pub async fn stored(&self) -> Vec<ProviderRecord> {
        self.store.records().await
    }

    fn log(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait::async_trait]
impl RecordClient for RecordingRecordClient {
    async fn list_records(&self) -> Result<Vec<ProviderRecord>> {
        self.log(Call::List);
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(Error::provider("recording", "listing unavailable"));
        }
        self.store.list_records().await
    }

    async fn add_record(&self, input: &RecordInput) -> Result<()> {
        self.log(Call::Add(input.clone()));
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::provider("recording", "writes unavailable"));
        }
        if self.rejected_values.lock().unwrap().contains(&input.value) {
            return Err(Error::provider("recording", format!("invalid_value: {}", input.value)));
        }
        self.store.add_record(input).await
    }

    async fn remove_record(&self, input: &RecordInput) -> Result<()> {
        self.log(Call::Remove(input.clone()));
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::provider("recording", "writes unavailable"));
        }
        self.store.remove_record(input).await
    }

    fn client_name(&self) -> &'static str {
        "recording"
    }
}

/// Helper to build a reconciler over a shared recording client
pub fn reconciler_with(
    client: &Arc<RecordingRecordClient>,
    filter: DomainFilter,
) -> (Reconciler, mpsc::Receiver<ReconcileEvent>) {
    Reconciler::new(
        Box::new(Arc::clone(client)),
        filter,
        &ReconcilerConfig::default(),
    )
    .expect("reconciler construction succeeds")
}

/// Drain every event currently buffered
pub fn drain_events(rx: &mut mpsc::Receiver<ReconcileEvent>) -> Vec<ReconcileEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
