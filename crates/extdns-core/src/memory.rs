// # Memory Record Client
//
// In-memory implementation of RecordClient.
//
// ## Purpose
//
// Behaves like a provider API that stores single-valued records: adding a
// record that already exists fails, removing one that does not exist fails.
// Useful for testing the reconciler and for running the webhook without a
// provider account.
//
// ## Crash Behavior
//
// - All records are lost on restart
// - Nothing is persisted

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::traits::record_client::{ProviderRecord, RecordClient, RecordInput};
use crate::Error;

/// In-memory record client implementation
///
/// Records are kept in insertion order behind a RwLock, so listings come
/// back in the order records were added.
///
/// # Example
///
/// ```rust,no_run
/// use extdns_core::memory::MemoryRecordClient;
/// use extdns_core::traits::{RecordClient, RecordInput};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = MemoryRecordClient::new();
///
///     client.add_record(&RecordInput::new("www.example.com", "A", "192.0.2.1")).await?;
///
///     let records = client.list_records().await?;
///     assert_eq!(records.len(), 1);
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryRecordClient {
    inner: Arc<RwLock<Vec<ProviderRecord>>>,
}

impl MemoryRecordClient {
    /// Create a new empty client
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a client pre-populated with records
    pub fn with_records(records: impl IntoIterator<Item = ProviderRecord>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(records.into_iter().collect())),
        }
    }

    /// Snapshot of the stored records
    pub async fn records(&self) -> Vec<ProviderRecord> {
        self.inner.read().await.clone()
    }

    /// Get the number of records in the client
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Check if the client holds no records
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    /// Remove every record
    pub async fn clear(&self) {
        self.inner.write().await.clear();
    }
}

fn same_record(record: &ProviderRecord, input: &RecordInput) -> bool {
    record.record == input.record
        && record.record_type.eq_ignore_ascii_case(&input.record_type)
        && record.value == input.value
}

#[async_trait]
impl RecordClient for MemoryRecordClient {
    async fn list_records(&self) -> Result<Vec<ProviderRecord>, Error> {
        Ok(self.records().await)
    }

    async fn add_record(&self, input: &RecordInput) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        if guard.iter().any(|record| same_record(record, input)) {
            return Err(Error::provider("memory", format!("record_already_exists: {}", input)));
        }
        guard.push(ProviderRecord::new(
            &input.record,
            &input.record_type,
            &input.value,
        ));
        Ok(())
    }

    async fn remove_record(&self, input: &RecordInput) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        let position = guard
            .iter()
            .position(|record| same_record(record, input))
            .ok_or_else(|| Error::not_found(input.to_string()))?;
        guard.remove(position);
        Ok(())
    }

    fn client_name(&self) -> &'static str {
        "memory"
    }
}
