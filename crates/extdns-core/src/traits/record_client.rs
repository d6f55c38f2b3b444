// # Record Client Trait
//
// Defines the CRUD capability the reconciler needs from a DNS provider API.
//
// ## Implementations
//
// - DreamHost: `extdns-provider-dreamhost` crate
// - In-memory: `extdns_core::memory::MemoryRecordClient` (tests, local runs)
//
// ## Usage
//
// ```rust,ignore
// use extdns_core::traits::{RecordClient, RecordInput};
//
// #[tokio::main]
// async fn main() -> extdns_core::Result<()> {
//     let client = /* RecordClient implementation */;
//
//     client.add_record(&RecordInput::new("www.example.com", "A", "192.0.2.1")).await?;
//     for record in client.list_records().await? {
//         println!("{} {} {}", record.record, record.record_type, record.value);
//     }
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One row of the provider's record listing
///
/// Providers store a single value per record, so a name with three A values
/// is three `ProviderRecord`s.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderRecord {
    /// Fully qualified record name
    pub record: String,
    /// Record type as the provider reports it (may be unsupported upstream)
    #[serde(rename = "type")]
    pub record_type: String,
    /// Single record value
    pub value: String,
    /// Zone the record lives in, when the provider reports it
    #[serde(default)]
    pub zone: Option<String>,
}

impl ProviderRecord {
    /// Create a record without zone information
    pub fn new(
        record: impl Into<String>,
        record_type: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            record: record.into(),
            record_type: record_type.into(),
            value: value.into(),
            zone: None,
        }
    }

    /// The input that would add or remove exactly this record
    pub fn to_input(&self) -> RecordInput {
        RecordInput::new(&self.record, &self.record_type, &self.value)
    }
}

/// Arguments of a single add or remove call
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordInput {
    /// Fully qualified record name
    pub record: String,
    /// Record type
    #[serde(rename = "type")]
    pub record_type: String,
    /// Single record value
    pub value: String,
}

impl RecordInput {
    pub fn new(
        record: impl Into<String>,
        record_type: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            record: record.into(),
            record_type: record_type.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for RecordInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.record, self.record_type, self.value)
    }
}

/// Trait for DNS provider record clients
///
/// The provider API is treated as opaque list/add/remove operations on
/// single-valued records. There is no update and no dry-run validation call.
///
/// # Thread Safety
///
/// Implementations must be thread-safe and usable across async tasks.
///
/// # Single-shot
///
/// Each method performs at most one remote call and never retries. Failures
/// are returned as-is; the reconciler decides whether they matter.
#[async_trait]
pub trait RecordClient: Send + Sync {
    /// List every record the credential can see
    ///
    /// # Returns
    ///
    /// - `Ok(Vec<ProviderRecord>)`: All records, in provider order
    /// - `Err(Error)`: If the listing failed (no partial result)
    async fn list_records(&self) -> Result<Vec<ProviderRecord>, crate::Error>;

    /// Add one record value
    ///
    /// Fails if the provider rejects the value, including when the exact
    /// record already exists.
    async fn add_record(&self, input: &RecordInput) -> Result<(), crate::Error>;

    /// Remove one record value
    ///
    /// Fails if the provider rejects the call, including when the record does
    /// not exist.
    async fn remove_record(&self, input: &RecordInput) -> Result<(), crate::Error>;

    /// Get the client name (for logging/debugging)
    fn client_name(&self) -> &'static str;
}

#[async_trait]
impl<T: RecordClient + ?Sized> RecordClient for std::sync::Arc<T> {
    async fn list_records(&self) -> Result<Vec<ProviderRecord>, crate::Error> {
        (**self).list_records().await
    }

    async fn add_record(&self, input: &RecordInput) -> Result<(), crate::Error> {
        (**self).add_record(input).await
    }

    async fn remove_record(&self, input: &RecordInput) -> Result<(), crate::Error> {
        (**self).remove_record(input).await
    }

    fn client_name(&self) -> &'static str {
        (**self).client_name()
    }
}
