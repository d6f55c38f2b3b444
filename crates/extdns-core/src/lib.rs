// # extdns-core
//
// Reconciliation core for the external-dns DreamHost webhook.
//
// ## Architecture Overview
//
// This library provides everything between the webhook protocol and the
// provider's record API:
// - **Endpoint / ChangeSet**: The provider-agnostic record model external-dns speaks
// - **DomainFilter**: Immutable predicate deciding which names are in scope
// - **RecordClient**: Trait for list/add/remove calls against a provider API
// - **Reconciler**: Lists, adjusts and applies endpoints through a RecordClient
//
// ## Design Principles
//
// 1. **Stateless**: Provider state is re-read on every cycle, nothing is cached
// 2. **Delete before add**: The provider has no update; updates are two phases
// 3. **Best effort writes**: Failed writes are reported, never retried or raised
// 4. **Library-First**: The daemon is a thin shell over this crate

pub mod config;
pub mod endpoint;
pub mod error;
pub mod filter;
pub mod memory;
pub mod reconciler;
pub mod traits;

// Re-export core types for convenience
pub use config::{ProviderConfig, ReconcilerConfig};
pub use endpoint::{ChangeSet, Changes, Endpoint, RecordType};
pub use error::{Error, Result};
pub use filter::DomainFilter;
pub use memory::MemoryRecordClient;
pub use reconciler::{Adjustment, MutationReport, ReconcileEvent, Reconciler};
pub use traits::{ProviderRecord, RecordClient, RecordInput};
