//! Core traits for the webhook provider
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`RecordClient`]: List, add and remove single-valued provider records

pub mod record_client;

pub use record_client::{ProviderRecord, RecordClient, RecordInput};
