//! Provider-agnostic record model exchanged with external-dns
//!
//! - [`Endpoint`]: all values for one (name, type) pair
//! - [`RecordType`]: the record types this webhook advertises and accepts
//! - [`Changes`]: the wire shape of an external-dns plan
//! - [`ChangeSet`]: the same plan folded into its delete and create phases
//!
//! JSON field names follow the external-dns webhook protocol, so these types
//! are what travels over the wire unchanged.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// DNS record types supported by both external-dns and the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum RecordType {
    /// IPv4 address record
    A,
    /// IPv6 address record
    Aaaa,
    /// Canonical name record
    Cname,
    /// Text record (also carries external-dns ownership markers)
    Txt,
    /// Mail exchanger record
    Mx,
    /// Name server record
    Ns,
    /// Service locator record
    Srv,
}

impl RecordType {
    /// Every supported record type, in advertisement order
    pub const ALL: [RecordType; 7] = [
        RecordType::A,
        RecordType::Aaaa,
        RecordType::Cname,
        RecordType::Txt,
        RecordType::Mx,
        RecordType::Ns,
        RecordType::Srv,
    ];

    /// Canonical upper-case name used on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
            RecordType::Cname => "CNAME",
            RecordType::Txt => "TXT",
            RecordType::Mx => "MX",
            RecordType::Ns => "NS",
            RecordType::Srv => "SRV",
        }
    }

    /// Parse a provider-reported type, returning `None` for unsupported types
    pub fn supported(record_type: &str) -> Option<Self> {
        record_type.parse().ok()
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RecordType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::invalid_input(format!("Unsupported record type: {}", s)))
    }
}

impl TryFrom<String> for RecordType {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RecordType> for String {
    fn from(value: RecordType) -> Self {
        value.as_str().to_string()
    }
}

/// Opaque provider-specific key/value attached to an endpoint by external-dns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSpecificProperty {
    pub name: String,
    pub value: String,
}

/// All values for one (name, type) pair, as external-dns understands it
///
/// Only `dns_name`, `record_type` and `targets` are interpreted here. The
/// remaining fields are carried through untouched so that an endpoint handed
/// to `adjust_endpoints` comes back with the same identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    /// Fully qualified record name
    pub dns_name: String,

    /// Record values, in order
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub targets: Vec<String>,

    /// Record type
    pub record_type: RecordType,

    /// Routing-policy discriminator (unused by this provider)
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "String::is_empty")]
    pub set_identifier: String,

    /// TTL requested by external-dns; zero means provider default
    #[serde(rename = "recordTTL", default, deserialize_with = "null_as_default", skip_serializing_if = "is_zero")]
    pub record_ttl: i64,

    /// Labels external-dns uses for ownership bookkeeping
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    /// Provider-specific properties
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub provider_specific: Vec<ProviderSpecificProperty>,
}

impl Endpoint {
    /// Create an endpoint with the given targets and no pass-through metadata
    pub fn new(
        dns_name: impl Into<String>,
        record_type: RecordType,
        targets: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            dns_name: dns_name.into(),
            targets: targets.into_iter().map(Into::into).collect(),
            record_type,
            set_identifier: String::new(),
            record_ttl: 0,
            labels: BTreeMap::new(),
            provider_specific: Vec::new(),
        }
    }

    /// Replace the targets, keeping everything else
    pub fn with_targets(mut self, targets: Vec<String>) -> Self {
        self.targets = targets;
        self
    }

    /// The (name, type) pair that identifies this endpoint
    pub fn key(&self) -> (&str, RecordType) {
        (&self.dns_name, self.record_type)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} [{}]",
            self.dns_name,
            self.record_type,
            self.targets.join(";")
        )
    }
}

/// An external-dns plan as it arrives on `POST /records`
///
/// external-dns serialises these with Go field names and may send `null`
/// for empty lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Changes {
    #[serde(rename = "Create", alias = "create", default, deserialize_with = "null_as_default")]
    pub create: Vec<Endpoint>,

    #[serde(rename = "UpdateOld", alias = "updateOld", default, deserialize_with = "null_as_default")]
    pub update_old: Vec<Endpoint>,

    #[serde(rename = "UpdateNew", alias = "updateNew", default, deserialize_with = "null_as_default")]
    pub update_new: Vec<Endpoint>,

    #[serde(rename = "Delete", alias = "delete", default, deserialize_with = "null_as_default")]
    pub delete: Vec<Endpoint>,
}

/// A plan reduced to the two phases the provider can actually execute
///
/// The provider has no update primitive, so an update is the removal of the
/// old values followed by the addition of the new ones. Every removal runs
/// before any addition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    /// Endpoints whose values are removed in the first phase
    pub to_delete: Vec<Endpoint>,
    /// Endpoints whose values are added in the second phase
    pub to_create: Vec<Endpoint>,
}

impl ChangeSet {
    /// Create a change set from explicit phases
    pub fn new(to_delete: Vec<Endpoint>, to_create: Vec<Endpoint>) -> Self {
        Self {
            to_delete,
            to_create,
        }
    }

    /// True when neither phase has anything to do
    pub fn is_empty(&self) -> bool {
        self.to_delete.is_empty() && self.to_create.is_empty()
    }

    /// Number of individual provider calls this change set will issue
    pub fn call_count(&self) -> usize {
        self.to_delete
            .iter()
            .chain(&self.to_create)
            .map(|ep| ep.targets.len())
            .sum()
    }
}

impl From<Changes> for ChangeSet {
    fn from(changes: Changes) -> Self {
        let Changes {
            create,
            update_old,
            update_new,
            delete,
        } = changes;

        let mut to_delete = delete;
        to_delete.extend(update_old);
        let mut to_create = create;
        to_create.extend(update_new);

        Self {
            to_delete,
            to_create,
        }
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn is_zero(value: &i64) -> bool {
    *value == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_type_parsing_is_case_insensitive() {
        assert_eq!("aaaa".parse::<RecordType>().unwrap(), RecordType::Aaaa);
        assert_eq!("CNAME".parse::<RecordType>().unwrap(), RecordType::Cname);
        assert!("PTR".parse::<RecordType>().is_err());
        assert_eq!(RecordType::supported("SPF"), None);
    }

    #[test]
    fn endpoint_uses_external_dns_field_names() {
        let ep = Endpoint::new("www.example.com", RecordType::A, ["1.2.3.4"]);
        let json = serde_json::to_value(&ep).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "dnsName": "www.example.com",
                "targets": ["1.2.3.4"],
                "recordType": "A",
            })
        );
    }

    #[test]
    fn endpoint_accepts_nulls_and_keeps_metadata() {
        let ep: Endpoint = serde_json::from_value(serde_json::json!({
            "dnsName": "txt.example.com",
            "targets": null,
            "recordType": "TXT",
            "recordTTL": 300,
            "labels": {"owner": "default"},
            "providerSpecific": null,
        }))
        .unwrap();

        assert!(ep.targets.is_empty());
        assert_eq!(ep.record_ttl, 300);
        assert_eq!(ep.labels.get("owner").map(String::as_str), Some("default"));
        assert!(ep.provider_specific.is_empty());
    }

    #[test]
    fn unsupported_record_type_is_rejected_on_the_wire() {
        let result: Result<Endpoint, _> = serde_json::from_value(serde_json::json!({
            "dnsName": "host.example.com",
            "targets": ["x"],
            "recordType": "NAPTR",
        }));
        assert!(result.is_err());
    }

    #[test]
    fn changes_fold_updates_into_phases() {
        let changes: Changes = serde_json::from_value(serde_json::json!({
            "Create": [{"dnsName": "new.example.com", "targets": ["1.1.1.1"], "recordType": "A"}],
            "UpdateOld": [{"dnsName": "mv.example.com", "targets": ["2.2.2.2"], "recordType": "A"}],
            "UpdateNew": [{"dnsName": "mv.example.com", "targets": ["3.3.3.3"], "recordType": "A"}],
            "Delete": null,
        }))
        .unwrap();

        let set = ChangeSet::from(changes);
        assert_eq!(set.to_delete.len(), 1);
        assert_eq!(set.to_delete[0].targets, vec!["2.2.2.2"]);
        assert_eq!(
            set.to_create.iter().map(|e| e.dns_name.as_str()).collect::<Vec<_>>(),
            vec!["new.example.com", "mv.example.com"]
        );
        assert_eq!(set.call_count(), 3);
    }

    #[test]
    fn changes_accept_camel_case_keys() {
        let changes: Changes = serde_json::from_value(serde_json::json!({
            "create": [],
            "updateOld": [],
            "updateNew": [],
            "delete": [{"dnsName": "gone.example.com", "targets": ["a"], "recordType": "TXT"}],
        }))
        .unwrap();

        assert_eq!(changes.delete.len(), 1);
        assert!(!ChangeSet::from(changes).is_empty());
    }
}
