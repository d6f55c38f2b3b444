//! Mapping between provider records and endpoints

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use tracing::trace;

use crate::endpoint::{Endpoint, RecordType};
use crate::filter::DomainFilter;
use crate::traits::{ProviderRecord, RecordInput};

/// Collapse a provider listing into endpoints
///
/// Records of an unsupported type or outside the filter are skipped. Values
/// sharing a (name, type) pair are merged into one endpoint in listing order;
/// endpoints appear in the order their first value was listed.
pub fn endpoints_from_records(records: &[ProviderRecord], filter: &DomainFilter) -> Vec<Endpoint> {
    let mut endpoints: Vec<Endpoint> = Vec::new();
    let mut positions: HashMap<(&str, RecordType), usize> = HashMap::new();

    for record in records {
        let Some(record_type) = RecordType::supported(&record.record_type) else {
            trace!("Skipping {} record {}: unsupported type", record.record_type, record.record);
            continue;
        };
        if !filter.matches(&record.record) {
            trace!("Skipping {} record {}: filtered out", record.record_type, record.record);
            continue;
        }

        match positions.entry((record.record.as_str(), record_type)) {
            Entry::Occupied(slot) => endpoints[*slot.get()].targets.push(record.value.clone()),
            Entry::Vacant(slot) => {
                slot.insert(endpoints.len());
                endpoints.push(Endpoint::new(
                    &record.record,
                    record_type,
                    [record.value.as_str()],
                ));
            }
        }
    }

    endpoints
}

/// One provider call input per target of `endpoint`, in target order
pub fn record_inputs(endpoint: &Endpoint) -> impl Iterator<Item = RecordInput> + '_ {
    endpoint
        .targets
        .iter()
        .map(move |target| RecordInput::new(&endpoint.dns_name, endpoint.record_type.as_str(), target))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merges_values_and_keeps_first_seen_order() {
        let records = vec![
            ProviderRecord::new("www.example.com", "A", "1.1.1.1"),
            ProviderRecord::new("mail.example.com", "MX", "10 mx1.example.com"),
            ProviderRecord::new("www.example.com", "A", "2.2.2.2"),
            ProviderRecord::new("www.example.com", "AAAA", "2001:db8::1"),
        ];

        let endpoints = endpoints_from_records(&records, &DomainFilter::match_all());

        assert_eq!(endpoints.len(), 3);
        assert_eq!(endpoints[0].key(), ("www.example.com", RecordType::A));
        assert_eq!(endpoints[0].targets, vec!["1.1.1.1", "2.2.2.2"]);
        assert_eq!(endpoints[1].record_type, RecordType::Mx);
        assert_eq!(endpoints[2].record_type, RecordType::Aaaa);
    }

    #[test]
    fn skips_unsupported_types_and_filtered_names() {
        let records = vec![
            ProviderRecord::new("example.com", "SPF", "v=spf1 -all"),
            ProviderRecord::new("www.example.org", "A", "1.1.1.1"),
            ProviderRecord::new("www.example.com", "CNAME", "example.com"),
        ];
        let filter = DomainFilter::with_exclusions(["example.com"], Vec::<String>::new());

        let endpoints = endpoints_from_records(&records, &filter);

        assert_eq!(endpoints, vec![Endpoint::new("www.example.com", RecordType::Cname, ["example.com"])]);
    }

    #[test]
    fn record_inputs_follow_target_order() {
        let endpoint = Endpoint::new("txt.example.com", RecordType::Txt, ["one", "two"]);

        let inputs: Vec<_> = record_inputs(&endpoint).collect();

        assert_eq!(
            inputs,
            vec![
                RecordInput::new("txt.example.com", "TXT", "one"),
                RecordInput::new("txt.example.com", "TXT", "two"),
            ]
        );
    }
}
