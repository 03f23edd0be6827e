//! Grouping of a mixed batch into per-instrument partitions

use hermes_core::MarketDataRecord;
use hermes_registry::{ContractRegistry, Partition, RoutingError};
use indexmap::IndexMap;
use log::warn;

/// Records of one instrument, in batch order
#[derive(Debug)]
pub struct PartitionGroup<'a> {
    pub partition: &'a Partition,
    pub records: Vec<&'a MarketDataRecord>,
}

/// A batch split by instrument
#[derive(Debug, Default)]
pub struct PartitionedBatch<'a> {
    /// Groups in order of first appearance
    pub groups: Vec<PartitionGroup<'a>>,
    pub rejected: Vec<RoutingError>,
}

impl PartitionedBatch<'_> {
    pub fn routed(&self) -> usize {
        self.groups.iter().map(|g| g.records.len()).sum()
    }
}

/// Split `records` by `InstrumentID`, refusing anything the registry cannot route
pub fn partition_batch<'a>(records: &'a [MarketDataRecord], registry: &'a ContractRegistry) -> PartitionedBatch<'a> {
    let mut groups: IndexMap<&'a str, PartitionGroup<'a>> = IndexMap::new();
    let mut rejected = Vec::new();

    for record in records {
        match registry.route_record(record) {
            Ok(partition) => groups
                .entry(partition.instrument.as_str())
                .or_insert_with(|| PartitionGroup {
                    partition,
                    records: Vec::new(),
                })
                .records
                .push(record),
            Err(err) => {
                warn!("Rejecting record: {err}");
                rejected.push(err);
            }
        }
    }

    PartitionedBatch {
        groups: groups.into_values().collect(),
        rejected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use hermes_registry::ProductCatalog;

    #[test]
    fn test_groups_by_instrument_in_first_seen_order() {
        let catalog = ProductCatalog::new()
            .with_exchange("SHFE", &["rb", "ag"])
            .with_exchange("DCE", &["m"]);
        let registry =
            ContractRegistry::generate(&catalog, NaiveDate::from_ymd_opt(2025, 12, 2).unwrap()).unwrap();

        let records = vec![
            MarketDataRecord::new("m2601").with_last(2900.0, 1),
            MarketDataRecord::new("rb2601").with_last(3500.0, 1),
            MarketDataRecord::new(""),
            MarketDataRecord::new("m2601").with_last(2901.0, 2),
            MarketDataRecord::new("cu2601"),
        ];

        let batch = partition_batch(&records, &registry);
        let order: Vec<&str> = batch.groups.iter().map(|g| g.partition.instrument.as_str()).collect();
        assert_eq!(order, vec!["m2601", "rb2601"]);
        assert_eq!(batch.groups[0].records.len(), 2);
        assert_eq!(batch.groups[0].partition.exchange, "DCE");
        assert_eq!(batch.routed(), 3);
        assert_eq!(
            batch.rejected,
            vec![
                RoutingError::MissingInstrumentId,
                RoutingError::UnknownInstrument("cu2601".into())
            ]
        );
    }
}
