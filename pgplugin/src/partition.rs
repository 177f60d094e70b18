//! Output partitioning under the master limit.
//!
//! A container may declare fewer than `limit` masters. Modified records are
//! placed greedily: the first partition (in creation order) that already
//! covers a record's dependencies, or can absorb them while staying under
//! the limit, takes it. Otherwise a new partition is created.

use std::collections::BTreeSet;

use crate::error::{EngineError, EngineResult};
use crate::record::{ContainerKey, Record};

/// One split output container.
#[derive(Debug, Clone)]
pub struct OutputPartition {
    name: ContainerKey,
    masters: BTreeSet<ContainerKey>,
    records: Vec<Record>,
}

impl OutputPartition {
    fn new(name: ContainerKey, masters: BTreeSet<ContainerKey>) -> Self {
        Self {
            name,
            masters,
            records: Vec::new(),
        }
    }

    /// Container name (`<prefix><n>.esp`).
    pub fn name(&self) -> &ContainerKey {
        &self.name
    }

    /// Dependency containers of the placed records.
    pub fn masters(&self) -> &BTreeSet<ContainerKey> {
        &self.masters
    }

    /// Placed records in placement order.
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Split into name, masters and records.
    pub fn into_parts(self) -> (ContainerKey, BTreeSet<ContainerKey>, Vec<Record>) {
        (self.name, self.masters, self.records)
    }
}

/// Assigns records to output partitions.
#[derive(Debug)]
pub struct Partitioner {
    prefix: String,
    limit: usize,
    partitions: Vec<OutputPartition>,
}

impl Partitioner {
    /// Create a partitioner naming containers `<prefix><n>.esp` with an
    /// exclusive master `limit`.
    pub fn new(prefix: impl Into<String>, limit: usize) -> Self {
        Self {
            prefix: prefix.into(),
            limit,
            partitions: Vec::new(),
        }
    }

    /// Containers a record needs as masters: its own container plus the
    /// owners of everything it links to.
    pub fn required_masters(record: &Record) -> BTreeSet<ContainerKey> {
        std::iter::once(&record.key)
            .chain(record.form_links())
            .map(|key| key.container.clone())
            .collect()
    }

    /// Place a record, returning the index of its partition.
    pub fn place(&mut self, record: Record) -> EngineResult<usize> {
        let required = Self::required_masters(&record);
        if required.len() >= self.limit {
            return Err(EngineError::MasterLimitExceeded {
                record: record.key.clone(),
                required: required.len(),
                limit: self.limit,
            });
        }

        for (index, partition) in self.partitions.iter_mut().enumerate() {
            if required.is_subset(&partition.masters) {
                partition.records.push(record);
                return Ok(index);
            }

            let added = required.difference(&partition.masters).count();
            if partition.masters.len() + added < self.limit {
                partition.masters.extend(required);
                partition.records.push(record);
                return Ok(index);
            }
        }

        let index = self.partitions.len();
        let name = ContainerKey::new(format!("{}{}.esp", self.prefix, index + 1));
        let mut partition = OutputPartition::new(name, required);
        partition.records.push(record);
        self.partitions.push(partition);
        Ok(index)
    }

    /// Partitions in creation order.
    pub fn partitions(&self) -> &[OutputPartition] {
        &self.partitions
    }

    /// Take the partitions in creation order.
    pub fn into_partitions(self) -> Vec<OutputPartition> {
        self.partitions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{LocalId, RecordBody, RecordKey};

    fn record(id: u32, container: &str, links: &[&str]) -> Record {
        Record::new(
            RecordKey::new(container, LocalId::new(id).unwrap()),
            RecordBody::Other,
        )
        .with_links(
            links
                .iter()
                .map(|c| RecordKey::new(*c, LocalId::new(1).unwrap()))
                .collect(),
        )
    }

    #[test]
    fn test_required_masters_include_own_container() {
        let r = record(1, "Skyrim.esm", &["Update.esm", "Skyrim.esm"]);
        let names: Vec<String> = Partitioner::required_masters(&r)
            .iter()
            .map(|c| c.to_string())
            .collect();
        assert_eq!(names, vec!["Skyrim.esm", "Update.esm"]);
    }

    #[test]
    fn test_subset_goes_to_first_partition() {
        let mut p = Partitioner::new("PG_", 254);
        assert_eq!(p.place(record(1, "Skyrim.esm", &["Update.esm"])).unwrap(), 0);
        assert_eq!(p.place(record(2, "Skyrim.esm", &[])).unwrap(), 0);
        assert_eq!(p.partitions().len(), 1);
        assert_eq!(p.partitions()[0].name().name(), "PG_1.esp");
    }

    #[test]
    fn test_new_partition_when_union_reaches_limit() {
        let mut p = Partitioner::new("PG_", 4);
        assert_eq!(p.place(record(1, "A.esp", &["B.esp", "C.esp"])).unwrap(), 0);
        assert_eq!(p.place(record(2, "D.esp", &[])).unwrap(), 1);
        assert_eq!(p.place(record(3, "A.esp", &[])).unwrap(), 0);

        let names: Vec<&str> = p.partitions().iter().map(|x| x.name().name()).collect();
        assert_eq!(names, vec!["PG_1.esp", "PG_2.esp"]);
        assert_eq!(p.partitions()[0].records().len(), 2);
    }

    #[test]
    fn test_grows_partition_under_limit() {
        let mut p = Partitioner::new("PG_", 4);
        p.place(record(1, "A.esp", &[])).unwrap();
        assert_eq!(p.place(record(2, "B.esp", &["C.esp"])).unwrap(), 0);
        assert_eq!(p.partitions()[0].masters().len(), 3);
    }

    #[test]
    fn test_record_exceeding_limit_alone_fails() {
        let mut p = Partitioner::new("PG_", 3);
        let err = p.place(record(1, "A.esp", &["B.esp", "C.esp"])).unwrap_err();
        assert!(matches!(
            err,
            EngineError::MasterLimitExceeded {
                required: 3,
                limit: 3,
                ..
            }
        ));
        assert!(p.partitions().is_empty());
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_master_count_stays_under_limit(
                records in proptest::collection::vec(
                    (0usize..40, proptest::collection::vec(0usize..40, 0..6)),
                    1..80,
                ),
                limit in 8usize..20,
            ) {
                let mut p = Partitioner::new("PG_", limit);
                for (i, (own, links)) in records.iter().enumerate() {
                    let own = format!("M{}.esp", own);
                    let links: Vec<String> = links.iter().map(|l| format!("M{}.esp", l)).collect();
                    let link_refs: Vec<&str> = links.iter().map(String::as_str).collect();
                    let r = record(i as u32, &own, &link_refs);
                    let _ = p.place(r);
                }

                for partition in p.partitions() {
                    prop_assert!(partition.masters().len() < limit);
                    for r in partition.records() {
                        prop_assert!(Partitioner::required_masters(r).is_subset(partition.masters()));
                    }
                }
            }
        }
    }
}
