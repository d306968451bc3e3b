use std::collections::BTreeMap;

use crate::metric::OrgId;
use crate::validation::InvalidMetric;

/// Per-request tally of rejected records, grouped by org and reason.
///
/// A ledger is created empty for every request, filled while validating the decoded records and
/// merged once into the process-wide counters after validation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DiscardLedger {
    discards: BTreeMap<OrgId, BTreeMap<&'static str, usize>>,
}

impl DiscardLedger {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a rejected record for the given org.
    pub fn add(&mut self, org_id: OrgId, reason: InvalidMetric) {
        *self
            .discards
            .entry(org_id)
            .or_default()
            .entry(reason.name())
            .or_default() += 1;
    }

    /// Returns `true` if no rejection has been recorded.
    pub fn is_empty(&self) -> bool {
        self.discards.is_empty()
    }

    /// Returns the number of rejections across all orgs and reasons.
    pub fn total(&self) -> usize {
        self.discards.values().flat_map(|reasons| reasons.values()).sum()
    }

    /// Returns the number of rejections for an org and reason.
    pub fn get(&self, org_id: OrgId, reason: InvalidMetric) -> usize {
        self.discards
            .get(&org_id)
            .and_then(|reasons| reasons.get(reason.name()))
            .copied()
            .unwrap_or(0)
    }

    /// Iterates all `(org, reason, count)` entries in org and reason order.
    pub fn iter(&self) -> impl Iterator<Item = (OrgId, &'static str, usize)> + '_ {
        self.discards.iter().flat_map(|(org_id, reasons)| {
            reasons
                .iter()
                .map(move |(reason, count)| (*org_id, *reason, *count))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty() {
        let ledger = DiscardLedger::new();
        assert!(ledger.is_empty());
        assert_eq!(ledger.total(), 0);
        assert_eq!(ledger.iter().count(), 0);
    }

    #[test]
    fn test_groups_by_org_and_reason() {
        let mut ledger = DiscardLedger::new();
        ledger.add(OrgId::new(5), InvalidMetric::NameEmpty);
        ledger.add(OrgId::new(5), InvalidMetric::NameEmpty);
        ledger.add(OrgId::new(5), InvalidMetric::InvalidTag);
        ledger.add(OrgId::new(2), InvalidMetric::NameEmpty);

        assert_eq!(ledger.total(), 4);
        assert_eq!(ledger.get(OrgId::new(5), InvalidMetric::NameEmpty), 2);
        assert_eq!(ledger.get(OrgId::new(2), InvalidMetric::InvalidTag), 0);

        let entries: Vec<_> = ledger.iter().collect();
        assert_eq!(
            entries,
            [
                (OrgId::new(2), "name cannot be empty", 1),
                (OrgId::new(5), "invalid tag format", 1),
                (OrgId::new(5), "name cannot be empty", 2),
            ]
        );
    }
}
