use std::collections::{BTreeMap, BTreeSet};

use crate::domain::types::{GroupId, PackageId, SpecialNote};

/// Packages that must leave the hub together, closed transitively over every
/// "must be delivered with" note.
#[derive(Debug, Clone, Default)]
pub struct DeliveryGroups {
    groups: Vec<Vec<PackageId>>,
    member_of: BTreeMap<PackageId, GroupId>,
}

impl DeliveryGroups {
    /// Builds groups from `(package, note)` pairs. Group ids follow the order of
    /// each group's smallest member.
    pub fn from_notes<'a>(notes: impl IntoIterator<Item = (PackageId, Option<&'a SpecialNote>)>) -> Self {
        let mut links: BTreeMap<PackageId, BTreeSet<PackageId>> = BTreeMap::new();
        for (id, note) in notes {
            if let Some(SpecialNote::DeliverWith(others)) = note {
                for &other in others {
                    links.entry(id).or_default().insert(other);
                    links.entry(other).or_default().insert(id);
                }
            }
        }

        let mut member_of = BTreeMap::new();
        let mut groups = Vec::new();
        for &start in links.keys() {
            if member_of.contains_key(&start) {
                continue;
            }
            let group_id = groups.len();
            let mut members = BTreeSet::new();
            let mut frontier = vec![start];
            while let Some(id) = frontier.pop() {
                if !members.insert(id) {
                    continue;
                }
                member_of.insert(id, group_id);
                if let Some(next) = links.get(&id) {
                    frontier.extend(next.iter().copied().filter(|n| !members.contains(n)));
                }
            }
            groups.push(members.into_iter().collect());
        }

        Self { groups, member_of }
    }

    pub fn group_of(&self, package: PackageId) -> Option<GroupId> {
        self.member_of.get(&package).copied()
    }

    pub fn members(&self, group: GroupId) -> &[PackageId] {
        self.groups.get(group).map_or(&[][..], Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (GroupId, &[PackageId])> + '_ {
        self.groups.iter().enumerate().map(|(g, m)| (g, m.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}
