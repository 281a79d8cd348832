use std::collections::{BTreeSet, HashSet};

use chrono::NaiveTime;
use tracing::{debug, info, span, Level};

use crate::domain::types::{Deadline, Package, PackageId, PackageStatus, Truck, TruckId};
use crate::domain::DeliveryGroups;
use crate::error::{DispatchError, Result};
use crate::hub::Hub;
use crate::store::KeyedStore;

/// Packages at the hub that `truck` may carry at `now`: not pinned to another
/// truck and past any availability time. O(n) over the store.
pub fn select_eligible(
    packages: &KeyedStore<PackageId, Package>,
    truck: TruckId,
    now: NaiveTime,
) -> Vec<PackageId> {
    packages
        .values()
        .filter(|p| p.status() == PackageStatus::AtHub)
        .filter(|p| p.pinned_truck().map_or(true, |pin| pin == truck))
        .filter(|p| p.is_available_at(now))
        .map(|p| p.id)
        .collect()
}

/// Stable sort: grouped packages and packages pinned to `truck` first, then by
/// deadline with end-of-day last. Ties keep their incoming order.
pub fn prioritize(
    packages: &KeyedStore<PackageId, Package>,
    truck: TruckId,
    ids: &[PackageId],
) -> Vec<PackageId> {
    let mut ids = ids.to_vec();
    ids.sort_by_key(|id| match packages.find(*id) {
        Some(p) => {
            let constrained = p.group.is_some() || p.pinned_truck() == Some(truck);
            (!constrained, p.deadline)
        }
        None => (true, Deadline::EndOfDay),
    });
    ids
}

/// Loads packages onto `truck` in priority order until it is full or the list
/// runs out. A delivery group goes on whole or not at all; a group that does
/// not fit, or has a member outside `prioritized`, waits for a later round.
///
/// Returns the ids loaded in this round.
pub fn load(
    truck: &mut Truck,
    packages: &mut KeyedStore<PackageId, Package>,
    groups: &DeliveryGroups,
    prioritized: &[PackageId],
    now: NaiveTime,
) -> Result<Vec<PackageId>> {
    if truck.is_full() {
        return Err(DispatchError::CapacityExceeded {
            truck: truck.id,
            capacity: truck.capacity,
        });
    }

    let pool: HashSet<PackageId> = prioritized.iter().copied().collect();
    let mut skipped_groups = BTreeSet::new();
    let mut loaded = Vec::new();

    for &id in prioritized {
        if truck.is_full() {
            break;
        }
        let Some(package) = packages.find(id) else {
            continue;
        };
        if package.status() != PackageStatus::AtHub {
            continue;
        }

        let batch: Vec<PackageId> = match package.group {
            Some(group) => {
                if skipped_groups.contains(&group) {
                    continue;
                }
                let members = groups.members(group);
                let ready = members.iter().all(|m| {
                    pool.contains(m)
                        && packages
                            .find(*m)
                            .is_some_and(|p| p.status() == PackageStatus::AtHub)
                });
                if !ready || members.len() > truck.remaining_capacity() {
                    debug!(
                        "Truck {} skips group {} ({} packages, {} slots left)",
                        truck.id,
                        group,
                        members.len(),
                        truck.remaining_capacity()
                    );
                    skipped_groups.insert(group);
                    continue;
                }
                members.to_vec()
            }
            None => vec![id],
        };

        for member in batch {
            packages.update(member, |p| p.assign(truck.id, now))??;
            truck.loaded.push(member);
            loaded.push(member);
        }
    }

    Ok(loaded)
}

/// Runs one loading round for a docked truck.
pub fn fill_truck(hub: &mut Hub, truck_id: TruckId, now: NaiveTime) -> Result<Vec<PackageId>> {
    let span = span!(Level::DEBUG, "load", truck = truck_id);
    let _guard = span.enter();

    let eligible = select_eligible(&hub.packages, truck_id, now);
    let prioritized = prioritize(&hub.packages, truck_id, &eligible);
    debug!("Eligible for truck {}: {:?}", truck_id, prioritized);

    let truck = hub.trucks.get_mut(truck_id)?;
    let loaded = load(truck, &mut hub.packages, &hub.groups, &prioritized, now)?;
    info!(
        "Loaded {} packages onto truck {} at {}: {:?}",
        loaded.len(),
        truck_id,
        now,
        loaded
    );
    Ok(loaded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{Address, LocationId, SpecialNote};

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn package(id: PackageId, deadline: Deadline, note: Option<SpecialNote>) -> Package {
        Package::new(
            id,
            Address::new("2 Main", "Town", "1"),
            LocationId(1),
            deadline,
            1.0,
            note,
        )
    }

    fn store(packages: Vec<Package>) -> (KeyedStore<PackageId, Package>, DeliveryGroups) {
        let groups = DeliveryGroups::from_notes(packages.iter().map(|p| (p.id, p.note.as_ref())));
        let mut store = KeyedStore::new();
        for mut p in packages {
            p.group = groups.group_of(p.id);
            store.insert(p.id, p);
        }
        (store, groups)
    }

    fn truck(id: TruckId, capacity: usize) -> Truck {
        Truck::new(id, capacity, 18.0, LocationId(0), hm(8, 0))
    }

    #[test]
    fn eligibility_respects_pins_and_availability() {
        let (packages, _) = store(vec![
            package(1, Deadline::EndOfDay, None),
            package(2, Deadline::EndOfDay, Some(SpecialNote::OnTruck(2))),
            package(3, Deadline::EndOfDay, Some(SpecialNote::AvailableAfter(hm(9, 5)))),
            package(4, Deadline::EndOfDay, Some(SpecialNote::OnTruck(1))),
        ]);
        assert_eq!(select_eligible(&packages, 1, hm(8, 0)), vec![1, 4]);
        assert_eq!(select_eligible(&packages, 2, hm(8, 0)), vec![1, 2]);
        assert_eq!(select_eligible(&packages, 1, hm(9, 5)), vec![1, 3, 4]);
    }

    #[test]
    fn prioritize_puts_constrained_first_then_deadline() {
        let (packages, _) = store(vec![
            package(1, Deadline::EndOfDay, None),
            package(2, Deadline::By(hm(10, 30)), None),
            package(3, Deadline::EndOfDay, Some(SpecialNote::OnTruck(1))),
            package(4, Deadline::By(hm(9, 0)), None),
            package(5, Deadline::By(hm(10, 30)), None),
        ]);
        assert_eq!(
            prioritize(&packages, 1, &[1, 2, 3, 4, 5]),
            vec![3, 4, 2, 5, 1]
        );
        // Pinned to a different truck is not a priority for this one.
        assert_eq!(prioritize(&packages, 2, &[1, 3]), vec![1, 3]);
    }

    #[test]
    fn prioritize_is_stable_for_ties() {
        let (packages, _) = store(vec![
            package(7, Deadline::EndOfDay, None),
            package(3, Deadline::EndOfDay, None),
            package(5, Deadline::EndOfDay, None),
        ]);
        assert_eq!(prioritize(&packages, 1, &[7, 3, 5]), vec![7, 3, 5]);
        assert_eq!(prioritize(&packages, 1, &[5, 7, 3]), vec![5, 7, 3]);
    }

    #[test]
    fn load_stops_at_capacity() {
        let (mut packages, groups) = store((1..=5).map(|id| package(id, Deadline::EndOfDay, None)).collect());
        let mut t = truck(1, 3);
        let loaded = load(&mut t, &mut packages, &groups, &[1, 2, 3, 4, 5], hm(8, 0)).unwrap();
        assert_eq!(loaded, vec![1, 2, 3]);
        assert_eq!(t.loaded, vec![1, 2, 3]);
        assert_eq!(packages.get(2).unwrap().status(), PackageStatus::Loaded);
        assert_eq!(packages.get(2).unwrap().truck(), Some(1));
        assert_eq!(packages.get(4).unwrap().status(), PackageStatus::AtHub);
    }

    #[test]
    fn group_loads_whole_or_waits() {
        let (mut packages, groups) = store(vec![
            package(1, Deadline::EndOfDay, None),
            package(2, Deadline::EndOfDay, Some(SpecialNote::DeliverWith(vec![3, 4]))),
            package(3, Deadline::EndOfDay, None),
            package(4, Deadline::EndOfDay, None),
            package(5, Deadline::EndOfDay, None),
        ]);
        let mut t = truck(1, 3);
        let loaded = load(&mut t, &mut packages, &groups, &[1, 2, 3, 4, 5], hm(8, 0)).unwrap();
        // One slot used, group of three no longer fits.
        assert_eq!(loaded, vec![1, 5]);
        for id in [2, 3, 4] {
            assert_eq!(packages.get(id).unwrap().status(), PackageStatus::AtHub);
        }

        let mut t2 = truck(2, 3);
        let loaded = load(&mut t2, &mut packages, &groups, &[2, 3, 4], hm(8, 0)).unwrap();
        assert_eq!(loaded, vec![2, 3, 4]);
        assert!(t2.is_full());
    }

    #[test]
    fn group_with_ineligible_member_waits() {
        let (mut packages, groups) = store(vec![
            package(1, Deadline::EndOfDay, Some(SpecialNote::DeliverWith(vec![2]))),
            package(2, Deadline::EndOfDay, Some(SpecialNote::AvailableAfter(hm(9, 5)))),
            package(3, Deadline::EndOfDay, None),
        ]);
        let eligible = select_eligible(&packages, 1, hm(8, 0));
        assert_eq!(eligible, vec![1, 3]);
        let mut t = truck(1, 16);
        let loaded = load(&mut t, &mut packages, &groups, &eligible, hm(8, 0)).unwrap();
        assert_eq!(loaded, vec![3]);
    }

    #[test]
    fn loading_a_full_truck_is_an_error() {
        let (mut packages, groups) = store(vec![package(1, Deadline::EndOfDay, None)]);
        let mut t = truck(1, 0);
        assert!(matches!(
            load(&mut t, &mut packages, &groups, &[1], hm(8, 0)),
            Err(DispatchError::CapacityExceeded { truck: 1, capacity: 0 })
        ));
    }

    #[test]
    fn unknown_ids_are_skipped() {
        let (mut packages, groups) = store(vec![package(1, Deadline::EndOfDay, None)]);
        let mut t = truck(1, 4);
        let loaded = load(&mut t, &mut packages, &groups, &[99, 1], hm(8, 0)).unwrap();
        assert_eq!(loaded, vec![1]);
    }
}
