use std::collections::BTreeSet;

use chrono::NaiveTime;
use tracing::{info, warn};

use crate::config::constant::HUB_NAME;
use crate::dataset::notes::{parse_deadline, parse_note};
use crate::dataset::Dataset;
use crate::distance::DistanceGraph;
use crate::domain::types::{
    Address, AddressCorrection, LocationId, Package, PackageId, PackageStatus, Truck, TruckId,
};
use crate::domain::DeliveryGroups;
use crate::error::{DispatchError, Result};
use crate::report::{PackageSnapshot, TruckSnapshot};
use crate::store::KeyedStore;

/// Everything a simulated day works against: both keyed stores, the distance
/// graph and the delivery groups. Built once per run and passed explicitly.
#[derive(Debug, Clone)]
pub struct Hub {
    pub name: String,
    pub location: LocationId,
    pub packages: KeyedStore<PackageId, Package>,
    pub trucks: KeyedStore<TruckId, Truck>,
    pub graph: DistanceGraph,
    pub groups: DeliveryGroups,
    pub opened_at: NaiveTime,
}

impl Hub {
    pub fn new(
        name: &str,
        graph: DistanceGraph,
        location: LocationId,
        packages: Vec<Package>,
        trucks: Vec<Truck>,
        opened_at: NaiveTime,
    ) -> Result<Self> {
        graph.location(location)?;

        let groups = DeliveryGroups::from_notes(packages.iter().map(|p| (p.id, p.note.as_ref())));

        let mut package_store = KeyedStore::new();
        for mut package in packages {
            if !graph.contains(package.location()) {
                return Err(DispatchError::UnknownAddress {
                    package: package.id,
                    address: package.address().to_string(),
                });
            }
            package.group = groups.group_of(package.id);
            if package_store.insert(package.id, package).is_some() {
                warn!("Duplicate package id replaced an earlier record");
            }
        }

        let mut truck_store = KeyedStore::new();
        for truck in trucks {
            truck_store.insert(truck.id, truck);
        }

        let hub = Self {
            name: name.to_string(),
            location,
            packages: package_store,
            trucks: truck_store,
            graph,
            groups,
            opened_at,
        };
        hub.check_groups()?;

        info!(
            "Hub '{}' ready: {} packages, {} trucks, {} locations, {} delivery groups",
            hub.name,
            hub.packages.len(),
            hub.trucks.len(),
            hub.graph.len(),
            hub.groups.len()
        );
        Ok(hub)
    }

    /// Builds the hub and returns the day's scheduled address correction.
    pub fn from_dataset(dataset: &Dataset, opened_at: NaiveTime) -> Result<(Self, Option<AddressCorrection>)> {
        let graph = dataset.build_graph()?;
        let hub_location = graph.resolve(&dataset.locations[0].address)?;
        let correction = dataset.correction.clone();

        if let Some(c) = &correction {
            graph.resolve(&c.address).map_err(|_| DispatchError::UnknownAddress {
                package: c.package,
                address: c.address.to_string(),
            })?;
        }

        let mut packages = Vec::with_capacity(dataset.packages.len());
        for record in &dataset.packages {
            let address = Address::new(&record.address, &record.city, &record.zip);
            let location = graph
                .resolve(&address)
                .map_err(|_| DispatchError::UnknownAddress {
                    package: record.id,
                    address: address.to_string(),
                })?;
            let note = parse_note(record.id, &record.note, correction.as_ref())?;
            packages.push(Package::new(
                record.id,
                address,
                location,
                parse_deadline(&record.deadline)?,
                record.weight,
                note,
            ));
        }

        let trucks = dataset
            .trucks
            .iter()
            .map(|t| Truck::new(t.id, t.capacity, t.speed_mph, hub_location, opened_at))
            .collect();

        let name = dataset
            .locations
            .first()
            .map_or(HUB_NAME, |l| l.name.as_str());
        let hub = Self::new(name, graph, hub_location, packages, trucks, opened_at)?;
        Ok((hub, correction))
    }

    /// Every delivery group must fit on one truck, and its pins may not
    /// disagree.
    fn check_groups(&self) -> Result<()> {
        let largest = self.trucks.values().map(|t| t.capacity).max().unwrap_or(0);
        for (group, members) in self.groups.iter() {
            let pins: BTreeSet<TruckId> = members
                .iter()
                .filter_map(|id| self.packages.find(*id))
                .filter_map(Package::pinned_truck)
                .collect();
            let capacity = match pins.len() {
                0 => largest,
                1 => pins
                    .iter()
                    .filter_map(|t| self.trucks.find(*t))
                    .map(|t| t.capacity)
                    .next()
                    .unwrap_or(0),
                _ => 0,
            };
            if members.len() > capacity {
                return Err(DispatchError::GroupUnsatisfiable {
                    group,
                    size: members.len(),
                    capacity,
                });
            }
            if let Some(missing) = members.iter().find(|id| !self.packages.contains_key(**id)) {
                return Err(DispatchError::Dataset(format!(
                    "delivery group {group} names unknown package {missing}"
                )));
            }
        }
        Ok(())
    }

    /// Applies the scheduled address change through the package store's
    /// update path.
    pub fn apply_correction(&mut self, correction: &AddressCorrection) -> Result<()> {
        let location = self.graph.resolve(&correction.address)?;
        self.packages.update(correction.package, |p| {
            p.correct_address(correction.address.clone(), location, correction.at)
        })?;
        info!(
            "Package {} address corrected to {} at {}",
            correction.package, correction.address, correction.at
        );
        Ok(())
    }

    pub fn undelivered(&self) -> usize {
        self.packages
            .values()
            .filter(|p| p.status() != PackageStatus::Delivered)
            .count()
    }

    pub fn all_trucks_docked(&self) -> bool {
        self.trucks.values().all(Truck::is_at_hub)
    }

    pub fn truck_ids(&self) -> Vec<TruckId> {
        let mut ids = self.trucks.keys();
        ids.sort_unstable();
        ids
    }

    pub fn package_snapshot(&self, id: PackageId, at: NaiveTime) -> Result<PackageSnapshot> {
        let package = self.packages.get(id)?;
        Ok(PackageSnapshot::of(package, at))
    }

    pub fn truck_snapshot(&self, id: TruckId, at: NaiveTime) -> Result<TruckSnapshot> {
        let truck = self.trucks.get(id)?;
        Ok(TruckSnapshot::of(truck, &self.packages, at))
    }
}
