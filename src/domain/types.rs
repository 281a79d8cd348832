use std::fmt;

use chrono::{Duration, NaiveTime};
use serde::Serialize;

use crate::error::{DispatchError, Result};

pub type PackageId = u32;
pub type TruckId = u32;
pub type GroupId = usize;

/// Stable arena index of a location inside the distance graph, assigned once
/// when the location is registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct LocationId(pub usize);

impl fmt::Display for LocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Address {
    pub street: String,
    pub city: String,
    pub zip: String,
}

impl Address {
    pub fn new(street: &str, city: &str, zip: &str) -> Self {
        Self {
            street: street.trim().to_string(),
            city: city.trim().to_string(),
            zip: zip.trim().to_string(),
        }
    }

    /// Key used to resolve a street address to a graph location.
    pub fn lookup_key(&self) -> String {
        normalize_street(&self.street)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {} {}", self.street, self.city, self.zip)
    }
}

pub fn normalize_street(street: &str) -> String {
    street
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Location {
    pub id: LocationId,
    pub name: String,
    pub address: Address,
}

/// Delivery deadline. `EndOfDay` orders after every clock time, so sorting
/// ascending puts the most urgent packages first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Deadline {
    By(NaiveTime),
    EndOfDay,
}

impl Deadline {
    pub fn is_met_by(&self, at: NaiveTime) -> bool {
        match self {
            Deadline::By(t) => at <= *t,
            Deadline::EndOfDay => true,
        }
    }

    pub fn time(&self) -> Option<NaiveTime> {
        match self {
            Deadline::By(t) => Some(*t),
            Deadline::EndOfDay => None,
        }
    }
}

impl fmt::Display for Deadline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Deadline::By(t) => write!(f, "{}", t.format("%H:%M")),
            Deadline::EndOfDay => write!(f, "EOD"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SpecialNote {
    OnTruck(TruckId),
    DeliverWith(Vec<PackageId>),
    AvailableAfter(NaiveTime),
    WrongAddressUntil(NaiveTime),
}

/// The scheduled mid-day fix of a package's delivery address.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AddressCorrection {
    pub package: PackageId,
    pub at: NaiveTime,
    pub address: Address,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum PackageStatus {
    AtHub,
    Loaded,
    EnRoute,
    Delivered,
}

impl PackageStatus {
    fn next(self) -> Option<PackageStatus> {
        match self {
            PackageStatus::AtHub => Some(PackageStatus::Loaded),
            PackageStatus::Loaded => Some(PackageStatus::EnRoute),
            PackageStatus::EnRoute => Some(PackageStatus::Delivered),
            PackageStatus::Delivered => None,
        }
    }
}

impl fmt::Display for PackageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PackageStatus::AtHub => "AT HUB",
            PackageStatus::Loaded => "LOADED",
            PackageStatus::EnRoute => "EN ROUTE",
            PackageStatus::Delivered => "DELIVERED",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq)]
struct SupersededAddress {
    address: Address,
    location: LocationId,
    until: NaiveTime,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Package {
    pub id: PackageId,
    address: Address,
    location: LocationId,
    pub deadline: Deadline,
    pub weight_kg: f64,
    pub note: Option<SpecialNote>,
    pub group: Option<GroupId>,
    truck: Option<TruckId>,
    status: PackageStatus,
    history: Vec<(PackageStatus, NaiveTime)>,
    delivered_at: Option<NaiveTime>,
    superseded: Option<SupersededAddress>,
}

impl Package {
    pub fn new(
        id: PackageId,
        address: Address,
        location: LocationId,
        deadline: Deadline,
        weight_kg: f64,
        note: Option<SpecialNote>,
    ) -> Self {
        Self {
            id,
            address,
            location,
            deadline,
            weight_kg,
            note,
            group: None,
            truck: None,
            status: PackageStatus::AtHub,
            history: Vec::new(),
            delivered_at: None,
            superseded: None,
        }
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn location(&self) -> LocationId {
        self.location
    }

    pub fn status(&self) -> PackageStatus {
        self.status
    }

    pub fn truck(&self) -> Option<TruckId> {
        self.truck
    }

    pub fn delivered_at(&self) -> Option<NaiveTime> {
        self.delivered_at
    }

    /// Truck this package is pinned to, if any.
    pub fn pinned_truck(&self) -> Option<TruckId> {
        match self.note {
            Some(SpecialNote::OnTruck(t)) => Some(t),
            _ => None,
        }
    }

    /// Earliest time the package may leave the hub.
    pub fn available_from(&self) -> Option<NaiveTime> {
        match self.note {
            Some(SpecialNote::AvailableAfter(t)) | Some(SpecialNote::WrongAddressUntil(t)) => {
                Some(t)
            }
            _ => None,
        }
    }

    pub fn is_available_at(&self, now: NaiveTime) -> bool {
        self.available_from().map_or(true, |t| t <= now)
    }

    pub fn is_late(&self) -> bool {
        self.delivered_at
            .is_some_and(|at| !self.deadline.is_met_by(at))
    }

    fn advance(&mut self, to: PackageStatus, at: NaiveTime) -> Result<()> {
        if self.status.next() != Some(to) {
            return Err(DispatchError::InvalidTransition {
                package: self.id,
                from: self.status,
                to,
            });
        }
        self.status = to;
        self.history.push((to, at));
        Ok(())
    }

    pub(crate) fn assign(&mut self, truck: TruckId, at: NaiveTime) -> Result<()> {
        self.advance(PackageStatus::Loaded, at)?;
        self.truck = Some(truck);
        Ok(())
    }

    pub(crate) fn depart(&mut self, at: NaiveTime) -> Result<()> {
        self.advance(PackageStatus::EnRoute, at)
    }

    pub(crate) fn deliver(&mut self, at: NaiveTime) -> Result<()> {
        self.advance(PackageStatus::Delivered, at)?;
        self.delivered_at = Some(at);
        Ok(())
    }

    /// Replaces the delivery address. The previous address stays answerable
    /// through [`Package::address_at`] for times before `at`.
    pub(crate) fn correct_address(&mut self, address: Address, location: LocationId, at: NaiveTime) {
        let previous = std::mem::replace(&mut self.address, address);
        let previous_location = std::mem::replace(&mut self.location, location);
        if self.superseded.is_none() {
            self.superseded = Some(SupersededAddress {
                address: previous,
                location: previous_location,
                until: at,
            });
        }
    }

    pub fn status_at(&self, t: NaiveTime) -> PackageStatus {
        self.history
            .iter()
            .take_while(|(_, since)| *since <= t)
            .last()
            .map_or(PackageStatus::AtHub, |(s, _)| *s)
    }

    pub fn address_at(&self, t: NaiveTime) -> (&Address, LocationId) {
        match &self.superseded {
            Some(old) if t < old.until => (&old.address, old.location),
            _ => (&self.address, self.location),
        }
    }

    pub fn history(&self) -> &[(PackageStatus, NaiveTime)] {
        &self.history
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Leg {
    Delivery(PackageId),
    Return,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TruckState {
    AtHub,
    Driving {
        to: LocationId,
        departs: NaiveTime,
        arrives: NaiveTime,
        miles: f64,
        leg: Leg,
    },
}

/// One completed leg of driving.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LegRecord {
    pub from: LocationId,
    pub to: LocationId,
    pub departed: NaiveTime,
    pub arrived: NaiveTime,
    pub miles: f64,
    pub odometer: f64,
    pub package: Option<PackageId>,
}

#[derive(Debug, Clone)]
pub struct Truck {
    pub id: TruckId,
    pub capacity: usize,
    pub speed_mph: f64,
    pub location: LocationId,
    pub odometer: f64,
    pub clock: NaiveTime,
    /// Packages on board. Once sequenced this is the delivery order and is
    /// consumed front to back through `next_stop`.
    pub loaded: Vec<PackageId>,
    pub next_stop: usize,
    pub departed_at: Option<NaiveTime>,
    pub state: TruckState,
    pub trips: usize,
    pub legs: Vec<LegRecord>,
}

impl Truck {
    pub fn new(id: TruckId, capacity: usize, speed_mph: f64, hub: LocationId, clock: NaiveTime) -> Self {
        Self {
            id,
            capacity,
            speed_mph,
            location: hub,
            odometer: 0.0,
            clock,
            loaded: Vec::with_capacity(capacity),
            next_stop: 0,
            departed_at: None,
            state: TruckState::AtHub,
            trips: 0,
            legs: Vec::new(),
        }
    }

    pub fn remaining_capacity(&self) -> usize {
        self.capacity.saturating_sub(self.loaded.len())
    }

    pub fn is_full(&self) -> bool {
        self.remaining_capacity() == 0
    }

    pub fn is_at_hub(&self) -> bool {
        matches!(self.state, TruckState::AtHub)
    }

    pub fn travel_time(&self, miles: f64) -> Duration {
        Duration::seconds((miles / self.speed_mph * 3600.0).round() as i64)
    }

    pub fn deliveries(&self) -> impl Iterator<Item = &LegRecord> + '_ {
        self.legs.iter().filter(|leg| leg.package.is_some())
    }

    /// Odometer reading as of `t`, counting only completed legs.
    pub fn odometer_at(&self, t: NaiveTime) -> f64 {
        self.legs
            .iter()
            .take_while(|leg| leg.arrived <= t)
            .last()
            .map_or(0.0, |leg| leg.odometer)
    }
}
