use std::collections::BTreeSet;

use chrono::{Duration, NaiveTime};
use tracing::{debug, info, span, trace, Level};

use crate::config::constant::{DISPATCH_LOOKAHEAD_MINUTES, TICK_MINUTES};
use crate::domain::types::{AddressCorrection, Leg, LegRecord, PackageStatus, TruckId, TruckState};
use crate::error::{DispatchError, Result};
use crate::hub::Hub;
use crate::solver::{fill_truck, select_eligible, sequence_truck};

/// Drives a simulated day in fixed ticks. Each tick applies the address
/// correction when due, completes every leg whose arrival has passed, then
/// offers docked trucks to the dispatch policy in truck id order.
#[derive(Debug, Clone)]
pub struct SimulationClock {
    now: NaiveTime,
    tick: Duration,
    lookahead: Duration,
    correction: Option<AddressCorrection>,
    correction_applied: bool,
}

impl SimulationClock {
    pub fn new(start: NaiveTime, correction: Option<AddressCorrection>) -> Self {
        Self {
            now: start,
            tick: Duration::minutes(TICK_MINUTES),
            lookahead: Duration::minutes(DISPATCH_LOOKAHEAD_MINUTES),
            correction,
            correction_applied: false,
        }
    }

    pub fn with_lookahead(mut self, lookahead: Duration) -> Self {
        self.lookahead = lookahead;
        self
    }

    pub fn now(&self) -> NaiveTime {
        self.now
    }

    /// Runs until every package is delivered and every truck is back at the
    /// hub. Returns the time the last truck docked.
    pub fn run(&mut self, hub: &mut Hub) -> Result<NaiveTime> {
        let span = span!(Level::INFO, "day", start = %self.now);
        let _guard = span.enter();

        loop {
            self.tick(hub)?;
            if hub.undelivered() == 0 && hub.all_trucks_docked() {
                break;
            }
            self.advance_to(self.now + self.tick, hub)?;
        }

        let finished = hub
            .trucks
            .values()
            .map(|t| t.clock)
            .max()
            .unwrap_or(self.now);
        info!("All packages delivered, last truck docked at {}", finished);
        Ok(finished)
    }

    fn advance_to(&mut self, next: NaiveTime, hub: &Hub) -> Result<()> {
        if next <= self.now {
            return Err(DispatchError::Stalled {
                at: self.now,
                remaining: hub.undelivered(),
            });
        }
        self.now = next;
        Ok(())
    }

    /// Runs ticks up to and including `until`.
    pub fn run_until(&mut self, hub: &mut Hub, until: NaiveTime) -> Result<()> {
        while self.now <= until {
            self.tick(hub)?;
            let (next, wrapped) = self.now.overflowing_add_signed(self.tick);
            if wrapped != 0 {
                break;
            }
            self.now = next;
        }
        Ok(())
    }

    pub fn tick(&mut self, hub: &mut Hub) -> Result<()> {
        let span = span!(Level::TRACE, "tick", now = %self.now);
        let _guard = span.enter();

        self.apply_due_correction(hub)?;
        for id in hub.truck_ids() {
            self.advance_truck(hub, id)?;
        }
        for id in hub.truck_ids() {
            self.try_dispatch(hub, id)?;
        }
        Ok(())
    }

    fn apply_due_correction(&mut self, hub: &mut Hub) -> Result<()> {
        match &self.correction {
            Some(c) if !self.correction_applied && c.at <= self.now => {
                hub.apply_correction(c)?;
                self.correction_applied = true;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Completes every leg of `truck_id` that has arrived by now.
    fn advance_truck(&self, hub: &mut Hub, truck_id: TruckId) -> Result<()> {
        loop {
            let truck = hub.trucks.get_mut(truck_id)?;
            let TruckState::Driving {
                to,
                departs,
                arrives,
                miles,
                leg,
            } = truck.state
            else {
                return Ok(());
            };
            if arrives > self.now {
                return Ok(());
            }

            truck.odometer += miles;
            truck.legs.push(LegRecord {
                from: truck.location,
                to,
                departed: departs,
                arrived: arrives,
                miles,
                odometer: truck.odometer,
                package: match leg {
                    Leg::Delivery(id) => Some(id),
                    Leg::Return => None,
                },
            });
            truck.location = to;
            truck.clock = arrives;

            match leg {
                Leg::Delivery(package) => {
                    hub.packages.update(package, |p| p.deliver(arrives))??;
                    debug!("Truck {} delivered package {} at {}", truck_id, package, arrives);
                    schedule_next_leg(hub, truck_id, arrives)?;
                }
                Leg::Return => {
                    truck.state = TruckState::AtHub;
                    truck.loaded.clear();
                    truck.next_stop = 0;
                    info!(
                        "Truck {} docked at {} ({:.1} mi so far)",
                        truck_id, arrives, truck.odometer
                    );
                }
            }
        }
    }

    fn try_dispatch(&self, hub: &mut Hub, truck_id: TruckId) -> Result<()> {
        if !hub.trucks.get(truck_id)?.is_at_hub() || !self.should_dispatch(hub, truck_id)? {
            return Ok(());
        }

        if select_eligible(&hub.packages, truck_id, self.now).is_empty() {
            trace!("Nothing for truck {} at {}", truck_id, self.now);
            return Ok(());
        }
        let loaded = fill_truck(hub, truck_id, self.now)?;
        if loaded.is_empty() {
            return Ok(());
        }
        sequence_truck(hub, truck_id)?;
        self.depart(hub, truck_id)
    }

    /// Whether a docked truck should load and leave now. Leaves when a pending
    /// deadline falls inside the look-ahead window; holds when a package is
    /// about to become available, or when the remaining work fits on one truck
    /// and is pinned elsewhere.
    pub fn should_dispatch(&self, hub: &Hub, truck_id: TruckId) -> Result<bool> {
        let capacity = hub.trucks.get(truck_id)?.capacity;
        let horizon = saturating_add(self.now, self.lookahead);

        let pending: Vec<_> = hub
            .packages
            .values()
            .filter(|p| p.status() == PackageStatus::AtHub)
            .collect();
        if pending.is_empty() {
            return Ok(false);
        }

        if pending
            .iter()
            .any(|p| p.deadline.time().is_some_and(|d| d < horizon))
        {
            return Ok(true);
        }

        if pending
            .iter()
            .any(|p| p.available_from().is_some_and(|t| t > self.now && t < horizon))
        {
            return Ok(false);
        }

        let pins: BTreeSet<TruckId> = pending.iter().filter_map(|p| p.pinned_truck()).collect();
        if pending.len() <= capacity && !pins.is_empty() && !pins.contains(&truck_id) {
            return Ok(false);
        }

        Ok(true)
    }

    fn depart(&self, hub: &mut Hub, truck_id: TruckId) -> Result<()> {
        let truck = hub.trucks.get_mut(truck_id)?;
        truck.departed_at = Some(self.now);
        truck.clock = self.now;
        truck.trips += 1;
        truck.next_stop = 0;
        let on_board = truck.loaded.clone();

        for id in &on_board {
            hub.packages.update(*id, |p| p.depart(self.now))??;
        }
        info!(
            "Truck {} departs at {} with {} packages: {:?}",
            truck_id,
            self.now,
            on_board.len(),
            on_board
        );
        schedule_next_leg(hub, truck_id, self.now)
    }
}

/// Points the truck at its next stop, or back to the hub when the load is
/// exhausted. The stop's location is read from the store at this moment.
///
/// A leg already under way is not rerouted: a correction applied while the
/// truck drives to a package's old address takes effect only for legs
/// scheduled afterwards. Packages with a pending correction carry a
/// `WrongAddressUntil` note and stay at the hub until it is applied.
fn schedule_next_leg(hub: &mut Hub, truck_id: TruckId, at: NaiveTime) -> Result<()> {
    let truck = hub.trucks.get(truck_id)?;
    let from = truck.location;
    let (to, leg) = match truck.loaded.get(truck.next_stop) {
        Some(&package) => (hub.packages.get(package)?.location(), Leg::Delivery(package)),
        None => (hub.location, Leg::Return),
    };
    let miles = hub.graph.distance(from, to)?;

    let truck = hub.trucks.get_mut(truck_id)?;
    if let Leg::Delivery(_) = leg {
        truck.next_stop += 1;
    }
    let arrives = saturating_add(at, truck.travel_time(miles));
    truck.state = TruckState::Driving {
        to,
        departs: at,
        arrives,
        miles,
        leg,
    };
    trace!("Truck {} heading to {} ({:.1} mi), arrives {}", truck_id, to, miles, arrives);
    Ok(())
}

fn saturating_add(t: NaiveTime, d: Duration) -> NaiveTime {
    let (next, wrapped) = t.overflowing_add_signed(d);
    if wrapped != 0 {
        NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(t)
    } else {
        next
    }
}
