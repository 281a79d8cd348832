use std::fmt;
use std::fs::File;
use std::path::Path;

use chrono::NaiveTime;
use colored::*;
use csv::Writer;
use itertools::Itertools;
use serde::Serialize;
use tracing::{info, warn};

use crate::domain::types::{
    Address, Deadline, LocationId, Package, PackageId, PackageStatus, Truck, TruckId,
};
use crate::error::Result;
use crate::evaluation::deliveries_by_punctuality;
use crate::hub::Hub;
use crate::store::KeyedStore;

/// A package as it stood at a point in the day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PackageSnapshot {
    pub id: PackageId,
    pub at: NaiveTime,
    pub address: Address,
    pub location: LocationId,
    pub deadline: Deadline,
    pub weight_kg: f64,
    pub status: PackageStatus,
    pub truck: Option<TruckId>,
    pub delivered_at: Option<NaiveTime>,
}

impl PackageSnapshot {
    pub fn of(package: &Package, at: NaiveTime) -> Self {
        let status = package.status_at(at);
        let (address, location) = package.address_at(at);
        Self {
            id: package.id,
            at,
            address: address.clone(),
            location,
            deadline: package.deadline,
            weight_kg: package.weight_kg,
            status,
            truck: package.truck().filter(|_| status >= PackageStatus::Loaded),
            delivered_at: package.delivered_at().filter(|_| status == PackageStatus::Delivered),
        }
    }

    pub fn is_late(&self) -> bool {
        self.delivered_at
            .is_some_and(|t| !self.deadline.is_met_by(t))
    }
}

impl fmt::Display for PackageSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{:<3} {:<42} due {:<6} {:>5.1} kg  {}",
            self.id,
            self.address.to_string(),
            self.deadline.to_string(),
            self.weight_kg,
            self.status
        )?;
        if let Some(truck) = self.truck {
            write!(f, " (truck {truck})")?;
        }
        if let Some(t) = self.delivered_at {
            write!(f, " at {}", t.format("%H:%M:%S"))?;
        }
        Ok(())
    }
}

/// A truck as it stood at a point in the day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TruckSnapshot {
    pub id: TruckId,
    pub at: NaiveTime,
    pub odometer: f64,
    pub on_board: Vec<PackageId>,
    pub delivered: Vec<PackageId>,
}

impl TruckSnapshot {
    pub fn of(truck: &Truck, packages: &KeyedStore<PackageId, Package>, at: NaiveTime) -> Self {
        let delivered: Vec<PackageId> = truck
            .deliveries()
            .filter(|leg| leg.arrived <= at)
            .filter_map(|leg| leg.package)
            .collect();
        let on_board = packages
            .values()
            .filter(|p| p.truck() == Some(truck.id))
            .filter(|p| {
                matches!(
                    p.status_at(at),
                    PackageStatus::Loaded | PackageStatus::EnRoute
                )
            })
            .map(|p| p.id)
            .sorted()
            .collect();

        Self {
            id: truck.id,
            at,
            odometer: truck.odometer_at(at),
            on_board,
            delivered,
        }
    }
}

impl fmt::Display for TruckSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Truck {} at {}: {:.1} mi, on board [{}], delivered [{}]",
            self.id,
            self.at.format("%H:%M"),
            self.odometer,
            self.on_board.iter().join(", "),
            self.delivered.iter().join(", ")
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StopRecord {
    pub package: PackageId,
    pub location: LocationId,
    pub arrived: NaiveTime,
    pub odometer: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TruckSummary {
    pub id: TruckId,
    pub miles: f64,
    pub trips: usize,
    pub stops: Vec<StopRecord>,
}

/// End-of-day totals for the whole fleet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DaySummary {
    pub hub: String,
    pub started_at: NaiveTime,
    pub finished_at: NaiveTime,
    pub total_miles: f64,
    pub on_time: usize,
    pub late: Vec<PackageId>,
    pub undelivered: Vec<PackageId>,
    pub trucks: Vec<TruckSummary>,
}

impl DaySummary {
    pub fn from_hub(hub: &Hub, finished_at: NaiveTime) -> Result<Self> {
        let mut trucks = Vec::with_capacity(hub.trucks.len());
        for id in hub.truck_ids() {
            let truck = hub.trucks.get(id)?;
            trucks.push(TruckSummary {
                id,
                miles: truck.odometer,
                trips: truck.trips,
                stops: truck
                    .deliveries()
                    .filter_map(|leg| {
                        leg.package.map(|package| StopRecord {
                            package,
                            location: leg.to,
                            arrived: leg.arrived,
                            odometer: leg.odometer,
                        })
                    })
                    .collect(),
            });
        }

        let punctuality = deliveries_by_punctuality(&hub.packages);
        Ok(Self {
            hub: hub.name.clone(),
            started_at: hub.opened_at,
            finished_at,
            total_miles: trucks.iter().map(|t| t.miles).sum(),
            on_time: punctuality.on_time.len(),
            late: punctuality.late,
            undelivered: punctuality.undelivered,
            trucks,
        })
    }

    pub fn within_threshold(&self, limit: f64) -> bool {
        self.total_miles <= limit
    }

    pub fn delivered(&self) -> usize {
        self.on_time + self.late.len()
    }
}

pub fn print_summary(summary: &DaySummary, mileage_limit: f64) {
    let headline = format!(
        "{}: {} delivered between {} and {}, {:.1} miles",
        summary.hub,
        summary.delivered(),
        summary.started_at.format("%H:%M"),
        summary.finished_at.format("%H:%M"),
        summary.total_miles
    );
    if summary.late.is_empty() && summary.within_threshold(mileage_limit) {
        println!("{}", headline.green());
    } else {
        println!("{}", headline.red());
    }

    if !summary.late.is_empty() {
        println!("{}", format!("Late: {}", summary.late.iter().join(", ")).red());
    }
    if !summary.undelivered.is_empty() {
        println!(
            "{}",
            format!("Undelivered: {}", summary.undelivered.iter().join(", ")).red()
        );
    }

    for truck in &summary.trucks {
        println!(
            "Truck {} : {:.1} mi over {} trip(s) : {}",
            truck.id,
            truck.miles,
            truck.trips,
            truck
                .stops
                .iter()
                .map(|s| format!("{}@{}", s.package, s.arrived.format("%H:%M")))
                .join(" ")
        );
    }
}

/// Prints every package and truck as of `at`.
pub fn print_status_at(hub: &Hub, at: NaiveTime) -> Result<()> {
    println!("{}", format!("Status at {}", at.format("%H:%M")).bold());
    for id in hub.packages.keys().into_iter().sorted() {
        let snapshot = hub.package_snapshot(id, at)?;
        let line = snapshot.to_string();
        match snapshot.status {
            PackageStatus::Delivered if snapshot.is_late() => println!("{}", line.red()),
            PackageStatus::Delivered => println!("{}", line.green()),
            PackageStatus::EnRoute | PackageStatus::Loaded => println!("{}", line.yellow()),
            PackageStatus::AtHub => println!("{line}"),
        }
    }
    for id in hub.truck_ids() {
        println!("{}", hub.truck_snapshot(id, at)?);
    }
    Ok(())
}

/// One row per package, in id order, as of the end of the run.
pub fn save_package_csv(hub: &Hub, path: &Path) -> Result<()> {
    let mut wtr = Writer::from_path(path)?;
    wtr.write_record([
        "id", "address", "city", "zip", "deadline", "weight_kg", "status", "truck", "delivered_at",
        "on_time",
    ])?;

    for id in hub.packages.keys().into_iter().sorted() {
        let p = hub.packages.get(id)?;
        wtr.write_record([
            p.id.to_string(),
            p.address().street.clone(),
            p.address().city.clone(),
            p.address().zip.clone(),
            p.deadline.to_string(),
            p.weight_kg.to_string(),
            p.status().to_string(),
            p.truck().map(|t| t.to_string()).unwrap_or_default(),
            p.delivered_at()
                .map(|t| t.format("%H:%M:%S").to_string())
                .unwrap_or_default(),
            p.delivered_at().map(|_| (!p.is_late()).to_string()).unwrap_or_default(),
        ])?;
    }

    wtr.flush()?;
    info!("Wrote package report to {}", path.display());
    Ok(())
}

pub fn save_summary_json(summary: &DaySummary, path: &Path) -> Result<()> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, summary)?;
    info!("Wrote day summary to {}", path.display());
    Ok(())
}

/// Logs the summary at a level matching the outcome.
pub fn log_summary(summary: &DaySummary, mileage_limit: f64) {
    if summary.late.is_empty() && summary.within_threshold(mileage_limit) {
        info!(
            "Day complete: {:.2} miles, {} on time",
            summary.total_miles, summary.on_time
        );
    } else {
        warn!(
            "Day complete: {:.2} miles (limit {:.0}), {} on time, {} late, {} undelivered",
            summary.total_miles,
            mileage_limit,
            summary.on_time,
            summary.late.len(),
            summary.undelivered.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Dataset;
    use crate::simulation::SimulationClock;

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn finished_reference_day() -> (Hub, NaiveTime) {
        let ds = Dataset::reference().unwrap();
        let (mut hub, correction) = Hub::from_dataset(&ds, hm(8, 0)).unwrap();
        let finished = SimulationClock::new(hm(8, 0), correction)
            .run(&mut hub)
            .unwrap();
        (hub, finished)
    }

    #[test]
    fn summary_totals_match_trucks() {
        let (hub, finished) = finished_reference_day();
        let summary = DaySummary::from_hub(&hub, finished).unwrap();

        let miles: f64 = hub.trucks.values().map(|t| t.odometer).sum();
        assert!((summary.total_miles - miles).abs() < 1e-9);
        assert_eq!(summary.delivered(), 40);
        assert!(summary.undelivered.is_empty());
        assert_eq!(
            summary.trucks.iter().map(|t| t.stops.len()).sum::<usize>(),
            40
        );
        assert!(summary.within_threshold(f64::MAX));
        assert!(!summary.within_threshold(0.0));
    }

    #[test]
    fn snapshot_before_start_is_all_at_hub() {
        let (hub, _) = finished_reference_day();
        let early = hm(7, 59);
        for id in hub.packages.keys() {
            let s = hub.package_snapshot(id, early).unwrap();
            assert_eq!(s.status, PackageStatus::AtHub);
            assert_eq!(s.truck, None);
            assert_eq!(s.delivered_at, None);
        }
        for id in hub.truck_ids() {
            let t = hub.truck_snapshot(id, early).unwrap();
            assert_eq!(t.odometer, 0.0);
            assert!(t.on_board.is_empty());
            assert!(t.delivered.is_empty());
        }
    }

    #[test]
    fn truck_snapshot_partitions_its_packages() {
        let (hub, _) = finished_reference_day();
        let at = hm(9, 30);
        let total_on_trucks: usize = hub
            .truck_ids()
            .into_iter()
            .map(|id| {
                let s = hub.truck_snapshot(id, at).unwrap();
                for p in &s.on_board {
                    assert!(!s.delivered.contains(p));
                }
                s.on_board.len()
            })
            .sum();
        let in_transit = hub
            .packages
            .values()
            .filter(|p| {
                matches!(
                    p.status_at(at),
                    PackageStatus::Loaded | PackageStatus::EnRoute
                )
            })
            .count();
        assert_eq!(total_on_trucks, in_transit);
    }

    #[test]
    fn exports_write_files() {
        let (hub, finished) = finished_reference_day();
        let summary = DaySummary::from_hub(&hub, finished).unwrap();
        let dir = std::env::temp_dir().join(format!("hub-dispatch-report-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let csv_path = dir.join("packages.csv");
        save_package_csv(&hub, &csv_path).unwrap();
        let text = std::fs::read_to_string(&csv_path).unwrap();
        assert_eq!(text.lines().count(), 41);
        assert!(text.starts_with("id,address,city,zip"));

        let json_path = dir.join("summary.json");
        save_summary_json(&summary, &json_path).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
        assert_eq!(value["trucks"].as_array().map(Vec::len), Some(3));

        std::fs::remove_dir_all(&dir).ok();
    }
}
