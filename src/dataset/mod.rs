//! Input records for a simulated day and the embedded reference dataset.

pub mod notes;

use std::path::Path;

use csv::{ReaderBuilder, StringRecord};
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::constant::{TRUCK_CAPACITY, TRUCK_SPEED_MPH};
use crate::config::parse_clock;
use crate::distance::DistanceGraph;
use crate::domain::types::{Address, AddressCorrection, PackageId, TruckId};
use crate::error::{DispatchError, Result};

const REFERENCE_DISTANCES: &str = include_str!("../../data/distances.csv");
const REFERENCE_PACKAGES: &str = include_str!("../../data/packages.csv");
const REFERENCE_TRUCKS: &str = include_str!("../../data/trucks.csv");
const REFERENCE_CORRECTIONS: &str = include_str!("../../data/corrections.csv");

#[derive(Debug, Clone, PartialEq)]
pub struct LocationRecord {
    pub name: String,
    pub address: Address,
    /// Distances to this location and every location listed before it.
    pub distances: Vec<f64>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct PackageRecord {
    pub id: PackageId,
    pub address: String,
    pub city: String,
    pub zip: String,
    pub deadline: String,
    pub weight: f64,
    #[serde(default)]
    pub note: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TruckRecord {
    pub id: TruckId,
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    #[serde(default = "default_speed")]
    pub speed_mph: f64,
}

fn default_capacity() -> usize {
    TRUCK_CAPACITY
}

fn default_speed() -> f64 {
    TRUCK_SPEED_MPH
}

#[derive(Debug, Clone, Deserialize)]
struct CorrectionRecord {
    package: PackageId,
    at: String,
    address: String,
    city: String,
    zip: String,
}

#[derive(Debug, Clone)]
pub struct Dataset {
    /// The first location is the hub.
    pub locations: Vec<LocationRecord>,
    pub packages: Vec<PackageRecord>,
    pub trucks: Vec<TruckRecord>,
    pub correction: Option<AddressCorrection>,
}

impl Dataset {
    /// The 27-location, 40-package, 3-truck day shipped with the crate.
    pub fn reference() -> Result<Self> {
        Self::from_strs(
            REFERENCE_DISTANCES,
            REFERENCE_PACKAGES,
            REFERENCE_TRUCKS,
            REFERENCE_CORRECTIONS,
        )
    }

    pub async fn from_dir(dir: &Path) -> Result<Self> {
        info!("Loading dataset from {}", dir.display());
        let distances = tokio::fs::read_to_string(dir.join("distances.csv")).await?;
        let packages = tokio::fs::read_to_string(dir.join("packages.csv")).await?;
        let trucks = tokio::fs::read_to_string(dir.join("trucks.csv")).await?;
        let corrections = match tokio::fs::read_to_string(dir.join("corrections.csv")).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e.into()),
        };
        Self::from_strs(&distances, &packages, &trucks, &corrections)
    }

    pub fn from_strs(distances: &str, packages: &str, trucks: &str, corrections: &str) -> Result<Self> {
        let locations = read_locations(distances)?;
        let packages: Vec<PackageRecord> = read_records(packages)?;
        let trucks: Vec<TruckRecord> = read_records(trucks)?;
        let correction = read_correction(corrections)?;

        debug!(
            "Parsed {} locations, {} packages, {} trucks",
            locations.len(),
            packages.len(),
            trucks.len()
        );
        if locations.is_empty() {
            return Err(DispatchError::Dataset("no locations listed".into()));
        }
        Ok(Self {
            locations,
            packages,
            trucks,
            correction,
        })
    }

    /// Builds the dense distance graph. Row `i` of the table supplies the
    /// distances from location `i` to locations `0..=i`.
    pub fn build_graph(&self) -> Result<DistanceGraph> {
        let mut graph = DistanceGraph::new();
        let ids: Vec<_> = self
            .locations
            .iter()
            .map(|l| graph.add_vertex(&l.name, l.address.clone()))
            .collect();

        for (i, record) in self.locations.iter().enumerate() {
            for (j, &d) in record.distances.iter().enumerate().take(i + 1) {
                graph.add_edge(ids[i], ids[j], d)?;
            }
        }
        graph.ensure_dense()?;
        Ok(graph)
    }
}

fn read_records<T: for<'de> Deserialize<'de>>(text: &str) -> Result<Vec<T>> {
    let mut reader = ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());
    reader
        .deserialize()
        .collect::<std::result::Result<Vec<T>, _>>()
        .map_err(DispatchError::from)
}

fn read_locations(text: &str) -> Result<Vec<LocationRecord>> {
    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let mut locations = Vec::new();
    for row in reader.records() {
        locations.push(location_from_record(&row?)?);
    }
    Ok(locations)
}

fn location_from_record(record: &StringRecord) -> Result<LocationRecord> {
    let field = |i: usize| record.get(i).unwrap_or_default();
    let distances = record
        .iter()
        .skip(4)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<f64>()
                .map_err(|_| DispatchError::Dataset(format!("bad distance '{s}' for {}", field(0))))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(LocationRecord {
        name: field(0).to_string(),
        address: Address::new(field(1), field(2), field(3)),
        distances,
    })
}

fn read_correction(text: &str) -> Result<Option<AddressCorrection>> {
    if text.trim().is_empty() {
        return Ok(None);
    }
    let records: Vec<CorrectionRecord> = read_records(text)?;
    if records.len() > 1 {
        return Err(DispatchError::Dataset(format!(
            "{} address corrections listed, only one is supported",
            records.len()
        )));
    }
    records
        .into_iter()
        .next()
        .map(|r| {
            let at = parse_clock(&r.at)
                .ok_or_else(|| DispatchError::Dataset(format!("bad correction time '{}'", r.at)))?;
            Ok(AddressCorrection {
                package: r.package,
                at,
                address: Address::new(&r.address, &r.city, &r.zip),
            })
        })
        .transpose()
}
