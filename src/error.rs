use chrono::NaiveTime;
use thiserror::Error;

use crate::domain::types::{PackageId, PackageStatus, TruckId};

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("no entry stored under key {key}")]
    NotFound { key: String },

    #[error("location {location} is not registered in the distance graph")]
    LocationNotFound { location: String },

    #[error("package {package} has address '{address}' with no known location")]
    UnknownAddress { package: PackageId, address: String },

    #[error("truck {truck} is already at capacity ({capacity})")]
    CapacityExceeded { truck: TruckId, capacity: usize },

    #[error("delivery group {group} ({size} packages) cannot fit on any truck (largest capacity {capacity})")]
    GroupUnsatisfiable {
        group: usize,
        size: usize,
        capacity: usize,
    },

    #[error("package {package} cannot move from {from:?} to {to:?}")]
    InvalidTransition {
        package: PackageId,
        from: PackageStatus,
        to: PackageStatus,
    },

    #[error("simulation stalled at {at} with {remaining} packages undelivered")]
    Stalled { at: NaiveTime, remaining: usize },

    #[error("dataset error: {0}")]
    Dataset(String),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Time(#[from] chrono::ParseError),
}

impl DispatchError {
    pub fn not_found(key: impl std::fmt::Display) -> Self {
        DispatchError::NotFound {
            key: key.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DispatchError>;
