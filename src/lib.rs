pub mod config;
pub mod dataset;
pub mod distance;
pub mod domain;
pub mod error;
pub mod evaluation;
pub mod hub;
pub mod report;
pub mod simulation;
pub mod solver;
pub mod store;
