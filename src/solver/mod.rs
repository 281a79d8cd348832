pub mod loader;
pub mod sequencer;

pub use loader::{fill_truck, load, prioritize, select_eligible};
pub use sequencer::{sequence_stops, sequence_truck, Stop};
