pub mod clock;
pub mod run;

pub use clock::SimulationClock;
