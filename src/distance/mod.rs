mod matrix;

pub use matrix::DistanceGraph;
