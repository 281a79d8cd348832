pub mod lateness;
pub mod route;

pub use lateness::{deliveries_by_punctuality, Punctuality};
pub use route::{dist_between, route_distance};
