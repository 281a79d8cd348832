pub mod groups;
pub mod types;

pub use groups::DeliveryGroups;
pub use types::*;
