mod chaining;

pub use chaining::{KeyedStore, StoreKey};
