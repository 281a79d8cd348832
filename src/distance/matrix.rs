use std::collections::HashMap;

use tracing::{debug, warn};

use crate::domain::types::{Address, Location, LocationId};
use crate::error::{DispatchError, Result};

/// Symmetric adjacency-matrix graph of delivery locations.
///
/// Every pair of live vertices carries a distance once loading is complete,
/// so lookups are a direct row/column index. Vertex ids are arena slots and
/// are never reused; a removed vertex leaves a tombstone.
#[derive(Debug, Clone, Default)]
pub struct DistanceGraph {
    vertices: Vec<Option<Location>>,
    matrix: Vec<Vec<Option<f64>>>,
    by_street: HashMap<String, LocationId>,
}

impl DistanceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a location and extends the matrix by one row and column.
    /// Re-adding a known street returns the existing id.
    pub fn add_vertex(&mut self, name: &str, address: Address) -> LocationId {
        let key = address.lookup_key();
        if let Some(&existing) = self.by_street.get(&key) {
            warn!("Location '{}' already registered as {}", address, existing);
            return existing;
        }

        let id = LocationId(self.vertices.len());
        for row in &mut self.matrix {
            row.push(None);
        }
        let mut row = vec![None; self.vertices.len() + 1];
        row[id.0] = Some(0.0);
        self.matrix.push(row);

        self.vertices.push(Some(Location {
            id,
            name: name.trim().to_string(),
            address,
        }));
        self.by_street.insert(key, id);
        debug!("Registered location {}", id);
        id
    }

    pub fn remove_vertex(&mut self, id: LocationId) -> Result<Location> {
        let slot = self
            .vertices
            .get_mut(id.0)
            .and_then(Option::take)
            .ok_or_else(|| missing(id))?;
        self.by_street.remove(&slot.address.lookup_key());
        Ok(slot)
    }

    /// Sets the distance between `a` and `b` in both directions.
    pub fn add_edge(&mut self, a: LocationId, b: LocationId, distance: f64) -> Result<()> {
        self.check(a)?;
        self.check(b)?;
        if a == b {
            return Ok(());
        }
        self.matrix[a.0][b.0] = Some(distance);
        self.matrix[b.0][a.0] = Some(distance);
        Ok(())
    }

    pub fn distance(&self, a: LocationId, b: LocationId) -> Result<f64> {
        self.check(a)?;
        self.check(b)?;
        self.matrix[a.0][b.0].ok_or_else(|| DispatchError::LocationNotFound {
            location: format!("{a}->{b}"),
        })
    }

    fn check(&self, id: LocationId) -> Result<()> {
        match self.vertices.get(id.0) {
            Some(Some(_)) => Ok(()),
            _ => Err(missing(id)),
        }
    }

    pub fn contains(&self, id: LocationId) -> bool {
        self.check(id).is_ok()
    }

    pub fn location(&self, id: LocationId) -> Result<&Location> {
        self.vertices
            .get(id.0)
            .and_then(Option::as_ref)
            .ok_or_else(|| missing(id))
    }

    pub fn find_street(&self, street: &str) -> Option<LocationId> {
        self.by_street
            .get(&crate::domain::types::normalize_street(street))
            .copied()
    }

    pub fn resolve(&self, address: &Address) -> Result<LocationId> {
        self.find_street(&address.street)
            .ok_or_else(|| DispatchError::LocationNotFound {
                location: address.to_string(),
            })
    }

    pub fn locations(&self) -> impl Iterator<Item = &Location> + '_ {
        self.vertices.iter().flatten()
    }

    pub fn len(&self) -> usize {
        self.by_street.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_street.is_empty()
    }

    /// Fails on the first live pair with no recorded distance.
    pub fn ensure_dense(&self) -> Result<()> {
        let live: Vec<LocationId> = self.locations().map(|l| l.id).collect();
        for &a in &live {
            for &b in &live {
                self.distance(a, b)?;
            }
        }
        Ok(())
    }
}

fn missing(id: LocationId) -> DispatchError {
    DispatchError::LocationNotFound {
        location: id.to_string(),
    }
}
