use tracing::trace;

use crate::distance::DistanceGraph;
use crate::domain::types::LocationId;
use crate::error::Result;

/// Round-trip distance: hub to the first stop, along every stop, and back.
pub fn route_distance(stops: &[LocationId], hub: LocationId, graph: &DistanceGraph) -> Result<f64> {
    if stops.is_empty() {
        return Ok(0.0);
    }

    let hub_to_first = dist_between(hub, stops[0], graph)?;
    let last_to_hub = dist_between(stops[stops.len() - 1], hub, graph)?;

    let mut total = 0.0;
    for pair in stops.windows(2) {
        total += dist_between(pair[0], pair[1], graph)?;
    }

    Ok(hub_to_first + total + last_to_hub)
}

/// Distance of one leg, traced with its endpoints.
pub fn dist_between(from: LocationId, to: LocationId, graph: &DistanceGraph) -> Result<f64> {
    let miles = graph.distance(from, to)?;
    trace!("Leg {} -> {}: {:.1} mi", from, to, miles);
    Ok(miles)
}
