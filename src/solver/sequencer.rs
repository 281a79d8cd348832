use tracing::{debug, span, Level};

use crate::domain::types::{Deadline, LocationId, PackageId, TruckId};
use crate::error::Result;
use crate::evaluation::route::route_distance;
use crate::hub::Hub;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stop {
    pub package: PackageId,
    pub location: LocationId,
    pub deadline: Deadline,
}

/// Orders `stops` for delivery starting from `start`.
///
/// Selection-sort style: for each position, scan the remaining stops starting
/// with the one already in place. A candidate replaces the running best only
/// when it is strictly nearer and its deadline is no later than the best's, so
/// an end-of-day stop never displaces one with a deadline and the first stop
/// wins on equal distance. The best is then swapped into the position.
///
/// Every stop left after position `i` is either no nearer than `order[i]` or
/// due strictly later. The returned order is a permutation of the input.
/// O(n²) distance lookups.
pub fn sequence_stops<F>(stops: &[Stop], start: LocationId, mut distance: F) -> Result<Vec<Stop>>
where
    F: FnMut(LocationId, LocationId) -> Result<f64>,
{
    let mut order = stops.to_vec();
    let mut current = start;

    for i in 0..order.len() {
        let mut best = i;
        let mut best_distance = distance(current, order[i].location)?;
        for j in (i + 1)..order.len() {
            let d = distance(current, order[j].location)?;
            if d < best_distance && order[j].deadline <= order[best].deadline {
                best = j;
                best_distance = d;
            }
        }

        order.swap(i, best);
        current = order[i].location;
    }

    Ok(order)
}

/// Reorders a docked truck's load into delivery order, starting at the hub.
pub fn sequence_truck(hub: &mut Hub, truck_id: TruckId) -> Result<()> {
    let span = span!(Level::DEBUG, "sequence", truck = truck_id);
    let _guard = span.enter();

    let truck = hub.trucks.get(truck_id)?;
    let stops = truck
        .loaded
        .iter()
        .map(|&id| {
            let p = hub.packages.get(id)?;
            Ok(Stop {
                package: id,
                location: p.location(),
                deadline: p.deadline,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let graph = &hub.graph;
    let order = sequence_stops(&stops, hub.location, |a, b| graph.distance(a, b))?;

    let visits: Vec<LocationId> = order.iter().map(|s| s.location).collect();
    debug!(
        "Truck {} route: {:?} ({:.1} mi round trip)",
        truck_id,
        order.iter().map(|s| s.package).collect::<Vec<_>>(),
        route_distance(&visits, hub.location, graph)?
    );

    hub.trucks.get_mut(truck_id)?.loaded = order.into_iter().map(|s| s.package).collect();
    Ok(())
}
