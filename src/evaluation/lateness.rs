use crate::domain::types::{Package, PackageId};
use crate::store::KeyedStore;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Punctuality {
    pub on_time: Vec<PackageId>,
    pub late: Vec<PackageId>,
    pub undelivered: Vec<PackageId>,
}

/// Splits packages by whether their delivery met the deadline. Ids are sorted.
pub fn deliveries_by_punctuality(packages: &KeyedStore<PackageId, Package>) -> Punctuality {
    let mut result = Punctuality::default();
    for p in packages.values() {
        match p.delivered_at() {
            None => result.undelivered.push(p.id),
            Some(_) if p.is_late() => result.late.push(p.id),
            Some(_) => result.on_time.push(p.id),
        }
    }
    result.on_time.sort_unstable();
    result.late.sort_unstable();
    result.undelivered.sort_unstable();
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{Address, Deadline, LocationId};
    use chrono::NaiveTime;

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn splits_on_deadline() {
        let mut store = KeyedStore::new();
        for (id, delivered) in [(1, Some(hm(9, 0))), (2, Some(hm(11, 0))), (3, None)] {
            let mut p = Package::new(
                id,
                Address::new("1 Main", "T", "1"),
                LocationId(1),
                Deadline::By(hm(10, 30)),
                1.0,
                None,
            );
            if let Some(at) = delivered {
                p.assign(1, hm(8, 0)).unwrap();
                p.depart(hm(8, 0)).unwrap();
                p.deliver(at).unwrap();
            }
            store.insert(id, p);
        }

        let result = deliveries_by_punctuality(&store);
        assert_eq!(result.on_time, vec![1]);
        assert_eq!(result.late, vec![2]);
        assert_eq!(result.undelivered, vec![3]);
    }
}
