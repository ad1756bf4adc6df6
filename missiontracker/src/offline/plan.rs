//! Pure diff between cached regions and desired bounds.

use std::collections::HashSet;

use super::store::OfflineRegionHandle;
use crate::geo::BoundingBox;

/// The set of mission areas that should be cached. Replaced wholesale on
/// every update.
pub type DesiredBoundsSet = HashSet<BoundingBox>;

/// Work for one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PassPlan {
    /// Regions whose bounds match no desired entry.
    pub delete: Vec<OfflineRegionHandle>,
    /// Regions that match; activated if still incomplete.
    pub refresh: Vec<OfflineRegionHandle>,
    /// Desired bounds with no region yet.
    pub create: Vec<BoundingBox>,
}

impl PassPlan {
    /// Whether the pass issues no delete or create.
    pub fn is_settled(&self) -> bool {
        self.delete.is_empty() && self.create.is_empty()
    }
}

/// Split `regions` and `desired` into delete/refresh/create work.
///
/// Matching is exact equality of the region definition's bounds. Creates are
/// ordered north-to-south, west-to-east so passes are deterministic.
pub fn plan_pass(regions: &[OfflineRegionHandle], desired: &DesiredBoundsSet) -> PassPlan {
    let mut plan = PassPlan::default();
    let mut matched = HashSet::with_capacity(desired.len());

    for region in regions {
        let bounds = region.bounds();
        if desired.contains(&bounds) {
            matched.insert(bounds);
            plan.refresh.push(region.clone());
        } else {
            plan.delete.push(region.clone());
        }
    }

    plan.create = desired
        .iter()
        .filter(|bounds| !matched.contains(*bounds))
        .copied()
        .collect();
    plan.create.sort_by(|a, b| {
        b.north
            .total_cmp(&a.north)
            .then(a.west.total_cmp(&b.west))
            .then(b.south.total_cmp(&a.south))
            .then(a.east.total_cmp(&b.east))
    });

    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::offline::store::{RegionDefinition, RegionId};
    use proptest::prelude::*;

    fn region(id: u64, bounds: BoundingBox) -> OfflineRegionHandle {
        OfflineRegionHandle {
            id: RegionId(id),
            definition: RegionDefinition {
                style_url: "style".to_string(),
                bounds,
                min_zoom: 0.0,
                max_zoom: 18.0,
                pixel_ratio: 1.0,
            },
        }
    }

    fn bounds(n: f64) -> BoundingBox {
        BoundingBox::new(n, n, n + 0.1, n + 0.1)
    }

    #[test]
    fn test_creates_missing_and_keeps_matching() {
        let a = bounds(1.0);
        let b = bounds(2.0);
        let regions = vec![region(1, a)];
        let desired: DesiredBoundsSet = [a, b].into_iter().collect();

        let plan = plan_pass(&regions, &desired);
        assert!(plan.delete.is_empty());
        assert_eq!(plan.refresh, regions);
        assert_eq!(plan.create, vec![b]);
    }

    #[test]
    fn test_empty_desired_deletes_everything() {
        let regions = vec![region(1, bounds(1.0)), region(2, bounds(2.0))];
        let plan = plan_pass(&regions, &DesiredBoundsSet::new());
        assert_eq!(plan.delete, regions);
        assert!(plan.create.is_empty());
    }

    #[test]
    fn test_near_miss_bounds_do_not_match() {
        let a = bounds(1.0);
        let almost_a = BoundingBox::new(a.south, a.west, a.north, a.east + 1e-12);
        let regions = vec![region(1, a)];
        let desired: DesiredBoundsSet = [almost_a].into_iter().collect();

        let plan = plan_pass(&regions, &desired);
        assert_eq!(plan.delete.len(), 1);
        assert_eq!(plan.create, vec![almost_a]);
    }

    #[test]
    fn test_create_order_is_north_first() {
        let desired: DesiredBoundsSet = [bounds(1.0), bounds(3.0), bounds(2.0)].into_iter().collect();
        let plan = plan_pass(&[], &desired);
        assert_eq!(plan.create, vec![bounds(3.0), bounds(2.0), bounds(1.0)]);
    }

    proptest! {
        #[test]
        fn prop_plan_partitions_and_converges(
            existing in proptest::collection::vec(0u8..8, 0..8),
            wanted in proptest::collection::hash_set(0u8..8, 0..8),
        ) {
            let regions: Vec<_> = existing
                .iter()
                .enumerate()
                .map(|(i, n)| region(i as u64, bounds(*n as f64)))
                .collect();
            let desired: DesiredBoundsSet = wanted.iter().map(|n| bounds(*n as f64)).collect();

            let plan = plan_pass(&regions, &desired);
            prop_assert_eq!(plan.delete.len() + plan.refresh.len(), regions.len());

            // Applying the plan yields exactly the desired set of bounds
            let mut result: HashSet<BoundingBox> = plan.refresh.iter().map(|r| r.bounds()).collect();
            result.extend(plan.create.iter().copied());
            prop_assert_eq!(&result, &desired);

            // A second plan over the result is settled
            let after: Vec<_> = plan
                .refresh
                .iter()
                .cloned()
                .chain(plan.create.iter().enumerate().map(|(i, b)| region(100 + i as u64, *b)))
                .collect();
            prop_assert!(plan_pass(&after, &desired).is_settled());
        }
    }
}
