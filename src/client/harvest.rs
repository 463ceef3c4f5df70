//! Client-side harvest targeting and the local inventory view

use std::collections::HashMap;

use crate::client::camera::Camera;
use crate::wire::ResourceView;
use crate::world::{within_reach, ResourceType, Vec2};

/// How close in pixels a click must land to a resource
pub const CLICK_RADIUS_PX: f64 = 24.0;

/// Nearest unharvested resource drawn under `screen`
pub fn resource_at<'a>(
    resources: &'a [ResourceView],
    camera: &Camera,
    screen: Vec2,
) -> Option<&'a ResourceView> {
    resources
        .iter()
        .filter(|r| !r.harvested)
        .map(|r| (r, camera.world_to_screen(r.position).distance(screen)))
        .filter(|(_, d)| *d <= CLICK_RADIUS_PX)
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(r, _)| r)
}

/// Resource a click at `screen` would harvest, if the entity is close enough
pub fn find_harvestable<'a>(
    resources: &'a [ResourceView],
    camera: &Camera,
    screen: Vec2,
    entity_position: Vec2,
) -> Option<&'a ResourceView> {
    resource_at(resources, camera, screen).filter(|r| within_reach(entity_position, r.position))
}

/// Per-type counts mirrored from harvest events
#[derive(Debug, Clone, Default)]
pub struct LocalInventory {
    counts: HashMap<ResourceType, u64>,
}

impl LocalInventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip the resource and count it. Already harvested resources are left
    /// alone and the count does not change.
    pub fn apply(&mut self, resource: &mut ResourceView) -> bool {
        if resource.harvested {
            return false;
        }
        resource.harvested = true;
        *self.counts.entry(resource.resource_type).or_insert(0) += 1;
        true
    }

    pub fn count(&self, resource_type: ResourceType) -> u64 {
        self.counts.get(&resource_type).copied().unwrap_or(0)
    }

    /// Take the server's count as the truth for one type
    pub fn reconcile(&mut self, resource_type: ResourceType, count: u64) {
        self.counts.insert(resource_type, count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::camera::Viewport;
    use crate::world::WorldBounds;

    fn resource(id: &str, x: f64, harvested: bool) -> ResourceView {
        ResourceView {
            id: id.into(),
            resource_type: 1,
            position: Vec2::new(x, 0.0),
            harvested,
        }
    }

    fn camera() -> Camera {
        Camera::new(Viewport::new(800.0, 800.0), WorldBounds::default())
    }

    #[test]
    fn click_must_land_near_resource() {
        let cam = camera();
        let resources = vec![resource("r1", 2.0, false)];
        // 2m right of center at 100px/m
        assert!(resource_at(&resources, &cam, Vec2::new(610.0, 400.0)).is_some());
        assert!(resource_at(&resources, &cam, Vec2::new(650.0, 400.0)).is_none());
    }

    #[test]
    fn harvested_resources_are_not_targets() {
        let cam = camera();
        let resources = vec![resource("r1", 0.0, true), resource("r2", 0.1, false)];
        let hit = resource_at(&resources, &cam, Vec2::new(400.0, 400.0)).unwrap();
        assert_eq!(hit.id, "r2");
    }

    #[test]
    fn entity_must_be_within_reach() {
        let cam = camera();
        let resources = vec![resource("r1", 2.0, false)];
        let click = Vec2::new(600.0, 400.0);
        assert!(find_harvestable(&resources, &cam, click, Vec2::ZERO).is_some());
        assert!(find_harvestable(&resources, &cam, click, Vec2::new(-3.5, 0.0)).is_none());
    }

    #[test]
    fn harvesting_twice_counts_once() {
        let mut inventory = LocalInventory::new();
        let mut r = resource("r1", 0.0, false);
        assert!(inventory.apply(&mut r));
        assert!(!inventory.apply(&mut r));
        assert_eq!(inventory.count(1), 1);

        inventory.reconcile(1, 4);
        assert_eq!(inventory.count(1), 4);
    }
}
