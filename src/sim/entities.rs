use nalgebra::Vector3;

use crate::sim::assets::Visual;
use crate::sim::collision::Aabb;
use crate::sim::spawner::SceneryItem;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u64);

/// Which sidewalk a pedestrian walks on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn sign(&self) -> f32 {
        match self {
            Side::Left => -1.0,
            Side::Right => 1.0,
        }
    }
}

/// Height at which vehicles sit on the road surface.
pub const VEHICLE_Y: f32 = 1.0;

#[derive(Clone, Debug, PartialEq)]
pub struct TrafficEntity {
    pub id: EntityId,
    pub visual: Visual,
    pub lane: usize,
    pub x: f32,
    pub z: f32,
    pub speed: f32,
    /// Shown to the player when they crash into this vehicle.
    pub label: String,
}

impl TrafficEntity {
    pub fn position(&self) -> Vector3<f32> {
        Vector3::new(self.x, VEHICLE_Y, self.z)
    }

    pub fn bounds(&self) -> Aabb {
        Aabb::from_footprint(self.position(), self.visual.size, self.visual.base)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PedestrianEntity {
    pub id: EntityId,
    pub visual: Visual,
    pub side: Side,
    pub x: f32,
    pub z: f32,
    pub speed: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SceneryEntity {
    pub id: EntityId,
    pub item: SceneryItem,
    pub x: f32,
    pub z: f32,
}

/// Live entities of every class. Order inside each collection carries no
/// meaning.
#[derive(Default)]
pub struct Registry {
    pub traffic: Vec<TrafficEntity>,
    pub pedestrians: Vec<PedestrianEntity>,
    pub scenery: Vec<SceneryEntity>,
    next_id: u64,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self) -> EntityId {
        self.next_id += 1;
        EntityId(self.next_id)
    }

    pub fn clear(&mut self) {
        self.traffic.clear();
        self.pedestrians.clear();
        self.scenery.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.traffic.is_empty() && self.pedestrians.is_empty() && self.scenery.is_empty()
    }

    /// Moves traffic and pedestrians along the travel axis and removes the
    /// ones more than `behind` units past `player_z`. Returns how many of each
    /// were removed.
    pub fn advance_movers(&mut self, dt: f32, scale: f32, player_z: f32, behind: f32) -> (usize, usize) {
        let limit = player_z + behind;

        let before = self.traffic.len();
        self.traffic.retain_mut(|vehicle| {
            vehicle.z -= vehicle.speed * dt * scale;
            vehicle.z <= limit
        });
        let traffic_gone = before - self.traffic.len();

        let before = self.pedestrians.len();
        self.pedestrians.retain_mut(|pedestrian| {
            pedestrian.z -= pedestrian.speed * dt * scale;
            pedestrian.z <= limit
        });
        (traffic_gone, before - self.pedestrians.len())
    }

    /// Removes scenery more than `behind` units past `player_z`.
    pub fn prune_scenery(&mut self, player_z: f32, behind: f32) -> usize {
        let limit = player_z + behind;
        let before = self.scenery.len();
        self.scenery.retain(|item| item.z <= limit);
        before - self.scenery.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::assets::{FallbackShape, Visual};

    fn car(registry: &mut Registry, z: f32, speed: f32) {
        let id = registry.next_id();
        registry.traffic.push(TrafficEntity {
            id,
            visual: Visual::fallback(FallbackShape::Car { color: 0xFF0000 }),
            lane: 0,
            x: -6.0,
            z,
            speed,
            label: "Car".into(),
        });
    }

    #[test]
    fn ids_are_unique() {
        let mut registry = Registry::new();
        let a = registry.next_id();
        let b = registry.next_id();
        assert_ne!(a, b);
    }

    #[test]
    fn movers_behind_the_player_are_removed_without_skipping() {
        let mut registry = Registry::new();
        car(&mut registry, 200.0, 0.0);
        car(&mut registry, 201.0, 0.0);
        car(&mut registry, -50.0, 10.0);
        car(&mut registry, 300.0, 0.0);

        let (traffic, pedestrians) = registry.advance_movers(0.1, 12.0, 0.0, 150.0);
        assert_eq!((traffic, pedestrians), (3, 0));
        assert_eq!(registry.traffic.len(), 1);
        assert!((registry.traffic[0].z - (-62.0)).abs() < 1e-4);
    }

    #[test]
    fn traffic_bounds_follow_the_visual() {
        let mut registry = Registry::new();
        car(&mut registry, -20.0, 0.0);
        let bounds = registry.traffic[0].bounds();
        assert_eq!(bounds.min.x, -7.75);
        assert_eq!(bounds.max.z, -17.0);
        assert_eq!(bounds.min.y, VEHICLE_Y);
    }
}
