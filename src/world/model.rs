//! Persistent records for worlds, entities and static resources

use std::ops::{Add, Mul, Sub};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type EntityId = String;
pub type PlayerId = String;
pub type WorldId = String;
pub type ResourceId = String;

/// Opaque numeric kind of a static resource
pub type ResourceType = u32;

/// Default world side length in meters
pub const DEFAULT_WORLD_SIZE: f64 = 6400.0;

/// A point or displacement in world meters
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn length(self) -> f64 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn distance(self, other: Vec2) -> f64 {
        (other - self).length()
    }

    pub fn midpoint(self, other: Vec2) -> Vec2 {
        Vec2::new((self.x + other.x) * 0.5, (self.y + other.y) * 0.5)
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Add for Vec2 {
    type Output = Vec2;

    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vec2 {
    type Output = Vec2;

    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Vec2 {
    type Output = Vec2;

    fn mul(self, rhs: f64) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

/// Square world extent centered on the origin
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldBounds {
    size: f64,
}

impl WorldBounds {
    pub fn new(size: f64) -> Self {
        Self { size: size.abs() }
    }

    /// Side length in meters
    pub fn size(&self) -> f64 {
        self.size
    }

    pub fn half(&self) -> f64 {
        self.size * 0.5
    }

    /// Clamp a point into `[-S/2, S/2]²`. Non-finite components collapse to 0.
    pub fn clamp(&self, p: Vec2) -> Vec2 {
        let h = self.half();
        let axis = |v: f64| if v.is_finite() { v.clamp(-h, h) } else { 0.0 };
        Vec2::new(axis(p.x), axis(p.y))
    }

    pub fn contains(&self, p: Vec2) -> bool {
        let h = self.half();
        p.x >= -h && p.x <= h && p.y >= -h && p.y <= h
    }
}

impl Default for WorldBounds {
    fn default() -> Self {
        Self::new(DEFAULT_WORLD_SIZE)
    }
}

/// A player-controlled mobile avatar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub owner_id: PlayerId,
    pub world_id: WorldId,
    pub position: Vec2,
    /// Absent means no pending motion
    #[serde(default)]
    pub target: Option<Vec2>,
    /// Walk flag; a non-moving entity is frozen regardless of target
    #[serde(default)]
    pub moving: bool,
    pub created_at: DateTime<Utc>,
}

impl Entity {
    /// New entity parked at the world origin
    pub fn spawn(id: EntityId, owner_id: PlayerId, world_id: WorldId) -> Self {
        Self {
            id,
            owner_id,
            world_id,
            position: Vec2::ZERO,
            target: Some(Vec2::ZERO),
            moving: false,
            created_at: Utc::now(),
        }
    }

    /// Return a copy with position and target clamped to the world
    pub fn clamped(mut self, bounds: &WorldBounds) -> Self {
        self.position = bounds.clamp(self.position);
        self.target = self.target.map(|t| bounds.clamp(t));
        self
    }
}

/// Partial update for an entity. `None` fields keep the stored value.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct EntityPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<Vec2>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<Vec2>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub moving: Option<bool>,
}

impl EntityPatch {
    pub fn is_empty(&self) -> bool {
        self.position.is_none() && self.target.is_none() && self.moving.is_none()
    }

    /// Clamp every present coordinate to the world
    pub fn clamped(self, bounds: &WorldBounds) -> Self {
        Self {
            position: self.position.map(|p| bounds.clamp(p)),
            target: self.target.map(|t| bounds.clamp(t)),
            moving: self.moving,
        }
    }
}

/// Merge a patch into an entity, clamping the result
pub fn apply_patch(entity: &Entity, patch: &EntityPatch, bounds: &WorldBounds) -> Entity {
    let patch = patch.clamped(bounds);
    Entity {
        position: patch.position.unwrap_or(entity.position),
        target: patch.target.or(entity.target),
        moving: patch.moving.unwrap_or(entity.moving),
        ..entity.clone()
    }
    .clamped(bounds)
}

/// A bounded square world anchored by one main entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct World {
    pub id: WorldId,
    pub owner_id: PlayerId,
    pub main_entity_id: EntityId,
    #[serde(default)]
    pub resource_ids: Vec<ResourceId>,
    pub created_at: DateTime<Utc>,
}

/// Stationary harvestable object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticResource {
    pub id: ResourceId,
    pub world_id: WorldId,
    pub resource_type: ResourceType,
    pub position: Vec2,
    #[serde(default)]
    pub harvested: bool,
}

impl StaticResource {
    /// One-way false -> true transition. Returns whether this call flipped it.
    pub fn mark_harvested(&mut self) -> bool {
        if self.harvested {
            return false;
        }
        self.harvested = true;
        true
    }
}

/// A player and the entities it owns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    #[serde(default)]
    pub entity_ids: Vec<EntityId>,
}
