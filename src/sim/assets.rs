//! Message protocol between the simulation and whatever loads models.
//!
//! The simulation never waits on a load. It hands the loader an
//! [`AssetRequest`] carrying a [`SpawnTicket`], and the loader posts an
//! [`AssetCompletion`] back some ticks later. Tickets are stamped with the
//! simulation generation so completions that outlive a restart are dropped.

use nalgebra::Vector3;
use rand::Rng;
use thiserror::Error;

use crate::sim::config::ModelConfig;
use crate::sim::spawner::PendingSpawn;

pub type Generation = u32;

const FALLBACK_CAR_COLORS: [u32; 6] = [0xFF0000, 0x00FF00, 0x0000FF, 0xFFFF00, 0xFF00FF, 0x00FFFF];

#[derive(Debug, Error, Clone, PartialEq)]
pub enum AssetError {
    #[error("request for {path} failed: {reason}")]
    Fetch { path: String, reason: String },
    #[error("{path} returned HTTP {status}")]
    Status { path: String, status: u16 },
    #[error("{path} is not a usable glTF file: {reason}")]
    Parse { path: String, reason: String },
    #[error("{0} contains no geometry")]
    EmptyMesh(String),
    #[error("model loading is disabled")]
    Disabled,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FallbackShape {
    Bus,
    Car { color: u32 },
    Pedestrian,
}

#[derive(Clone, Debug, PartialEq)]
pub enum VisualSource {
    Model { path: String },
    Fallback(FallbackShape),
}

/// What the renderer draws for an entity, plus the local bounds collision
/// uses. `size` is the full world-space extent; `base` is the height of the
/// lowest point relative to the entity's origin.
#[derive(Clone, Debug, PartialEq)]
pub struct Visual {
    pub source: VisualSource,
    pub size: Vector3<f32>,
    pub base: f32,
}

impl Visual {
    pub fn model(path: &str, size: Vector3<f32>, base: f32) -> Self {
        Visual { source: VisualSource::Model { path: path.to_string() }, size, base }
    }

    pub fn fallback(shape: FallbackShape) -> Self {
        let (size, base) = match shape {
            FallbackShape::Bus => (Vector3::new(8.0, 4.65, 14.0), -0.4),
            FallbackShape::Car { .. } => (Vector3::new(3.5, 2.6, 6.0), 0.0),
            FallbackShape::Pedestrian => (Vector3::new(0.8, 2.6, 0.8), 0.0),
        };
        Visual { source: VisualSource::Fallback(shape), size, base }
    }

    /// Primitive stand-in for the entity a ticket describes.
    pub fn fallback_for<R: Rng>(spawn: &PendingSpawn, rng: &mut R) -> Self {
        match spawn {
            PendingSpawn::Bus => Visual::fallback(FallbackShape::Bus),
            PendingSpawn::Traffic { .. } => {
                let color = FALLBACK_CAR_COLORS[rng.gen_range(0..FALLBACK_CAR_COLORS.len())];
                Visual::fallback(FallbackShape::Car { color })
            }
            PendingSpawn::Pedestrian { .. } => Visual::fallback(FallbackShape::Pedestrian),
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self.source, VisualSource::Fallback(_))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SpawnTicket {
    pub generation: Generation,
    pub spawn: PendingSpawn,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AssetRequest {
    pub ticket: SpawnTicket,
    pub model: ModelConfig,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AssetCompletion {
    pub ticket: SpawnTicket,
    pub result: Result<Visual, AssetError>,
}

pub trait AssetLoader {
    /// Starts loading `request.model`. The outcome is delivered later through
    /// `Simulation::post_completion`. An error here means nothing was started
    /// and the caller builds the fallback right away.
    fn load(&mut self, request: &AssetRequest) -> Result<(), AssetError>;
}

/// Loader that never loads, so every entity gets its fallback shape.
#[derive(Default)]
pub struct FallbackOnly;

impl AssetLoader for FallbackOnly {
    fn load(&mut self, _request: &AssetRequest) -> Result<(), AssetError> {
        Err(AssetError::Disabled)
    }
}
