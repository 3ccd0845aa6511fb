//! Spawn planning: where new entities appear, how fast they move and what
//! they look like. The simulation decides when; this module decides what.

use rand::Rng;

use crate::sim::config::{GameConfig, ModelConfig};
use crate::sim::entities::Side;
use crate::sim::environment::Biome;

/// Attributes of an entity whose visual is still loading.
#[derive(Clone, Debug, PartialEq)]
pub enum PendingSpawn {
    Bus,
    Traffic { lane: usize, z: f32, speed: f32, label: String },
    Pedestrian { side: Side, x: f32, z: f32, speed: f32 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpawnClass {
    Traffic,
    Pedestrian,
}

impl PendingSpawn {
    pub fn class(&self) -> Option<SpawnClass> {
        match self {
            PendingSpawn::Bus => None,
            PendingSpawn::Traffic { .. } => Some(SpawnClass::Traffic),
            PendingSpawn::Pedestrian { .. } => Some(SpawnClass::Pedestrian),
        }
    }
}

/// Picks lane, distance, speed and model for a new vehicle ahead of `player_z`.
pub fn plan_traffic<R: Rng>(rng: &mut R, config: &GameConfig, player_z: f32) -> (PendingSpawn, ModelConfig) {
    let spawn = &config.spawn;
    let lane = rng.gen_range(0..config.driving.lane_count);
    let z = player_z - spawn.traffic_ahead_min - rng.gen::<f32>() * spawn.traffic_ahead_span;
    let jitter = spawn.traffic_speed_jitter;
    let speed = spawn.traffic_speed + rng.gen::<f32>() * 2.0 * jitter - jitter;
    let vehicles = &config.models.vehicles;
    let model = vehicles[rng.gen_range(0..vehicles.len())].clone();
    let pending = PendingSpawn::Traffic { lane, z, speed, label: model.name.clone() };
    (pending, model)
}

pub fn plan_pedestrian<R: Rng>(rng: &mut R, config: &GameConfig, player_z: f32) -> (PendingSpawn, ModelConfig) {
    let spawn = &config.spawn;
    let side = if rng.gen_bool(0.5) { Side::Right } else { Side::Left };
    let x = config.driving.sidewalk_offset() * side.sign();
    let z = player_z - spawn.pedestrian_ahead_min - rng.gen::<f32>() * spawn.pedestrian_ahead_span;
    let speed = spawn.pedestrian_speed_min + rng.gen::<f32>() * spawn.pedestrian_speed_span;
    (PendingSpawn::Pedestrian { side, x, z, speed }, config.models.pedestrian.clone())
}

/// True when another entity of a class may be requested.
pub fn has_room(live: usize, in_flight: usize, cap: usize) -> bool {
    live + in_flight < cap
}

#[derive(Clone, Debug, PartialEq)]
pub struct Tree {
    pub offset_x: f32,
    pub offset_z: f32,
    pub trunk_height: f32,
    pub trunk_radius: f32,
    pub trunk_color: u32,
    pub leaf_size: f32,
    pub leaf_color: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SceneryItem {
    Building {
        width: f32,
        height: f32,
        depth: f32,
        color: u32,
        /// 8x8 grid of windows facing the road, one bit per window.
        windows: u64,
        lit: bool,
    },
    TreeCluster { trees: Vec<Tree> },
    Cactus { height: f32, arm: bool },
    Rock { size: f32 },
    Block { size: f32 },
}

/// Builds a roadside item suited to `biome`.
pub fn scenery_item<R: Rng>(biome: Biome, rng: &mut R) -> SceneryItem {
    match biome {
        Biome::City | Biome::Suburban | Biome::CityNight => building(biome, rng),
        Biome::Forest | Biome::Jungle => tree_cluster(biome == Biome::Jungle, rng),
        Biome::Desert => desert_item(rng),
        Biome::Rainy => SceneryItem::Block { size: 10.0 + rng.gen::<f32>() * 20.0 },
    }
}

fn building<R: Rng>(biome: Biome, rng: &mut R) -> SceneryItem {
    let height = if biome == Biome::City {
        rng.gen::<f32>() * 40.0 + 30.0
    } else {
        rng.gen::<f32>() * 25.0 + 15.0
    };
    let width = rng.gen::<f32>() * 20.0 + 10.0;
    let depth = rng.gen::<f32>() * 20.0 + 10.0;
    let lit = biome == Biome::CityNight;
    let color = if lit {
        0x222222
    } else {
        let grey = rng.gen_range(0x22..=0x55u32);
        grey << 16 | grey << 8 | grey
    };
    let mut windows = 0u64;
    for bit in 0..64 {
        if rng.gen::<f32>() > 0.4 {
            windows |= 1u64 << bit;
        }
    }
    SceneryItem::Building { width, height, depth, color, windows, lit }
}

fn tree_cluster<R: Rng>(jungle: bool, rng: &mut R) -> SceneryItem {
    let count = if jungle { 3 } else { 1 };
    let trees = (0..count)
        .map(|t| {
            let trunk_height = if jungle {
                10.0 + rng.gen::<f32>() * 8.0
            } else {
                8.0 + rng.gen::<f32>() * 6.0
            };
            Tree {
                offset_x: (t as f32 - 1.0) * 5.0,
                offset_z: rng.gen::<f32>() * 10.0,
                trunk_height,
                trunk_radius: if jungle { 0.8 } else { 0.5 },
                trunk_color: if jungle { 0x654321 } else { 0x8B4513 },
                leaf_size: if jungle { 8.0 } else { 6.0 },
                leaf_color: if jungle { 0x228B22 } else { 0x32CD32 },
            }
        })
        .collect();
    SceneryItem::TreeCluster { trees }
}

fn desert_item<R: Rng>(rng: &mut R) -> SceneryItem {
    if rng.gen::<f32>() > 0.7 {
        SceneryItem::Cactus {
            height: 4.0 + rng.gen::<f32>() * 6.0,
            arm: rng.gen_bool(0.5),
        }
    } else {
        SceneryItem::Rock { size: 2.0 + rng.gen::<f32>() * 4.0 }
    }
}
