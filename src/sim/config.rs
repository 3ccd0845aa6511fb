use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sim::environment::{Biome, EnvironmentPhase, Weather};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("environment sequence is empty")]
    EmptySequence,
    #[error("phase {index} ({biome:?}) has non-positive duration {duration}")]
    BadDuration {
        index: usize,
        biome: Biome,
        duration: f32,
    },
    #[error("vehicle catalog is empty")]
    EmptyCatalog,
    #[error("{0} must be positive")]
    NonPositive(&'static str),
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct ModelConfig {
    pub path: String,
    pub scale: f32,
    pub name: String,
    pub position_offset_y: f32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        ModelConfig {
            path: String::new(),
            scale: 1.0,
            name: String::from("Car"),
            position_offset_y: 0.0,
        }
    }
}

impl ModelConfig {
    fn new(path: &str, scale: f32, name: &str) -> Self {
        ModelConfig {
            path: path.to_string(),
            scale,
            name: name.to_string(),
            position_offset_y: 0.0,
        }
    }
}

/// Models requested from the asset loader. `use_fallback` skips loading
/// entirely and builds primitive shapes for everything.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct ModelCatalog {
    pub bus: ModelConfig,
    pub vehicles: Vec<ModelConfig>,
    pub pedestrian: ModelConfig,
    pub use_fallback: bool,
}

impl Default for ModelCatalog {
    fn default() -> Self {
        ModelCatalog {
            bus: ModelConfig::new("/assets/models/bus.glb", 2.5, "Bus"),
            vehicles: vec![
                ModelConfig::new("/assets/models/car1.glb", 1.0, "Car 1"),
                ModelConfig::new("/assets/models/car2.glb", 1.0, "Car 2"),
                ModelConfig::new("/assets/models/car3.glb", 1.0, "Car 3"),
                ModelConfig::new("/assets/models/car4.glb", 1.0, "Car 4"),
                ModelConfig::new("/assets/models/car5.glb", 1.0, "Car 5"),
                ModelConfig::new("/assets/models/truck.glb", 2.0, "Truck"),
                ModelConfig::new("/assets/models/microbus.glb", 1.0, "Microbus"),
            ],
            pedestrian: ModelConfig::new("/assets/models/person.glb", 0.8, "Pedestrian"),
            use_fallback: false,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct DrivingConfig {
    pub max_speed: f32,
    pub acceleration: f32,
    pub deceleration: f32,
    pub brake_power: f32,
    pub steering_speed: f32,
    pub max_steering: f32,
    pub lane_width: f32,
    pub lane_count: usize,
    pub start_lane: usize,
    /// World units travelled per unit of speed per second.
    pub distance_scale: f32,
    /// Lateral offset produced by full steering lock.
    pub steering_reach: f32,
    /// Fraction of the remaining lateral gap closed each tick.
    pub lateral_smoothing: f32,
    /// Longest tick the simulation will integrate, in seconds.
    pub max_tick: f32,
}

impl Default for DrivingConfig {
    fn default() -> Self {
        DrivingConfig {
            max_speed: 120.0,
            acceleration: 0.6,
            deceleration: 0.9,
            brake_power: 1.8,
            steering_speed: 0.06,
            max_steering: 0.6,
            lane_width: 4.0,
            lane_count: 4,
            start_lane: 2,
            distance_scale: 12.0,
            steering_reach: 12.0,
            lateral_smoothing: 0.1,
            max_tick: 0.1,
        }
    }
}

impl DrivingConfig {
    /// Center of lane `lane`, lanes spread symmetrically around the road axis.
    pub fn lane_center(&self, lane: usize) -> f32 {
        let half = (self.lane_count as f32 - 1.0) / 2.0;
        (lane as f32 - half) * self.lane_width
    }

    pub fn sidewalk_offset(&self) -> f32 {
        self.lane_width * 2.5 + 3.0
    }

    pub fn min_speed(&self) -> f32 {
        -self.max_speed / 3.0
    }
}

/// Placement ranges for spawned entities. Distances are measured ahead of
/// (or behind) the bus along the travel axis.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct SpawnConfig {
    pub traffic_speed: f32,
    pub traffic_speed_jitter: f32,
    pub traffic_ahead_min: f32,
    pub traffic_ahead_span: f32,
    pub pedestrian_speed_min: f32,
    pub pedestrian_speed_span: f32,
    pub pedestrian_ahead_min: f32,
    pub pedestrian_ahead_span: f32,
    /// Traffic and pedestrians further behind the bus than this are removed.
    pub despawn_behind: f32,
    /// Seconds between a despawn and its replacement spawn.
    pub replacement_delay: f64,
    pub scenery_lateral_min: f32,
    pub scenery_lateral_span: f32,
    pub scenery_ahead_min: f32,
    pub scenery_ahead_span: f32,
    pub scenery_despawn_behind: f32,
}

impl Default for SpawnConfig {
    fn default() -> Self {
        SpawnConfig {
            traffic_speed: 35.0,
            traffic_speed_jitter: 10.0,
            traffic_ahead_min: 150.0,
            traffic_ahead_span: 300.0,
            pedestrian_speed_min: 2.0,
            pedestrian_speed_span: 3.0,
            pedestrian_ahead_min: 80.0,
            pedestrian_ahead_span: 400.0,
            despawn_behind: 150.0,
            replacement_delay: 0.1,
            scenery_lateral_min: 40.0,
            scenery_lateral_span: 80.0,
            scenery_ahead_min: 300.0,
            scenery_ahead_span: 200.0,
            scenery_despawn_behind: 300.0,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct PopulationConfig {
    pub max_traffic: usize,
    pub max_pedestrians: usize,
    pub max_scenery: usize,
    pub initial_traffic: usize,
    pub traffic_stagger: f64,
    pub initial_pedestrians: usize,
    pub pedestrian_stagger: f64,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        PopulationConfig {
            max_traffic: 15,
            max_pedestrians: 12,
            max_scenery: 20,
            initial_traffic: 12,
            traffic_stagger: 0.4,
            initial_pedestrians: 10,
            pedestrian_stagger: 0.6,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct GameConfig {
    pub driving: DrivingConfig,
    pub spawn: SpawnConfig,
    pub population: PopulationConfig,
    pub models: ModelCatalog,
    pub environment: Vec<EnvironmentPhase>,
}

impl Default for GameConfig {
    fn default() -> Self {
        GameConfig {
            driving: DrivingConfig::default(),
            spawn: SpawnConfig::default(),
            population: PopulationConfig::default(),
            models: ModelCatalog::default(),
            environment: default_sequence(),
        }
    }
}

impl GameConfig {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: GameConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.environment.is_empty() {
            return Err(ConfigError::EmptySequence);
        }
        for (index, phase) in self.environment.iter().enumerate() {
            if !(phase.duration > 0.0) {
                return Err(ConfigError::BadDuration {
                    index,
                    biome: phase.biome,
                    duration: phase.duration,
                });
            }
        }
        if self.models.vehicles.is_empty() {
            return Err(ConfigError::EmptyCatalog);
        }
        if self.driving.lane_count == 0 {
            return Err(ConfigError::NonPositive("driving.lane_count"));
        }
        if !(self.driving.max_speed > 0.0) {
            return Err(ConfigError::NonPositive("driving.max_speed"));
        }
        if !(self.driving.max_tick > 0.0) {
            return Err(ConfigError::NonPositive("driving.max_tick"));
        }
        Ok(())
    }
}

fn default_sequence() -> Vec<EnvironmentPhase> {
    use Biome::*;
    use Weather::*;
    vec![
        EnvironmentPhase::new(City, 3000.0, Sunny, 0x87CEEB, 0x87CEEB),
        EnvironmentPhase::new(Suburban, 2000.0, Sunny, 0x87CEEB, 0x87CEEB),
        EnvironmentPhase::new(Forest, 2500.0, Cloudy, 0x7EC0EE, 0x8FBC8F),
        EnvironmentPhase::new(City, 3000.0, Sunny, 0x87CEEB, 0x87CEEB),
        EnvironmentPhase::new(Desert, 3000.0, Sunny, 0xF4A460, 0xD2B48C),
        EnvironmentPhase::new(Jungle, 2800.0, Weather::Rainy, 0x4682B4, 0x228B22),
        EnvironmentPhase::new(Biome::Rainy, 2000.0, Weather::Rainy, 0x36454F, 0x2F4F4F),
        EnvironmentPhase::new(CityNight, 2500.0, ClearNight, 0x191970, 0x000033),
    ]
}
