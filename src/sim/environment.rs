//! Biome cycle, lighting and weather.
//!
//! The road runs through a fixed, repeating sequence of phases. Each phase
//! lasts a number of world units of travel; crossing that threshold moves the
//! cursor to the next phase and the caller tears down the old scenery.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Radians added to the sun's orbit every tick.
const DAY_NIGHT_STEP: f32 = 0.0005;
/// Per-tick change of rain intensity while fading in or out.
const RAIN_STEP: f32 = 0.01;
const FOG_NEAR: f32 = 50.0;
const FOG_FAR: f32 = 800.0;
const FOG_FAR_NIGHT: f32 = 500.0;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Biome {
    City,
    Suburban,
    Forest,
    Desert,
    Jungle,
    Rainy,
    CityNight,
}

impl Biome {
    pub fn label(&self) -> &'static str {
        match self {
            Biome::City => "City",
            Biome::Suburban => "Suburban",
            Biome::Forest => "Forest",
            Biome::Desert => "Desert",
            Biome::Jungle => "Jungle",
            Biome::Rainy => "Rainy",
            Biome::CityNight => "City Night",
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Weather {
    Sunny,
    Cloudy,
    Rainy,
    ClearNight,
}

impl Weather {
    pub fn label(&self) -> &'static str {
        match self {
            Weather::Sunny => "Sunny",
            Weather::Cloudy => "Cloudy",
            Weather::Rainy => "Rainy",
            Weather::ClearNight => "Clear Night",
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct EnvironmentPhase {
    pub biome: Biome,
    /// Travel distance this phase lasts.
    pub duration: f32,
    pub weather: Weather,
    pub sky_color: u32,
    pub fog_color: u32,
}

impl EnvironmentPhase {
    pub fn new(biome: Biome, duration: f32, weather: Weather, sky_color: u32, fog_color: u32) -> Self {
        EnvironmentPhase { biome, duration, weather, sky_color, fog_color }
    }

    pub fn is_night(&self) -> bool {
        self.biome == Biome::CityNight || self.weather == Weather::ClearNight
    }

    pub fn is_overcast(&self) -> bool {
        self.biome == Biome::Rainy || matches!(self.weather, Weather::Rainy | Weather::Cloudy)
    }

    pub fn is_raining(&self) -> bool {
        self.weather == Weather::Rainy || matches!(self.biome, Biome::Jungle | Biome::Rainy)
    }
}

/// Splits a packed `0xRRGGBB` color into linear components.
pub fn rgb(color: u32) -> (f32, f32, f32) {
    (
        ((color >> 16) & 0xFF) as f32 / 255.0,
        ((color >> 8) & 0xFF) as f32 / 255.0,
        (color & 0xFF) as f32 / 255.0,
    )
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Lighting {
    pub sun: f32,
    pub moon: f32,
    pub exposure: f32,
}

impl Lighting {
    pub fn for_phase(phase: &EnvironmentPhase) -> Self {
        if phase.is_night() {
            Lighting { sun: 0.1, moon: 0.3, exposure: 0.7 }
        } else if phase.is_overcast() {
            Lighting { sun: 0.3, moon: 0.0, exposure: 0.8 }
        } else if phase.biome == Biome::Desert {
            Lighting { sun: 1.5, moon: 0.0, exposure: 1.2 }
        } else {
            Lighting { sun: 1.0, moon: 0.0, exposure: 1.0 }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Fog {
    pub color: u32,
    pub near: f32,
    pub far: f32,
}

impl Fog {
    pub fn for_phase(phase: &EnvironmentPhase) -> Self {
        let far = if phase.biome == Biome::CityNight { FOG_FAR_NIGHT } else { FOG_FAR };
        Fog { color: phase.fog_color, near: FOG_NEAR, far }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WeatherState {
    /// Whether the current phase rains. Drops only fall while this is set;
    /// after the rain stops they hang and fade with `rain_intensity`.
    pub raining: bool,
    pub rain_intensity: f32,
    pub sandstorm: bool,
    pub cloud_opacity: f32,
    /// Film grain strength applied by the renderer.
    pub grain: f32,
    pub rgb_shift: f32,
}

impl Default for WeatherState {
    fn default() -> Self {
        WeatherState {
            raining: false,
            rain_intensity: 0.0,
            sandstorm: false,
            cloud_opacity: 0.8,
            grain: 0.05,
            rgb_shift: 0.0005,
        }
    }
}

impl WeatherState {
    pub fn update(&mut self, phase: &EnvironmentPhase) {
        self.raining = phase.is_raining();
        if self.raining {
            self.rain_intensity = (self.rain_intensity + RAIN_STEP).min(1.0);
            self.grain = 0.1 * self.rain_intensity;
            self.rgb_shift = 0.001 * self.rain_intensity;
        } else {
            self.rain_intensity = (self.rain_intensity - RAIN_STEP).max(0.0);
            self.grain = 0.05;
            self.rgb_shift = 0.0005;
        }
        self.sandstorm = phase.biome == Biome::Desert;
        self.cloud_opacity = if matches!(phase.weather, Weather::Rainy | Weather::Cloudy) {
            0.9
        } else if phase.biome == Biome::Desert {
            0.3
        } else {
            0.8
        };
    }

    pub fn rain_visible(&self) -> bool {
        self.rain_intensity > 0.0
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct EnvironmentCursor {
    pub index: usize,
    /// Distance travelled since the last transition.
    pub progress: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transition {
    pub from: usize,
    pub to: usize,
}

pub struct Environment {
    sequence: Vec<EnvironmentPhase>,
    pub cursor: EnvironmentCursor,
    pub weather: WeatherState,
    pub lighting: Lighting,
    pub fog: Fog,
    /// Sun orbit angle; keeps turning across transitions and restarts.
    pub day_night: f32,
}

impl Environment {
    /// `sequence` must be non-empty; `GameConfig::validate` enforces it.
    pub fn new(sequence: Vec<EnvironmentPhase>) -> Self {
        assert!(!sequence.is_empty(), "environment sequence must not be empty");
        let first = &sequence[0];
        let lighting = Lighting::for_phase(first);
        let fog = Fog::for_phase(first);
        Environment {
            sequence,
            cursor: EnvironmentCursor::default(),
            weather: WeatherState::default(),
            lighting,
            fog,
            day_night: 0.0,
        }
    }

    pub fn current(&self) -> &EnvironmentPhase {
        &self.sequence[self.cursor.index]
    }

    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    /// Adds this tick's travel to the cursor and moves to the next phase once
    /// the current one's duration is reached. At most one transition per call.
    pub fn advance(&mut self, travelled: f32) -> Option<Transition> {
        self.cursor.progress += travelled.abs();
        if self.cursor.progress < self.current().duration {
            return None;
        }
        let from = self.cursor.index;
        let to = (from + 1) % self.sequence.len();
        self.cursor = EnvironmentCursor { index: to, progress: 0.0 };
        Some(Transition { from, to })
    }

    /// Recomputes the ambient state for the current phase. Runs every tick.
    pub fn update_ambient(&mut self) {
        self.day_night += DAY_NIGHT_STEP;
        let phase = &self.sequence[self.cursor.index];
        self.lighting = Lighting::for_phase(phase);
        self.fog = Fog::for_phase(phase);
        self.weather.update(phase);
    }

    pub fn sun_position(&self) -> Vector3<f32> {
        let a = self.day_night;
        Vector3::new(a.cos() * 200.0, a.sin() * 100.0 + 150.0, a.sin() * 200.0)
    }

    pub fn reset(&mut self) {
        self.cursor = EnvironmentCursor::default();
        let first = &self.sequence[0];
        self.lighting = Lighting::for_phase(first);
        self.fog = Fog::for_phase(first);
    }
}
