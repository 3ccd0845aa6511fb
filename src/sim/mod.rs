//! The driving simulation, independent of the browser.
//!
//! [`Simulation::tick`] is the frame driver. Each call runs, in order:
//! pending asset completions, due scheduled spawns, bus kinematics,
//! traffic and pedestrian motion, the environment cycle, and the collision
//! check. Nothing in here blocks or touches the DOM.

pub mod assets;
pub mod collision;
pub mod config;
pub mod entities;
pub mod environment;
pub mod input;
pub mod particles;
pub mod player;
pub mod schedule;
pub mod spawner;

use log::{debug, info, warn};
use rand::rngs::SmallRng;
use rand::Rng;

use crate::sim::assets::{AssetCompletion, AssetLoader, AssetRequest, Generation, SpawnTicket, Visual};
use crate::sim::collision::first_hit;
use crate::sim::config::{ConfigError, GameConfig, ModelConfig};
use crate::sim::entities::{PedestrianEntity, Registry, SceneryEntity, TrafficEntity};
use crate::sim::environment::{Biome, Environment, Weather};
use crate::sim::input::ControlIntent;
use crate::sim::particles::WeatherParticles;
use crate::sim::player::PlayerState;
use crate::sim::schedule::{Schedule, ScheduledSpawn};
use crate::sim::spawner::{has_room, plan_pedestrian, plan_traffic, scenery_item, PendingSpawn, SpawnClass};

/// Entities the loading bar waits for before it is hidden.
const EXPECTED_LOADS: usize = 20;
/// Label used when a vehicle had to fall back to the primitive car.
const FALLBACK_VEHICLE_LABEL: &str = "Car";

#[derive(Clone, Debug, PartialEq)]
pub enum SimEvent {
    EnvironmentChanged { biome: Biome, weather: Weather },
    Crashed { cause: String, score: u32 },
    Restarted,
}

/// Values shown on the heads-up display.
#[derive(Clone, Debug, PartialEq)]
pub struct Hud {
    pub speed: u32,
    pub distance: u32,
    pub score: u32,
    pub biome: &'static str,
    pub weather: &'static str,
    pub game_over: bool,
}

pub struct Simulation {
    config: GameConfig,
    rng: SmallRng,
    loader: Box<dyn AssetLoader>,
    pub player: PlayerState,
    pub registry: Registry,
    pub environment: Environment,
    pub particles: WeatherParticles,
    schedule: Schedule,
    completions: Vec<AssetCompletion>,
    generation: Generation,
    clock: f64,
    in_flight_traffic: usize,
    in_flight_pedestrians: usize,
    game_over: bool,
    crash_cause: Option<String>,
    events: Vec<SimEvent>,
    loaded: usize,
}

impl Simulation {
    /// Validates `config` before building anything, so an empty environment
    /// sequence or vehicle catalog is reported instead of panicking later.
    pub fn new(config: GameConfig, mut rng: SmallRng, loader: Box<dyn AssetLoader>) -> Result<Self, ConfigError> {
        config.validate()?;
        let environment = Environment::new(config.environment.clone());
        let particles = WeatherParticles::new(&mut rng);
        let player = PlayerState::new(&config.driving);
        let mut sim = Simulation {
            config,
            rng,
            loader,
            player,
            registry: Registry::new(),
            environment,
            particles,
            schedule: Schedule::new(),
            completions: Vec::new(),
            generation: 0,
            clock: 0.0,
            in_flight_traffic: 0,
            in_flight_pedestrians: 0,
            game_over: false,
            crash_cause: None,
            events: Vec::new(),
            loaded: 0,
        };
        sim.seed_scenery();
        sim.start_round();
        Ok(sim)
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn clock(&self) -> f64 {
        self.clock
    }

    pub fn is_game_over(&self) -> bool {
        self.game_over
    }

    pub fn crash_cause(&self) -> Option<&str> {
        self.crash_cause.as_deref()
    }

    pub fn scheduled_spawns(&self) -> usize {
        self.schedule.len()
    }

    /// Traffic and pedestrian loads started but not yet completed.
    pub fn in_flight(&self) -> (usize, usize) {
        (self.in_flight_traffic, self.in_flight_pedestrians)
    }

    pub fn loading_progress(&self) -> f32 {
        (self.loaded as f32 / EXPECTED_LOADS as f32).min(1.0)
    }

    /// Queues a finished load. It is applied at the start of the next tick.
    pub fn post_completion(&mut self, completion: AssetCompletion) {
        self.completions.push(completion);
    }

    pub fn drain_events(&mut self) -> Vec<SimEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn hud(&self) -> Hud {
        let phase = self.environment.current();
        Hud {
            speed: self.player.speed.round().abs() as u32,
            distance: self.player.distance.round() as u32,
            score: self.player.score,
            biome: phase.biome.label(),
            weather: phase.weather.label(),
            game_over: self.game_over,
        }
    }

    pub fn tick(&mut self, dt: f32, intent: &ControlIntent) {
        if self.game_over {
            return;
        }
        let dt = dt.clamp(0.0, self.config.driving.max_tick);
        self.clock += dt as f64;

        self.apply_completions();
        for spawn in self.schedule.drain_due(self.clock) {
            match spawn {
                ScheduledSpawn::Traffic => self.spawn_traffic(),
                ScheduledSpawn::Pedestrian => self.spawn_pedestrian(),
            }
        }

        let forward = self.player.advance(dt, intent, &self.config.driving);
        self.update_movers(dt);
        self.update_environment(dt, forward);
        self.check_collisions();
    }

    pub fn restart(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        self.game_over = false;
        self.crash_cause = None;
        self.player.reset(&self.config.driving);
        self.registry.clear();
        self.schedule.clear();
        self.completions.clear();
        self.in_flight_traffic = 0;
        self.in_flight_pedestrians = 0;
        self.environment.reset();
        self.events.push(SimEvent::Restarted);
        info!("restarted, generation {}", self.generation);
        self.start_round();
    }

    /// Requests the bus if needed and staggers the opening traffic and
    /// pedestrians over the first few seconds.
    fn start_round(&mut self) {
        if self.player.visual.is_none() {
            let model = self.config.models.bus.clone();
            self.request(PendingSpawn::Bus, model);
        }
        let population = &self.config.population;
        for i in 0..population.initial_traffic {
            self.schedule.push(self.clock + i as f64 * population.traffic_stagger, ScheduledSpawn::Traffic);
        }
        for i in 0..population.initial_pedestrians {
            self.schedule.push(self.clock + i as f64 * population.pedestrian_stagger, ScheduledSpawn::Pedestrian);
        }
    }

    fn seed_scenery(&mut self) {
        for z in (-200i32..200).step_by(50) {
            if z.abs() > 100 {
                self.place_scenery(z as f32 * 3.0, z as f32);
            }
        }
    }

    pub fn spawn_traffic(&mut self) {
        let cap = self.config.population.max_traffic;
        if !has_room(self.registry.traffic.len(), self.in_flight_traffic, cap) {
            return;
        }
        let (pending, model) = plan_traffic(&mut self.rng, &self.config, self.player.position.z);
        self.request(pending, model);
    }

    pub fn spawn_pedestrian(&mut self) {
        let cap = self.config.population.max_pedestrians;
        if !has_room(self.registry.pedestrians.len(), self.in_flight_pedestrians, cap) {
            return;
        }
        let (pending, model) = plan_pedestrian(&mut self.rng, &self.config, self.player.position.z);
        self.request(pending, model);
    }

    /// Places one roadside item ahead of the bus on the `lateral_sign` side,
    /// `lateral_magnitude` units from the road axis.
    pub fn spawn_scenery(&mut self, lateral_sign: f32, lateral_magnitude: f32) {
        let spawn = &self.config.spawn;
        let ahead = spawn.scenery_ahead_min + self.rng.gen::<f32>() * spawn.scenery_ahead_span;
        let z = self.player.position.z - ahead;
        self.place_scenery(lateral_sign.signum() * lateral_magnitude, z);
    }

    fn place_scenery(&mut self, x: f32, z: f32) {
        if self.registry.scenery.len() >= self.config.population.max_scenery {
            return;
        }
        let item = scenery_item(self.environment.current().biome, &mut self.rng);
        let id = self.registry.next_id();
        self.registry.scenery.push(SceneryEntity { id, item, x, z });
    }

    fn request(&mut self, spawn: PendingSpawn, model: ModelConfig) {
        let ticket = SpawnTicket { generation: self.generation, spawn };
        if self.config.models.use_fallback {
            let visual = Visual::fallback_for(&ticket.spawn, &mut self.rng);
            self.register(ticket.spawn, visual);
            return;
        }
        let request = AssetRequest { ticket, model };
        match self.loader.load(&request) {
            Ok(()) => self.track_in_flight(&request.ticket.spawn, true),
            Err(err) => {
                warn!("{}; using fallback shape", err);
                let visual = Visual::fallback_for(&request.ticket.spawn, &mut self.rng);
                self.register(request.ticket.spawn, visual);
            }
        }
    }

    fn track_in_flight(&mut self, spawn: &PendingSpawn, started: bool) {
        let counter = match spawn.class() {
            Some(SpawnClass::Traffic) => &mut self.in_flight_traffic,
            Some(SpawnClass::Pedestrian) => &mut self.in_flight_pedestrians,
            None => return,
        };
        if started {
            *counter += 1;
        } else {
            *counter = counter.saturating_sub(1);
        }
    }

    fn apply_completions(&mut self) {
        for completion in std::mem::take(&mut self.completions) {
            let AssetCompletion { ticket, result } = completion;
            if ticket.generation != self.generation {
                debug!("dropping load from generation {}", ticket.generation);
                continue;
            }
            self.track_in_flight(&ticket.spawn, false);
            let visual = match result {
                Ok(visual) => visual,
                Err(err) => {
                    warn!("{}; using fallback shape", err);
                    Visual::fallback_for(&ticket.spawn, &mut self.rng)
                }
            };
            self.register(ticket.spawn, visual);
        }
    }

    fn register(&mut self, spawn: PendingSpawn, visual: Visual) {
        let population = &self.config.population;
        match spawn {
            PendingSpawn::Bus => {
                self.player.visual = Some(visual);
            }
            PendingSpawn::Traffic { lane, z, speed, label } => {
                if self.registry.traffic.len() >= population.max_traffic {
                    debug!("traffic full, dropping {}", label);
                    return;
                }
                let label = if visual.is_fallback() { FALLBACK_VEHICLE_LABEL.to_string() } else { label };
                let x = self.config.driving.lane_center(lane);
                let id = self.registry.next_id();
                debug!("traffic {:?} ({}) in lane {} at z={:.0}", id, label, lane, z);
                self.registry.traffic.push(TrafficEntity { id, visual, lane, x, z, speed, label });
            }
            PendingSpawn::Pedestrian { side, x, z, speed } => {
                if self.registry.pedestrians.len() >= population.max_pedestrians {
                    debug!("pedestrians full, dropping spawn");
                    return;
                }
                let id = self.registry.next_id();
                self.registry.pedestrians.push(PedestrianEntity { id, visual, side, x, z, speed });
            }
        }
        self.loaded += 1;
    }

    fn update_movers(&mut self, dt: f32) {
        let (traffic_gone, pedestrians_gone) = self.registry.advance_movers(
            dt,
            self.config.driving.distance_scale,
            self.player.position.z,
            self.config.spawn.despawn_behind,
        );
        let due = self.clock + self.config.spawn.replacement_delay;
        for _ in 0..traffic_gone {
            self.schedule.push(due, ScheduledSpawn::Traffic);
        }
        for _ in 0..pedestrians_gone {
            self.schedule.push(due, ScheduledSpawn::Pedestrian);
        }
        if traffic_gone + pedestrians_gone > 0 {
            debug!("despawned {} vehicles, {} pedestrians", traffic_gone, pedestrians_gone);
        }
    }

    fn update_environment(&mut self, dt: f32, forward: f32) {
        if let Some(transition) = self.environment.advance(forward) {
            self.registry.scenery.clear();
            let phase = self.environment.current();
            info!(
                "entering {} ({}), phase {} -> {}",
                phase.biome.label(),
                phase.weather.label(),
                transition.from,
                transition.to
            );
            self.events.push(SimEvent::EnvironmentChanged { biome: phase.biome, weather: phase.weather });
        }
        self.environment.update_ambient();

        if self.registry.scenery.len() < self.config.population.max_scenery {
            let sign = if self.rng.gen_bool(0.5) { 1.0 } else { -1.0 };
            let spawn = &self.config.spawn;
            let magnitude = spawn.scenery_lateral_min + self.rng.gen::<f32>() * spawn.scenery_lateral_span;
            self.spawn_scenery(sign, magnitude);
        }
        self.registry
            .prune_scenery(self.player.position.z, self.config.spawn.scenery_despawn_behind);

        self.particles.update(&self.environment.weather, dt, self.clock, &mut self.rng);
    }

    fn check_collisions(&mut self) {
        let Some(bus) = self.player.bounds() else {
            return;
        };
        let boxes = self.registry.traffic.iter().map(TrafficEntity::bounds);
        if let Some(index) = first_hit(&bus, boxes) {
            let cause = self.registry.traffic[index].label.clone();
            let score = self.player.score;
            info!("crashed into {} with score {}", cause, score);
            self.game_over = true;
            self.crash_cause = Some(cause.clone());
            self.events.push(SimEvent::Crashed { cause, score });
        }
    }
}
