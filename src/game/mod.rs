pub mod loader;

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use log::warn;
use nalgebra::{Matrix4, Perspective3, Vector3};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use web_sys::Window;

use crate::engine::renderer::{GpuMesh, Renderer};
use crate::game::loader::{BrowserLoader, Inbox, MeshCache};
use crate::sim::assets::{FallbackShape, Visual, VisualSource};
use crate::sim::config::{ConfigError, GameConfig, ModelConfig};
use crate::sim::environment::Biome;
use crate::sim::input::InputAggregator;
use crate::sim::spawner::SceneryItem;
use crate::sim::{SimEvent, Simulation};

const FIELD_OF_VIEW: f32 = 75.0 * std::f32::consts::PI / 180.0;
/// How far ahead and behind the bus road markings are drawn.
const MARKINGS_AHEAD: f32 = 800.0;
const MARKINGS_BEHIND: f32 = 100.0;
const MARKING_SPACING: f32 = 20.0;

const ROAD_COLOR: u32 = 0x333333;
const SIDEWALK_COLOR: u32 = 0x666666;
const CENTER_LINE_COLOR: u32 = 0xFFFF00;
const LANE_LINE_COLOR: u32 = 0xFFFFFF;
const BUS_COLOR: u32 = 0x3498DB;
const GLASS_COLOR: u32 = 0x87CEEB;
const WHEEL_COLOR: u32 = 0x111111;

fn ground_color(biome: Biome) -> u32 {
    match biome {
        Biome::City => 0x555555,
        Biome::Suburban => 0x4C8C3A,
        Biome::Forest => 0x2E6B2E,
        Biome::Desert => 0xE0C080,
        Biome::Jungle => 0x1E5B1E,
        Biome::Rainy => 0x3A4A3A,
        Biome::CityNight => 0x222222,
    }
}

pub struct Game {
    renderer: Renderer,
    pub sim: Simulation,
    pub input: InputAggregator,
    inbox: Inbox,
    meshes: MeshCache,
    gpu_meshes: HashMap<String, GpuMesh>,
    /// Scale and lift of each catalog model, by path.
    models: HashMap<String, ModelConfig>,
    time: f32,
}

impl Game {
    pub fn new(renderer: Renderer, config: GameConfig, window: Window) -> Result<Self, ConfigError> {
        let inbox: Inbox = Rc::new(RefCell::new(Vec::new()));
        let meshes: MeshCache = Rc::new(RefCell::new(HashMap::new()));

        let catalog = &config.models;
        let models = std::iter::once(&catalog.bus)
            .chain(catalog.vehicles.iter())
            .chain(std::iter::once(&catalog.pedestrian))
            .map(|model| (model.path.clone(), model.clone()))
            .collect();

        let loader = BrowserLoader::new(window, inbox.clone(), meshes.clone());
        let sim = Simulation::new(config, SmallRng::from_entropy(), Box::new(loader))?;

        Ok(Game {
            renderer,
            sim,
            input: InputAggregator::new(),
            inbox,
            meshes,
            gpu_meshes: HashMap::new(),
            models,
            time: 0.0,
        })
    }

    /// Hands finished loads to the simulation and advances it by `dt`
    /// seconds. Returns what happened during the tick.
    pub fn update(&mut self, dt: f32) -> Vec<SimEvent> {
        self.time += dt;
        let finished: Vec<_> = self.inbox.borrow_mut().drain(..).collect();
        for completion in finished {
            self.sim.post_completion(completion);
        }
        let intent = self.input.intent();
        self.sim.tick(dt, &intent);
        self.sim.drain_events()
    }

    pub fn restart(&mut self) {
        self.input.release_all();
        self.sim.restart();
    }

    fn upload_new_meshes(&mut self) {
        for (path, mesh) in self.meshes.borrow().iter() {
            if self.gpu_meshes.contains_key(path) {
                continue;
            }
            match self.renderer.upload_mesh(mesh) {
                Ok(gpu) => {
                    self.gpu_meshes.insert(path.clone(), gpu);
                }
                Err(err) => warn!("could not upload {}: {:?}", path, err),
            }
        }
    }

    pub fn render(&mut self) {
        self.upload_new_meshes();

        let environment = &self.sim.environment;
        let phase = environment.current();
        let lighting = environment.lighting;
        let weather = environment.weather;

        self.renderer.clear(phase.sky_color);
        let light = lighting.exposure * (0.35 + 0.65 * lighting.sun.min(1.0)) + lighting.moon * 0.5;
        self.renderer.set_tint(light, light, light + lighting.moon * 0.4);
        self.renderer.set_fog(&environment.fog);
        self.renderer.set_film(weather.grain, weather.rgb_shift, self.time);
        self.renderer.set_alpha(1.0);
        self.renderer.enable_depth_test();
        self.renderer.enable_blend();

        let Some(canvas) = self.renderer.canvas() else {
            return;
        };
        let (width, height) = (canvas.width(), canvas.height());
        self.renderer.resize(width as i32, height as i32);
        let aspect = width as f32 / height.max(1) as f32;
        let projection = Perspective3::new(aspect, FIELD_OF_VIEW, 0.1, 2000.0).to_homogeneous();

        let bus = self.sim.player.position;
        let eye = Vector3::new(bus.x * 0.5, 15.0 + 0.5 * self.time.sin(), bus.z + 25.0);
        let up = Vector3::new(0.0, 1.0, 0.0);
        let view = Matrix4::look_at_rh(&eye.into(), &bus.into(), &up);
        self.renderer.set_camera(&projection, &view);

        self.draw_road(phase.biome, bus.z);
        self.draw_scenery();
        self.draw_movers();
        self.draw_bus();
        self.draw_sky(bus);
        self.draw_weather(bus);
    }

    fn draw_road(&self, biome: Biome, bus_z: f32) {
        let driving = &self.sim.config().driving;
        let road_width = driving.lane_width * driving.lane_count as f32 + 4.0;
        let center_z = bus_z - (MARKINGS_AHEAD - MARKINGS_BEHIND) / 2.0;
        let length = MARKINGS_AHEAD + MARKINGS_BEHIND + 400.0;

        self.renderer.draw_cube(Vector3::new(0.0, -0.4, center_z), Vector3::new(2000.0, 0.2, length), ground_color(biome));
        self.renderer.draw_cube(Vector3::new(0.0, -0.15, center_z), Vector3::new(road_width, 0.1, length), ROAD_COLOR);
        let sidewalk = driving.sidewalk_offset();
        for sign in [-1.0, 1.0] {
            self.renderer.draw_cube(
                Vector3::new(sign * sidewalk, -0.05, center_z),
                Vector3::new(6.0, 0.1, length),
                SIDEWALK_COLOR,
            );
        }

        // Markings sit on a fixed world grid so they scroll past the bus.
        let first = ((bus_z - MARKINGS_AHEAD) / MARKING_SPACING).floor() as i32;
        let last = ((bus_z + MARKINGS_BEHIND) / MARKING_SPACING).ceil() as i32;
        for step in first..=last {
            let z = step as f32 * MARKING_SPACING;
            for lane in 0..driving.lane_count.saturating_sub(1) {
                let x = driving.lane_center(lane) + driving.lane_width / 2.0;
                if x.abs() < 0.01 {
                    self.renderer.draw_cube(Vector3::new(x, -0.09, z), Vector3::new(0.2, 0.02, 4.0), CENTER_LINE_COLOR);
                } else {
                    self.renderer.draw_cube(Vector3::new(x, -0.09, z + 10.0), Vector3::new(0.1, 0.02, 2.0), LANE_LINE_COLOR);
                }
            }
        }
    }

    fn draw_scenery(&self) {
        for entity in &self.sim.registry.scenery {
            let (x, z) = (entity.x, entity.z);
            match &entity.item {
                SceneryItem::Building { width, height, depth, color, windows, lit } => {
                    self.renderer.draw_cube(
                        Vector3::new(x, height / 2.0, z),
                        Vector3::new(*width, *height, *depth),
                        *color,
                    );
                    // Windows on the face toward the road
                    let face_x = x - x.signum() * (width / 2.0 + 0.1);
                    let window_color = if *lit { 0xFFFF99 } else { GLASS_COLOR };
                    for bit in 0..64 {
                        if windows & (1u64 << bit) == 0 {
                            continue;
                        }
                        let (row, col) = ((bit / 8) as f32, (bit % 8) as f32);
                        let center = Vector3::new(
                            face_x,
                            (row + 0.5) * height / 8.0,
                            z - depth / 2.0 + (col + 0.5) * depth / 8.0,
                        );
                        self.renderer.draw_cube(center, Vector3::new(0.2, height / 16.0, depth / 16.0), window_color);
                    }
                }
                SceneryItem::TreeCluster { trees } => {
                    for tree in trees {
                        let (tx, tz) = (x + tree.offset_x, z + tree.offset_z);
                        let trunk = tree.trunk_radius * 2.0;
                        self.renderer.draw_cube(
                            Vector3::new(tx, tree.trunk_height / 2.0, tz),
                            Vector3::new(trunk, tree.trunk_height, trunk),
                            tree.trunk_color,
                        );
                        self.renderer.draw_cube(
                            Vector3::new(tx, tree.trunk_height + tree.leaf_size * 0.4, tz),
                            Vector3::repeat(tree.leaf_size),
                            tree.leaf_color,
                        );
                    }
                }
                SceneryItem::Cactus { height, arm } => {
                    self.renderer.draw_cube(Vector3::new(x, height / 2.0, z), Vector3::new(1.0, *height, 1.0), 0x2E8B57);
                    if *arm {
                        let y = height * 0.6;
                        self.renderer.draw_cube(Vector3::new(x + 1.0, y, z), Vector3::new(2.0, 0.6, 0.6), 0x2E8B57);
                        self.renderer.draw_cube(Vector3::new(x + 1.7, y + 0.75, z), Vector3::new(0.6, 1.5, 0.6), 0x2E8B57);
                    }
                }
                SceneryItem::Rock { size } => {
                    self.renderer.draw_cube(Vector3::new(x, size * 0.3, z), Vector3::new(*size, size * 0.6, *size), 0x8B7D6B);
                }
                SceneryItem::Block { size } => {
                    self.renderer.draw_cube(Vector3::new(x, size / 2.0, z), Vector3::repeat(*size), 0x5A5A6A);
                }
            }
        }
    }

    fn draw_movers(&self) {
        for vehicle in &self.sim.registry.traffic {
            self.draw_visual(&vehicle.visual, vehicle.position());
        }
        for pedestrian in &self.sim.registry.pedestrians {
            self.draw_visual(&pedestrian.visual, Vector3::new(pedestrian.x, 0.0, pedestrian.z));
        }
    }

    fn draw_bus(&self) {
        if let Some(visual) = &self.sim.player.visual {
            self.draw_visual(visual, self.sim.player.position);
        }
    }

    fn draw_visual(&self, visual: &Visual, origin: Vector3<f32>) {
        match &visual.source {
            VisualSource::Model { path } => {
                let mesh = self.gpu_meshes.get(path);
                let model = self.models.get(path);
                match (mesh, model) {
                    (Some(mesh), Some(model)) => {
                        let position = origin + Vector3::new(0.0, model.position_offset_y, 0.0);
                        self.renderer.draw_mesh(mesh, position, model.scale, 0.0);
                    }
                    _ => {
                        let center = origin + Vector3::new(0.0, visual.base + visual.size.y / 2.0, 0.0);
                        self.renderer.draw_cube(center, visual.size, 0x888888);
                    }
                }
            }
            VisualSource::Fallback(shape) => self.draw_fallback(*shape, origin),
        }
    }

    fn draw_fallback(&self, shape: FallbackShape, o: Vector3<f32>) {
        let at = |x: f32, y: f32, z: f32| o + Vector3::new(x, y, z);
        match shape {
            FallbackShape::Bus => {
                self.renderer.draw_cube(at(0.0, 2.0, 0.0), Vector3::new(8.0, 4.0, 14.0), BUS_COLOR);
                self.renderer.draw_cube(at(0.0, 3.5, 0.0), Vector3::new(7.2, 1.5, 12.2), GLASS_COLOR);
                for (x, z) in [(-2.5, 5.0), (2.5, 5.0), (-2.5, -5.0), (2.5, -5.0)] {
                    self.renderer.draw_cube(at(x, 0.6, z), Vector3::new(0.6, 2.0, 2.0), WHEEL_COLOR);
                }
            }
            FallbackShape::Car { color } => {
                self.renderer.draw_cube(at(0.0, 0.9, 0.0), Vector3::new(3.5, 1.8, 6.0), color);
                self.renderer.draw_cube(at(0.0, 2.0, -0.5), Vector3::new(3.0, 1.2, 3.5), color);
                self.renderer.draw_cube(at(0.0, 2.0, 0.5), Vector3::new(2.6, 0.7, 2.6), GLASS_COLOR);
                for (x, z) in [(-1.2, 2.0), (1.2, 2.0), (-1.2, -2.0), (1.2, -2.0)] {
                    self.renderer.draw_cube(at(x, 0.5, z), Vector3::new(0.4, 1.0, 1.0), WHEEL_COLOR);
                }
            }
            FallbackShape::Pedestrian => {
                self.renderer.draw_cube(at(0.0, 1.0, 0.0), Vector3::new(0.8, 2.0, 0.5), 0x8B4513);
                self.renderer.draw_cube(at(0.0, 2.2, 0.0), Vector3::repeat(0.8), 0xFFCC99);
            }
        }
    }

    fn draw_sky(&self, bus: Vector3<f32>) {
        let environment = &self.sim.environment;
        let sun = bus + environment.sun_position();
        let color = if environment.lighting.sun > 0.2 { 0xFFF5B0 } else { 0xDDDDFF };
        self.renderer.draw_cube(sun, Vector3::repeat(20.0), color);

        self.renderer.set_alpha(environment.weather.cloud_opacity);
        let origin = Vector3::new(bus.x, 0.0, bus.z);
        for cloud in &self.sim.particles.clouds {
            for (offset, radius) in &cloud.puffs {
                self.renderer.draw_cube(origin + cloud.center + offset, Vector3::repeat(*radius * 2.0), 0xFFFFFF);
            }
        }
        self.renderer.set_alpha(1.0);
    }

    fn draw_weather(&self, bus: Vector3<f32>) {
        let weather = &self.sim.environment.weather;
        let particles = &self.sim.particles;
        let origin = Vector3::new(bus.x, 0.0, bus.z);

        if weather.rain_visible() {
            let streaks: Vec<f32> = particles
                .rain
                .iter()
                .flat_map(|drop| [drop.x, drop.y, drop.z, drop.x, drop.y - 3.0, drop.z])
                .collect();
            self.renderer.set_alpha(0.6 * weather.rain_intensity);
            self.renderer.draw_lines(&streaks, origin, 0xAAAACC);
        }
        if weather.sandstorm {
            let grains: Vec<f32> = particles.sand.iter().flat_map(|grain| [grain.x, grain.y, grain.z]).collect();
            self.renderer.set_alpha(0.8);
            self.renderer.draw_points(&grains, origin, 0xD2B48C, 3.0);
        }
        self.renderer.set_alpha(1.0);
    }
}
