use std::cell::RefCell;
use std::rc::Rc;

use endless_bus::sim::assets::{
    AssetCompletion, AssetError, AssetLoader, AssetRequest, FallbackOnly, Visual,
};
use endless_bus::sim::config::{ConfigError, GameConfig};
use endless_bus::sim::entities::{EntityId, TrafficEntity};
use endless_bus::sim::environment::{Biome, Weather};
use endless_bus::sim::input::ControlIntent;
use endless_bus::sim::spawner::PendingSpawn;
use endless_bus::sim::{SimEvent, Simulation};
use nalgebra::Vector3;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

const FRAME: f32 = 1.0 / 60.0;

/// Loader that starts every request and lets the test decide when, and how,
/// each one completes.
#[derive(Clone, Default)]
struct ScriptedLoader {
    requests: Rc<RefCell<Vec<AssetRequest>>>,
}

impl AssetLoader for ScriptedLoader {
    fn load(&mut self, request: &AssetRequest) -> Result<(), AssetError> {
        self.requests.borrow_mut().push(request.clone());
        Ok(())
    }
}

impl ScriptedLoader {
    fn take(&self) -> Vec<AssetRequest> {
        std::mem::take(&mut *self.requests.borrow_mut())
    }
}

fn fallback_sim(seed: u64) -> Simulation {
    Simulation::new(GameConfig::default(), SmallRng::seed_from_u64(seed), Box::new(FallbackOnly))
        .expect("default config is valid")
}

fn scripted_sim(seed: u64) -> (Simulation, ScriptedLoader) {
    let loader = ScriptedLoader::default();
    let sim = Simulation::new(
        GameConfig::default(),
        SmallRng::seed_from_u64(seed),
        Box::new(loader.clone()),
    )
    .expect("default config is valid");
    (sim, loader)
}

fn idle() -> ControlIntent {
    ControlIntent::default()
}

fn throttle() -> ControlIntent {
    ControlIntent { accelerate: true, ..ControlIntent::default() }
}

fn park_car_on_bus(sim: &mut Simulation) -> EntityId {
    let id = sim.registry.next_id();
    let position = sim.player.position;
    sim.registry.traffic.push(TrafficEntity {
        id,
        visual: Visual::fallback(endless_bus::sim::assets::FallbackShape::Car { color: 0xFF0000 }),
        lane: 2,
        x: position.x,
        z: position.z,
        speed: 0.0,
        label: "Truck".into(),
    });
    id
}

/// Parks a stopped car in the bus's lane, `gap` units ahead center to center.
fn park_car_ahead(sim: &mut Simulation, gap: f32) {
    let id = park_car_on_bus(sim);
    if let Some(car) = sim.registry.traffic.iter_mut().find(|car| car.id == id) {
        car.z -= gap;
    }
}

#[test]
fn fallback_loader_gives_a_bus_immediately() {
    let sim = fallback_sim(1);
    assert!(sim.player.visual.as_ref().map(Visual::is_fallback).unwrap_or(false));
    assert_eq!(sim.registry.scenery.len(), 3);
    assert_eq!(sim.scheduled_spawns(), 22);
}

#[test]
fn opening_population_arrives_staggered() {
    let mut sim = fallback_sim(2);
    sim.tick(FRAME, &idle());
    assert_eq!(sim.registry.traffic.len(), 1);
    assert_eq!(sim.registry.pedestrians.len(), 1);

    for _ in 0..(6.0 / FRAME) as usize {
        sim.tick(FRAME, &idle());
    }
    assert_eq!(sim.registry.traffic.len(), 12);
    assert_eq!(sim.registry.pedestrians.len(), 10);
    assert!(sim.registry.traffic.iter().all(|car| car.label == "Car"));
}

#[test]
fn long_tick_is_clamped() {
    let mut sim = fallback_sim(3);
    sim.tick(1.0, &throttle());
    assert!((sim.player.speed - 0.6).abs() < 1e-6);
    assert!((sim.player.distance - 0.72).abs() < 1e-5);
    assert!((sim.clock() - 0.1).abs() < 1e-6);
}

#[test]
fn driving_stays_within_limits_and_distance_never_drops() {
    let mut sim = fallback_sim(4);
    let config = sim.config().clone();
    let mut rng = SmallRng::seed_from_u64(44);
    let mut last_distance = 0.0;

    for _ in 0..5000 {
        let intent = ControlIntent {
            steer_left: rng.gen_bool(0.3),
            steer_right: rng.gen_bool(0.3),
            accelerate: rng.gen_bool(0.8),
            brake: rng.gen_bool(0.1),
        };
        sim.tick(rng.gen::<f32>() * 0.2, &intent);
        if sim.is_game_over() {
            sim.restart();
            last_distance = 0.0;
            continue;
        }

        let player = &sim.player;
        assert!(player.steering.abs() <= config.driving.max_steering);
        assert!(player.speed <= config.driving.max_speed);
        assert!(player.speed >= config.driving.min_speed());
        assert!(player.distance >= last_distance);
        last_distance = player.distance;

        assert!(sim.registry.traffic.len() <= config.population.max_traffic);
        assert!(sim.registry.pedestrians.len() <= config.population.max_pedestrians);
        assert!(sim.registry.scenery.len() <= config.population.max_scenery);
        assert!(sim.environment.cursor.progress < sim.environment.current().duration);
    }
}

#[test]
fn reaching_the_threshold_moves_to_the_next_phase() {
    let mut sim = fallback_sim(5);
    let old: Vec<EntityId> = sim.registry.scenery.iter().map(|item| item.id).collect();
    assert!(!old.is_empty());
    sim.drain_events();

    sim.environment.cursor.progress = 3000.0;
    sim.tick(FRAME, &idle());

    assert_eq!(sim.environment.cursor.index, 1);
    assert_eq!(sim.environment.cursor.progress, 0.0);
    assert_eq!(sim.environment.current().biome, Biome::Suburban);
    assert!(sim.registry.scenery.iter().all(|item| !old.contains(&item.id)));
    assert!(sim.registry.scenery.len() <= 1);
    assert!(sim.drain_events().contains(&SimEvent::EnvironmentChanged {
        biome: Biome::Suburban,
        weather: Weather::Sunny,
    }));
    assert_eq!(sim.hud().biome, "Suburban");
}

#[test]
fn phases_cycle_back_to_the_start() {
    let mut sim = fallback_sim(6);
    let n = sim.config().environment.len();
    let mut seen = Vec::new();
    for _ in 0..n {
        sim.environment.cursor.progress = sim.environment.current().duration;
        sim.tick(FRAME, &idle());
        seen.push(sim.environment.cursor.index);
        assert!(sim.environment.cursor.progress < sim.environment.current().duration);
    }
    assert_eq!(seen, vec![1, 2, 3, 4, 5, 6, 7, 0]);
}

#[test]
fn collision_ends_the_game_until_restart() {
    let mut sim = fallback_sim(7);
    sim.tick(FRAME, &throttle());
    park_car_on_bus(&mut sim);
    sim.drain_events();

    sim.tick(FRAME, &throttle());
    assert!(sim.is_game_over());
    assert_eq!(sim.crash_cause(), Some("Truck"));
    let score = sim.player.score;
    assert!(sim
        .drain_events()
        .contains(&SimEvent::Crashed { cause: "Truck".into(), score }));

    let frozen = sim.player.clone();
    let traffic = sim.registry.traffic.clone();
    let progress = sim.environment.cursor.progress;
    for _ in 0..30 {
        sim.tick(FRAME, &throttle());
    }
    assert_eq!(sim.player, frozen);
    assert_eq!(sim.registry.traffic, traffic);
    assert_eq!(sim.environment.cursor.progress, progress);
    assert!(sim.hud().game_over);
}

#[test]
fn restart_clears_the_round() {
    let mut sim = fallback_sim(8);
    for _ in 0..200 {
        sim.tick(FRAME, &throttle());
    }
    sim.environment.cursor.progress = 3000.0;
    sim.tick(FRAME, &throttle());
    park_car_on_bus(&mut sim);
    sim.tick(FRAME, &idle());
    assert!(sim.is_game_over());

    let generation = sim.generation();
    sim.restart();
    assert!(!sim.is_game_over());
    assert_eq!(sim.crash_cause(), None);
    assert_eq!(sim.player.distance, 0.0);
    assert_eq!(sim.player.score, 0);
    assert_eq!(sim.player.speed, 0.0);
    assert_eq!(sim.player.position, Vector3::new(0.0, 2.0, 0.0));
    assert!(sim.player.visual.is_some());
    assert!(sim.registry.is_empty());
    assert_eq!(sim.environment.cursor.index, 0);
    assert_eq!(sim.environment.cursor.progress, 0.0);
    assert_eq!(sim.generation(), generation + 1);
    assert!(sim.drain_events().contains(&SimEvent::Restarted));
}

#[test]
fn completions_from_before_a_restart_are_discarded() {
    let (mut sim, loader) = scripted_sim(9);
    sim.tick(FRAME, &idle());
    let requests = loader.take();
    assert_eq!(requests.len(), 3, "bus, one vehicle and one pedestrian");
    assert_eq!(sim.in_flight(), (1, 1));

    sim.restart();
    for request in requests {
        let visual = Visual::model(&request.model.path, Vector3::new(2.0, 2.0, 4.0), 0.0);
        sim.post_completion(AssetCompletion { ticket: request.ticket, result: Ok(visual) });
    }
    sim.tick(FRAME, &idle());
    assert!(sim.player.visual.is_none());
    assert!(sim.registry.traffic.is_empty());
    assert!(sim.registry.pedestrians.is_empty());
    assert_eq!(sim.in_flight(), (1, 1));
}

#[test]
fn failed_loads_register_fallback_shapes() {
    let (mut sim, loader) = scripted_sim(10);
    sim.tick(FRAME, &idle());
    for request in loader.take() {
        let result = match request.ticket.spawn {
            PendingSpawn::Bus => Ok(Visual::model(&request.model.path, Vector3::new(8.0, 4.0, 14.0), 0.0)),
            _ => Err(AssetError::Status { path: request.model.path.clone(), status: 404 }),
        };
        sim.post_completion(AssetCompletion { ticket: request.ticket, result });
    }
    sim.tick(FRAME, &idle());

    assert!(!sim.player.visual.as_ref().unwrap().is_fallback());
    assert_eq!(sim.registry.traffic.len(), 1);
    assert!(sim.registry.traffic[0].visual.is_fallback());
    assert_eq!(sim.registry.traffic[0].label, "Car");
    assert_eq!(sim.registry.pedestrians.len(), 1);
    assert_eq!(sim.in_flight(), (0, 0));
}

#[test]
fn bus_does_not_move_until_it_has_loaded() {
    let (mut sim, _loader) = scripted_sim(11);
    for _ in 0..30 {
        sim.tick(FRAME, &throttle());
    }
    assert_eq!(sim.player.speed, 0.0);
    assert_eq!(sim.player.distance, 0.0);
}

#[test]
fn requests_in_flight_count_against_the_cap() {
    let (mut sim, loader) = scripted_sim(12);
    for _ in 0..40 {
        sim.spawn_traffic();
    }
    let traffic_requests = loader
        .take()
        .into_iter()
        .filter(|request| matches!(request.ticket.spawn, PendingSpawn::Traffic { .. }))
        .count();
    assert_eq!(traffic_requests, 15);
    assert_eq!(sim.in_flight().0, 15);
}

#[test]
fn passed_traffic_is_replaced_after_a_short_delay() {
    let mut sim = fallback_sim(13);
    sim.tick(FRAME, &idle());
    let scheduled = sim.scheduled_spawns();
    let car = &mut sim.registry.traffic[0];
    car.z = sim.player.position.z + 200.0;
    let gone = car.id;

    sim.tick(FRAME, &idle());
    assert!(sim.registry.traffic.iter().all(|car| car.id != gone));
    assert_eq!(sim.scheduled_spawns(), scheduled + 1);
}

#[test]
fn despawned_movers_come_back_one_for_one_after_the_delay() {
    let mut config = GameConfig::default();
    config.population.initial_traffic = 1;
    config.population.initial_pedestrians = 1;
    let mut sim = Simulation::new(config, SmallRng::seed_from_u64(16), Box::new(FallbackOnly)).unwrap();
    sim.tick(FRAME, &idle());
    assert_eq!(sim.registry.traffic.len(), 1);
    assert_eq!(sim.registry.pedestrians.len(), 1);
    assert_eq!(sim.scheduled_spawns(), 0);

    let behind = sim.player.position.z + 200.0;
    sim.registry.traffic[0].z = behind;
    sim.registry.pedestrians[0].z = behind;
    let gone_car = sim.registry.traffic[0].id;
    let gone_walker = sim.registry.pedestrians[0].id;

    sim.tick(FRAME, &idle());
    let due = sim.clock() + sim.config().spawn.replacement_delay;
    assert!(sim.registry.traffic.is_empty());
    assert!(sim.registry.pedestrians.is_empty());
    assert_eq!(sim.scheduled_spawns(), 2);

    sim.tick(0.05, &idle());
    sim.tick(0.0499, &idle());
    assert!(sim.clock() < due);
    assert!(sim.registry.traffic.is_empty());
    assert!(sim.registry.pedestrians.is_empty());
    assert_eq!(sim.scheduled_spawns(), 2);

    sim.tick(0.001, &idle());
    assert!(sim.clock() >= due);
    assert_eq!(sim.scheduled_spawns(), 0);
    assert_eq!(sim.registry.traffic.len(), 1);
    assert_eq!(sim.registry.pedestrians.len(), 1);
    assert_ne!(sim.registry.traffic[0].id, gone_car);
    assert_ne!(sim.registry.pedestrians[0].id, gone_walker);
    assert!(sim.registry.pedestrians[0].z < sim.player.position.z);

    for _ in 0..30 {
        sim.tick(FRAME, &idle());
    }
    assert_eq!(sim.registry.traffic.len(), 1);
    assert_eq!(sim.registry.pedestrians.len(), 1);
}

#[test]
fn bumper_to_bumper_contact_is_a_crash() {
    // Fallback bus is 14 deep and a fallback car 6, so centers 10 apart touch.
    let mut sim = fallback_sim(17);
    park_car_ahead(&mut sim, 10.0);
    sim.tick(0.0, &idle());
    assert!(sim.is_game_over());
    assert_eq!(sim.crash_cause(), Some("Truck"));

    let mut sim = fallback_sim(17);
    park_car_ahead(&mut sim, 10.01);
    sim.tick(0.0, &idle());
    assert!(!sim.is_game_over());
}

#[test]
fn invalid_config_is_rejected_up_front() {
    let mut config = GameConfig::default();
    config.models.vehicles.clear();
    let result = Simulation::new(config, SmallRng::seed_from_u64(18), Box::new(FallbackOnly));
    assert!(matches!(result, Err(ConfigError::EmptyCatalog)));

    let mut config = GameConfig::default();
    config.environment.clear();
    let result = Simulation::new(config, SmallRng::seed_from_u64(18), Box::new(FallbackOnly));
    assert!(matches!(result, Err(ConfigError::EmptySequence)));
}

#[test]
fn use_fallback_config_skips_the_loader() {
    let loader = ScriptedLoader::default();
    let mut config = GameConfig::default();
    config.models.use_fallback = true;
    let mut sim = Simulation::new(config, SmallRng::seed_from_u64(14), Box::new(loader.clone())).unwrap();
    sim.tick(FRAME, &idle());
    assert!(loader.take().is_empty());
    assert!(sim.player.visual.is_some());
    assert_eq!(sim.registry.traffic.len(), 1);
}

#[test]
fn scenery_refills_ahead_and_is_pruned_behind() {
    let mut sim = fallback_sim(15);
    for _ in 0..40 {
        sim.tick(FRAME, &idle());
    }
    assert_eq!(sim.registry.scenery.len(), 20);
    let z = sim.player.position.z;
    assert!(sim
        .registry
        .scenery
        .iter()
        .all(|item| item.z <= z + 300.0));

    sim.player.position.z -= 1000.0;
    sim.tick(FRAME, &idle());
    let z = sim.player.position.z;
    assert!(sim.registry.scenery.iter().all(|item| item.z <= z + 300.0));
    assert!(sim.registry.scenery.len() < 20);
}
