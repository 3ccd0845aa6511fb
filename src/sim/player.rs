use nalgebra::Vector3;

use crate::sim::assets::Visual;
use crate::sim::collision::Aabb;
use crate::sim::config::DrivingConfig;
use crate::sim::input::ControlIntent;

/// Resting height of the bus above the road.
pub const BUS_Y: f32 = 2.0;

#[derive(Clone, Debug, PartialEq)]
pub struct PlayerState {
    pub position: Vector3<f32>,
    pub speed: f32,
    pub steering: f32,
    pub lane: usize,
    pub distance: f32,
    pub score: u32,
    /// The bus body; `None` until its model (or fallback) is in.
    pub visual: Option<Visual>,
}

impl PlayerState {
    pub fn new(config: &DrivingConfig) -> Self {
        PlayerState {
            position: Vector3::new(0.0, BUS_Y, 0.0),
            speed: 0.0,
            steering: 0.0,
            lane: config.start_lane,
            distance: 0.0,
            score: 0,
            visual: None,
        }
    }

    /// Back to the starting line. The bus body is kept.
    pub fn reset(&mut self, config: &DrivingConfig) {
        let visual = self.visual.take();
        *self = PlayerState { visual, ..PlayerState::new(config) };
    }

    pub fn bounds(&self) -> Option<Aabb> {
        self.visual
            .as_ref()
            .map(|visual| Aabb::from_footprint(self.position, visual.size, visual.base))
    }

    fn steer(&mut self, intent: &ControlIntent, config: &DrivingConfig) {
        let step = config.steering_speed;
        let limit = config.max_steering;
        if intent.steer_left {
            self.steering = (self.steering - step).max(-limit);
        }
        if intent.steer_right {
            self.steering = (self.steering + step).min(limit);
        }
        if !intent.steer_left && !intent.steer_right {
            if self.steering > 0.0 {
                self.steering = (self.steering - step / 2.0).max(0.0);
            } else if self.steering < 0.0 {
                self.steering = (self.steering + step / 2.0).min(0.0);
            }
        }
    }

    fn throttle(&mut self, intent: &ControlIntent, config: &DrivingConfig) {
        if intent.accelerate {
            self.speed = (self.speed + config.acceleration).min(config.max_speed);
        } else {
            self.speed = (self.speed - config.deceleration).max(0.0);
        }
        if intent.brake {
            self.speed = (self.speed - config.brake_power).max(config.min_speed());
        }
    }

    /// Applies one tick of driving input and motion. Returns the forward
    /// displacement, which is negative when reversing. `dt` must already be
    /// clamped by the caller.
    pub fn advance(&mut self, dt: f32, intent: &ControlIntent, config: &DrivingConfig) -> f32 {
        if self.visual.is_none() {
            return 0.0;
        }
        self.steer(intent, config);
        self.throttle(intent, config);

        let forward = self.speed * dt * config.distance_scale;
        self.position.z -= forward;

        let target_x = config.lane_center(self.lane) + self.steering * config.steering_reach;
        self.position.x += (target_x - self.position.x) * config.lateral_smoothing;

        self.distance += forward.abs();
        self.score = (self.distance / 10.0).floor() as u32;
        forward
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::assets::{FallbackShape, Visual};

    fn bus(config: &DrivingConfig) -> PlayerState {
        let mut player = PlayerState::new(config);
        player.visual = Some(Visual::fallback(FallbackShape::Bus));
        player
    }

    fn intent(left: bool, right: bool, accelerate: bool, brake: bool) -> ControlIntent {
        ControlIntent { steer_left: left, steer_right: right, accelerate, brake }
    }

    #[test]
    fn one_second_of_throttle_from_rest() {
        let config = DrivingConfig::default();
        let mut player = bus(&config);
        let forward = player.advance(1.0, &intent(false, false, true, false), &config);
        assert!((player.speed - 0.6).abs() < 1e-6);
        assert!((forward - 7.2).abs() < 1e-5);
        assert!((player.distance - 7.2).abs() < 1e-5);
        assert!((player.position.z + 7.2).abs() < 1e-5);
        assert_eq!(player.score, 0);
    }

    #[test]
    fn nothing_moves_without_a_bus() {
        let config = DrivingConfig::default();
        let mut player = PlayerState::new(&config);
        assert_eq!(player.advance(0.1, &intent(true, false, true, false), &config), 0.0);
        assert_eq!(player.speed, 0.0);
        assert_eq!(player.steering, 0.0);
    }

    #[test]
    fn steering_saturates_and_recenters() {
        let config = DrivingConfig::default();
        let mut player = bus(&config);
        for _ in 0..50 {
            player.advance(0.016, &intent(true, false, false, false), &config);
        }
        assert_eq!(player.steering, -config.max_steering);

        player.advance(0.016, &intent(false, false, false, false), &config);
        assert!((player.steering - (-0.57)).abs() < 1e-5);
        for _ in 0..50 {
            player.advance(0.016, &intent(false, false, false, false), &config);
        }
        assert_eq!(player.steering, 0.0);
    }

    #[test]
    fn left_and_right_together_apply_in_sequence() {
        let config = DrivingConfig::default();
        let mut player = bus(&config);
        player.steering = -config.max_steering;
        player.advance(0.016, &intent(true, true, false, false), &config);
        assert!((player.steering - (-0.54)).abs() < 1e-5);
    }

    #[test]
    fn braking_reverses_down_to_a_third_of_top_speed() {
        let config = DrivingConfig::default();
        let mut player = bus(&config);
        for _ in 0..100 {
            player.advance(0.05, &intent(false, false, true, true), &config);
        }
        assert_eq!(player.speed, -40.0);
        assert!(player.position.z > 0.0);
        assert!(player.distance > 0.0);
    }

    #[test]
    fn coasting_snaps_reverse_speed_back_before_braking() {
        let config = DrivingConfig::default();
        let mut player = bus(&config);
        for _ in 0..10 {
            player.advance(0.05, &intent(false, false, false, true), &config);
        }
        assert!((player.speed + config.brake_power).abs() < 1e-6);
    }

    #[test]
    fn lateral_position_eases_toward_lane() {
        let config = DrivingConfig::default();
        let mut player = bus(&config);
        player.advance(0.016, &intent(false, false, false, false), &config);
        // Lane 2 is centered at +2; each tick closes 10% of the gap.
        assert!((player.position.x - 0.2).abs() < 1e-6);
        player.advance(0.016, &intent(false, false, false, false), &config);
        assert!((player.position.x - 0.38).abs() < 1e-6);
    }

    #[test]
    fn reset_keeps_the_bus_body() {
        let config = DrivingConfig::default();
        let mut player = bus(&config);
        player.advance(1.0, &intent(false, false, true, false), &config);
        player.reset(&config);
        assert_eq!(player.distance, 0.0);
        assert_eq!(player.position, Vector3::new(0.0, BUS_Y, 0.0));
        assert!(player.visual.is_some());
    }
}
