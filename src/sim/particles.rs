//! Rain, sand and cloud fields. Positions are relative to the bus so the
//! weather travels with the camera.

use nalgebra::Vector3;
use rand::Rng;

use crate::sim::environment::WeatherState;

const RAIN_COUNT: usize = 600;
const SAND_COUNT: usize = 400;
const CLOUD_COUNT: usize = 50;
const FIELD_HALF_WIDTH: f32 = 200.0;
const RAIN_TOP: f32 = 200.0;

pub struct Cloud {
    pub center: Vector3<f32>,
    /// Offset and radius of each puff.
    pub puffs: Vec<(Vector3<f32>, f32)>,
}

pub struct WeatherParticles {
    pub rain: Vec<Vector3<f32>>,
    pub sand: Vec<Vector3<f32>>,
    pub clouds: Vec<Cloud>,
}

fn spread<R: Rng>(rng: &mut R) -> f32 {
    rng.gen::<f32>() * FIELD_HALF_WIDTH * 2.0 - FIELD_HALF_WIDTH
}

impl WeatherParticles {
    pub fn new<R: Rng>(rng: &mut R) -> Self {
        let rain = (0..RAIN_COUNT)
            .map(|_| Vector3::new(spread(rng), rng.gen::<f32>() * 200.0 + 50.0, spread(rng)))
            .collect();
        let sand = (0..SAND_COUNT)
            .map(|_| Vector3::new(spread(rng), rng.gen::<f32>() * 50.0 + 10.0, spread(rng)))
            .collect();
        let clouds = (0..CLOUD_COUNT)
            .map(|_| {
                let center = Vector3::new(
                    rng.gen::<f32>() * 800.0 - 400.0,
                    100.0 + rng.gen::<f32>() * 100.0,
                    rng.gen::<f32>() * 1000.0 - 500.0,
                );
                let pieces = 3 + rng.gen_range(0..4);
                let puffs = (0..pieces)
                    .map(|_| {
                        let offset = Vector3::new(
                            (rng.gen::<f32>() - 0.5) * 15.0,
                            (rng.gen::<f32>() - 0.5) * 5.0,
                            (rng.gen::<f32>() - 0.5) * 15.0,
                        );
                        (offset, 5.0 + rng.gen::<f32>() * 8.0)
                    })
                    .collect();
                Cloud { center, puffs }
            })
            .collect();
        WeatherParticles { rain, sand, clouds }
    }

    pub fn update<R: Rng>(&mut self, weather: &WeatherState, dt: f32, clock: f64, rng: &mut R) {
        if weather.raining {
            let fall = 2.0 * weather.rain_intensity;
            for drop in self.rain.iter_mut() {
                drop.y -= fall;
                if drop.y < 0.0 {
                    *drop = Vector3::new(spread(rng), RAIN_TOP, spread(rng));
                }
            }
        }

        if weather.sandstorm {
            for (i, grain) in self.sand.iter_mut().enumerate() {
                grain.x += 0.5;
                grain.y += (clock as f32 + i as f32).sin() * 0.1;
                if grain.x > FIELD_HALF_WIDTH {
                    *grain = Vector3::new(-FIELD_HALF_WIDTH, rng.gen::<f32>() * 50.0 + 10.0, spread(rng));
                }
            }
        }

        for cloud in self.clouds.iter_mut() {
            cloud.center.x += 0.1 * dt * 60.0;
            cloud.center.z += 0.05 * dt * 60.0;
            if cloud.center.x > 400.0 {
                cloud.center.x = -400.0;
            }
            if cloud.center.z > 500.0 {
                cloud.center.z = -500.0;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    #[test]
    fn rain_falls_only_while_raining() {
        let mut rng = SmallRng::seed_from_u64(9);
        let mut particles = WeatherParticles::new(&mut rng);
        let before = particles.rain[0];

        let dry = WeatherState::default();
        particles.update(&dry, 0.016, 0.0, &mut rng);
        assert_eq!(particles.rain[0], before);

        let wet = WeatherState { raining: true, rain_intensity: 1.0, ..WeatherState::default() };
        particles.update(&wet, 0.016, 0.0, &mut rng);
        assert!((particles.rain[0].y - (before.y - 2.0)).abs() < 1e-4 || particles.rain[0].y == RAIN_TOP);
    }

    #[test]
    fn fading_rain_hangs_in_place() {
        let mut rng = SmallRng::seed_from_u64(11);
        let mut particles = WeatherParticles::new(&mut rng);
        let before = particles.rain.clone();

        let fading = WeatherState { raining: false, rain_intensity: 0.5, ..WeatherState::default() };
        assert!(fading.rain_visible());
        particles.update(&fading, 0.016, 0.0, &mut rng);
        assert_eq!(particles.rain, before);
    }

    #[test]
    fn sand_wraps_at_the_field_edge() {
        let mut rng = SmallRng::seed_from_u64(10);
        let mut particles = WeatherParticles::new(&mut rng);
        particles.sand[0].x = FIELD_HALF_WIDTH - 0.1;
        let storm = WeatherState { sandstorm: true, ..WeatherState::default() };
        particles.update(&storm, 0.016, 0.0, &mut rng);
        assert_eq!(particles.sand[0].x, -FIELD_HALF_WIDTH);
    }
}
