//! Constant-velocity baseline sampler.
//!
//! Extends a trajectory one step at a time from its last observed velocity,
//! damped each step and reflected off the walls of the unit square. It needs
//! no trained weights, which makes it useful for smoke runs of the full
//! pipeline and as a reference point for learned models.

use anyhow::{bail, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::sampler::Sampler;
use crate::config::BaselineConfig;
use crate::dataset::Point;

#[derive(Debug, Clone)]
pub struct BaselineSampler {
    damping: f64,
    jitter: f64,
    seed: u64,
}

impl BaselineSampler {
    pub fn new(damping: f64, jitter: f64, seed: u64) -> Self {
        Self {
            damping,
            jitter: jitter.abs(),
            seed,
        }
    }

    pub fn from_config(config: &BaselineConfig) -> Self {
        Self::new(config.damping, config.jitter, config.seed)
    }

    fn step(&self, last: Point, velocity: &mut Point, rng: &mut StdRng) -> Point {
        velocity.x *= self.damping;
        velocity.y *= self.damping;
        if self.jitter > 0.0 {
            velocity.x += rng.gen_range(-self.jitter..=self.jitter);
            velocity.y += rng.gen_range(-self.jitter..=self.jitter);
        }
        let (x, vx) = reflect(last.x + velocity.x, velocity.x);
        let (y, vy) = reflect(last.y + velocity.y, velocity.y);
        *velocity = Point::new(vx, vy);
        Point::new(x, y)
    }
}

/// Bounce a coordinate that left `[0, 1]` back inside, flipping its velocity.
fn reflect(pos: f64, vel: f64) -> (f64, f64) {
    if pos < 0.0 {
        ((-pos).min(1.0), -vel)
    } else if pos > 1.0 {
        ((2.0 - pos).max(0.0), -vel)
    } else {
        (pos, vel)
    }
}

impl Sampler for BaselineSampler {
    async fn sample(
        &self,
        observed: &[Point],
        _reference: &[Point],
        steps: usize,
    ) -> Result<Vec<Point>> {
        let Some(&last) = observed.last() else {
            bail!("baseline sampler needs at least one observed position");
        };
        let mut velocity = match observed {
            [.., prev, cur] => Point::new(cur.x - prev.x, cur.y - prev.y),
            _ => Point::default(),
        };

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut trajectory = Vec::with_capacity(observed.len() + steps);
        trajectory.extend_from_slice(observed);

        let mut current = last;
        for _ in 0..steps {
            current = self.step(current, &mut velocity, &mut rng);
            trajectory.push(current);
        }
        Ok(trajectory)
    }

    fn name(&self) -> &str {
        "baseline"
    }
}
