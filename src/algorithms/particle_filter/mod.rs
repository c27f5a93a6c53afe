//! Monte-Carlo Particle Filter Localization
//!
//! Maintains a weighted sample of pose hypotheses and converges them onto the
//! robot's true pose as odometry predictions and sensor readings arrive.
//!
//! # Features
//!
//! - Uniform-noise motion prediction
//! - Gaussian-kernel measurement weighting against a set of range readings
//! - Effective-sample-size-gated systematic resampling
//! - Weighted-mean pose estimate with circular-mean heading
//!
//! # Example
//!
//! ```rust
//! use horus_navstack::algorithms::particle_filter::ParticleFilter;
//! use horus_navstack::types::Pose;
//!
//! let mut pf = ParticleFilter::new();
//! pf.initialize(Pose::origin(), 0.5);
//! pf.predict(horus_navstack::types::Vector3::new(0.1, 0.0, 0.0), 0.0);
//! let estimate = pf.estimated_pose();
//! assert!(estimate.x.is_finite());
//! ```

use crate::controller::SensorReading;
use crate::types::{canonicalize, Pose, Vector3};
use rand::Rng;
use std::f64::consts::PI;

/// A single pose hypothesis and its importance weight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Particle {
    pub pose: Pose,
    pub weight: f64,
}

/// Tunables for [`ParticleFilter`], fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParticleFilterConfig {
    pub particle_count: usize,
    pub motion_noise_x: f64,
    pub motion_noise_y: f64,
    pub motion_noise_theta: f64,
    pub measurement_noise: f64,
    pub initial_spread: f64,
    pub initial_theta_spread: f64,
}

impl Default for ParticleFilterConfig {
    fn default() -> Self {
        Self {
            particle_count: 100,
            motion_noise_x: 0.05,
            motion_noise_y: 0.05,
            motion_noise_theta: 0.1,
            measurement_noise: 0.1,
            initial_spread: 0.5,
            initial_theta_spread: 0.05 * PI,
        }
    }
}

/// Monte-Carlo particle filter over planar poses.
pub struct ParticleFilter {
    config: ParticleFilterConfig,
    particles: Vec<Particle>,
}

impl Default for ParticleFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl ParticleFilter {
    pub fn new() -> Self {
        Self::with_config(ParticleFilterConfig::default())
    }

    pub fn with_config(config: ParticleFilterConfig) -> Self {
        let n = config.particle_count;
        Self {
            config,
            particles: vec![
                Particle {
                    pose: Pose::origin(),
                    weight: 1.0 / n as f64,
                };
                n
            ],
        }
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    /// Scatter all particles uniformly around `pose` within `spread_radius`
    /// meters on `x`/`y` and `±0.05π` on `θ`, with equal weights.
    pub fn initialize(&mut self, pose: Pose, spread_radius: f64) {
        let mut rng = rand::thread_rng();
        let n = self.config.particle_count;
        let weight = 1.0 / n as f64;
        self.particles = (0..n)
            .map(|_| {
                let dx = rng.gen_range(-spread_radius / 2.0..=spread_radius / 2.0);
                let dy = rng.gen_range(-spread_radius / 2.0..=spread_radius / 2.0);
                let dtheta = rng.gen_range(
                    -self.config.initial_theta_spread..=self.config.initial_theta_spread,
                );
                Particle {
                    pose: Pose::new(pose.x + dx, pose.y + dy, pose.theta + dtheta),
                    weight,
                }
            })
            .collect();
    }

    /// Propagate every particle by `delta_position` (world frame, `x`/`z`
    /// mapped onto planar `x`/`y`) and `delta_theta`, each perturbed by
    /// independent uniform noise in `[-0.5, 0.5]` scaled by the configured
    /// per-axis sigma. Weights are untouched.
    pub fn predict(&mut self, delta_position: Vector3, delta_theta: f64) {
        let mut rng = rand::thread_rng();
        for particle in &mut self.particles {
            let ux: f64 = rng.gen_range(-0.5..=0.5);
            let uy: f64 = rng.gen_range(-0.5..=0.5);
            let utheta: f64 = rng.gen_range(-0.5..=0.5);

            let x = particle.pose.x + delta_position.x + ux * self.config.motion_noise_x;
            let y = particle.pose.y + delta_position.z + uy * self.config.motion_noise_y;
            let theta =
                particle.pose.theta + delta_theta + utheta * self.config.motion_noise_theta;

            particle.pose = Pose::new(x, y, theta);
        }
    }

    /// Reweight every particle against `readings`, normalize, and resample
    /// when the effective sample size drops below `N/2`.
    pub fn update(&mut self, readings: &[SensorReading]) {
        let sigma = self.config.measurement_noise;

        for particle in &mut self.particles {
            let err_sum: f64 = readings
                .iter()
                .map(|reading| {
                    let expected = expected_distance(particle.pose, reading.point);
                    let error = expected - reading.distance;
                    (error * error) / (2.0 * sigma * sigma)
                })
                .sum();
            particle.weight *= (-err_sum).exp();
        }

        self.normalize();

        let n_eff = self.effective_sample_size();
        if n_eff < self.config.particle_count as f64 / 2.0 {
            self.systematic_resample();
        }
    }

    fn normalize(&mut self) {
        let sum: f64 = self.particles.iter().map(|p| p.weight).sum();
        if sum == 0.0 {
            let uniform = 1.0 / self.config.particle_count as f64;
            for particle in &mut self.particles {
                particle.weight = uniform;
            }
        } else {
            for particle in &mut self.particles {
                particle.weight /= sum;
            }
        }
    }

    fn effective_sample_size(&self) -> f64 {
        let sum_sq: f64 = self.particles.iter().map(|p| p.weight * p.weight).sum();
        if sum_sq == 0.0 {
            0.0
        } else {
            1.0 / sum_sq
        }
    }

    fn systematic_resample(&mut self) {
        let n = self.config.particle_count;
        let mut cdf = Vec::with_capacity(n);
        let mut acc = 0.0;
        for particle in &self.particles {
            acc += particle.weight;
            cdf.push(acc);
        }

        let mut rng = rand::thread_rng();
        let uniform_weight = 1.0 / n as f64;
        let mut resampled = Vec::with_capacity(n);
        for _ in 0..n {
            let draw: f64 = rng.gen_range(0.0..1.0);
            let idx = cdf.partition_point(|&c| c <= draw).min(n - 1);
            resampled.push(Particle {
                pose: self.particles[idx].pose,
                weight: uniform_weight,
            });
        }
        self.particles = resampled;
    }

    /// Weighted mean of `(x, y)` and circular mean of `θ`.
    pub fn estimated_pose(&self) -> Pose {
        let mut x = 0.0;
        let mut y = 0.0;
        let mut sin_sum = 0.0;
        let mut cos_sum = 0.0;
        for particle in &self.particles {
            x += particle.weight * particle.pose.x;
            y += particle.weight * particle.pose.y;
            sin_sum += particle.weight * particle.pose.theta.sin();
            cos_sum += particle.weight * particle.pose.theta.cos();
        }
        Pose::new(x, y, canonicalize(sin_sum.atan2(cos_sum)))
    }
}

fn expected_distance(pose: Pose, point: Vector3) -> f64 {
    let dx = point.x - pose.x;
    let dy = point.y - pose.y;
    (dx * dx + dy * dy).sqrt()
}
