//! Vector Field Histogram reactive obstacle avoidance
//!
//! Builds a polar density histogram from the current sensor readings,
//! smooths it, finds navigable valleys, and picks the valley that best
//! balances progress toward the goal against heading continuity.
//!
//! # Features
//!
//! - Circular polar histogram over configurable sector count
//! - Circular convolution smoothing kernel
//! - Valley detection with fallback to current heading
//!
//! # Example
//!
//! ```rust
//! use horus_navstack::algorithms::vfh::Vfh;
//! use horus_navstack::types::Vector3;
//!
//! let vfh = Vfh::new();
//! let direction = vfh.find_best_direction(&[], 0.0, Vector3::new(1.0, 0.0, 0.0));
//! assert!(direction.is_finite());
//! ```

use crate::controller::SensorReading;
use crate::types::{angle_diff, Vector3};
use std::f64::consts::PI;

/// Tunables for [`Vfh`].
#[derive(Debug, Clone, PartialEq)]
pub struct VfhConfig {
    pub num_sectors: usize,
    pub safe_distance: f64,
    pub max_range: f64,
    pub target_weight: f64,
    pub heading_weight: f64,
    pub valley_threshold: f64,
    pub kernel: Vec<f64>,
}

impl Default for VfhConfig {
    fn default() -> Self {
        Self {
            num_sectors: 72,
            safe_distance: 1.0,
            max_range: 5.0,
            target_weight: 0.5,
            heading_weight: 0.3,
            valley_threshold: 0.3,
            kernel: vec![0.1, 0.2, 0.4, 0.2, 0.1],
        }
    }
}

/// Vector Field Histogram reactive avoider.
pub struct Vfh {
    config: VfhConfig,
}

impl Default for Vfh {
    fn default() -> Self {
        Self::new()
    }
}

impl Vfh {
    pub fn new() -> Self {
        Self::with_config(VfhConfig::default())
    }

    pub fn with_config(config: VfhConfig) -> Self {
        Self { config }
    }

    fn sector_size(&self) -> f64 {
        2.0 * PI / self.config.num_sectors as f64
    }

    fn sector_center(&self, sector: usize) -> f64 {
        let angle = (sector as f64 + 0.5) * self.sector_size();
        crate::types::canonicalize(angle)
    }

    /// Pick the best heading, in radians, given current `readings`, the
    /// `target_angle` toward the goal, and the robot's `current_velocity`
    /// vector (world XZ plane).
    pub fn find_best_direction(
        &self,
        readings: &[SensorReading],
        target_angle: f64,
        current_velocity: Vector3,
    ) -> f64 {
        let histogram = self.build_histogram(readings);
        let smoothed = self.convolve(&histogram);
        let current_heading = current_velocity.z.atan2(current_velocity.x);

        let valleys = self.detect_valleys(&smoothed);
        if valleys.is_empty() {
            return current_heading;
        }

        valleys
            .into_iter()
            .min_by(|&a, &b| {
                let cost_a = self.valley_cost(a, target_angle, current_heading);
                let cost_b = self.valley_cost(b, target_angle, current_heading);
                cost_a.partial_cmp(&cost_b).unwrap()
            })
            .unwrap()
    }

    fn valley_cost(&self, angle: f64, target_angle: f64, current_heading: f64) -> f64 {
        self.config.target_weight * angle_diff(angle, target_angle).abs()
            + self.config.heading_weight * angle_diff(angle, current_heading).abs()
    }

    fn build_histogram(&self, readings: &[SensorReading]) -> Vec<f64> {
        let num_sectors = self.config.num_sectors;
        let sector_size = self.sector_size();
        let mut histogram = vec![0.0; num_sectors];

        for reading in readings {
            if reading.distance > self.config.max_range {
                continue;
            }
            let raw_angle = reading.point.y.atan2(reading.point.x);
            let normalized = ((raw_angle % (2.0 * PI)) + 2.0 * PI) % (2.0 * PI);
            let sector = ((normalized / sector_size).floor() as usize).min(num_sectors - 1);
            let weight = 1.0 - (reading.distance / self.config.safe_distance).min(1.0);
            histogram[sector] += weight;
        }

        histogram
    }

    fn convolve(&self, histogram: &[f64]) -> Vec<f64> {
        let n = histogram.len();
        let kernel = &self.config.kernel;
        let half = kernel.len() / 2;
        let mut result = vec![0.0; n];

        for i in 0..n {
            let mut sum = 0.0;
            for (k, &weight) in kernel.iter().enumerate() {
                let offset = k as i64 - half as i64;
                let idx = ((i as i64 + offset).rem_euclid(n as i64)) as usize;
                sum += histogram[idx] * weight;
            }
            result[i] = sum;
        }

        result
    }

    fn detect_valleys(&self, smoothed: &[f64]) -> Vec<f64> {
        let n = smoothed.len();
        let mut valleys = Vec::new();

        for i in 0..n {
            let prev = smoothed[(i + n - 1) % n];
            let next = smoothed[(i + 1) % n];
            if smoothed[i] < self.config.valley_threshold && smoothed[i] <= prev && smoothed[i] <= next {
                valleys.push(self.sector_center(i));
            }
        }

        valleys
    }
}
