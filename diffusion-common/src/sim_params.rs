use serde::{Deserialize, Serialize};
use crate::config::{SpreadPolicy, StepMethod};

/// Count levels that bound the transition band, as fractions of the initial peak.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpreadThresholds {
    pub upper: f64, // 3/4 of peak
    pub lower: f64, // 1/4 of peak
}

impl SpreadThresholds {
    pub const UPPER_FRACTION: f64 = 0.75;
    pub const LOWER_FRACTION: f64 = 0.25;

    pub fn from_peak(peak_value: u64) -> Self {
        Self {
            upper: Self::UPPER_FRACTION * peak_value as f64,
            lower: Self::LOWER_FRACTION * peak_value as f64,
        }
    }
}

/// Simulation parameters derived from the configuration, used frequently during simulation steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimParams {
    // Lattice
    pub locations: usize,
    pub half_locations: usize,

    // Initial step distribution
    pub max_points: u64,
    pub min_points: u64,
    pub total_particles: u64, // Conserved by every frame

    // Spread measurement
    pub peak_value: u64,
    pub thresholds: SpreadThresholds,

    // Time
    pub frames: u32,
    pub progress_interval: u32, // Frames between progress lines (0 = silent)

    pub seed: u64,
    pub method: StepMethod,
    pub policy: SpreadPolicy,
}
