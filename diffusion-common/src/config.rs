use serde::{Deserialize, Serialize};
use anyhow::{Context, Result};
use crate::sim_params::{SimParams, SpreadThresholds};
use log::warn;
use std::path::Path;

// Lattice geometry
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct LatticeConfig {
    /// Number of particle locations. Must be even so the step splits into two equal halves.
    #[serde(default = "default_locations")]
    pub locations: usize,
}

// Initial step distribution and RNG seed
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct InitialConditions {
    /// Particles per location on the left half.
    #[serde(default = "default_max_points")]
    pub max_points: u64,
    /// Particles per location on the right half.
    #[serde(default)]
    pub min_points: u64,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

// Configuration for timing
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct TimingConfig {
    #[serde(default = "default_frames")]
    pub frames: u32,
    /// How many progress lines to log over the whole run (0 = none).
    #[serde(default = "default_progress_reports")]
    pub progress_reports: u32,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepMethod {
    /// One Binomial(n, 1/2) draw per location.
    Binomial,
    /// One uniform draw per particle.
    PerParticle,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct SteppingConfig {
    #[serde(default = "default_step_method")]
    pub method: StepMethod,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SpreadPolicy {
    /// Missing threshold crossings read as index 0.
    Legacy,
    /// Missing threshold crossings leave the frame without a spread value.
    Strict,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct SpreadConfig {
    #[serde(default = "default_spread_policy")]
    pub policy: SpreadPolicy,
}

// Configuration for output settings
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct OutputConfig {
    #[serde(default = "default_base_filename")]
    pub base_filename: String,
    #[serde(default = "default_true")]
    pub save_profiles: bool,
    #[serde(default = "default_true")]
    pub save_spread: bool,
    #[serde(default = "default_true")]
    pub save_summary: bool,
}

fn default_locations() -> usize { 2 * 350 }
fn default_max_points() -> u64 { 1000 }
fn default_seed() -> u64 { 1 }
fn default_frames() -> u32 { 10_000 }
fn default_progress_reports() -> u32 { 4 }
fn default_step_method() -> StepMethod { StepMethod::Binomial }
fn default_spread_policy() -> SpreadPolicy { SpreadPolicy::Legacy }
fn default_base_filename() -> String { "rw_diffusion".to_string() }
fn default_true() -> bool { true }

impl Default for LatticeConfig {
    fn default() -> Self {
        LatticeConfig { locations: default_locations() }
    }
}

impl Default for InitialConditions {
    fn default() -> Self {
        InitialConditions {
            max_points: default_max_points(),
            min_points: 0,
            seed: default_seed(),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        TimingConfig {
            frames: default_frames(),
            progress_reports: default_progress_reports(),
        }
    }
}

impl Default for SteppingConfig {
    fn default() -> Self {
        SteppingConfig { method: default_step_method() }
    }
}

impl Default for SpreadConfig {
    fn default() -> Self {
        SpreadConfig { policy: default_spread_policy() }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            base_filename: default_base_filename(),
            save_profiles: true,
            save_spread: true,
            save_summary: true,
        }
    }
}

// Main simulation configuration structure, loaded from config.toml.
// Every section may be omitted; missing sections take their defaults.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct SimulationConfig {
    #[serde(default)]
    pub lattice: LatticeConfig,
    #[serde(default)]
    pub initial_conditions: InitialConditions,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub stepping: SteppingConfig,
    #[serde(default)]
    pub spread: SpreadConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl SimulationConfig {
    /// Loads the simulation configuration from a TOML file and validates it.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();

        let config_str = std::fs::read_to_string(path_ref)
            .with_context(|| format!("Failed to read config file '{}'", path_ref.display()))?;
        Self::from_toml_str(&config_str)
            .with_context(|| format!("Invalid configuration in '{}'", path_ref.display()))
    }

    /// Parses and validates a configuration held in memory.
    pub fn from_toml_str(config_str: &str) -> Result<Self> {
        let config: SimulationConfig = toml::from_str(config_str)
            .map_err(|e| anyhow::anyhow!("Failed to parse TOML: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects configurations that cannot describe a two-block step profile.
    /// Runs before any randomness is consumed or per-frame storage is allocated.
    pub fn validate(&self) -> Result<()> {
        let locations = self.lattice.locations;
        if locations < 2 {
            anyhow::bail!("locations must be at least 2 (got {}).", locations);
        }
        if locations % 2 != 0 {
            anyhow::bail!("locations must be even to split into two halves (got {}).", locations);
        }
        self.total_particles()?;

        if self.timing.frames == 0 {
            warn!("frames is 0; the final profile will equal the initial profile.");
        }
        let ic = &self.initial_conditions;
        if ic.max_points == 0 && ic.min_points == 0 {
            warn!("Initial profile is empty; spread thresholds are never crossed.");
        }
        if ic.min_points > ic.max_points {
            warn!(
                "min_points ({}) exceeds max_points ({}); particles will drift leftwards.",
                ic.min_points, ic.max_points
            );
        }
        Ok(())
    }

    /// Total particle count of the initial profile, checked against `u64` overflow.
    pub fn total_particles(&self) -> Result<u64> {
        let half = (self.lattice.locations / 2) as u64;
        let ic = &self.initial_conditions;
        half.checked_mul(ic.max_points)
            .and_then(|left| half.checked_mul(ic.min_points).and_then(|right| left.checked_add(right)))
            .ok_or_else(|| anyhow::anyhow!(
                "Initial particle total overflows u64 ({} locations, {} / {} per location).",
                self.lattice.locations, ic.max_points, ic.min_points
            ))
    }

    /// Converts the configuration into simulation parameters used at runtime.
    /// Assumes `validate` has passed.
    pub fn get_sim_params(&self) -> SimParams {
        let locations = self.lattice.locations;
        let ic = &self.initial_conditions;
        let frames = self.timing.frames;

        // Reference scale for the spread thresholds is the initial plateau height.
        let peak_value = ic.max_points.max(ic.min_points);

        let progress_interval = if self.timing.progress_reports > 0 {
            (frames / self.timing.progress_reports).max(1)
        } else {
            0
        };

        SimParams {
            locations,
            half_locations: locations / 2,
            max_points: ic.max_points,
            min_points: ic.min_points,
            total_particles: self.total_particles().unwrap_or(u64::MAX),
            peak_value,
            thresholds: SpreadThresholds::from_peak(peak_value),
            frames,
            progress_interval,
            seed: ic.seed,
            method: self.stepping.method,
            policy: self.spread.policy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_takes_reference_defaults() {
        let config = SimulationConfig::from_toml_str("").unwrap();
        assert_eq!(config.lattice.locations, 700);
        assert_eq!(config.initial_conditions.max_points, 1000);
        assert_eq!(config.initial_conditions.min_points, 0);
        assert_eq!(config.initial_conditions.seed, 1);
        assert_eq!(config.timing.frames, 10_000);
        assert_eq!(config.stepping.method, StepMethod::Binomial);
        assert_eq!(config.spread.policy, SpreadPolicy::Legacy);
        assert!(config.output.save_summary);
    }

    #[test]
    fn parses_all_sections() {
        let text = r#"
            [lattice]
            locations = 40

            [initial_conditions]
            max_points = 200
            min_points = 20
            seed = 99

            [timing]
            frames = 500
            progress_reports = 5

            [stepping]
            method = "per_particle"

            [spread]
            policy = "strict"

            [output]
            base_filename = "trial"
            save_profiles = false
        "#;
        let config = SimulationConfig::from_toml_str(text).unwrap();
        assert_eq!(config.lattice.locations, 40);
        assert_eq!(config.initial_conditions.min_points, 20);
        assert_eq!(config.stepping.method, StepMethod::PerParticle);
        assert_eq!(config.spread.policy, SpreadPolicy::Strict);
        assert_eq!(config.output.base_filename, "trial");
        assert!(!config.output.save_profiles);
        assert!(config.output.save_spread);

        let params = config.get_sim_params();
        assert_eq!(params.half_locations, 20);
        assert_eq!(params.total_particles, 20 * 200 + 20 * 20);
        assert_eq!(params.peak_value, 200);
        assert_eq!(params.thresholds, SpreadThresholds { upper: 150.0, lower: 50.0 });
        assert_eq!(params.progress_interval, 100);
    }

    #[test]
    fn rejects_short_lattice() {
        let err = SimulationConfig::from_toml_str("[lattice]\nlocations = 1\n").unwrap_err();
        assert!(err.to_string().contains("at least 2"), "{err}");
    }

    #[test]
    fn rejects_odd_lattice() {
        let err = SimulationConfig::from_toml_str("[lattice]\nlocations = 7\n").unwrap_err();
        assert!(err.to_string().contains("even"), "{err}");
    }

    #[test]
    fn rejects_negative_counts_at_parse_time() {
        let err = SimulationConfig::from_toml_str("[initial_conditions]\nmax_points = -5\n").unwrap_err();
        assert!(err.to_string().contains("Failed to parse TOML"), "{err}");
    }

    #[test]
    fn rejects_overflowing_total() {
        let mut config = SimulationConfig::default();
        config.lattice.locations = 4;
        config.initial_conditions.max_points = u64::MAX;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("overflows"), "{err}");
    }

    #[test]
    fn zero_frames_is_accepted() {
        let config = SimulationConfig::from_toml_str("[timing]\nframes = 0\n").unwrap();
        let params = config.get_sim_params();
        assert_eq!(params.frames, 0);
        assert_eq!(params.progress_interval, 1);
    }

    #[test]
    fn progress_disabled_when_no_reports_requested() {
        let config = SimulationConfig::from_toml_str("[timing]\nprogress_reports = 0\n").unwrap();
        assert_eq!(config.get_sim_params().progress_interval, 0);
    }
}
