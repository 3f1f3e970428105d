use crate::engine::DiffusionEngine;
use crate::profile::Profile;
use crate::spread::{spread_of, SpreadMeasure, SpreadSeries, SpreadTracker};
use anyhow::Result;
use diffusion_common::{RunSummary, SimParams, SimulationConfig, SpreadRow};
use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Runs the step-distribution diffusion experiment: one live profile, a frozen
/// copy of the initial profile, and the spread of every frame.
pub struct DiffusionSimulation<R = StdRng> {
    /// The simulation configuration.
    config: SimulationConfig,
    /// Runtime parameters derived from `config`.
    params: SimParams,
    /// Source of every random draw of the run.
    rng: R,
    /// Number of frames stepped so far.
    current_frame: u32,
    engine: DiffusionEngine,
    profile: Profile,
    initial_profile: Profile,
    tracker: SpreadTracker,
}

impl DiffusionSimulation<StdRng> {
    /// Validates `config` and seeds the run's RNG from `initial_conditions.seed`.
    pub fn new(config: SimulationConfig) -> Result<Self> {
        let rng = StdRng::seed_from_u64(config.initial_conditions.seed);
        Self::with_rng(config, rng)
    }
}

impl<R: Rng> DiffusionSimulation<R> {
    /// Builds a simulation that draws from `rng` instead of the configured seed.
    /// The config is validated before the profile or the spread series is allocated.
    pub fn with_rng(config: SimulationConfig, rng: R) -> Result<Self> {
        config.validate()?;
        let params = config.get_sim_params();

        let profile = Profile::step_distribution(params.locations, params.max_points, params.min_points)?;
        let initial_profile = profile.clone();
        debug!(
            "Initial profile: {} locations, {} particles, peak {}",
            profile.len(),
            profile.total(),
            profile.peak()
        );

        let engine = DiffusionEngine::new(params.method, params.locations);
        let tracker = SpreadTracker::new(params.thresholds, params.policy, params.frames as usize);

        Ok(Self {
            config,
            params,
            rng,
            current_frame: 0,
            engine,
            profile,
            initial_profile,
            tracker,
        })
    }

    /// Advances one frame and records its spread.
    /// Fails if the frame does not hold exactly the configured particle total.
    pub fn step(&mut self) -> Result<SpreadMeasure> {
        if self.is_finished() {
            anyhow::bail!("All {} configured frames have already been run.", self.params.frames);
        }
        self.engine.step(&mut self.profile, &mut self.rng)?;
        let total = self.profile.total();
        if total != self.params.total_particles {
            anyhow::bail!(
                "Frame {} holds {} particles, expected {}.",
                self.current_frame + 1,
                total,
                self.params.total_particles
            );
        }
        let measure = self.tracker.record(&self.profile)?;
        self.current_frame += 1;
        Ok(measure)
    }

    /// Steps until every configured frame has been recorded.
    #[cfg(test)]
    pub fn run_to_end(&mut self) -> Result<()> {
        while !self.is_finished() {
            self.step()?;
        }
        Ok(())
    }

    pub fn is_finished(&self) -> bool {
        self.current_frame >= self.params.frames
    }

    pub fn current_frame(&self) -> u32 {
        self.current_frame
    }

    pub fn params(&self) -> &SimParams {
        &self.params
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn initial_profile(&self) -> &Profile {
        &self.initial_profile
    }

    pub fn spread_series(&self) -> &SpreadSeries {
        self.tracker.series()
    }

    /// One row per recorded frame, with the spread reported under the configured policy.
    pub fn spread_rows(&self) -> Vec<SpreadRow> {
        let policy = self.tracker.policy();
        self.tracker
            .series()
            .measures()
            .iter()
            .enumerate()
            .map(|(frame, m)| SpreadRow {
                frame: frame as u32,
                spread: m.reported(policy),
                legacy_spread: m.legacy_spread(),
                upper_crossing: m.upper_crossing,
                lower_crossing: m.lower_crossing,
            })
            .collect()
    }

    /// Statistics of the run so far. Before the first frame the final spreads
    /// describe the initial profile.
    pub fn summary(&self, elapsed_seconds: f64) -> RunSummary {
        let final_measure = self
            .tracker
            .series()
            .last()
            .copied()
            .unwrap_or_else(|| spread_of(&self.profile, self.tracker.thresholds()));
        let (first_half_total, second_half_total) = self.profile.split_totals(self.params.half_locations);

        RunSummary {
            locations: self.params.locations,
            frames: self.current_frame,
            seed: self.params.seed,
            method: self.params.method,
            policy: self.params.policy,
            initial_total: self.initial_profile.total(),
            final_total: self.profile.total(),
            first_half_total,
            second_half_total,
            final_spread: final_measure.reported(self.params.policy),
            final_legacy_spread: final_measure.legacy_spread(),
            elapsed_seconds,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diffusion_common::{SpreadPolicy, StepMethod};

    fn config(locations: usize, max_points: u64, frames: u32, seed: u64) -> SimulationConfig {
        let mut config = SimulationConfig::default();
        config.lattice.locations = locations;
        config.initial_conditions.max_points = max_points;
        config.initial_conditions.min_points = 0;
        config.initial_conditions.seed = seed;
        config.timing.frames = frames;
        config
    }

    #[test]
    fn invalid_config_fails_before_running() {
        assert!(DiffusionSimulation::new(config(7, 10, 5, 1)).is_err());
        assert!(DiffusionSimulation::new(config(0, 10, 5, 1)).is_err());
    }

    #[test]
    fn every_frame_conserves_particles() {
        let mut sim = DiffusionSimulation::new(config(20, 300, 200, 11)).unwrap();
        let total = sim.initial_profile().total();
        assert_eq!(total, 3000);
        while !sim.is_finished() {
            sim.step().unwrap();
            assert_eq!(sim.profile().total(), total);
            assert_eq!(sim.profile().len(), 20);
        }
        assert_eq!(sim.spread_series().len(), 200);
        assert_eq!(sim.current_frame(), 200);
    }

    #[test]
    fn stepping_past_the_last_frame_fails() {
        let mut sim = DiffusionSimulation::new(config(4, 10, 1, 1)).unwrap();
        sim.step().unwrap();
        assert!(sim.step().is_err());
        assert_eq!(sim.spread_series().len(), 1);
    }

    #[test]
    fn same_seed_reproduces_profiles_and_series() {
        for method in [StepMethod::Binomial, StepMethod::PerParticle] {
            let mut cfg = config(30, 200, 150, 42);
            cfg.stepping.method = method;

            let mut a = DiffusionSimulation::new(cfg.clone()).unwrap();
            let mut b = DiffusionSimulation::new(cfg).unwrap();
            a.run_to_end().unwrap();
            b.run_to_end().unwrap();

            assert_eq!(a.profile(), b.profile());
            assert_eq!(a.spread_series().legacy_values(), b.spread_series().legacy_values());
            assert_eq!(a.spread_series().strict_values(), b.spread_series().strict_values());
        }
    }

    #[test]
    fn different_seeds_diverge() {
        let mut a = DiffusionSimulation::new(config(30, 200, 50, 1)).unwrap();
        let mut b = DiffusionSimulation::new(config(30, 200, 50, 2)).unwrap();
        a.run_to_end().unwrap();
        b.run_to_end().unwrap();
        assert_ne!(a.profile(), b.profile());
    }

    #[test]
    fn four_location_reference_run() {
        let run = || {
            let mut sim = DiffusionSimulation::new(config(4, 1000, 1, 7)).unwrap();
            assert_eq!(sim.initial_profile().counts(), &[1000, 1000, 0, 0]);
            let measure = sim.step().unwrap();
            (sim.profile().clone(), measure)
        };
        let (profile, measure) = run();
        assert_eq!(profile.total(), 2000);
        assert_eq!(profile.counts()[3], 0);
        // Location 3 is always empty after one step, so the lower threshold is crossed.
        assert!(measure.lower_crossing.is_some());
        assert_eq!(run(), (profile, measure));
    }

    #[test]
    fn zero_frames_leaves_initial_profile() {
        let mut sim = DiffusionSimulation::new(config(10, 100, 0, 3)).unwrap();
        assert!(sim.is_finished());
        sim.run_to_end().unwrap();
        assert_eq!(sim.profile(), sim.initial_profile());
        assert!(sim.spread_series().is_empty());
        assert!(sim.spread_rows().is_empty());

        let summary = sim.summary(0.0);
        assert_eq!(summary.frames, 0);
        assert_eq!(summary.final_total, summary.initial_total);
        assert_eq!(summary.final_spread, Some(0));
    }

    #[test]
    fn injected_rng_drives_the_run() {
        let cfg = config(12, 50, 25, 0);
        let mut a = DiffusionSimulation::with_rng(cfg.clone(), StdRng::seed_from_u64(5)).unwrap();
        let mut b = DiffusionSimulation::with_rng(cfg, StdRng::seed_from_u64(5)).unwrap();
        a.run_to_end().unwrap();
        b.run_to_end().unwrap();
        assert_eq!(a.profile(), b.profile());
    }

    #[test]
    fn spread_grows_on_average() {
        let frames = 400;
        let seeds = 20;
        let mut early = 0i64;
        let mut late = 0i64;
        for seed in 0..seeds {
            let mut sim = DiffusionSimulation::new(config(100, 1000, frames, seed)).unwrap();
            sim.run_to_end().unwrap();
            let values = sim.spread_series().legacy_values();
            early += values[..50].iter().sum::<i64>();
            late += values[350..].iter().sum::<i64>();
        }
        assert!(late > 2 * early, "early {} late {}", early, late);
    }

    #[test]
    fn rows_and_summary_follow_the_policy() {
        let mut cfg = config(8, 100, 10, 9);
        cfg.spread.policy = SpreadPolicy::Strict;
        let mut sim = DiffusionSimulation::new(cfg).unwrap();
        sim.run_to_end().unwrap();

        let spread_rows = sim.spread_rows();
        assert_eq!(spread_rows.len(), 10);
        for (row, m) in spread_rows.iter().zip(sim.spread_series().measures()) {
            assert_eq!(row.spread, m.spread());
            assert_eq!(row.legacy_spread, m.legacy_spread());
        }

        let summary = sim.summary(1.5);
        assert_eq!(summary.policy, SpreadPolicy::Strict);
        assert_eq!(summary.final_total, 400);
        assert_eq!(summary.first_half_total + summary.second_half_total, 400);
        assert_eq!(
            (summary.first_half_total, summary.second_half_total),
            sim.profile().split_totals(sim.params().half_locations)
        );
        assert_eq!(summary.final_spread, spread_rows[9].spread);
    }

    #[test]
    fn tracker_uses_the_configured_thresholds() {
        let mut sim = DiffusionSimulation::new(config(20, 400, 30, 4)).unwrap();
        let thresholds = sim.params().thresholds;
        assert_eq!(thresholds.upper, 300.0);
        assert_eq!(thresholds.lower, 100.0);
        while !sim.is_finished() {
            let measure = sim.step().unwrap();
            assert_eq!(measure, spread_of(sim.profile(), thresholds));
        }
    }

    #[test]
    fn particle_total_mismatch_stops_the_run() {
        let mut sim = DiffusionSimulation::new(config(6, 100, 5, 2)).unwrap();
        assert_eq!(sim.params().total_particles, 300);
        sim.step().unwrap();

        sim.params.total_particles += 1;
        let err = sim.step().unwrap_err();
        assert!(err.to_string().contains("expected 301"), "{err}");
        assert_eq!(sim.spread_series().len(), 1);
        assert_eq!(sim.current_frame(), 1);
    }
}
