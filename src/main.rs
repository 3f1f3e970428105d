use anyhow::{Context, Result};
use clap::Parser;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::time::Instant;
use env_logger::Builder;
use log::{info, warn, debug, trace, LevelFilter};

// Define modules used by main
mod engine;
mod lattice;
mod profile;
mod simulation;
mod spread;

use diffusion_common::{OutputConfig, ProfileRow, RunSummary, SimulationConfig};
use profile::Profile;
use simulation::DiffusionSimulation;

/// Command-line arguments for the diffusion run
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the TOML configuration
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logger
    with_default_level(Builder::from_default_env()).init();

    info!("Starting 1-D random-walk diffusion...");

    // --- Load Configuration ---
    let config = SimulationConfig::load(&args.config)?;

    // --- Initialize Simulation ---
    let mut sim = DiffusionSimulation::new(config)?;
    let params = sim.params().clone();
    info!("Total number of particles at start = {}", sim.initial_profile().total());
    debug!("Simulation Parameters: {:#?}", params);

    // --- Simulation Loop ---
    info!(
        "Starting simulation loop for {} frames ({:?} stepping, {:?} spread).",
        params.frames, params.method, params.policy
    );
    let start_time = Instant::now();

    while !sim.is_finished() {
        let frame = sim.current_frame();
        let step_start_time = Instant::now();
        let measure = sim
            .step()
            .with_context(|| format!("Simulation frame {} failed", frame + 1))?;
        let step_duration = step_start_time.elapsed();

        let frame_done = frame + 1;
        let is_progress_frame = params.progress_interval > 0
            && frame_done % params.progress_interval == 0
            && frame_done != params.frames;

        if is_progress_frame {
            info!(
                "{} out of {} frames; elapsed minutes = {:.2}",
                frame_done,
                params.frames,
                start_time.elapsed().as_secs_f64() / 60.0
            );
        } else {
            trace!(
                "Frame [{}/{}] completed in {:.3} ms (spread {:?}, legacy {})",
                frame_done,
                params.frames,
                step_duration.as_secs_f64() * 1000.0,
                measure.spread(),
                measure.legacy_spread()
            );
        }
    }

    let total_duration = start_time.elapsed();
    info!(
        "{} out of {} frames; minutes of calculation = {:.2}",
        sim.current_frame(),
        params.frames,
        total_duration.as_secs_f64() / 60.0
    );

    let unmeasured = sim.spread_series().strict_values().iter().filter(|v| v.is_none()).count();
    if unmeasured > 0 {
        warn!("{} of {} frames never crossed a spread threshold.", unmeasured, sim.spread_series().len());
    }

    // --- Statistics ---
    let summary = sim.summary(total_duration.as_secs_f64());
    info!("Total number of particles at end = {}", sim.profile().total());
    info!("Number of particles in first half = {}", summary.first_half_total);
    info!("Number of particles in second half = {}", summary.second_half_total);
    match summary.final_spread {
        Some(spread) => info!("Spread in final profile (3/4 to 1/4) = {}", spread),
        None => info!(
            "Spread in final profile (3/4 to 1/4) = none (threshold not crossed; legacy reading {})",
            summary.final_legacy_spread
        ),
    }

    // --- Save Recorded Data ---
    save_outputs(&sim, &summary, &sim.config().output)?;

    info!("Simulation Complete.");
    Ok(())
}

/// Sets info as the default level. RUST_LOG module directives (e.g. `rw_diffusion=trace`) still apply.
fn with_default_level(mut builder: Builder) -> Builder {
    builder.filter(None, LevelFilter::Info);
    builder
}

/// Writes the tables the visualizer reads, plus the run summary.
fn save_outputs(sim: &DiffusionSimulation, summary: &RunSummary, output: &OutputConfig) -> Result<()> {
    if output.save_profiles {
        let filename = format!("{}_profiles.csv", output.base_filename);
        write_csv(&filename, profile_rows(sim.initial_profile(), sim.profile()))?;
        info!("Initial and final profiles saved to {}", filename);
    } else {
        info!("Skipping saving profiles as per config.");
    }

    if output.save_spread {
        let filename = format!("{}_spread.csv", output.base_filename);
        write_csv(&filename, sim.spread_rows())?;
        info!("Spread series saved to {}", filename);
    } else {
        info!("Skipping saving spread series as per config.");
    }

    if output.save_summary {
        let filename = format!("{}_summary.json", output.base_filename);
        let file = File::create(&filename)
            .with_context(|| format!("Failed to create summary file '{}'", filename))?;
        serde_json::to_writer_pretty(BufWriter::new(file), summary)
            .with_context(|| format!("Failed to write summary JSON to '{}'", filename))?;
        info!("Run summary saved to {}", filename);
    } else {
        info!("Skipping saving run summary as per config.");
    }
    Ok(())
}

/// Initial and final count for every location.
fn profile_rows(initial_profile: &Profile, final_profile: &Profile) -> Vec<ProfileRow> {
    initial_profile
        .counts()
        .iter()
        .zip(final_profile.counts())
        .enumerate()
        .map(|(location, (&initial, &final_count))| ProfileRow { location, initial, final_count })
        .collect()
}

fn write_csv<T: serde::Serialize>(filename: &str, rows: Vec<T>) -> Result<()> {
    let mut writer = csv::Writer::from_path(filename)
        .with_context(|| format!("Failed to create CSV file '{}'", filename))?;
    for row in rows {
        writer
            .serialize(row)
            .with_context(|| format!("Failed to write row to '{}'", filename))?;
    }
    writer.flush()?;
    Ok(())
}
