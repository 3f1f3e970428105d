use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Builder;
use log::{info, warn, LevelFilter};
use plotters::prelude::*;
use diffusion_common::{ProfileRow, SimulationConfig, SpreadRow};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

const TITLE: &str = "Simulation of 1-D Particle Diffusion Starting from a Step Distribution";
const GRAY: RGBColor = RGBColor(128, 128, 128);

/// Command-line arguments for the visualizer
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Profile table written by the simulation (<base>_profiles.csv)
    #[arg(long, default_value = "rw_diffusion_profiles.csv")]
    profiles: PathBuf,

    /// Spread table written by the simulation (<base>_spread.csv)
    #[arg(long, default_value = "rw_diffusion_spread.csv")]
    spread: PathBuf,

    /// Output image for the initial/final profile plot
    #[arg(long, default_value = "diffusion_profile.png")]
    profile_output: PathBuf,

    /// Output image for the spread-vs-frame plot
    #[arg(long, default_value = "diffusion_spread.png")]
    spread_output: PathBuf,

    /// Optional path to the config.toml used for the run, for exact axis limits
    #[arg(long)]
    config: Option<PathBuf>,

    /// Width of each image in pixels
    #[arg(long, default_value_t = 1024)]
    width: u32,

    /// Height of each image in pixels
    #[arg(long, default_value_t = 768)]
    height: u32,
}

/// Axis limits for both plots.
#[derive(Debug, Clone, Copy, PartialEq)]
struct PlotBounds {
    locations: f64,
    profile_y_max: f64,
    frames: f64,
    spread_y_max: f64,
}

impl PlotBounds {
    /// Profile plot spans 1.2x the plateau; spread plot spans 1.6 sqrt(frames).
    fn new(locations: usize, max_points: u64, frames: u32) -> Self {
        Self {
            locations: locations as f64,
            profile_y_max: (1.2 * max_points as f64).max(1.0),
            frames: frames.max(1) as f64,
            spread_y_max: (1.6 * (frames as f64).sqrt()).max(1.0),
        }
    }

    /// Falls back on the tables themselves when no config is given.
    fn from_rows(profile_rows: &[ProfileRow], spread_rows: &[SpreadRow]) -> Self {
        let max_points = profile_rows.iter().map(|r| r.initial).max().unwrap_or(0);
        Self::new(profile_rows.len(), max_points, spread_rows.len() as u32)
    }
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    run_with_args(args)
}

fn run_with_args(args: Args) -> Result<()> {
    // Initialize logger
    Builder::from_default_env()
        .filter(None, LevelFilter::Info)
        .init();

    info!("Starting Diffusion Visualizer...");
    info!("Profile table: {}", args.profiles.display());
    info!("Spread table: {}", args.spread.display());

    let profile_rows = read_rows::<ProfileRow, _>(open(&args.profiles)?)
        .with_context(|| format!("Failed to read profile table {}", args.profiles.display()))?;
    let spread_rows = read_rows::<SpreadRow, _>(open(&args.spread)?)
        .with_context(|| format!("Failed to read spread table {}", args.spread.display()))?;
    info!("Loaded {} locations and {} frames.", profile_rows.len(), spread_rows.len());

    // --- Determine Axis Limits ---
    let bounds = if let Some(config_path) = &args.config {
        match SimulationConfig::load(config_path) {
            Ok(config) => {
                info!("Loaded axis limits from {}", config_path.display());
                let params = config.get_sim_params();
                PlotBounds::new(params.locations, params.max_points, params.frames)
            }
            Err(e) => {
                warn!(
                    "Failed to load config file '{}': {}. Deriving limits from the tables.",
                    config_path.display(),
                    e
                );
                PlotBounds::from_rows(&profile_rows, &spread_rows)
            }
        }
    } else {
        PlotBounds::from_rows(&profile_rows, &spread_rows)
    };

    let size = (args.width, args.height);
    plot_profiles(&profile_rows, &bounds, &args.profile_output, size)?;
    info!("Profile plot saved to: {}", args.profile_output.display());

    plot_spread(&spread_rows, &bounds, &args.spread_output, size)?;
    info!("Spread plot saved to: {}", args.spread_output.display());

    Ok(())
}

fn open(path: &Path) -> Result<BufReader<File>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open input file: {}", path.display()))?;
    Ok(BufReader::new(file))
}

/// Deserializes every row of a headed CSV table.
fn read_rows<T, R>(reader: R) -> Result<Vec<T>>
where
    T: serde::de::DeserializeOwned,
    R: Read,
{
    let mut csv_reader = csv::Reader::from_reader(reader);
    let mut rows = Vec::new();
    for (i, record) in csv_reader.deserialize().enumerate() {
        let row: T = record.with_context(|| format!("Malformed row {}", i + 1))?;
        rows.push(row);
    }
    Ok(rows)
}

/// Spread points to draw. Frames without a value under the run's policy are skipped.
fn spread_points(rows: &[SpreadRow]) -> Vec<(f64, f64)> {
    rows.iter()
        .filter_map(|r| r.spread.map(|s| (r.frame as f64, s as f64)))
        .collect()
}

/// Initial profile as a gray line, final profile as black dots.
fn plot_profiles(rows: &[ProfileRow], bounds: &PlotBounds, path: &Path, size: (u32, u32)) -> Result<()> {
    let root = BitMapBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE).map_err(|e| anyhow::anyhow!("Failed to clear canvas: {}", e))?;

    let mut chart = ChartBuilder::on(&root)
        .caption(TITLE, ("sans-serif", 20))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(0f64..bounds.locations, 0f64..bounds.profile_y_max)
        .map_err(|e| anyhow::anyhow!("Failed to build profile chart: {}", e))?;

    chart
        .configure_mesh()
        .x_desc("X Location")
        .y_desc("Number of Particles")
        .draw()
        .map_err(|e| anyhow::anyhow!("Failed to draw profile axes: {}", e))?;

    chart
        .draw_series(LineSeries::new(
            rows.iter().map(|r| (r.location as f64, r.initial as f64)),
            &GRAY,
        ))
        .map_err(|e| anyhow::anyhow!("Failed to draw initial profile: {}", e))?;

    chart
        .draw_series(
            rows.iter()
                .map(|r| Circle::new((r.location as f64, r.final_count as f64), 2, BLACK.filled())),
        )
        .map_err(|e| anyhow::anyhow!("Failed to draw final profile: {}", e))?;

    root.present()
        .map_err(|e| anyhow::anyhow!("Failed to write profile plot to {}: {}", path.display(), e))?;
    Ok(())
}

/// Spread of every frame as small black dots.
fn plot_spread(rows: &[SpreadRow], bounds: &PlotBounds, path: &Path, size: (u32, u32)) -> Result<()> {
    let points = spread_points(rows);
    if points.len() < rows.len() {
        warn!("{} frames have no spread value and are not drawn.", rows.len() - points.len());
    }

    let root = BitMapBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE).map_err(|e| anyhow::anyhow!("Failed to clear canvas: {}", e))?;

    let mut chart = ChartBuilder::on(&root)
        .caption(TITLE, ("sans-serif", 20))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(0f64..bounds.frames, 0f64..bounds.spread_y_max)
        .map_err(|e| anyhow::anyhow!("Failed to build spread chart: {}", e))?;

    chart
        .configure_mesh()
        .x_desc("Frame Number (Time)")
        .y_desc("Spread of Profile (3/4 to 1/4)")
        .draw()
        .map_err(|e| anyhow::anyhow!("Failed to draw spread axes: {}", e))?;

    chart
        .draw_series(points.into_iter().map(|p| Circle::new(p, 1, BLACK.filled())))
        .map_err(|e| anyhow::anyhow!("Failed to draw spread series: {}", e))?;

    root.present()
        .map_err(|e| anyhow::anyhow!("Failed to write spread plot to {}: {}", path.display(), e))?;
    Ok(())
}
