pub mod config;
pub mod records;
pub mod sim_params;

// Re-export key types for easier use by dependent crates
pub use config::{
    InitialConditions, LatticeConfig, OutputConfig, SimulationConfig, SpreadConfig, SpreadPolicy,
    StepMethod, SteppingConfig, TimingConfig,
};
pub use records::{ProfileRow, RunSummary, SpreadRow};
pub use sim_params::{SimParams, SpreadThresholds};
