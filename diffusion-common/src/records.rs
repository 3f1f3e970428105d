use serde::{Deserialize, Serialize};
use crate::config::{SpreadPolicy, StepMethod};

/// One row of the exported profile table: the particle count at a location
/// at the start and at the end of the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileRow {
    pub location: usize,
    pub initial: u64,
    #[serde(rename = "final")]
    pub final_count: u64,
}

/// One row of the exported spread table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpreadRow {
    /// Zero-based frame number.
    pub frame: u32,
    /// Spread under the configured policy. Empty when the strict policy has no value.
    pub spread: Option<i64>,
    /// Spread from the zero-sentinel scan, always present.
    pub legacy_spread: i64,
    /// First location below 3/4 of peak.
    pub upper_crossing: Option<usize>,
    /// First location below 1/4 of peak.
    pub lower_crossing: Option<usize>,
}

/// End-of-run statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub locations: usize,
    pub frames: u32,
    pub seed: u64,
    pub method: StepMethod,
    pub policy: SpreadPolicy,
    pub initial_total: u64,
    pub final_total: u64,
    pub first_half_total: u64,
    pub second_half_total: u64,
    /// Spread of the final profile under the configured policy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_spread: Option<i64>,
    pub final_legacy_spread: i64,
    pub elapsed_seconds: f64,
}
