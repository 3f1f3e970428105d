//! Width of the transition band between the full and the empty side of a profile.
//!
//! The spread of a profile is the distance from the first location below 3/4 of
//! the initial peak to the first location below 1/4 of it. Two readings are kept
//! for every frame:
//!
//! - the strict reading, which is absent when either threshold is never crossed;
//! - the legacy reading, produced by a scan whose indices start at 0 and are
//!   overwritten while they still read 0. A threshold that is never crossed then
//!   reads as location 0, and a crossing at location 0 itself is overwritten by
//!   the next crossing further right. Reports that must match earlier runs use it.

use crate::profile::Profile;
use anyhow::Result;
use diffusion_common::{SpreadPolicy, SpreadThresholds};

/// Threshold crossings of one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpreadMeasure {
    /// First location below 3/4 of peak.
    pub upper_crossing: Option<usize>,
    /// First location below 1/4 of peak.
    pub lower_crossing: Option<usize>,
    /// Result of the zero-sentinel scan.
    pub legacy: i64,
}

impl SpreadMeasure {
    /// `lower - upper` when both thresholds were crossed.
    pub fn spread(&self) -> Option<i64> {
        match (self.upper_crossing, self.lower_crossing) {
            (Some(upper), Some(lower)) => Some(lower as i64 - upper as i64),
            _ => None,
        }
    }

    pub fn legacy_spread(&self) -> i64 {
        self.legacy
    }

    /// The reading selected by `policy`.
    pub fn reported(&self, policy: SpreadPolicy) -> Option<i64> {
        match policy {
            SpreadPolicy::Legacy => Some(self.legacy),
            SpreadPolicy::Strict => self.spread(),
        }
    }
}

/// Measures `profile` against `thresholds`. A count equal to a threshold is not a crossing.
pub fn spread_of(profile: &Profile, thresholds: SpreadThresholds) -> SpreadMeasure {
    let counts = profile.counts();
    let below = |c: u64, t: f64| (c as f64) < t;

    SpreadMeasure {
        upper_crossing: counts.iter().position(|&c| below(c, thresholds.upper)),
        lower_crossing: counts.iter().position(|&c| below(c, thresholds.lower)),
        legacy: legacy_scan(counts, thresholds),
    }
}

// Zero doubles as "not yet found", so a hit at location 0 does not latch.
fn legacy_scan(counts: &[u64], thresholds: SpreadThresholds) -> i64 {
    let mut idx_upper = 0usize;
    let mut idx_lower = 0usize;
    for (j, &c) in counts.iter().enumerate() {
        if idx_upper == 0 && (c as f64) < thresholds.upper {
            idx_upper = j;
        }
        if idx_lower == 0 && (c as f64) < thresholds.lower {
            idx_lower = j;
        }
    }
    idx_lower as i64 - idx_upper as i64
}

/// Append-only per-frame spread history.
#[derive(Debug, Clone)]
pub struct SpreadSeries {
    measures: Vec<SpreadMeasure>,
    frames: usize,
}

impl SpreadSeries {
    /// Reserves one slot per configured frame.
    pub fn with_frames(frames: usize) -> Self {
        Self {
            measures: Vec::with_capacity(frames),
            frames,
        }
    }

    fn push(&mut self, measure: SpreadMeasure) -> Result<()> {
        if self.measures.len() >= self.frames {
            anyhow::bail!("Spread series is full ({} frames configured).", self.frames);
        }
        self.measures.push(measure);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.measures.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.measures.is_empty()
    }

    pub fn measures(&self) -> &[SpreadMeasure] {
        &self.measures
    }

    pub fn last(&self) -> Option<&SpreadMeasure> {
        self.measures.last()
    }

    #[cfg(test)]
    pub fn legacy_values(&self) -> Vec<i64> {
        self.measures.iter().map(SpreadMeasure::legacy_spread).collect()
    }

    pub fn strict_values(&self) -> Vec<Option<i64>> {
        self.measures.iter().map(SpreadMeasure::spread).collect()
    }
}

/// Records the spread of each frame against thresholds fixed from the initial peak.
#[derive(Debug, Clone)]
pub struct SpreadTracker {
    thresholds: SpreadThresholds,
    policy: SpreadPolicy,
    series: SpreadSeries,
}

impl SpreadTracker {
    pub fn new(thresholds: SpreadThresholds, policy: SpreadPolicy, frames: usize) -> Self {
        Self {
            thresholds,
            policy,
            series: SpreadSeries::with_frames(frames),
        }
    }

    /// Measures `profile` and appends the result. Fails once every configured frame is recorded.
    pub fn record(&mut self, profile: &Profile) -> Result<SpreadMeasure> {
        let measure = spread_of(profile, self.thresholds);
        self.series.push(measure)?;
        Ok(measure)
    }

    pub fn thresholds(&self) -> SpreadThresholds {
        self.thresholds
    }

    pub fn policy(&self) -> SpreadPolicy {
        self.policy
    }

    pub fn series(&self) -> &SpreadSeries {
        &self.series
    }
}
