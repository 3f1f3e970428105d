use anyhow::Result;

/// Particle counts per lattice location at one point in simulated time.
///
/// The length is fixed at construction. Counts are unsigned, so non-negativity
/// holds by construction; conservation is maintained by [`crate::engine::DiffusionEngine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    counts: Vec<u64>,
}

impl Profile {
    /// Builds the step distribution: `high` particles on each location of the
    /// left half, `low` on each location of the right half.
    pub fn step_distribution(locations: usize, high: u64, low: u64) -> Result<Self> {
        if locations < 2 || locations % 2 != 0 {
            anyhow::bail!("Step profile needs an even number of locations >= 2 (got {}).", locations);
        }
        let half = locations / 2;
        let mut counts = vec![high; half];
        counts.resize(locations, low);
        Ok(Self { counts })
    }

    /// Wraps arbitrary counts. Any length >= 2 is accepted.
    #[cfg(test)]
    pub fn from_counts(counts: Vec<u64>) -> Result<Self> {
        if counts.len() < 2 {
            anyhow::bail!("Profile needs at least 2 locations (got {}).", counts.len());
        }
        Ok(Self { counts })
    }

    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Total particle count. Cannot overflow for profiles built from a validated config.
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Largest count at any location.
    pub fn peak(&self) -> u64 {
        self.counts.iter().copied().max().unwrap_or(0)
    }

    /// Totals of the locations before `at` and from `at` on. `at` is clamped to the length.
    pub fn split_totals(&self, at: usize) -> (u64, u64) {
        let (left, right) = self.counts.split_at(at.min(self.counts.len()));
        (left.iter().sum(), right.iter().sum())
    }

    /// Exchanges the live counts with `next`. After the call `next` holds the
    /// previous frame's counts and may be reused as scratch.
    pub(crate) fn swap_buffers(&mut self, next: &mut Vec<u64>) {
        debug_assert_eq!(self.counts.len(), next.len());
        std::mem::swap(&mut self.counts, next);
    }
}
