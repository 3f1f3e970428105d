use crate::lattice::moves_from;
use crate::profile::Profile;
use anyhow::Result;
use diffusion_common::StepMethod;
use rand::Rng;
use rand_distr::{Binomial, Distribution};

/// Probability that a unit takes the `low` move of its location.
const STEP_PROBABILITY: f64 = 0.5;

/// Advances a [`Profile`] one frame of an unbiased nearest-neighbour random walk
/// with reflecting ends.
///
/// The engine owns a scratch buffer the size of the lattice. Each step fills it
/// with the new counts and swaps it into the profile, so the previous frame's
/// counts end up as the next step's scratch and are never visible to the caller.
#[derive(Debug)]
pub struct DiffusionEngine {
    method: StepMethod,
    next: Vec<u64>,
}

impl DiffusionEngine {
    pub fn new(method: StepMethod, locations: usize) -> Self {
        Self {
            method,
            next: vec![0; locations],
        }
    }

    /// Redistributes every unit of `profile` to its destination for this frame.
    ///
    /// Draws from `rng` in location order, so a seeded source gives a reproducible
    /// frame sequence. Fails only if a destination count overflows or the binomial
    /// distribution rejects its parameters; the profile is left untouched in that case.
    pub fn step<R: Rng + ?Sized>(&mut self, profile: &mut Profile, rng: &mut R) -> Result<()> {
        let len = profile.len();
        if len < 2 {
            anyhow::bail!("Cannot step a profile with {} locations.", len);
        }
        // Profiles of a different length than the engine was built for are allowed.
        self.next.clear();
        self.next.resize(len, 0);

        for (j, &n) in profile.counts().iter().enumerate() {
            if n == 0 {
                continue;
            }
            let moves = moves_from(j, len);
            let low = self.split(n, rng)?;
            add_units(&mut self.next, moves.low, low)?;
            add_units(&mut self.next, moves.high, n - low)?;
        }

        profile.swap_buffers(&mut self.next);
        Ok(())
    }

    /// Number of the `n` units at one location whose draw falls below 1/2.
    fn split<R: Rng + ?Sized>(&self, n: u64, rng: &mut R) -> Result<u64> {
        match self.method {
            StepMethod::Binomial => {
                let dist = Binomial::new(n, STEP_PROBABILITY)
                    .map_err(|e| anyhow::anyhow!("Binomial({}, {}) rejected: {}", n, STEP_PROBABILITY, e))?;
                Ok(dist.sample(rng))
            }
            StepMethod::PerParticle => {
                let mut low = 0;
                for _ in 0..n {
                    if rng.random::<f64>() < STEP_PROBABILITY {
                        low += 1;
                    }
                }
                Ok(low)
            }
        }
    }
}

#[inline]
fn add_units(next: &mut [u64], idx: usize, units: u64) -> Result<()> {
    next[idx] = next[idx]
        .checked_add(units)
        .ok_or_else(|| anyhow::anyhow!("Particle count overflow at location {}.", idx))?;
    Ok(())
}
