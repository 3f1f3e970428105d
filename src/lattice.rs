/// Where the units leaving one location go.
///
/// `low` receives the units whose uniform draw was below 1/2, `high` the rest.
/// At the two ends the off-lattice move collapses into staying put (reflecting boundary).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Moves {
    pub low: usize,
    pub high: usize,
}

// Destinations for units leaving location `j` on a lattice of `len` locations.
#[inline(always)]
pub fn moves_from(j: usize, len: usize) -> Moves {
    debug_assert!(len >= 2 && j < len);
    if j == 0 {
        // Stay, or step right
        Moves { low: 0, high: 1 }
    } else if j == len - 1 {
        // Stay, or step left
        Moves { low: j, high: j - 1 }
    } else {
        Moves { low: j - 1, high: j + 1 }
    }
}
