//! Compartment counts for one cohort at one instant, and the atomic
//! application of a step's worth of transitions. All transitions of a step
//! are accumulated against the previous step's counts and applied together,
//! so population conservation holds by construction and no reader ever
//! observes a half-applied step.

use crate::compartment::{Compartment, NUM_COMPARTMENTS};

/// How far below zero a deterministic compartment count may land before the
/// update is rejected as an invariant violation. Differences this small are
/// floating-point noise and are snapped back to zero.
pub const NEGATIVE_TOLERANCE: f64 = 1e-6;

/// Population counts in every disease compartment for one cohort.
/// `C` is `f64` in deterministic mode and `u64` in stochastic mode.
#[derive(Clone, Debug, PartialEq)]
pub struct CohortState<C> {
    counts: [C; NUM_COMPARTMENTS],
}

impl<C: Copy + Default + std::iter::Sum> CohortState<C> {
    pub fn empty() -> Self {
        CohortState {
            counts: [C::default(); NUM_COMPARTMENTS],
        }
    }

    pub fn get(&self, compartment: Compartment) -> C {
        self.counts[compartment.index()]
    }

    pub fn set(&mut self, compartment: Compartment, count: C) {
        self.counts[compartment.index()] = count;
    }

    /// Total population of the cohort; invariant across all steps.
    pub fn total(&self) -> C {
        self.counts.iter().copied().sum()
    }
}

impl CohortState<f64> {
    /// Applies one step's accumulated signed flows atomically. Every
    /// compartment is updated together from the previous step's counts.
    ///
    /// Rejects any update that would drive a compartment negative beyond
    /// [`NEGATIVE_TOLERANCE`]; a rejection signals a parameter or step-size
    /// error upstream, not a condition to clamp silently. On success, counts
    /// within tolerance of zero are snapped to exactly zero.
    pub fn apply_flows(
        &mut self,
        flows: &[f64; NUM_COMPARTMENTS],
    ) -> Result<(), (Compartment, String)> {
        let mut updated = self.counts;
        for compartment in Compartment::ALL {
            let i = compartment.index();
            let count = self.counts[i] + flows[i];
            if count < -NEGATIVE_TOLERANCE {
                return Err((
                    compartment,
                    format!(
                        "flow {} drives count {} negative",
                        flows[i], self.counts[i]
                    ),
                ));
            }
            updated[i] = count.max(0.0);
        }
        self.counts = updated;
        Ok(())
    }
}

impl CohortState<u64> {
    /// Applies one step's accumulated transition counts atomically: `out`
    /// and `into` hold, per compartment, the total counts leaving and
    /// entering during the step, all sampled against the previous step's
    /// counts.
    ///
    /// Rejects any update where a compartment's outflow exceeds its count.
    /// Binomial and multinomial draws are bounded by their trial count, so
    /// a rejection here is evidence of an implementation bug, not a
    /// transient condition.
    pub fn apply_moves(
        &mut self,
        out: &[u64; NUM_COMPARTMENTS],
        into: &[u64; NUM_COMPARTMENTS],
    ) -> Result<(), (Compartment, String)> {
        debug_assert_eq!(
            out.iter().sum::<u64>(),
            into.iter().sum::<u64>(),
            "transition counts must conserve population"
        );
        for compartment in Compartment::ALL {
            let i = compartment.index();
            if out[i] > self.counts[i] {
                return Err((
                    compartment,
                    format!("outflow {} exceeds count {}", out[i], self.counts[i]),
                ));
            }
        }
        for i in 0..NUM_COMPARTMENTS {
            self.counts[i] = self.counts[i] - out[i] + into[i];
        }
        Ok(())
    }
}
