//! Forward-Euler integration of the age-structured rate system. Each step
//! computes `rate × source count × Δt` for every transition against the
//! previous step's counts, then applies all signed flows at once, so the
//! update is order-independent within a step.

use log::{trace, warn};

use crate::cohort::CohortState;
use crate::compartment::{Compartment, NUM_COMPARTMENTS};
use crate::error::EpirunError;
use crate::params::{AgeCohort, BranchingPolicy, ModelParameters};
use crate::rates::RateSchedule;

// Relative overdraw below which a clamp is considered floating-point noise.
const CLAMP_SLACK: f64 = 1e-9;

/// Advances the full set of per-cohort states by one time step using
/// continuous (real-valued) transition amounts.
///
/// Numerical-stability policy: Δt is caller-controlled and never adapted.
/// A transition whose computed amount exceeds the still-available source
/// population is clamped to the available amount; every clamp is logged
/// and counted, so a too-coarse step is observable rather than silently
/// corrected.
pub struct DeterministicIntegrator<'a> {
    params: &'a ModelParameters,
    schedule: RateSchedule<'a>,
    clamped_transitions: u64,
}

impl<'a> DeterministicIntegrator<'a> {
    pub fn new(params: &'a ModelParameters) -> Self {
        DeterministicIntegrator {
            params,
            schedule: RateSchedule::new(params),
            clamped_transitions: 0,
        }
    }

    /// Number of transition amounts clamped so far (non-fatal warnings).
    pub fn clamped_transitions(&self) -> u64 {
        self.clamped_transitions
    }

    /// Takes `amount` out of the source's still-available population,
    /// clamping to what is left. The clamp is the explicit fallback of the
    /// step-size policy, not silent data loss.
    fn drain(
        &mut self,
        available: &mut f64,
        amount: f64,
        time: f64,
        cohort: &AgeCohort,
        source: Compartment,
    ) -> f64 {
        if amount > *available {
            // Overdraws within floating-point noise are clamped but not
            // reported; only a genuinely oversized step is worth a warning.
            if amount - *available > CLAMP_SLACK * amount.max(1.0) {
                warn!(
                    "t={time} cohort {cohort}: {source} transition amount {amount} exceeds \
                     available {available}, clamping; consider a smaller time step",
                    available = *available
                );
                self.clamped_transitions += 1;
            }
            let drained = *available;
            *available = 0.0;
            drained
        } else {
            *available -= amount;
            amount
        }
    }

    /// Advances all cohorts from `time` to `time + Δt`. `states` is ordered
    /// like the age distribution's cohort set.
    pub fn step(
        &mut self,
        time: f64,
        cohorts: &[AgeCohort],
        states: &mut [CohortState<f64>],
    ) -> Result<(), EpirunError> {
        let dt = self.params.time_step_days;
        // The force of infection is global: all cohorts' infectious mix.
        let total_infectious: f64 = states
            .iter()
            .map(|state| state.get(Compartment::Infectious))
            .sum();
        let frac_infectious = total_infectious / self.params.population_served;
        let import_cohort = self.params.resolved_import_cohort().clone();

        for (cohort, state) in cohorts.iter().zip(states.iter_mut()) {
            let rates = self.schedule.instantaneous(time, cohort);
            let mut flows = [0.0; NUM_COMPARTMENTS];

            // New infections, distributed into Exposed proportionally to each
            // cohort's susceptible share (S appears as the factor here).
            let susceptible = state.get(Compartment::Susceptible);
            let mut available = susceptible;
            let infections = self.drain(
                &mut available,
                rates.transmission * susceptible * frac_infectious * dt,
                time,
                cohort,
                Compartment::Susceptible,
            );
            // Imported cases are exposures acquired elsewhere by members of
            // the designated cohort, so they leave its susceptible pool.
            let imports = if *cohort == import_cohort {
                self.drain(
                    &mut available,
                    self.params.imports_per_day * dt,
                    time,
                    cohort,
                    Compartment::Susceptible,
                )
            } else {
                0.0
            };
            flows[Compartment::Susceptible.index()] -= infections + imports;
            flows[Compartment::Exposed.index()] += infections + imports;

            for source in [
                Compartment::Exposed,
                Compartment::Infectious,
                Compartment::Hospitalized,
                Compartment::Critical,
            ] {
                let exits = rates.exits(source);
                let mut probabilities: Vec<f64> =
                    exits.iter().map(|(_, rate)| rate(&rates) * dt).collect();
                if self.params.branching == BranchingPolicy::Renormalized {
                    let total: f64 = probabilities.iter().sum();
                    if total > 1.0 {
                        for p in &mut probabilities {
                            *p /= total;
                        }
                    }
                }

                let count = state.get(source);
                let mut available = count;
                for ((destination, _), probability) in exits.iter().zip(probabilities) {
                    let amount =
                        self.drain(&mut available, probability * count, time, cohort, source);
                    flows[source.index()] -= amount;
                    flows[destination.index()] += amount;
                }
            }

            state
                .apply_flows(&flows)
                .map_err(|(compartment, detail)| EpirunError::InvariantViolation {
                    time,
                    cohort: cohort.clone(),
                    compartment,
                    detail,
                })?;
        }
        trace!("deterministic step t={time} -> t={}", time + dt);
        Ok(())
    }
}
