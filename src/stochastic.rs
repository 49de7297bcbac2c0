//! Stochastic integration: identical transition topology to the
//! deterministic integrator, but every transition amount is a random count
//! whose mean equals the deterministic amount and whose sample space is
//! bounded by the available source population. Single transitions are
//! binomial draws with trial count = source count and success probability
//! `rate × Δt`; competing exits from one compartment are a multinomial
//! draw (over the destinations plus "stay") realized as conditional
//! binomials. Counts therefore remain non-negative integers by
//! construction.

use log::{trace, warn};
use rand::rngs::StdRng;
use rand_distr::{Binomial, Distribution, Poisson};

use crate::cohort::CohortState;
use crate::compartment::{Compartment, NUM_COMPARTMENTS};
use crate::error::EpirunError;
use crate::params::{AgeCohort, BranchingPolicy, ModelParameters};
use crate::rates::RateSchedule;

// Excess over 1 below which a truncated probability is considered
// floating-point noise.
const CLAMP_SLACK: f64 = 1e-9;

/// Advances a population of per-cohort states by one time step using
/// discretely sampled transition counts. Each ensemble member owns one
/// integrator and with it one explicitly seeded random stream; nothing is
/// shared between members, which keeps trajectories statistically
/// independent and runs reproducible under a fixed seed.
pub struct StochasticIntegrator<'a> {
    params: &'a ModelParameters,
    schedule: RateSchedule<'a>,
    rng: StdRng,
    clamped_transitions: u64,
}

impl<'a> StochasticIntegrator<'a> {
    pub fn new(params: &'a ModelParameters, rng: StdRng) -> Self {
        StochasticIntegrator {
            params,
            schedule: RateSchedule::new(params),
            rng,
            clamped_transitions: 0,
        }
    }

    /// Number of exit probabilities truncated to 1 so far. Mirrors the
    /// deterministic clamp counter: non-zero means the step is too coarse
    /// for the rate tables.
    pub fn clamped_transitions(&self) -> u64 {
        self.clamped_transitions
    }

    /// A binomial draw with the probability truncated into [0, 1]. The
    /// truncation is the stochastic analogue of the deterministic clamp
    /// policy and is reported the same way.
    fn draw_binomial(
        &mut self,
        trials: u64,
        probability: f64,
        time: f64,
        cohort: &AgeCohort,
        source: Compartment,
    ) -> u64 {
        if trials == 0 || probability <= 0.0 {
            return 0;
        }
        if probability >= 1.0 {
            if probability - 1.0 > CLAMP_SLACK {
                warn!(
                    "t={time} cohort {cohort}: {source} exit probability {probability} \
                     exceeds 1, truncating; consider a smaller time step"
                );
                self.clamped_transitions += 1;
            }
            return trials;
        }
        let binomial = Binomial::new(trials, probability).expect("probability is in (0, 1)");
        binomial.sample(&mut self.rng)
    }

    /// Advances all cohorts from `time` to `time + Δt`. `states` is ordered
    /// like the age distribution's cohort set.
    pub fn step(
        &mut self,
        time: f64,
        cohorts: &[AgeCohort],
        states: &mut [CohortState<u64>],
    ) -> Result<(), EpirunError> {
        let dt = self.params.time_step_days;
        let total_infectious: u64 = states
            .iter()
            .map(|state| state.get(Compartment::Infectious))
            .sum();
        #[allow(clippy::cast_precision_loss)]
        let frac_infectious = total_infectious as f64 / self.params.population_served;
        let import_cohort = self.params.resolved_import_cohort().clone();

        for (cohort, state) in cohorts.iter().zip(states.iter_mut()) {
            let rates = self.schedule.instantaneous(time, cohort);
            let mut out = [0u64; NUM_COMPARTMENTS];
            let mut into = [0u64; NUM_COMPARTMENTS];

            // New infections: binomial over this cohort's susceptibles with
            // the globally mixed force of infection.
            let susceptible = state.get(Compartment::Susceptible);
            let infections = self.draw_binomial(
                susceptible,
                rates.transmission * frac_infectious * dt,
                time,
                cohort,
                Compartment::Susceptible,
            );
            // Imported cases: Poisson with the configured daily mean, capped
            // by the susceptibles the infections above left behind.
            let mut imports = 0;
            if *cohort == import_cohort && self.params.imports_per_day > 0.0 {
                let poisson = Poisson::new(self.params.imports_per_day * dt)
                    .expect("import mean is positive and finite");
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let drawn = poisson.sample(&mut self.rng) as u64;
                imports = drawn.min(susceptible - infections);
            }
            out[Compartment::Susceptible.index()] += infections + imports;
            into[Compartment::Exposed.index()] += infections + imports;

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

                // Multinomial over (destinations..., stay) by conditioning:
                // each branch draws from those not yet claimed, with its
                // probability rescaled by the remaining probability mass.
                let mut remaining = state.get(source);
                let mut remaining_mass = 1.0;
                for ((destination, _), probability) in exits.iter().zip(probabilities) {
                    let conditional = if remaining_mass > 0.0 {
                        probability / remaining_mass
                    } else {
                        1.0
                    };
                    let drawn = self.draw_binomial(remaining, conditional, time, cohort, source);
                    out[source.index()] += drawn;
                    into[destination.index()] += drawn;
                    remaining -= drawn;
                    remaining_mass -= probability;
                }
            }

            state
                .apply_moves(&out, &into)
                .map_err(|(compartment, detail)| EpirunError::InvariantViolation {
                    time,
                    cohort: cohort.clone(),
                    compartment,
                    detail,
                })?;
        }
        trace!("stochastic step t={time} -> t={}", time + dt);
        Ok(())
    }

}
