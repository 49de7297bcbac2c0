//! Resolution of instantaneous per-capita rates for a given cohort and
//! simulation time. Stateless and referentially transparent: for a fixed
//! (time, cohort) pair the same rates come back every call, which is what
//! makes the deterministic and stochastic integrators comparable under
//! identical parameters.

use crate::compartment::Compartment;
use crate::params::{AgeCohort, ModelParameters};

/// The rates the integrators need at one instant, for one cohort.
/// All per day; all non-negative for validated parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InstantRates {
    /// Per-contact transmission rate β(t), from the externally supplied
    /// time-varying function.
    pub transmission: f64,
    /// Exposed → Infectious.
    pub latency: f64,
    /// Infectious → Recovered.
    pub recovery: f64,
    /// Infectious → Hospitalized.
    pub hospitalization: f64,
    /// Hospitalized → Discharged.
    pub discharge: f64,
    /// Hospitalized → Critical.
    pub critical: f64,
    /// Critical → Hospitalized (stabilizing).
    pub stabilization: f64,
    /// Critical → Dead.
    pub death: f64,
}

impl InstantRates {
    /// The competing exits from `source`, as (destination, per-capita rate)
    /// pairs in a fixed order. Susceptible is handled separately by the
    /// integrators (global force of infection plus imports), and the
    /// terminal compartments have no exits.
    pub fn exits(&self, source: Compartment) -> &'static [(Compartment, fn(&InstantRates) -> f64)] {
        match source {
            Compartment::Exposed => &[(Compartment::Infectious, |r| r.latency)],
            Compartment::Infectious => &[
                (Compartment::Recovered, |r| r.recovery),
                (Compartment::Hospitalized, |r| r.hospitalization),
            ],
            Compartment::Hospitalized => &[
                (Compartment::Discharged, |r| r.discharge),
                (Compartment::Critical, |r| r.critical),
            ],
            Compartment::Critical => &[
                (Compartment::Hospitalized, |r| r.stabilization),
                (Compartment::Dead, |r| r.death),
            ],
            Compartment::Susceptible
            | Compartment::Recovered
            | Compartment::Discharged
            | Compartment::Dead => &[],
        }
    }
}

/// Looks up, for a given simulation time and cohort, the instantaneous
/// values of all transition rates plus the time-varying transmission
/// scalar. Pure lookup over immutable parameters; no side effects.
#[derive(Clone, Copy)]
pub struct RateSchedule<'a> {
    params: &'a ModelParameters,
}

impl<'a> RateSchedule<'a> {
    pub fn new(params: &'a ModelParameters) -> Self {
        RateSchedule { params }
    }

    /// Rates for `cohort` at time `time` (days).
    ///
    /// # Panics
    ///
    /// Panics if `cohort` has no severity entry; `ModelParameters::validate`
    /// guarantees one exists for every cohort of the age distribution.
    pub fn instantaneous(&self, time: f64, cohort: &AgeCohort) -> InstantRates {
        let severity = self
            .params
            .severity
            .get(cohort)
            .unwrap_or_else(|| panic!("no severity entry for cohort {cohort}"));
        InstantRates {
            transmission: self.params.infection_rate.at(time),
            latency: self.params.latency_rate,
            recovery: severity.recovery,
            hospitalization: severity.hospitalization,
            discharge: severity.discharge,
            critical: severity.critical,
            stabilization: severity.stabilization,
            death: severity.death,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{AgeDistribution, BranchingPolicy, CohortRates, TransmissionRate};
    use indexmap::IndexMap;

    fn params() -> ModelParameters {
        let young = AgeCohort::new("0-9");
        let old = AgeCohort::new("80+");
        ModelParameters {
            age_distribution: [(young.clone(), 2.0), (old.clone(), 1.0)]
                .into_iter()
                .collect::<AgeDistribution>(),
            severity: IndexMap::from([
                (
                    young,
                    CohortRates {
                        recovery: 0.3,
                        hospitalization: 0.01,
                        ..CohortRates::default()
                    },
                ),
                (
                    old,
                    CohortRates {
                        recovery: 0.2,
                        hospitalization: 0.15,
                        death: 0.05,
                        ..CohortRates::default()
                    },
                ),
            ]),
            latency_rate: 0.2,
            avg_infection_rate: 0.6,
            infection_rate: TransmissionRate::from_fn(|t| if t < 10.0 { 0.6 } else { 0.3 }),
            population_served: 10_000.0,
            initial_cases: 5.0,
            imports_per_day: 0.0,
            import_cohort: None,
            t_min: 0.0,
            t_max: 20.0,
            time_step_days: 0.5,
            number_stochastic_runs: 0,
            seed: 0,
            branching: BranchingPolicy::Independent,
        }
    }

    #[test]
    fn rates_are_age_dependent() {
        let params = params();
        let schedule = RateSchedule::new(&params);
        let young = schedule.instantaneous(0.0, &AgeCohort::new("0-9"));
        let old = schedule.instantaneous(0.0, &AgeCohort::new("80+"));
        assert!(old.hospitalization > young.hospitalization);
        assert_eq!(young.death, 0.0);
        assert_eq!(old.death, 0.05);
    }

    #[test]
    fn transmission_follows_the_supplied_function() {
        let params = params();
        let schedule = RateSchedule::new(&params);
        let cohort = AgeCohort::new("0-9");
        assert_eq!(schedule.instantaneous(0.0, &cohort).transmission, 0.6);
        assert_eq!(schedule.instantaneous(15.0, &cohort).transmission, 0.3);
    }

    #[test]
    fn referentially_transparent() {
        let params = params();
        let schedule = RateSchedule::new(&params);
        let cohort = AgeCohort::new("80+");
        assert_eq!(
            schedule.instantaneous(3.5, &cohort),
            schedule.instantaneous(3.5, &cohort)
        );
    }

    #[test]
    fn exit_topology() {
        let params = params();
        let schedule = RateSchedule::new(&params);
        let rates = schedule.instantaneous(0.0, &AgeCohort::new("80+"));

        let infectious_exits = rates.exits(Compartment::Infectious);
        assert_eq!(infectious_exits.len(), 2);
        assert_eq!(infectious_exits[0].0, Compartment::Recovered);
        assert_eq!((infectious_exits[0].1)(&rates), 0.2);

        // Critical can stabilize back to Hospitalized
        let critical_exits = rates.exits(Compartment::Critical);
        assert_eq!(critical_exits[0].0, Compartment::Hospitalized);

        assert!(rates.exits(Compartment::Dead).is_empty());
        assert!(rates.exits(Compartment::Susceptible).is_empty());
    }
}
