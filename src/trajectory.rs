//! Reported simulation snapshots. A `SimulationTimePoint` is the
//! load-bearing exchange shape for every consumer: a timestamp plus, for
//! each compartment, a cohort-label → count map with a synthetic `"total"`
//! key equal to the sum over all cohorts. Produced once per time step,
//! immutable after creation.

use indexmap::IndexMap;
use serde::Serialize;

use crate::cohort::CohortState;
use crate::compartment::Compartment;
use crate::params::AgeCohort;

/// The synthetic key summing all cohorts of one compartment.
pub const TOTAL_KEY: &str = "total";

/// One full time-ordered sequence of simulation snapshots.
pub type Trajectory = Vec<SimulationTimePoint>;

/// Compartment count conversion for reporting. Stochastic counts are
/// integers; a `f64` holds them exactly for any population this engine can
/// represent.
pub trait ReportableCount: Copy {
    fn as_f64(self) -> f64;
}

impl ReportableCount for f64 {
    fn as_f64(self) -> f64 {
        self
    }
}

impl ReportableCount for u64 {
    #[allow(clippy::cast_precision_loss)]
    fn as_f64(self) -> f64 {
        self as f64
    }
}

/// A snapshot of every compartment at one instant, keyed by cohort label
/// plus [`TOTAL_KEY`]. Field order matches the exchange shape consumers
/// depend on.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SimulationTimePoint {
    pub time: f64,
    pub susceptible: IndexMap<String, f64>,
    pub exposed: IndexMap<String, f64>,
    pub infectious: IndexMap<String, f64>,
    pub hospitalized: IndexMap<String, f64>,
    pub recovered: IndexMap<String, f64>,
    pub discharged: IndexMap<String, f64>,
    pub critical: IndexMap<String, f64>,
    pub dead: IndexMap<String, f64>,
}

impl SimulationTimePoint {
    /// Projects one step's cohort states into the reported shape. `states`
    /// is ordered like `cohorts`; cohort order is preserved in every map,
    /// with `"total"` appended last.
    pub fn project<C: ReportableCount + Default + std::iter::Sum>(
        time: f64,
        cohorts: &[AgeCohort],
        states: &[CohortState<C>],
    ) -> Self {
        let series = |compartment: Compartment| -> IndexMap<String, f64> {
            let mut map = IndexMap::with_capacity(cohorts.len() + 1);
            let mut total = 0.0;
            for (cohort, state) in cohorts.iter().zip(states) {
                let count = state.get(compartment).as_f64();
                total += count;
                map.insert(cohort.label().to_string(), count);
            }
            map.insert(TOTAL_KEY.to_string(), total);
            map
        };

        SimulationTimePoint {
            time,
            susceptible: series(Compartment::Susceptible),
            exposed: series(Compartment::Exposed),
            infectious: series(Compartment::Infectious),
            hospitalized: series(Compartment::Hospitalized),
            recovered: series(Compartment::Recovered),
            discharged: series(Compartment::Discharged),
            critical: series(Compartment::Critical),
            dead: series(Compartment::Dead),
        }
    }

    /// The cohort-label → count map for `compartment`.
    pub fn series(&self, compartment: Compartment) -> &IndexMap<String, f64> {
        match compartment {
            Compartment::Susceptible => &self.susceptible,
            Compartment::Exposed => &self.exposed,
            Compartment::Infectious => &self.infectious,
            Compartment::Hospitalized => &self.hospitalized,
            Compartment::Critical => &self.critical,
            Compartment::Recovered => &self.recovered,
            Compartment::Discharged => &self.discharged,
            Compartment::Dead => &self.dead,
        }
    }

    /// The all-cohorts total for `compartment`.
    pub fn total(&self, compartment: Compartment) -> f64 {
        self.series(compartment)[TOTAL_KEY]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn two_cohort_snapshot() -> SimulationTimePoint {
        let cohorts = vec![AgeCohort::new("0-9"), AgeCohort::new("80+")];
        let mut young = CohortState::<f64>::empty();
        young.set(Compartment::Susceptible, 800.0);
        young.set(Compartment::Infectious, 5.0);
        let mut old = CohortState::<f64>::empty();
        old.set(Compartment::Susceptible, 190.0);
        old.set(Compartment::Hospitalized, 10.0);
        SimulationTimePoint::project(3.0, &cohorts, &[young, old])
    }

    #[test]
    fn totals_sum_over_cohorts() {
        let point = two_cohort_snapshot();
        assert_approx_eq!(point.total(Compartment::Susceptible), 990.0);
        assert_approx_eq!(point.total(Compartment::Infectious), 5.0);
        assert_approx_eq!(point.total(Compartment::Hospitalized), 10.0);
        assert_approx_eq!(point.total(Compartment::Dead), 0.0);
    }

    #[test]
    fn every_compartment_keyed_by_cohort_plus_total() {
        let point = two_cohort_snapshot();
        for compartment in Compartment::ALL {
            let series = point.series(compartment);
            let keys: Vec<&str> = series.keys().map(String::as_str).collect();
            assert_eq!(keys, vec!["0-9", "80+", "total"]);
        }
    }

    #[test]
    fn integer_states_project_exactly() {
        let cohorts = vec![AgeCohort::new("all")];
        let mut state = CohortState::<u64>::empty();
        state.set(Compartment::Recovered, 12_345);
        let point = SimulationTimePoint::project(0.0, &cohorts, &[state]);
        assert_eq!(point.total(Compartment::Recovered), 12_345.0);
    }

    #[test]
    fn serializes_with_the_exchange_shape() {
        let point = two_cohort_snapshot();
        let json = serde_json::to_value(&point).unwrap();
        assert_eq!(json["time"], 3.0);
        assert_eq!(json["susceptible"]["0-9"], 800.0);
        assert_eq!(json["susceptible"]["total"], 990.0);
        assert_eq!(json["hospitalized"]["80+"], 10.0);
        // All eight compartments plus the timestamp are present
        assert_eq!(json.as_object().unwrap().len(), 9);
    }
}
