//! Model inputs: the cohort set, per-cohort rate tables, the opaque
//! time-varying transmission-rate function, and the run controls. A
//! `ModelParameters` value is validated once, up front, and is immutable
//! for the duration of one simulation invocation.

use std::fmt::{self, Debug, Display};
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::EpirunError;

/// A discrete age-bracket label (e.g. `"0-9"`, `"80+"`) used to index every
/// rate table and every compartment count. The set of cohorts is fixed for a
/// run and never changes mid-simulation.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgeCohort(String);

impl AgeCohort {
    pub fn new(label: &str) -> Self {
        AgeCohort(label.to_string())
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.0
    }
}

impl Display for AgeCohort {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AgeCohort {
    fn from(label: &str) -> Self {
        AgeCohort::new(label)
    }
}

/// Relative population weights per cohort, e.g. loaded from a country
/// age-distribution table. Weights need not be normalized; the engine
/// scales them to `population_served`. Insertion order is preserved and
/// determines cohort order in every output map.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgeDistribution(IndexMap<AgeCohort, f64>);

impl AgeDistribution {
    pub fn new(weights: IndexMap<AgeCohort, f64>) -> Self {
        AgeDistribution(weights)
    }

    /// Loads a cohort-label → weight table from a JSON object, e.g. one
    /// country's entry of a `country_age_distribution.json` file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, EpirunError> {
        let file = File::open(path)?;
        let distribution: AgeDistribution = serde_json::from_reader(file)?;
        Ok(distribution)
    }

    pub fn cohorts(&self) -> impl Iterator<Item = &AgeCohort> {
        self.0.keys()
    }

    pub fn weight(&self, cohort: &AgeCohort) -> Option<f64> {
        self.0.get(cohort).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn total_weight(&self) -> f64 {
        self.0.values().sum()
    }

    /// The cohort's share of the total weight.
    pub fn fraction(&self, cohort: &AgeCohort) -> Option<f64> {
        self.weight(cohort).map(|w| w / self.total_weight())
    }

    /// The cohort carrying the greatest weight (first on ties). Used as the
    /// default destination for imported cases.
    pub fn heaviest_cohort(&self) -> Option<&AgeCohort> {
        self.0
            .iter()
            .max_by(|(_, a), (_, b)| a.partial_cmp(b).expect("weights validated finite"))
            .map(|(cohort, _)| cohort)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&AgeCohort, f64)> {
        self.0.iter().map(|(cohort, weight)| (cohort, *weight))
    }
}

impl FromIterator<(AgeCohort, f64)> for AgeDistribution {
    fn from_iter<I: IntoIterator<Item = (AgeCohort, f64)>>(iter: I) -> Self {
        AgeDistribution(iter.into_iter().collect())
    }
}

/// Per-capita transition rates for one cohort, per day.
///
/// `recovery`/`hospitalization` compete for those leaving Infectious,
/// `discharge`/`critical` for those leaving Hospitalized, and
/// `stabilization`/`death` for those leaving Critical.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CohortRates {
    pub hospitalization: f64,
    pub recovery: f64,
    pub discharge: f64,
    pub critical: f64,
    pub stabilization: f64,
    pub death: f64,
}

impl CohortRates {
    fn validate(&self, cohort: &AgeCohort) -> Result<(), EpirunError> {
        for (name, rate) in [
            ("hospitalization", self.hospitalization),
            ("recovery", self.recovery),
            ("discharge", self.discharge),
            ("critical", self.critical),
            ("stabilization", self.stabilization),
            ("death", self.death),
        ] {
            if !rate.is_finite() || rate < 0.0 {
                return Err(EpirunError::Configuration(format!(
                    "{name} rate for cohort {cohort} must be finite and non-negative, got {rate}"
                )));
            }
        }
        Ok(())
    }
}

/// How competing exit rates from one compartment combine within a step.
///
/// The source tables express branching (e.g. Infectious → Recovered vs.
/// Hospitalized) as independent per-compartment rates, not probabilities
/// summing to one, so the normalization is an explicit run parameter
/// rather than an implicit assumption.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BranchingPolicy {
    /// Use each exit probability `rate × Δt` as-is. If the competing exits
    /// jointly exceed the available source population within a step, the
    /// integrator clamps (observably) rather than renormalizing.
    #[default]
    Independent,
    /// Rescale one source's exit probabilities so their sum never exceeds 1.
    Renormalized,
}

/// The externally supplied time-varying transmission rate, treated as an
/// opaque capability: a pure function from simulation time (days) to the
/// instantaneous per-contact transmission rate. Seasonal forcing and
/// mitigation effects are the caller's business; the engine only calls it.
#[derive(Clone)]
pub struct TransmissionRate(Arc<dyn Fn(f64) -> f64 + Send + Sync>);

impl TransmissionRate {
    pub fn from_fn(f: impl Fn(f64) -> f64 + Send + Sync + 'static) -> Self {
        TransmissionRate(Arc::new(f))
    }

    pub fn constant(rate: f64) -> Self {
        TransmissionRate::from_fn(move |_| rate)
    }

    #[must_use]
    pub fn at(&self, time: f64) -> f64 {
        (self.0)(time)
    }
}

impl Debug for TransmissionRate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("TransmissionRate(<fn>)")
    }
}

impl Default for TransmissionRate {
    fn default() -> Self {
        TransmissionRate::constant(0.0)
    }
}

/// The full input for one simulation invocation. Construct, call
/// [`ModelParameters::validate`] (the assembler does this too), then hand to
/// [`crate::simulation::run`]. The engine never mutates a parameters value.
#[derive(Clone, Debug, Serialize)]
pub struct ModelParameters {
    /// Cohort set and relative population weights.
    pub age_distribution: AgeDistribution,
    /// Per-cohort transition rate tables; every cohort present in
    /// `age_distribution` must have an entry.
    pub severity: IndexMap<AgeCohort, CohortRates>,
    /// Rate of leaving Exposed into Infectious (1 / incubation period), per day.
    pub latency_rate: f64,
    /// Mean transmission rate, echoed for traceability/display.
    pub avg_infection_rate: f64,
    /// Instantaneous transmission rate at any simulation time. Not part of
    /// the serialized echo; the function is an opaque capability.
    #[serde(skip)]
    pub infection_rate: TransmissionRate,
    /// Total population covered by the scenario.
    pub population_served: f64,
    /// Suspected cases at simulation start, seeded into Infectious.
    pub initial_cases: f64,
    /// Constant daily import rate of externally acquired exposures.
    pub imports_per_day: f64,
    /// Destination cohort for imported cases. Defaults to the heaviest
    /// cohort of the age distribution when unset.
    pub import_cohort: Option<AgeCohort>,
    /// Simulation start time, in days.
    pub t_min: f64,
    /// Simulation end time, in days.
    pub t_max: f64,
    /// Δt, in days.
    pub time_step_days: f64,
    /// Ensemble size. Zero yields a deterministic-only result.
    pub number_stochastic_runs: usize,
    /// Base seed for the per-trajectory random streams.
    pub seed: u64,
    /// Normalization policy for competing exit rates.
    pub branching: BranchingPolicy,
}

impl ModelParameters {
    /// Checks the full input for internal consistency. Every failure mode
    /// here is a `Configuration` error: the caller must fix the input, the
    /// engine never retries.
    pub fn validate(&self) -> Result<(), EpirunError> {
        if !self.time_step_days.is_finite() || self.time_step_days <= 0.0 {
            return Err(EpirunError::Configuration(format!(
                "time step must be finite and positive, got {}",
                self.time_step_days
            )));
        }
        if !self.t_min.is_finite() || !self.t_max.is_finite() || self.t_max <= self.t_min {
            return Err(EpirunError::Configuration(format!(
                "simulation horizon must be positive, got [{}, {}]",
                self.t_min, self.t_max
            )));
        }
        if !self.population_served.is_finite() || self.population_served <= 0.0 {
            return Err(EpirunError::Configuration(format!(
                "population served must be positive, got {}",
                self.population_served
            )));
        }
        if !self.initial_cases.is_finite()
            || self.initial_cases < 0.0
            || self.initial_cases > self.population_served
        {
            return Err(EpirunError::Configuration(format!(
                "initial cases must be in [0, population served], got {}",
                self.initial_cases
            )));
        }
        if !self.imports_per_day.is_finite() || self.imports_per_day < 0.0 {
            return Err(EpirunError::Configuration(format!(
                "imports per day must be non-negative, got {}",
                self.imports_per_day
            )));
        }
        if !self.latency_rate.is_finite() || self.latency_rate < 0.0 {
            return Err(EpirunError::Configuration(format!(
                "latency rate must be non-negative, got {}",
                self.latency_rate
            )));
        }
        if self.age_distribution.is_empty() {
            return Err(EpirunError::Configuration(
                "age distribution has no cohorts".to_string(),
            ));
        }
        for (cohort, weight) in self.age_distribution.iter() {
            if !weight.is_finite() || weight < 0.0 {
                return Err(EpirunError::Configuration(format!(
                    "age distribution weight for cohort {cohort} must be finite and \
                     non-negative, got {weight}"
                )));
            }
        }
        if self.age_distribution.total_weight() <= 0.0 {
            return Err(EpirunError::Configuration(
                "age distribution weights sum to zero".to_string(),
            ));
        }
        // Missing rate-table entries become a single upfront failure here
        // instead of a lookup failure mid-run.
        for cohort in self.age_distribution.cohorts() {
            match self.severity.get(cohort) {
                Some(rates) => rates.validate(cohort)?,
                None => {
                    return Err(EpirunError::Configuration(format!(
                        "severity table is missing an entry for cohort {cohort}"
                    )))
                }
            }
        }
        if let Some(cohort) = &self.import_cohort {
            if self.age_distribution.weight(cohort).is_none() {
                return Err(EpirunError::Configuration(format!(
                    "import cohort {cohort} is not in the age distribution"
                )));
            }
        }
        Ok(())
    }

    /// The cohort receiving imported cases.
    pub fn resolved_import_cohort(&self) -> &AgeCohort {
        self.import_cohort.as_ref().unwrap_or_else(|| {
            self.age_distribution
                .heaviest_cohort()
                .expect("age distribution validated non-empty")
        })
    }

    /// Number of integration steps; trajectories have `num_steps() + 1` points.
    pub fn num_steps(&self) -> usize {
        let horizon = self.t_max - self.t_min;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let steps = (horizon / self.time_step_days).ceil() as usize;
        steps
    }
}
