//! An age-structured compartmental engine for outbreak scenario
//! trajectories.
//!
//! Given per-cohort epidemiological rate tables, a time-varying
//! transmission-rate function, a time step, a horizon, and an ensemble
//! size, the engine computes:
//!
//! * one deterministic trajectory by forward-Euler integration of an
//!   eight-compartment, age-structured rate system
//!   (Susceptible, Exposed, Infectious, Hospitalized, Critical,
//!   Recovered, Discharged, Dead), and
//! * an ensemble of independent stochastic trajectories obtained by
//!   sampling discrete transition counts from the same rates, so the two
//!   modes are directly comparable under identical parameters.
//!
//! The engine is a pure, synchronous computation over in-memory inputs:
//! callers construct a [`params::ModelParameters`] (including the opaque
//! transmission-rate function β(t)), call [`simulation::run`], and receive
//! a [`simulation::SimulationResult`] holding the deterministic
//! trajectory, the surviving stochastic trajectories, and an echo of the
//! parameters. Form handling, mitigation-curve construction, and chart
//! rendering are consumers' concerns, not the engine's.
//!
//! ```rust
//! use epirun::prelude::*;
//! use indexmap::IndexMap;
//!
//! let all = AgeCohort::new("all");
//! let params = ModelParameters {
//!     age_distribution: [(all.clone(), 1.0)].into_iter().collect(),
//!     severity: IndexMap::from([(all, CohortRates {
//!         recovery: 1.0 / 3.0,
//!         hospitalization: 0.01,
//!         ..CohortRates::default()
//!     })]),
//!     latency_rate: 1.0 / 5.0,
//!     avg_infection_rate: 2.2 / 3.0,
//!     infection_rate: TransmissionRate::constant(2.2 / 3.0),
//!     population_served: 100_000.0,
//!     initial_cases: 10.0,
//!     imports_per_day: 0.0,
//!     import_cohort: None,
//!     t_min: 0.0,
//!     t_max: 30.0,
//!     time_step_days: 1.0,
//!     number_stochastic_runs: 5,
//!     seed: 42,
//!     branching: BranchingPolicy::Independent,
//! };
//!
//! let result = run(&params).unwrap();
//! assert_eq!(result.deterministic_trajectory.len(), 31);
//! assert_eq!(result.stochastic_trajectories.len(), 5);
//! ```

pub mod cohort;
pub mod compartment;
pub mod deterministic;
pub mod error;
pub mod hashing;
pub mod log;
pub mod params;
pub mod rates;
pub mod report;
pub mod simulation;
pub mod stochastic;
pub mod trajectory;

pub use crate::error::EpirunError;
pub use crate::log::{debug, disable_logging, enable_logging, error, info, set_log_level, trace, warn};

/// The commonly used types and the entry point, for glob import.
pub mod prelude {
    pub use crate::cohort::CohortState;
    pub use crate::compartment::Compartment;
    pub use crate::error::EpirunError;
    pub use crate::params::{
        AgeCohort, AgeDistribution, BranchingPolicy, CohortRates, ModelParameters,
        TransmissionRate,
    };
    pub use crate::simulation::{run, SimulationResult};
    pub use crate::trajectory::{SimulationTimePoint, Trajectory};
}
