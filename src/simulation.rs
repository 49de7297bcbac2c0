//! The outer driver: validates parameters, builds the initial per-cohort
//! states, runs the deterministic integrator across the horizon, then runs
//! one independently seeded stochastic integrator per ensemble member, and
//! assembles everything into a [`SimulationResult`].

use log::{debug, error, info};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;

use crate::cohort::CohortState;
use crate::compartment::Compartment;
use crate::deterministic::DeterministicIntegrator;
use crate::error::EpirunError;
use crate::hashing::hash_str;
use crate::params::{AgeCohort, ModelParameters};
use crate::stochastic::StochasticIntegrator;
use crate::trajectory::{SimulationTimePoint, Trajectory};

/// A stochastic ensemble member that aborted on an invariant violation.
/// Sibling members and the deterministic trajectory are unaffected.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EnsembleFailure {
    /// Index of the trajectory within the requested ensemble.
    pub run: usize,
    /// Rendered [`EpirunError`], naming the cohort/compartment/time step.
    pub error: String,
}

/// Everything one simulation invocation produces. Immutable once returned;
/// a deterministic-only run is recognizable by an empty
/// `stochastic_trajectories` list.
#[derive(Debug, Serialize)]
pub struct SimulationResult {
    pub deterministic_trajectory: Trajectory,
    /// One trajectory per surviving ensemble member; order among them is
    /// not meaningful.
    pub stochastic_trajectories: Vec<Trajectory>,
    /// Ensemble members aborted by an invariant violation.
    pub failures: Vec<EnsembleFailure>,
    /// Echo of the inputs, for traceability and display.
    pub params: ModelParameters,
}

/// Runs the full scenario described by `params`: one deterministic
/// trajectory plus `params.number_stochastic_runs` stochastic trajectories,
/// all over the same horizon and rate schedule.
///
/// # Errors
///
/// `Configuration` if `params` fails validation (nothing is computed), or
/// an `InvariantViolation` from the deterministic pass. A violation inside
/// one stochastic member is recorded in `failures` instead of propagating.
pub fn run(params: &ModelParameters) -> Result<SimulationResult, EpirunError> {
    params.validate()?;
    let cohorts: Vec<AgeCohort> = params.age_distribution.cohorts().cloned().collect();
    info!(
        "running scenario: {} cohorts, {} steps, ensemble of {}",
        cohorts.len(),
        params.num_steps(),
        params.number_stochastic_runs
    );

    let deterministic_trajectory = run_deterministic(params, &cohorts)?;

    let mut stochastic_trajectories = Vec::with_capacity(params.number_stochastic_runs);
    let mut failures = Vec::new();
    for run_index in 0..params.number_stochastic_runs {
        // Every member gets its own stream, derived from the base seed and
        // the member's label; members are independent of one another and
        // reproducible under a fixed seed.
        let rng = StdRng::seed_from_u64(
            params
                .seed
                .wrapping_add(hash_str(&format!("stochastic-{run_index}"))),
        );
        record_member_outcome(
            run_index,
            run_stochastic(params, &cohorts, rng),
            &mut stochastic_trajectories,
            &mut failures,
        );
    }

    Ok(SimulationResult {
        deterministic_trajectory,
        stochastic_trajectories,
        failures,
        params: params.clone(),
    })
}

/// Files one ensemble member's outcome: surviving trajectories are
/// collected, an aborted member becomes an [`EnsembleFailure`] entry and
/// never disturbs its siblings.
fn record_member_outcome(
    run_index: usize,
    outcome: Result<Trajectory, EpirunError>,
    trajectories: &mut Vec<Trajectory>,
    failures: &mut Vec<EnsembleFailure>,
) {
    match outcome {
        Ok(trajectory) => {
            debug!("stochastic run {run_index} complete");
            trajectories.push(trajectory);
        }
        Err(e) => {
            error!("stochastic run {run_index} aborted: {e}");
            failures.push(EnsembleFailure {
                run: run_index,
                error: e.to_string(),
            });
        }
    }
}

fn run_deterministic(
    params: &ModelParameters,
    cohorts: &[AgeCohort],
) -> Result<Trajectory, EpirunError> {
    let mut states = initial_real_states(params, cohorts);
    let mut integrator = DeterministicIntegrator::new(params);
    let num_steps = params.num_steps();
    let dt = params.time_step_days;

    let mut trajectory = Vec::with_capacity(num_steps + 1);
    trajectory.push(SimulationTimePoint::project(params.t_min, cohorts, &states));
    for step in 0..num_steps {
        #[allow(clippy::cast_precision_loss)]
        let time = params.t_min + dt * step as f64;
        integrator.step(time, cohorts, &mut states)?;
        trajectory.push(SimulationTimePoint::project(time + dt, cohorts, &states));
    }
    if integrator.clamped_transitions() > 0 {
        info!(
            "deterministic pass clamped {} transition(s); the time step is \
             coarse for the supplied rates",
            integrator.clamped_transitions()
        );
    }
    Ok(trajectory)
}

fn run_stochastic(
    params: &ModelParameters,
    cohorts: &[AgeCohort],
    rng: StdRng,
) -> Result<Trajectory, EpirunError> {
    let mut states = initial_integer_states(params, cohorts);
    let mut integrator = StochasticIntegrator::new(params, rng);
    let num_steps = params.num_steps();
    let dt = params.time_step_days;

    let mut trajectory = Vec::with_capacity(num_steps + 1);
    trajectory.push(SimulationTimePoint::project(params.t_min, cohorts, &states));
    for step in 0..num_steps {
        #[allow(clippy::cast_precision_loss)]
        let time = params.t_min + dt * step as f64;
        integrator.step(time, cohorts, &mut states)?;
        trajectory.push(SimulationTimePoint::project(time + dt, cohorts, &states));
    }
    Ok(trajectory)
}

/// Initial deterministic states: the served population split across
/// cohorts by the age-distribution weights, with the initial suspected
/// cases seeded into Infectious proportionally.
fn initial_real_states(params: &ModelParameters, cohorts: &[AgeCohort]) -> Vec<CohortState<f64>> {
    let total_weight = params.age_distribution.total_weight();
    cohorts
        .iter()
        .map(|cohort| {
            let fraction = params
                .age_distribution
                .weight(cohort)
                .expect("cohorts come from the age distribution")
                / total_weight;
            let population = params.population_served * fraction;
            let infectious = params.initial_cases * fraction;
            let mut state = CohortState::empty();
            state.set(Compartment::Susceptible, population - infectious);
            state.set(Compartment::Infectious, infectious);
            state
        })
        .collect()
}

/// Initial stochastic states: integer cohort populations via
/// largest-remainder rounding, so they sum exactly to the served
/// population; initial cases rounded the same way and capped per cohort.
fn initial_integer_states(params: &ModelParameters, cohorts: &[AgeCohort]) -> Vec<CohortState<u64>> {
    let weights: Vec<f64> = cohorts
        .iter()
        .map(|cohort| {
            params
                .age_distribution
                .weight(cohort)
                .expect("cohorts come from the age distribution")
        })
        .collect();
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let populations = apportion(params.population_served.round() as u64, &weights);
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let mut infectious = apportion(params.initial_cases.round() as u64, &weights);

    // Rounding can overfill a small cohort; spill the excess into cohorts
    // that still have room.
    let mut spill = 0;
    for (cases, population) in infectious.iter_mut().zip(&populations) {
        if *cases > *population {
            spill += *cases - *population;
            *cases = *population;
        }
    }
    for (cases, population) in infectious.iter_mut().zip(&populations) {
        if spill == 0 {
            break;
        }
        let room = *population - *cases;
        let moved = spill.min(room);
        *cases += moved;
        spill -= moved;
    }

    populations
        .iter()
        .zip(&infectious)
        .map(|(&population, &cases)| {
            let mut state = CohortState::empty();
            state.set(Compartment::Susceptible, population - cases);
            state.set(Compartment::Infectious, cases);
            state
        })
        .collect()
}

/// Splits `total` across `weights` with largest-remainder rounding; the
/// shares always sum exactly to `total`.
fn apportion(total: u64, weights: &[f64]) -> Vec<u64> {
    let weight_sum: f64 = weights.iter().sum();
    #[allow(clippy::cast_precision_loss)]
    let exact: Vec<f64> = weights
        .iter()
        .map(|w| total as f64 * w / weight_sum)
        .collect();
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let mut shares: Vec<u64> = exact.iter().map(|x| x.floor() as u64).collect();
    let assigned: u64 = shares.iter().sum();

    let mut order: Vec<usize> = (0..weights.len()).collect();
    order.sort_by(|&a, &b| {
        let fa = exact[a] - exact[a].floor();
        let fb = exact[b] - exact[b].floor();
        fb.partial_cmp(&fa).expect("weights validated finite")
    });
    #[allow(clippy::cast_possible_truncation)]
    for &i in order.iter().take((total - assigned) as usize) {
        shares[i] += 1;
    }
    shares
}
