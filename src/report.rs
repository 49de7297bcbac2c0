//! Result export for downstream consumers: a long-format CSV (one row per
//! run × time × compartment × cohort) and a JSON rendering of the full
//! [`SimulationResult`]. The engine itself never down-samples; charting
//! consumers do that on their side.

use csv::Writer;
use serde::Serialize;
use std::ffi::OsStr;
use std::fs::{create_dir_all, File};
use std::path::Path;

use crate::compartment::Compartment;
use crate::error::EpirunError;
use crate::simulation::SimulationResult;
use crate::trajectory::Trajectory;

/// The `run` column value for the deterministic trajectory; stochastic
/// members are labeled `stoch-<index>`.
pub const DETERMINISTIC_RUN_LABEL: &str = "det";

#[derive(Serialize)]
struct TrajectoryRow<'a> {
    run: &'a str,
    time: f64,
    compartment: Compartment,
    cohort: &'a str,
    count: f64,
}

// Checks that the path is valid for the expected extension. Creates the
// file and all parent directories if they do not exist.
fn generate_validate_filepath(path_name: &str, extension: &str) -> Result<File, EpirunError> {
    let path = Path::new(path_name);
    match path.extension().and_then(OsStr::to_str) {
        Some(found) if found == extension => {
            create_dir_all(path.parent().expect("Either root or empty path provided"))?;
            let file = File::create(path)?;
            Ok(file)
        }
        _ => Err(EpirunError::Configuration(format!(
            "result output file {path_name} must have a .{extension} extension"
        ))),
    }
}

fn write_trajectory(
    writer: &mut Writer<File>,
    run: &str,
    trajectory: &Trajectory,
) -> Result<(), EpirunError> {
    for point in trajectory {
        for compartment in Compartment::ALL {
            for (cohort, count) in point.series(compartment) {
                writer.serialize(TrajectoryRow {
                    run,
                    time: point.time,
                    compartment,
                    cohort: cohort.as_str(),
                    count: *count,
                })?;
            }
        }
    }
    Ok(())
}

/// Writes the deterministic trajectory and every stochastic trajectory as
/// long-format CSV rows (`run, time, compartment, cohort, count`, with
/// the `"total"` cohort rows included).
///
/// # Errors
///
/// `Configuration` for a non-`.csv` path, otherwise IO/CSV errors.
pub fn write_csv(result: &SimulationResult, path: &str) -> Result<(), EpirunError> {
    let file = generate_validate_filepath(path, "csv")?;
    let mut writer = Writer::from_writer(file);
    write_trajectory(
        &mut writer,
        DETERMINISTIC_RUN_LABEL,
        &result.deterministic_trajectory,
    )?;
    for (index, trajectory) in result.stochastic_trajectories.iter().enumerate() {
        write_trajectory(&mut writer, &format!("stoch-{index}"), trajectory)?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes the full [`SimulationResult`] (trajectories, failures, parameter
/// echo) as JSON.
///
/// # Errors
///
/// `Configuration` for a non-`.json` path, otherwise IO/serde errors.
pub fn write_json(result: &SimulationResult, path: &str) -> Result<(), EpirunError> {
    let file = generate_validate_filepath(path, "json")?;
    serde_json::to_writer_pretty(file, result)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{
        AgeCohort, AgeDistribution, BranchingPolicy, CohortRates, ModelParameters,
        TransmissionRate,
    };
    use crate::simulation::run;
    use indexmap::IndexMap;
    use tempfile::tempdir;

    fn small_result() -> SimulationResult {
        let all = AgeCohort::new("all");
        let params = ModelParameters {
            age_distribution: [(all.clone(), 1.0)].into_iter().collect::<AgeDistribution>(),
            severity: IndexMap::from([(
                all,
                CohortRates {
                    recovery: 0.3,
                    ..CohortRates::default()
                },
            )]),
            latency_rate: 0.2,
            avg_infection_rate: 0.5,
            infection_rate: TransmissionRate::constant(0.5),
            population_served: 1_000.0,
            initial_cases: 5.0,
            imports_per_day: 0.0,
            import_cohort: None,
            t_min: 0.0,
            t_max: 2.0,
            time_step_days: 1.0,
            number_stochastic_runs: 2,
            seed: 1,
            branching: BranchingPolicy::Independent,
        };
        run(&params).unwrap()
    }

    #[test]
    fn csv_has_one_row_per_run_time_compartment_cohort() {
        let result = small_result();
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("result.csv");
        write_csv(&result, path.to_str().unwrap()).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let rows: Vec<csv::StringRecord> = reader.records().map(Result::unwrap).collect();
        // 3 runs x 3 time points x 8 compartments x 2 keys ("all" + "total")
        assert_eq!(rows.len(), 3 * 3 * 8 * 2);
        assert_eq!(&rows[0][0], "det");
        assert!(rows.iter().any(|row| &row[0] == "stoch-1"));
    }

    #[test]
    fn json_round_trips_the_exchange_shape() {
        let result = small_result();
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("result.json");
        write_json(&result, path.to_str().unwrap()).unwrap();

        let file = std::fs::File::open(&path).unwrap();
        let value: serde_json::Value = serde_json::from_reader(file).unwrap();
        assert_eq!(
            value["deterministic_trajectory"][0]["susceptible"]["total"],
            995.0
        );
        assert_eq!(value["stochastic_trajectories"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn wrong_extension_is_a_configuration_error() {
        let result = small_result();
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("result.tsv");
        let error = write_csv(&result, path.to_str().unwrap()).unwrap_err();
        assert!(matches!(error, EpirunError::Configuration(_)));
    }

    #[test]
    fn directories_are_created_as_needed() {
        let result = small_result();
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("nested").join("out").join("result.csv");
        write_csv(&result, path.to_str().unwrap()).unwrap();
        assert!(path.exists());
    }
}
