//! The eight disease states every cohort's population is split across.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

/// Number of disease compartments; compartment counts are stored in
/// fixed-size arrays indexed by `Compartment::index`.
pub const NUM_COMPARTMENTS: usize = 8;

/// One disease state. For every cohort the counts across all eight
/// compartments always sum to that cohort's fixed total population.
#[derive(Clone, Copy, Debug, Display, EnumIter, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Compartment {
    Susceptible,
    Exposed,
    Infectious,
    Hospitalized,
    Critical,
    Recovered,
    Discharged,
    Dead,
}

impl Compartment {
    /// All compartments, in storage order.
    pub const ALL: [Compartment; NUM_COMPARTMENTS] = [
        Compartment::Susceptible,
        Compartment::Exposed,
        Compartment::Infectious,
        Compartment::Hospitalized,
        Compartment::Critical,
        Compartment::Recovered,
        Compartment::Discharged,
        Compartment::Dead,
    ];

    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }
}
