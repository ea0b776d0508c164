use thiserror::Error;

use crate::person::{DAYS, HUMAN};
use crate::solver::SolveStatus;

/// Misuse of the problem-building API. Raised at the point of mutation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("presence vector of '{name}' has {len} entries, expected {days}", days = DAYS)]
    PresenceLength { name: String, len: usize },

    #[error("presence of '{name}' on day {day} is {value}, expected a value in [0, 1]")]
    PresenceValue { name: String, day: usize, value: f64 },

    #[error("attribute '{human}' is reserved and always equals 1", human = HUMAN)]
    ReservedAttribute,

    #[error("group {group} is out of range for {group_count} groups")]
    GroupOutOfRange { group: usize, group_count: usize },

    #[error("group count must be at least 1")]
    NoGroups,

    #[error("unknown person '{0}'")]
    UnknownPerson(String),

    #[error("person '{0}' appears more than once")]
    DuplicatePerson(String),

    #[error("cannot couple '{0}' with themselves")]
    SelfCoupling(String),

    #[error("day {0} is outside the {days}-day event", days = DAYS)]
    DayOutOfRange(usize),

    #[error("{what} must be finite and non-negative, got {value}")]
    InvalidWeight { what: &'static str, value: f64 },

    #[error("day weights for '{attribute}' have {len} entries, expected {days}", days = DAYS)]
    WeightLength { attribute: String, len: usize },

    #[error("limits for '{attribute}' are empty: min {min} exceeds max {max}")]
    EmptyRange { attribute: String, min: f64, max: f64 },

    #[error("penalty matrix is {rows}x{cols}, expected {expected}x{expected}")]
    PenaltyShape {
        rows: usize,
        cols: usize,
        expected: usize,
    },

    #[error("penalty matrix is not symmetric: [{row}][{col}] is {value}, [{col}][{row}] is {mirror}")]
    PenaltyAsymmetric {
        row: usize,
        col: usize,
        value: f64,
        mirror: f64,
    },

    #[error("penalty matrix diagonal must be zero, entry {index} is {value}")]
    PenaltyDiagonal { index: usize, value: f64 },

    #[error("'{name}' was born in {birth_year}, after {current_year}")]
    BirthYearInFuture {
        name: String,
        birth_year: i32,
        current_year: i32,
    },

    #[error("got {names} names for {bands} age bands")]
    BandNameCount { names: usize, bands: usize },
}

/// Reasons a solve produced no assignment.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolveError {
    #[error("no assignment satisfies every hard constraint")]
    Infeasible,

    #[error("solver failure: {0}")]
    Backend(String),

    #[error("membership of person {person} in group {group} is {value}, which is not integral")]
    NonIntegral {
        group: usize,
        person: usize,
        value: f64,
    },

    #[error("inconsistent solver output: {0}")]
    Inconsistent(String),

    /// The solver stopped early without an integral incumbent.
    #[error("solver stopped ({status:?}) before finding a feasible assignment")]
    NoIncumbent { status: SolveStatus },
}

/// Errors while loading a problem file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read problem file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse problem file: {0}")]
    Parse(#[source] serde_yaml::Error),

    #[error(transparent)]
    Invalid(#[from] ValidationError),
}
