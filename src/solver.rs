use std::time::Duration;

use good_lp::solvers::SolutionStatus;
use good_lp::solvers::coin_cbc::coin_cbc;
use good_lp::{
    Constraint, Expression, ProblemVariables, ResolutionError, Solution, SolverModel, Variable,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::SolveError;

/// A minimisation model in backend independent form.
pub struct LinearModel {
    pub variables: ProblemVariables,
    pub objective: Expression,
    pub constraints: Vec<Constraint>,
    /// Variables whose values the caller wants back, in this order.
    pub watched: Vec<Variable>,
}

/// How a successful solve terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SolveStatus {
    Optimal,
    /// Wall-clock budget ran out; the best solution found so far is returned.
    TimeLimit,
    /// Stopped once the optimality gap was small enough.
    GapLimit,
    /// Stopped on request; the best solution found so far is returned.
    Interrupted,
}

impl SolveStatus {
    pub fn is_optimal(self) -> bool {
        self == SolveStatus::Optimal
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SolveOptions {
    pub time_limit: Option<Duration>,
}

/// Status and watched values of a feasible solve.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSolution {
    pub status: SolveStatus,
    pub values: Vec<f64>,
}

/// Anything able to minimise a [LinearModel].
///
/// Infeasible models must be reported as [SolveError::Infeasible]. Any
/// feasible termination returns the watched values, even if not optimal.
pub trait Backend {
    fn solve(
        &self,
        model: LinearModel,
        options: &SolveOptions,
    ) -> Result<RawSolution, SolveError>;
}

impl From<ResolutionError> for SolveError {
    fn from(err: ResolutionError) -> Self {
        match err {
            ResolutionError::Infeasible => SolveError::Infeasible,
            other => SolveError::Backend(other.to_string()),
        }
    }
}

/// COIN-OR CBC through `good_lp`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CbcBackend {
    pub verbose: bool,
}

impl Backend for CbcBackend {
    fn solve(&self, model: LinearModel, options: &SolveOptions) -> Result<RawSolution, SolveError> {
        let LinearModel {
            variables,
            objective,
            constraints,
            watched,
        } = model;

        let mut problem = variables.minimise(objective).using(coin_cbc);
        if !self.verbose {
            problem.set_parameter("loglevel", "0");
        }
        if let Some(limit) = options.time_limit {
            problem.set_parameter("seconds", &limit.as_secs_f64().to_string());
        }
        for constraint in constraints {
            problem.add_constraint(constraint);
        }

        let solution = problem.solve()?;
        let status = match solution.status() {
            SolutionStatus::Optimal => SolveStatus::Optimal,
            SolutionStatus::TimeLimit => SolveStatus::TimeLimit,
            SolutionStatus::GapLimit => SolveStatus::GapLimit,
            #[allow(unreachable_patterns)]
            _ => SolveStatus::Interrupted,
        };
        debug!(?status, "cbc finished");

        Ok(RawSolution {
            status,
            values: watched.iter().map(|&v| solution.value(v)).collect(),
        })
    }
}
