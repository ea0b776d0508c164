use std::collections::BTreeMap;

use good_lp::{
    Constraint, Expression, ProblemVariables, Variable, constraint, variable, variables,
};
use ndarray::Array2;
use tracing::{debug, info, warn};

use crate::assignment::Assignment;
use crate::error::SolveError;
use crate::person::DAYS;
use crate::problem::{AttributeId, Enforcement, Problem};
use crate::solver::{Backend, LinearModel, RawSolution, SolveOptions};

/// Membership values further than this from an integer are rejected.
const INTEGRALITY_TOLERANCE: f64 = 1e-3;

/// Per pair `(i, j)` with `i < j`, one product variable per group. Their sum
/// is 1 exactly when both persons share a group.
type PairToVariablesMap = BTreeMap<(usize, usize), Vec<Variable>>;

/// A [Problem] translated into a [LinearModel], plus what is needed to read
/// the solution back.
pub struct EncodedModel {
    pub model: LinearModel,
    pub readout: Readout,
}

/// Layout of the watched variables: membership row by row, then the
/// products of each modeled pair, then the objective.
#[derive(Debug, Clone)]
pub struct Readout {
    group_count: usize,
    person_count: usize,
    same_group_pairs: Vec<(usize, usize)>,
}

/// Builds the mixed binary model for a [Problem].
pub struct ModelEncoder<'a> {
    problem: &'a Problem,
    variables: ProblemVariables,
    constraints: Vec<Constraint>,
    cost_terms: Vec<Expression>,
    membership: Array2<Variable>,
    same_group: PairToVariablesMap,
}

impl<'a> ModelEncoder<'a> {
    pub fn new(problem: &'a Problem) -> Self {
        let mut variables = variables!();
        let shape = (problem.group_count(), problem.persons().len());
        let membership = Array2::from_shape_fn(shape, |_| variables.add(variable().binary()));
        ModelEncoder {
            problem,
            variables,
            constraints: Vec::new(),
            cost_terms: Vec::new(),
            membership,
            same_group: BTreeMap::new(),
        }
    }

    pub fn encode(mut self) -> EncodedModel {
        self.constrain_one_group_per_person();
        self.constrain_pinned_persons();
        for attribute in 0..self.problem.attributes().len() {
            self.add_balance_errors(attribute);
        }
        self.constrain_attribute_limits();
        self.add_history_penalties();
        self.constrain_couplings();
        self.finish()
    }

    /// Every person is a member of exactly one group.
    fn constrain_one_group_per_person(&mut self) {
        for column in self.membership.columns() {
            let groups: Expression = column.iter().copied().sum();
            self.constraints.push(constraint!(groups == 1));
        }
    }

    fn constrain_pinned_persons(&mut self) {
        for (person, pin) in self.problem.pins().iter().enumerate() {
            if let Some(group) = *pin {
                let m = self.membership[[group, person]];
                self.constraints.push(constraint!(m == 1));
            }
        }
    }

    /// Sum of `attribute` over the members of `group` present on `day`.
    fn group_sum(&self, attribute: &str, group: usize, day: usize) -> Expression {
        self.problem
            .persons()
            .iter()
            .enumerate()
            .map(|(p, person)| (p, person.presence()[day] * person.get(attribute)))
            .filter(|&(_, coefficient)| coefficient != 0.0)
            .map(|(p, coefficient)| coefficient * self.membership[[group, p]])
            .sum()
    }

    /// What each group would hold on `day` under a perfectly even split.
    fn ideal_share(&self, attribute: &str, day: usize) -> f64 {
        let total: f64 = self
            .problem
            .persons()
            .iter()
            .map(|person| person.presence()[day] * person.get(attribute))
            .sum();
        total / self.problem.group_count() as f64
    }

    /// Linearised `|group_sum - ideal_share|` for every group and weighted day.
    /// Minimisation pushes each error variable down onto the absolute value.
    fn add_balance_errors(&mut self, attribute: AttributeId) {
        let problem = self.problem;
        let Some(&weights) = problem.error_weights(attribute) else {
            return;
        };
        let name = &problem.attributes()[attribute];
        for day in (0..DAYS).filter(|&d| weights[d] > 0.0) {
            let ideal = self.ideal_share(name, day);
            let below = -ideal;
            for group in 0..problem.group_count() {
                let sum = self.group_sum(name, group, day);
                let error = self.variables.add(variable().min(0));
                let over = Expression::from(error) - sum.clone();
                let under = Expression::from(error) + sum;
                self.constraints.push(constraint!(over >= below));
                self.constraints.push(constraint!(under >= ideal));
                self.cost_terms.push(weights[day] * error);
            }
        }
    }

    fn constrain_attribute_limits(&mut self) {
        let problem = self.problem;
        for limit in problem.limits() {
            let name = &problem.attributes()[limit.attribute];
            for day in limit.days.days() {
                for group in 0..problem.group_count() {
                    let sum = self.group_sum(name, group, day);
                    match limit.enforcement {
                        Enforcement::Hard => {
                            if let Some(min) = limit.min {
                                self.constraints.push(constraint!(sum.clone() >= min));
                            }
                            if let Some(max) = limit.max {
                                self.constraints.push(constraint!(sum <= max));
                            }
                        }
                        Enforcement::Soft { penalty } => {
                            if let Some(min) = limit.min {
                                let shortfall = self.variables.add(variable().min(0));
                                let raised = sum.clone() + shortfall;
                                self.constraints.push(constraint!(raised >= min));
                                self.cost_terms.push(penalty * shortfall);
                            }
                            if let Some(max) = limit.max {
                                let excess = self.variables.add(variable().min(0));
                                let lowered = sum - excess;
                                self.constraints.push(constraint!(lowered <= max));
                                self.cost_terms.push(penalty * excess);
                            }
                        }
                    }
                }
            }
        }
    }

    /// Expression equal to 1 when persons `i` and `j` share a group and 0
    /// otherwise. Each per-group product of binaries is linearised through a
    /// bounded auxiliary variable.
    fn same_group(&mut self, i: usize, j: usize) -> Expression {
        let key = (i.min(j), i.max(j));
        if !self.same_group.contains_key(&key) {
            let mut products = Vec::with_capacity(self.problem.group_count());
            for group in 0..self.problem.group_count() {
                let first = self.membership[[group, key.0]];
                let second = self.membership[[group, key.1]];
                let both = self.variables.add(variable().min(0).max(1));
                let joint = first + second;
                self.constraints.push(constraint!(both <= first));
                self.constraints.push(constraint!(both <= second));
                self.constraints.push(constraint!(both >= joint - 1.0));
                products.push(both);
            }
            self.same_group.insert(key, products);
        }
        self.same_group[&key].iter().copied().sum()
    }

    /// Charges `penalty[i][j]` for each day both persons attend, if they are
    /// placed together.
    fn add_history_penalties(&mut self) {
        let problem = self.problem;
        let Some(penalties) = problem.penalties() else {
            return;
        };
        let persons = problem.persons();
        for i in 0..persons.len() {
            for j in (i + 1)..persons.len() {
                let penalty = penalties[[i, j]];
                if penalty == 0.0 {
                    continue;
                }
                let weight = penalty * persons[i].shared_days(&persons[j]);
                if weight == 0.0 {
                    continue;
                }
                let together = self.same_group(i, j);
                self.cost_terms.push(together * weight);
            }
        }
    }

    fn constrain_couplings(&mut self) {
        let problem = self.problem;
        for coupling in problem.couplings() {
            let together = self.same_group(coupling.first, coupling.second);
            let desired = coupling.desired();
            match coupling.enforcement {
                Enforcement::Hard => self.constraints.push(constraint!(together == desired)),
                Enforcement::Soft { penalty } => {
                    let violated = self.variables.add(variable().binary());
                    let relaxed = if coupling.together {
                        together + violated
                    } else {
                        together - violated
                    };
                    self.constraints.push(constraint!(relaxed == desired));
                    self.cost_terms.push(penalty * violated);
                }
            }
        }
    }

    /// Bounds a free objective variable by the total cost and watches the
    /// membership, product and objective variables.
    fn finish(mut self) -> EncodedModel {
        let cost = self.variables.add(variable());
        let total: Expression = self.cost_terms.into_iter().sum();
        self.constraints.push(constraint!(cost >= total));

        let mut watched: Vec<Variable> = self.membership.iter().copied().collect();
        let mut same_group_pairs = Vec::with_capacity(self.same_group.len());
        for (pair, products) in self.same_group {
            same_group_pairs.push(pair);
            watched.extend(products);
        }
        watched.push(cost);

        debug!(
            variables = self.variables.len(),
            constraints = self.constraints.len(),
            pairs = same_group_pairs.len(),
            "encoded model"
        );

        let (group_count, person_count) = self.membership.dim();
        EncodedModel {
            model: LinearModel {
                variables: self.variables,
                objective: cost.into(),
                constraints: self.constraints,
                watched,
            },
            readout: Readout {
                group_count,
                person_count,
                same_group_pairs,
            },
        }
    }
}

impl Readout {
    /// Reads an [Assignment] back out of the watched values of a solve.
    pub fn extract(
        &self,
        problem: &Problem,
        solution: &RawSolution,
    ) -> Result<Assignment, SolveError> {
        let (groups, persons) = (self.group_count, self.person_count);
        let expected = groups * persons + self.same_group_pairs.len() * groups + 1;
        if solution.values.len() != expected {
            return Err(SolveError::Inconsistent(format!(
                "expected {expected} values, got {}",
                solution.values.len()
            )));
        }
        let (membership_values, rest) = solution.values.split_at(groups * persons);

        let mut membership = Array2::<u8>::zeros((groups, persons));
        for (k, &value) in membership_values.iter().enumerate() {
            let (group, person) = (k / persons, k % persons);
            let rounded = value.round();
            if (value - rounded).abs() > INTEGRALITY_TOLERANCE || !(0.0..=1.0).contains(&rounded) {
                return Err(SolveError::NonIntegral {
                    group,
                    person,
                    value,
                });
            }
            membership[[group, person]] = rounded as u8;
        }

        let mut modeled = BTreeMap::new();
        for (&pair, products) in self.same_group_pairs.iter().zip(rest.chunks(groups)) {
            let together: f64 = products.iter().sum();
            modeled.insert(pair, together.round().clamp(0.0, 1.0) as u8);
        }

        let names = problem.persons().iter().map(|p| p.name().to_string()).collect();
        let cost = rest[rest.len() - 1];
        Assignment::from_solution(names, membership, &modeled, solution.status, cost)
    }
}

/// Encodes `problem`, solves it with `backend` and extracts the assignment.
///
/// Hitting the time limit or being interrupted still yields the best
/// assignment found, flagged through its status. If none was found yet the
/// result is [SolveError::NoIncumbent].
pub fn solve<B: Backend + ?Sized>(
    problem: &Problem,
    backend: &B,
    options: &SolveOptions,
) -> Result<Assignment, SolveError> {
    let EncodedModel { model, readout } = ModelEncoder::new(problem).encode();

    info!(
        persons = problem.persons().len(),
        groups = problem.group_count(),
        time_limit = ?options.time_limit,
        "solving"
    );
    let solution = backend.solve(model, options)?;
    let assignment = match readout.extract(problem, &solution) {
        Ok(assignment) => assignment,
        // an early stop may hand back the relaxation instead of an incumbent
        Err(err) if !solution.status.is_optimal() => {
            warn!(status = ?solution.status, %err, "no usable assignment");
            return Err(SolveError::NoIncumbent {
                status: solution.status,
            });
        }
        Err(err) => return Err(err),
    };

    if assignment.status().is_optimal() {
        info!(cost = assignment.cost(), "found optimal assignment");
    } else {
        warn!(
            status = ?assignment.status(),
            cost = assignment.cost(),
            "assignment is not proven optimal"
        );
    }
    Ok(assignment)
}
