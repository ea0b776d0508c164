use std::collections::{BTreeMap, HashMap};
use std::fmt;

use ndarray::Array2;

use crate::error::SolveError;
use crate::solver::SolveStatus;

/// Partition of a roster into groups, as returned by a solve.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    names: Vec<String>,
    membership: Array2<u8>,
    co_membership: Array2<u8>,
    groups: Vec<Vec<String>>,
    lookup: HashMap<String, usize>,
    status: SolveStatus,
    cost: f64,
}

impl Assignment {
    /// `membership` is `G x N` and must be one-hot per column. `modeled`
    /// holds co-membership values the solver reported for pairs `(i, j)`,
    /// `i < j`; all other pairs are derived from `membership`. Reported values
    /// that disagree with `membership` are rejected.
    pub fn from_solution(
        names: Vec<String>,
        membership: Array2<u8>,
        modeled: &BTreeMap<(usize, usize), u8>,
        status: SolveStatus,
        cost: f64,
    ) -> Result<Self, SolveError> {
        let (group_count, person_count) = membership.dim();
        if names.len() != person_count {
            return Err(SolveError::Inconsistent(format!(
                "{} names for {person_count} membership columns",
                names.len()
            )));
        }

        let mut group_of = Vec::with_capacity(person_count);
        for (person, column) in membership.columns().into_iter().enumerate() {
            let mut groups = column.iter().enumerate().filter(|&(_, &m)| m == 1).map(|(g, _)| g);
            match (groups.next(), groups.next()) {
                (Some(group), None) if column.iter().all(|&m| m <= 1) => group_of.push(group),
                _ => {
                    return Err(SolveError::Inconsistent(format!(
                        "'{}' is not a member of exactly one group",
                        names[person]
                    )));
                }
            }
        }

        let co_membership = Array2::from_shape_fn((person_count, person_count), |(i, j)| {
            let key = (i.min(j), i.max(j));
            match modeled.get(&key) {
                Some(&value) if i != j => value,
                _ => u8::from(group_of[i] == group_of[j]),
            }
        });
        if let Some(&(i, j)) = modeled
            .keys()
            .find(|&&(i, j)| co_membership[[i, j]] != u8::from(group_of[i] == group_of[j]))
        {
            return Err(SolveError::Inconsistent(format!(
                "co-membership of '{}' and '{}' disagrees with their groups",
                names[i], names[j]
            )));
        }

        let mut groups = vec![Vec::new(); group_count];
        let mut lookup = HashMap::with_capacity(person_count);
        for (name, &group) in names.iter().zip(&group_of) {
            groups[group].push(name.clone());
            lookup.insert(name.clone(), group);
        }

        Ok(Assignment {
            names,
            membership,
            co_membership,
            groups,
            lookup,
            status,
            cost,
        })
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Names of the persons in the order the problem listed them.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Rosters per group, in the original person order.
    pub fn groups(&self) -> &[Vec<String>] {
        &self.groups
    }

    /// Group of the named person, `None` when not part of this assignment.
    pub fn group_of(&self, name: &str) -> Option<usize> {
        self.lookup.get(name).copied()
    }

    /// `G x N`, entry `[g, p]` is 1 when person `p` is in group `g`.
    pub fn membership(&self) -> &Array2<u8> {
        &self.membership
    }

    /// `N x N`, entry `[i, j]` is 1 when persons `i` and `j` share a group.
    pub fn co_membership(&self) -> &Array2<u8> {
        &self.co_membership
    }

    pub fn status(&self) -> SolveStatus {
        self.status
    }

    pub fn is_optimal(&self) -> bool {
        self.status.is_optimal()
    }

    /// Objective value of the solution.
    pub fn cost(&self) -> f64 {
        self.cost
    }
}

impl fmt::Display for Assignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "=== Assignment for total of {} persons ({:?}, cost {}) ===",
            self.names.len(),
            self.status,
            self.cost
        )?;
        for (i, group) in self.groups.iter().enumerate() {
            writeln!(f, "Group {i} : {group:?}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn names(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn builds_rosters_and_lookup() {
        let membership = array![[1, 0, 0, 1], [0, 1, 1, 0]];
        let assignment = Assignment::from_solution(
            names(&["A", "B", "C", "D"]),
            membership,
            &BTreeMap::from([((0, 3), 1), ((1, 3), 0)]),
            SolveStatus::Optimal,
            2.5,
        )
        .unwrap();

        assert_eq!(assignment.groups(), [names(&["A", "D"]), names(&["B", "C"])]);
        assert_eq!(assignment.group_of("C"), Some(1));
        assert_eq!(assignment.group_of("Nobody"), None);
        assert_eq!(assignment.co_membership()[[0, 3]], 1);
        assert_eq!(assignment.co_membership()[[3, 0]], 1);
        assert_eq!(assignment.co_membership()[[1, 2]], 1);
        assert_eq!(assignment.co_membership()[[0, 1]], 0);
        assert_eq!(assignment.co_membership()[[2, 2]], 1);
        assert!(assignment.is_optimal());
        assert!(assignment.to_string().contains("Group 0 : [\"A\", \"D\"]"));
    }

    #[test]
    fn rejects_non_one_hot_membership() {
        let err = Assignment::from_solution(
            names(&["A", "B"]),
            array![[1, 1], [0, 1]],
            &BTreeMap::new(),
            SolveStatus::Optimal,
            0.0,
        )
        .unwrap_err();
        assert!(matches!(err, SolveError::Inconsistent(msg) if msg.contains("'B'")));

        let err = Assignment::from_solution(
            names(&["A"]),
            array![[0], [0]],
            &BTreeMap::new(),
            SolveStatus::Optimal,
            0.0,
        )
        .unwrap_err();
        assert!(matches!(err, SolveError::Inconsistent(_)));
    }

    #[test]
    fn rejects_contradicting_co_membership() {
        let err = Assignment::from_solution(
            names(&["A", "B"]),
            array![[1, 0], [0, 1]],
            &BTreeMap::from([((0, 1), 1)]),
            SolveStatus::TimeLimit,
            0.0,
        )
        .unwrap_err();
        assert!(matches!(err, SolveError::Inconsistent(_)));
    }
}
