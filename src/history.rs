use std::collections::HashMap;

use ndarray::Array2;
use tracing::{debug, warn};

use crate::error::ValidationError;
use crate::person::Person;

/// Past group membership per person name.
///
/// Each record lists one group code per past year, most recent year first.
/// Code 0 means the person was absent or their group is unknown that year;
/// codes 1..=4 identify the recognised groups. Years past the end of a
/// record read as 0.
#[derive(Debug, Clone, Default)]
pub struct History {
    records: HashMap<String, Vec<u8>>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, codes: Vec<u8>) {
        self.records.insert(name.into(), codes);
    }

    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.records.get(name).map(Vec::as_slice)
    }

    /// Names of the given persons that have no record.
    pub fn unmatched<'a>(&self, persons: &'a [Person]) -> Vec<&'a str> {
        persons
            .iter()
            .map(Person::name)
            .filter(|name| !self.records.contains_key(*name))
            .collect()
    }
}

impl<S: Into<String>> FromIterator<(S, Vec<u8>)> for History {
    fn from_iter<T: IntoIterator<Item = (S, Vec<u8>)>>(iter: T) -> Self {
        History {
            records: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

fn code_at(record: &[u8], years_back: usize) -> u8 {
    record.get(years_back).copied().unwrap_or(0)
}

/// Turns a [History] into a pairwise penalty for sharing a group again.
#[derive(Debug, Clone)]
pub struct HistoryPenaltyBuilder {
    weights: Vec<f64>,
}

impl HistoryPenaltyBuilder {
    /// `weights[k]` is charged when two persons had the same group code `k`
    /// years before the most recent one. With `[10, 5, 2]`, a pair that shared
    /// a group last year and three years ago costs 12.
    pub fn new(weights: Vec<f64>) -> Result<Self, ValidationError> {
        if let Some(&value) = weights.iter().find(|w| !w.is_finite() || **w < 0.0) {
            return Err(ValidationError::InvalidWeight {
                what: "history weight",
                value,
            });
        }
        Ok(HistoryPenaltyBuilder { weights })
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Symmetric `N x N` matrix with zero diagonal, indexed like `persons`.
    ///
    /// Two persons both absent in a given year have equal codes and are
    /// charged for that year as well.
    pub fn build(&self, persons: &[Person], history: &History) -> Array2<f64> {
        let unmatched = history.unmatched(persons);
        if !unmatched.is_empty() {
            warn!(?unmatched, "persons without a history record");
        }

        let records: Vec<Option<&[u8]>> = persons.iter().map(|p| history.get(p.name())).collect();
        let n = persons.len();
        let mut penalties = Array2::zeros((n, n));

        for i in 0..n {
            let Some(first) = records[i] else { continue };
            for j in (i + 1)..n {
                let Some(second) = records[j] else { continue };
                let penalty = self.pair_penalty(first, second);
                penalties[[i, j]] = penalty;
                penalties[[j, i]] = penalty;
            }
        }

        debug!(persons = n, years = self.weights.len(), "built history penalty matrix");
        penalties
    }

    fn pair_penalty(&self, first: &[u8], second: &[u8]) -> f64 {
        self.weights
            .iter()
            .enumerate()
            .filter(|&(k, _)| code_at(first, k) == code_at(second, k))
            .map(|(_, w)| w)
            .sum()
    }
}

/// Tags persons who attend at least `required_presence` days and appear in a
/// recognised group in at least `required_years` past years.
pub fn tag_veterans(
    persons: &mut [Person],
    history: &History,
    attribute: &str,
    required_years: usize,
    required_presence: f64,
) -> Result<usize, ValidationError> {
    let mut tagged = 0;
    for person in persons.iter_mut() {
        if person.days_present() < required_presence {
            continue;
        }
        let Some(record) = history.get(person.name()) else {
            continue;
        };
        let experience = record.iter().filter(|&&code| code != 0).count();
        if experience >= required_years {
            person.tag(attribute)?;
            debug!(person = person.name(), attribute, "tagged veteran");
            tagged += 1;
        }
    }
    Ok(tagged)
}

/// Tags persons who never were in a recognised group.
pub fn tag_newcomers(
    persons: &mut [Person],
    history: &History,
    attribute: &str,
) -> Result<usize, ValidationError> {
    let mut tagged = 0;
    for person in persons.iter_mut() {
        let is_new = history
            .get(person.name())
            .is_none_or(|record| record.iter().all(|&code| code == 0));
        if is_new {
            person.tag(attribute)?;
            debug!(person = person.name(), attribute, "tagged newcomer");
            tagged += 1;
        }
    }
    Ok(tagged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::person::DAYS;

    fn people(names: &[&str]) -> Vec<Person> {
        names.iter().map(|&n| Person::new(n)).collect()
    }

    #[test]
    fn two_shared_recent_years_add_their_weights() {
        let persons = people(&["A", "B"]);
        let history: History = [("A", vec![1, 2, 3]), ("B", vec![1, 2, 4])].into_iter().collect();
        let builder = HistoryPenaltyBuilder::new(vec![10.0, 5.0, 2.0]).unwrap();

        let penalties = builder.build(&persons, &history);
        assert_eq!(penalties[[0, 1]], 15.0);
        assert_eq!(penalties[[1, 0]], 15.0);
    }

    #[test]
    fn matrix_is_symmetric_with_zero_diagonal() {
        let persons = people(&["A", "B", "C", "D"]);
        let history: History = [
            ("A", vec![1, 1, 2]),
            ("B", vec![1, 3, 2]),
            ("C", vec![4, 1, 2]),
            ("D", vec![4, 3]),
        ]
        .into_iter()
        .collect();
        let penalties = HistoryPenaltyBuilder::new(vec![3.0, 2.0, 1.0])
            .unwrap()
            .build(&persons, &history);

        for i in 0..4 {
            assert_eq!(penalties[[i, i]], 0.0);
            for j in 0..4 {
                assert_eq!(penalties[[i, j]], penalties[[j, i]]);
            }
        }
        assert_eq!(penalties[[0, 1]], 4.0);
        assert_eq!(penalties[[0, 2]], 3.0);
        assert_eq!(penalties[[2, 3]], 3.0);
        // D has no third year, which only matches another missing year
        assert_eq!(penalties[[1, 3]], 2.0);
    }

    #[test]
    fn persons_without_record_get_no_penalty() {
        let persons = people(&["A", "B", "Newbie"]);
        let history: History = [("A", vec![1]), ("B", vec![1])].into_iter().collect();
        let penalties = HistoryPenaltyBuilder::new(vec![10.0]).unwrap().build(&persons, &history);

        assert_eq!(penalties[[0, 1]], 10.0);
        assert!(penalties.row(2).iter().all(|&p| p == 0.0));
        assert!(penalties.column(2).iter().all(|&p| p == 0.0));
        assert_eq!(history.unmatched(&persons), vec!["Newbie"]);
    }

    #[test]
    fn both_absent_counts_as_shared_group() {
        let persons = people(&["A", "B"]);
        let history: History = [("A", vec![0, 2]), ("B", vec![0, 3])].into_iter().collect();
        let penalties = HistoryPenaltyBuilder::new(vec![10.0, 5.0])
            .unwrap()
            .build(&persons, &history);
        assert_eq!(penalties[[0, 1]], 10.0);
    }

    #[test]
    fn negative_weights_are_rejected() {
        let err = HistoryPenaltyBuilder::new(vec![1.0, -1.0]).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidWeight { value, .. } if value == -1.0));
    }

    #[test]
    fn veterans_need_presence_and_experience() {
        let mut partial = [1.0; DAYS];
        partial[0] = 0.0;
        partial[1] = 0.0;
        let mut persons = vec![
            Person::new("Old"),
            Person::new("Once"),
            Person::with_presence("Busy", &partial).unwrap(),
            Person::new("New"),
        ];
        let history: History = [
            ("Old", vec![1, 0, 3]),
            ("Once", vec![0, 2, 0]),
            ("Busy", vec![1, 1, 1]),
        ]
        .into_iter()
        .collect();

        let tagged = tag_veterans(&mut persons, &history, "veteran", 2, 13.0).unwrap();
        assert_eq!(tagged, 1);
        let veterans: Vec<f64> = persons.iter().map(|p| p.get("veteran")).collect();
        assert_eq!(veterans, vec![1.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn newcomers_have_no_recognised_group() {
        let mut persons = people(&["Old", "Ghost", "New"]);
        let history: History = [("Old", vec![0, 2]), ("Ghost", vec![0, 0])].into_iter().collect();

        let tagged = tag_newcomers(&mut persons, &history, "newcomer").unwrap();
        assert_eq!(tagged, 2);
        let newcomers: Vec<f64> = persons.iter().map(|p| p.get("newcomer")).collect();
        assert_eq!(newcomers, vec![0.0, 1.0, 1.0]);
    }
}
