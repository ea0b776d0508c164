use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use crate::assignment::Assignment;
use crate::error::{ConfigError, ValidationError};
use crate::history::{History, HistoryPenaltyBuilder};
use crate::person::Person;
use crate::problem::{DayMask, Enforcement, Problem};
use crate::solver::SolveOptions;

/// YAML description of a roster and the rules for splitting it.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProblemFile {
    pub groups: usize,
    pub people: Vec<PersonSpec>,
    /// Attribute name → 14 daily weights for balancing.
    #[serde(default)]
    pub balance: BTreeMap<String, Vec<f64>>,
    #[serde(default)]
    pub limits: Vec<LimitSpec>,
    #[serde(default)]
    pub couplings: Vec<CouplingSpec>,
    pub history: Option<HistorySpec>,
    #[serde(rename = "timeLimitSeconds")]
    pub time_limit_seconds: Option<f64>,
    #[serde(default)]
    pub verbose: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PersonSpec {
    pub name: String,
    /// Attributes set to 1.
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, f64>,
    pub presence: Option<Vec<f64>>,
    #[serde(rename = "birthYear")]
    pub birth_year: Option<i32>,
    /// Pin to this group.
    pub group: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LimitSpec {
    pub attribute: String,
    pub min: Option<f64>,
    pub max: Option<f64>,
    /// Active days, all days when absent.
    pub days: Option<Vec<usize>>,
    /// Makes the limit soft.
    pub penalty: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CouplingKind {
    Together,
    Apart,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CouplingSpec {
    pub kind: CouplingKind,
    pub people: [String; 2],
    /// Makes the coupling soft.
    pub penalty: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HistorySpec {
    /// Penalty per look-back year, most recent first.
    pub weights: Vec<f64>,
    /// Name → group codes per year, most recent first.
    pub records: BTreeMap<String, Vec<u8>>,
}

/// Output document: group index → roster.
#[derive(Debug, Serialize, Deserialize)]
pub struct Solution {
    pub solution: BTreeMap<usize, Vec<String>>,
}

impl From<&Assignment> for Solution {
    fn from(assignment: &Assignment) -> Self {
        Solution {
            solution: assignment.groups().iter().cloned().enumerate().collect(),
        }
    }
}

fn enforcement(penalty: Option<f64>) -> Enforcement {
    match penalty {
        Some(penalty) => Enforcement::Soft { penalty },
        None => Enforcement::Hard,
    }
}

impl ProblemFile {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        serde_yaml::from_str(&content).map_err(ConfigError::Parse)
    }

    /// Validates the description and turns it into a [Problem].
    pub fn build(self) -> Result<(Problem, SolveOptions), ConfigError> {
        let mut persons = Vec::with_capacity(self.people.len());
        let mut pins = Vec::new();
        for spec in self.people {
            let mut person = match &spec.presence {
                Some(presence) => Person::with_presence(&spec.name, presence)?,
                None => Person::new(&spec.name),
            };
            for tag in &spec.tags {
                person.tag(tag)?;
            }
            for (attribute, &value) in &spec.attributes {
                person.set(attribute, value)?;
            }
            person.set_birth_year(spec.birth_year);
            if let Some(group) = spec.group {
                pins.push((spec.name, group));
            }
            persons.push(person);
        }

        let penalties = self.history.map(|history| -> Result<_, ValidationError> {
            let builder = HistoryPenaltyBuilder::new(history.weights)?;
            let records: History = history.records.into_iter().collect();
            Ok(builder.build(&persons, &records))
        });

        let mut problem = Problem::new(persons, self.groups)?;
        if let Some(penalties) = penalties {
            problem.set_history_penalties(penalties?)?;
        }
        for (attribute, weights) in &self.balance {
            problem.set_attribute_error_weight(attribute, weights)?;
        }
        for limit in self.limits {
            let days = match limit.days {
                Some(days) => DayMask::from_days(days)?,
                None => DayMask::ALL,
            };
            problem.add_attribute_limit(
                &limit.attribute,
                limit.min,
                limit.max,
                days,
                enforcement(limit.penalty),
            )?;
        }
        for coupling in &self.couplings {
            let [first, second] = &coupling.people;
            let rule = enforcement(coupling.penalty);
            match coupling.kind {
                CouplingKind::Together => problem.keep_together(first, second, rule)?,
                CouplingKind::Apart => problem.keep_apart(first, second, rule)?,
            }
        }
        for (name, group) in &pins {
            problem.fix_group_for_person(name, *group)?;
        }

        let time_limit = match self.time_limit_seconds {
            Some(seconds) if !seconds.is_finite() || seconds < 0.0 => {
                return Err(ValidationError::InvalidWeight {
                    what: "time limit",
                    value: seconds,
                }
                .into());
            }
            seconds => seconds.map(Duration::from_secs_f64),
        };
        Ok((problem, SolveOptions { time_limit }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_problem_from_yaml() {
        let yaml = r#"
groups: 2
people:
  - name: Romeo
    tags: [joker]
    group: 0
  - name: Juliet
    attributes: { clumsy: 0.5 }
    presence: [1, 1, 1, 1, 1, 1, 1, 0, 0, 0, 0, 0, 0, 0]
  - name: Tybalt
balance:
  human: [1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1]
limits:
  - attribute: joker
    max: 1
    days: [0, 1]
    penalty: 20
couplings:
  - kind: apart
    people: [Romeo, Juliet]
history:
  weights: [10]
  records:
    Romeo: [1]
    Tybalt: [1]
timeLimitSeconds: 5
"#;
        let file: ProblemFile = serde_yaml::from_str(yaml).unwrap();
        let (problem, options) = file.build().unwrap();

        assert_eq!(problem.group_count(), 2);
        assert_eq!(problem.persons()[0].get("joker"), 1.0);
        assert_eq!(problem.persons()[1].get("clumsy"), 0.5);
        assert_eq!(problem.persons()[1].days_present(), 7.0);
        assert_eq!(problem.pins(), [Some(0), None, None]);
        assert_eq!(problem.attributes(), ["human", "joker"]);
        assert_eq!(problem.limits()[0].enforcement, Enforcement::Soft { penalty: 20.0 });
        assert_eq!(problem.limits()[0].days, DayMask::from_days([0, 1]).unwrap());
        assert_eq!(problem.couplings()[0].desired(), 0.0);
        let penalties = problem.penalties().unwrap();
        assert_eq!(penalties[[0, 2]], 10.0);
        assert_eq!(penalties[[0, 1]], 0.0);
        assert_eq!(options.time_limit, Some(Duration::from_secs(5)));
    }

    #[test]
    fn invalid_content_is_reported() {
        let yaml = r#"
groups: 2
people:
  - name: Romeo
    tags: [human]
"#;
        let file: ProblemFile = serde_yaml::from_str(yaml).unwrap();
        assert!(matches!(
            file.build().unwrap_err(),
            ConfigError::Invalid(ValidationError::ReservedAttribute)
        ));

        let yaml = r#"
groups: 2
people:
  - name: Romeo
    group: 2
"#;
        let file: ProblemFile = serde_yaml::from_str(yaml).unwrap();
        assert!(matches!(
            file.build().unwrap_err(),
            ConfigError::Invalid(ValidationError::GroupOutOfRange { group: 2, .. })
        ));

        let yaml = r#"
groups: 2
people:
  - name: Romeo
timeLimitSeconds: -1
"#;
        let file: ProblemFile = serde_yaml::from_str(yaml).unwrap();
        let err = file.build().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid(ValidationError::InvalidWeight { what: "time limit", .. })
        ));
        assert_eq!(err.to_string(), "time limit must be finite and non-negative, got -1");
    }
}
