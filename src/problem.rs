use std::collections::HashMap;
use std::fmt::Write;

use ndarray::Array2;

use crate::assignment::Assignment;
use crate::error::ValidationError;
use crate::person::{DAYS, Person};

/// Penalty applied to a soft constraint when none is given.
pub const DEFAULT_SOFT_PENALTY: f64 = 100.0;

pub type AttributeId = usize;

/// Whether a constraint must hold or may be violated at a cost.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Enforcement {
    Hard,
    Soft { penalty: f64 },
}

impl Enforcement {
    pub fn soft() -> Self {
        Enforcement::Soft {
            penalty: DEFAULT_SOFT_PENALTY,
        }
    }

    fn validate(self) -> Result<Self, ValidationError> {
        match self {
            Enforcement::Soft { penalty } if !penalty.is_finite() || penalty < 0.0 => {
                Err(ValidationError::InvalidWeight {
                    what: "soft penalty",
                    value: penalty,
                })
            }
            _ => Ok(self),
        }
    }

    fn label(&self) -> String {
        match self {
            Enforcement::Hard => "hard".to_string(),
            Enforcement::Soft { penalty } => format!("soft, penalty {penalty}"),
        }
    }
}

/// Set of event days, one bit per day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayMask(u16);

impl DayMask {
    pub const ALL: DayMask = DayMask((1 << DAYS) - 1);
    pub const NONE: DayMask = DayMask(0);

    pub fn from_days(days: impl IntoIterator<Item = usize>) -> Result<Self, ValidationError> {
        days.into_iter().try_fold(DayMask::NONE, |mask, day| {
            if day >= DAYS {
                return Err(ValidationError::DayOutOfRange(day));
            }
            Ok(DayMask(mask.0 | 1 << day))
        })
    }

    pub fn contains(&self, day: usize) -> bool {
        day < DAYS && self.0 & (1 << day) != 0
    }

    pub fn days(&self) -> impl Iterator<Item = usize> + '_ {
        (0..DAYS).filter(|&d| self.contains(d))
    }
}

impl Default for DayMask {
    fn default() -> Self {
        DayMask::ALL
    }
}

/// Bounds on the per-group, per-day sum of an attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeLimit {
    pub attribute: AttributeId,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub days: DayMask,
    pub enforcement: Enforcement,
}

/// Requirement on whether two persons share a group.
#[derive(Debug, Clone, PartialEq)]
pub struct Coupling {
    pub first: usize,
    pub second: usize,
    pub together: bool,
    pub enforcement: Enforcement,
}

impl Coupling {
    /// Desired co-membership value, 1 for together and 0 for apart.
    pub fn desired(&self) -> f64 {
        if self.together { 1.0 } else { 0.0 }
    }
}

/// A roster together with every rule the partition has to follow.
#[derive(Debug, Clone)]
pub struct Problem {
    persons: Vec<Person>,
    index: HashMap<String, usize>,
    group_count: usize,
    attributes: Vec<String>,
    attribute_ids: HashMap<String, AttributeId>,
    error_weights: Vec<Option<[f64; DAYS]>>,
    limits: Vec<AttributeLimit>,
    couplings: Vec<Coupling>,
    pins: Vec<Option<usize>>,
    penalties: Option<Array2<f64>>,
}

impl Problem {
    pub fn new(persons: Vec<Person>, group_count: usize) -> Result<Self, ValidationError> {
        if group_count == 0 {
            return Err(ValidationError::NoGroups);
        }
        let mut index = HashMap::with_capacity(persons.len());
        for (i, person) in persons.iter().enumerate() {
            if index.insert(person.name().to_string(), i).is_some() {
                return Err(ValidationError::DuplicatePerson(person.name().to_string()));
            }
        }
        let pins = vec![None; persons.len()];
        Ok(Problem {
            persons,
            index,
            group_count,
            attributes: Vec::new(),
            attribute_ids: HashMap::new(),
            error_weights: Vec::new(),
            limits: Vec::new(),
            couplings: Vec::new(),
            pins,
            penalties: None,
        })
    }

    pub fn persons(&self) -> &[Person] {
        &self.persons
    }

    pub fn group_count(&self) -> usize {
        self.group_count
    }

    pub fn person_index(&self, name: &str) -> Result<usize, ValidationError> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| ValidationError::UnknownPerson(name.to_string()))
    }

    /// Registered attribute names, in id order.
    pub fn attributes(&self) -> &[String] {
        &self.attributes
    }

    pub fn attribute_id(&self, attribute: &str) -> Option<AttributeId> {
        self.attribute_ids.get(attribute).copied()
    }

    pub fn error_weights(&self, attribute: AttributeId) -> Option<&[f64; DAYS]> {
        self.error_weights.get(attribute).and_then(Option::as_ref)
    }

    pub fn limits(&self) -> &[AttributeLimit] {
        &self.limits
    }

    pub fn couplings(&self) -> &[Coupling] {
        &self.couplings
    }

    pub fn pins(&self) -> &[Option<usize>] {
        &self.pins
    }

    pub fn penalties(&self) -> Option<&Array2<f64>> {
        self.penalties.as_ref()
    }

    fn register_attribute(&mut self, attribute: &str) -> AttributeId {
        if let Some(&id) = self.attribute_ids.get(attribute) {
            return id;
        }
        let id = self.attributes.len();
        self.attributes.push(attribute.to_string());
        self.attribute_ids.insert(attribute.to_string(), id);
        self.error_weights.push(None);
        id
    }

    /// Penalise, on each day, the distance of every group's attribute sum
    /// from an even split, weighted by `daily_weights[day]`.
    pub fn set_attribute_error_weight(
        &mut self,
        attribute: &str,
        daily_weights: &[f64],
    ) -> Result<AttributeId, ValidationError> {
        let weights: [f64; DAYS] = daily_weights.try_into().map_err(|_| {
            ValidationError::WeightLength {
                attribute: attribute.to_string(),
                len: daily_weights.len(),
            }
        })?;
        if let Some(&value) = weights.iter().find(|w| !w.is_finite() || **w < 0.0) {
            return Err(ValidationError::InvalidWeight {
                what: "attribute error weight",
                value,
            });
        }
        let id = self.register_attribute(attribute);
        self.error_weights[id] = Some(weights);
        Ok(id)
    }

    /// Bound the sum of `attribute` in every group on every day in `days`.
    /// Either bound may be left open.
    pub fn add_attribute_limit(
        &mut self,
        attribute: &str,
        min: Option<f64>,
        max: Option<f64>,
        days: DayMask,
        enforcement: Enforcement,
    ) -> Result<AttributeId, ValidationError> {
        if let (Some(min), Some(max)) = (min, max) {
            if min > max {
                return Err(ValidationError::EmptyRange {
                    attribute: attribute.to_string(),
                    min,
                    max,
                });
            }
        }
        let enforcement = enforcement.validate()?;
        let id = self.register_attribute(attribute);
        self.limits.push(AttributeLimit {
            attribute: id,
            min,
            max,
            days,
            enforcement,
        });
        Ok(id)
    }

    pub fn fix_group_for_person(&mut self, person: &str, group: usize) -> Result<(), ValidationError> {
        let i = self.pin(person, group)?;
        self.pins[i] = Some(group);
        Ok(())
    }

    fn pin(&self, person: &str, group: usize) -> Result<usize, ValidationError> {
        if group >= self.group_count {
            return Err(ValidationError::GroupOutOfRange {
                group,
                group_count: self.group_count,
            });
        }
        self.person_index(person)
    }

    /// Pins everyone who is both in this problem and in `prior` to their
    /// prior group. Returns the number of pinned persons.
    pub fn fix_from_assignment(&mut self, prior: &Assignment) -> Result<usize, ValidationError> {
        let names: Vec<String> = self.persons.iter().map(|p| p.name().to_string()).collect();
        self.fix_selected_from_assignment(names.iter().map(String::as_str), prior)
    }

    /// Like [Problem::fix_from_assignment], restricted to `names`. Names
    /// missing from either side are skipped. Nothing is pinned on error.
    pub fn fix_selected_from_assignment<'a>(
        &mut self,
        names: impl IntoIterator<Item = &'a str>,
        prior: &Assignment,
    ) -> Result<usize, ValidationError> {
        let pins = names
            .into_iter()
            .filter(|name| self.index.contains_key(*name))
            .filter_map(|name| {
                let group = prior.group_of(name)?;
                Some(self.pin(name, group).map(|i| (i, group)))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let pinned = pins.len();
        for (i, group) in pins {
            self.pins[i] = Some(group);
        }
        Ok(pinned)
    }

    pub fn keep_together(
        &mut self,
        first: &str,
        second: &str,
        enforcement: Enforcement,
    ) -> Result<(), ValidationError> {
        self.add_coupling(first, second, true, enforcement)
    }

    pub fn keep_apart(
        &mut self,
        first: &str,
        second: &str,
        enforcement: Enforcement,
    ) -> Result<(), ValidationError> {
        self.add_coupling(first, second, false, enforcement)
    }

    /// Hard keep-apart for every pair. Nothing is added on error.
    pub fn keep_apart_all<'a>(
        &mut self,
        pairs: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Result<(), ValidationError> {
        let couplings = pairs
            .into_iter()
            .map(|(first, second)| self.coupling(first, second, false, Enforcement::Hard))
            .collect::<Result<Vec<_>, _>>()?;
        self.couplings.extend(couplings);
        Ok(())
    }

    fn add_coupling(
        &mut self,
        first: &str,
        second: &str,
        together: bool,
        enforcement: Enforcement,
    ) -> Result<(), ValidationError> {
        let coupling = self.coupling(first, second, together, enforcement)?;
        self.couplings.push(coupling);
        Ok(())
    }

    fn coupling(
        &self,
        first: &str,
        second: &str,
        together: bool,
        enforcement: Enforcement,
    ) -> Result<Coupling, ValidationError> {
        let enforcement = enforcement.validate()?;
        let (a, b) = (self.person_index(first)?, self.person_index(second)?);
        if a == b {
            return Err(ValidationError::SelfCoupling(first.to_string()));
        }
        Ok(Coupling {
            first: a,
            second: b,
            together,
            enforcement,
        })
    }

    /// Penalty charged per shared day when two persons end up in the same
    /// group. Indexed like [Problem::persons]; must be symmetric with a zero
    /// diagonal.
    pub fn set_history_penalties(&mut self, penalties: Array2<f64>) -> Result<(), ValidationError> {
        let n = self.persons.len();
        let (rows, cols) = penalties.dim();
        if (rows, cols) != (n, n) {
            return Err(ValidationError::PenaltyShape {
                rows,
                cols,
                expected: n,
            });
        }
        if let Some(&value) = penalties.iter().find(|p| !p.is_finite()) {
            return Err(ValidationError::InvalidWeight {
                what: "history penalty",
                value,
            });
        }
        for i in 0..n {
            if penalties[[i, i]] != 0.0 {
                return Err(ValidationError::PenaltyDiagonal {
                    index: i,
                    value: penalties[[i, i]],
                });
            }
            for j in (i + 1)..n {
                let (value, mirror) = (penalties[[i, j]], penalties[[j, i]]);
                if value != mirror {
                    return Err(ValidationError::PenaltyAsymmetric {
                        row: i,
                        col: j,
                        value,
                        mirror,
                    });
                }
            }
        }
        self.penalties = Some(penalties);
        Ok(())
    }

    /// Human readable summary of the rules, meant for review before solving.
    pub fn report(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "=== Problem: {} persons in {} groups ===",
            self.persons.len(),
            self.group_count
        );

        let _ = writeln!(out, "Attributes:");
        for (id, attribute) in self.attributes.iter().enumerate() {
            let _ = writeln!(out, "  {attribute}");
            if let Some(weights) = self.error_weights(id) {
                let _ = writeln!(out, "    balance weights: {weights:?}");
            }
            for limit in self.limits.iter().filter(|l| l.attribute == id) {
                let bound = |b: Option<f64>| b.map_or("-".to_string(), |v| v.to_string());
                let days: Vec<usize> = limit.days.days().collect();
                let _ = writeln!(
                    out,
                    "    limit [{}, {}] on days {:?} ({})",
                    bound(limit.min),
                    bound(limit.max),
                    days,
                    limit.enforcement.label()
                );
            }
        }

        let free: Vec<&str> = self.names_where(|pin| pin.is_none());
        let _ = writeln!(out, "Free: {free:?}");
        for group in 0..self.group_count {
            let fixed = self.names_where(|pin| pin == Some(group));
            let _ = writeln!(out, "Fixed to group {group}: {fixed:?}");
        }

        let _ = writeln!(out, "Couplings:");
        for coupling in &self.couplings {
            let _ = writeln!(
                out,
                "  {} {} {} ({})",
                self.persons[coupling.first].name(),
                if coupling.together { "with" } else { "apart from" },
                self.persons[coupling.second].name(),
                coupling.enforcement.label()
            );
        }
        out
    }

    fn names_where(&self, predicate: impl Fn(Option<usize>) -> bool) -> Vec<&str> {
        self.persons
            .iter()
            .zip(&self.pins)
            .filter(|(_, pin)| predicate(**pin))
            .map(|(p, _)| p.name())
            .collect()
    }
}
