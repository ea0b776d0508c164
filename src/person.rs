use std::collections::BTreeMap;
use std::fmt;

use crate::error::ValidationError;

/// Length of the event in days.
pub const DAYS: usize = 14;

/// Attribute every person carries with value 1. Balancing it balances headcount.
pub const HUMAN: &str = "human";

pub type Presence = [f64; DAYS];

#[derive(Debug, Clone, PartialEq)]
pub struct Person {
    name: String,
    presence: Presence,
    attributes: BTreeMap<String, f64>,
    birth_year: Option<i32>,
}

impl Person {
    /// A person present on every day of the event.
    pub fn new(name: impl Into<String>) -> Self {
        let mut attributes = BTreeMap::new();
        attributes.insert(HUMAN.to_string(), 1.0);
        Person {
            name: name.into(),
            presence: [1.0; DAYS],
            attributes,
            birth_year: None,
        }
    }

    /// A person with an explicit per-day presence. Each entry must lie in [0, 1].
    pub fn with_presence(name: impl Into<String>, presence: &[f64]) -> Result<Self, ValidationError> {
        let mut person = Person::new(name);
        person.presence = presence.try_into().map_err(|_| ValidationError::PresenceLength {
            name: person.name.clone(),
            len: presence.len(),
        })?;
        if let Some((day, &value)) = presence
            .iter()
            .enumerate()
            .find(|(_, v)| !(0.0..=1.0).contains(*v))
        {
            return Err(ValidationError::PresenceValue {
                name: person.name,
                day,
                value,
            });
        }
        Ok(person)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn presence(&self) -> &Presence {
        &self.presence
    }

    pub fn days_present(&self) -> f64 {
        self.presence.iter().sum()
    }

    /// Sum over days of the product of both presences.
    pub fn shared_days(&self, other: &Person) -> f64 {
        self.presence
            .iter()
            .zip(other.presence.iter())
            .map(|(a, b)| a * b)
            .sum()
    }

    /// Value of an attribute, 0 when the person does not carry it.
    pub fn get(&self, attribute: &str) -> f64 {
        self.attributes.get(attribute).copied().unwrap_or(0.0)
    }

    pub fn set(&mut self, attribute: &str, value: f64) -> Result<(), ValidationError> {
        if attribute == HUMAN {
            return Err(ValidationError::ReservedAttribute);
        }
        self.attributes.insert(attribute.to_string(), value);
        Ok(())
    }

    /// Sets an attribute to 1.
    pub fn tag(&mut self, attribute: &str) -> Result<(), ValidationError> {
        self.set(attribute, 1.0)
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, f64)> {
        self.attributes.iter().map(|(k, &v)| (k.as_str(), v))
    }

    pub fn birth_year(&self) -> Option<i32> {
        self.birth_year
    }

    pub fn set_birth_year(&mut self, birth_year: Option<i32>) {
        self.birth_year = birth_year;
    }
}

impl fmt::Display for Person {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {{", self.name)?;
        for (i, (attribute, value)) in self.attributes().enumerate() {
            let sep = if i == 0 { "" } else { ", " };
            write!(f, "{sep}{attribute}: {value}")?;
        }
        write!(f, "}}")
    }
}
