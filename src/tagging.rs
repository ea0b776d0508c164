//! Bulk attribute assignment helpers.

use crate::error::ValidationError;
use crate::person::Person;

/// Tags every person with `attribute`.
pub fn tag_all(persons: &mut [Person], attribute: &str) -> Result<(), ValidationError> {
    persons.iter_mut().try_for_each(|p| p.tag(attribute))
}

/// Inclusive age range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgeBand {
    pub min: i32,
    pub max: i32,
}

impl AgeBand {
    pub const fn new(min: i32, max: i32) -> Self {
        AgeBand { min, max }
    }

    fn contains(&self, age: i32) -> bool {
        (self.min..=self.max).contains(&age)
    }

    /// Attribute name used when the caller does not supply one, e.g. `Age_15_to_23`.
    pub fn default_name(&self) -> String {
        format!("Age_{}_to_{}", self.min, self.max)
    }
}

pub const DEFAULT_AGE_BANDS: [AgeBand; 3] = [
    AgeBand::new(0, 14),
    AgeBand::new(15, 23),
    AgeBand::new(24, 100),
];

/// Tags persons with one attribute per age band they fall into. Bands may
/// overlap, in which case a person gets several tags.
///
/// Ages are approximated as `current_year - birth_year`. Persons with unknown
/// birth year are treated as `assume_age` years old, or skipped when it is
/// `None`. Returns the attribute names used and how many persons each band
/// received.
pub fn tag_age_bands(
    persons: &mut [Person],
    current_year: i32,
    bands: &[AgeBand],
    names: Option<Vec<String>>,
    assume_age: Option<i32>,
) -> Result<(Vec<String>, Vec<usize>), ValidationError> {
    let names = match names {
        Some(names) if names.len() != bands.len() => {
            return Err(ValidationError::BandNameCount {
                names: names.len(),
                bands: bands.len(),
            });
        }
        Some(names) => names,
        None => bands.iter().map(AgeBand::default_name).collect(),
    };

    let mut counts = vec![0; bands.len()];
    for person in persons.iter_mut() {
        let age = match (person.birth_year(), assume_age) {
            (Some(birth_year), _) if birth_year > current_year => {
                return Err(ValidationError::BirthYearInFuture {
                    name: person.name().to_string(),
                    birth_year,
                    current_year,
                });
            }
            (Some(birth_year), _) => current_year - birth_year,
            (None, Some(age)) => age,
            (None, None) => continue,
        };

        for (i, band) in bands.iter().enumerate() {
            if band.contains(age) {
                person.tag(&names[i])?;
                counts[i] += 1;
            }
        }
    }

    Ok((names, counts))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn born(name: &str, year: Option<i32>) -> Person {
        let mut person = Person::new(name);
        person.set_birth_year(year);
        person
    }

    #[test]
    fn tag_all_sets_attribute_to_one() {
        let mut persons = vec![Person::new("A"), Person::new("B")];
        tag_all(&mut persons, "superhuman").unwrap();
        assert!(persons.iter().all(|p| p.get("superhuman") == 1.0));
        assert!(tag_all(&mut persons, "human").is_err());
    }

    #[test]
    fn ages_fall_into_overlapping_bands() {
        let mut persons = vec![
            born("Kid", Some(2014)),
            born("Teen", Some(2008)),
            born("Adult", Some(1990)),
            born("Unknown", None),
        ];
        let bands = [AgeBand::new(0, 14), AgeBand::new(10, 23)];

        let (names, counts) = tag_age_bands(&mut persons, 2024, &bands, None, None).unwrap();
        assert_eq!(names, vec!["Age_0_to_14", "Age_10_to_23"]);
        assert_eq!(counts, vec![1, 2]);
        assert_eq!(persons[0].get("Age_0_to_14"), 1.0);
        assert_eq!(persons[0].get("Age_10_to_23"), 1.0);
        assert_eq!(persons[1].get("Age_0_to_14"), 0.0);
        assert_eq!(persons[2].get("Age_10_to_23"), 0.0);
        assert_eq!(persons[3].get("Age_10_to_23"), 0.0);
    }

    #[test]
    fn unknown_ages_can_be_assumed() {
        let mut persons = vec![born("Unknown", None)];
        let names = Some(vec!["kid".to_string(), "grown".to_string(), "old".to_string()]);
        let (_, counts) =
            tag_age_bands(&mut persons, 2024, &DEFAULT_AGE_BANDS, names, Some(30)).unwrap();
        assert_eq!(counts, vec![0, 0, 1]);
        assert_eq!(persons[0].get("old"), 1.0);
    }

    #[test]
    fn future_birth_years_and_name_mismatch_are_rejected() {
        let mut persons = vec![born("Marty", Some(2030))];
        let err = tag_age_bands(&mut persons, 2024, &DEFAULT_AGE_BANDS, None, None).unwrap_err();
        assert!(matches!(err, ValidationError::BirthYearInFuture { birth_year: 2030, .. }));

        let err = tag_age_bands(
            &mut persons,
            2024,
            &DEFAULT_AGE_BANDS,
            Some(vec!["only".into()]),
            None,
        )
        .unwrap_err();
        assert_eq!(err, ValidationError::BandNameCount { names: 1, bands: 3 });
    }
}
