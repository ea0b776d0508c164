pub mod assignment;
pub mod encoder;
pub mod error;
pub mod history;
pub mod person;
pub mod problem;
pub mod solver;
pub mod tagging;
pub mod types;

pub use assignment::Assignment;
pub use encoder::{ModelEncoder, solve};
pub use error::{ConfigError, SolveError, ValidationError};
pub use history::{History, HistoryPenaltyBuilder, tag_newcomers, tag_veterans};
pub use person::{DAYS, HUMAN, Person};
pub use problem::{DayMask, Enforcement, Problem};
pub use solver::{Backend, CbcBackend, SolveOptions, SolveStatus};
pub use types::{ProblemFile, Solution};

impl Problem {
    /// Solves with CBC. See [encoder::solve] for other backends.
    pub fn solve(&self, options: &SolveOptions) -> Result<Assignment, SolveError> {
        solve(self, &CbcBackend::default(), options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{read_dir, read_to_string};
    use std::path::Path;

    // Helper function to run a test from a test file
    fn run_test_file(test_file: &Path) {
        println!("Running test for file: {:?}", test_file);

        let failure_message = format!("Failed to read test file: {}", test_file.display());
        let yaml_content = read_to_string(test_file).expect(&failure_message);

        // Split the file content at the "solution:" marker to separate input and expected output
        let parts: Vec<&str> = yaml_content.split("solution:").collect();

        let failure_message = format!("Failed to parse input YAML: {}", test_file.display());
        let input_yaml = parts.first().expect("No input found in test file").trim();
        let input: ProblemFile = serde_yaml::from_str(input_yaml).expect(&failure_message);

        let failure_message = format!("Failed to parse expected YAML: {}", test_file.display());
        let expected_yaml = format!("solution:{}", parts.get(1).expect(&failure_message));

        let failure_message = format!("Failed to solve test file: {}", test_file.display());
        let (problem, options) = input.build().expect(&failure_message);
        let assignment = problem.solve(&options).expect(&failure_message);
        let received_solution =
            serde_yaml::to_string(&Solution::from(&assignment)).expect(&failure_message);

        // Compare the output (normalizing by parsing and re-serializing the expected)
        let failure_message = format!("Failed to parse expected YAML: {}", test_file.display());
        let expected_unnormalized: Solution =
            serde_yaml::from_str(&expected_yaml).expect(&failure_message);
        let failure_message = format!("Failed to normalize expected YAML: {}", test_file.display());
        let expected_solution =
            serde_yaml::to_string(&expected_unnormalized).expect(&failure_message);

        println!("expected: {}", expected_solution);
        println!("received: {}", received_solution);

        assert_eq!(
            expected_solution.trim(),
            received_solution.trim(),
            "{}",
            test_file.display()
        );
    }

    #[test]
    fn run_all_test_files() {
        let test_data_dir = Path::new("test_data");
        let mut entries: Vec<_> = read_dir(test_data_dir)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .filter(|path| {
                path.is_file() && path.extension().map(|ext| ext == "yaml").unwrap_or(false)
            })
            .collect();

        entries.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

        for path in entries {
            run_test_file(&path);
        }
    }
}
