use campgroups::{CbcBackend, ProblemFile, Solution, solve};
use tracing_subscriber::{EnvFilter, fmt};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let path = std::env::args()
        .nth(1)
        .expect("Usage: <program> <problem_file.yaml>");

    let file = ProblemFile::load(path)?;
    let backend = CbcBackend {
        verbose: file.verbose,
    };
    let (problem, options) = file.build()?;
    eprintln!("{}", problem.report());

    let assignment = solve(&problem, &backend, &options)?;
    eprintln!("{assignment}");

    println!("{}", serde_yaml::to_string(&Solution::from(&assignment))?);
    Ok(())
}
