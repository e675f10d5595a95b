//! CLI argument parsing
//!
//! Defines command-line interface using clap.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::Overrides;

/// Distribute unit tests over parallel worker processes
#[derive(Parser, Debug)]
#[command(name = "testlane")]
#[command(version)]
#[command(about = "Run unit tests in parallel lanes and merge the results")]
#[command(long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run tests across worker lanes
    Run(RunArgs),

    /// Serve test requests from a coordinator (internal)
    #[command(hide = true)]
    Worker(WorkerArgs),

    /// Print the tests that would run
    List(ListArgs),
}

/// Arguments for run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Tests to run, as Class::name
    pub names: Vec<String>,

    /// Configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// YAML or JSON list of tests
    #[arg(short, long)]
    pub manifest: Option<PathBuf>,

    /// Output formatter (lane, tap, json, xunit, noiseless)
    #[arg(short = 'F', long)]
    pub formatter: Option<String>,

    /// Number of worker processes
    #[arg(short = 'C', long)]
    pub workers: Option<usize>,

    /// Additional report as format:file (repeatable)
    #[arg(short = 'W', long = "write", value_name = "FORMAT:FILE")]
    pub writers: Vec<String>,

    /// Stop dispatching after the first failure
    #[arg(long)]
    pub stop_on_error: bool,

    /// Re-emit a recorded lane instead of running tests
    #[arg(long, value_name = "FILE[:LANE]")]
    pub replay: Option<String>,

    /// Record each lane's results under this directory
    #[arg(long, value_name = "DIR")]
    pub record_dir: Option<PathBuf>,

    /// Record peak memory of each test
    #[arg(long, num_args = 0..=1, default_missing_value = "true", value_name = "BOOL")]
    pub memory_tracking: Option<bool>,

    /// Launcher prefix for workers (repeatable), e.g. --worker-arg nice
    #[arg(long = "worker-arg", value_name = "ARG", allow_hyphen_values = true)]
    pub worker_args: Vec<String>,

    /// Command run per test; {class}, {name} and {id} are substituted
    #[arg(last = true)]
    pub exec: Vec<String>,
}

impl RunArgs {
    /// The command-line layer of configuration.
    pub fn overrides(&self) -> Overrides {
        Overrides {
            workers: self.workers,
            formatter: self.formatter.clone(),
            stop_on_error: self.stop_on_error,
            memory_tracking: self.memory_tracking,
            worker_args: self.worker_args.clone(),
            command: self.exec.clone(),
            writers: self.writers.clone(),
            manifest: self.manifest.clone(),
            record_dir: self.record_dir.clone(),
        }
    }
}

/// Arguments for worker mode
#[derive(Parser, Debug)]
pub struct WorkerArgs {
    /// Record peak memory of each test
    #[arg(long, default_value_t = false, action = ArgAction::Set, value_name = "BOOL")]
    pub memory_tracking: bool,

    /// Command run per test
    #[arg(last = true)]
    pub exec: Vec<String>,
}

/// Arguments for list command
#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Tests to list, as Class::name
    pub names: Vec<String>,

    /// Configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// YAML or JSON list of tests
    #[arg(short, long)]
    pub manifest: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_args() {
        let args = Args::try_parse_from([
            "testlane",
            "run",
            "Suite::test_a",
            "Suite::test_b",
            "-C",
            "3",
            "-F",
            "tap",
            "-W",
            "json:out.json",
            "-W",
            "lane:lanes.txt",
            "--stop-on-error",
            "--",
            "phpunit",
            "--filter",
            "{name}",
        ])
        .unwrap();

        match args.command {
            Command::Run(run) => {
                assert_eq!(run.names, vec!["Suite::test_a", "Suite::test_b"]);
                assert_eq!(run.workers, Some(3));
                assert_eq!(run.formatter.as_deref(), Some("tap"));
                assert_eq!(run.writers.len(), 2);
                assert!(run.stop_on_error);
                assert_eq!(run.exec, vec!["phpunit", "--filter", "{name}"]);
                assert_eq!(run.memory_tracking, None);

                let overrides = run.overrides();
                assert_eq!(overrides.workers, Some(3));
                assert_eq!(overrides.command.len(), 3);
            }
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn test_memory_tracking_flag() {
        let args = Args::try_parse_from(["testlane", "run", "--memory-tracking"]).unwrap();
        match args.command {
            Command::Run(run) => assert_eq!(run.memory_tracking, Some(true)),
            _ => panic!("Expected Run command"),
        }

        let args =
            Args::try_parse_from(["testlane", "run", "--memory-tracking", "false"]).unwrap();
        match args.command {
            Command::Run(run) => assert_eq!(run.memory_tracking, Some(false)),
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn test_worker_args() {
        let args = Args::try_parse_from([
            "testlane",
            "worker",
            "--memory-tracking",
            "true",
            "--",
            "sh",
            "-c",
            "true",
        ])
        .unwrap();
        match args.command {
            Command::Worker(worker) => {
                assert!(worker.memory_tracking);
                assert_eq!(worker.exec, vec!["sh", "-c", "true"]);
            }
            _ => panic!("Expected Worker command"),
        }
    }

    #[test]
    fn test_list_and_verbose() {
        let args = Args::try_parse_from(["testlane", "list", "-m", "tests.yaml", "-v"]).unwrap();
        assert!(args.verbose);
        match args.command {
            Command::List(list) => assert_eq!(list.manifest, Some(PathBuf::from("tests.yaml"))),
            _ => panic!("Expected List command"),
        }
    }

    #[test]
    fn test_rejects_unknown_subcommand() {
        assert!(Args::try_parse_from(["testlane", "deploy"]).is_err());
    }
}
