//! Worker command construction.
//!
//! Workers are re-executions of the current binary in `worker` mode,
//! optionally wrapped by a launcher (e.g. `nice -n 10`).

use rand::Rng;
use std::ffi::OsString;
use std::path::PathBuf;

/// Environment variable carrying the per-run token.
pub const TOKEN_ENV: &str = "TEST_TOKEN";

/// Environment variable marking a process as a worker.
pub const WORKER_ENV: &str = "TESTLANE_WORKER";

/// Everything needed to start one worker process.
#[derive(Debug, Clone)]
pub struct WorkerSpec {
    pub program: OsString,
    pub args: Vec<OsString>,
    pub env: Vec<(String, String)>,
}

impl WorkerSpec {
    /// Spec for an arbitrary program; used for custom workers and tests.
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Spec that re-executes this binary in worker mode.
    ///
    /// `launcher` is prepended verbatim; `command` is the executor template
    /// forwarded after `--`.
    pub fn current_exe(
        launcher: &[String],
        memory_tracking: bool,
        command: &[String],
        token: &str,
    ) -> std::io::Result<Self> {
        let exe: PathBuf = std::env::current_exe()?;

        let mut spec = match launcher.split_first() {
            Some((program, rest)) => WorkerSpec::new(program).args(rest).arg(exe),
            None => WorkerSpec::new(exe),
        };

        spec = spec
            .arg("worker")
            .arg("--memory-tracking")
            .arg(memory_tracking.to_string());

        if !command.is_empty() {
            spec = spec.arg("--").args(command);
        }

        Ok(spec.env(TOKEN_ENV, token).env(WORKER_ENV, "1"))
    }
}

/// Random 7-hex-character token identifying one run.
///
/// Exported to every worker so concurrent runs sharing a filesystem can
/// keep their scratch files apart.
pub fn generate_token() -> String {
    let value: u32 = rand::rng().random_range(0..0x1000_0000);
    format!("{value:07x}")
}
