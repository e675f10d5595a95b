//! Test execution inside a worker process.

use std::io;
use std::process::{ExitStatus, Stdio};
use tokio::process::Command;
use tracing::debug;

use crate::models::{ErrorEntry, TestRequest, TestResult};
use crate::utils::timer::Timer;

/// Runs one test and reports its outcome.
#[allow(async_fn_in_trait)]
pub trait TestExecutor {
    async fn execute(&mut self, request: &TestRequest) -> TestResult;
}

/// Executes each test as an external command.
///
/// The template's `{class}`, `{name}` and `{id}` placeholders are replaced
/// per test. Exit status 0 is a pass; anything else is a failure. The child
/// inherits the worker's stdout and stderr, so its output shows up on the
/// lane's passthrough streams.
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    template: Vec<String>,
    memory_tracking: bool,
}

impl CommandExecutor {
    pub fn new(template: Vec<String>) -> Self {
        Self {
            template,
            memory_tracking: false,
        }
    }

    pub fn with_memory_tracking(mut self, enabled: bool) -> Self {
        self.memory_tracking = enabled;
        self
    }

    /// Expand the template for one request.
    pub fn render(&self, request: &TestRequest) -> Vec<String> {
        let id = request.id.to_string();
        self.template
            .iter()
            .map(|part| {
                part.replace("{class}", &request.class)
                    .replace("{name}", &request.name)
                    .replace("{id}", &id)
            })
            .collect()
    }
}

impl TestExecutor for CommandExecutor {
    async fn execute(&mut self, request: &TestRequest) -> TestResult {
        let timer = Timer::start(request.qualified_name());
        let argv = self.render(request);

        let Some((program, args)) = argv.split_first() else {
            return TestResult::pass(request, timer.stop())
                .with_error(ErrorEntry::error("empty test command"));
        };

        debug!("Running {} as {:?}", request, argv);
        let outcome = if self.memory_tracking {
            let program = program.clone();
            let args = args.to_vec();
            tokio::task::spawn_blocking(move || run_measured(&program, &args))
                .await
                .unwrap_or_else(|e| Err(io::Error::other(e)))
        } else {
            Command::new(program)
                .args(args)
                .stdin(Stdio::null())
                .stdout(Stdio::inherit())
                .stderr(Stdio::inherit())
                .status()
                .await
                .map(|status| (status, None))
        };

        let mut result = TestResult::pass(request, timer.stop());
        match outcome {
            Ok((status, peak)) => {
                if !status.success() {
                    let message = match status.code() {
                        Some(code) => format!("{} exited with status {}", program, code),
                        None => format!("{} terminated by signal", program),
                    };
                    result = result.with_error(ErrorEntry::failure(message));
                }
                if let Some(peak) = peak {
                    result = result.with_memory(peak);
                }
            }
            Err(e) => {
                result = result.with_error(ErrorEntry::error(format!(
                    "failed to start {}: {}",
                    program, e
                )));
            }
        }
        result
    }
}

/// Run one test to completion and sample the peak resident set size of
/// that child alone (and anything it waited for), in bytes.
///
/// `getrusage(RUSAGE_CHILDREN)` would report the largest child the worker
/// ever had, so the child is reaped with `wait4` instead.
fn run_measured(program: &str, args: &[String]) -> io::Result<(ExitStatus, Option<u64>)> {
    use nix::libc;
    use std::os::unix::process::ExitStatusExt;

    let child = std::process::Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .spawn()?;
    let pid = child.id() as libc::pid_t;

    let mut status: libc::c_int = 0;
    // Safety: rusage is plain old data; all zeroes is a valid value.
    let mut usage: libc::rusage = unsafe { std::mem::zeroed() };
    loop {
        // Safety: `pid` is our own child, not yet reaped, and both out
        // pointers are valid for the duration of the call.
        let reaped = unsafe { libc::wait4(pid, &mut status, 0, &mut usage) };
        if reaped == pid {
            break;
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    }

    Ok((ExitStatus::from_raw(status), rss_bytes(usage.ru_maxrss)))
}

/// Linux reports `ru_maxrss` in kilobytes, macOS in bytes.
fn rss_bytes(max_rss: nix::libc::c_long) -> Option<u64> {
    let max_rss = u64::try_from(max_rss).ok().filter(|&rss| rss > 0)?;
    if cfg!(target_os = "macos") {
        Some(max_rss)
    } else {
        Some(max_rss * 1024)
    }
}
