//! Worker mode entry point.
//!
//! Runs when the binary is started as `testlane worker`. Reads one JSON
//! command per line from stdin, runs each test and writes its result line to
//! the result channel (fd 3). Ends on the exit marker or on EOF.

use anyhow::{bail, Context};
use std::fs::File;
use std::io::{self, Write};
use std::os::fd::{FromRawFd, RawFd};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

use super::executor::{CommandExecutor, TestExecutor};
use crate::error::ProtocolError;
use crate::protocol::{decode_command, encode_result, WorkerCommand, RESULT_FD, RESULT_FD_ENV};

/// Process commands from `input` until exit; returns the number of tests run.
pub async fn serve<R, W, E>(input: R, results: &mut W, executor: &mut E) -> io::Result<usize>
where
    R: AsyncBufRead + Unpin,
    W: Write,
    E: TestExecutor,
{
    let mut lines = input.lines();
    let mut executed = 0;

    while let Some(line) = lines.next_line().await? {
        match decode_command(&line) {
            Ok(WorkerCommand::Run(request)) => {
                let result = executor.execute(&request).await;
                results.write_all(encode_result(&result).as_bytes())?;
                results.flush()?;
                executed += 1;
            }
            Ok(WorkerCommand::Exit) => {
                debug!("Exit marker received after {} test(s)", executed);
                return Ok(executed);
            }
            Err(ProtocolError::Empty) => continue,
            Err(e) => warn!("Skipping command: {}", e),
        }
    }

    debug!("Input closed after {} test(s)", executed);
    Ok(executed)
}

/// Run this process as a worker.
pub async fn run(command: Vec<String>, memory_tracking: bool) -> anyhow::Result<()> {
    if command.is_empty() {
        bail!("Worker needs a test command after `--`");
    }

    let mut results = open_result_channel()?;
    let mut executor = CommandExecutor::new(command).with_memory_tracking(memory_tracking);

    let executed = serve(BufReader::new(tokio::io::stdin()), &mut results, &mut executor)
        .await
        .context("Worker loop failed")?;

    info!("Worker finished after {} test(s)", executed);
    Ok(())
}

/// The result channel the coordinator mapped into this process.
fn open_result_channel() -> anyhow::Result<File> {
    let fd: RawFd = match std::env::var(RESULT_FD_ENV) {
        Ok(value) => value
            .parse()
            .with_context(|| format!("Invalid {}: {}", RESULT_FD_ENV, value))?,
        Err(_) => RESULT_FD,
    };

    use nix::fcntl::{fcntl, FcntlArg, FdFlag};
    fcntl(fd, FcntlArg::F_GETFD)
        .with_context(|| format!("Result channel fd {} is not open", fd))?;
    // Test commands must not inherit the channel
    fcntl(fd, FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC))
        .with_context(|| format!("Cannot set close-on-exec on fd {}", fd))?;

    // Safety: the fd is open and nothing else in this process owns it.
    Ok(unsafe { File::from_raw_fd(fd) })
}
