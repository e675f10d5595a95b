//! Four-channel worker process.
//!
//! Each worker exposes stdin (requests), stdout and stderr (diagnostic
//! passthrough) and a dedicated result channel mapped to fd 3 in the child.
//! Reader tasks forward raw chunks to the coordinator over one event channel;
//! they never interpret the bytes.

use futures::future::join_all;
use std::fs::File;
use std::io;
use std::os::fd::{AsRawFd, OwnedFd, RawFd};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::unix::pipe;
use tokio::process::{ChildStdin, Command};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace};

use super::spawn::WorkerSpec;
use crate::error::{Result, RunnerError};
use crate::protocol::{RESULT_FD, RESULT_FD_ENV};

/// Read buffer size for each forwarded stream (8KB).
const CHUNK_SIZE: usize = 8 * 1024;

/// How long the supervisor waits for streams to drain after the child exits.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Event forwarded from a worker's transport to the coordinator.
#[derive(Debug, Clone, PartialEq)]
pub struct LaneEvent {
    pub lane: usize,
    pub kind: LaneEventKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LaneEventKind {
    Stdout(Vec<u8>),
    Stderr(Vec<u8>),
    Result(Vec<u8>),
    /// Always the last event of a lane; every stream has drained by then.
    Exit(Option<i32>),
}

/// Handle to a running worker process.
pub struct WorkerProcess {
    lane: usize,
    stdin: Option<ChildStdin>,
    kill: Option<oneshot::Sender<()>>,
}

impl WorkerProcess {
    /// Spawn the worker and wire its streams to `events`.
    ///
    /// Never blocks on the child; returns as soon as the process exists.
    pub fn start(
        spec: &WorkerSpec,
        lane: usize,
        events: mpsc::UnboundedSender<LaneEvent>,
    ) -> Result<Self> {
        let (result_read, result_write) = result_pipe()?;
        let write_fd = result_write.as_raw_fd();

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .env(RESULT_FD_ENV, RESULT_FD.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // Safety: the closure only calls async-signal-safe dup2/fcntl.
        unsafe {
            cmd.pre_exec(move || install_result_fd(write_fd));
        }

        let mut child = cmd
            .spawn()
            .map_err(|source| RunnerError::Spawn { lane, source })?;

        // The child owns the write end now; keeping ours open would hide EOF.
        drop(result_write);

        let pid = child.id();
        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let results = pipe::Receiver::from_file(File::from(result_read))?;

        debug!(lane, pid, "Started worker {:?}", spec.program);

        let mut readers = Vec::with_capacity(3);
        if let Some(stdout) = stdout {
            readers.push(tokio::spawn(forward(
                stdout,
                lane,
                events.clone(),
                LaneEventKind::Stdout,
            )));
        }
        if let Some(stderr) = stderr {
            readers.push(tokio::spawn(forward(
                stderr,
                lane,
                events.clone(),
                LaneEventKind::Stderr,
            )));
        }
        readers.push(tokio::spawn(forward(
            results,
            lane,
            events.clone(),
            LaneEventKind::Result,
        )));

        let (kill_tx, kill_rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            let status = tokio::select! {
                status = child.wait() => status,
                _ = kill_rx => {
                    debug!(lane, "Killing worker");
                    if let Err(e) = child.start_kill() {
                        debug!(lane, "Kill failed: {}", e);
                    }
                    child.wait().await
                }
            };

            let aborts: Vec<_> = readers.iter().map(|r| r.abort_handle()).collect();
            if tokio::time::timeout(DRAIN_TIMEOUT, join_all(readers))
                .await
                .is_err()
            {
                debug!(lane, "Worker streams still open after exit; abandoning them");
                for abort in aborts {
                    abort.abort();
                }
            }

            let code = match status {
                Ok(status) => exit_code(status),
                Err(e) => {
                    debug!(lane, "Failed to wait for worker: {}", e);
                    None
                }
            };
            let _ = events.send(LaneEvent {
                lane,
                kind: LaneEventKind::Exit(code),
            });
        });

        Ok(Self {
            lane,
            stdin,
            kill: Some(kill_tx),
        })
    }

    /// Append bytes to the worker's stdin.
    pub async fn write(&mut self, data: &[u8]) -> io::Result<()> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "worker stdin closed"))?;
        stdin.write_all(data).await?;
        stdin.flush().await
    }

    /// Close stdin so the worker sees EOF.
    pub fn close_input(&mut self) {
        self.stdin.take();
    }

    /// Close stdin and kill the worker if it is still running after `grace`.
    pub fn close(&mut self, grace: Duration) {
        self.close_input();
        if let Some(kill) = self.kill.take() {
            let lane = self.lane;
            tokio::spawn(async move {
                tokio::time::sleep(grace).await;
                // Fails once the supervisor has seen the exit
                if kill.send(()).is_ok() {
                    debug!(lane, "Worker outlived its {:?} grace period", grace);
                }
            });
        }
    }

    pub fn is_input_open(&self) -> bool {
        self.stdin.is_some()
    }

    /// Forcibly terminate the worker. The exit still arrives as an event.
    pub fn kill(&mut self) {
        if let Some(kill) = self.kill.take() {
            let _ = kill.send(());
        }
    }
}

impl Drop for WorkerProcess {
    fn drop(&mut self) {
        self.kill();
    }
}

/// Forward every chunk read from `reader` until EOF.
async fn forward<R>(
    mut reader: R,
    lane: usize,
    events: mpsc::UnboundedSender<LaneEvent>,
    wrap: fn(Vec<u8>) -> LaneEventKind,
) where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                trace!(lane, bytes = n, "Forwarding chunk");
                if events
                    .send(LaneEvent {
                        lane,
                        kind: wrap(buf[..n].to_vec()),
                    })
                    .is_err()
                {
                    break;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                debug!(lane, "Stream read failed: {}", e);
                break;
            }
        }
    }
}

/// Create the result pipe with close-on-exec set on both ends, so only the
/// worker it was made for inherits the write end (via `dup2` onto fd 3).
fn result_pipe() -> Result<(OwnedFd, OwnedFd)> {
    #[cfg(any(target_os = "linux", target_os = "android"))]
    {
        use nix::fcntl::OFlag;
        Ok(nix::unistd::pipe2(OFlag::O_CLOEXEC)?)
    }

    #[cfg(not(any(target_os = "linux", target_os = "android")))]
    {
        use nix::fcntl::{fcntl, FcntlArg, FdFlag};
        let (read, write) = nix::unistd::pipe()?;
        fcntl(read.as_raw_fd(), FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC))?;
        fcntl(write.as_raw_fd(), FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC))?;
        Ok((read, write))
    }
}

/// Runs in the forked child before exec.
fn install_result_fd(write_fd: RawFd) -> io::Result<()> {
    use nix::fcntl::{fcntl, FcntlArg, FdFlag};

    if write_fd == RESULT_FD {
        fcntl(write_fd, FcntlArg::F_SETFD(FdFlag::empty()))?;
    } else {
        nix::unistd::dup2(write_fd, RESULT_FD)?;
    }
    Ok(())
}

fn exit_code(status: ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;

    // Signal deaths follow the shell convention
    status
        .code()
        .or_else(|| status.signal().map(|signal| 128 + signal))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::LineBuffer;

    fn sh(script: &str) -> WorkerSpec {
        WorkerSpec::new("/bin/sh").arg("-c").arg(script)
    }

    async fn collect(rx: &mut mpsc::UnboundedReceiver<LaneEvent>) -> Vec<LaneEventKind> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            let done = matches!(event.kind, LaneEventKind::Exit(_));
            events.push(event.kind);
            if done {
                break;
            }
        }
        events
    }

    fn concat(events: &[LaneEventKind], pick: fn(&LaneEventKind) -> Option<&Vec<u8>>) -> String {
        let bytes: Vec<u8> = events.iter().filter_map(pick).flatten().copied().collect();
        String::from_utf8(bytes).unwrap()
    }

    #[tokio::test]
    async fn test_four_channels_are_separate() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let spec = sh("read line; echo \"out:$line\"; echo err >&2; echo result >&3; exit 4");
        let mut proc = WorkerProcess::start(&spec, 2, tx).unwrap();
        proc.write(b"hello\n").await.unwrap();

        let events = collect(&mut rx).await;

        let stdout = concat(&events, |e| match e {
            LaneEventKind::Stdout(b) => Some(b),
            _ => None,
        });
        let stderr = concat(&events, |e| match e {
            LaneEventKind::Stderr(b) => Some(b),
            _ => None,
        });
        let results = concat(&events, |e| match e {
            LaneEventKind::Result(b) => Some(b),
            _ => None,
        });

        assert_eq!(stdout, "out:hello\n");
        assert_eq!(stderr, "err\n");
        assert_eq!(results, "result\n");
        assert_eq!(events.last(), Some(&LaneEventKind::Exit(Some(4))));
    }

    #[tokio::test]
    async fn test_results_arrive_before_exit() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let spec = sh("i=0; while [ $i -lt 50 ]; do echo \"line $i\" >&3; i=$((i+1)); done");
        let _proc = WorkerProcess::start(&spec, 0, tx).unwrap();

        let events = collect(&mut rx).await;
        let mut buffer = LineBuffer::new();
        let mut lines = Vec::new();
        for event in &events {
            if let LaneEventKind::Result(chunk) = event {
                lines.extend(buffer.push(chunk));
            }
        }

        assert_eq!(lines.len(), 50);
        assert_eq!(lines[49], "line 49");
        assert_eq!(events.last(), Some(&LaneEventKind::Exit(Some(0))));
    }

    #[tokio::test]
    async fn test_close_input_ends_worker() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut proc = WorkerProcess::start(&sh("cat >/dev/null"), 1, tx).unwrap();
        assert!(proc.is_input_open());
        proc.close_input();
        assert!(!proc.is_input_open());

        let events = collect(&mut rx).await;
        assert_eq!(events.last(), Some(&LaneEventKind::Exit(Some(0))));
        assert!(proc.write(b"late\n").await.is_err());
    }

    #[tokio::test]
    async fn test_close_kills_after_grace() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        // Ignores EOF on stdin
        let mut proc = WorkerProcess::start(&sh("exec sleep 30"), 0, tx).unwrap();
        proc.close(Duration::from_millis(50));

        let events = collect(&mut rx).await;
        assert_eq!(events.last(), Some(&LaneEventKind::Exit(Some(128 + 9))));
    }

    #[tokio::test]
    async fn test_close_lets_worker_finish() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut proc = WorkerProcess::start(&sh("cat >/dev/null; exit 0"), 0, tx).unwrap();
        proc.close(Duration::from_secs(5));

        let events = collect(&mut rx).await;
        assert_eq!(events.last(), Some(&LaneEventKind::Exit(Some(0))));
    }

    #[tokio::test]
    async fn test_kill_reports_signal_exit() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut proc = WorkerProcess::start(&sh("exec sleep 30"), 0, tx).unwrap();
        proc.kill();

        let events = collect(&mut rx).await;
        assert_eq!(events.last(), Some(&LaneEventKind::Exit(Some(128 + 9))));
    }

    #[tokio::test]
    async fn test_spawn_failure() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let spec = WorkerSpec::new("/nonexistent/testlane-worker");
        let err = WorkerProcess::start(&spec, 3, tx).err().unwrap();
        assert!(matches!(err, RunnerError::Spawn { lane: 3, .. }));
    }
}
