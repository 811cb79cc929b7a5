//! Build tool execution.
//!
//! [`SystemRunner`] spawns the build tool, streams its output to the
//! terminal (optionally through xcpretty) and captures the raw text.
//! [`RetryingBuildExecutor`] wraps a runner, brackets every attempt with a
//! [`TimeInterval`] and recovers from a corrupted Swift package cache by
//! deleting it and running the build exactly once more.

use std::fs;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{ChildStdin, Command, Stdio};
use std::sync::{Arc, Mutex};
use std::thread;

use tracing::{debug, info, warn};

use crate::builders::common::last_n_lines;
use crate::builders::xcodebuild::CommandSpec;
use crate::types::{BuildError, BuildRun, TimeInterval};
use crate::xcode::cache::SWIFT_PACKAGES_STATE_INVALID;
use crate::xcode::formatter::LogFormatter;

/// Number of log lines carried by [`BuildError::BuildFailed`].
pub const LOG_TAIL_LINES: usize = 20;

/// Captured result of one process execution.
#[derive(Debug)]
pub struct ProcessOutput {
    /// Combined stdout and stderr text.
    pub log: String,
    /// `Ok(())` when the process exited successfully.
    pub status: Result<(), BuildError>,
}

/// Executes an external command to completion, capturing its output.
pub trait ProcessRunner {
    fn run(&self, cmd: &CommandSpec) -> ProcessOutput;
}

impl<R: ProcessRunner + ?Sized> ProcessRunner for &R {
    fn run(&self, cmd: &CommandSpec) -> ProcessOutput {
        (**self).run(cmd)
    }
}

/// [`ProcessRunner`] spawning real processes.
///
/// Output is echoed while the process runs. With [`LogFormatter::Xcpretty`]
/// the output is piped into `xcpretty` instead, but the captured log always
/// holds the raw tool output.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner {
    formatter: LogFormatter,
}

impl SystemRunner {
    pub fn new(formatter: LogFormatter) -> Self {
        Self { formatter }
    }

    fn spawn_formatter(&self) -> Option<(std::process::Child, ChildStdin)> {
        if self.formatter != LogFormatter::Xcpretty {
            return None;
        }
        let mut child = match Command::new("xcpretty")
            .stdin(Stdio::piped())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                warn!("Failed to start xcpretty, printing raw output: {}", e);
                return None;
            }
        };
        let stdin = child.stdin.take()?;
        Some((child, stdin))
    }
}

#[derive(Clone)]
enum Echo {
    Stdout,
    Stderr,
    Formatter(Arc<Mutex<ChildStdin>>),
}

impl Echo {
    fn write(&self, chunk: &[u8]) {
        // a closed terminal or formatter must not abort the build
        let _ = match self {
            Echo::Stdout => io::stdout().write_all(chunk),
            Echo::Stderr => io::stderr().write_all(chunk),
            Echo::Formatter(stdin) => match stdin.lock() {
                Ok(mut stdin) => stdin.write_all(chunk),
                Err(_) => Ok(()),
            },
        };
    }
}

fn pump<R: Read + Send + 'static>(
    source: R,
    echo: Echo,
    log: Arc<Mutex<String>>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut reader = BufReader::new(source);
        let mut line = Vec::new();
        loop {
            line.clear();
            match reader.read_until(b'\n', &mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    echo.write(&line);
                    if let Ok(mut log) = log.lock() {
                        log.push_str(&String::from_utf8_lossy(&line));
                    }
                }
            }
        }
    })
}

impl ProcessRunner for SystemRunner {
    fn run(&self, cmd: &CommandSpec) -> ProcessOutput {
        let mut command = cmd.to_command();
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                return ProcessOutput {
                    log: String::new(),
                    status: Err(BuildError::Command {
                        program: cmd.program.clone(),
                        source: e,
                    }),
                };
            }
        };

        let mut formatter = None;
        let (out_echo, err_echo) = match self.spawn_formatter() {
            Some((child, stdin)) => {
                formatter = Some(child);
                let shared = Echo::Formatter(Arc::new(Mutex::new(stdin)));
                (shared.clone(), shared)
            }
            None => (Echo::Stdout, Echo::Stderr),
        };

        let log = Arc::new(Mutex::new(String::new()));
        let mut pumps = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            pumps.push(pump(stdout, out_echo, Arc::clone(&log)));
        }
        if let Some(stderr) = child.stderr.take() {
            pumps.push(pump(stderr, err_echo, Arc::clone(&log)));
        }

        let status = child.wait();
        // the pumps own the last handles to xcpretty's stdin; joining them closes it
        for handle in pumps {
            let _ = handle.join();
        }
        if let Some(mut formatter) = formatter
            && let Err(e) = formatter.wait()
        {
            warn!("xcpretty did not exit cleanly: {}", e);
        }

        let log = match Arc::try_unwrap(log) {
            Ok(log) => log.into_inner().unwrap_or_else(|e| e.into_inner()),
            Err(shared) => shared.lock().map(|l| l.clone()).unwrap_or_default(),
        };

        let status = match status {
            Ok(status) if status.success() => Ok(()),
            Ok(status) => Err(BuildError::BuildFailed {
                status: status.to_string(),
                log_tail: last_n_lines(&log, LOG_TAIL_LINES),
            }),
            Err(e) => Err(BuildError::Command {
                program: cmd.program.clone(),
                source: e,
            }),
        };
        ProcessOutput { log, status }
    }
}

/// Runs the build and retries once if the Swift package cache is corrupted.
pub struct RetryingBuildExecutor<R: ProcessRunner> {
    runner: R,
    swift_packages_path: Option<PathBuf>,
}

impl<R: ProcessRunner> RetryingBuildExecutor<R> {
    /// Creates an executor. Without a cache path failures are never retried.
    pub fn new(runner: R, swift_packages_path: Option<PathBuf>) -> Self {
        Self {
            runner,
            swift_packages_path,
        }
    }

    /// Runs `cmd`, returning the log and window of the last attempt.
    pub fn run(&self, cmd: &CommandSpec) -> BuildRun {
        let first = self.attempt(cmd);
        if first.outcome.is_err()
            && let Some(cache) = &self.swift_packages_path
            && first.log.contains(SWIFT_PACKAGES_STATE_INVALID)
        {
            warn!("Build failed, swift packages cache is in an invalid state");
            info!("Removing {} and retrying the build", cache.display());
            if let Err(e) = remove_cache(cache) {
                return BuildRun {
                    outcome: Err(BuildError::CacheCleanup {
                        path: cache.clone(),
                        source: e,
                    }),
                    ..first
                };
            }
            return self.attempt(cmd);
        }
        first
    }

    fn attempt(&self, cmd: &CommandSpec) -> BuildRun {
        info!("$ {}", cmd);
        let mut interval = TimeInterval::open();
        let output = self.runner.run(cmd);
        interval.close();
        debug!("Build attempt finished, success: {}", output.status.is_ok());

        BuildRun {
            log: output.log,
            interval,
            outcome: output.status,
        }
    }
}

fn remove_cache(path: &Path) -> io::Result<()> {
    match fs::remove_dir_all(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}
