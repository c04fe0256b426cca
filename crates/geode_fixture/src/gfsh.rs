// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Locating and running the `gfsh` administrative shell.

use std::ffi::OsString;
use std::fmt;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::{Error, GfshScript, Result};

/// Environment variable naming the `gfsh` executable directly.
pub const GFSH_ENV: &str = "GEODE_GFSH";

/// Environment variable naming the root of a Geode installation.
pub const GEODE_HOME_ENV: &str = "GEODE_HOME";

#[cfg(windows)]
const GFSH_EXECUTABLE: &str = "gfsh.bat";
#[cfg(not(windows))]
const GFSH_EXECUTABLE: &str = "gfsh";

/// How often we check whether the child has exited while waiting for it.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Where to find the `gfsh` executable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum GfshLocation {
    /// Resolve from the environment: `GEODE_GFSH`, then `GEODE_HOME/bin/gfsh`, then `gfsh`
    /// on the `PATH`.
    #[default]
    FromEnvironment,
    /// Use this executable.
    Path(PathBuf),
}

impl GfshLocation {
    /// Uses the executable at `path`.
    #[must_use]
    pub fn path(path: impl Into<PathBuf>) -> Self {
        Self::Path(path.into())
    }

    /// Returns the executable to launch.
    #[must_use]
    pub fn resolve(&self) -> PathBuf {
        match self {
            Self::Path(path) => path.clone(),
            Self::FromEnvironment => resolve_with(|key| std::env::var_os(key)),
        }
    }
}

fn resolve_with(lookup: impl Fn(&str) -> Option<OsString>) -> PathBuf {
    if let Some(gfsh) = lookup(GFSH_ENV).filter(|v| !v.is_empty()) {
        return PathBuf::from(gfsh);
    }

    if let Some(home) = lookup(GEODE_HOME_ENV).filter(|v| !v.is_empty()) {
        return PathBuf::from(home).join("bin").join(GFSH_EXECUTABLE);
    }

    PathBuf::from(GFSH_EXECUTABLE)
}

#[derive(Debug, Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

impl Stream {
    fn log(self, line: &str) {
        match self {
            Self::Stdout => tracing::debug!(stream = %self, "{line}"),
            Self::Stderr => tracing::warn!(stream = %self, "{line}"),
        }
    }
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
        })
    }
}

/// Runs `program` with `script` in `working_directory` and waits up to `timeout` for it to exit.
///
/// Both output streams are forwarded line by line to `tracing` from background threads that
/// inherit the caller's subscriber and span. Those threads are not joined: members started by
/// `gfsh` may keep the pipes open long after the shell itself has exited.
///
/// A child still running at the deadline is killed before [`Error::TimedOut`] is returned.
pub(crate) fn run(program: &Path, working_directory: &Path, script: &GfshScript, timeout: Duration) -> Result<()> {
    tracing::debug!(program = %program.display(), dir = %working_directory.display(), "gfsh {script}");

    let mut child = Command::new(program)
        .args(script.to_args())
        .current_dir(working_directory)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| Error::Spawn {
            program: program.to_path_buf(),
            source,
        })?;

    if let Some(stdout) = child.stdout.take() {
        drain(stdout, Stream::Stdout);
    }
    if let Some(stderr) = child.stderr.take() {
        drain(stderr, Stream::Stderr);
    }

    supervise(&mut child, program, timeout)
}

/// The parts of a running child process we need in order to wait for it or get rid of it.
trait Supervised {
    fn try_wait(&mut self) -> std::io::Result<Option<ExitStatus>>;
    fn kill(&mut self) -> std::io::Result<()>;
    fn wait(&mut self) -> std::io::Result<ExitStatus>;
}

impl Supervised for Child {
    fn try_wait(&mut self) -> std::io::Result<Option<ExitStatus>> {
        Self::try_wait(self)
    }

    fn kill(&mut self) -> std::io::Result<()> {
        Self::kill(self)
    }

    fn wait(&mut self) -> std::io::Result<ExitStatus> {
        Self::wait(self)
    }
}

/// Waits up to `timeout` for `child` and maps the outcome to a result.
///
/// The child is killed and reaped before returning on every path where it may still be running:
/// a timeout, or a failure to query its status.
fn supervise(child: &mut impl Supervised, program: &Path, timeout: Duration) -> Result<()> {
    let status = match wait_until(child, Instant::now() + timeout) {
        Ok(status) => status,
        Err(error) => {
            kill(child);
            return Err(error);
        }
    };

    tracing::debug!(
        program = %program.display(),
        has_exited = status.is_some(),
        code = ?status.and_then(|s| s.code()),
        "gfsh finished"
    );

    match status {
        Some(status) if status.success() => Ok(()),
        Some(status) => Err(Error::NonZeroExit {
            program: program.to_path_buf(),
            code: status.code(),
        }),
        None => {
            kill(child);
            Err(Error::TimedOut {
                program: program.to_path_buf(),
                timeout,
                has_exited: false,
            })
        }
    }
}

/// Polls `child` until it exits or `deadline` passes. `None` means it is still running.
fn wait_until(child: &mut impl Supervised, deadline: Instant) -> Result<Option<ExitStatus>> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }

        let now = Instant::now();
        if now >= deadline {
            return Ok(None);
        }

        thread::sleep(POLL_INTERVAL.min(deadline - now));
    }
}

fn kill(child: &mut impl Supervised) {
    if let Err(error) = child.kill() {
        tracing::debug!(%error, "failed to kill gfsh");
    }

    // Reap it so we do not leave a zombie behind.
    if let Err(error) = child.wait() {
        tracing::debug!(%error, "failed to reap gfsh");
    }
}

fn drain(reader: impl Read + Send + 'static, stream: Stream) {
    let dispatch = tracing::dispatcher::get_default(Clone::clone);
    let span = tracing::Span::current();

    let spawned = thread::Builder::new().name(format!("gfsh {stream}")).spawn(move || {
        tracing::dispatcher::with_default(&dispatch, || {
            let _entered = span.enter();

            for line in BufReader::new(reader).lines() {
                match line {
                    Ok(line) => stream.log(&line),
                    Err(error) => {
                        tracing::debug!(%stream, %error, "stopped reading gfsh output");
                        break;
                    }
                }
            }
        });
    });

    if let Err(error) = spawned {
        tracing::warn!(%stream, %error, "failed to start output drain thread; gfsh output will be discarded");
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<OsString> {
        let vars: HashMap<String, OsString> = vars.iter().map(|(k, v)| ((*k).to_string(), OsString::from(v))).collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn explicit_variable_wins() {
        let resolved = resolve_with(lookup(&[(GFSH_ENV, "/custom/gfsh"), (GEODE_HOME_ENV, "/opt/geode")]));

        assert_eq!(resolved, PathBuf::from("/custom/gfsh"));
    }

    #[test]
    fn geode_home_is_second() {
        let resolved = resolve_with(lookup(&[(GEODE_HOME_ENV, "/opt/geode")]));

        assert_eq!(resolved, Path::new("/opt/geode").join("bin").join(GFSH_EXECUTABLE));
    }

    #[test]
    fn empty_variables_are_ignored() {
        let resolved = resolve_with(lookup(&[(GFSH_ENV, ""), (GEODE_HOME_ENV, "")]));

        assert_eq!(resolved, PathBuf::from(GFSH_EXECUTABLE));
    }

    #[test]
    fn falls_back_to_path_lookup() {
        assert_eq!(resolve_with(lookup(&[])), PathBuf::from(GFSH_EXECUTABLE));
    }

    #[test]
    fn explicit_path_is_used_verbatim() {
        assert_eq!(GfshLocation::path("/x/gfsh").resolve(), PathBuf::from("/x/gfsh"));
    }

    #[test]
    fn missing_program_is_a_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let program = dir.path().join("no-such-gfsh");

        let error = run(&program, dir.path(), &GfshScript::new(), Duration::from_secs(1)).unwrap_err();

        assert!(matches!(error, Error::Spawn { .. }), "{error:?}");
    }

    /// A child whose status can never be queried.
    #[derive(Debug, Default)]
    struct UnqueryableChild {
        killed: bool,
        reaped: bool,
    }

    impl Supervised for UnqueryableChild {
        fn try_wait(&mut self) -> std::io::Result<Option<ExitStatus>> {
            Err(std::io::Error::other("status unavailable"))
        }

        fn kill(&mut self) -> std::io::Result<()> {
            self.killed = true;
            Ok(())
        }

        fn wait(&mut self) -> std::io::Result<ExitStatus> {
            self.reaped = true;
            Err(std::io::Error::other("status unavailable"))
        }
    }

    #[test]
    fn failing_status_query_kills_the_child() {
        let mut child = UnqueryableChild::default();

        let error = supervise(&mut child, Path::new("gfsh"), Duration::from_secs(5)).unwrap_err();

        assert!(matches!(error, Error::StdIo(_)), "{error:?}");
        assert!(child.killed);
        assert!(child.reaped);
    }

    /// A child that never exits on its own.
    #[derive(Debug, Default)]
    struct RunningChild {
        killed: bool,
    }

    impl Supervised for RunningChild {
        fn try_wait(&mut self) -> std::io::Result<Option<ExitStatus>> {
            Ok(None)
        }

        fn kill(&mut self) -> std::io::Result<()> {
            self.killed = true;
            Ok(())
        }

        fn wait(&mut self) -> std::io::Result<ExitStatus> {
            Err(std::io::Error::other("no status after kill"))
        }
    }

    #[test]
    fn timeout_kills_the_child() {
        let mut child = RunningChild::default();

        let error = supervise(&mut child, Path::new("gfsh"), Duration::from_millis(10)).unwrap_err();

        assert!(matches!(error, Error::TimedOut { has_exited: false, .. }), "{error:?}");
        assert!(child.killed);
    }
}
