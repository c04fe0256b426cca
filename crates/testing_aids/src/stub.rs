// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// Printed on standard output by every stub invocation.
pub const STUB_STDOUT_LINE: &str = "stub gfsh: executing commands";

/// Printed on standard error by every stub invocation.
pub const STUB_STDERR_LINE: &str = "stub gfsh: this goes to stderr";

/// Separates invocations in the argument log; never a real `gfsh` argument.
const INVOCATION_SEPARATOR: &str = "--";

/// A shell script standing in for `gfsh`.
///
/// Every invocation appends its arguments to a log inside the stub's private directory (see
/// [`invocations`](Self::invocations)), prints one line to each output stream and then behaves
/// as configured. The directory is deleted when the stub is dropped.
#[derive(Debug)]
pub struct StubGfsh {
    dir: TempDir,
    path: PathBuf,
}

impl StubGfsh {
    /// Exits successfully.
    #[must_use]
    pub fn succeeding() -> Self {
        Self::with_behavior("exit 0")
    }

    /// Exits with `code`.
    #[must_use]
    pub fn exiting_with(code: i32) -> Self {
        Self::with_behavior(&format!("exit {code}"))
    }

    /// Never exits on its own.
    #[must_use]
    pub fn hanging() -> Self {
        // `exec` so that killing the shell kills the sleeper too.
        Self::with_behavior("exec sleep 600")
    }

    /// Succeeds except for sessions that contain a `shutdown` command, which exit with 1.
    #[must_use]
    pub fn failing_shutdown() -> Self {
        Self::with_behavior(
            r#"case "$*" in
  *shutdown*) exit 1 ;;
esac
exit 0"#,
        )
    }

    /// Succeeds except for sessions that contain a `shutdown` command, which never exit.
    #[must_use]
    pub fn hanging_shutdown() -> Self {
        Self::with_behavior(
            r#"case "$*" in
  *shutdown*) exec sleep 600 ;;
esac
exit 0"#,
        )
    }

    /// Path to the stub executable.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The arguments of every invocation so far, oldest first.
    #[must_use]
    pub fn invocations(&self) -> Vec<Vec<String>> {
        let Ok(log) = fs::read_to_string(self.args_log()) else {
            return Vec::new();
        };

        let mut invocations = Vec::new();
        let mut current = Vec::new();
        for line in log.lines() {
            if line == INVOCATION_SEPARATOR {
                invocations.push(std::mem::take(&mut current));
            } else {
                current.push(line.to_string());
            }
        }

        invocations
    }

    /// The `gfsh` commands of every invocation, i.e. the values of the `-e` arguments.
    #[must_use]
    pub fn commands(&self) -> Vec<Vec<String>> {
        self.invocations()
            .into_iter()
            .map(|args| {
                args.chunks(2)
                    .filter_map(|pair| match pair {
                        [flag, command] if flag == "-e" => Some(command.clone()),
                        _ => None,
                    })
                    .collect()
            })
            .collect()
    }

    fn args_log(&self) -> PathBuf {
        self.dir.path().join("args.log")
    }

    /// # Panics
    ///
    /// Panics if the stub cannot be written, which only happens if the temporary directory is
    /// unusable.
    fn with_behavior(behavior: &str) -> Self {
        let dir = tempfile::tempdir().expect("failed to create stub directory");
        let path = dir.path().join("gfsh");

        let stub = Self { dir, path };
        let args_log = stub.args_log();

        let script = format!(
            r#"#!/bin/sh
for arg in "$@"; do
  printf '%s\n' "$arg" >> '{log}'
done
printf '%s\n' '{INVOCATION_SEPARATOR}' >> '{log}'
echo '{STUB_STDOUT_LINE}'
echo '{STUB_STDERR_LINE}' >&2
{behavior}
"#,
            log = args_log.display(),
        );

        fs::write(&stub.path, script).expect("failed to write stub gfsh");
        fs::set_permissions(&stub.path, fs::Permissions::from_mode(0o755)).expect("failed to make stub gfsh executable");

        stub
    }
}
