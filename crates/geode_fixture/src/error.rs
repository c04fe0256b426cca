// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::LifecycleState;

/// A specialized `Result` type for cluster fixture operations
/// that return a fixture [`Error`][enum@Error] on failure.
pub type Result<T> = std::result::Result<T, Error>;

/// An error raised while provisioning or administering an ephemeral cluster.
///
/// Only the launch path and ad-hoc `gfsh` sessions surface these. Shutdown never returns an
/// error, it logs whatever went wrong and moves on.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The administrative tool could not be started, typically because it is not installed
    /// at the resolved location or is not executable.
    #[error("failed to spawn {}: {source}", .program.display())]
    Spawn {
        /// The executable that was being started.
        program: PathBuf,
        /// The underlying operating system error.
        #[source]
        source: std::io::Error,
    },

    /// No free loopback port could be obtained from the operating system.
    #[error("failed to allocate a free TCP port: {0}")]
    PortAllocation(#[source] std::io::Error),

    /// The administrative tool was still running when the timeout elapsed. The process has
    /// been killed by the time this is returned.
    #[error("{} did not exit within {timeout:?}: has_exited = {has_exited}", .program.display())]
    TimedOut {
        /// The executable that was running.
        program: PathBuf,
        /// How long we waited.
        timeout: Duration,
        /// Whether the process had exited when the timeout elapsed. Always `false`.
        has_exited: bool,
    },

    /// The administrative tool exited with a failure status.
    ///
    /// `code` is `None` when the process was terminated by a signal.
    #[error("{} exited with code {code:?}", .program.display())]
    NonZeroExit {
        /// The executable that exited.
        program: PathBuf,
        /// The exit code, if the process exited normally.
        code: Option<i32>,
    },

    /// `launch` was called on a fixture that has already been launched.
    #[error("the cluster has already been launched")]
    AlreadyLaunched,

    /// An operation that needs a running cluster was attempted in some other state.
    #[error("the cluster is not running (state: {state:?})")]
    NotRunning {
        /// The state the fixture was in.
        state: LifecycleState,
    },

    /// We are forwarding an error received from the standard library's I/O APIs.
    #[error(transparent)]
    StdIo(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_message_names_has_exited() {
        let error = Error::TimedOut {
            program: PathBuf::from("gfsh"),
            timeout: Duration::from_secs(600),
            has_exited: false,
        };

        assert_eq!(error.to_string(), "gfsh did not exit within 600s: has_exited = false");
    }

    #[test]
    fn non_zero_exit_message_names_code() {
        let error = Error::NonZeroExit {
            program: PathBuf::from("/opt/geode/bin/gfsh"),
            code: Some(1),
        };

        assert_eq!(error.to_string(), "/opt/geode/bin/gfsh exited with code Some(1)");
    }
}
