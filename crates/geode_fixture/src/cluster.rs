// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fs;
use std::path::{Path, PathBuf};

use crate::cleanup::remove_subdirectories;
use crate::ports::free_tcp_ports;
use crate::{ClusterOptions, Error, GfshCommand, GfshScript, LocatorAddress, Result, gfsh};

/// Where a [`Cluster`] is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    /// Configured, nothing launched yet.
    Uninitialized,
    /// `gfsh` is starting the locator and server.
    Starting,
    /// The launch sequence completed successfully.
    Running,
    /// `gfsh` is stopping the cluster.
    ShuttingDown,
    /// Shutdown was attempted. Residue may remain if it failed.
    Stopped,
}

/// A throwaway locator plus one cache server, owned by a single test.
///
/// The cluster is shut down when the value is dropped, whether the test passed or panicked.
/// Shutdown failures are logged and otherwise ignored so that they never mask the outcome of
/// the test that owns the cluster.
///
/// ```no_run
/// use geode_fixture::{Cluster, ClusterOptions};
///
/// let cluster = Cluster::start(ClusterOptions::new().with_region_names(["DistRegionAck"]));
///
/// // Point a Geode client pool at the locator.
/// let locator = cluster.locator();
/// assert_eq!(locator.host(), "localhost");
/// ```
#[derive(Debug)]
pub struct Cluster {
    options: ClusterOptions,
    program: PathBuf,
    working_directory: PathBuf,
    owns_working_directory: bool,
    locator_port: Option<u16>,
    state: LifecycleState,
}

impl Cluster {
    /// Creates a fixture in the [`LifecycleState::Uninitialized`] state. Nothing is spawned and
    /// the filesystem is not touched until [`launch`](Self::launch).
    ///
    /// Unless the options name a working directory, the fixture gets a fresh one that no other
    /// fixture shares, so fixtures with the same options can run side by side.
    #[must_use]
    pub fn new(options: ClusterOptions) -> Self {
        let program = options.gfsh().resolve();
        let working_directory = options.resolve_working_directory();
        let owns_working_directory = options.working_directory().is_none();

        Self {
            options,
            program,
            working_directory,
            owns_working_directory,
            locator_port: None,
            state: LifecycleState::Uninitialized,
        }
    }

    /// Creates and launches a fixture, panicking if the cluster does not come up.
    ///
    /// # Panics
    ///
    /// Panics with the launch error if `gfsh` cannot be spawned, exits with a failure status
    /// or does not finish within the launch timeout.
    #[must_use]
    #[expect(clippy::panic, reason = "failing to launch must fail the owning test")]
    pub fn start(options: ClusterOptions) -> Self {
        let mut cluster = Self::new(options);

        if let Err(error) = cluster.launch() {
            panic!("cluster {} failed to launch: {error}", cluster.options.name());
        }

        cluster
    }

    /// Starts the locator and server, pre-creates the configured regions and returns the
    /// locator port.
    ///
    /// Subdirectories of the working directory are deleted first, on a best-effort basis.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyLaunched`] on any call after the first. Otherwise returns an
    /// error if no ports can be allocated, `gfsh` cannot be spawned, it exits with a failure
    /// status or it is still running when the launch timeout elapses. The fixture stays in
    /// [`LifecycleState::Starting`] after a failure; dropping it still attempts a shutdown.
    pub fn launch(&mut self) -> Result<u16> {
        if self.state != LifecycleState::Uninitialized {
            return Err(Error::AlreadyLaunched);
        }

        let _span = tracing::info_span!("cluster", name = %self.options.name()).entered();

        self.state = LifecycleState::Starting;

        fs::create_dir_all(&self.working_directory)?;
        remove_subdirectories(&self.working_directory);

        let [locator, jmx_manager] = free_tcp_ports::<2>()?;
        self.locator_port = Some(locator);
        tracing::info!(locator_port = locator, jmx_manager_port = jmx_manager, "launching cluster");

        let script = GfshScript::launch(
            locator,
            jmx_manager,
            self.options.read_serialized(),
            self.options.region_names().iter().map(String::as_str),
            self.options.region_type(),
        );
        gfsh::run(&self.program, &self.working_directory, &script, self.options.launch_timeout())?;

        self.state = LifecycleState::Running;
        tracing::info!(locator_port = locator, state = ?self.state, "cluster is running");

        Ok(locator)
    }

    /// The locator port, once ports have been allocated.
    #[must_use]
    pub fn locator_port(&self) -> Option<u16> {
        self.locator_port
    }

    /// The address Geode clients should add to their pool.
    ///
    /// # Panics
    ///
    /// Panics if the cluster was never launched.
    #[must_use]
    #[expect(clippy::panic, reason = "asking for the locator of an unlaunched cluster is a test bug")]
    pub fn locator(&self) -> LocatorAddress {
        match self.locator_port() {
            Some(port) => LocatorAddress::localhost(port),
            None => panic!("cluster {} has not been launched", self.options.name()),
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// The options this fixture was created with.
    #[must_use]
    pub fn options(&self) -> &ClusterOptions {
        &self.options
    }

    /// The directory `gfsh` runs in and members write their files to.
    #[must_use]
    pub fn working_directory(&self) -> &Path {
        &self.working_directory
    }

    /// Runs `commands` in a `gfsh` session connected to this cluster, e.g. to deploy a jar or
    /// create an additional region.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotRunning`] unless the cluster is running, otherwise the same errors
    /// as [`launch`](Self::launch) for spawning and waiting on `gfsh`.
    pub fn gfsh(&self, commands: impl IntoIterator<Item = GfshCommand>) -> Result<()> {
        let locator_port = match (self.state, self.locator_port) {
            (LifecycleState::Running, Some(port)) => port,
            (state, _) => return Err(Error::NotRunning { state }),
        };

        let _span = tracing::info_span!("cluster", name = %self.options.name()).entered();

        let script = GfshScript::connected(LocatorAddress::localhost(locator_port), commands);
        gfsh::run(&self.program, &self.working_directory, &script, self.options.launch_timeout())
    }

    /// Stops every member, locators included. Never fails and may leave residue.
    ///
    /// A default working directory is deleted once the members have stopped cleanly. It is
    /// left in place for inspection when shutdown fails, and an explicitly configured working
    /// directory is never deleted.
    ///
    /// Calling this more than once, or on a fixture that was never launched, is harmless.
    pub fn shutdown(&mut self) {
        if self.state == LifecycleState::Stopped {
            return;
        }

        let _span = tracing::info_span!("cluster", name = %self.options.name()).entered();

        let Some(locator_port) = self.locator_port else {
            tracing::debug!(state = ?self.state, "no locator was started, nothing to shut down");
            self.state = LifecycleState::Stopped;
            return;
        };

        self.state = LifecycleState::ShuttingDown;
        tracing::info!(locator_port, "shutting down cluster");

        let script = GfshScript::shutdown(LocatorAddress::localhost(locator_port));
        match gfsh::run(&self.program, &self.working_directory, &script, self.options.shutdown_timeout()) {
            Ok(()) => self.remove_owned_working_directory(),
            Err(error) => tracing::warn!(%error, "ignoring failed cluster shutdown"),
        }

        self.state = LifecycleState::Stopped;
        tracing::info!(state = ?self.state, "cluster stopped");
    }

    fn remove_owned_working_directory(&self) {
        if !self.owns_working_directory {
            return;
        }

        match fs::remove_dir_all(&self.working_directory) {
            Ok(()) => tracing::debug!(dir = %self.working_directory.display(), "removed working directory"),
            Err(error) => tracing::debug!(dir = %self.working_directory.display(), %error, "leaving working directory behind"),
        }
    }
}

impl Drop for Cluster {
    fn drop(&mut self) {
        if self.state != LifecycleState::Uninitialized {
            self.shutdown();
        }
    }
}
