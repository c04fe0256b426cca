// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Ephemeral Apache Geode clusters for integration tests.
//!
//! A [`Cluster`] provisions one locator and one cache server on free loopback ports by driving
//! the `gfsh` administrative shell, pre-creates the regions a test needs and tears everything
//! down again when dropped. Each test owns its own cluster, with its own ports and working
//! directory.
//!
//! # Quick Start
//!
//! ```no_run
//! use geode_fixture::{Cluster, ClusterOptions};
//!
//! let cluster = Cluster::start(
//!     ClusterOptions::new()
//!         .with_name("pdx_tests")
//!         .with_region_names(["DistRegionAck"]),
//! );
//!
//! // Hand `cluster.locator()` to the Geode client's pool factory, run the test, and let the
//! // cluster shut itself down at the end of the scope.
//! println!("locator at {}", cluster.locator());
//! ```
//!
//! # Failure Behavior
//!
//! Launching is fail-loud: [`Cluster::launch`] returns an [`Error`] and [`Cluster::start`]
//! panics when `gfsh` cannot be spawned, exits with a failure status or outlives the launch
//! timeout. Shutting down is the opposite: [`Cluster::shutdown`] (and therefore `Drop`) never
//! fails, it logs and moves on, so a flaky teardown cannot hide the real result of a test.
//!
//! # Locating `gfsh`
//!
//! Unless [`ClusterOptions::with_gfsh`] names an executable, `gfsh` is taken from the
//! `GEODE_GFSH` environment variable, then from `$GEODE_HOME/bin`, then from the `PATH`.
//!
//! # Logging
//!
//! Lifecycle transitions and everything `gfsh` prints are emitted as `tracing` events.
//! Standard output lines are logged at `DEBUG` and standard error lines at `WARN`.

mod cleanup;
mod cluster;
mod error;
mod gfsh;
mod options;
pub mod ports;
mod script;

pub use cleanup::remove_subdirectories;
pub use cluster::{Cluster, LifecycleState};
pub use error::{Error, Result};
pub use gfsh::{GEODE_HOME_ENV, GFSH_ENV, GfshLocation};
pub use options::{ClusterOptions, DEFAULT_LAUNCH_TIMEOUT, DEFAULT_REGION_NAMES, DEFAULT_SHUTDOWN_TIMEOUT};
pub use script::{GfshCommand, GfshScript, LOOPBACK_HOST, LocatorAddress, RegionType};
