// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![allow(missing_docs, reason = "test code")]

//! Tests against a real Geode installation.
//!
//! These need `gfsh` (via `GEODE_GFSH`, `GEODE_HOME` or the `PATH`) and a JVM, and take minutes,
//! so they are ignored by default. Run them with `cargo test -p geode_fixture -- --ignored`.

use std::net::TcpStream;
use std::time::Duration;

use geode_fixture::{Cluster, ClusterOptions, GfshCommand, LOOPBACK_HOST, LifecycleState, RegionType};
use testing_aids::log_to_stdout;

#[test]
#[ignore = "requires a Geode installation"]
fn locator_accepts_connections_once_launched() {
    log_to_stdout();

    let cluster = Cluster::start(
        ClusterOptions::new()
            .with_name("locator_accepts_connections_once_launched")
            .with_region_names(["DistRegionAck"]),
    );

    assert_eq!(cluster.state(), LifecycleState::Running);
    let locator = cluster.locator();
    TcpStream::connect_timeout(
        &format!("127.0.0.1:{}", locator.port()).parse().unwrap(),
        Duration::from_secs(5),
    )
    .unwrap();
    assert_eq!(locator.host(), LOOPBACK_HOST);
}

#[test]
#[ignore = "requires a Geode installation"]
fn regions_can_be_added_after_launch() {
    log_to_stdout();

    let cluster = Cluster::start(
        ClusterOptions::new()
            .with_name("regions_can_be_added_after_launch")
            .with_read_serialized(true),
    );

    cluster
        .gfsh([GfshCommand::create_region("cqTestRegion", RegionType::Replicate)])
        .unwrap();
}
