// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::{GfshLocation, RegionType};

/// How long launching the cluster may take before we give up on it.
pub const DEFAULT_LAUNCH_TIMEOUT: Duration = Duration::from_secs(600);

/// How long shutting the cluster down may take before we stop waiting.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Regions created when the caller does not name any.
pub const DEFAULT_REGION_NAMES: [&str; 2] = ["testRegion", "testRegion1"];

const DEFAULT_NAME: &str = "cluster";

/// Name of the directory (under the workspace root) that holds per-fixture working directories.
const CLUSTERS_DIRECTORY: &str = "test-clusters";

/// Sequence number that keeps default working directories of one process apart.
static NEXT_FIXTURE: AtomicU64 = AtomicU64::new(0);

/// Configuration of an ephemeral cluster, fixed before launch.
///
/// ```
/// use geode_fixture::{ClusterOptions, RegionType};
///
/// let options = ClusterOptions::new()
///     .with_name("bug866")
///     .with_region_names(["DistRegionAck", "DistRegionNoAck"])
///     .with_region_type(RegionType::Partition)
///     .with_read_serialized(false);
///
/// assert_eq!(options.region_names(), ["DistRegionAck", "DistRegionNoAck"]);
/// ```
#[derive(Debug, Clone)]
pub struct ClusterOptions {
    name: String,
    region_names: Vec<String>,
    region_type: RegionType,
    read_serialized: bool,
    working_directory: Option<PathBuf>,
    launch_timeout: Duration,
    shutdown_timeout: Duration,
    gfsh: GfshLocation,
}

impl ClusterOptions {
    /// Creates options with the defaults: two partitioned regions named `testRegion` and
    /// `testRegion1`, PDX read-serialized disabled, `gfsh` resolved from the environment.
    #[must_use]
    pub fn new() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            region_names: default_region_names(),
            region_type: RegionType::default(),
            read_serialized: false,
            working_directory: None,
            launch_timeout: DEFAULT_LAUNCH_TIMEOUT,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            gfsh: GfshLocation::default(),
        }
    }

    /// Names the fixture. The name shows up in logs and as the prefix of the default working
    /// directory.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Regions to create once the server is up, in order. An empty list restores the defaults.
    #[must_use]
    pub fn with_region_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        self.region_names = if names.is_empty() { default_region_names() } else { names };
        self
    }

    /// Shortcut used for every pre-created region.
    #[must_use]
    pub fn with_region_type(mut self, region_type: RegionType) -> Self {
        self.region_type = region_type;
        self
    }

    /// Whether servers keep PDX values serialized instead of deserializing them.
    #[must_use]
    pub fn with_read_serialized(mut self, read_serialized: bool) -> Self {
        self.read_serialized = read_serialized;
        self
    }

    /// Directory `gfsh` runs in. Member directories are created here and any subdirectory
    /// found at launch is deleted, so do not point this at anything you care about.
    #[must_use]
    pub fn with_working_directory(mut self, path: impl Into<PathBuf>) -> Self {
        self.working_directory = Some(path.into());
        self
    }

    /// Upper bound on the launch sequence.
    #[must_use]
    pub fn with_launch_timeout(mut self, timeout: Duration) -> Self {
        self.launch_timeout = timeout;
        self
    }

    /// Upper bound on the shutdown sequence.
    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Where to find `gfsh`.
    #[must_use]
    pub fn with_gfsh(mut self, gfsh: GfshLocation) -> Self {
        self.gfsh = gfsh;
        self
    }

    /// The fixture name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Regions created at launch.
    #[must_use]
    pub fn region_names(&self) -> &[String] {
        &self.region_names
    }

    /// Shortcut of the regions created at launch.
    #[must_use]
    pub fn region_type(&self) -> RegionType {
        self.region_type
    }

    /// Server-side PDX read-serialized policy.
    #[must_use]
    pub fn read_serialized(&self) -> bool {
        self.read_serialized
    }

    /// Launch timeout.
    #[must_use]
    pub fn launch_timeout(&self) -> Duration {
        self.launch_timeout
    }

    /// Shutdown timeout.
    #[must_use]
    pub fn shutdown_timeout(&self) -> Duration {
        self.shutdown_timeout
    }

    /// Where `gfsh` is looked up.
    #[must_use]
    pub fn gfsh(&self) -> &GfshLocation {
        &self.gfsh
    }

    /// The explicitly configured working directory, if any.
    ///
    /// Without one, every [`Cluster`](crate::Cluster) gets a fresh directory of its own, see
    /// [`Cluster::working_directory`](crate::Cluster::working_directory).
    #[must_use]
    pub fn working_directory(&self) -> Option<&Path> {
        self.working_directory.as_deref()
    }

    /// Picks the directory a new fixture runs in.
    ///
    /// The default is `test-clusters/<name>-<pid>-<sequence>` under the Cargo workspace root, or
    /// under the system temporary directory when the process is not running inside a workspace.
    /// Each call yields a directory no other fixture in any process uses.
    pub(crate) fn resolve_working_directory(&self) -> PathBuf {
        if let Some(dir) = &self.working_directory {
            return dir.clone();
        }

        let base = std::env::current_dir()
            .ok()
            .and_then(|dir| workspace_directory(&dir))
            .unwrap_or_else(std::env::temp_dir);
        let sequence = NEXT_FIXTURE.fetch_add(1, Ordering::Relaxed);

        base.join(CLUSTERS_DIRECTORY)
            .join(format!("{}-{}-{sequence}", self.name, std::process::id()))
    }
}

impl Default for ClusterOptions {
    fn default() -> Self {
        Self::new()
    }
}

fn default_region_names() -> Vec<String> {
    DEFAULT_REGION_NAMES.iter().map(ToString::to_string).collect()
}

/// Looks upward from `start` for a directory containing `Cargo.lock`, i.e. a workspace root.
fn workspace_directory(start: &Path) -> Option<PathBuf> {
    start.ancestors().find(|dir| dir.join("Cargo.lock").exists()).map(Path::to_path_buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let options = ClusterOptions::default();

        assert_eq!(options.name(), "cluster");
        assert_eq!(options.region_names(), ["testRegion", "testRegion1"]);
        assert_eq!(options.region_type(), RegionType::Partition);
        assert!(!options.read_serialized());
        assert_eq!(options.launch_timeout(), Duration::from_secs(600));
        assert_eq!(options.shutdown_timeout(), Duration::from_secs(30));
        assert_eq!(options.gfsh(), &GfshLocation::FromEnvironment);
    }

    #[test]
    fn empty_region_list_keeps_defaults() {
        let options = ClusterOptions::new().with_region_names(Vec::<String>::new());

        assert_eq!(options.region_names(), ["testRegion", "testRegion1"]);
    }

    #[test]
    fn region_order_is_preserved() {
        let options = ClusterOptions::new().with_region_names(["b", "a", "c"]);

        assert_eq!(options.region_names(), ["b", "a", "c"]);
    }

    #[test]
    fn explicit_working_directory_wins() {
        let options = ClusterOptions::new().with_working_directory("/tmp/somewhere");

        assert_eq!(options.working_directory(), Some(Path::new("/tmp/somewhere")));
        assert_eq!(options.resolve_working_directory(), PathBuf::from("/tmp/somewhere"));
        assert_eq!(options.resolve_working_directory(), PathBuf::from("/tmp/somewhere"));
    }

    #[test]
    fn default_working_directory_is_named_after_the_fixture() {
        let options = ClusterOptions::new().with_name("pdx");

        assert_eq!(options.working_directory(), None);

        let dir = options.resolve_working_directory();
        let parent = dir.parent().unwrap();
        let leaf = dir.file_name().unwrap().to_str().unwrap();
        assert!(parent.ends_with(CLUSTERS_DIRECTORY), "{}", dir.display());
        assert!(leaf.starts_with(&format!("pdx-{}-", std::process::id())), "{leaf}");
    }

    #[test]
    fn default_working_directories_never_repeat() {
        let options = ClusterOptions::new();
        let copy = options.clone();

        let first = options.resolve_working_directory();
        let second = options.resolve_working_directory();
        let third = copy.resolve_working_directory();

        assert_ne!(first, second);
        assert_ne!(first, third);
        assert_ne!(second, third);
    }

    #[test]
    fn finds_workspace_root_above_start() {
        let root = tempfile::tempdir().unwrap();
        std::fs::write(root.path().join("Cargo.lock"), b"").unwrap();
        let nested = root.path().join("crates/member/src");
        std::fs::create_dir_all(&nested).unwrap();

        assert_eq!(workspace_directory(&nested).as_deref(), Some(root.path()));
    }
}
