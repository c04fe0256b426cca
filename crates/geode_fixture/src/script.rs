// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! A typed model of the commands we feed to `gfsh`.
//!
//! `gfsh` executes each `-e <command>` argument in order within one shell session. A
//! [`GfshScript`] is that ordered list; it turns into the argument vector handed to the child
//! process and renders as the equivalent quoted command line for diagnostics.

use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;

/// The host name every member binds to and every client connects to.
pub const LOOPBACK_HOST: &str = "localhost";

/// The address clients use to discover the cluster, rendered the way `gfsh` and the Geode
/// client configuration expect it: `host[port]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LocatorAddress {
    host: String,
    port: u16,
}

impl LocatorAddress {
    /// Creates an address for a locator listening on the loopback interface.
    #[must_use]
    pub fn localhost(port: u16) -> Self {
        Self {
            host: LOOPBACK_HOST.to_string(),
            port,
        }
    }

    /// The host name part of the address.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The locator port.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for LocatorAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.host, self.port)
    }
}

/// Region shortcuts accepted by `create region --type`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum RegionType {
    /// Entries are spread across server members.
    #[default]
    Partition,
    /// Partitioned with one redundant copy.
    PartitionRedundant,
    /// Every server member holds every entry.
    Replicate,
    /// Replicated and persisted to disk.
    ReplicatePersistent,
    /// Member-local, not distributed.
    Local,
}

impl RegionType {
    /// The token `gfsh` expects for this shortcut.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Partition => "PARTITION",
            Self::PartitionRedundant => "PARTITION_REDUNDANT",
            Self::Replicate => "REPLICATE",
            Self::ReplicatePersistent => "REPLICATE_PERSISTENT",
            Self::Local => "LOCAL",
        }
    }
}

impl fmt::Display for RegionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single `gfsh` command.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum GfshCommand {
    /// Starts a locator on the loopback interface with the HTTP service disabled.
    StartLocator {
        /// Port clients and servers use to reach the locator.
        port: u16,
        /// Port for the embedded JMX manager.
        jmx_manager_port: u16,
    },
    /// Attaches the shell session to a running locator.
    Connect(LocatorAddress),
    /// Sets the cluster-wide PDX `read-serialized` policy.
    ConfigurePdx {
        /// Whether servers keep PDX values in serialized form.
        read_serialized: bool,
    },
    /// Starts a cache server on the loopback interface with an OS-chosen port and full logging.
    StartServer,
    /// Creates a region on all servers.
    CreateRegion {
        /// Region name.
        name: String,
        /// Region shortcut.
        region_type: RegionType,
    },
    /// Deploys a jar of server-side classes or functions.
    DeployJar(PathBuf),
    /// Invokes a registered function, optionally on one member only.
    ExecuteFunction {
        /// Function id.
        id: String,
        /// Target member name; all members when `None`.
        member: Option<String>,
    },
    /// Stops every member of the connected cluster.
    Shutdown {
        /// Whether locators are stopped too.
        include_locators: bool,
    },
}

impl GfshCommand {
    /// `create region --name=<name> --type=<type>`.
    #[must_use]
    pub fn create_region(name: impl Into<String>, region_type: RegionType) -> Self {
        Self::CreateRegion {
            name: name.into(),
            region_type,
        }
    }

    /// `deploy --jar=<path>`.
    #[must_use]
    pub fn deploy_jar(path: impl Into<PathBuf>) -> Self {
        Self::DeployJar(path.into())
    }

    /// `execute function --id=<id> [--member=<member>]`.
    #[must_use]
    pub fn execute_function(id: impl Into<String>, member: Option<&str>) -> Self {
        Self::ExecuteFunction {
            id: id.into(),
            member: member.map(str::to_string),
        }
    }
}

impl fmt::Display for GfshCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StartLocator { port, jmx_manager_port } => write!(
                f,
                "start locator --bind-address={LOOPBACK_HOST} --port={port} \
                 --J=-Dgemfire.jmx-manager-port={jmx_manager_port} --http-service-port=0"
            ),
            Self::Connect(locator) => write!(f, "connect --locator={locator}"),
            Self::ConfigurePdx { read_serialized } => write!(f, "configure pdx --read-serialized={read_serialized}"),
            Self::StartServer => write!(f, "start server --bind-address={LOOPBACK_HOST} --server-port=0 --log-level=all"),
            Self::CreateRegion { name, region_type } => write!(f, "create region --name={name} --type={region_type}"),
            Self::DeployJar(path) => write!(f, "deploy --jar={}", path.display()),
            Self::ExecuteFunction { id, member: None } => write!(f, "execute function --id={id}"),
            Self::ExecuteFunction { id, member: Some(member) } => write!(f, "execute function --id={id} --member={member}"),
            Self::Shutdown { include_locators } => write!(f, "shutdown --include-locators {include_locators}"),
        }
    }
}

/// An ordered list of commands executed by one `gfsh` invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GfshScript {
    commands: Vec<GfshCommand>,
}

impl GfshScript {
    /// Creates an empty script.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a command.
    pub fn push(&mut self, command: GfshCommand) -> &mut Self {
        self.commands.push(command);
        self
    }

    /// The commands in execution order.
    #[must_use]
    pub fn commands(&self) -> &[GfshCommand] {
        &self.commands
    }

    /// The argument vector for the `gfsh` process: one `-e` flag per command.
    #[must_use]
    pub fn to_args(&self) -> Vec<OsString> {
        self.commands
            .iter()
            .flat_map(|command| [OsString::from("-e"), OsString::from(command.to_string())])
            .collect()
    }

    /// Script that starts a locator and one server, applies the PDX policy and pre-creates
    /// `regions`, all within one session.
    #[must_use]
    pub fn launch<'a>(
        locator_port: u16,
        jmx_manager_port: u16,
        read_serialized: bool,
        regions: impl IntoIterator<Item = &'a str>,
        region_type: RegionType,
    ) -> Self {
        let mut script = Self::new();
        script
            .push(GfshCommand::StartLocator {
                port: locator_port,
                jmx_manager_port,
            })
            .push(GfshCommand::Connect(LocatorAddress::localhost(locator_port)))
            .push(GfshCommand::ConfigurePdx { read_serialized })
            .push(GfshCommand::StartServer);

        for name in regions {
            script.push(GfshCommand::create_region(name, region_type));
        }

        script
    }

    /// Script that connects to `locator` and stops the whole cluster, locators included.
    #[must_use]
    pub fn shutdown(locator: LocatorAddress) -> Self {
        Self::connected(locator, [GfshCommand::Shutdown { include_locators: true }])
    }

    /// Script that connects to `locator` and then runs `commands`.
    #[must_use]
    pub fn connected(locator: LocatorAddress, commands: impl IntoIterator<Item = GfshCommand>) -> Self {
        let mut script = Self::new();
        script.push(GfshCommand::Connect(locator));
        script.extend(commands);
        script
    }
}

impl Extend<GfshCommand> for GfshScript {
    fn extend<T: IntoIterator<Item = GfshCommand>>(&mut self, iter: T) {
        self.commands.extend(iter);
    }
}

impl FromIterator<GfshCommand> for GfshScript {
    fn from_iter<T: IntoIterator<Item = GfshCommand>>(iter: T) -> Self {
        Self {
            commands: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for GfshScript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, command) in self.commands.iter().enumerate() {
            if index > 0 {
                f.write_str(" ")?;
            }
            write!(f, "-e \"{command}\"")?;
        }
        Ok(())
    }
}
