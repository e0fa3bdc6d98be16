//! Plugin descriptor types.
//!
//! A [`PluginDescriptor`] is the immutable, already-resolved description of
//! one launchable plugin. Descriptors are owned by the host's registry and
//! borrowed for the duration of a launch; nothing in this crate mutates them.
//!
//! Descriptors are plain serde values, so a registry can keep them in TOML:
//!
//! ```toml
//! name = "kv-store"
//! type = "storage"
//! version = "v1.4.0"
//! sha256 = "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08"
//! env = ["LOG_LEVEL=info"]
//!
//! [target]
//! kind = "container"
//! image = "registry.example.com/kv-store"
//!
//! [runtime_limits]
//! cpu_nanos = 2000000000
//! memory_bytes = 536870912
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// Nanoseconds of CPU time per wall-clock second for one full CPU.
const NANOS_PER_CPU: u64 = 1_000_000_000;

/// Broad category of a plugin.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginType {
    /// Storage backends.
    Storage,
    /// Authentication methods.
    Auth,
    /// Anything else.
    #[default]
    Other,
}

impl fmt::Display for PluginType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Storage => f.write_str("storage"),
            Self::Auth => f.write_str("auth"),
            Self::Other => f.write_str("other"),
        }
    }
}

/// What to execute. Process and container targets are mutually exclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExecutionTarget {
    /// A native binary run as a child process.
    Process {
        /// Command to run (a path, or a name resolved on `PATH`).
        command: String,
        /// Arguments passed to the command.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        args: Vec<String>,
    },
    /// An OCI image run by a container runtime.
    Container {
        /// Image reference without tag.
        image: String,
        /// Image tag. Derived from the descriptor version when absent.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tag: Option<String>,
        /// Entrypoint override. Empty keeps the image's entrypoint.
        #[serde(default, skip_serializing_if = "String::is_empty")]
        command: String,
        /// Argument override. Empty keeps the image's arguments.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        args: Vec<String>,
    },
}

impl ExecutionTarget {
    /// Short backend name for logs and errors.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Process { .. } => "process",
            Self::Container { .. } => "container",
        }
    }
}

/// Container resource limits. `None` leaves the backend default in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeLimits {
    /// CPU quota in billionths of a CPU.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_nanos: Option<u64>,
    /// Memory ceiling in bytes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_bytes: Option<u64>,
    /// Parent cgroup for the container.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cgroup_parent: Option<String>,
    /// Alternate OCI runtime name (e.g. `runc`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oci_runtime: Option<String>,
}

impl RuntimeLimits {
    /// Limit to a whole number of CPUs.
    #[must_use]
    pub fn with_cpus(mut self, cpus: u64) -> Self {
        self.cpu_nanos = Some(cpus.saturating_mul(NANOS_PER_CPU));
        self
    }

    /// Limit memory to `bytes`.
    #[must_use]
    pub fn with_memory_bytes(mut self, bytes: u64) -> Self {
        self.memory_bytes = Some(bytes);
        self
    }

    /// Place the container under `parent`.
    #[must_use]
    pub fn with_cgroup_parent(mut self, parent: impl Into<String>) -> Self {
        self.cgroup_parent = Some(parent.into());
        self
    }

    /// Use an alternate OCI runtime.
    #[must_use]
    pub fn with_oci_runtime(mut self, runtime: impl Into<String>) -> Self {
        self.oci_runtime = Some(runtime.into());
        self
    }
}

/// Immutable description of one launchable plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginDescriptor {
    /// Plugin name.
    pub name: String,
    /// Plugin category.
    #[serde(rename = "type", default)]
    pub plugin_type: PluginType,
    /// Semantic version string (e.g. `v1.2.0`).
    #[serde(default)]
    pub version: String,
    /// What to execute.
    pub target: ExecutionTarget,
    /// Expected SHA-256 of the binary (process) or image content (container).
    #[serde(default, with = "hex_bytes", skip_serializing_if = "Vec::is_empty")]
    pub sha256: Vec<u8>,
    /// Base environment, as `KEY=VALUE` entries.
    #[serde(default, rename = "env", skip_serializing_if = "Vec::is_empty")]
    pub base_env: Vec<String>,
    /// Container resource limits.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_limits: Option<RuntimeLimits>,
}

impl PluginDescriptor {
    /// Describe a native process plugin.
    #[must_use]
    pub fn process(name: impl Into<String>, command: impl Into<String>, sha256: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            plugin_type: PluginType::default(),
            version: String::new(),
            target: ExecutionTarget::Process {
                command: command.into(),
                args: Vec::new(),
            },
            sha256,
            base_env: Vec::new(),
            runtime_limits: None,
        }
    }

    /// Describe a container plugin.
    #[must_use]
    pub fn container(name: impl Into<String>, image: impl Into<String>, sha256: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            plugin_type: PluginType::default(),
            version: String::new(),
            target: ExecutionTarget::Container {
                image: image.into(),
                tag: None,
                command: String::new(),
                args: Vec::new(),
            },
            sha256,
            base_env: Vec::new(),
            runtime_limits: None,
        }
    }

    /// Set the plugin category.
    #[must_use]
    pub fn with_type(mut self, plugin_type: PluginType) -> Self {
        self.plugin_type = plugin_type;
        self
    }

    /// Set the version.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Set the command (entrypoint override for containers).
    #[must_use]
    pub fn with_command(mut self, new_command: impl Into<String>) -> Self {
        match &mut self.target {
            ExecutionTarget::Process { command, .. } | ExecutionTarget::Container { command, .. } => {
                *command = new_command.into();
            },
        }
        self
    }

    /// Set the arguments.
    #[must_use]
    pub fn with_args(mut self, new_args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let new_args = new_args.into_iter().map(Into::into).collect();
        match &mut self.target {
            ExecutionTarget::Process { args, .. } | ExecutionTarget::Container { args, .. } => {
                *args = new_args;
            },
        }
        self
    }

    /// Set an explicit image tag (ignored for process targets).
    #[must_use]
    pub fn with_tag(mut self, new_tag: impl Into<String>) -> Self {
        if let ExecutionTarget::Container { tag, .. } = &mut self.target {
            *tag = Some(new_tag.into());
        }
        self
    }

    /// Append a `KEY=VALUE` base environment entry.
    #[must_use]
    pub fn with_env(mut self, entry: impl Into<String>) -> Self {
        self.base_env.push(entry.into());
        self
    }

    /// Set container resource limits.
    #[must_use]
    pub fn with_runtime_limits(mut self, limits: RuntimeLimits) -> Self {
        self.runtime_limits = Some(limits);
        self
    }

    /// Whether this descriptor runs in a container.
    #[must_use]
    pub fn is_container(&self) -> bool {
        matches!(self.target, ExecutionTarget::Container { .. })
    }
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s.trim()).map_err(serde::de::Error::custom)
    }
}
