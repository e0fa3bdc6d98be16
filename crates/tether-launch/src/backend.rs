//! Backend-specific launch parameters.
//!
//! Exactly one of these is attached to every resolved configuration. The
//! process variant always carries a checksum; the container variant carries
//! everything a container engine needs to run the image without consulting
//! the host environment.

use std::collections::BTreeMap;

use tether_crypto::{HashAlgorithm, Sha256Digest};

/// Label key identifying the system that launched a container.
pub const MANAGED_BY_LABEL: &str = "managed-by";

/// Expected digest of a binary, checked before it is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecureChecksum {
    /// Hash algorithm.
    pub algorithm: HashAlgorithm,
    /// Expected digest.
    pub digest: Sha256Digest,
}

impl SecureChecksum {
    /// A SHA-256 checksum.
    #[must_use]
    pub fn sha256(digest: Sha256Digest) -> Self {
        Self {
            algorithm: HashAlgorithm::Sha256,
            digest,
        }
    }
}

/// Native process launch parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessLaunch {
    /// Command to execute.
    pub command: String,
    /// Arguments, unchanged from the descriptor.
    pub args: Vec<String>,
    /// Mandatory integrity check.
    pub checksum: SecureChecksum,
}

/// Container launch parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerLaunch {
    /// Image reference.
    pub image: String,
    /// Image tag.
    pub tag: String,
    /// Expected image content digest, lowercase hex.
    pub sha256: Option<String>,
    /// Entrypoint override. `None` keeps the image entrypoint.
    pub entrypoint: Option<Vec<String>>,
    /// Argument override. `None` keeps the image arguments.
    pub args: Option<Vec<String>>,
    /// Supplementary group added to the container (the host's gid).
    pub group_add: Option<u32>,
    /// Group owning the plugin's unix socket.
    pub socket_group: Option<String>,
    /// Parent cgroup.
    pub cgroup_parent: Option<String>,
    /// CPU quota in billionths of a CPU. `None` is unbounded.
    pub nano_cpus: Option<u64>,
    /// Memory ceiling in bytes. `None` is unbounded.
    pub memory_bytes: Option<u64>,
    /// OCI runtime name.
    pub runtime: String,
    /// Fixed provenance labels.
    pub labels: BTreeMap<String, String>,
}

impl ContainerLaunch {
    /// `image:tag`.
    #[must_use]
    pub fn image_ref(&self) -> String {
        format!("{}:{}", self.image, self.tag)
    }
}

/// The selected backend and its parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchBackend {
    /// Run a native binary.
    Process(ProcessLaunch),
    /// Run an OCI image.
    Container(ContainerLaunch),
}

impl LaunchBackend {
    /// Short backend name for logs and errors.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Process(_) => "process",
            Self::Container(_) => "container",
        }
    }

    /// Process parameters, if this is a process backend.
    #[must_use]
    pub fn as_process(&self) -> Option<&ProcessLaunch> {
        match self {
            Self::Process(p) => Some(p),
            Self::Container(_) => None,
        }
    }

    /// Container parameters, if this is a container backend.
    #[must_use]
    pub fn as_container(&self) -> Option<&ContainerLaunch> {
        match self {
            Self::Container(c) => Some(c),
            Self::Process(_) => None,
        }
    }
}
