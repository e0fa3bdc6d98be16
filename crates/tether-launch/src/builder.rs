//! Launch configuration builder.
//!
//! Turns a descriptor plus per-call options into a [`ResolvedLaunchConfig`]
//! in one pass:
//!
//! 1. Validate inputs and assemble the backend (process or container)
//! 2. Resolve the host version through the wrapping client
//! 3. Assemble the environment (base → mlock → version → metadata →
//!    auto-mTLS → extra)
//! 4. Bootstrap transport trust unless metadata mode or auto-mTLS is set
//! 5. Return the configuration
//!
//! Every failure aborts immediately; no partial configuration escapes.
//! Backend assembly runs first so that an invalid descriptor never costs a
//! wrap request.

use std::collections::BTreeMap;
use std::sync::Arc;

use tether_crypto::Sha256Digest;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span, debug, info, warn};

use crate::backend::{
    ContainerLaunch, LaunchBackend, MANAGED_BY_LABEL, ProcessLaunch, SecureChecksum,
};
use crate::bootstrap::{LaunchBootstrap, bootstrap, until_cancelled};
use crate::config::ResolvedLaunchConfig;
use crate::descriptor::{ExecutionTarget, PluginDescriptor, RuntimeLimits};
use crate::env::{
    AUTO_MTLS_ENV, EnvList, HOST_VERSION_ENV, METADATA_MODE_ENV, MLOCK_ENABLED_ENV,
    UNWRAP_TOKEN_ENV, split_entry,
};
use crate::error::{LaunchError, LaunchResult};
use crate::options::LaunchOptions;
use crate::settings::LaunchSettings;
use crate::wrapping::WrappingClient;

const OP_VALIDATE: &str = "validate descriptor";
const OP_VERSION: &str = "lookup host version";
const OP_ENV: &str = "assemble environment";
const OP_CONTAINER: &str = "assemble container backend";

/// Smallest memory ceiling a container runtime accepts (6 MiB).
pub const MIN_CONTAINER_MEMORY_BYTES: u64 = 6_291_456;

/// Smallest CPU quota a container runtime accepts (0.01 CPU).
pub const MIN_CONTAINER_NANO_CPUS: u64 = 10_000_000;

/// Builds launch configurations.
///
/// Holds no per-launch state: every call generates its own authority,
/// environment and token, so one builder may serve concurrent launches.
pub struct LaunchConfigBuilder<W: ?Sized> {
    wrapper: Arc<W>,
    settings: LaunchSettings,
}

impl<W: ?Sized> Clone for LaunchConfigBuilder<W> {
    fn clone(&self) -> Self {
        Self {
            wrapper: Arc::clone(&self.wrapper),
            settings: self.settings.clone(),
        }
    }
}

impl<W: WrappingClient + ?Sized> LaunchConfigBuilder<W> {
    /// Create a builder with default settings.
    #[must_use]
    pub fn new(wrapper: Arc<W>) -> Self {
        Self {
            wrapper,
            settings: LaunchSettings::default(),
        }
    }

    /// Replace the settings.
    #[must_use]
    pub fn with_settings(mut self, settings: LaunchSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Current settings.
    #[must_use]
    pub fn settings(&self) -> &LaunchSettings {
        &self.settings
    }

    /// Build the configuration for one launch.
    ///
    /// # Errors
    ///
    /// - [`LaunchError::InvalidParameter`] for malformed descriptor fields,
    ///   options or settings (including a process target without checksum).
    /// - [`LaunchError::BackendAssembly`] for unsupported runtime limits.
    /// - [`LaunchError::VersionLookup`] if the host version is unavailable.
    /// - [`LaunchError::Certificate`] or [`LaunchError::Wrap`] if transport
    ///   bootstrap fails.
    /// - [`LaunchError::Cancelled`] if `cancel` fires during any external call.
    pub async fn build(
        &self,
        descriptor: &PluginDescriptor,
        options: LaunchOptions,
        cancel: &CancellationToken,
    ) -> LaunchResult<ResolvedLaunchConfig> {
        let span = plugin_span(descriptor, &options);
        self.build_inner(descriptor, options, cancel, span.clone())
            .instrument(span)
            .await
    }

    async fn build_inner(
        &self,
        descriptor: &PluginDescriptor,
        options: LaunchOptions,
        cancel: &CancellationToken,
        span: Span,
    ) -> LaunchResult<ResolvedLaunchConfig> {
        self.settings.validate()?;
        validate_descriptor(descriptor)?;
        check_env(&descriptor.base_env)?;
        check_env(&options.extra_env)?;

        // 1. Backend.
        let backend = self.assemble_backend(descriptor)?;

        // 2. Host version.
        let host_version = until_cancelled(cancel, OP_VERSION, self.wrapper.host_version())
            .await?
            .map_err(|source| LaunchError::VersionLookup {
                op: OP_VERSION,
                source,
            })?;

        // 3. Environment.
        let mut env = EnvList::new();
        env.extend_entries(OP_ENV, &descriptor.base_env)?;
        if options.mlock || self.wrapper.mlock_enabled() {
            env.set(MLOCK_ENABLED_ENV, "true");
        }
        env.set(HOST_VERSION_ENV, host_version);
        env.set_flag(METADATA_MODE_ENV, options.metadata_mode);
        env.set_flag(AUTO_MTLS_ENV, options.auto_mtls);
        env.extend_entries(OP_ENV, &options.extra_env)?;

        // 4. Transport bootstrap.
        let transport = if options.needs_bootstrap() {
            let LaunchBootstrap { transport, token } =
                bootstrap(self.wrapper.as_ref(), &self.settings, cancel).await?;
            env.set(UNWRAP_TOKEN_ENV, token.expose());
            Some(transport)
        } else {
            debug!(
                metadata = options.metadata_mode,
                auto_mtls = options.auto_mtls,
                "skipping transport bootstrap"
            );
            None
        };

        let env = env.into_entries();
        info!(
            backend = backend.kind(),
            bootstrapped = transport.is_some(),
            env_entries = env.len(),
            "resolved launch configuration"
        );

        Ok(ResolvedLaunchConfig {
            name: descriptor.name.clone(),
            plugin_type: descriptor.plugin_type,
            version: descriptor.version.clone(),
            env,
            backend,
            transport,
            metadata_mode: options.metadata_mode,
            auto_mtls: options.auto_mtls,
            handshake: options.handshake,
            protocol_sets: options.protocol_sets,
            span,
        })
    }

    fn assemble_backend(&self, descriptor: &PluginDescriptor) -> LaunchResult<LaunchBackend> {
        let checksum = parse_checksum(&descriptor.sha256)?;

        match &descriptor.target {
            ExecutionTarget::Process { command, args } => {
                let Some(digest) = checksum else {
                    return Err(LaunchError::invalid(
                        OP_VALIDATE,
                        "process plugins require a sha256 checksum",
                    ));
                };
                if descriptor.runtime_limits.is_some() {
                    warn!("runtime limits apply only to containers; ignoring");
                }
                Ok(LaunchBackend::Process(ProcessLaunch {
                    command: command.clone(),
                    args: args.clone(),
                    checksum: SecureChecksum::sha256(digest),
                }))
            },
            ExecutionTarget::Container {
                image,
                tag,
                command,
                args,
            } => {
                let tag = image_tag(tag.as_deref(), &descriptor.version)?;
                let limits = descriptor.runtime_limits.clone().unwrap_or_default();
                check_limits(&limits)?;

                if checksum.is_none() {
                    warn!(image = %image, "container plugin has no checksum; image pinned by tag only");
                }

                let gid = host_gid();
                let runtime = limits
                    .oci_runtime
                    .filter(|r| !r.trim().is_empty())
                    .unwrap_or_else(|| self.settings.container_runtime.clone());

                Ok(LaunchBackend::Container(ContainerLaunch {
                    image: image.clone(),
                    tag,
                    sha256: checksum.map(|d| d.to_hex()),
                    entrypoint: (!command.trim().is_empty()).then(|| vec![command.clone()]),
                    args: (!args.is_empty()).then(|| args.clone()),
                    group_add: gid,
                    socket_group: gid.map(|g| g.to_string()),
                    cgroup_parent: limits.cgroup_parent,
                    nano_cpus: limits.cpu_nanos,
                    memory_bytes: limits.memory_bytes,
                    runtime,
                    labels: BTreeMap::from([(
                        MANAGED_BY_LABEL.to_owned(),
                        self.settings.managed_by_label.clone(),
                    )]),
                }))
            },
        }
    }
}

fn plugin_span(descriptor: &PluginDescriptor, options: &LaunchOptions) -> Span {
    match &options.log_span {
        Some(parent) => tracing::info_span!(
            parent: parent,
            "plugin",
            plugin = %descriptor.name,
            plugin_type = %descriptor.plugin_type,
            version = %descriptor.version,
            metadata = options.metadata_mode,
        ),
        None => tracing::info_span!(
            "plugin",
            plugin = %descriptor.name,
            plugin_type = %descriptor.plugin_type,
            version = %descriptor.version,
            metadata = options.metadata_mode,
        ),
    }
}

fn validate_descriptor(descriptor: &PluginDescriptor) -> LaunchResult<()> {
    if descriptor.name.trim().is_empty() {
        return Err(LaunchError::invalid(OP_VALIDATE, "plugin name must not be empty"));
    }
    match &descriptor.target {
        ExecutionTarget::Process { command, .. } if command.trim().is_empty() => Err(
            LaunchError::invalid(OP_VALIDATE, "process plugins require a command"),
        ),
        ExecutionTarget::Container { image, .. } if image.trim().is_empty() => Err(
            LaunchError::invalid(OP_VALIDATE, "container plugins require an image"),
        ),
        _ => Ok(()),
    }
}

fn parse_checksum(sha256: &[u8]) -> LaunchResult<Option<Sha256Digest>> {
    if sha256.is_empty() {
        return Ok(None);
    }
    Sha256Digest::from_slice(sha256)
        .map(Some)
        .map_err(|e| LaunchError::invalid(OP_VALIDATE, format!("sha256: {e}")))
}

fn check_env(entries: &[String]) -> LaunchResult<()> {
    for entry in entries {
        match split_entry(entry) {
            None => {
                return Err(LaunchError::invalid(
                    OP_ENV,
                    format!("environment entry {entry:?} is not of the form KEY=VALUE"),
                ));
            },
            Some((UNWRAP_TOKEN_ENV, _)) => {
                return Err(LaunchError::invalid(
                    OP_ENV,
                    format!("{UNWRAP_TOKEN_ENV} is reserved for transport bootstrap"),
                ));
            },
            Some(_) => {},
        }
    }
    Ok(())
}

fn image_tag(tag: Option<&str>, version: &str) -> LaunchResult<String> {
    if let Some(tag) = tag.map(str::trim).filter(|t| !t.is_empty()) {
        return Ok(tag.to_owned());
    }
    let version = version.trim();
    let derived = version.strip_prefix('v').unwrap_or(version);
    if derived.is_empty() {
        return Err(LaunchError::invalid(
            OP_VALIDATE,
            "container plugins need an image tag or a version to derive one from",
        ));
    }
    Ok(derived.to_owned())
}

fn check_limits(limits: &RuntimeLimits) -> LaunchResult<()> {
    if let Some(memory) = limits.memory_bytes
        && memory < MIN_CONTAINER_MEMORY_BYTES
    {
        return Err(LaunchError::backend(
            OP_CONTAINER,
            format!(
                "memory ceiling of {memory} bytes is below the {MIN_CONTAINER_MEMORY_BYTES} byte minimum"
            ),
        ));
    }
    if let Some(cpu) = limits.cpu_nanos
        && cpu < MIN_CONTAINER_NANO_CPUS
    {
        return Err(LaunchError::backend(
            OP_CONTAINER,
            format!("cpu quota of {cpu} nanos is below the {MIN_CONTAINER_NANO_CPUS} minimum"),
        ));
    }
    if limits
        .cgroup_parent
        .as_deref()
        .is_some_and(|p| p.trim().is_empty())
    {
        return Err(LaunchError::backend(OP_CONTAINER, "cgroup parent must not be empty"));
    }
    Ok(())
}

#[cfg(unix)]
fn host_gid() -> Option<u32> {
    Some(nix::unistd::getgid().as_raw())
}

#[cfg(not(unix))]
fn host_gid() -> Option<u32> {
    None
}
