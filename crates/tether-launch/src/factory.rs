//! Execution handle factories.
//!
//! A factory turns a [`ResolvedLaunchConfig`] into a running plugin. The
//! container engine and the RPC handshake live outside this crate; the
//! native process factory here covers the checksum-gated spawn.

use std::io;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};

use async_trait::async_trait;
use tether_crypto::ClientTransportConfig;
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tracing::{debug, info};

use crate::backend::{LaunchBackend, ProcessLaunch};
use crate::config::ResolvedLaunchConfig;
use crate::error::{LaunchError, LaunchResult};

const OP_VERIFY: &str = "verify plugin binary";
const OP_SPAWN: &str = "spawn plugin process";

/// Starts plugins from resolved configurations.
///
/// The factory takes ownership of the configuration; its transport moves
/// into the returned handle.
#[async_trait]
pub trait ExecutionFactory: Send + Sync {
    /// Handle to a started plugin.
    type Handle: Send;

    /// Start the plugin described by `config`.
    ///
    /// # Errors
    ///
    /// Implementations must refuse to start a process whose artifact does
    /// not match the configured checksum.
    async fn start(&self, config: ResolvedLaunchConfig) -> LaunchResult<Self::Handle>;
}

/// Runs process-backend plugins as local child processes.
///
/// Resolves the command on `PATH`, verifies its SHA-256 against the
/// configuration and only then spawns it. Container configurations are
/// refused.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeProcessFactory;

impl NativeProcessFactory {
    /// Create a native process factory.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn verify(name: &str, launch: &ProcessLaunch) -> LaunchResult<PathBuf> {
        let path = which::which(&launch.command).map_err(|e| LaunchError::Spawn {
            op: OP_VERIFY,
            command: launch.command.clone(),
            source: io::Error::new(io::ErrorKind::NotFound, e.to_string()),
        })?;

        launch
            .checksum
            .digest
            .verify_file(&path)
            .map_err(|source| LaunchError::ChecksumMismatch {
                op: OP_VERIFY,
                plugin: name.to_owned(),
                source,
            })?;

        debug!(
            path = %path.display(),
            algorithm = %launch.checksum.algorithm,
            "plugin binary verified"
        );
        Ok(path)
    }
}

#[async_trait]
impl ExecutionFactory for NativeProcessFactory {
    type Handle = PluginProcess;

    async fn start(&self, config: ResolvedLaunchConfig) -> LaunchResult<PluginProcess> {
        let LaunchBackend::Process(launch) = config.backend() else {
            return Err(LaunchError::UnsupportedBackend {
                op: OP_SPAWN,
                backend: config.backend().kind(),
            });
        };

        let entered = config.span().enter();
        let path = Self::verify(config.name(), launch)?;

        let mut cmd = Command::new(&path);
        cmd.args(&launch.args);
        if config.skip_host_env() {
            cmd.env_clear();
        }
        let handshake = config.handshake();
        if !handshake.magic_cookie_key.is_empty() {
            cmd.env(&handshake.magic_cookie_key, &handshake.magic_cookie_value);
        }
        for (key, value) in config.env_pairs() {
            cmd.env(key, value);
        }
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|source| LaunchError::Spawn {
            op: OP_SPAWN,
            command: launch.command.clone(),
            source,
        })?;

        info!(pid = child.id(), "plugin process started");
        drop(entered);

        Ok(PluginProcess { child, config })
    }
}

/// A running plugin process.
///
/// Owns the child (killed on drop) and the configuration it was started
/// from, including the client transport.
#[derive(Debug)]
pub struct PluginProcess {
    child: Child,
    config: ResolvedLaunchConfig,
}

impl PluginProcess {
    /// OS process id, if the process has not been reaped.
    #[must_use]
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Configuration the plugin was started with.
    #[must_use]
    pub fn config(&self) -> &ResolvedLaunchConfig {
        &self.config
    }

    /// Client transport for dialing the plugin, if bootstrapped.
    #[must_use]
    pub fn transport(&self) -> Option<&ClientTransportConfig> {
        self.config.transport()
    }

    /// Take the plugin's stdout (carries the handshake line).
    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.child.stdout.take()
    }

    /// Take the plugin's stderr.
    pub fn take_stderr(&mut self) -> Option<ChildStderr> {
        self.child.stderr.take()
    }

    /// Wait for the process to exit.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if waiting fails.
    pub async fn wait(&mut self) -> io::Result<ExitStatus> {
        self.child.wait().await
    }

    /// Kill the process and wait for it.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the signal cannot be delivered.
    pub async fn kill(&mut self) -> io::Result<()> {
        self.child.kill().await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use tether_crypto::Sha256Digest;
    use tokio::io::AsyncReadExt;
    use tracing::Span;

    use super::*;
    use crate::backend::{ContainerLaunch, SecureChecksum};
    use crate::descriptor::PluginType;
    use crate::options::HandshakeConfig;

    fn config(backend: LaunchBackend, env: Vec<String>) -> ResolvedLaunchConfig {
        ResolvedLaunchConfig {
            name: "kv".to_owned(),
            plugin_type: PluginType::Storage,
            version: "v1.0.0".to_owned(),
            env,
            backend,
            transport: None,
            metadata_mode: false,
            auto_mtls: true,
            handshake: HandshakeConfig {
                protocol_version: 1,
                magic_cookie_key: "KV_PLUGIN".to_owned(),
                magic_cookie_value: "cookie".to_owned(),
            },
            protocol_sets: BTreeMap::new(),
            span: Span::none(),
        }
    }

    fn process(command: &str, digest: Sha256Digest) -> LaunchBackend {
        LaunchBackend::Process(ProcessLaunch {
            command: command.to_owned(),
            args: Vec::new(),
            checksum: SecureChecksum::sha256(digest),
        })
    }

    #[cfg(unix)]
    fn write_script(dir: &std::path::Path, body: &str) -> (PathBuf, Sha256Digest) {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("plugin.sh");
        let script = format!("#!/bin/sh\n{body}\n");
        std::fs::write(&path, &script).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        (path, Sha256Digest::digest(script.as_bytes()))
    }

    #[tokio::test]
    async fn test_container_backend_refused() {
        let backend = LaunchBackend::Container(ContainerLaunch {
            image: "example/kv".to_owned(),
            tag: "1".to_owned(),
            sha256: None,
            entrypoint: None,
            args: None,
            group_add: None,
            socket_group: None,
            cgroup_parent: None,
            nano_cpus: None,
            memory_bytes: None,
            runtime: "runsc".to_owned(),
            labels: BTreeMap::new(),
        });
        let err = NativeProcessFactory::new()
            .start(config(backend, Vec::new()))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LaunchError::UnsupportedBackend {
                backend: "container",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_missing_binary() {
        let backend = process(
            "/nonexistent/tether-plugin-bin",
            Sha256Digest::from_bytes([0; 32]),
        );
        let err = NativeProcessFactory::new()
            .start(config(backend, Vec::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, LaunchError::Spawn { op: OP_VERIFY, .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_checksum_mismatch_refuses_spawn() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("ran");
        let (path, _) = write_script(dir.path(), &format!("touch {}", marker.display()));

        let backend = process(
            path.to_str().unwrap(),
            Sha256Digest::digest(b"something else"),
        );
        let err = NativeProcessFactory::new()
            .start(config(backend, Vec::new()))
            .await
            .unwrap_err();

        assert!(matches!(err, LaunchError::ChecksumMismatch { ref plugin, .. } if plugin == "kv"));
        assert!(!marker.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_spawns_verified_binary_with_env() {
        let dir = tempfile::tempdir().unwrap();
        let (path, digest) = write_script(dir.path(), "echo \"$GREETING:$KV_PLUGIN\"");

        let backend = process(path.to_str().unwrap(), digest);
        let mut handle = NativeProcessFactory::new()
            .start(config(backend, vec!["GREETING=hello".to_owned()]))
            .await
            .unwrap();

        assert!(handle.id().is_some());
        assert!(handle.transport().is_none());

        let mut stdout = handle.take_stdout().unwrap();
        let mut out = String::new();
        stdout.read_to_string(&mut out).await.unwrap();
        assert_eq!(out.trim(), "hello:cookie");

        let status = handle.wait().await.unwrap();
        assert!(status.success());
    }
}
