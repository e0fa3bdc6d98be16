//! Tether Launch - Launch configuration and transport bootstrap for plugins.
//!
//! Turns a static [`PluginDescriptor`] plus per-call [`LaunchOptions`] into a
//! [`ResolvedLaunchConfig`] that an [`ExecutionFactory`] can start without
//! further input:
//!
//! - Process and container backends, selected by the descriptor's
//!   [`ExecutionTarget`]
//! - Checksum-gated execution for process plugins
//! - Per-launch mutual TLS: a fresh authority and leaf pair for every launch,
//!   with the plugin's credentials handed over as a single-use wrapped token
//! - A fixed environment precedence (base → mlock → version → metadata →
//!   auto-mTLS → extra)
//!
//! The wrapping service is consumed through the [`WrappingClient`] trait;
//! the host supplies the implementation.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tether_launch::prelude::*;
//! use tether_launch::NativeProcessFactory;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run(wrapper: Arc<dyn WrappingClient>, sha256: Vec<u8>) -> LaunchResult<()> {
//! let launcher = PluginLauncher::new(wrapper, NativeProcessFactory::new());
//! let descriptor = PluginDescriptor::process("kv-store", "kv-plugin", sha256);
//!
//! let plugin = launcher
//!     .launch(&descriptor, LaunchOptions::default(), &CancellationToken::new())
//!     .await?;
//! assert!(plugin.transport().is_some());
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod backend;
mod bootstrap;
mod builder;
mod config;
mod descriptor;
mod env;
mod error;
mod factory;
mod launcher;
mod options;
mod settings;
mod wrapping;

pub use backend::{
    ContainerLaunch, LaunchBackend, MANAGED_BY_LABEL, ProcessLaunch, SecureChecksum,
};
pub use bootstrap::{LaunchBootstrap, bootstrap};
pub use builder::{LaunchConfigBuilder, MIN_CONTAINER_MEMORY_BYTES, MIN_CONTAINER_NANO_CPUS};
pub use config::ResolvedLaunchConfig;
pub use descriptor::{ExecutionTarget, PluginDescriptor, PluginType, RuntimeLimits};
pub use env::{
    AUTO_MTLS_ENV, HOST_VERSION_ENV, METADATA_MODE_ENV, MLOCK_ENABLED_ENV, UNWRAP_TOKEN_ENV,
};
pub use error::{LaunchError, LaunchResult};
pub use factory::{ExecutionFactory, NativeProcessFactory, PluginProcess};
pub use launcher::PluginLauncher;
pub use options::{HandshakeConfig, LaunchOptions, Protocol, ProtocolSets};
pub use settings::LaunchSettings;
pub use wrapping::{WrappedToken, WrappingClient, WrappingError};
