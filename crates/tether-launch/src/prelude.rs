//! Prelude module - commonly used types for convenient import.
//!
//! Use `use tether_launch::prelude::*;` to import all essential types.

// Errors
pub use crate::{LaunchError, LaunchResult};

// Inputs
pub use crate::{
    ExecutionTarget, HandshakeConfig, LaunchOptions, LaunchSettings, PluginDescriptor,
    PluginType, RuntimeLimits,
};

// Capabilities
pub use crate::{ExecutionFactory, WrappedToken, WrappingClient, WrappingError};

// Building and launching
pub use crate::{LaunchBackend, LaunchConfigBuilder, PluginLauncher, ResolvedLaunchConfig};
