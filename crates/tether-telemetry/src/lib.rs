//! Tether Telemetry - Logging setup for hosts that launch tether plugins.
//!
//! Installs a global `tracing` subscriber with a configurable level, format
//! and target. Launch code logs through `tracing` with structured fields;
//! each plugin gets its own span (`plugin`, `plugin_type`, `version`,
//! `metadata`), so every record can be attributed to the plugin it concerns.
//!
//! The launch crates never install a subscriber themselves: [`setup_logging`]
//! is the entry point a host calls once at startup. The shared test harness
//! installs its subscriber through the same function with
//! [`LogTarget::Test`].
//!
//! # Example
//!
//! ```rust,no_run
//! use tether_telemetry::{LogConfig, LogFormat, LogTarget, setup_logging};
//!
//! # fn main() -> Result<(), tether_telemetry::TelemetryError> {
//! let config = LogConfig::new("info")
//!     .with_format(LogFormat::Json)
//!     .with_target(LogTarget::Stdout)
//!     .with_directive("tether_launch=debug");
//!
//! setup_logging(&config)?;
//! tracing::info!("host started");
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

mod error;
mod logging;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{LogConfig, LogFormat, LogTarget, setup_default_logging, setup_logging};
