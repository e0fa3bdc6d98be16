//! Tether Test - Shared test utilities for tether crates.
//!
//! Provides a fake wrapping service, a recording execution factory,
//! descriptor fixtures and a TLS handshake driver.
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! tether-test.workspace = true
//! ```
//!
//! Then use in integration tests:
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tether_launch::{LaunchConfigBuilder, LaunchOptions};
//! use tether_test::{FakeWrapper, process_descriptor};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::test]
//! async fn test_bootstrap() {
//!     let wrapper = Arc::new(FakeWrapper::new());
//!     let builder = LaunchConfigBuilder::new(Arc::clone(&wrapper));
//!     let config = builder
//!         .build(&process_descriptor(), LaunchOptions::default(), &CancellationToken::new())
//!         .await
//!         .unwrap();
//!     assert_eq!(wrapper.wrap_count(), 1);
//!     assert!(config.transport().is_some());
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod prelude;

pub mod fixtures;
pub mod harness;
pub mod mocks;

pub use fixtures::*;
pub use harness::*;
pub use mocks::*;
