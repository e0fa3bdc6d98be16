//! Tether Crypto - Certificate and integrity primitives for plugin launches.
//!
//! This crate provides:
//! - An ephemeral, in-memory certificate authority created fresh per launch
//! - Client and server leaf certificates signed by that authority
//! - A `rustls` client configuration that trusts only the launch authority
//! - The sealed server payload handed to the wrapping service, and its
//!   plugin-side counterpart that turns the unwrapped bytes back into a
//!   `rustls` server configuration
//! - SHA-256 artifact checksums with constant-time verification
//!
//! Nothing in this crate touches the disk with key material. Private keys
//! live in zeroizing buffers and are dropped with the launch that created
//! them.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use tether_crypto::{BootstrapParams, TransportBootstrap};
//!
//! let params = BootstrapParams::new("localhost", Duration::from_secs(600));
//! let bootstrap = TransportBootstrap::generate(&params).unwrap();
//!
//! let (client, sealed) = bootstrap.into_parts();
//! assert!(!client.ca_cert_der().is_empty());
//! let bytes = sealed.into_wrap_bytes();
//! assert!(!bytes.is_empty());
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod authority;
mod bootstrap;
mod checksum;
mod error;
mod payload;
mod transport;

pub use authority::{EphemeralCa, IssuedLeaf, LeafRole};
pub use bootstrap::{BootstrapParams, TransportBootstrap};
pub use checksum::{HashAlgorithm, Sha256Digest};
pub use error::{CryptoError, CryptoResult};
pub use payload::{SealedServerPayload, ServerTlsPayload};
pub use transport::ClientTransportConfig;
