//! Prelude module - commonly used types for convenient import.
//!
//! Use `use tether_crypto::prelude::*;` to import all essential types.

// Errors
pub use crate::{CryptoError, CryptoResult};

// Bootstrap
pub use crate::{BootstrapParams, ClientTransportConfig, SealedServerPayload, TransportBootstrap};

// Integrity
pub use crate::{HashAlgorithm, Sha256Digest};
