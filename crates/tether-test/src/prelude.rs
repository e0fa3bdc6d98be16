//! Prelude module - commonly used test utilities.
//!
//! Use `use tether_test::prelude::*;` to import everything at once.

pub use crate::fixtures::{
    container_descriptor, process_descriptor, sample_sha256, test_handshake,
};
pub use crate::harness::{complete_handshake, setup_test_logging, setup_test_logging_default};
pub use crate::mocks::{FakeWrapper, RecordedLaunch, RecordingFactory, WrapRequest};
