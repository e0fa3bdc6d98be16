//! End-to-end tests for launch configuration building.
//!
//! These drive the public builder against the fake wrapping service and
//! check the properties every resolved configuration must hold:
//! - Bootstrap runs exactly when neither metadata mode nor auto-mTLS is set
//! - Every launch gets fresh trust material and a fresh token
//! - The wrapped token redeems into server credentials that complete a
//!   mutual TLS handshake with the returned client transport
//! - Environment precedence and backend translation

use std::sync::Arc;
use std::time::Duration;

use tether_crypto::{Sha256Digest, ServerTlsPayload};
use tether_launch::{
    AUTO_MTLS_ENV, HOST_VERSION_ENV, LaunchConfigBuilder, LaunchError, LaunchOptions,
    LaunchSettings, METADATA_MODE_ENV, MLOCK_ENABLED_ENV, PluginDescriptor, RuntimeLimits,
    UNWRAP_TOKEN_ENV, WrappingError,
};
use tether_test::prelude::*;
use tokio_util::sync::CancellationToken;

fn builder(wrapper: &Arc<FakeWrapper>) -> LaunchConfigBuilder<FakeWrapper> {
    LaunchConfigBuilder::new(Arc::clone(wrapper))
}

// ---------------------------------------------------------------------------
// Bootstrap gating
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_default_options_bootstrap_once() {
    setup_test_logging_default();
    let wrapper = Arc::new(FakeWrapper::new());

    let config = builder(&wrapper)
        .build(
            &process_descriptor(),
            LaunchOptions::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(wrapper.wrap_count(), 1);
    assert!(config.transport().is_some());
    assert_eq!(
        config.env_value(UNWRAP_TOKEN_ENV),
        Some(wrapper.issued_tokens()[0].as_str())
    );
    assert_eq!(config.env_value(METADATA_MODE_ENV), Some("false"));
    assert_eq!(config.env_value(AUTO_MTLS_ENV), Some("false"));
    assert_eq!(config.env_value(HOST_VERSION_ENV), Some("1.15.0"));
    assert_eq!(
        wrapper.wrap_requests()[0].ttl,
        LaunchSettings::default().wrap_ttl
    );
}

#[tokio::test]
async fn test_metadata_mode_skips_bootstrap() {
    let wrapper = Arc::new(FakeWrapper::new());
    let options = LaunchOptions {
        metadata_mode: true,
        ..LaunchOptions::default()
    };

    let config = builder(&wrapper)
        .build(&process_descriptor(), options, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(wrapper.wrap_count(), 0);
    assert!(config.transport().is_none());
    assert!(config.env_value(UNWRAP_TOKEN_ENV).is_none());
    assert_eq!(config.env_value(METADATA_MODE_ENV), Some("true"));
    assert!(config.metadata_mode());
}

#[tokio::test]
async fn test_auto_mtls_skips_bootstrap() {
    let wrapper = Arc::new(FakeWrapper::new());
    let options = LaunchOptions {
        auto_mtls: true,
        ..LaunchOptions::default()
    };

    let config = builder(&wrapper)
        .build(&process_descriptor(), options, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(wrapper.wrap_count(), 0);
    assert!(config.transport().is_none());
    assert!(config.env_value(UNWRAP_TOKEN_ENV).is_none());
    assert_eq!(config.env_value(AUTO_MTLS_ENV), Some("true"));
}

// ---------------------------------------------------------------------------
// Trust material
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_each_build_gets_fresh_material() {
    let wrapper = Arc::new(FakeWrapper::new());
    let builder = builder(&wrapper);
    let cancel = CancellationToken::new();

    let first = builder
        .build(&process_descriptor(), LaunchOptions::default(), &cancel)
        .await
        .unwrap();
    let second = builder
        .build(&process_descriptor(), LaunchOptions::default(), &cancel)
        .await
        .unwrap();

    assert_eq!(wrapper.wrap_count(), 2);
    assert_ne!(
        first.env_value(UNWRAP_TOKEN_ENV),
        second.env_value(UNWRAP_TOKEN_ENV)
    );
    assert_ne!(
        first.transport().unwrap().ca_cert_der(),
        second.transport().unwrap().ca_cert_der()
    );

    // Everything apart from the trust material is identical.
    let without_token = |env: &[String]| -> Vec<String> {
        env.iter()
            .filter(|e| !e.starts_with(&format!("{UNWRAP_TOKEN_ENV}=")))
            .cloned()
            .collect()
    };
    assert_eq!(first.backend(), second.backend());
    assert_eq!(without_token(first.env()), without_token(second.env()));
    assert_eq!(first.env().len(), second.env().len());
    assert_eq!(first.name(), second.name());
    assert_eq!(first.handshake(), second.handshake());
}

#[tokio::test]
async fn test_redeemed_token_completes_handshake() {
    let wrapper = Arc::new(FakeWrapper::new());
    let config = builder(&wrapper)
        .build(
            &process_descriptor(),
            LaunchOptions::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    // Plugin side: redeem the token from its environment.
    let token = config.env_value(UNWRAP_TOKEN_ENV).unwrap();
    let unwrapped = wrapper.unwrap_token(token).unwrap();
    let payload = ServerTlsPayload::from_unwrapped(&unwrapped).unwrap();
    assert!(wrapper.unwrap_token(token).is_none());

    let transport = config.transport().unwrap();
    assert_eq!(payload.ca_cert_der(), transport.ca_cert_der());
    complete_handshake(transport, payload.server_config().unwrap()).unwrap();
}

#[tokio::test]
async fn test_payload_from_other_launch_fails_handshake() {
    let wrapper = Arc::new(FakeWrapper::new());
    let builder = builder(&wrapper);
    let cancel = CancellationToken::new();

    let first = builder
        .build(&process_descriptor(), LaunchOptions::default(), &cancel)
        .await
        .unwrap();
    let second = builder
        .build(&process_descriptor(), LaunchOptions::default(), &cancel)
        .await
        .unwrap();

    let token = second.env_value(UNWRAP_TOKEN_ENV).unwrap();
    let payload = ServerTlsPayload::from_unwrapped(&wrapper.unwrap_token(token).unwrap()).unwrap();

    let result = complete_handshake(first.transport().unwrap(), payload.server_config().unwrap());
    assert!(result.is_err());
}

// ---------------------------------------------------------------------------
// Environment
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_extra_env_overrides_base_env() {
    let wrapper = Arc::new(FakeWrapper::new());
    let descriptor = process_descriptor().with_env("A=1").with_env("KEEP=yes");
    let options = LaunchOptions {
        extra_env: vec!["A=2".to_owned()],
        ..LaunchOptions::default()
    };

    let config = builder(&wrapper)
        .build(&descriptor, options, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(config.env_value("A"), Some("2"));
    assert_eq!(config.env_value("KEEP"), Some("yes"));
    assert_eq!(
        config.env().iter().filter(|e| e.starts_with("A=")).count(),
        1
    );
}

#[tokio::test]
async fn test_extra_env_overrides_generated_flags() {
    let wrapper = Arc::new(FakeWrapper::new());
    let options = LaunchOptions {
        extra_env: vec![format!("{HOST_VERSION_ENV}=pinned")],
        ..LaunchOptions::default()
    };

    let config = builder(&wrapper)
        .build(&process_descriptor(), options, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(config.env_value(HOST_VERSION_ENV), Some("pinned"));
}

#[tokio::test]
async fn test_host_mlock_policy_sets_flag() {
    let wrapper = Arc::new(FakeWrapper::new().with_mlock(true));

    let config = builder(&wrapper)
        .build(
            &process_descriptor(),
            LaunchOptions::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(config.env_value(MLOCK_ENABLED_ENV), Some("true"));
}

#[tokio::test]
async fn test_mlock_flag_absent_by_default() {
    let wrapper = Arc::new(FakeWrapper::new());
    let options = LaunchOptions {
        metadata_mode: true,
        ..LaunchOptions::default()
    };

    let config = builder(&wrapper)
        .build(&process_descriptor(), options, &CancellationToken::new())
        .await
        .unwrap();

    assert!(config.env_value(MLOCK_ENABLED_ENV).is_none());
}

#[tokio::test]
async fn test_reserved_token_variable_rejected() {
    let wrapper = Arc::new(FakeWrapper::new());
    let options = LaunchOptions {
        extra_env: vec![format!("{UNWRAP_TOKEN_ENV}=forged")],
        ..LaunchOptions::default()
    };

    let err = builder(&wrapper)
        .build(&process_descriptor(), options, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, LaunchError::InvalidParameter { .. }));
    assert_eq!(wrapper.wrap_count(), 0);
}

#[tokio::test]
async fn test_debug_output_redacts_token() {
    let wrapper = Arc::new(FakeWrapper::new());
    let config = builder(&wrapper)
        .build(
            &process_descriptor(),
            LaunchOptions::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let token = wrapper.issued_tokens()[0].clone();
    assert!(!format!("{config:?}").contains(&token));
}

// ---------------------------------------------------------------------------
// Backends
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_process_backend_carries_checksum() {
    let wrapper = Arc::new(FakeWrapper::new());
    let descriptor = process_descriptor().with_args(["--listen", "unix"]);

    let config = builder(&wrapper)
        .build(&descriptor, LaunchOptions::default(), &CancellationToken::new())
        .await
        .unwrap();

    let process = config.backend().as_process().unwrap();
    assert_eq!(process.command, "plugin-bin");
    assert_eq!(process.args, vec!["--listen", "unix"]);
    assert_eq!(process.checksum.algorithm.to_string(), "sha256");
    assert_eq!(process.checksum.digest, Sha256Digest::digest(b"plugin-bin"));
    assert!(!config.skip_host_env());
}

#[tokio::test]
async fn test_process_without_checksum_rejected() {
    let wrapper = Arc::new(FakeWrapper::new());
    let descriptor = PluginDescriptor::process("plugin-bin", "plugin-bin", Vec::new());

    let err = builder(&wrapper)
        .build(&descriptor, LaunchOptions::default(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, LaunchError::InvalidParameter { .. }));
    assert_eq!(wrapper.wrap_count(), 0);
    assert_eq!(wrapper.version_calls(), 0);
}

#[tokio::test]
async fn test_container_backend_translates_limits() {
    let wrapper = Arc::new(FakeWrapper::new());
    let descriptor = container_descriptor().with_runtime_limits(
        RuntimeLimits::default()
            .with_cpus(2)
            .with_memory_bytes(536_870_912)
            .with_cgroup_parent("/vault"),
    );

    let config = builder(&wrapper)
        .build(&descriptor, LaunchOptions::default(), &CancellationToken::new())
        .await
        .unwrap();

    let container = config.backend().as_container().unwrap();
    assert_eq!(container.nano_cpus, Some(2_000_000_000));
    assert_eq!(container.memory_bytes, Some(536_870_912));
    assert_eq!(container.cgroup_parent.as_deref(), Some("/vault"));
    assert_eq!(container.runtime, "runsc");
    assert_eq!(container.tag, "1.2.0");
    assert_eq!(
        container.image_ref(),
        "registry.example.com/vault-plugin:1.2.0"
    );
    assert_eq!(
        container.sha256.as_deref(),
        Some(Sha256Digest::digest(b"plugin-bin").to_hex().as_str())
    );
    assert_eq!(
        container.labels.get("managed-by").map(String::as_str),
        Some("tether")
    );
    assert!(container.entrypoint.is_none());
    assert!(config.skip_host_env());
}

#[tokio::test]
async fn test_container_memory_below_minimum_rejected() {
    let wrapper = Arc::new(FakeWrapper::new());
    let descriptor = container_descriptor()
        .with_runtime_limits(RuntimeLimits::default().with_memory_bytes(1_048_576));

    let err = builder(&wrapper)
        .build(&descriptor, LaunchOptions::default(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, LaunchError::BackendAssembly { .. }));
    assert_eq!(wrapper.wrap_count(), 0);
}

// ---------------------------------------------------------------------------
// Failures and cancellation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_version_failure_aborts_before_wrap() {
    let wrapper = Arc::new(
        FakeWrapper::new().with_version_error(WrappingError::Unavailable("sealed".to_owned())),
    );

    let err = builder(&wrapper)
        .build(
            &process_descriptor(),
            LaunchOptions::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, LaunchError::VersionLookup { .. }));
    assert_eq!(wrapper.wrap_count(), 0);
}

#[tokio::test]
async fn test_wrap_failure_surfaces_as_wrap_error() {
    let wrapper = Arc::new(
        FakeWrapper::new().with_wrap_error(WrappingError::Rejected("policy denied".to_owned())),
    );

    let err = builder(&wrapper)
        .build(
            &process_descriptor(),
            LaunchOptions::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, LaunchError::Wrap { .. }));
    assert!(err.to_string().contains("policy denied"));
}

#[tokio::test]
async fn test_empty_token_rejected() {
    let wrapper = Arc::new(FakeWrapper::new().with_empty_tokens());

    let err = builder(&wrapper)
        .build(
            &process_descriptor(),
            LaunchOptions::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, LaunchError::Wrap { .. }));
}

#[tokio::test]
async fn test_overlong_ttl_never_reaches_wrapper() {
    let wrapper = Arc::new(FakeWrapper::new());
    let settings = LaunchSettings {
        wrap_ttl: Duration::from_secs(31_536_000),
        ca_validity: Duration::from_secs(31_536_000),
        ..LaunchSettings::default()
    };

    let err = builder(&wrapper)
        .with_settings(settings)
        .build(
            &process_descriptor(),
            LaunchOptions::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, LaunchError::InvalidParameter { .. }));
    assert_eq!(wrapper.wrap_count(), 0);
    assert!(wrapper.wrap_requests().is_empty());
}

#[tokio::test]
async fn test_cancel_during_wrap() {
    let wrapper = Arc::new(FakeWrapper::new().with_wrap_delay(Duration::from_secs(3600)));
    let cancel = CancellationToken::new();

    let canceller = {
        let cancel = cancel.clone();
        let wrapper = Arc::clone(&wrapper);
        tokio::spawn(async move {
            while wrapper.wrap_count() == 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            cancel.cancel();
        })
    };

    let err = builder(&wrapper)
        .build(&process_descriptor(), LaunchOptions::default(), &cancel)
        .await
        .unwrap_err();
    canceller.await.unwrap();

    assert!(err.is_cancelled());
    assert_eq!(err.op(), "wrap server payload");
    assert!(wrapper.issued_tokens().is_empty());
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let wrapper = Arc::new(FakeWrapper::new());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = builder(&wrapper)
        .build(&process_descriptor(), LaunchOptions::default(), &cancel)
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(wrapper.wrap_count(), 0);
}

#[tokio::test]
async fn test_concurrent_builds_are_independent() {
    let wrapper = Arc::new(FakeWrapper::new());
    let builder = builder(&wrapper);

    let mut handles = Vec::new();
    for _ in 0..4 {
        let builder = builder.clone();
        handles.push(tokio::spawn(async move {
            builder
                .build(
                    &process_descriptor(),
                    LaunchOptions::default(),
                    &CancellationToken::new(),
                )
                .await
        }));
    }

    let mut tokens = Vec::new();
    for handle in handles {
        let config = handle.await.unwrap().unwrap();
        tokens.push(config.env_value(UNWRAP_TOKEN_ENV).unwrap().to_owned());
    }
    tokens.sort();
    tokens.dedup();

    assert_eq!(tokens.len(), 4);
    assert_eq!(wrapper.wrap_count(), 4);
}
