//! Fake collaborators for launch tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tether_launch::{
    ExecutionFactory, LaunchError, LaunchResult, ResolvedLaunchConfig, WrappedToken,
    WrappingClient, WrappingError,
};
use zeroize::Zeroizing;

/// One recorded wrap request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WrapRequest {
    /// Requested token expiry.
    pub ttl: Duration,
    /// Size of the wrapped payload in bytes.
    pub payload_len: usize,
}

#[derive(Debug, Default)]
struct WrapState {
    version_calls: usize,
    requests: Vec<WrapRequest>,
    issued: Vec<String>,
    /// Unredeemed payloads keyed by token.
    vault: HashMap<String, Zeroizing<Vec<u8>>>,
}

/// In-memory wrapping service.
///
/// Issues a unique token per wrap and keeps the payload until the token is
/// redeemed once through [`FakeWrapper::unwrap_token`], like the real
/// service's response-wrapping.
///
/// Uses `std::sync::Mutex` internally so builder methods work without a
/// tokio runtime.
#[derive(Debug, Clone)]
pub struct FakeWrapper {
    version: Result<String, WrappingError>,
    mlock: bool,
    wrap_error: Option<WrappingError>,
    wrap_delay: Option<Duration>,
    empty_token: bool,
    state: Arc<Mutex<WrapState>>,
}

impl Default for FakeWrapper {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeWrapper {
    /// A healthy service reporting version `1.15.0` with mlock disabled.
    #[must_use]
    pub fn new() -> Self {
        Self {
            version: Ok("1.15.0".to_owned()),
            mlock: false,
            wrap_error: None,
            wrap_delay: None,
            empty_token: false,
            state: Arc::new(Mutex::new(WrapState::default())),
        }
    }

    /// Report `version` as the host version.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Ok(version.into());
        self
    }

    /// Fail every version lookup with `error`.
    #[must_use]
    pub fn with_version_error(mut self, error: WrappingError) -> Self {
        self.version = Err(error);
        self
    }

    /// Report the host mlock policy.
    #[must_use]
    pub fn with_mlock(mut self, enabled: bool) -> Self {
        self.mlock = enabled;
        self
    }

    /// Fail every wrap with `error` (after recording the request).
    #[must_use]
    pub fn with_wrap_error(mut self, error: WrappingError) -> Self {
        self.wrap_error = Some(error);
        self
    }

    /// Sleep for `delay` inside every wrap call.
    #[must_use]
    pub fn with_wrap_delay(mut self, delay: Duration) -> Self {
        self.wrap_delay = Some(delay);
        self
    }

    /// Return an empty token from every wrap.
    #[must_use]
    pub fn with_empty_tokens(mut self) -> Self {
        self.empty_token = true;
        self
    }

    /// Number of wrap calls made so far.
    #[must_use]
    pub fn wrap_count(&self) -> usize {
        self.state.lock().map(|s| s.requests.len()).unwrap_or(0)
    }

    /// Number of version lookups made so far.
    #[must_use]
    pub fn version_calls(&self) -> usize {
        self.state.lock().map(|s| s.version_calls).unwrap_or(0)
    }

    /// Every wrap request, in order.
    #[must_use]
    pub fn wrap_requests(&self) -> Vec<WrapRequest> {
        self.state
            .lock()
            .map(|s| s.requests.clone())
            .unwrap_or_default()
    }

    /// Every token issued, in order.
    #[must_use]
    pub fn issued_tokens(&self) -> Vec<String> {
        self.state
            .lock()
            .map(|s| s.issued.clone())
            .unwrap_or_default()
    }

    /// Redeem `token`. Returns the wrapped payload the first time and
    /// `None` afterwards.
    #[must_use]
    pub fn unwrap_token(&self, token: &str) -> Option<Zeroizing<Vec<u8>>> {
        self.state.lock().ok()?.vault.remove(token)
    }
}

#[async_trait]
impl WrappingClient for FakeWrapper {
    async fn host_version(&self) -> Result<String, WrappingError> {
        if let Ok(mut state) = self.state.lock() {
            state.version_calls = state.version_calls.saturating_add(1);
        }
        self.version.clone()
    }

    fn mlock_enabled(&self) -> bool {
        self.mlock
    }

    async fn wrap(&self, payload: &[u8], ttl: Duration) -> Result<WrappedToken, WrappingError> {
        let index = {
            let mut state = self
                .state
                .lock()
                .map_err(|_| WrappingError::Unavailable("fake wrapper poisoned".to_owned()))?;
            state.requests.push(WrapRequest {
                ttl,
                payload_len: payload.len(),
            });
            state.requests.len()
        };

        if let Some(delay) = self.wrap_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(error) = &self.wrap_error {
            return Err(error.clone());
        }
        if self.empty_token {
            return Ok(WrappedToken::new(""));
        }

        let token = format!("s.fake-wrap-{index:04}");
        let mut state = self
            .state
            .lock()
            .map_err(|_| WrappingError::Unavailable("fake wrapper poisoned".to_owned()))?;
        state.issued.push(token.clone());
        state
            .vault
            .insert(token.clone(), Zeroizing::new(payload.to_vec()));
        Ok(WrappedToken::new(token))
    }
}

/// Summary of one recorded start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedLaunch {
    /// Plugin name.
    pub name: String,
    /// Backend kind.
    pub backend: &'static str,
}

/// Execution factory that records configurations instead of running them.
#[derive(Debug, Clone, Default)]
pub struct RecordingFactory {
    started: Arc<Mutex<Vec<ResolvedLaunchConfig>>>,
    refuse_containers: bool,
}

impl RecordingFactory {
    /// Create a recording factory that accepts every backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse container configurations, like a process-only factory.
    #[must_use]
    pub fn refusing_containers(mut self) -> Self {
        self.refuse_containers = true;
        self
    }

    /// Number of configurations started so far.
    #[must_use]
    pub fn started_count(&self) -> usize {
        self.started.lock().map(|s| s.len()).unwrap_or(0)
    }

    /// Take every recorded configuration, leaving the record empty.
    #[must_use]
    pub fn take_started(&self) -> Vec<ResolvedLaunchConfig> {
        self.started
            .lock()
            .map(|mut s| std::mem::take(&mut *s))
            .unwrap_or_default()
    }
}

#[async_trait]
impl ExecutionFactory for RecordingFactory {
    type Handle = RecordedLaunch;

    async fn start(&self, config: ResolvedLaunchConfig) -> LaunchResult<RecordedLaunch> {
        let backend = config.backend().kind();
        if self.refuse_containers && backend == "container" {
            return Err(LaunchError::UnsupportedBackend {
                op: "record launch",
                backend,
            });
        }

        let handle = RecordedLaunch {
            name: config.name().to_owned(),
            backend,
        };
        if let Ok(mut started) = self.started.lock() {
            started.push(config);
        }
        Ok(handle)
    }
}
