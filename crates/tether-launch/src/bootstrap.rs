//! Per-launch transport bootstrap.
//!
//! Generates a fresh authority and leaf pair through `tether-crypto`, then
//! hands the sealed server credentials to the wrapping service. The host
//! keeps the client transport; the plugin receives only the wrapped token.

use std::future::Future;

use tether_crypto::{BootstrapParams, ClientTransportConfig, TransportBootstrap};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{LaunchError, LaunchResult};
use crate::settings::LaunchSettings;
use crate::wrapping::{WrappedToken, WrappingClient, WrappingError};

const OP_GENERATE: &str = "generate launch certificates";
const OP_WRAP: &str = "wrap server payload";

/// Artifacts of one successful bootstrap.
#[derive(Debug)]
pub struct LaunchBootstrap {
    /// Host-side transport trusting only this launch's authority.
    pub transport: ClientTransportConfig,
    /// Single-use token the plugin redeems for its server credentials.
    pub token: WrappedToken,
}

/// Run `fut` unless `cancel` fires first.
pub(crate) async fn until_cancelled<F: Future>(
    cancel: &CancellationToken,
    op: &'static str,
    fut: F,
) -> LaunchResult<F::Output> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(LaunchError::Cancelled { op }),
        out = fut => Ok(out),
    }
}

/// Bootstrap transport trust for one launch.
///
/// Makes exactly one wrap request. Key material is dropped on every error
/// path; nothing partial is returned.
///
/// # Errors
///
/// - [`LaunchError::Cancelled`] if `cancel` fires before or during the wrap.
/// - [`LaunchError::Certificate`] if authority generation or signing fails.
/// - [`LaunchError::Wrap`] if the service fails or returns an empty token.
pub async fn bootstrap<W>(
    wrapper: &W,
    settings: &LaunchSettings,
    cancel: &CancellationToken,
) -> LaunchResult<LaunchBootstrap>
where
    W: WrappingClient + ?Sized,
{
    if cancel.is_cancelled() {
        return Err(LaunchError::Cancelled { op: OP_GENERATE });
    }

    let params = BootstrapParams::new(settings.server_name.clone(), settings.ca_validity);
    let (transport, sealed) = TransportBootstrap::generate(&params)
        .map_err(|source| LaunchError::Certificate {
            op: OP_GENERATE,
            source,
        })?
        .into_parts();

    let payload = sealed.into_wrap_bytes();
    let token = until_cancelled(cancel, OP_WRAP, wrapper.wrap(&payload, settings.wrap_ttl))
        .await?
        .map_err(|source| LaunchError::Wrap { op: OP_WRAP, source })?;
    drop(payload);

    if token.is_empty() {
        return Err(LaunchError::Wrap {
            op: OP_WRAP,
            source: WrappingError::Rejected("service returned an empty token".to_owned()),
        });
    }

    debug!(
        ttl_secs = settings.wrap_ttl.as_secs(),
        "wrapped server credentials"
    );

    Ok(LaunchBootstrap { transport, token })
}
