//! Logging and TLS helpers for tests.

use std::sync::Arc;

use rustls::Connection;
use tether_crypto::ClientTransportConfig;
use tether_telemetry::{LogConfig, LogFormat, LogTarget, setup_logging};

/// Maximum flights exchanged before a handshake is declared stuck.
const MAX_FLIGHTS: usize = 16;

/// Install a test subscriber with the given filter.
///
/// Safe to call from every test; only the first call installs a subscriber.
pub fn setup_test_logging(filter: &str) {
    let config = LogConfig::new(filter)
        .with_format(LogFormat::Compact)
        .with_target(LogTarget::Test)
        .without_timestamps()
        .without_ansi();
    let _ = setup_logging(&config);
}

/// Install a test subscriber at `debug` for tether crates.
pub fn setup_test_logging_default() {
    setup_test_logging("tether_launch=debug,tether_crypto=debug");
}

/// Drive a full TLS handshake between a client built from `client` and a
/// server using `server`, entirely in memory.
///
/// # Errors
///
/// Returns the first TLS error raised by either side, or
/// [`rustls::Error::General`] if the handshake does not finish.
pub fn complete_handshake(
    client: &ClientTransportConfig,
    server: Arc<rustls::ServerConfig>,
) -> Result<(), rustls::Error> {
    let mut client_conn = Connection::Client(rustls::ClientConnection::new(
        client.tls_config(),
        client.server_name().clone(),
    )?);
    let mut server_conn = Connection::Server(rustls::ServerConnection::new(server)?);

    for _ in 0..MAX_FLIGHTS {
        pump(&mut client_conn, &mut server_conn)?;
        pump(&mut server_conn, &mut client_conn)?;

        if !client_conn.is_handshaking() && !server_conn.is_handshaking() {
            return Ok(());
        }
    }
    Err(rustls::Error::General("handshake did not complete".into()))
}

/// Move every pending record from `from` into `to`.
fn pump(from: &mut Connection, to: &mut Connection) -> Result<(), rustls::Error> {
    let mut buf = Vec::new();
    while from.wants_write() {
        from.write_tls(&mut buf).map_err(io_err)?;
    }
    let mut rd = buf.as_slice();
    while !rd.is_empty() {
        to.read_tls(&mut rd).map_err(io_err)?;
        to.process_new_packets()?;
    }
    Ok(())
}

fn io_err(e: std::io::Error) -> rustls::Error {
    rustls::Error::General(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tether_crypto::{BootstrapParams, ServerTlsPayload, TransportBootstrap};

    #[test]
    fn test_handshake_with_matching_material() {
        let params = BootstrapParams::new("localhost", Duration::from_secs(300));
        let (client, sealed) = TransportBootstrap::generate(&params)
            .unwrap()
            .into_parts();
        let server = ServerTlsPayload::from_unwrapped(&sealed.into_wrap_bytes())
            .unwrap()
            .server_config()
            .unwrap();

        complete_handshake(&client, server).unwrap();
    }

    #[test]
    fn test_setup_logging_is_idempotent() {
        setup_test_logging_default();
        setup_test_logging("warn");

        let again = setup_logging(&LogConfig::default().with_target(LogTarget::Discard));
        assert!(matches!(
            again,
            Err(tether_telemetry::TelemetryError::InitError(_))
        ));
    }
}
