//! Transport opening.
//!
//! A transport is any bidirectional byte stream. `ws` URLs get a plain TCP
//! socket; `wss` URLs get a rustls session on top of it. Certificate
//! verification is left entirely to rustls and the configured trust roots.

use std::fmt;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_rustls::rustls::{self, pki_types::ServerName};
use tokio_rustls::TlsConnector;
use tracing::{debug, instrument};

use crate::config::{ClientConfig, Target};
use crate::error::{WsError, WsResult};

/// A bidirectional byte stream usable as a WebSocket transport.
pub trait Transport: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T> Transport for T where T: AsyncRead + AsyncWrite + Send + Unpin {}

/// A type-erased transport.
pub type BoxedTransport = Box<dyn Transport>;

/// Produces the TLS connector used for `wss` connections.
#[derive(Clone)]
pub struct TlsConnectorSupplier(Arc<dyn Fn() -> WsResult<TlsConnector> + Send + Sync>);

impl TlsConnectorSupplier {
    /// Create a supplier from a factory function.
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> WsResult<TlsConnector> + Send + Sync + 'static,
    {
        Self(Arc::new(factory))
    }

    /// Create a supplier that always hands out clones of `connector`.
    pub fn from_connector(connector: TlsConnector) -> Self {
        Self::new(move || Ok(connector.clone()))
    }

    /// Obtain a connector.
    pub fn connector(&self) -> WsResult<TlsConnector> {
        (self.0)()
    }
}

impl Default for TlsConnectorSupplier {
    fn default() -> Self {
        Self::new(default_tls_connector)
    }
}

impl fmt::Debug for TlsConnectorSupplier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TlsConnectorSupplier(..)")
    }
}

/// Builds a TLS connector trusting the `webpki-roots` certificate set.
///
/// Uses the process-wide crypto provider if one is installed, `ring`
/// otherwise, and advertises `http/1.1` via ALPN.
pub fn default_tls_connector() -> WsResult<TlsConnector> {
    let mut roots = rustls::RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let provider = rustls::crypto::CryptoProvider::get_default()
        .cloned()
        .unwrap_or_else(|| Arc::new(rustls::crypto::ring::default_provider()));

    let mut config = rustls::ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| WsError::tls(e.to_string()))?
        .with_root_certificates(roots)
        .with_no_client_auth();
    config.alpn_protocols = vec![b"http/1.1".to_vec()];

    Ok(TlsConnector::from(Arc::new(config)))
}

/// Opens the transport for `target`.
#[instrument(skip(config), fields(host = %target.host, port = target.port, secure = target.secure))]
pub async fn open(target: &Target, config: &ClientConfig) -> WsResult<BoxedTransport> {
    let tcp = TcpStream::connect((target.connect_host(), target.port)).await?;
    tcp.set_nodelay(config.tcp_nodelay)?;

    if !target.secure {
        debug!("TCP transport connected");
        return Ok(Box::new(tcp));
    }

    let connector = config.tls.connector()?;
    let server_name = ServerName::try_from(target.connect_host().to_string())
        .map_err(|e| WsError::tls(format!("invalid server name {}: {e}", target.host)))?;
    let stream = connector
        .connect(server_name, tcp)
        .await
        .map_err(|e| WsError::tls(e.to_string()))?;

    debug!("TLS transport connected");
    Ok(Box::new(stream))
}
