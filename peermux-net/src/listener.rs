//! Accepting incoming peer links.

use std::io;
use std::net::SocketAddr;

use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;

use crate::config::NetConfig;
use crate::conn::TcpTransport;
use crate::error::{NetError, Result};
use crate::stream::NetStream;
use crate::tls;

/// Accepts peer links on a local address, with optional TLS.
pub struct PeerListener {
    listener: TcpListener,
    acceptor: Option<TlsAcceptor>,
}

impl PeerListener {
    /// Binds according to `config.listen` and `config.tls`.
    pub async fn bind(config: &NetConfig) -> Result<Self> {
        let listener = TcpListener::bind(config.listen.addr).await?;

        let acceptor = if config.tls.enabled {
            match (&config.tls.cert_file, &config.tls.key_file) {
                (Some(cert), Some(key)) => Some(tls::create_tls_acceptor(cert, key)?),
                _ => {
                    return Err(NetError::TlsConfig(
                        "tls.cert_file and tls.key_file are required to accept TLS links"
                            .to_string(),
                    ))
                }
            }
        } else {
            None
        };

        let mode = if acceptor.is_some() { "tls" } else { "plain" };
        tracing::info!("Listening on {} ({})", listener.local_addr()?, mode);
        Ok(PeerListener { listener, acceptor })
    }

    /// Binds a plain listener on `addr`.
    pub async fn bind_addr(addr: SocketAddr) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        tracing::info!("Listening on {} (plain)", listener.local_addr()?);
        Ok(PeerListener {
            listener,
            acceptor: None,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Waits for the next incoming link and completes the TLS handshake
    /// when one is configured.
    pub async fn accept(&self) -> Result<TcpTransport> {
        let (stream, addr) = self.listener.accept().await?;

        let stream = match &self.acceptor {
            Some(acceptor) => {
                let tls_stream = acceptor
                    .accept(stream)
                    .await
                    .map_err(|e| NetError::TlsHandshake(e.to_string()))?;
                NetStream::tls(tls_stream.into())
            }
            None => NetStream::plain(stream),
        };

        let tls_note = if self.acceptor.is_some() { " (tls)" } else { "" };
        tracing::info!("Peer connected: {}{}", addr, tls_note);
        Ok(TcpTransport::from_stream(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;

    use peermux_core::Peer;
    use tokio::time::timeout;
    use tokio_test::assert_ok;

    const WAIT: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn binds_an_ephemeral_port() {
        let listener =
            assert_ok!(PeerListener::bind_addr("127.0.0.1:0".parse().unwrap()).await);
        assert_ne!(listener.local_addr().unwrap().port(), 0);
    }

    #[tokio::test]
    async fn accepted_links_carry_a_full_session() {
        let listener = PeerListener::bind_addr("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap();

        let accepting = tokio::spawn(async move { listener.accept().await.unwrap() });
        let dialed = TcpTransport::connect(&addr.to_string()).await.unwrap();
        let accepted = timeout(WAIT, accepting).await.unwrap().unwrap();

        let server = Peer::attach(accepted);
        server.register_method("whoami", "", |req| async move {
            Ok(format!("you said {}", req.args()))
        });

        let client = Peer::attach(dialed);
        let (a, b) = tokio::join!(client.init("c"), server.init("s"));
        assert!(a.is_ok());
        assert!(b.is_ok());

        let reply = timeout(WAIT, client.call("whoami", "hi"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reply, "you said hi");
    }

    #[tokio::test]
    async fn tls_without_material_is_rejected() {
        let mut config = NetConfig::default();
        config.listen.addr = "127.0.0.1:0".parse().unwrap();
        config.tls.enabled = true;
        config.tls.cert_file = Some(PathBuf::from("/etc/peermux/cert.pem"));
        // key_file left unset on purpose.

        let result = PeerListener::bind(&config).await;
        assert!(matches!(result, Err(NetError::TlsConfig(_))));
    }
}
