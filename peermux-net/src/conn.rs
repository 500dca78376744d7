//! TCP-backed transport for the peer engine.
//!
//! Wraps a [`NetStream`] in the binary frame codec and exposes it
//! through the engine's [`Transport`] trait. One task (the peer driver)
//! owns the transport; reads buffer into the decoder, so an interrupted
//! poll never loses bytes.

use std::io;
use std::time::Duration;

use peermux_core::{Transport, TransportEvent};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::codec::{Encoder, FrameDecoder};
use crate::config::{NetConfig, TlsSettings};
use crate::error::{NetError, Result};
use crate::frame::FrameKind;
use crate::stream::NetStream;
use crate::tls;

/// A framed peer link over TCP, optionally wrapped in TLS.
pub struct TcpTransport {
    stream: NetStream,
    decoder: FrameDecoder,
    opened: bool,
    closed: bool,
}

impl TcpTransport {
    /// Wraps an already-established stream, e.g. one accepted by a
    /// listener.
    pub fn from_stream(stream: NetStream) -> Self {
        TcpTransport {
            stream,
            decoder: FrameDecoder::new(),
            opened: false,
            closed: false,
        }
    }

    /// Dials a remote peer over plain TCP.
    pub async fn connect(addr: &str) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        Ok(Self::from_stream(NetStream::plain(stream)))
    }

    /// Dials a remote peer, upgrading the link to TLS when
    /// `tls.enabled` is set.
    pub async fn connect_with(addr: &str, tls: &TlsSettings) -> Result<Self> {
        let tcp = TcpStream::connect(addr).await?;
        Self::upgrade(tcp, addr, tls).await
    }

    /// Dials the peer described by `config.connect`, applying the
    /// configured timeout, socket options, and TLS settings.
    pub async fn connect_config(config: &NetConfig) -> Result<Self> {
        let addr = config.connect.addr.as_deref().ok_or(NetError::NoRemoteAddr)?;
        let timeout = Duration::from_secs(config.connect.connect_timeout_secs);

        let dial = async {
            let tcp = TcpStream::connect(addr).await?;
            if config.connect.nodelay {
                tcp.set_nodelay(true)?;
            }
            Self::upgrade(tcp, addr, &config.tls).await
        };
        match tokio::time::timeout(timeout, dial).await {
            Ok(result) => result,
            Err(_) => Err(NetError::Io(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("connecting to {addr} timed out"),
            ))),
        }
    }

    async fn upgrade(tcp: TcpStream, addr: &str, tls: &TlsSettings) -> Result<Self> {
        if !tls.enabled {
            return Ok(Self::from_stream(NetStream::plain(tcp)));
        }

        let host = match &tls.server_name {
            Some(name) => name.clone(),
            None => host_of(addr).to_string(),
        };
        let (connector, server_name) = if tls.insecure_skip_verify {
            tls::create_insecure_tls_connector(&host)?
        } else {
            tls::create_tls_connector(tls.ca_file.as_deref(), &host)?
        };

        let stream = connector
            .connect(server_name, tcp)
            .await
            .map_err(|e| NetError::TlsHandshake(e.to_string()))?;
        Ok(Self::from_stream(NetStream::tls(stream.into())))
    }

    pub fn is_tls(&self) -> bool {
        self.stream.is_tls()
    }

    pub fn peer_addr(&self) -> io::Result<std::net::SocketAddr> {
        self.stream.peer_addr()
    }
}

fn host_of(addr: &str) -> &str {
    addr.rsplit_once(':').map(|(host, _)| host).unwrap_or(addr)
}

impl Transport for TcpTransport {
    fn send(&mut self, text: String) -> impl std::future::Future<Output = io::Result<()>> + Send {
        async move {
            if self.closed {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "link closed"));
            }
            let bytes = Encoder::encode_text(text)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
            self.stream.write_all(&bytes).await?;
            self.stream.flush().await
        }
    }

    fn event(&mut self) -> impl std::future::Future<Output = TransportEvent> + Send {
        async move {
            if !self.opened {
                self.opened = true;
                return TransportEvent::Opened;
            }
            if self.closed {
                return TransportEvent::Closed { reason: None };
            }

            let mut buf = [0u8; 8192];
            loop {
                // Drain buffered frames before touching the socket so a
                // coalesced read yields every frame it carried.
                match self.decoder.decode_frame() {
                    Ok(Some(frame)) => match frame.kind {
                        FrameKind::Binary => return TransportEvent::Binary,
                        FrameKind::Text => match frame.into_text() {
                            Ok(text) => return TransportEvent::Text(text),
                            Err(e) => {
                                self.closed = true;
                                return TransportEvent::Closed {
                                    reason: Some(e.to_string()),
                                };
                            }
                        },
                    },
                    Ok(None) => {}
                    Err(e) => {
                        self.closed = true;
                        return TransportEvent::Closed {
                            reason: Some(e.to_string()),
                        };
                    }
                }

                match self.stream.read(&mut buf).await {
                    Ok(0) => {
                        self.closed = true;
                        return TransportEvent::Closed { reason: None };
                    }
                    Ok(n) => self.decoder.extend(&buf[..n]),
                    Err(e) => {
                        self.closed = true;
                        return TransportEvent::Closed {
                            reason: Some(e.to_string()),
                        };
                    }
                }
            }
        }
    }

    fn close(&mut self) -> impl std::future::Future<Output = ()> + Send {
        async move {
            if !self.closed {
                self.closed = true;
                let _ = self.stream.shutdown().await;
            }
        }
    }
}
