//! Socket wrapper that unifies plain TCP and TLS links.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use pin_project_lite::pin_project;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::TlsStream;

pin_project! {
    /// Either side of a peer link, with or without TLS.
    ///
    /// Both listener-accepted and dialed connections end up here, so the
    /// TLS variant uses the role-agnostic stream type.
    #[project = NetStreamProj]
    pub enum NetStream {
        Plain { #[pin] stream: TcpStream },
        Tls { #[pin] stream: TlsStream<TcpStream> },
    }
}

impl NetStream {
    pub fn plain(stream: TcpStream) -> Self {
        NetStream::Plain { stream }
    }

    pub fn tls(stream: TlsStream<TcpStream>) -> Self {
        NetStream::Tls { stream }
    }

    pub fn is_tls(&self) -> bool {
        matches!(self, NetStream::Tls { .. })
    }

    /// Address of the remote end of the link.
    pub fn peer_addr(&self) -> io::Result<std::net::SocketAddr> {
        match self {
            NetStream::Plain { stream } => stream.peer_addr(),
            NetStream::Tls { stream } => stream.get_ref().0.peer_addr(),
        }
    }
}

impl AsyncRead for NetStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.project() {
            NetStreamProj::Plain { stream } => stream.poll_read(cx, buf),
            NetStreamProj::Tls { stream } => stream.poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for NetStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.project() {
            NetStreamProj::Plain { stream } => stream.poll_write(cx, buf),
            NetStreamProj::Tls { stream } => stream.poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.project() {
            NetStreamProj::Plain { stream } => stream.poll_flush(cx),
            NetStreamProj::Tls { stream } => stream.poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.project() {
            NetStreamProj::Plain { stream } => stream.poll_shutdown(cx),
            NetStreamProj::Tls { stream } => stream.poll_shutdown(cx),
        }
    }
}
