//! Provides wrappers for tokio's types

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use tokio::io::{AsyncRead as TokioAsyncRead, AsyncWrite as TokioAsyncWrite};
use tokio::net::{TcpSocket, TcpStream, lookup_host};

use crate::io::{AsyncRead, AsyncWrite};
use crate::net::Connector;

/// Wrapper for Tokio types
///
/// Wraps a Tokio [`AsyncRead`](TokioAsyncRead) and [`AsyncWrite`](TokioAsyncWrite)
/// implementor to provide an [`AsyncRead`] and [`AsyncWrite`] implementation.
pub struct TokioIo<T>(T);

impl<T> TokioIo<T> {
    pub const fn new(inner: T) -> Self {
        Self(inner)
    }
}

impl<T> AsyncRead for TokioIo<T>
where
    T: TokioAsyncRead + Unpin,
{
    async fn async_read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        tokio::io::AsyncReadExt::read(&mut self.0, buf).await
    }
}

impl<T> AsyncWrite for TokioIo<T>
where
    T: TokioAsyncWrite + Unpin,
{
    async fn async_write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        tokio::io::AsyncWriteExt::write(&mut self.0, buf).await
    }
}

/// Connector for Tokio
///
/// Connects to a host and port using Tokio's [`TcpStream`].
pub struct TokioConnector;

impl Connector for TokioConnector {
    type Connection = TokioIo<TcpStream>;

    async fn connect(&self, host: &str, port: u16) -> std::io::Result<Self::Connection> {
        let stream = TcpStream::connect((host, port)).await?;
        Ok(TokioIo::new(stream))
    }

    async fn connect_with_port(
        &self,
        host: &str,
        port: u16,
        local_port: u16,
    ) -> std::io::Result<Self::Connection> {
        let addr = lookup_host((host, port)).await?.next().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "host resolved to no address")
        })?;
        let (socket, local) = match addr {
            SocketAddr::V4(_) => (
                TcpSocket::new_v4()?,
                SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), local_port),
            ),
            SocketAddr::V6(_) => (
                TcpSocket::new_v6()?,
                SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), local_port),
            ),
        };
        socket.bind(local)?;
        let stream = socket.connect(addr).await?;
        Ok(TokioIo::new(stream))
    }
}
