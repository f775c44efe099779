//! Traits for connecting to an endpoint.

use crate::io::{AsyncRead, AsyncWrite};

/// Trait for connecting to a host and port.
pub trait Connector {
    type Connection: AsyncRead + AsyncWrite;

    /// Connect to a host and port.
    fn connect(
        &self,
        host: &str,
        port: u16,
    ) -> impl Future<Output = std::io::Result<Self::Connection>>;

    /// Connect with a caller-chosen local source port.
    ///
    /// Transports that can bind (TCP) override this so privileged source
    /// ports satisfy `secure` export policies; the default ignores the hint.
    fn connect_with_port(
        &self,
        host: &str,
        port: u16,
        local_port: u16,
    ) -> impl Future<Output = std::io::Result<Self::Connection>> {
        let _ = local_port;
        self.connect(host, port)
    }
}
