//! Asynchronous I/O traits for reading and writing bytes.

/// Trait to read bytes asynchronously.
pub trait AsyncRead {
    /// Read bytes from the stream into the provided buffer.
    fn async_read(
        &mut self,
        buf: &mut [u8],
    ) -> impl Future<Output = std::io::Result<usize>>;

    /// Read exactly the number of bytes into the buffer.
    fn async_read_exact(
        &mut self,
        buf: &mut [u8],
    ) -> impl Future<Output = std::io::Result<()>> {
        async {
            let mut buf = buf;
            while !buf.is_empty() {
                let n = self.async_read(buf).await?;
                if n == 0 {
                    return Err(std::io::ErrorKind::UnexpectedEof.into());
                }
                buf = &mut buf[n..];
            }
            Ok(())
        }
    }
}

/// Trait to write bytes asynchronously.
pub trait AsyncWrite {
    /// Write bytes to the stream from the provided buffer.
    fn async_write(&mut self, buf: &[u8]) -> impl Future<Output = std::io::Result<usize>>;

    /// Write all bytes to the stream from the provided buffer.
    fn async_write_all(&mut self, buf: &[u8]) -> impl Future<Output = std::io::Result<()>> {
        async move {
            let mut buf = buf;
            while !buf.is_empty() {
                let n = self.async_write(buf).await?;
                if n == 0 {
                    return Err(std::io::ErrorKind::WriteZero.into());
                }
                buf = &buf[n..];
            }
            Ok(())
        }
    }
}
