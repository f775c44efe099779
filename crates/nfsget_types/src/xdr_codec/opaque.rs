use std::borrow::Cow;
use std::io::{Read, Write};

use crate::xdr_codec::util::{add_padding, get_padding, zero_padding};
use crate::xdr_codec::{Error, Pack, Result, Unpack};

/// Variable-length opaque data: a `u32` length prefix, the payload, and zero
/// padding up to the next 4-byte boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Opaque<'a>(pub Cow<'a, [u8]>);

impl Opaque<'static> {
    /// Creates a new `Opaque` with owned data.
    pub fn owned(data: Vec<u8>) -> Self {
        Opaque(Cow::Owned(data))
    }

    /// Unpacks an opaque whose length must not exceed `max` bytes.
    ///
    /// This is how length-bounded wire objects (file handles, path strings)
    /// reject oversized payloads before any allocation happens.
    pub fn unpack_bounded(input: &mut impl Read, max: usize) -> Result<(Self, usize)> {
        let (len, prefix) = u32::unpack(input)?;
        let len = len as usize;
        if len > max {
            return Err(Error::InvalidLength(len));
        }
        Self::unpack_body(input, len, prefix)
    }

    fn unpack_body(input: &mut impl Read, len: usize, mut bytes_read: usize) -> Result<(Self, usize)> {
        let mut buf = Vec::new();
        let copied = input
            .take(len as u64)
            .read_to_end(&mut buf)
            .map_err(Error::Io)?;
        if copied != len {
            return Err(Error::Io(std::io::ErrorKind::UnexpectedEof.into()));
        }
        bytes_read += len;

        let padding = get_padding(len);
        if padding > 0 {
            let mut pad_buf = [0u8; 4];
            input
                .read_exact(&mut pad_buf[..padding])
                .map_err(Error::Io)?;
            bytes_read += padding;
        }

        Ok((Opaque(Cow::Owned(buf)), bytes_read))
    }
}

impl<'a> Opaque<'a> {
    /// Creates a new `Opaque` from a borrowed slice.
    pub fn borrowed(data: &'a [u8]) -> Self {
        Opaque(Cow::Borrowed(data))
    }

    /// Returns the length of the opaque data.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the opaque data is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Extracts the owned data, cloning if it is still borrowed.
    pub fn into_owned(self) -> Vec<u8> {
        self.0.into_owned()
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }
}

impl Pack for Opaque<'_> {
    fn packed_size(&self) -> usize {
        4 + add_padding(self.0.len())
    }

    fn pack(&self, out: &mut impl Write) -> Result<usize> {
        let mut bytes_written = 0;
        let len: u32 = self
            .0
            .len()
            .try_into()
            .map_err(|_| Error::ObjectTooLarge(self.0.len()))?;
        bytes_written += len.pack(out)?;

        out.write_all(&self.0).map_err(Error::Io)?;
        bytes_written += self.0.len();

        let padding = zero_padding(self.0.len());
        out.write_all(padding).map_err(Error::Io)?;
        bytes_written += padding.len();
        Ok(bytes_written)
    }
}

impl Unpack for Opaque<'static> {
    fn unpack(input: &mut impl Read) -> Result<(Self, usize)> {
        let (len, prefix) = u32::unpack(input)?;
        Self::unpack_body(input, len as usize, prefix)
    }
}

impl AsRef<[u8]> for Opaque<'_> {
    fn as_ref(&self) -> &[u8] {
        self.0.as_ref()
    }
}

impl From<Vec<u8>> for Opaque<'static> {
    fn from(vec: Vec<u8>) -> Self {
        Opaque(Cow::Owned(vec))
    }
}

impl<'a> From<&'a [u8]> for Opaque<'a> {
    fn from(slice: &'a [u8]) -> Self {
        Opaque(Cow::Borrowed(slice))
    }
}
