#![allow(
    non_camel_case_types,
    clippy::large_enum_variant,
    clippy::upper_case_acronyms
)]

//! This module contains the definitions of the MOUNT3 protocol as defined in RFC 1813.

use std::io::{Read, Write};

use crate::xdr_codec::enums::xdr_enum;
use crate::xdr_codec::{Opaque, Pack, Result, Unpack};

pub const PROGRAM: u32 = 100_005;
pub const VERSION: u32 = 3;
pub const MNTPATHLEN: usize = 1024;
pub const MNTNAMLEN: usize = 255;
pub const FHSIZE3: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct dirpath<'a>(pub Opaque<'a>);

impl Pack for dirpath<'_> {
    fn packed_size(&self) -> usize {
        self.0.packed_size()
    }

    fn pack(&self, out: &mut impl Write) -> Result<usize> {
        self.0.pack(out)
    }
}

impl Unpack for dirpath<'static> {
    fn unpack(input: &mut impl Read) -> Result<(Self, usize)> {
        let (path, sz) = Opaque::unpack_bounded(input, MNTPATHLEN)?;
        Ok((Self(path), sz))
    }
}

/// A server file handle as MOUNT3 hands it out: opaque, at most 64 bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct fhandle3<'a>(pub Opaque<'a>);

impl Pack for fhandle3<'_> {
    fn packed_size(&self) -> usize {
        self.0.packed_size()
    }

    fn pack(&self, out: &mut impl Write) -> Result<usize> {
        self.0.pack(out)
    }
}

impl Unpack for fhandle3<'static> {
    fn unpack(input: &mut impl Read) -> Result<(Self, usize)> {
        let (fh, sz) = Opaque::unpack_bounded(input, FHSIZE3)?;
        Ok((Self(fh), sz))
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum mountstat3 {
    MNT3_OK = 0,
    MNT3ERR_PERM = 1,
    MNT3ERR_NOENT = 2,
    MNT3ERR_IO = 5,
    MNT3ERR_ACCES = 13,
    MNT3ERR_NOTDIR = 20,
    MNT3ERR_INVAL = 22,
    MNT3ERR_NAMETOOLONG = 63,
    MNT3ERR_NOTSUPP = 10004,
    MNT3ERR_SERVERFAULT = 10006,
}
xdr_enum!(mountstat3 {
    MNT3_OK,
    MNT3ERR_PERM,
    MNT3ERR_NOENT,
    MNT3ERR_IO,
    MNT3ERR_ACCES,
    MNT3ERR_NOTDIR,
    MNT3ERR_INVAL,
    MNT3ERR_NAMETOOLONG,
    MNT3ERR_NOTSUPP,
    MNT3ERR_SERVERFAULT,
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct mountres3_ok<'a> {
    pub fhandle: fhandle3<'a>,
    pub auth_flavors: Vec<u32>,
}

impl Pack for mountres3_ok<'_> {
    fn packed_size(&self) -> usize {
        self.fhandle.packed_size() + self.auth_flavors.packed_size()
    }

    fn pack(&self, out: &mut impl Write) -> Result<usize> {
        Ok(self.fhandle.pack(out)? + self.auth_flavors.pack(out)?)
    }
}

impl Unpack for mountres3_ok<'static> {
    fn unpack(input: &mut impl Read) -> Result<(Self, usize)> {
        let (fhandle, mut sz) = fhandle3::unpack(input)?;
        let (auth_flavors, n) = Vec::<u32>::unpack(input)?;
        sz += n;
        Ok((
            Self {
                fhandle,
                auth_flavors,
            },
            sz,
        ))
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum mountres3<'a> {
    Ok(mountres3_ok<'a>),
    Err(mountstat3),
}

impl Pack for mountres3<'_> {
    fn packed_size(&self) -> usize {
        match self {
            Self::Ok(ok) => mountstat3::MNT3_OK.packed_size() + ok.packed_size(),
            Self::Err(err) => err.packed_size(),
        }
    }

    fn pack(&self, out: &mut impl Write) -> Result<usize> {
        let len = match self {
            Self::Ok(ok) => {
                let mut len = mountstat3::MNT3_OK.pack(out)?;
                len += ok.pack(out)?;
                len
            }
            Self::Err(err) => err.pack(out)?,
        };
        Ok(len)
    }
}

impl Unpack for mountres3<'static> {
    fn unpack(input: &mut impl Read) -> Result<(Self, usize)> {
        let (stat, len) = mountstat3::unpack(input)?;
        let (res, res_len) = match stat {
            mountstat3::MNT3_OK => {
                let (ok, ok_len) = mountres3_ok::unpack(input)?;
                (Self::Ok(ok), ok_len)
            }
            _ => (Self::Err(stat), 0),
        };
        Ok((res, len + res_len))
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum MOUNT_PROGRAM {
    MOUNTPROC3_NULL = 0,
    MOUNTPROC3_MNT = 1,
    MOUNTPROC3_DUMP = 2,
    MOUNTPROC3_UMNT = 3,
    MOUNTPROC3_UMNTALL = 4,
    MOUNTPROC3_EXPORT = 5,
}
xdr_enum!(MOUNT_PROGRAM {
    MOUNTPROC3_NULL,
    MOUNTPROC3_MNT,
    MOUNTPROC3_DUMP,
    MOUNTPROC3_UMNT,
    MOUNTPROC3_UMNTALL,
    MOUNTPROC3_EXPORT,
});
