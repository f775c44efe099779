#![allow(
    non_camel_case_types,
    clippy::large_enum_variant,
    clippy::upper_case_acronyms
)]

//! Transcribed from RFC 1057 Appendix A

use std::io::{Read, Write};

use crate::xdr_codec::enums::xdr_enum;
use crate::xdr_codec::{Pack, Result, Unpack};

pub const IPPROTO_TCP: u32 = 6;
pub const IPPROTO_UDP: u32 = 17;
pub const PROGRAM: u32 = 100_000;
pub const VERSION: u32 = 2;

/// Default portmapper TCP port.
pub const PMAP_PORT: u16 = 111;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct mapping {
    pub prog: u32,
    pub vers: u32,
    pub prot: u32,
    pub port: u32,
}

impl Pack for mapping {
    fn packed_size(&self) -> usize {
        16
    }

    fn pack(&self, out: &mut impl Write) -> Result<usize> {
        let mut len = 0;
        len += self.prog.pack(out)?;
        len += self.vers.pack(out)?;
        len += self.prot.pack(out)?;
        len += self.port.pack(out)?;
        Ok(len)
    }
}

impl Unpack for mapping {
    fn unpack(input: &mut impl Read) -> Result<(Self, usize)> {
        let (prog, mut sz) = u32::unpack(input)?;
        let (vers, n) = u32::unpack(input)?;
        sz += n;
        let (prot, n) = u32::unpack(input)?;
        sz += n;
        let (port, n) = u32::unpack(input)?;
        sz += n;
        Ok((
            Self {
                prog,
                vers,
                prot,
                port,
            },
            sz,
        ))
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum PMAP_PROG {
    PMAPPROC_NULL = 0,
    PMAPPROC_SET = 1,
    PMAPPROC_UNSET = 2,
    PMAPPROC_GETPORT = 3,
    PMAPPROC_DUMP = 4,
    PMAPPROC_CALLIT = 5,
}
xdr_enum!(PMAP_PROG {
    PMAPPROC_NULL,
    PMAPPROC_SET,
    PMAPPROC_UNSET,
    PMAPPROC_GETPORT,
    PMAPPROC_DUMP,
    PMAPPROC_CALLIT,
});
