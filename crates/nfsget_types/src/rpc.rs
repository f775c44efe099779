#![allow(
    non_camel_case_types,
    clippy::large_enum_variant,
    clippy::upper_case_acronyms
)]

//! This module contains the definitions of the RPC protocol as defined in RFC 1057.

use std::io::{Read, Write};

use crate::xdr_codec::enums::xdr_enum;
use crate::xdr_codec::{Error, Opaque, Pack, Result, Unpack};

/// Record-marking header
///
/// ONC RPC over TCP prefixes every fragment with a 32-bit word: the high bit
/// marks the last fragment of a record, the low 31 bits carry the fragment
/// length.
#[derive(Default, Copy, Clone, Debug, Eq, PartialEq)]
pub struct fragment_header {
    pub header: u32,
}

impl fragment_header {
    pub const LAST_FLAG: u32 = 0x8000_0000;
    pub const MASK: u32 = 0x7FFF_FFFF;

    /// Creates a new `fragment_header` with the given length and last-fragment
    /// flag.
    ///
    /// # Panics
    ///
    /// Panics if the length is greater than 2 GiB.
    #[must_use]
    pub fn new(length: u32, last: bool) -> Self {
        assert!(length <= Self::MASK);
        let mut header = length;
        if last {
            header |= Self::LAST_FLAG;
        }
        Self { header }
    }

    #[must_use]
    pub const fn last(&self) -> bool {
        self.header & Self::LAST_FLAG != 0
    }

    #[must_use]
    pub const fn fragment_length(&self) -> u32 {
        self.header & Self::MASK
    }

    #[must_use]
    pub const fn into_xdr_buf(self) -> [u8; 4] {
        self.header.to_be_bytes()
    }
}

impl From<[u8; 4]> for fragment_header {
    fn from(bytes: [u8; 4]) -> Self {
        let header = u32::from_be_bytes(bytes);
        Self { header }
    }
}

impl Pack for fragment_header {
    fn packed_size(&self) -> usize {
        4
    }

    fn pack(&self, out: &mut impl Write) -> Result<usize> {
        self.header.pack(out)
    }
}

impl Unpack for fragment_header {
    fn unpack(input: &mut impl Read) -> Result<(Self, usize)> {
        let (header, bytes_read) = u32::unpack(input)?;
        Ok((Self { header }, bytes_read))
    }
}

pub const RPC_VERSION_2: u32 = 2;

/// Longest machine name an AUTH_SYS credential may carry.
pub const MAX_MACHINENAME_LEN: usize = 255;

/// Most auxiliary gids an AUTH_SYS credential may carry.
pub const MAX_AUX_GIDS: usize = 16;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u32)]
pub enum msg_type {
    CALL = 0,
    REPLY = 1,
}
xdr_enum!(msg_type { CALL, REPLY });

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u32)]
pub enum reply_stat {
    MSG_ACCEPTED = 0,
    MSG_DENIED = 1,
}
xdr_enum!(reply_stat { MSG_ACCEPTED, MSG_DENIED });

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u32)]
pub enum accept_stat {
    SUCCESS = 0,
    PROG_UNAVAIL = 1,
    PROG_MISMATCH = 2,
    PROC_UNAVAIL = 3,
    GARBAGE_ARGS = 4,
    SYSTEM_ERR = 5,
}
xdr_enum!(accept_stat {
    SUCCESS,
    PROG_UNAVAIL,
    PROG_MISMATCH,
    PROC_UNAVAIL,
    GARBAGE_ARGS,
    SYSTEM_ERR,
});

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u32)]
pub enum reject_stat {
    RPC_MISMATCH = 0,
    AUTH_ERROR = 1,
}
xdr_enum!(reject_stat { RPC_MISMATCH, AUTH_ERROR });

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u32)]
pub enum auth_stat {
    AUTH_OK = 0,
    AUTH_BADCRED = 1,
    AUTH_REJECTEDCRED = 2,
    AUTH_BADVERF = 3,
    AUTH_REJECTEDVERF = 4,
    AUTH_TOOWEAK = 5,
    AUTH_INVALIDRESP = 6,
    AUTH_FAILED = 7,
}
xdr_enum!(auth_stat {
    AUTH_OK,
    AUTH_BADCRED,
    AUTH_REJECTEDCRED,
    AUTH_BADVERF,
    AUTH_REJECTEDVERF,
    AUTH_TOOWEAK,
    AUTH_INVALIDRESP,
    AUTH_FAILED,
});

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u32)]
pub enum auth_flavor {
    AUTH_NONE = 0,
    AUTH_SYS = 1,
    AUTH_SHORT = 2,
    AUTH_DH = 3,
    // and more to be defined
}
xdr_enum!(auth_flavor {
    AUTH_NONE,
    AUTH_SYS,
    AUTH_SHORT,
    AUTH_DH,
});

/// A credential or verifier: a flavor tag and an opaque, flavor-specific body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct opaque_auth<'a> {
    pub flavor: auth_flavor,
    pub body: Opaque<'a>,
}

impl Default for opaque_auth<'static> {
    fn default() -> Self {
        Self {
            flavor: auth_flavor::AUTH_NONE,
            body: Opaque::borrowed(&[]),
        }
    }
}

impl opaque_auth<'static> {
    /// Creates a new `opaque_auth` with the AUTH_SYS flavor and a body packed
    /// from `auth`.
    ///
    /// # Panics
    ///
    /// Panics if the `auth_sys` cannot be packed, which cannot happen for a
    /// credential that respects the machine-name and gid-count bounds.
    #[must_use]
    pub fn auth_sys(auth: &auth_sys) -> Self {
        let mut out = Vec::with_capacity(auth.packed_size());
        auth.pack(&mut out).expect("failed to pack auth_sys");
        Self {
            flavor: auth_flavor::AUTH_SYS,
            body: Opaque::owned(out),
        }
    }

    #[must_use]
    pub fn borrow(&self) -> opaque_auth<'_> {
        opaque_auth {
            flavor: self.flavor,
            body: Opaque::borrowed(self.body.as_ref()),
        }
    }
}

impl Pack for opaque_auth<'_> {
    fn packed_size(&self) -> usize {
        self.flavor.packed_size() + self.body.packed_size()
    }

    fn pack(&self, out: &mut impl Write) -> Result<usize> {
        Ok(self.flavor.pack(out)? + self.body.pack(out)?)
    }
}

impl Unpack for opaque_auth<'static> {
    fn unpack(input: &mut impl Read) -> Result<(Self, usize)> {
        let (flavor, mut bytes_read) = auth_flavor::unpack(input)?;
        let (body, body_bytes) = Opaque::unpack(input)?;
        bytes_read += body_bytes;
        Ok((Self { flavor, body }, bytes_read))
    }
}

/// The AUTH_SYS credential body (RFC 1057 appendix A).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct auth_sys {
    pub stamp: u32,
    pub machinename: Opaque<'static>,
    pub uid: u32,
    pub gid: u32,
    pub gids: Vec<u32>,
}

impl auth_sys {
    /// Builds a credential body, truncating the machine name and the
    /// auxiliary gid list to their RFC limits.
    #[must_use]
    pub fn new(machinename: &str, uid: u32, gid: u32, gids: &[u32]) -> Self {
        let mut name = machinename.as_bytes().to_vec();
        name.truncate(MAX_MACHINENAME_LEN);
        let mut gids = gids.to_vec();
        gids.truncate(MAX_AUX_GIDS);
        Self {
            stamp: 0,
            machinename: Opaque::owned(name),
            uid,
            gid,
            gids,
        }
    }
}

impl Default for auth_sys {
    fn default() -> Self {
        Self {
            stamp: 0,
            machinename: Opaque::borrowed(b""),
            uid: 0,
            gid: 0,
            gids: vec![],
        }
    }
}

impl Pack for auth_sys {
    fn packed_size(&self) -> usize {
        self.stamp.packed_size()
            + self.machinename.packed_size()
            + self.uid.packed_size()
            + self.gid.packed_size()
            + self.gids.packed_size()
    }

    fn pack(&self, out: &mut impl Write) -> Result<usize> {
        let mut len = 0;
        len += self.stamp.pack(out)?;
        len += self.machinename.pack(out)?;
        len += self.uid.pack(out)?;
        len += self.gid.pack(out)?;
        len += self.gids.pack(out)?;
        Ok(len)
    }
}

impl Unpack for auth_sys {
    fn unpack(input: &mut impl Read) -> Result<(Self, usize)> {
        let (stamp, mut sz) = u32::unpack(input)?;
        let (machinename, n) = Opaque::unpack_bounded(input, MAX_MACHINENAME_LEN)?;
        sz += n;
        let (uid, n) = u32::unpack(input)?;
        sz += n;
        let (gid, n) = u32::unpack(input)?;
        sz += n;
        let (gids, n) = Vec::<u32>::unpack(input)?;
        sz += n;
        if gids.len() > MAX_AUX_GIDS {
            return Err(Error::InvalidLength(gids.len()));
        }
        Ok((
            Self {
                stamp,
                machinename,
                uid,
                gid,
                gids,
            },
            sz,
        ))
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct call_body<'a> {
    pub rpcvers: u32,
    pub prog: u32,
    pub vers: u32,
    pub proc: u32,
    pub cred: opaque_auth<'a>,
    pub verf: opaque_auth<'a>,
}

impl Pack for call_body<'_> {
    fn packed_size(&self) -> usize {
        16 + self.cred.packed_size() + self.verf.packed_size()
    }

    fn pack(&self, out: &mut impl Write) -> Result<usize> {
        let mut len = 0;
        len += self.rpcvers.pack(out)?;
        len += self.prog.pack(out)?;
        len += self.vers.pack(out)?;
        len += self.proc.pack(out)?;
        len += self.cred.pack(out)?;
        len += self.verf.pack(out)?;
        Ok(len)
    }
}

impl Unpack for call_body<'static> {
    fn unpack(input: &mut impl Read) -> Result<(Self, usize)> {
        let (rpcvers, mut sz) = u32::unpack(input)?;
        let (prog, n) = u32::unpack(input)?;
        sz += n;
        let (vers, n) = u32::unpack(input)?;
        sz += n;
        let (proc, n) = u32::unpack(input)?;
        sz += n;
        let (cred, n) = opaque_auth::unpack(input)?;
        sz += n;
        let (verf, n) = opaque_auth::unpack(input)?;
        sz += n;
        Ok((
            Self {
                rpcvers,
                prog,
                vers,
                proc,
                cred,
                verf,
            },
            sz,
        ))
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct accepted_reply<'a> {
    pub verf: opaque_auth<'a>,
    pub reply_data: accept_stat_data,
}

impl Pack for accepted_reply<'_> {
    fn packed_size(&self) -> usize {
        self.verf.packed_size() + self.reply_data.packed_size()
    }

    fn pack(&self, out: &mut impl Write) -> Result<usize> {
        Ok(self.verf.pack(out)? + self.reply_data.pack(out)?)
    }
}

impl Unpack for accepted_reply<'static> {
    fn unpack(input: &mut impl Read) -> Result<(Self, usize)> {
        let (verf, mut sz) = opaque_auth::unpack(input)?;
        let (reply_data, n) = accept_stat_data::unpack(input)?;
        sz += n;
        Ok((Self { verf, reply_data }, sz))
    }
}

/// Accept status of an accepted reply. `SUCCESS` leaves the
/// procedure-specific results in the stream for the caller to decode.
#[derive(Debug, PartialEq, Eq)]
pub enum accept_stat_data {
    SUCCESS,
    PROG_UNAVAIL,
    PROG_MISMATCH { low: u32, high: u32 },
    PROC_UNAVAIL,
    GARBAGE_ARGS,
    SYSTEM_ERR,
}

impl Pack for accept_stat_data {
    fn packed_size(&self) -> usize {
        4 + match self {
            Self::PROG_MISMATCH { .. } => 8,
            _ => 0,
        }
    }

    fn pack(&self, out: &mut impl Write) -> Result<usize> {
        let len = match self {
            Self::SUCCESS => accept_stat::SUCCESS.pack(out)?,
            Self::PROG_UNAVAIL => accept_stat::PROG_UNAVAIL.pack(out)?,
            Self::PROG_MISMATCH { low, high } => {
                accept_stat::PROG_MISMATCH.pack(out)? + low.pack(out)? + high.pack(out)?
            }
            Self::PROC_UNAVAIL => accept_stat::PROC_UNAVAIL.pack(out)?,
            Self::GARBAGE_ARGS => accept_stat::GARBAGE_ARGS.pack(out)?,
            Self::SYSTEM_ERR => accept_stat::SYSTEM_ERR.pack(out)?,
        };
        Ok(len)
    }
}

impl Unpack for accept_stat_data {
    fn unpack(input: &mut impl Read) -> Result<(Self, usize)> {
        let (stat, len) = accept_stat::unpack(input)?;
        let (body, body_len) = match stat {
            accept_stat::SUCCESS => (Self::SUCCESS, 0),
            accept_stat::PROG_UNAVAIL => (Self::PROG_UNAVAIL, 0),
            accept_stat::PROG_MISMATCH => {
                let (low, low_len) = u32::unpack(input)?;
                let (high, high_len) = u32::unpack(input)?;
                (Self::PROG_MISMATCH { low, high }, low_len + high_len)
            }
            accept_stat::PROC_UNAVAIL => (Self::PROC_UNAVAIL, 0),
            accept_stat::GARBAGE_ARGS => (Self::GARBAGE_ARGS, 0),
            accept_stat::SYSTEM_ERR => (Self::SYSTEM_ERR, 0),
        };
        Ok((body, len + body_len))
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum rejected_reply {
    RPC_MISMATCH { low: u32, high: u32 },
    AUTH_ERROR(auth_stat),
}

impl Pack for rejected_reply {
    fn packed_size(&self) -> usize {
        4 + match self {
            Self::RPC_MISMATCH { .. } => 8,
            Self::AUTH_ERROR(_) => 4,
        }
    }

    fn pack(&self, out: &mut impl Write) -> Result<usize> {
        let len = match self {
            Self::RPC_MISMATCH { low, high } => {
                reject_stat::RPC_MISMATCH.pack(out)? + low.pack(out)? + high.pack(out)?
            }
            Self::AUTH_ERROR(stat) => reject_stat::AUTH_ERROR.pack(out)? + stat.pack(out)?,
        };
        Ok(len)
    }
}

impl Unpack for rejected_reply {
    fn unpack(input: &mut impl Read) -> Result<(Self, usize)> {
        let (stat, len) = reject_stat::unpack(input)?;
        let (body, body_len) = match stat {
            reject_stat::RPC_MISMATCH => {
                let (low, low_len) = u32::unpack(input)?;
                let (high, high_len) = u32::unpack(input)?;
                (Self::RPC_MISMATCH { low, high }, low_len + high_len)
            }
            reject_stat::AUTH_ERROR => {
                let (stat, stat_len) = auth_stat::unpack(input)?;
                (Self::AUTH_ERROR(stat), stat_len)
            }
        };
        Ok((body, len + body_len))
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum reply_body<'a> {
    MSG_ACCEPTED(accepted_reply<'a>),
    MSG_DENIED(rejected_reply),
}

impl Pack for reply_body<'_> {
    fn packed_size(&self) -> usize {
        4 + match self {
            Self::MSG_ACCEPTED(reply) => reply.packed_size(),
            Self::MSG_DENIED(reply) => reply.packed_size(),
        }
    }

    fn pack(&self, out: &mut impl Write) -> Result<usize> {
        let len = match self {
            Self::MSG_ACCEPTED(reply) => reply_stat::MSG_ACCEPTED.pack(out)? + reply.pack(out)?,
            Self::MSG_DENIED(reply) => reply_stat::MSG_DENIED.pack(out)? + reply.pack(out)?,
        };
        Ok(len)
    }
}

impl Unpack for reply_body<'static> {
    fn unpack(input: &mut impl Read) -> Result<(Self, usize)> {
        let (stat, len) = reply_stat::unpack(input)?;
        let (body, body_len) = match stat {
            reply_stat::MSG_ACCEPTED => {
                let (reply, n) = accepted_reply::unpack(input)?;
                (Self::MSG_ACCEPTED(reply), n)
            }
            reply_stat::MSG_DENIED => {
                let (reply, n) = rejected_reply::unpack(input)?;
                (Self::MSG_DENIED(reply), n)
            }
        };
        Ok((body, len + body_len))
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum msg_body<'a, 'b> {
    CALL(call_body<'a>),
    REPLY(reply_body<'b>),
}

impl Pack for msg_body<'_, '_> {
    fn packed_size(&self) -> usize {
        4 + match self {
            Self::CALL(body) => body.packed_size(),
            Self::REPLY(body) => body.packed_size(),
        }
    }

    fn pack(&self, out: &mut impl Write) -> Result<usize> {
        let len = match self {
            Self::CALL(body) => msg_type::CALL.pack(out)? + body.pack(out)?,
            Self::REPLY(body) => msg_type::REPLY.pack(out)? + body.pack(out)?,
        };
        Ok(len)
    }
}

impl Unpack for msg_body<'static, 'static> {
    fn unpack(input: &mut impl Read) -> Result<(Self, usize)> {
        let (tag, len) = msg_type::unpack(input)?;
        let (body, body_len) = match tag {
            msg_type::CALL => {
                let (body, n) = call_body::unpack(input)?;
                (Self::CALL(body), n)
            }
            msg_type::REPLY => {
                let (body, n) = reply_body::unpack(input)?;
                (Self::REPLY(body), n)
            }
        };
        Ok((body, len + body_len))
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct rpc_msg<'a, 'b> {
    pub xid: u32,
    pub body: msg_body<'a, 'b>,
}

impl Pack for rpc_msg<'_, '_> {
    fn packed_size(&self) -> usize {
        4 + self.body.packed_size()
    }

    fn pack(&self, out: &mut impl Write) -> Result<usize> {
        Ok(self.xid.pack(out)? + self.body.pack(out)?)
    }
}

impl Unpack for rpc_msg<'static, 'static> {
    fn unpack(input: &mut impl Read) -> Result<(Self, usize)> {
        let (xid, mut sz) = u32::unpack(input)?;
        let (body, n) = msg_body::unpack(input)?;
        sz += n;
        Ok((Self { xid, body }, sz))
    }
}
