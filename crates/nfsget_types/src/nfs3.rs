#![allow(
    non_camel_case_types,
    clippy::large_enum_variant,
    clippy::upper_case_acronyms
)]

//! This module contains the definitions of the NFSv3 protocol as defined in
//! RFC 1813, reduced to what a sequential read of a single file touches:
//! LOOKUP and READ plus the attribute structures their replies embed.

use std::io::{Read, Write};

use crate::xdr_codec::enums::xdr_enum;
use crate::xdr_codec::{Opaque, Pack, Result, Unpack};

pub const PROGRAM: u32 = 100_003;
pub const VERSION: u32 = 3;
pub const NFS3_FHSIZE: usize = 64;

pub type count3 = u32;
pub type fileid3 = u64;
pub type gid3 = u32;
pub type mode3 = u32;
pub type offset3 = u64;
pub type size3 = u64;
pub type uid3 = u32;

/// Result discriminated by an `nfsstat3` status word.
///
/// `Ok` carries the procedure's resok body; anything else carries the status
/// together with the procedure's resfail body.
#[derive(Debug, PartialEq, Eq)]
pub enum Nfs3Result<T, E> {
    Ok(T),
    Err((nfsstat3, E)),
}

impl<T: Pack, E: Pack> Pack for Nfs3Result<T, E> {
    fn packed_size(&self) -> usize {
        4 + match self {
            Self::Ok(v) => v.packed_size(),
            Self::Err((_, e)) => e.packed_size(),
        }
    }

    fn pack(&self, out: &mut impl Write) -> Result<usize> {
        let len = match self {
            Self::Ok(v) => nfsstat3::NFS3_OK.pack(out)? + v.pack(out)?,
            Self::Err((code, e)) => code.pack(out)? + e.pack(out)?,
        };
        Ok(len)
    }
}

impl<T: Unpack, E: Unpack> Unpack for Nfs3Result<T, E> {
    fn unpack(input: &mut impl Read) -> Result<(Self, usize)> {
        let (code, mut sz) = nfsstat3::unpack(input)?;
        match code {
            nfsstat3::NFS3_OK => {
                let (v, n) = T::unpack(input)?;
                sz += n;
                Ok((Self::Ok(v), sz))
            }
            _ => {
                let (e, n) = E::unpack(input)?;
                sz += n;
                Ok((Self::Err((code, e)), sz))
            }
        }
    }
}

/// Boolean-discriminated optional value (`TRUE` followed by a body, or
/// `FALSE`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Nfs3Option<T> {
    Some(T),
    None,
}

impl<T> Default for Nfs3Option<T> {
    fn default() -> Self {
        Self::None
    }
}

impl<T> Nfs3Option<T> {
    pub const fn as_ref(&self) -> Option<&T> {
        match self {
            Self::Some(v) => Option::Some(v),
            Self::None => Option::None,
        }
    }
}

impl<T: Pack> Pack for Nfs3Option<T> {
    fn packed_size(&self) -> usize {
        4 + match self {
            Self::Some(v) => v.packed_size(),
            Self::None => 0,
        }
    }

    fn pack(&self, out: &mut impl Write) -> Result<usize> {
        let len = match self {
            Self::Some(v) => true.pack(out)? + v.pack(out)?,
            Self::None => false.pack(out)?,
        };
        Ok(len)
    }
}

impl<T: Unpack> Unpack for Nfs3Option<T> {
    fn unpack(input: &mut impl Read) -> Result<(Self, usize)> {
        let (present, mut sz) = bool::unpack(input)?;
        if present {
            let (v, n) = T::unpack(input)?;
            sz += n;
            Ok((Self::Some(v), sz))
        } else {
            Ok((Self::None, sz))
        }
    }
}

pub type post_op_attr = Nfs3Option<fattr3>;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum nfsstat3 {
    NFS3_OK = 0,
    NFS3ERR_PERM = 1,
    NFS3ERR_NOENT = 2,
    NFS3ERR_IO = 5,
    NFS3ERR_NXIO = 6,
    NFS3ERR_ACCES = 13,
    NFS3ERR_EXIST = 17,
    NFS3ERR_XDEV = 18,
    NFS3ERR_NODEV = 19,
    NFS3ERR_NOTDIR = 20,
    NFS3ERR_ISDIR = 21,
    NFS3ERR_INVAL = 22,
    NFS3ERR_FBIG = 27,
    NFS3ERR_NOSPC = 28,
    NFS3ERR_ROFS = 30,
    NFS3ERR_MLINK = 31,
    NFS3ERR_NAMETOOLONG = 63,
    NFS3ERR_NOTEMPTY = 66,
    NFS3ERR_DQUOT = 69,
    NFS3ERR_STALE = 70,
    NFS3ERR_REMOTE = 71,
    NFS3ERR_BADHANDLE = 10001,
    NFS3ERR_NOT_SYNC = 10002,
    NFS3ERR_BAD_COOKIE = 10003,
    NFS3ERR_NOTSUPP = 10004,
    NFS3ERR_TOOSMALL = 10005,
    NFS3ERR_SERVERFAULT = 10006,
    NFS3ERR_BADTYPE = 10007,
    NFS3ERR_JUKEBOX = 10008,
}
xdr_enum!(nfsstat3 {
    NFS3_OK,
    NFS3ERR_PERM,
    NFS3ERR_NOENT,
    NFS3ERR_IO,
    NFS3ERR_NXIO,
    NFS3ERR_ACCES,
    NFS3ERR_EXIST,
    NFS3ERR_XDEV,
    NFS3ERR_NODEV,
    NFS3ERR_NOTDIR,
    NFS3ERR_ISDIR,
    NFS3ERR_INVAL,
    NFS3ERR_FBIG,
    NFS3ERR_NOSPC,
    NFS3ERR_ROFS,
    NFS3ERR_MLINK,
    NFS3ERR_NAMETOOLONG,
    NFS3ERR_NOTEMPTY,
    NFS3ERR_DQUOT,
    NFS3ERR_STALE,
    NFS3ERR_REMOTE,
    NFS3ERR_BADHANDLE,
    NFS3ERR_NOT_SYNC,
    NFS3ERR_BAD_COOKIE,
    NFS3ERR_NOTSUPP,
    NFS3ERR_TOOSMALL,
    NFS3ERR_SERVERFAULT,
    NFS3ERR_BADTYPE,
    NFS3ERR_JUKEBOX,
});

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum ftype3 {
    NF3REG = 1,
    NF3DIR = 2,
    NF3BLK = 3,
    NF3CHR = 4,
    NF3LNK = 5,
    NF3SOCK = 6,
    NF3FIFO = 7,
}
xdr_enum!(ftype3 {
    NF3REG,
    NF3DIR,
    NF3BLK,
    NF3CHR,
    NF3LNK,
    NF3SOCK,
    NF3FIFO,
});

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct specdata3 {
    pub specdata1: u32,
    pub specdata2: u32,
}

impl Pack for specdata3 {
    fn packed_size(&self) -> usize {
        8
    }

    fn pack(&self, out: &mut impl Write) -> Result<usize> {
        Ok(self.specdata1.pack(out)? + self.specdata2.pack(out)?)
    }
}

impl Unpack for specdata3 {
    fn unpack(input: &mut impl Read) -> Result<(Self, usize)> {
        let (specdata1, mut sz) = u32::unpack(input)?;
        let (specdata2, n) = u32::unpack(input)?;
        sz += n;
        Ok((
            Self {
                specdata1,
                specdata2,
            },
            sz,
        ))
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct nfstime3 {
    pub seconds: u32,
    pub nseconds: u32,
}

impl Pack for nfstime3 {
    fn packed_size(&self) -> usize {
        8
    }

    fn pack(&self, out: &mut impl Write) -> Result<usize> {
        Ok(self.seconds.pack(out)? + self.nseconds.pack(out)?)
    }
}

impl Unpack for nfstime3 {
    fn unpack(input: &mut impl Read) -> Result<(Self, usize)> {
        let (seconds, mut sz) = u32::unpack(input)?;
        let (nseconds, n) = u32::unpack(input)?;
        sz += n;
        Ok((Self { seconds, nseconds }, sz))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct fattr3 {
    pub type_: ftype3,
    pub mode: mode3,
    pub nlink: u32,
    pub uid: uid3,
    pub gid: gid3,
    pub size: size3,
    pub used: size3,
    pub rdev: specdata3,
    pub fsid: u64,
    pub fileid: fileid3,
    pub atime: nfstime3,
    pub mtime: nfstime3,
    pub ctime: nfstime3,
}

impl Pack for fattr3 {
    fn packed_size(&self) -> usize {
        self.type_.packed_size()
            + self.mode.packed_size()
            + self.nlink.packed_size()
            + self.uid.packed_size()
            + self.gid.packed_size()
            + self.size.packed_size()
            + self.used.packed_size()
            + self.rdev.packed_size()
            + self.fsid.packed_size()
            + self.fileid.packed_size()
            + self.atime.packed_size()
            + self.mtime.packed_size()
            + self.ctime.packed_size()
    }

    fn pack(&self, out: &mut impl Write) -> Result<usize> {
        let mut len = 0;
        len += self.type_.pack(out)?;
        len += self.mode.pack(out)?;
        len += self.nlink.pack(out)?;
        len += self.uid.pack(out)?;
        len += self.gid.pack(out)?;
        len += self.size.pack(out)?;
        len += self.used.pack(out)?;
        len += self.rdev.pack(out)?;
        len += self.fsid.pack(out)?;
        len += self.fileid.pack(out)?;
        len += self.atime.pack(out)?;
        len += self.mtime.pack(out)?;
        len += self.ctime.pack(out)?;
        Ok(len)
    }
}

impl Unpack for fattr3 {
    fn unpack(input: &mut impl Read) -> Result<(Self, usize)> {
        let (type_, mut sz) = ftype3::unpack(input)?;
        let (mode, n) = u32::unpack(input)?;
        sz += n;
        let (nlink, n) = u32::unpack(input)?;
        sz += n;
        let (uid, n) = u32::unpack(input)?;
        sz += n;
        let (gid, n) = u32::unpack(input)?;
        sz += n;
        let (size, n) = u64::unpack(input)?;
        sz += n;
        let (used, n) = u64::unpack(input)?;
        sz += n;
        let (rdev, n) = specdata3::unpack(input)?;
        sz += n;
        let (fsid, n) = u64::unpack(input)?;
        sz += n;
        let (fileid, n) = u64::unpack(input)?;
        sz += n;
        let (atime, n) = nfstime3::unpack(input)?;
        sz += n;
        let (mtime, n) = nfstime3::unpack(input)?;
        sz += n;
        let (ctime, n) = nfstime3::unpack(input)?;
        sz += n;
        Ok((
            Self {
                type_,
                mode,
                nlink,
                uid,
                gid,
                size,
                used,
                rdev,
                fsid,
                fileid,
                atime,
                mtime,
                ctime,
            },
            sz,
        ))
    }
}

/// An NFSv3 file handle: opaque to the client, at most 64 bytes, echoed back
/// to the server verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct nfs_fh3 {
    pub data: Opaque<'static>,
}

impl Default for nfs_fh3 {
    fn default() -> Self {
        Self {
            data: Opaque::borrowed(&[]),
        }
    }
}

impl Pack for nfs_fh3 {
    fn packed_size(&self) -> usize {
        self.data.packed_size()
    }

    fn pack(&self, out: &mut impl Write) -> Result<usize> {
        self.data.pack(out)
    }
}

impl Unpack for nfs_fh3 {
    fn unpack(input: &mut impl Read) -> Result<(Self, usize)> {
        let (data, sz) = Opaque::unpack_bounded(input, NFS3_FHSIZE)?;
        Ok((Self { data }, sz))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct filename3<'a>(pub Opaque<'a>);

impl Pack for filename3<'_> {
    fn packed_size(&self) -> usize {
        self.0.packed_size()
    }

    fn pack(&self, out: &mut impl Write) -> Result<usize> {
        self.0.pack(out)
    }
}

impl Unpack for filename3<'static> {
    fn unpack(input: &mut impl Read) -> Result<(Self, usize)> {
        let (name, sz) = Opaque::unpack(input)?;
        Ok((Self(name), sz))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct diropargs3<'a> {
    pub dir: nfs_fh3,
    pub name: filename3<'a>,
}

impl Pack for diropargs3<'_> {
    fn packed_size(&self) -> usize {
        self.dir.packed_size() + self.name.packed_size()
    }

    fn pack(&self, out: &mut impl Write) -> Result<usize> {
        Ok(self.dir.pack(out)? + self.name.pack(out)?)
    }
}

impl Unpack for diropargs3<'static> {
    fn unpack(input: &mut impl Read) -> Result<(Self, usize)> {
        let (dir, mut sz) = nfs_fh3::unpack(input)?;
        let (name, n) = filename3::unpack(input)?;
        sz += n;
        Ok((Self { dir, name }, sz))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LOOKUP3args<'a> {
    pub what: diropargs3<'a>,
}

impl Pack for LOOKUP3args<'_> {
    fn packed_size(&self) -> usize {
        self.what.packed_size()
    }

    fn pack(&self, out: &mut impl Write) -> Result<usize> {
        self.what.pack(out)
    }
}

impl Unpack for LOOKUP3args<'static> {
    fn unpack(input: &mut impl Read) -> Result<(Self, usize)> {
        let (what, sz) = diropargs3::unpack(input)?;
        Ok((Self { what }, sz))
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct LOOKUP3resfail {
    pub dir_attributes: post_op_attr,
}

impl Pack for LOOKUP3resfail {
    fn packed_size(&self) -> usize {
        self.dir_attributes.packed_size()
    }

    fn pack(&self, out: &mut impl Write) -> Result<usize> {
        self.dir_attributes.pack(out)
    }
}

impl Unpack for LOOKUP3resfail {
    fn unpack(input: &mut impl Read) -> Result<(Self, usize)> {
        let (dir_attributes, sz) = post_op_attr::unpack(input)?;
        Ok((Self { dir_attributes }, sz))
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct LOOKUP3resok {
    pub object: nfs_fh3,
    pub obj_attributes: post_op_attr,
    pub dir_attributes: post_op_attr,
}

impl Pack for LOOKUP3resok {
    fn packed_size(&self) -> usize {
        self.object.packed_size()
            + self.obj_attributes.packed_size()
            + self.dir_attributes.packed_size()
    }

    fn pack(&self, out: &mut impl Write) -> Result<usize> {
        let mut len = 0;
        len += self.object.pack(out)?;
        len += self.obj_attributes.pack(out)?;
        len += self.dir_attributes.pack(out)?;
        Ok(len)
    }
}

impl Unpack for LOOKUP3resok {
    fn unpack(input: &mut impl Read) -> Result<(Self, usize)> {
        let (object, mut sz) = nfs_fh3::unpack(input)?;
        let (obj_attributes, n) = post_op_attr::unpack(input)?;
        sz += n;
        let (dir_attributes, n) = post_op_attr::unpack(input)?;
        sz += n;
        Ok((
            Self {
                object,
                obj_attributes,
                dir_attributes,
            },
            sz,
        ))
    }
}

pub type LOOKUP3res = Nfs3Result<LOOKUP3resok, LOOKUP3resfail>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct READ3args {
    pub file: nfs_fh3,
    pub offset: offset3,
    pub count: count3,
}

impl Pack for READ3args {
    fn packed_size(&self) -> usize {
        self.file.packed_size() + self.offset.packed_size() + self.count.packed_size()
    }

    fn pack(&self, out: &mut impl Write) -> Result<usize> {
        let mut len = 0;
        len += self.file.pack(out)?;
        len += self.offset.pack(out)?;
        len += self.count.pack(out)?;
        Ok(len)
    }
}

impl Unpack for READ3args {
    fn unpack(input: &mut impl Read) -> Result<(Self, usize)> {
        let (file, mut sz) = nfs_fh3::unpack(input)?;
        let (offset, n) = u64::unpack(input)?;
        sz += n;
        let (count, n) = u32::unpack(input)?;
        sz += n;
        Ok((
            Self {
                file,
                offset,
                count,
            },
            sz,
        ))
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct READ3resfail {
    pub file_attributes: post_op_attr,
}

impl Pack for READ3resfail {
    fn packed_size(&self) -> usize {
        self.file_attributes.packed_size()
    }

    fn pack(&self, out: &mut impl Write) -> Result<usize> {
        self.file_attributes.pack(out)
    }
}

impl Unpack for READ3resfail {
    fn unpack(input: &mut impl Read) -> Result<(Self, usize)> {
        let (file_attributes, sz) = post_op_attr::unpack(input)?;
        Ok((Self { file_attributes }, sz))
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct READ3resok<'a> {
    pub file_attributes: post_op_attr,
    pub count: count3,
    pub eof: bool,
    pub data: Opaque<'a>,
}

impl Pack for READ3resok<'_> {
    fn packed_size(&self) -> usize {
        self.file_attributes.packed_size()
            + self.count.packed_size()
            + self.eof.packed_size()
            + self.data.packed_size()
    }

    fn pack(&self, out: &mut impl Write) -> Result<usize> {
        let mut len = 0;
        len += self.file_attributes.pack(out)?;
        len += self.count.pack(out)?;
        len += self.eof.pack(out)?;
        len += self.data.pack(out)?;
        Ok(len)
    }
}

impl Unpack for READ3resok<'static> {
    fn unpack(input: &mut impl Read) -> Result<(Self, usize)> {
        let (file_attributes, mut sz) = post_op_attr::unpack(input)?;
        let (count, n) = u32::unpack(input)?;
        sz += n;
        let (eof, n) = bool::unpack(input)?;
        sz += n;
        let (data, n) = Opaque::unpack(input)?;
        sz += n;
        Ok((
            Self {
                file_attributes,
                count,
                eof,
                data,
            },
            sz,
        ))
    }
}

pub type READ3res<'a> = Nfs3Result<READ3resok<'a>, READ3resfail>;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum NFS_PROGRAM {
    NFSPROC3_NULL = 0,
    NFSPROC3_GETATTR = 1,
    NFSPROC3_SETATTR = 2,
    NFSPROC3_LOOKUP = 3,
    NFSPROC3_ACCESS = 4,
    NFSPROC3_READLINK = 5,
    NFSPROC3_READ = 6,
    NFSPROC3_WRITE = 7,
    NFSPROC3_CREATE = 8,
    NFSPROC3_MKDIR = 9,
    NFSPROC3_SYMLINK = 10,
    NFSPROC3_MKNOD = 11,
    NFSPROC3_REMOVE = 12,
    NFSPROC3_RMDIR = 13,
    NFSPROC3_RENAME = 14,
    NFSPROC3_LINK = 15,
    NFSPROC3_READDIR = 16,
    NFSPROC3_READDIRPLUS = 17,
    NFSPROC3_FSSTAT = 18,
    NFSPROC3_FSINFO = 19,
    NFSPROC3_PATHCONF = 20,
    NFSPROC3_COMMIT = 21,
}
xdr_enum!(NFS_PROGRAM {
    NFSPROC3_NULL,
    NFSPROC3_GETATTR,
    NFSPROC3_SETATTR,
    NFSPROC3_LOOKUP,
    NFSPROC3_ACCESS,
    NFSPROC3_READLINK,
    NFSPROC3_READ,
    NFSPROC3_WRITE,
    NFSPROC3_CREATE,
    NFSPROC3_MKDIR,
    NFSPROC3_SYMLINK,
    NFSPROC3_MKNOD,
    NFSPROC3_REMOVE,
    NFSPROC3_RMDIR,
    NFSPROC3_RENAME,
    NFSPROC3_LINK,
    NFSPROC3_READDIR,
    NFSPROC3_READDIRPLUS,
    NFSPROC3_FSSTAT,
    NFSPROC3_FSINFO,
    NFSPROC3_PATHCONF,
    NFSPROC3_COMMIT,
});
