//! NFSv3 (RFC 1813) surface: LOOKUP and READ.

use std::io::Cursor;

use nfsget_types::nfs3::{
    LOOKUP3args, LOOKUP3res, NFS_PROGRAM, Nfs3Result, PROGRAM, READ3args, READ3res, VERSION,
    diropargs3, filename3, nfs_fh3,
};
use nfsget_types::rpc::opaque_auth;
use nfsget_types::xdr_codec::{Opaque, Unpack};

use crate::error::Error;
use crate::session::Session;
use crate::xfer::Transport;

/// Creates a session bound to the NFSv3 program.
pub fn new_session<T: Transport, C>(
    transport: T,
    credential: opaque_auth<'static>,
    verifier: opaque_auth<'static>,
) -> Session<T, C> {
    Session::new(transport, PROGRAM, VERSION, credential, verifier)
}

/// Issues LOOKUP for `name` within the directory `dir`.
pub fn lookup<T: Transport, C>(
    session: &mut Session<T, C>,
    context: C,
    dir: &nfs_fh3,
    name: &str,
) -> Result<(), Error> {
    let args = LOOKUP3args {
        what: diropargs3 {
            dir: dir.clone(),
            name: filename3(Opaque::borrowed(name.as_bytes())),
        },
    };
    session.call(NFS_PROGRAM::NFSPROC3_LOOKUP as u32, &args, context)
}

/// Decodes a LOOKUP reply into the object's file handle. The attribute
/// bodies are parsed for their length and dropped.
pub fn lookup_reply(body: &mut Cursor<Vec<u8>>) -> Result<nfs_fh3, Error> {
    let (res, _) = LOOKUP3res::unpack(body)?;
    match res {
        Nfs3Result::Ok(ok) => Ok(ok.object),
        Nfs3Result::Err((status, _)) => Err(Error::Nfs(status)),
    }
}

/// Issues READ for `count` bytes at `offset`.
pub fn read<T: Transport, C>(
    session: &mut Session<T, C>,
    context: C,
    file: &nfs_fh3,
    offset: u64,
    count: u32,
) -> Result<(), Error> {
    let args = READ3args {
        file: file.clone(),
        offset,
        count,
    };
    session.call(NFS_PROGRAM::NFSPROC3_READ as u32, &args, context)
}

/// A decoded READ reply.
#[derive(Debug)]
pub struct ReadReply {
    /// File size from the post-op attributes, when the server sent them.
    pub size: Option<u64>,
    /// Bytes the server reports having read; the offset advances by this.
    pub count: u32,
    pub eof: bool,
    pub data: Vec<u8>,
}

/// Decodes a READ reply.
pub fn read_reply(body: &mut Cursor<Vec<u8>>) -> Result<ReadReply, Error> {
    let (res, _) = READ3res::unpack(body)?;
    match res {
        Nfs3Result::Ok(ok) => Ok(ReadReply {
            size: ok.file_attributes.as_ref().map(|attrs| attrs.size),
            count: ok.count,
            eof: ok.eof,
            data: ok.data.into_owned(),
        }),
        Nfs3Result::Err((status, _)) => Err(Error::Nfs(status)),
    }
}
