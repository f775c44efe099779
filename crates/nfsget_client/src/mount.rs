//! MOUNT3 (RFC 1813) surface: MNT and UMNT.

use std::io::Cursor;

use nfsget_types::mount::{MOUNT_PROGRAM, PROGRAM, VERSION, dirpath, mountres3, mountres3_ok};
use nfsget_types::rpc::opaque_auth;
use nfsget_types::xdr_codec::{self, Opaque, Unpack};

use crate::error::Error;
use crate::session::Session;
use crate::xfer::Transport;

/// Creates a session bound to the MOUNT3 program.
pub fn new_session<T: Transport, C>(
    transport: T,
    credential: opaque_auth<'static>,
    verifier: opaque_auth<'static>,
) -> Session<T, C> {
    Session::new(transport, PROGRAM, VERSION, credential, verifier)
}

/// Issues MNT for an export path.
pub fn mnt<T: Transport, C>(
    session: &mut Session<T, C>,
    context: C,
    export: &str,
) -> Result<(), Error> {
    let args = dirpath(Opaque::borrowed(export.as_bytes()));
    session.call(MOUNT_PROGRAM::MOUNTPROC3_MNT as u32, &args, context)
}

/// Decodes a MNT reply into the root file handle and the advertised
/// authentication flavors (parsed, otherwise ignored by this client).
pub fn mnt_reply(body: &mut Cursor<Vec<u8>>) -> Result<mountres3_ok<'static>, Error> {
    let (res, _) = mountres3::unpack(body)?;
    match res {
        mountres3::Ok(ok) if ok.fhandle.0.is_empty() => {
            Err(Error::Xdr(xdr_codec::Error::InvalidLength(0)))
        }
        mountres3::Ok(ok) => Ok(ok),
        mountres3::Err(status) => Err(Error::Mount(status)),
    }
}

/// Issues UMNT for an export path. The reply carries no body.
pub fn umnt<T: Transport, C>(
    session: &mut Session<T, C>,
    context: C,
    export: &str,
) -> Result<(), Error> {
    let args = dirpath(Opaque::borrowed(export.as_bytes()));
    session.call(MOUNT_PROGRAM::MOUNTPROC3_UMNT as u32, &args, context)
}
