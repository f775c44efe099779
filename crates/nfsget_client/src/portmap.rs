//! Portmapper (RFC 1833) surface.
//!
//! No I/O of its own: calls are composed on a borrowed [`Session`] and typed
//! replies are decoded from delivered bodies.

use std::io::Cursor;

use nfsget_types::portmap::{IPPROTO_TCP, PMAP_PROG, PROGRAM, VERSION, mapping};
use nfsget_types::rpc::opaque_auth;
use nfsget_types::xdr_codec::Unpack;

use crate::error::{Error, PortmapError};
use crate::session::Session;
use crate::xfer::Transport;

/// Creates a session bound to the portmap program.
pub fn new_session<T: Transport, C>(
    transport: T,
    credential: opaque_auth<'static>,
    verifier: opaque_auth<'static>,
) -> Session<T, C> {
    Session::new(transport, PROGRAM, VERSION, credential, verifier)
}

/// Issues GETPORT for `(prog, vers)` over TCP.
pub fn getport<T: Transport, C>(
    session: &mut Session<T, C>,
    context: C,
    prog: u32,
    vers: u32,
) -> Result<(), Error> {
    let args = mapping {
        prog,
        vers,
        prot: IPPROTO_TCP,
        port: 0,
    };
    session.call(PMAP_PROG::PMAPPROC_GETPORT as u32, &args, context)
}

/// Decodes a GETPORT reply. Port 0 means the program is not registered.
pub fn getport_reply(body: &mut Cursor<Vec<u8>>) -> Result<u16, Error> {
    let (port, _) = u32::unpack(body)?;
    match u16::try_from(port) {
        Ok(0) => Err(PortmapError::ProgramUnavailable.into()),
        Ok(port) => Ok(port),
        Err(_) => Err(PortmapError::InvalidPortValue(port).into()),
    }
}
