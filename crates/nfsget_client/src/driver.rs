//! The fetch driver: a state machine over three RPC sessions.
//!
//! Given an `nfs://` URL, the driver resolves the MOUNT and NFS ports
//! through the portmapper, mounts the export, looks the file up and streams
//! it to the data sink in fixed-size READ chunks, then unmounts:
//!
//! GETPORT(mount) → MNT → GETPORT(nfs) → LOOKUP → READ… → UMNT
//!
//! The driver owns no clock and never blocks. All progress comes from events
//! its collaborator feeds in: a connection it previously requested is up
//! ([`connected`](NfsFetch::connected) + [`window_open`](NfsFetch::window_open)),
//! bytes arrived ([`deliver`](NfsFetch::deliver)), or a connection went away
//! ([`transport_closed`](NfsFetch::transport_closed)).

use std::io::Cursor;

use nfsget_types::nfs3::nfs_fh3;
use nfsget_types::rpc::{auth_sys, opaque_auth};
use nfsget_types::{mount as mount3, nfs3};
use tracing::debug;

use crate::error::Error;
use crate::session::{Delivered, Session};
use crate::url::NfsUrl;
use crate::xfer::{DataSink, Transport};
use crate::{mount, nfs, portmap};

/// Bytes requested per READ call. Small enough that each reply fits a
/// typical MTU after TCP/IP/RPC overhead.
pub const RSIZE: u32 = 1300;

const FALLBACK_MACHINE_NAME: &str = "client";

/// How the MOUNT and NFS connections choose their local source port.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LocalPortPolicy {
    /// Bind a pseudo-random port in 1..=1023. Linux `nfs-utils` exports
    /// reject unprivileged source ports unless marked `insecure`.
    Privileged,
    /// Let the stack pick an ephemeral port.
    Ephemeral,
}

#[derive(Clone, Debug)]
pub struct FetchConfig {
    /// Machine name placed in the AUTH_SYS credential. Falls back to
    /// `"client"`.
    pub machine_name: Option<String>,
    /// Bytes requested per READ. Must not exceed the server's advertised
    /// maximum; the default always fits.
    pub rsize: u32,
    pub local_port: LocalPortPolicy,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            machine_name: None,
            rsize: RSIZE,
            local_port: LocalPortPolicy::Privileged,
        }
    }
}

/// One of the driver's three connections.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Target {
    Portmap,
    Mount,
    Nfs,
}

/// A connection the driver wants its collaborator to establish.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectRequest {
    pub target: Target,
    pub port: u16,
    pub local_port: LocalPortPolicy,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FetchState {
    PortmapConnecting,
    GetportMount,
    MountConnecting,
    Mnt,
    GetportNfs,
    NfsConnecting,
    Lookup,
    Read,
    Umnt,
    Done,
    Failed,
}

/// What an outstanding call's reply will be dispatched as.
#[derive(Copy, Clone, Debug)]
enum Expected {
    GetportMount,
    GetportNfs,
    Mnt,
    Umnt,
    Lookup,
    Read,
}

pub struct NfsFetch<T: Transport, S: DataSink> {
    url: NfsUrl,
    credential: opaque_auth<'static>,
    verifier: opaque_auth<'static>,
    rsize: u32,
    local_port: LocalPortPolicy,
    state: FetchState,
    portmap: Option<Session<T, Expected>>,
    mount: Option<Session<T, Expected>>,
    nfs: Option<Session<T, Expected>>,
    current_fh: nfs_fh3,
    offset: u64,
    size_signalled: bool,
    pending_connect: Option<ConnectRequest>,
    /// Remote error waiting for the UMNT exchange before being reported.
    parked: Option<Error>,
    sink: Option<S>,
    outcome: Option<Result<(), Error>>,
}

impl<T: Transport, S: DataSink> NfsFetch<T, S> {
    /// Parses the URL, builds the AUTH_SYS credential and requests the
    /// portmapper connection.
    pub fn open(url: &str, config: FetchConfig, sink: S) -> Result<Self, Error> {
        let url = NfsUrl::parse(url)?;
        let machine_name = config
            .machine_name
            .as_deref()
            .unwrap_or(FALLBACK_MACHINE_NAME);
        let credential = opaque_auth::auth_sys(&auth_sys::new(machine_name, 0, 0, &[]));
        debug!(
            host = %url.host,
            export = %url.export,
            file = %url.filename,
            "starting nfs fetch"
        );
        Ok(Self {
            pending_connect: Some(ConnectRequest {
                target: Target::Portmap,
                port: url.port,
                local_port: LocalPortPolicy::Ephemeral,
            }),
            url,
            credential,
            verifier: opaque_auth::default(),
            rsize: config.rsize,
            local_port: config.local_port,
            state: FetchState::PortmapConnecting,
            portmap: None,
            mount: None,
            nfs: None,
            current_fh: nfs_fh3::default(),
            offset: 0,
            size_signalled: false,
            parked: None,
            sink: Some(sink),
            outcome: None,
        })
    }

    pub fn host(&self) -> &str {
        &self.url.host
    }

    pub fn state(&self) -> FetchState {
        self.state
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.state, FetchState::Done | FetchState::Failed)
    }

    /// The terminal outcome, once one exists.
    pub fn status(&self) -> Option<Result<(), &Error>> {
        self.outcome.as_ref().map(|res| res.as_ref().map(|_| ()))
    }

    /// Consumes the driver. A driver torn down before reaching a terminal
    /// state reports a reset.
    pub fn into_status(self) -> Result<(), Error> {
        self.outcome.unwrap_or(Err(Error::ConnectionReset))
    }

    /// The connection the collaborator should establish next, if any.
    pub fn take_connect_request(&mut self) -> Option<ConnectRequest> {
        self.pending_connect.take()
    }

    /// A previously requested connection is up; its window may still be
    /// closed until the first [`window_open`](Self::window_open).
    pub fn connected(&mut self, target: Target, transport: T) {
        if self.is_terminal() {
            return;
        }
        let credential = self.credential.clone();
        let verifier = self.verifier.clone();
        match target {
            Target::Portmap => {
                self.portmap = Some(portmap::new_session(transport, credential, verifier));
            }
            Target::Mount => {
                self.mount = Some(mount::new_session(transport, credential, verifier));
            }
            Target::Nfs => {
                self.nfs = Some(nfs::new_session(transport, credential, verifier));
            }
        }
    }

    pub fn connect_failed(&mut self, target: Target, err: std::io::Error) {
        if self.is_terminal() {
            return;
        }
        debug!(?target, %err, "connect failed");
        self.fail(Error::Io(err));
    }

    /// The transport's send window opened: drain queued frames, then issue
    /// whatever call the current state is waiting to make on this session.
    pub fn window_open(&mut self, target: Target) {
        if self.is_terminal() {
            return;
        }
        if let Err(err) = self.try_window_open(target) {
            self.fail(err);
        }
    }

    fn try_window_open(&mut self, target: Target) -> Result<(), Error> {
        if let Some(session) = self.session_mut(target) {
            session.window_open()?;
        }
        match (self.state, target) {
            (FetchState::PortmapConnecting, Target::Portmap) => {
                self.state = FetchState::GetportMount;
                debug!("GETPORT call (mount)");
                let session = self.portmap.as_mut().ok_or(Error::ConnectionReset)?;
                portmap::getport(
                    session,
                    Expected::GetportMount,
                    mount3::PROGRAM,
                    mount3::VERSION,
                )
            }
            (FetchState::MountConnecting, Target::Mount) => {
                self.state = FetchState::Mnt;
                debug!("MNT call");
                let export = &self.url.export;
                let session = self.mount.as_mut().ok_or(Error::ConnectionReset)?;
                mount::mnt(session, Expected::Mnt, export)
            }
            (FetchState::NfsConnecting, Target::Nfs) => {
                self.state = FetchState::Lookup;
                debug!("LOOKUP call");
                let name = &self.url.filename;
                let session = self.nfs.as_mut().ok_or(Error::ConnectionReset)?;
                nfs::lookup(session, Expected::Lookup, &self.current_fh, name)
            }
            _ => Ok(()),
        }
    }

    /// Bytes arrived on one of the connections.
    pub fn deliver(&mut self, target: Target, bytes: &[u8]) {
        if self.is_terminal() {
            return;
        }
        let delivered = {
            let Some(session) = self.session_mut(target) else {
                return;
            };
            session.deliver(bytes)
        };
        match delivered {
            Err(err) => self.fail(err),
            Ok(replies) => {
                for reply in replies {
                    if self.is_terminal() {
                        break;
                    }
                    if let Err(err) = self.dispatch(reply) {
                        self.handle_error(err);
                    }
                }
            }
        }
    }

    /// A connection closed from the far side. Anything short of a finished
    /// fetch is a reset; connections the driver already shut are ignored.
    pub fn transport_closed(&mut self, target: Target) {
        if self.is_terminal() {
            return;
        }
        if self.session_mut(target).is_none() {
            return;
        }
        debug!(?target, "connection closed by peer");
        self.fail(Error::ConnectionReset);
    }

    /// Cancels the fetch: the downstream sink no longer wants data. No UMNT
    /// is attempted; the server garbage-collects the mount.
    pub fn cancel(&mut self) {
        if !self.is_terminal() {
            self.fail(Error::Cancelled);
        }
    }

    fn session_mut(&mut self, target: Target) -> Option<&mut Session<T, Expected>> {
        match target {
            Target::Portmap => self.portmap.as_mut(),
            Target::Mount => self.mount.as_mut(),
            Target::Nfs => self.nfs.as_mut(),
        }
    }

    fn dispatch(&mut self, reply: Delivered<Expected>) -> Result<(), Error> {
        let Delivered { context, mut body, .. } = reply;
        match context {
            Expected::GetportMount => self.on_getport_mount(&mut body),
            Expected::Mnt => self.on_mnt(&mut body),
            Expected::GetportNfs => self.on_getport_nfs(&mut body),
            Expected::Lookup => self.on_lookup(&mut body),
            Expected::Read => self.on_read(&mut body),
            Expected::Umnt => self.on_umnt(),
        }
    }

    fn on_getport_mount(&mut self, body: &mut Cursor<Vec<u8>>) -> Result<(), Error> {
        let port = portmap::getport_reply(body)?;
        debug!(port, "got GETPORT reply (mount)");
        self.pending_connect = Some(ConnectRequest {
            target: Target::Mount,
            port,
            local_port: self.local_port,
        });
        self.state = FetchState::MountConnecting;
        Ok(())
    }

    fn on_mnt(&mut self, body: &mut Cursor<Vec<u8>>) -> Result<(), Error> {
        let res = mount::mnt_reply(body)?;
        debug!(fh_len = res.fhandle.0.len(), "got MNT reply");
        self.current_fh = nfs_fh3 { data: res.fhandle.0 };
        self.state = FetchState::GetportNfs;
        debug!("GETPORT call (nfs)");
        let session = self.portmap.as_mut().ok_or(Error::ConnectionReset)?;
        portmap::getport(session, Expected::GetportNfs, nfs3::PROGRAM, nfs3::VERSION)
    }

    fn on_getport_nfs(&mut self, body: &mut Cursor<Vec<u8>>) -> Result<(), Error> {
        let port = portmap::getport_reply(body)?;
        debug!(port, "got GETPORT reply (nfs)");
        // the portmapper has answered everything it will be asked
        if let Some(mut session) = self.portmap.take() {
            session.close(true);
        }
        self.pending_connect = Some(ConnectRequest {
            target: Target::Nfs,
            port,
            local_port: self.local_port,
        });
        self.state = FetchState::NfsConnecting;
        Ok(())
    }

    fn on_lookup(&mut self, body: &mut Cursor<Vec<u8>>) -> Result<(), Error> {
        let fh = nfs::lookup_reply(body)?;
        debug!("got LOOKUP reply");
        self.current_fh = fh;
        self.state = FetchState::Read;
        self.issue_read()
    }

    fn on_read(&mut self, body: &mut Cursor<Vec<u8>>) -> Result<(), Error> {
        let reply = nfs::read_reply(body)?;
        debug!(count = reply.count, eof = reply.eof, "got READ reply");

        if !self.size_signalled {
            self.size_signalled = true;
            // Announce the file size before the first delivery, then return
            // to the start. Without attributes the length stays unknown.
            if let Some(size) = reply.size {
                let sink = self.sink.as_mut().ok_or(Error::Cancelled)?;
                sink.seek(size);
                sink.seek(0);
            }
        }

        self.offset += u64::from(reply.count);
        if !reply.data.is_empty() {
            let sink = self.sink.as_mut().ok_or(Error::Cancelled)?;
            sink.deliver(&reply.data).map_err(|_| Error::Cancelled)?;
        }

        if reply.eof {
            if let Some(mut session) = self.nfs.take() {
                session.close(true);
            }
            self.state = FetchState::Umnt;
            self.issue_umnt()
        } else {
            self.issue_read()
        }
    }

    fn on_umnt(&mut self) -> Result<(), Error> {
        debug!("got UMNT reply");
        if let Some(mut session) = self.mount.take() {
            session.close(true);
        }
        let outcome = match self.parked.take() {
            Some(err) => Err(err),
            None => Ok(()),
        };
        self.finish(outcome);
        Ok(())
    }

    fn issue_read(&mut self) -> Result<(), Error> {
        debug!(offset = self.offset, count = self.rsize, "READ call");
        let fh = &self.current_fh;
        let session = self.nfs.as_mut().ok_or(Error::ConnectionReset)?;
        nfs::read(session, Expected::Read, fh, self.offset, self.rsize)
    }

    fn issue_umnt(&mut self) -> Result<(), Error> {
        debug!("UMNT call");
        let export = &self.url.export;
        let session = self.mount.as_mut().ok_or(Error::ConnectionReset)?;
        mount::umnt(session, Expected::Umnt, export)
    }

    /// NFS errors after a successful MNT still unmount: the error is parked
    /// and reported once the UMNT exchange finishes. Everything else tears
    /// the fetch down immediately.
    fn handle_error(&mut self, err: Error) {
        match err {
            Error::Nfs(_)
                if self.mount.is_some()
                    && matches!(self.state, FetchState::Lookup | FetchState::Read) =>
            {
                debug!(%err, "unmounting after remote error");
                if let Some(mut session) = self.nfs.take() {
                    session.close(false);
                }
                self.parked = Some(err);
                self.state = FetchState::Umnt;
                if let Err(err) = self.issue_umnt() {
                    self.fail(err);
                }
            }
            err => self.fail(err),
        }
    }

    fn fail(&mut self, err: Error) {
        self.finish(Err(err));
    }

    fn finish(&mut self, outcome: Result<(), Error>) {
        if self.outcome.is_some() {
            return;
        }
        let graceful = outcome.is_ok();
        if let Some(mut session) = self.portmap.take() {
            session.close(graceful);
        }
        if let Some(mut session) = self.mount.take() {
            session.close(graceful);
        }
        if let Some(mut session) = self.nfs.take() {
            session.close(graceful);
        }
        self.pending_connect = None;
        if let Some(mut sink) = self.sink.take() {
            sink.close(outcome.as_ref().map(|_| ()));
        }
        match &outcome {
            Ok(()) => debug!(offset = self.offset, "fetch completed"),
            Err(err) => debug!(%err, "fetch failed"),
        }
        self.state = if outcome.is_ok() {
            FetchState::Done
        } else {
            FetchState::Failed
        };
        self.outcome = Some(outcome);
    }
}
