//! Test support for the nfsget workspace: mock transports, a recording data
//! sink, call decoding, reply fabrication and a scripted RPC server for
//! end-to-end runs.
#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::Cursor;
use std::rc::Rc;

use nfsget_client::driver::{ConnectRequest, FetchConfig, NfsFetch, Target};
use nfsget_client::error::{Error, PortmapError};
use nfsget_client::net::Connector;
use nfsget_client::tokio::TokioIo;
use nfsget_client::xfer::{DataSink, SendStatus, SinkClosed, Transport};
use nfsget_types::mount::{fhandle3, mountres3, mountres3_ok, mountstat3};
use nfsget_types::nfs3::{
    LOOKUP3res, LOOKUP3resfail, LOOKUP3resok, Nfs3Option, Nfs3Result, READ3res, READ3resfail,
    READ3resok, fattr3, ftype3, nfs_fh3, nfsstat3, nfstime3, specdata3,
};
use nfsget_types::rpc::{
    RPC_VERSION_2, accept_stat_data, accepted_reply, fragment_header, msg_body, opaque_auth,
    rejected_reply, reply_body, rpc_msg,
};
use nfsget_types::xdr_codec::{Opaque, Pack, Unpack};
use tokio::io::DuplexStream;

static LOGGING: std::sync::Once = std::sync::Once::new();

pub fn init_logging() {
    LOGGING.call_once(|| {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(std::io::stderr)
            .init();
    });
}

/// What a mock transport has seen so far.
#[derive(Default)]
pub struct Wire {
    pub sent: Vec<Vec<u8>>,
    pub window: bool,
    pub closed: Option<bool>,
}

/// A [`Transport`] whose window the test opens and whose frames it inspects.
#[derive(Clone, Default)]
pub struct MockTransport(Rc<RefCell<Wire>>);

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open_window(&self) {
        self.0.borrow_mut().window = true;
    }

    pub fn close_window(&self) {
        self.0.borrow_mut().window = false;
    }

    pub fn take_sent(&self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.0.borrow_mut().sent)
    }

    pub fn sent_count(&self) -> usize {
        self.0.borrow().sent.len()
    }

    /// `Some(graceful)` once closed.
    pub fn closed(&self) -> Option<bool> {
        self.0.borrow().closed
    }
}

impl Transport for MockTransport {
    fn send(&mut self, frame: &[u8]) -> std::io::Result<SendStatus> {
        let mut wire = self.0.borrow_mut();
        if wire.closed.is_some() {
            return Err(std::io::ErrorKind::BrokenPipe.into());
        }
        if !wire.window {
            return Ok(SendStatus::WouldBlock);
        }
        wire.sent.push(frame.to_vec());
        Ok(SendStatus::Sent)
    }

    fn close(&mut self, graceful: bool) {
        self.0.borrow_mut().closed = Some(graceful);
    }
}

/// Everything the driver told the data sink, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
    Seek(u64),
    Deliver(Vec<u8>),
    Close(CloseStatus),
}

/// Condensed close status for assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseStatus {
    Ok,
    Cancelled,
    ConnectionReset,
    Nfs(nfsstat3),
    Mount(mountstat3),
    PortmapUnavailable,
    Rpc,
    Other,
}

pub fn close_status(status: Result<(), &Error>) -> CloseStatus {
    match status {
        Ok(()) => CloseStatus::Ok,
        Err(Error::Cancelled) => CloseStatus::Cancelled,
        Err(Error::ConnectionReset) => CloseStatus::ConnectionReset,
        Err(Error::Nfs(stat)) => CloseStatus::Nfs(*stat),
        Err(Error::Mount(stat)) => CloseStatus::Mount(*stat),
        Err(Error::Portmap(PortmapError::ProgramUnavailable)) => CloseStatus::PortmapUnavailable,
        Err(Error::Rpc(_)) => CloseStatus::Rpc,
        Err(_) => CloseStatus::Other,
    }
}

pub type SinkLog = Rc<RefCell<Vec<SinkEvent>>>;

/// A [`DataSink`] that records every interaction and can start refusing
/// deliveries after a set count, simulating a downstream close.
pub struct RecordingSink {
    log: SinkLog,
    deliver_limit: Option<usize>,
    delivered: usize,
}

impl RecordingSink {
    pub fn new() -> (Self, SinkLog) {
        let log = SinkLog::default();
        (
            Self {
                log: log.clone(),
                deliver_limit: None,
                delivered: 0,
            },
            log,
        )
    }

    /// Accepts `limit` deliveries, then reports itself closed.
    pub fn closing_after(limit: usize) -> (Self, SinkLog) {
        let (mut sink, log) = Self::new();
        sink.deliver_limit = Some(limit);
        (sink, log)
    }
}

impl DataSink for RecordingSink {
    fn seek(&mut self, offset: u64) {
        self.log.borrow_mut().push(SinkEvent::Seek(offset));
    }

    fn deliver(&mut self, data: &[u8]) -> Result<(), SinkClosed> {
        if self.deliver_limit.is_some_and(|limit| self.delivered >= limit) {
            return Err(SinkClosed);
        }
        self.delivered += 1;
        self.log.borrow_mut().push(SinkEvent::Deliver(data.to_vec()));
        Ok(())
    }

    fn close(&mut self, status: Result<(), &Error>) {
        self.log
            .borrow_mut()
            .push(SinkEvent::Close(close_status(status)));
    }
}

/// A call frame taken off a mock transport, decoded.
pub struct DecodedCall {
    pub xid: u32,
    pub prog: u32,
    pub vers: u32,
    pub proc: u32,
    pub args: Cursor<Vec<u8>>,
}

pub fn decode_call(frame: &[u8]) -> DecodedCall {
    let header = fragment_header::from([frame[0], frame[1], frame[2], frame[3]]);
    assert!(header.last(), "call is not a single last-fragment record");
    assert_eq!(header.fragment_length() as usize, frame.len() - 4);

    let mut args = Cursor::new(frame[4..].to_vec());
    let (msg, _) = rpc_msg::unpack(&mut args).expect("malformed call frame");
    let msg_body::CALL(call) = msg.body else {
        panic!("frame is not a call");
    };
    assert_eq!(call.rpcvers, RPC_VERSION_2);
    DecodedCall {
        xid: msg.xid,
        prog: call.prog,
        vers: call.vers,
        proc: call.proc,
        args,
    }
}

fn frame_record(payload: &[u8]) -> Vec<u8> {
    let header = fragment_header::new(u32::try_from(payload.len()).unwrap(), true);
    let mut out = header.into_xdr_buf().to_vec();
    out.extend_from_slice(payload);
    out
}

/// An accepted SUCCESS reply carrying `results`, framed.
pub fn accepted_reply_frame(xid: u32, results: &impl Pack) -> Vec<u8> {
    reply_frame(xid, accept_stat_data::SUCCESS, results)
}

/// An accepted reply with a non-SUCCESS accept state, framed.
pub fn accept_error_frame(xid: u32, reply_data: accept_stat_data) -> Vec<u8> {
    reply_frame(xid, reply_data, &nfsget_types::xdr_codec::Void)
}

fn reply_frame(xid: u32, reply_data: accept_stat_data, results: &impl Pack) -> Vec<u8> {
    let msg = rpc_msg {
        xid,
        body: msg_body::REPLY(reply_body::MSG_ACCEPTED(accepted_reply {
            verf: opaque_auth::default(),
            reply_data,
        })),
    };
    let mut payload = Vec::new();
    msg.pack(&mut payload).unwrap();
    results.pack(&mut payload).unwrap();
    frame_record(&payload)
}

/// A MSG_DENIED reply, framed.
pub fn denied_reply_frame(xid: u32, rejected: rejected_reply) -> Vec<u8> {
    let msg = rpc_msg {
        xid,
        body: msg_body::REPLY(reply_body::MSG_DENIED(rejected)),
    };
    let mut payload = Vec::new();
    msg.pack(&mut payload).unwrap();
    frame_record(&payload)
}

pub fn file_attrs(size: u64) -> fattr3 {
    fattr3 {
        type_: ftype3::NF3REG,
        mode: 0o644,
        nlink: 1,
        uid: 0,
        gid: 0,
        size,
        used: size,
        rdev: specdata3::default(),
        fsid: 1,
        fileid: 42,
        atime: nfstime3::default(),
        mtime: nfstime3::default(),
        ctime: nfstime3::default(),
    }
}

pub fn mnt_ok(fh: &[u8]) -> mountres3<'static> {
    mountres3::Ok(mountres3_ok {
        fhandle: fhandle3(Opaque::owned(fh.to_vec())),
        auth_flavors: vec![1],
    })
}

pub fn lookup_ok(fh: &[u8]) -> LOOKUP3res {
    Nfs3Result::Ok(LOOKUP3resok {
        object: nfs_fh3 {
            data: Opaque::owned(fh.to_vec()),
        },
        obj_attributes: Nfs3Option::None,
        dir_attributes: Nfs3Option::None,
    })
}

pub fn lookup_err(status: nfsstat3) -> LOOKUP3res {
    Nfs3Result::Err((status, LOOKUP3resfail::default()))
}

pub fn read_ok(size: Option<u64>, count: u32, eof: bool, data: &[u8]) -> READ3res<'static> {
    Nfs3Result::Ok(READ3resok {
        file_attributes: size.map_or(Nfs3Option::None, |size| Nfs3Option::Some(file_attrs(size))),
        count,
        eof,
        data: Opaque::owned(data.to_vec()),
    })
}

pub fn read_err(status: nfsstat3) -> READ3res<'static> {
    Nfs3Result::Err((status, READ3resfail::default()))
}

/// Drives an [`NfsFetch`] by hand: the test plays collaborator, honouring
/// connect requests with mock transports and feeding fabricated replies.
pub struct Harness {
    pub driver: NfsFetch<MockTransport, RecordingSink>,
    pub log: SinkLog,
    transports: [Option<MockTransport>; 3],
}

impl Harness {
    pub fn open(url: &str) -> Self {
        Self::with_config(url, FetchConfig::default())
    }

    pub fn with_config(url: &str, config: FetchConfig) -> Self {
        init_logging();
        let (sink, log) = RecordingSink::new();
        Self::with_sink(url, config, sink, log)
    }

    pub fn with_sink(url: &str, config: FetchConfig, sink: RecordingSink, log: SinkLog) -> Self {
        init_logging();
        let driver = NfsFetch::open(url, config, sink).expect("bad url");
        Self {
            driver,
            log,
            transports: [None, None, None],
        }
    }

    const fn index(target: Target) -> usize {
        match target {
            Target::Portmap => 0,
            Target::Mount => 1,
            Target::Nfs => 2,
        }
    }

    /// Honours the driver's outstanding connect request, asserting it is for
    /// `target`, and attaches a fresh mock transport (window still closed).
    pub fn connect(&mut self, target: Target) -> ConnectRequest {
        let request = self.driver.take_connect_request().expect("no connect request");
        assert_eq!(request.target, target);
        let transport = MockTransport::new();
        self.transports[Self::index(target)] = Some(transport.clone());
        self.driver.connected(target, transport);
        request
    }

    pub fn open_window(&mut self, target: Target) {
        self.transport(target).open_window();
        self.driver.window_open(target);
    }

    pub fn connect_and_open(&mut self, target: Target) -> ConnectRequest {
        let request = self.connect(target);
        self.open_window(target);
        request
    }

    pub fn transport(&self, target: Target) -> MockTransport {
        self.transports[Self::index(target)]
            .clone()
            .expect("target not connected")
    }

    /// Takes the single frame sent since the last call and decodes it.
    pub fn take_call(&mut self, target: Target) -> DecodedCall {
        let mut sent = self.transport(target).take_sent();
        assert_eq!(sent.len(), 1, "expected exactly one outgoing frame");
        decode_call(&sent.remove(0))
    }

    pub fn reply(&mut self, target: Target, frame: &[u8]) {
        self.driver.deliver(target, frame);
    }

    pub fn events(&self) -> Vec<SinkEvent> {
        self.log.borrow().clone()
    }
}

/// Hands out pre-registered in-memory streams by port, so [`run::fetch`]
/// (via any `Connector`) can run against scripted servers without sockets.
///
/// [`run::fetch`]: nfsget_client::run::fetch
#[derive(Default)]
pub struct DuplexConnector {
    streams: RefCell<HashMap<u16, DuplexStream>>,
}

impl DuplexConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, port: u16, stream: DuplexStream) {
        self.streams.borrow_mut().insert(port, stream);
    }
}

impl Connector for DuplexConnector {
    type Connection = TokioIo<DuplexStream>;

    async fn connect(&self, _host: &str, port: u16) -> std::io::Result<Self::Connection> {
        self.streams
            .borrow_mut()
            .remove(&port)
            .map(TokioIo::new)
            .ok_or_else(|| std::io::ErrorKind::ConnectionRefused.into())
    }
}

/// Serves scripted RPC over one stream: reads call records, lets `handler`
/// produce each reply frame, and returns cleanly when the peer closes.
pub async fn serve_rpc<F>(mut stream: DuplexStream, mut handler: F) -> anyhow::Result<()>
where
    F: FnMut(&mut DecodedCall) -> Option<Vec<u8>> + Send,
{
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    loop {
        let mut header = [0u8; 4];
        match stream.read_exact(&mut header).await {
            Ok(_) => {}
            Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(()),
            Err(err) => return Err(err.into()),
        }
        let fragment = fragment_header::from(header);
        let mut payload = vec![0u8; fragment.fragment_length() as usize];
        stream.read_exact(&mut payload).await?;

        let mut frame = header.to_vec();
        frame.extend_from_slice(&payload);
        let mut call = decode_call(&frame);
        match handler(&mut call) {
            Some(reply) => stream.write_all(&reply).await?,
            None => return Ok(()),
        }
    }
}

/// Unpacks a typed argument body from a decoded call.
pub fn unpack_args<T: Unpack>(call: &mut DecodedCall) -> T {
    let (args, _) = T::unpack(&mut call.args).expect("malformed call arguments");
    args
}
