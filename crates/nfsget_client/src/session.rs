//! ONC RPC session: record framing, xid assignment and call/reply
//! correlation on one transport.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::io::Cursor;

use nfsget_types::rpc::{
    RPC_VERSION_2, call_body, fragment_header, msg_body, opaque_auth, reply_body, rpc_msg,
};
use nfsget_types::xdr_codec::{self, Pack, Unpack};
use tracing::{debug, warn};

use crate::error::{Error, RpcError};
use crate::xfer::{SendStatus, Transport};

/// Largest reassembled record the session accepts.
pub const MAX_RECORD_SIZE: usize = 1 << 20;

/// A correlated reply: the context registered with the originating call and
/// a cursor positioned after the reply header, on the procedure results.
#[derive(Debug)]
pub struct Delivered<C> {
    pub context: C,
    pub xid: u32,
    pub body: Cursor<Vec<u8>>,
}

/// One RPC conversation over one transport.
///
/// Calls are framed with record marking and either transmitted immediately or
/// queued FIFO while the send window is closed. Every call registers a
/// pending-reply entry under its xid; replies may arrive in any order and are
/// routed back by xid alone.
pub struct Session<T, C> {
    transport: T,
    prog: u32,
    vers: u32,
    credential: opaque_auth<'static>,
    verifier: opaque_auth<'static>,
    xid: u32,
    pending_calls: VecDeque<Vec<u8>>,
    pending_replies: HashMap<u32, C>,
    reassembly: RecordStream,
}

impl<T, C> fmt::Debug for Session<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("prog", &self.prog)
            .field("vers", &self.vers)
            .finish()
    }
}

impl<T, C> Session<T, C>
where
    T: Transport,
{
    /// Creates a session for one program. The xid starts at a random value
    /// and increments per call.
    pub fn new(
        transport: T,
        prog: u32,
        vers: u32,
        credential: opaque_auth<'static>,
        verifier: opaque_auth<'static>,
    ) -> Self {
        Self {
            transport,
            prog,
            vers,
            credential,
            verifier,
            xid: rand::random(),
            pending_calls: VecDeque::new(),
            pending_replies: HashMap::new(),
            reassembly: RecordStream::default(),
        }
    }

    /// Issues one call: frames it as a single last-fragment record and
    /// registers `context` under the assigned xid. Returns once the frame is
    /// accepted for transmission or queued; the reply arrives later through
    /// [`deliver`](Self::deliver).
    pub fn call(&mut self, proc: u32, args: &impl Pack, context: C) -> Result<(), Error> {
        let xid = self.xid;
        self.xid = self.xid.wrapping_add(1);

        let msg = rpc_msg {
            xid,
            body: msg_body::CALL(call_body {
                rpcvers: RPC_VERSION_2,
                prog: self.prog,
                vers: self.vers,
                proc,
                cred: self.credential.borrow(),
                verf: self.verifier.borrow(),
            }),
        };

        // Reserve the record mark, backfill it once the payload size is known.
        let mut frame = vec![0u8; 4];
        msg.pack(&mut frame)?;
        args.pack(&mut frame)?;
        let payload = frame.len() - 4;
        let header = u32::try_from(payload)
            .ok()
            .filter(|len| *len <= fragment_header::MASK)
            .map(|len| fragment_header::new(len, true))
            .ok_or(Error::Xdr(xdr_codec::Error::ObjectTooLarge(payload)))?;
        frame[..4].copy_from_slice(&header.into_xdr_buf());

        debug!(xid, proc, prog = self.prog, "rpc call");
        if self.pending_calls.is_empty() {
            match self.transport.send(&frame)? {
                SendStatus::Sent => {}
                SendStatus::WouldBlock => self.pending_calls.push_back(frame),
            }
        } else {
            // keep FIFO order behind frames already waiting for the window
            self.pending_calls.push_back(frame);
        }
        self.pending_replies.insert(xid, context);
        Ok(())
    }

    /// Drains queued frames after the transport reported an open window,
    /// stopping when the queue empties or the window closes again.
    pub fn window_open(&mut self) -> Result<(), Error> {
        while let Some(frame) = self.pending_calls.front() {
            match self.transport.send(frame)? {
                SendStatus::Sent => {
                    self.pending_calls.pop_front();
                }
                SendStatus::WouldBlock => break,
            }
        }
        Ok(())
    }

    /// Feeds raw connection bytes in and returns every reply they complete.
    ///
    /// Records are reassembled from any number of fragments. Replies whose
    /// xid matches no outstanding call are discarded. A CALL-direction
    /// message, a denied reply or a non-SUCCESS accept state is an error; the
    /// originally reported codes are preserved.
    pub fn deliver(&mut self, bytes: &[u8]) -> Result<Vec<Delivered<C>>, Error> {
        self.reassembly.extend(bytes);
        let mut out = Vec::new();
        while let Some(record) = self.reassembly.next_record()? {
            if let Some(delivered) = self.dispatch(record)? {
                out.push(delivered);
            }
        }
        Ok(out)
    }

    fn dispatch(&mut self, record: Vec<u8>) -> Result<Option<Delivered<C>>, Error> {
        let mut body = Cursor::new(record);
        let (msg, _) = rpc_msg::unpack(&mut body)?;

        let reply = match msg.body {
            msg_body::CALL(_) => return Err(RpcError::UnexpectedCall.into()),
            msg_body::REPLY(reply) => reply,
        };

        let Some(context) = self.pending_replies.remove(&msg.xid) else {
            warn!(xid = msg.xid, "discarding reply with unknown xid");
            return Ok(None);
        };

        let accepted = match reply {
            reply_body::MSG_DENIED(rejected) => return Err(RpcError::from(rejected).into()),
            reply_body::MSG_ACCEPTED(accepted) => accepted,
        };
        if let Ok(rpc_err) = RpcError::try_from(accepted.reply_data) {
            return Err(rpc_err.into());
        }

        debug!(xid = msg.xid, "rpc reply");
        Ok(Some(Delivered {
            context,
            xid: msg.xid,
            body,
        }))
    }

    /// True while at least one call awaits its reply (transmitted or queued).
    pub fn has_outstanding(&self) -> bool {
        !self.pending_replies.is_empty()
    }

    pub fn queued_calls(&self) -> usize {
        self.pending_calls.len()
    }

    /// Drops every pending call and reply and shuts the transport down.
    pub fn close(&mut self, graceful: bool) {
        self.pending_calls.clear();
        self.pending_replies.clear();
        self.transport.close(graceful);
    }
}

/// Reassembles record-marked streams: each fragment is a 32-bit header (high
/// bit: last fragment, low 31 bits: length) followed by that many bytes.
#[derive(Default)]
struct RecordStream {
    raw: Vec<u8>,
    assembling: Vec<u8>,
}

impl RecordStream {
    fn extend(&mut self, bytes: &[u8]) {
        self.raw.extend_from_slice(bytes);
    }

    fn next_record(&mut self) -> Result<Option<Vec<u8>>, Error> {
        loop {
            if self.raw.len() < 4 {
                return Ok(None);
            }
            let header =
                fragment_header::from([self.raw[0], self.raw[1], self.raw[2], self.raw[3]]);
            let len = header.fragment_length() as usize;
            if self.assembling.len() + len > MAX_RECORD_SIZE {
                return Err(RpcError::RecordTooLarge(self.assembling.len() + len).into());
            }
            if self.raw.len() < 4 + len {
                return Ok(None);
            }
            self.assembling.extend_from_slice(&self.raw[4..4 + len]);
            self.raw.drain(..4 + len);
            if header.last() {
                return Ok(Some(std::mem::take(&mut self.assembling)));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(payload: &[u8], last: bool) -> Vec<u8> {
        let header = fragment_header::new(u32::try_from(payload.len()).unwrap(), last);
        let mut out = header.into_xdr_buf().to_vec();
        out.extend_from_slice(payload);
        out
    }

    #[test]
    fn single_fragment_record() {
        let mut stream = RecordStream::default();
        stream.extend(&frame(b"abcd", true));
        assert_eq!(stream.next_record().unwrap(), Some(b"abcd".to_vec()));
        assert_eq!(stream.next_record().unwrap(), None);
    }

    #[test]
    fn record_split_across_deliveries() {
        let bytes = frame(b"abcdefgh", true);
        let mut stream = RecordStream::default();
        stream.extend(&bytes[..6]);
        assert_eq!(stream.next_record().unwrap(), None);
        stream.extend(&bytes[6..]);
        assert_eq!(stream.next_record().unwrap(), Some(b"abcdefgh".to_vec()));
    }

    #[test]
    fn multi_fragment_record() {
        let mut stream = RecordStream::default();
        stream.extend(&frame(b"abcd", false));
        stream.extend(&frame(b"efgh", true));
        assert_eq!(stream.next_record().unwrap(), Some(b"abcdefgh".to_vec()));
    }

    #[test]
    fn two_records_in_one_delivery() {
        let mut bytes = frame(b"one!", true);
        bytes.extend_from_slice(&frame(b"two!", true));
        let mut stream = RecordStream::default();
        stream.extend(&bytes);
        assert_eq!(stream.next_record().unwrap(), Some(b"one!".to_vec()));
        assert_eq!(stream.next_record().unwrap(), Some(b"two!".to_vec()));
        assert_eq!(stream.next_record().unwrap(), None);
    }

    #[test]
    fn oversized_record_is_rejected() {
        let header = fragment_header::new(u32::try_from(MAX_RECORD_SIZE + 1).unwrap(), true);
        let mut stream = RecordStream::default();
        stream.extend(&header.into_xdr_buf());
        assert!(matches!(
            stream.next_record(),
            Err(Error::Rpc(RpcError::RecordTooLarge(_)))
        ));
    }
}
