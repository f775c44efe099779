//! RPC session behavior: correlation, queueing and reply-header policing.
#![allow(clippy::unwrap_used)]

use std::io::Cursor;

use nfsget_client::error::{Error, RpcError};
use nfsget_client::session::Session;
use nfsget_tests::{
    MockTransport, accept_error_frame, accepted_reply_frame, decode_call, denied_reply_frame,
    init_logging,
};
use nfsget_types::rpc::{accept_stat_data, auth_stat, opaque_auth, rejected_reply};
use nfsget_types::xdr_codec::{Unpack, Void};

fn session(transport: &MockTransport) -> Session<MockTransport, &'static str> {
    Session::new(
        transport.clone(),
        100_000,
        2,
        opaque_auth::default(),
        opaque_auth::default(),
    )
}

fn payload_u32(body: &mut Cursor<Vec<u8>>) -> u32 {
    let (value, _) = u32::unpack(body).unwrap();
    value
}

#[test]
fn replies_route_by_xid_in_any_order() {
    init_logging();
    let transport = MockTransport::new();
    transport.open_window();
    let mut session = session(&transport);

    session.call(0, &Void, "A").unwrap();
    session.call(0, &Void, "B").unwrap();
    let sent = transport.take_sent();
    assert_eq!(sent.len(), 2);
    let a = decode_call(&sent[0]);
    let b = decode_call(&sent[1]);
    assert_eq!(b.xid, a.xid.wrapping_add(1));

    // B's reply arrives first; each context comes back exactly once with its
    // own payload
    let mut frames = accepted_reply_frame(b.xid, &0xBBu32);
    frames.extend_from_slice(&accepted_reply_frame(a.xid, &0xAAu32));
    let mut delivered = session.deliver(&frames).unwrap();
    assert_eq!(delivered.len(), 2);

    let mut second = delivered.pop().unwrap();
    let mut first = delivered.pop().unwrap();
    assert_eq!(first.context, "B");
    assert_eq!(payload_u32(&mut first.body), 0xBB);
    assert_eq!(second.context, "A");
    assert_eq!(payload_u32(&mut second.body), 0xAA);
    assert!(!session.has_outstanding());
}

#[test]
fn calls_queue_fifo_while_the_window_is_closed() {
    init_logging();
    let transport = MockTransport::new();
    let mut session = session(&transport);

    session.call(1, &Void, "first").unwrap();
    session.call(2, &Void, "second").unwrap();
    assert_eq!(transport.sent_count(), 0);
    assert_eq!(session.queued_calls(), 2);
    assert!(session.has_outstanding());

    transport.open_window();
    session.window_open().unwrap();
    let sent = transport.take_sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(decode_call(&sent[0]).proc, 1);
    assert_eq!(decode_call(&sent[1]).proc, 2);
    assert_eq!(session.queued_calls(), 0);
}

#[test]
fn queue_drain_stops_when_the_window_closes_again() {
    init_logging();
    let transport = MockTransport::new();
    let mut session = session(&transport);

    session.call(1, &Void, "first").unwrap();
    session.call(2, &Void, "second").unwrap();

    transport.open_window();
    session.window_open().unwrap();
    assert_eq!(transport.sent_count(), 2);

    // reopening with nothing queued is a no-op
    session.window_open().unwrap();
    assert_eq!(transport.sent_count(), 2);
}

#[test]
fn spurious_replies_are_discarded() {
    init_logging();
    let transport = MockTransport::new();
    transport.open_window();
    let mut session = session(&transport);

    session.call(0, &Void, "call").unwrap();
    let xid = decode_call(&transport.take_sent()[0]).xid;

    let delivered = session
        .deliver(&accepted_reply_frame(xid.wrapping_add(7), &Void))
        .unwrap();
    assert!(delivered.is_empty());
    assert!(session.has_outstanding());

    // a matching reply still lands afterwards
    let delivered = session.deliver(&accepted_reply_frame(xid, &Void)).unwrap();
    assert_eq!(delivered.len(), 1);
    assert!(!session.has_outstanding());

    // the same xid a second time is spurious by then
    let delivered = session.deliver(&accepted_reply_frame(xid, &Void)).unwrap();
    assert!(delivered.is_empty());
}

#[test]
fn denied_reply_is_an_error() {
    init_logging();
    let transport = MockTransport::new();
    transport.open_window();
    let mut session = session(&transport);

    session.call(0, &Void, "call").unwrap();
    let xid = decode_call(&transport.take_sent()[0]).xid;

    let err = session
        .deliver(&denied_reply_frame(
            xid,
            rejected_reply::AUTH_ERROR(auth_stat::AUTH_TOOWEAK),
        ))
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Rpc(RpcError::Auth(auth_stat::AUTH_TOOWEAK))
    ));
}

#[test]
fn accept_errors_keep_their_code() {
    init_logging();
    let transport = MockTransport::new();
    transport.open_window();
    let mut session = session(&transport);

    session.call(0, &Void, "call").unwrap();
    let xid = decode_call(&transport.take_sent()[0]).xid;

    let err = session
        .deliver(&accept_error_frame(
            xid,
            accept_stat_data::PROG_MISMATCH { low: 2, high: 3 },
        ))
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Rpc(RpcError::ProgMismatch { low: 2, high: 3 })
    ));
}

#[test]
fn call_direction_is_rejected() {
    init_logging();
    let transport = MockTransport::new();
    transport.open_window();
    let mut session = session(&transport);
    session.call(0, &Void, "call").unwrap();

    // feed the session its own outgoing call frame
    let frame = transport.take_sent().remove(0);
    let err = session.deliver(&frame).unwrap_err();
    assert!(matches!(err, Error::Rpc(RpcError::UnexpectedCall)));
}

#[test]
fn replies_reassemble_across_fragments() {
    init_logging();
    let transport = MockTransport::new();
    transport.open_window();
    let mut session = session(&transport);

    session.call(0, &Void, "call").unwrap();
    let xid = decode_call(&transport.take_sent()[0]).xid;

    // split one reply record into two fragments and three deliveries
    let record = accepted_reply_frame(xid, &0x55AAu32);
    let payload = &record[4..];
    let (head, tail) = payload.split_at(8);
    let mut first = nfsget_types::rpc::fragment_header::new(8, false)
        .into_xdr_buf()
        .to_vec();
    first.extend_from_slice(head);
    let mut second = nfsget_types::rpc::fragment_header::new(
        u32::try_from(tail.len()).unwrap(),
        true,
    )
    .into_xdr_buf()
    .to_vec();
    second.extend_from_slice(tail);

    assert!(session.deliver(&first).unwrap().is_empty());
    let (mid, rest) = second.split_at(3);
    assert!(session.deliver(mid).unwrap().is_empty());
    let mut delivered = session.deliver(rest).unwrap();
    assert_eq!(delivered.len(), 1);
    assert_eq!(payload_u32(&mut delivered[0].body), 0x55AA);
}

#[test]
fn close_drops_pending_work() {
    init_logging();
    let transport = MockTransport::new();
    let mut session = session(&transport);

    session.call(0, &Void, "queued").unwrap();
    assert_eq!(session.queued_calls(), 1);
    assert!(session.has_outstanding());

    session.close(false);
    assert_eq!(session.queued_calls(), 0);
    assert!(!session.has_outstanding());
    assert_eq!(transport.closed(), Some(false));
}
