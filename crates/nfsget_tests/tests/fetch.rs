//! End-to-end driver scenarios with mock transports: the test plays the
//! collaborator, feeding connection events and fabricated server replies.
#![allow(clippy::unwrap_used)]

use nfsget_client::driver::{FetchConfig, FetchState, LocalPortPolicy, Target};
use nfsget_tests::{
    CloseStatus, Harness, RecordingSink, SinkEvent, accepted_reply_frame, lookup_err, lookup_ok,
    mnt_ok, read_err, read_ok, unpack_args,
};
use nfsget_types::mount::dirpath;
use nfsget_types::nfs3::{LOOKUP3args, READ3args, nfsstat3};
use nfsget_types::portmap::mapping;
use nfsget_types::xdr_codec::Void;

const ROOT_FH: [u8; 32] = [0x01; 32];
const FILE_FH: [u8; 32] = [0x02; 32];

/// Walks a harness through portmap resolution, MNT and the NFS connection,
/// leaving the LOOKUP call issued but unanswered.
fn establish(h: &mut Harness) {
    let request = h.connect(Target::Portmap);
    assert_eq!(request.local_port, LocalPortPolicy::Ephemeral);
    h.open_window(Target::Portmap);

    let mut call = h.take_call(Target::Portmap);
    assert_eq!((call.prog, call.vers, call.proc), (100_000, 2, 3));
    let args: mapping = unpack_args(&mut call);
    assert_eq!(args.prog, 100_005);
    assert_eq!(args.vers, 3);
    assert_eq!(args.prot, 6);
    assert_eq!(args.port, 0);
    h.reply(Target::Portmap, &accepted_reply_frame(call.xid, &635u32));

    let request = h.connect(Target::Mount);
    assert_eq!(request.port, 635);
    assert_eq!(request.local_port, LocalPortPolicy::Privileged);
    h.open_window(Target::Mount);

    let mut call = h.take_call(Target::Mount);
    assert_eq!((call.prog, call.vers, call.proc), (100_005, 3, 1));
    let path: dirpath = unpack_args(&mut call);
    assert_eq!(path.0.as_ref(), b"/srv/export");
    h.reply(Target::Mount, &accepted_reply_frame(call.xid, &mnt_ok(&ROOT_FH)));

    let mut call = h.take_call(Target::Portmap);
    assert_eq!(call.proc, 3);
    let args: mapping = unpack_args(&mut call);
    assert_eq!(args.prog, 100_003);
    h.reply(Target::Portmap, &accepted_reply_frame(call.xid, &2049u32));

    // the portmapper is done for and closed once both ports are known
    assert_eq!(h.transport(Target::Portmap).closed(), Some(true));

    let request = h.connect(Target::Nfs);
    assert_eq!(request.port, 2049);
    assert_eq!(request.local_port, LocalPortPolicy::Privileged);
    h.open_window(Target::Nfs);
}

fn take_lookup(h: &mut Harness) -> u32 {
    let mut call = h.take_call(Target::Nfs);
    assert_eq!((call.prog, call.vers, call.proc), (100_003, 3, 3));
    let args: LOOKUP3args = unpack_args(&mut call);
    assert_eq!(args.what.dir.data.as_ref(), &ROOT_FH);
    assert_eq!(args.what.name.0.as_ref(), b"hello.txt");
    call.xid
}

fn take_read(h: &mut Harness, expected_offset: u64) -> u32 {
    let mut call = h.take_call(Target::Nfs);
    assert_eq!(call.proc, 6);
    let args: READ3args = unpack_args(&mut call);
    assert_eq!(args.file.data.as_ref(), &FILE_FH);
    assert_eq!(args.offset, expected_offset);
    assert_eq!(args.count, 1300);
    call.xid
}

fn take_umnt(h: &mut Harness) -> u32 {
    let mut call = h.take_call(Target::Mount);
    assert_eq!(call.proc, 3);
    let path: dirpath = unpack_args(&mut call);
    assert_eq!(path.0.as_ref(), b"/srv/export");
    call.xid
}

#[test]
fn happy_path_tiny_file() {
    let mut h = Harness::open("nfs://10.0.0.1/srv/export/hello.txt");
    establish(&mut h);

    let xid = take_lookup(&mut h);
    h.reply(Target::Nfs, &accepted_reply_frame(xid, &lookup_ok(&FILE_FH)));

    let xid = take_read(&mut h, 0);
    h.reply(
        Target::Nfs,
        &accepted_reply_frame(xid, &read_ok(Some(5), 5, true, b"hello")),
    );

    // EOF closes the NFS session; UMNT goes out before DONE
    assert_eq!(h.transport(Target::Nfs).closed(), Some(true));
    assert!(!h.driver.is_terminal());
    let xid = take_umnt(&mut h);
    h.reply(Target::Mount, &accepted_reply_frame(xid, &Void));

    assert_eq!(h.driver.state(), FetchState::Done);
    assert_eq!(h.transport(Target::Mount).closed(), Some(true));
    assert_eq!(
        h.events(),
        vec![
            SinkEvent::Seek(5),
            SinkEvent::Seek(0),
            SinkEvent::Deliver(b"hello".to_vec()),
            SinkEvent::Close(CloseStatus::Ok),
        ]
    );
}

#[test]
fn multi_chunk_read() {
    let content: Vec<u8> = (0..3000u32).map(|i| (i % 251) as u8).collect();

    let mut h = Harness::open("nfs://10.0.0.1/srv/export/hello.txt");
    establish(&mut h);
    let xid = take_lookup(&mut h);
    h.reply(Target::Nfs, &accepted_reply_frame(xid, &lookup_ok(&FILE_FH)));

    let chunks = [
        (0u64, 1300u32, false),
        (1300, 1300, false),
        (2600, 400, true),
    ];
    for (offset, count, eof) in chunks {
        let xid = take_read(&mut h, offset);
        let chunk = &content[offset as usize..offset as usize + count as usize];
        h.reply(
            Target::Nfs,
            &accepted_reply_frame(xid, &read_ok(Some(3000), count, eof, chunk)),
        );
    }

    let xid = take_umnt(&mut h);
    h.reply(Target::Mount, &accepted_reply_frame(xid, &Void));
    assert_eq!(h.driver.state(), FetchState::Done);

    let events = h.events();
    assert_eq!(events[0], SinkEvent::Seek(3000));
    assert_eq!(events[1], SinkEvent::Seek(0));
    let delivered: Vec<u8> = events
        .iter()
        .filter_map(|event| match event {
            SinkEvent::Deliver(data) => Some(data.clone()),
            _ => None,
        })
        .flatten()
        .collect();
    assert_eq!(delivered, content);
    assert_eq!(events.last(), Some(&SinkEvent::Close(CloseStatus::Ok)));
}

#[test]
fn read_reply_without_attributes_skips_size_signal() {
    let mut h = Harness::open("nfs://10.0.0.1/srv/export/hello.txt");
    establish(&mut h);
    let xid = take_lookup(&mut h);
    h.reply(Target::Nfs, &accepted_reply_frame(xid, &lookup_ok(&FILE_FH)));

    let xid = take_read(&mut h, 0);
    h.reply(
        Target::Nfs,
        &accepted_reply_frame(xid, &read_ok(None, 5, true, b"hello")),
    );
    let xid = take_umnt(&mut h);
    h.reply(Target::Mount, &accepted_reply_frame(xid, &Void));

    assert_eq!(
        h.events(),
        vec![
            SinkEvent::Deliver(b"hello".to_vec()),
            SinkEvent::Close(CloseStatus::Ok),
        ]
    );
}

#[test]
fn lookup_failure_still_unmounts() {
    let mut h = Harness::open("nfs://10.0.0.1/srv/export/hello.txt");
    establish(&mut h);

    let xid = take_lookup(&mut h);
    h.reply(
        Target::Nfs,
        &accepted_reply_frame(xid, &lookup_err(nfsstat3::NFS3ERR_NOENT)),
    );

    // the NFS session is torn down but UMNT still goes out
    assert_eq!(h.transport(Target::Nfs).closed(), Some(false));
    assert!(!h.driver.is_terminal());
    let xid = take_umnt(&mut h);
    h.reply(Target::Mount, &accepted_reply_frame(xid, &Void));

    assert_eq!(h.driver.state(), FetchState::Failed);
    assert_eq!(
        h.events(),
        vec![SinkEvent::Close(CloseStatus::Nfs(nfsstat3::NFS3ERR_NOENT))]
    );
    assert!(h.transport(Target::Mount).closed().is_some());
}

#[test]
fn read_failure_still_unmounts() {
    let mut h = Harness::open("nfs://10.0.0.1/srv/export/hello.txt");
    establish(&mut h);
    let xid = take_lookup(&mut h);
    h.reply(Target::Nfs, &accepted_reply_frame(xid, &lookup_ok(&FILE_FH)));

    let xid = take_read(&mut h, 0);
    h.reply(
        Target::Nfs,
        &accepted_reply_frame(xid, &read_err(nfsstat3::NFS3ERR_IO)),
    );

    let xid = take_umnt(&mut h);
    h.reply(Target::Mount, &accepted_reply_frame(xid, &Void));

    assert_eq!(h.driver.state(), FetchState::Failed);
    assert_eq!(
        h.events(),
        vec![SinkEvent::Close(CloseStatus::Nfs(nfsstat3::NFS3ERR_IO))]
    );
}

#[test]
fn portmap_unregistered_mount_program() {
    let mut h = Harness::open("nfs://10.0.0.1/srv/export/hello.txt");
    h.connect_and_open(Target::Portmap);

    let call = h.take_call(Target::Portmap);
    h.reply(Target::Portmap, &accepted_reply_frame(call.xid, &0u32));

    assert_eq!(h.driver.state(), FetchState::Failed);
    // the mount and nfs connections are never requested
    assert!(h.driver.take_connect_request().is_none());
    assert_eq!(h.transport(Target::Portmap).closed(), Some(false));
    assert_eq!(
        h.events(),
        vec![SinkEvent::Close(CloseStatus::PortmapUnavailable)]
    );
}

#[test]
fn cancellation_during_streaming() {
    let content = vec![0xA7u8; 3000];
    let (sink, log) = RecordingSink::closing_after(2);
    let mut h = Harness::with_sink(
        "nfs://10.0.0.1/srv/export/hello.txt",
        FetchConfig::default(),
        sink,
        log,
    );
    establish(&mut h);
    let xid = take_lookup(&mut h);
    h.reply(Target::Nfs, &accepted_reply_frame(xid, &lookup_ok(&FILE_FH)));

    for (offset, count) in [(0u64, 1300u32), (1300, 1300)] {
        let xid = take_read(&mut h, offset);
        let chunk = &content[offset as usize..offset as usize + count as usize];
        h.reply(
            Target::Nfs,
            &accepted_reply_frame(xid, &read_ok(Some(3000), count, false, chunk)),
        );
    }

    // the third chunk hits the closed sink
    let xid = take_read(&mut h, 2600);
    h.reply(
        Target::Nfs,
        &accepted_reply_frame(xid, &read_ok(Some(3000), 400, true, &content[2600..])),
    );

    assert_eq!(h.driver.state(), FetchState::Failed);
    // no further READ, no UMNT; every session is shut down
    assert_eq!(h.transport(Target::Nfs).take_sent(), Vec::<Vec<u8>>::new());
    assert_eq!(h.transport(Target::Mount).take_sent(), Vec::<Vec<u8>>::new());
    assert_eq!(h.transport(Target::Nfs).closed(), Some(false));
    assert_eq!(h.transport(Target::Mount).closed(), Some(false));
    assert_eq!(
        h.events().last(),
        Some(&SinkEvent::Close(CloseStatus::Cancelled))
    );
}

#[test]
fn explicit_cancel_closes_everything() {
    let mut h = Harness::open("nfs://10.0.0.1/srv/export/hello.txt");
    establish(&mut h);
    let xid = take_lookup(&mut h);
    h.reply(Target::Nfs, &accepted_reply_frame(xid, &lookup_ok(&FILE_FH)));
    let _xid = take_read(&mut h, 0);

    h.driver.cancel();

    assert_eq!(h.driver.state(), FetchState::Failed);
    assert_eq!(h.transport(Target::Nfs).closed(), Some(false));
    assert_eq!(h.transport(Target::Mount).closed(), Some(false));
    assert_eq!(
        h.events(),
        vec![SinkEvent::Close(CloseStatus::Cancelled)]
    );
    assert_eq!(h.transport(Target::Mount).sent_count(), 0);
}

#[test]
fn terminal_state_is_idempotent() {
    let mut h = Harness::open("nfs://10.0.0.1/srv/export/hello.txt");
    establish(&mut h);
    let xid = take_lookup(&mut h);
    h.reply(Target::Nfs, &accepted_reply_frame(xid, &lookup_ok(&FILE_FH)));
    let xid = take_read(&mut h, 0);
    h.reply(
        Target::Nfs,
        &accepted_reply_frame(xid, &read_ok(Some(5), 5, true, b"hello")),
    );
    let xid = take_umnt(&mut h);
    let umnt_reply = accepted_reply_frame(xid, &Void);
    h.reply(Target::Mount, &umnt_reply);
    assert_eq!(h.driver.state(), FetchState::Done);

    // late events change nothing; close is reported exactly once
    h.driver.cancel();
    h.driver.cancel();
    h.reply(Target::Mount, &umnt_reply);
    h.driver.window_open(Target::Mount);
    assert_eq!(h.driver.state(), FetchState::Done);
    let closes = h
        .events()
        .into_iter()
        .filter(|event| matches!(event, SinkEvent::Close(_)))
        .count();
    assert_eq!(closes, 1);
    assert!(matches!(h.driver.status(), Some(Ok(()))));
}

#[test]
fn peer_close_mid_read_is_a_reset() {
    let mut h = Harness::open("nfs://10.0.0.1/srv/export/hello.txt");
    establish(&mut h);
    let xid = take_lookup(&mut h);
    h.reply(Target::Nfs, &accepted_reply_frame(xid, &lookup_ok(&FILE_FH)));
    let _xid = take_read(&mut h, 0);

    h.driver.transport_closed(Target::Nfs);

    assert_eq!(h.driver.state(), FetchState::Failed);
    assert_eq!(
        h.events(),
        vec![SinkEvent::Close(CloseStatus::ConnectionReset)]
    );
}

#[test]
fn umnt_waits_for_the_mount_window() {
    let mut h = Harness::open("nfs://10.0.0.1/srv/export/hello.txt");
    establish(&mut h);
    let xid = take_lookup(&mut h);
    h.reply(Target::Nfs, &accepted_reply_frame(xid, &lookup_ok(&FILE_FH)));

    // the mount window closes while the file streams
    h.transport(Target::Mount).close_window();

    let xid = take_read(&mut h, 0);
    h.reply(
        Target::Nfs,
        &accepted_reply_frame(xid, &read_ok(Some(5), 5, true, b"hello")),
    );

    // UMNT is queued, not sent, until the window reopens
    assert_eq!(h.transport(Target::Mount).sent_count(), 0);
    assert!(!h.driver.is_terminal());
    h.open_window(Target::Mount);
    let xid = take_umnt(&mut h);
    h.reply(Target::Mount, &accepted_reply_frame(xid, &Void));
    assert_eq!(h.driver.state(), FetchState::Done);
}

#[test]
fn rejects_bad_urls() {
    let (sink, _log) = RecordingSink::new();
    let result = nfsget_client::NfsFetch::<nfsget_tests::MockTransport, _>::open(
        "nfs://host",
        FetchConfig::default(),
        sink,
    );
    assert!(matches!(
        result,
        Err(nfsget_client::Error::Url(
            nfsget_client::error::UrlError::MissingPath
        ))
    ));
}
