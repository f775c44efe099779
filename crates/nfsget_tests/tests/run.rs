//! End-to-end runs of the bundled event loop against scripted RPC servers
//! over in-memory duplex streams.
#![allow(clippy::unwrap_used)]

use nfsget_client::driver::{FetchConfig, LocalPortPolicy};
use nfsget_client::error::{Error, PortmapError};
use nfsget_tests::{
    CloseStatus, DuplexConnector, RecordingSink, SinkEvent, accepted_reply_frame, init_logging,
    lookup_ok, mnt_ok, read_ok, serve_rpc, unpack_args,
};
use nfsget_types::portmap::mapping;
use nfsget_types::nfs3::READ3args;
use nfsget_types::xdr_codec::Void;

const MOUNT_PORT: u16 = 635;
const NFS_PORT: u16 = 2049;

fn test_config() -> FetchConfig {
    FetchConfig {
        // no privileged bind against in-memory streams
        local_port: LocalPortPolicy::Ephemeral,
        ..FetchConfig::default()
    }
}

#[tokio::test]
async fn fetch_streams_a_file_end_to_end() -> anyhow::Result<()> {
    init_logging();
    let content: Vec<u8> = (0..3000u32).map(|i| (i % 251) as u8).collect();

    let connector = DuplexConnector::new();
    let (pm_client, pm_server) = tokio::io::duplex(64 * 1024);
    let (mount_client, mount_server) = tokio::io::duplex(64 * 1024);
    let (nfs_client, nfs_server) = tokio::io::duplex(64 * 1024);
    connector.register(111, pm_client);
    connector.register(MOUNT_PORT, mount_client);
    connector.register(NFS_PORT, nfs_client);

    let pm_task = tokio::spawn(serve_rpc(pm_server, |call| {
        assert_eq!(call.prog, 100_000);
        assert_eq!(call.proc, 3);
        let args: mapping = unpack_args(call);
        let port = if args.prog == 100_005 {
            u32::from(MOUNT_PORT)
        } else {
            u32::from(NFS_PORT)
        };
        Some(accepted_reply_frame(call.xid, &port))
    }));

    let mount_task = tokio::spawn(serve_rpc(mount_server, |call| {
        assert_eq!(call.prog, 100_005);
        match call.proc {
            // MNT
            1 => Some(accepted_reply_frame(call.xid, &mnt_ok(&[7; 16]))),
            // UMNT
            3 => Some(accepted_reply_frame(call.xid, &Void)),
            _ => None,
        }
    }));

    let served = content.clone();
    let nfs_task = tokio::spawn(serve_rpc(nfs_server, move |call| {
        assert_eq!(call.prog, 100_003);
        match call.proc {
            // LOOKUP
            3 => Some(accepted_reply_frame(call.xid, &lookup_ok(&[8; 16]))),
            // READ
            6 => {
                let args: READ3args = unpack_args(call);
                let start = usize::try_from(args.offset).unwrap();
                let end = (start + args.count as usize).min(served.len());
                let eof = end == served.len();
                Some(accepted_reply_frame(
                    call.xid,
                    &read_ok(
                        Some(served.len() as u64),
                        u32::try_from(end - start).unwrap(),
                        eof,
                        &served[start..end],
                    ),
                ))
            }
            _ => None,
        }
    }));

    let (sink, log) = RecordingSink::new();
    nfsget_client::fetch(
        &connector,
        "nfs://testserver/srv/export/image.bin",
        test_config(),
        sink,
    )
    .await?;

    let events = log.borrow().clone();
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

    pm_task.await??;
    mount_task.await??;
    nfs_task.await??;
    Ok(())
}

#[tokio::test]
async fn fetch_reports_unregistered_program() -> anyhow::Result<()> {
    init_logging();

    let connector = DuplexConnector::new();
    let (pm_client, pm_server) = tokio::io::duplex(64 * 1024);
    connector.register(111, pm_client);

    let pm_task = tokio::spawn(serve_rpc(pm_server, |call| {
        Some(accepted_reply_frame(call.xid, &0u32))
    }));

    let (sink, log) = RecordingSink::new();
    let result = nfsget_client::fetch(
        &connector,
        "nfs://testserver/srv/export/image.bin",
        test_config(),
        sink,
    )
    .await;

    assert!(matches!(
        result,
        Err(Error::Portmap(PortmapError::ProgramUnavailable))
    ));
    assert_eq!(
        log.borrow().clone(),
        vec![SinkEvent::Close(CloseStatus::PortmapUnavailable)]
    );

    pm_task.await??;
    Ok(())
}

#[tokio::test]
async fn fetch_fails_when_connect_is_refused() -> anyhow::Result<()> {
    init_logging();

    // no streams registered at all
    let connector = DuplexConnector::new();
    let (sink, log) = RecordingSink::new();
    let result = nfsget_client::fetch(
        &connector,
        "nfs://testserver/srv/export/image.bin",
        test_config(),
        sink,
    )
    .await;

    assert!(matches!(result, Err(Error::Io(_))));
    assert!(matches!(
        log.borrow().last(),
        Some(SinkEvent::Close(CloseStatus::Other))
    ));
    Ok(())
}
