//! Drives an [`NfsFetch`] over real connections.
//!
//! A single-task event loop: connection requests are honoured as the driver
//! raises them, frames the sessions queued are flushed after every driver
//! event, and socket reads feed the driver until it reaches a terminal
//! state. Cooperative and single-threaded throughout.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::future::poll_fn;
use std::pin::pin;
use std::rc::Rc;
use std::task::Poll;

use crate::driver::{ConnectRequest, FetchConfig, LocalPortPolicy, NfsFetch, Target};
use crate::error::Error;
use crate::io::{AsyncRead, AsyncWrite};
use crate::net::Connector;
use crate::xfer::{DataSink, SendStatus, Transport};

const PRIVILEGED_PORT_ATTEMPTS: u32 = 8;
const READ_BUF_SIZE: usize = 16 * 1024;

#[derive(Default)]
struct Queue {
    frames: VecDeque<Vec<u8>>,
    closed: bool,
}

/// Bridge between a session's synchronous transport and the async socket
/// owned by the event loop: frames pile up here and the loop flushes them.
struct QueueTransport(Rc<RefCell<Queue>>);

impl Transport for QueueTransport {
    fn send(&mut self, frame: &[u8]) -> std::io::Result<SendStatus> {
        let mut queue = self.0.borrow_mut();
        if queue.closed {
            return Err(std::io::ErrorKind::BrokenPipe.into());
        }
        queue.frames.push_back(frame.to_vec());
        Ok(SendStatus::Sent)
    }

    fn close(&mut self, _graceful: bool) {
        self.0.borrow_mut().closed = true;
    }
}

struct Conn<S> {
    io: S,
    queue: Rc<RefCell<Queue>>,
    buf: Vec<u8>,
}

const TARGETS: [Target; 3] = [Target::Portmap, Target::Mount, Target::Nfs];

const fn slot_index(target: Target) -> usize {
    match target {
        Target::Portmap => 0,
        Target::Mount => 1,
        Target::Nfs => 2,
    }
}

/// Fetches the file named by `url` into `sink`, driving the whole
/// portmap/MOUNT/NFS exchange to completion.
pub async fn fetch<C, S>(
    connector: &C,
    url: &str,
    config: FetchConfig,
    sink: S,
) -> Result<(), Error>
where
    C: Connector,
    S: DataSink,
{
    let mut driver = NfsFetch::open(url, config, sink)?;
    let host = driver.host().to_owned();

    let mut slots: [Option<Conn<C::Connection>>; 3] = [None, None, None];

    loop {
        while let Some(request) = driver.take_connect_request() {
            match open_connection(connector, &host, &request).await {
                Ok(io) => {
                    let queue = Rc::new(RefCell::new(Queue::default()));
                    slots[slot_index(request.target)] = Some(Conn {
                        io,
                        queue: queue.clone(),
                        buf: vec![0u8; READ_BUF_SIZE],
                    });
                    driver.connected(request.target, QueueTransport(queue));
                    driver.window_open(request.target);
                }
                Err(err) => driver.connect_failed(request.target, err),
            }
        }

        for target in TARGETS {
            if flush(&mut slots[slot_index(target)]).await.is_err() {
                slots[slot_index(target)] = None;
                driver.transport_closed(target);
            }
        }

        if driver.is_terminal() {
            return driver.into_status();
        }

        let (target, result) = next_read(&mut slots).await;
        match result {
            Ok(0) | Err(_) => {
                slots[slot_index(target)] = None;
                driver.transport_closed(target);
            }
            Ok(n) => {
                if let Some(conn) = slots[slot_index(target)].as_ref() {
                    driver.deliver(target, &conn.buf[..n]);
                }
            }
        }
    }
}

async fn open_connection<C: Connector>(
    connector: &C,
    host: &str,
    request: &ConnectRequest,
) -> std::io::Result<C::Connection> {
    match request.local_port {
        LocalPortPolicy::Ephemeral => connector.connect(host, request.port).await,
        LocalPortPolicy::Privileged => {
            let mut last_err = None;
            for _ in 0..PRIVILEGED_PORT_ATTEMPTS {
                let local_port = rand::random_range(1..=1023);
                match connector
                    .connect_with_port(host, request.port, local_port)
                    .await
                {
                    Ok(conn) => return Ok(conn),
                    Err(err) if err.kind() == std::io::ErrorKind::AddrInUse => {
                        last_err = Some(err);
                    }
                    Err(err) => return Err(err),
                }
            }
            Err(last_err.unwrap_or_else(|| std::io::ErrorKind::AddrInUse.into()))
        }
    }
}

async fn flush<S: AsyncRead + AsyncWrite>(slot: &mut Option<Conn<S>>) -> std::io::Result<()> {
    let Some(conn) = slot.as_mut() else {
        return Ok(());
    };
    loop {
        let frame = conn.queue.borrow_mut().frames.pop_front();
        match frame {
            Some(frame) => conn.io.async_write_all(&frame).await?,
            None => break,
        }
    }
    if conn.queue.borrow().closed {
        // dropping the connection closes it
        *slot = None;
    }
    Ok(())
}

async fn next_read<S: AsyncRead>(
    slots: &mut [Option<Conn<S>>; 3],
) -> (Target, std::io::Result<usize>) {
    let [pm, mount, nfs] = slots;
    let mut pm_read = pin!(slot_read(pm));
    let mut mount_read = pin!(slot_read(mount));
    let mut nfs_read = pin!(slot_read(nfs));
    poll_fn(move |cx| {
        if let Poll::Ready(res) = pm_read.as_mut().poll(cx) {
            return Poll::Ready((Target::Portmap, res));
        }
        if let Poll::Ready(res) = mount_read.as_mut().poll(cx) {
            return Poll::Ready((Target::Mount, res));
        }
        if let Poll::Ready(res) = nfs_read.as_mut().poll(cx) {
            return Poll::Ready((Target::Nfs, res));
        }
        Poll::Pending
    })
    .await
}

async fn slot_read<S: AsyncRead>(slot: &mut Option<Conn<S>>) -> std::io::Result<usize> {
    match slot {
        Some(conn) => {
            let Conn { io, buf, .. } = conn;
            io.async_read(buf).await
        }
        None => std::future::pending().await,
    }
}
