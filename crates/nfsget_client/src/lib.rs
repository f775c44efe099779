//! A read-only NFSv3 client that fetches one file over the network.
//!
//! The core is an event-driven state machine ([`driver::NfsFetch`]) that
//! orchestrates three ONC RPC conversations (portmapper, MOUNT3, NFSv3)
//! over separate TCP connections:
//!
//! GETPORT(mount) → MNT → GETPORT(nfs) → LOOKUP → READ… → UMNT
//!
//! It never blocks and owns no clock; its collaborator feeds it connection,
//! byte and close events, and it streams file contents to a
//! [`xfer::DataSink`]. [`run::fetch`] is the bundled event loop that drives
//! the core over real sockets through a [`net::Connector`] (tokio or smol).

pub mod driver;
pub mod error;
pub mod io;
pub mod mount;
pub mod net;
pub mod nfs;
pub mod portmap;
pub mod run;
pub mod session;
#[cfg(feature = "smol")]
pub mod smol;
#[cfg(feature = "tokio")]
pub mod tokio;
pub mod url;
pub mod xfer;

pub use nfsget_types as types;

pub use driver::{ConnectRequest, FetchConfig, FetchState, LocalPortPolicy, NfsFetch, RSIZE, Target};
pub use error::Error;
pub use run::fetch;
pub use url::NfsUrl;
