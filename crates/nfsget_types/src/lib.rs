//! Wire-level types for the `nfsget` client.
//!
//! This crate contains no I/O. It provides the XDR codec (RFC 4506) and the
//! message definitions for ONC RPC v2 (RFC 1057), the portmapper (RFC 1833),
//! and the MOUNT3/NFSv3 subset (RFC 1813) that a read-only file fetch needs.

pub mod mount;
pub mod nfs3;
pub mod portmap;
pub mod rpc;
pub mod xdr_codec;
