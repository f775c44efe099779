//! Error types

use std::error::Error as StdError;
use std::fmt;

use nfsget_types::mount::mountstat3;
use nfsget_types::nfs3::nfsstat3;
use nfsget_types::rpc::{accept_stat_data, auth_stat, rejected_reply};

#[derive(Debug)]
pub enum Error {
    /// Transport-level failure.
    Io(std::io::Error),
    /// Malformed XDR in a reply.
    Xdr(nfsget_types::xdr_codec::Error),
    /// RPC-layer failure: denied call, bad accept state, unexpected message.
    Rpc(RpcError),
    Portmap(PortmapError),
    /// MOUNT3 status other than `MNT3_OK`.
    Mount(mountstat3),
    /// NFSv3 status other than `NFS3_OK`.
    Nfs(nfsstat3),
    Url(UrlError),
    /// The downstream sink went away before EOF.
    Cancelled,
    /// A connection closed before the fetch finished.
    ConnectionReset,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => e.fmt(f),
            Self::Xdr(e) => e.fmt(f),
            Self::Rpc(e) => e.fmt(f),
            Self::Portmap(e) => e.fmt(f),
            Self::Mount(e) => write!(f, "MOUNT error: {e:?}"),
            Self::Nfs(e) => write!(f, "NFS error: {e:?}"),
            Self::Url(e) => e.fmt(f),
            Self::Cancelled => write!(f, "cancelled by the data sink"),
            Self::ConnectionReset => write!(f, "connection reset"),
        }
    }
}

impl StdError for Error {}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<nfsget_types::xdr_codec::Error> for Error {
    fn from(e: nfsget_types::xdr_codec::Error) -> Self {
        Self::Xdr(e)
    }
}

impl From<RpcError> for Error {
    fn from(e: RpcError) -> Self {
        Self::Rpc(e)
    }
}

impl From<PortmapError> for Error {
    fn from(e: PortmapError) -> Self {
        Self::Portmap(e)
    }
}

impl From<UrlError> for Error {
    fn from(e: UrlError) -> Self {
        Self::Url(e)
    }
}

impl From<rejected_reply> for Error {
    fn from(e: rejected_reply) -> Self {
        Self::Rpc(e.into())
    }
}

#[derive(Debug)]
pub enum RpcError {
    /// The message direction was CALL where a reply was expected.
    UnexpectedCall,
    /// The server denied the call with an authentication error.
    Auth(auth_stat),
    /// The server denied the call over the RPC version.
    RpcMismatch { low: u32, high: u32 },
    ProgUnavail,
    ProgMismatch { low: u32, high: u32 },
    ProcUnavail,
    GarbageArgs,
    SystemErr,
    /// A reassembled record exceeded the session's size ceiling.
    RecordTooLarge(usize),
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedCall => write!(f, "unexpected CALL message"),
            Self::Auth(stat) => write!(f, "authentication rejected: {stat:?}"),
            Self::RpcMismatch { low, high } => {
                write!(f, "RPC version mismatch (server supports {low}..={high})")
            }
            Self::ProgUnavail => write!(f, "program unavailable"),
            Self::ProgMismatch { low, high } => {
                write!(f, "program version mismatch (server supports {low}..={high})")
            }
            Self::ProcUnavail => write!(f, "procedure unavailable"),
            Self::GarbageArgs => write!(f, "garbage arguments"),
            Self::SystemErr => write!(f, "system error"),
            Self::RecordTooLarge(len) => write!(f, "record too large: {len} bytes"),
        }
    }
}

impl StdError for RpcError {}

impl From<rejected_reply> for RpcError {
    fn from(e: rejected_reply) -> Self {
        match e {
            rejected_reply::RPC_MISMATCH { low, high } => Self::RpcMismatch { low, high },
            rejected_reply::AUTH_ERROR(stat) => Self::Auth(stat),
        }
    }
}

impl TryFrom<accept_stat_data> for RpcError {
    type Error = ();

    fn try_from(value: accept_stat_data) -> Result<Self, Self::Error> {
        match value {
            accept_stat_data::SUCCESS => Err(()),
            accept_stat_data::PROG_UNAVAIL => Ok(Self::ProgUnavail),
            accept_stat_data::PROG_MISMATCH { low, high } => Ok(Self::ProgMismatch { low, high }),
            accept_stat_data::PROC_UNAVAIL => Ok(Self::ProcUnavail),
            accept_stat_data::GARBAGE_ARGS => Ok(Self::GarbageArgs),
            accept_stat_data::SYSTEM_ERR => Ok(Self::SystemErr),
        }
    }
}

#[derive(Debug)]
pub enum PortmapError {
    /// GETPORT returned port 0: the program is not registered.
    ProgramUnavailable,
    InvalidPortValue(u32),
}

impl fmt::Display for PortmapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProgramUnavailable => write!(f, "program not registered with the portmapper"),
            Self::InvalidPortValue(value) => write!(f, "invalid port value: {value}"),
        }
    }
}

impl StdError for PortmapError {}

#[derive(Debug, PartialEq, Eq)]
pub enum UrlError {
    InvalidScheme,
    MissingHost,
    MissingPath,
    MissingFileName,
    InvalidPort,
}

impl fmt::Display for UrlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidScheme => write!(f, "URL scheme is not nfs://"),
            Self::MissingHost => write!(f, "URL has no host"),
            Self::MissingPath => write!(f, "URL has no path"),
            Self::MissingFileName => write!(f, "URL path names no file"),
            Self::InvalidPort => write!(f, "URL port is invalid"),
        }
    }
}

impl StdError for UrlError {}
