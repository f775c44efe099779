//! `nfs://` URL handling.

use nfsget_types::portmap::PMAP_PORT;

use crate::error::UrlError;

/// A parsed `nfs://HOST[:PORT]/EXPORT/PATH` URL.
///
/// The export is the directory portion of the path; the rest is the name of
/// the file to fetch. The port is the portmapper's, defaulting to 111.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NfsUrl {
    pub host: String,
    pub port: u16,
    pub export: String,
    pub filename: String,
}

impl NfsUrl {
    pub fn parse(url: &str) -> Result<Self, UrlError> {
        let rest = url.strip_prefix("nfs://").ok_or(UrlError::InvalidScheme)?;
        let (authority, path) = match rest.find('/') {
            Some(idx) => (&rest[..idx], &rest[idx..]),
            None => (rest, ""),
        };
        if authority.is_empty() {
            return Err(UrlError::MissingHost);
        }
        let (host, port) = split_authority(authority)?;

        if path.is_empty() || path == "/" {
            return Err(UrlError::MissingPath);
        }
        let split = path.rfind('/').unwrap_or(0);
        let (export, filename) = (&path[..split], &path[split + 1..]);
        if filename.is_empty() {
            return Err(UrlError::MissingFileName);
        }
        let export = if export.is_empty() { "/" } else { export };

        Ok(Self {
            host: host.to_owned(),
            port,
            export: export.to_owned(),
            filename: filename.to_owned(),
        })
    }
}

fn split_authority(authority: &str) -> Result<(&str, u16), UrlError> {
    if let Some(bracketed) = authority.strip_prefix('[') {
        let end = bracketed.find(']').ok_or(UrlError::MissingHost)?;
        let host = &bracketed[..end];
        if host.is_empty() {
            return Err(UrlError::MissingHost);
        }
        let after = &bracketed[end + 1..];
        let port = if after.is_empty() {
            PMAP_PORT
        } else if let Some(port) = after.strip_prefix(':') {
            parse_port(port)?
        } else {
            return Err(UrlError::InvalidPort);
        };
        Ok((host, port))
    } else if let Some((host, port)) = authority.rsplit_once(':') {
        if host.is_empty() {
            return Err(UrlError::MissingHost);
        }
        Ok((host, parse_port(port)?))
    } else {
        Ok((authority, PMAP_PORT))
    }
}

fn parse_port(port: &str) -> Result<u16, UrlError> {
    match port.parse::<u16>() {
        Ok(0) | Err(_) => Err(UrlError::InvalidPort),
        Ok(port) => Ok(port),
    }
}
