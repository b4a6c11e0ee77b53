use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;
use trust_dns_resolver::error::ResolveError;

/// Transport-level failures of a single probe.
///
/// HTTP status codes never end up here: a `503` is still a completed round
/// trip and is reported through [`super::result::ProbeResult`].
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("unsupported target url {url}: {reason}")]
    UnsupportedUrl { url: String, reason: &'static str },

    #[error("dns lookup for {host} failed")]
    Dns {
        host: String,
        #[source]
        source: ResolveError,
    },

    #[error("dns lookup for {0} returned no addresses")]
    NoAddresses(String),

    #[error("tcp connect to {addr} failed")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("tls handshake with {host} failed")]
    Tls {
        host: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to build request")]
    Request(#[from] hyper::http::Error),

    #[error("http exchange failed")]
    Http(#[from] hyper::Error),

    #[error("probe timed out after {0:?}")]
    Timeout(Duration),
}
