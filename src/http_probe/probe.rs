use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use http_body_util::{BodyExt, Empty};
use hyper::body::{Bytes, Incoming};
use hyper::client::conn::http1;
use hyper::header::{CONNECTION, HOST, USER_AGENT};
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use rustls::ClientConfig;
use rustls::pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_rustls::TlsConnector;
use trust_dns_resolver::TokioAsyncResolver;
use trust_dns_resolver::config::{ResolverConfig, ResolverOpts};
use url::{Host, Position, Url};

use super::error::ProbeError;
use super::result::ProbeResult;
use super::stream::TimedStream;
use super::timer::PhaseTimer;

const PROBE_USER_AGENT: &str = concat!("webmon/", env!("CARGO_PKG_VERSION"));

/// Issues one cold-connection `GET` per call and measures it.
#[derive(Clone)]
pub struct Prober {
    tls: Arc<ClientConfig>,
    resolver_config: ResolverConfig,
    resolver_opts: ResolverOpts,
    timeout: Duration,
}

struct Exchange {
    status: u16,
    version: String,
    body_bytes: u64,
}

// Aborts the hyper connection task when the probe is done with it, whether
// the probe completed, failed or was dropped by the timeout.
struct ConnectionTask(JoinHandle<()>);

impl ConnectionTask {
    fn spawn<F>(connection: F) -> Self
    where
        F: Future<Output = Result<(), hyper::Error>> + Send + 'static,
    {
        ConnectionTask(tokio::spawn(async move {
            if let Err(e) = connection.await {
                log::debug!("Probe connection closed with error: {e}");
            }
        }))
    }
}

impl Drop for ConnectionTask {
    fn drop(&mut self) {
        self.0.abort();
    }
}

impl Prober {
    pub fn new(
        tls: Arc<ClientConfig>,
        resolver_config: ResolverConfig,
        resolver_opts: ResolverOpts,
        timeout: Duration,
    ) -> Self {
        Self {
            tls,
            resolver_config,
            resolver_opts,
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Probes `target` once. Only transport failures are errors; any HTTP
    /// status is a result. Nothing is retried.
    pub async fn probe(&self, target: &Url) -> Result<ProbeResult, ProbeError> {
        let timer = PhaseTimer::new();

        let exchange = match tokio::time::timeout(self.timeout, self.round_trip(target, &timer)).await {
            Ok(exchange) => exchange?,
            Err(_) => return Err(ProbeError::Timeout(self.timeout)),
        };
        let report = timer.finish();

        Ok(ProbeResult {
            url: target.to_string(),
            remote_address: report
                .remote_address
                .map(|addr| addr.to_string())
                .unwrap_or_default(),
            leaf_certificate: report.leaf_certificate,
            phases: report.phases,
            http_status: exchange.status,
            http_version: exchange.version,
            body_bytes: exchange.body_bytes,
        })
    }

    async fn round_trip(&self, target: &Url, timer: &PhaseTimer) -> Result<Exchange, ProbeError> {
        let use_tls = match target.scheme() {
            "https" => true,
            "http" => false,
            _ => return Err(unsupported(target, "scheme must be http or https")),
        };
        let host = target.host().ok_or_else(|| unsupported(target, "missing host"))?;
        let port = target
            .port_or_known_default()
            .ok_or_else(|| unsupported(target, "missing port"))?;

        let addrs = match &host {
            Host::Domain(domain) => self.resolve(domain, port, timer).await?,
            Host::Ipv4(ip) => vec![SocketAddr::new(IpAddr::V4(*ip), port)],
            Host::Ipv6(ip) => vec![SocketAddr::new(IpAddr::V6(*ip), port)],
        };

        timer.connect_start();
        let stream = connect(&addrs, timer).await?;

        if use_tls {
            let stream = self.tls_handshake(&host, stream, timer).await?;
            exchange(stream, target, timer).await
        } else {
            exchange(stream, target, timer).await
        }
    }

    async fn resolve(
        &self,
        domain: &str,
        port: u16,
        timer: &PhaseTimer,
    ) -> Result<Vec<SocketAddr>, ProbeError> {
        // A resolver per probe, so no answer is served from a previous probe's cache.
        let resolver = TokioAsyncResolver::tokio(self.resolver_config.clone(), self.resolver_opts.clone());

        timer.dns_start();
        let lookup = resolver.lookup_ip(domain).await.map_err(|source| ProbeError::Dns {
            host: domain.to_string(),
            source,
        })?;
        timer.dns_done();

        let addrs: Vec<SocketAddr> = lookup.iter().map(|ip| SocketAddr::new(ip, port)).collect();
        log::debug!("Resolved {domain} to {addrs:?}");
        if addrs.is_empty() {
            return Err(ProbeError::NoAddresses(domain.to_string()));
        }
        Ok(addrs)
    }

    async fn tls_handshake(
        &self,
        host: &Host<&str>,
        stream: TcpStream,
        timer: &PhaseTimer,
    ) -> Result<tokio_rustls::client::TlsStream<TcpStream>, ProbeError> {
        let server_name = match host {
            Host::Domain(domain) => ServerName::try_from(domain.to_string()).map_err(|e| ProbeError::Tls {
                host: domain.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::InvalidInput, e),
            })?,
            Host::Ipv4(ip) => ServerName::from(IpAddr::V4(*ip)),
            Host::Ipv6(ip) => ServerName::from(IpAddr::V6(*ip)),
        };

        let connector = TlsConnector::from(self.tls.clone());
        timer.tls_handshake_start();
        match connector.connect(server_name, stream).await {
            Ok(tls_stream) => {
                let (_, session) = tls_stream.get_ref();
                timer.tls_handshake_done(session.peer_certificates().and_then(|chain| chain.first()));
                Ok(tls_stream)
            }
            Err(source) => {
                timer.tls_handshake_done(None);
                Err(ProbeError::Tls {
                    host: host.to_string(),
                    source,
                })
            }
        }
    }
}

async fn connect(addrs: &[SocketAddr], timer: &PhaseTimer) -> Result<TcpStream, ProbeError> {
    let mut failure = None;
    for addr in addrs {
        match TcpStream::connect(*addr).await {
            Ok(stream) => {
                timer.connect_done(*addr);
                let _ = stream.set_nodelay(true);
                return Ok(stream);
            }
            Err(source) => {
                log::debug!("Connect to {addr} failed: {source}");
                failure = Some(ProbeError::Connect { addr: *addr, source });
            }
        }
    }
    Err(failure.unwrap_or_else(|| ProbeError::NoAddresses(String::new())))
}

async fn exchange<S>(stream: S, target: &Url, timer: &PhaseTimer) -> Result<Exchange, ProbeError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let request = build_request(target)?;
    let io = TokioIo::new(TimedStream::new(stream, timer.clone()));

    let (mut sender, connection) = http1::handshake(io).await?;
    let _connection = ConnectionTask::spawn(connection);
    timer.got_conn();

    let response = sender.send_request(request).await?;
    drain(response).await
}

fn build_request(target: &Url) -> Result<Request<Empty<Bytes>>, ProbeError> {
    let authority = match (target.host_str(), target.port()) {
        (Some(host), Some(port)) => format!("{host}:{port}"),
        (Some(host), None) => host.to_string(),
        (None, _) => return Err(unsupported(target, "missing host")),
    };

    let request = Request::get(&target[Position::BeforePath..Position::AfterQuery])
        .header(HOST, authority)
        .header(USER_AGENT, PROBE_USER_AGENT)
        .header(CONNECTION, "close")
        .body(Empty::<Bytes>::new())?;
    Ok(request)
}

async fn drain(response: Response<Incoming>) -> Result<Exchange, ProbeError> {
    let status = response.status().as_u16();
    let version = format!("{:?}", response.version());

    let mut body = response.into_body();
    let mut body_bytes = 0u64;
    while let Some(frame) = body.frame().await {
        if let Some(data) = frame?.data_ref() {
            body_bytes += data.len() as u64;
        }
    }

    Ok(Exchange {
        status,
        version,
        body_bytes,
    })
}

fn unsupported(target: &Url, reason: &'static str) -> ProbeError {
    ProbeError::UnsupportedUrl {
        url: target.to_string(),
        reason,
    }
}
