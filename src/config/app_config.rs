use std::env;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{CryptoProvider, verify_tls12_signature, verify_tls13_signature};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use trust_dns_resolver::config::{
    NameServerConfig, NameServerConfigGroup, Protocol, ResolverConfig, ResolverOpts,
};
use url::Url;

use super::ConfigError;
use super::probe_config::{Config, SlackConfig};

/// Validated settings, read once at startup and passed to whoever needs them.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub target: Url,
    pub timeout: Duration,
    pub interval: Duration,
    pub verify_certificates: bool,
    pub dns_servers: Vec<IpAddr>,
    pub slack: Option<SlackConfig>,
}

/// Load the application configuration from a YAML file and environment variables.
/// The file is taken from the `CONFIG_FILE` environment variable, defaulting to
/// `config.yml`. `SLACK_WEBHOOK_URL` overrides the webhook URL of the file.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let config_file_location =
        env::var("CONFIG_FILE").unwrap_or_else(|_| "config.yml".to_string());
    let webhook_url = env::var("SLACK_WEBHOOK_URL").ok();

    load_config_from(Path::new(&config_file_location), webhook_url)
}

pub fn load_config_from(
    path: &Path,
    webhook_url_override: Option<String>,
) -> Result<AppConfig, ConfigError> {
    let config_str = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let config: Config = serde_yaml::from_str(&config_str).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })?;

    AppConfig::from_config(config, webhook_url_override)
}

impl AppConfig {
    pub fn from_config(
        config: Config,
        webhook_url_override: Option<String>,
    ) -> Result<Self, ConfigError> {
        let webmon = config.webmon;

        let target = Url::parse(&webmon.url).map_err(|source| ConfigError::InvalidUrl {
            url: webmon.url.clone(),
            source,
        })?;
        if !matches!(target.scheme(), "http" | "https") {
            return Err(ConfigError::UnsupportedUrl {
                url: webmon.url,
                reason: "scheme must be http or https",
            });
        }
        if target.host().is_none() {
            return Err(ConfigError::UnsupportedUrl {
                url: webmon.url,
                reason: "missing host",
            });
        }

        if webmon.timeout_seconds == 0 {
            return Err(ConfigError::NotPositive("timeout_seconds"));
        }
        if webmon.interval_seconds == 0 {
            return Err(ConfigError::NotPositive("interval_seconds"));
        }

        let dns_servers = webmon
            .dns_servers
            .iter()
            .map(|host| {
                host.trim()
                    .parse::<IpAddr>()
                    .map_err(|_| ConfigError::InvalidDnsServer(host.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let slack = resolve_slack(config.slack, webhook_url_override)?;

        Ok(AppConfig {
            target,
            timeout: Duration::from_secs(webmon.timeout_seconds),
            interval: Duration::from_secs(webmon.interval_seconds),
            verify_certificates: webmon.verify_certificates,
            dns_servers,
            slack,
        })
    }
}

// The environment wins over the file; an empty webhook URL turns notifications off.
fn resolve_slack(
    slack: Option<SlackConfig>,
    webhook_url_override: Option<String>,
) -> Result<Option<SlackConfig>, ConfigError> {
    let slack = match (slack, webhook_url_override) {
        (Some(slack), Some(webhook_url)) => Some(SlackConfig {
            webhook_url,
            ..slack
        }),
        (None, Some(webhook_url)) => Some(SlackConfig {
            webhook_url,
            channel: String::new(),
            username: String::new(),
            alert_prefix: String::new(),
            exit_on_error: false,
        }),
        (slack, None) => slack,
    };

    match slack {
        Some(slack) if slack.webhook_url.trim().is_empty() => Ok(None),
        Some(slack) => {
            Url::parse(&slack.webhook_url)
                .map_err(|_| ConfigError::InvalidWebhookUrl(slack.webhook_url.clone()))?;
            Ok(Some(slack))
        }
        None => Ok(None),
    }
}

/// Setup the TLS client configuration used by the probes.
/// Only `http/1.1` is offered through ALPN. With `verify_certificates` disabled
/// every server certificate is accepted, so the leaf of an expired or
/// self-signed chain can still be inspected.
pub fn setup_tls_config(verify_certificates: bool) -> Result<Arc<ClientConfig>, ConfigError> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let builder = ClientConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()?;

    let mut config = if verify_certificates {
        let mut roots = RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        builder.with_root_certificates(roots).with_no_client_auth()
    } else {
        builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyCertificate(provider)))
            .with_no_client_auth()
    };
    config.alpn_protocols = vec![b"http/1.1".to_vec()];

    Ok(Arc::new(config))
}

/// Setup the DNS resolver configuration.
/// Uses the system configuration when no name servers are given, otherwise
/// queries the given servers over UDP with 2 attempts each.
pub fn setup_resolver(dns_servers: &[IpAddr]) -> Result<(ResolverConfig, ResolverOpts), ConfigError> {
    if dns_servers.is_empty() {
        return Ok(trust_dns_resolver::system_conf::read_system_conf()?);
    }

    let mut opts = ResolverOpts::default();
    opts.attempts = 2;

    let mut name_servers = NameServerConfigGroup::new();
    for ip in dns_servers {
        name_servers.push(NameServerConfig {
            socket_addr: SocketAddr::new(*ip, 53),
            protocol: Protocol::Udp,
            tls_dns_name: None,
            trust_negative_responses: false,
            bind_addr: None,
        });
    }

    let resolver_config = ResolverConfig::from_parts(None, vec![], name_servers);
    Ok((resolver_config, opts))
}

/// Accepts any server certificate while still checking handshake signatures.
#[derive(Debug)]
struct AcceptAnyCertificate(Arc<CryptoProvider>);

impl ServerCertVerifier for AcceptAnyCertificate {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}
