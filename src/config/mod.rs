pub mod app_config;
pub mod probe_config;

use thiserror::Error;

/// Problems found while loading the configuration. All of them are fatal at
/// startup.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config file {path}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {path}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid target url {url}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("unsupported target url {url}: {reason}")]
    UnsupportedUrl { url: String, reason: &'static str },

    #[error("{0} must be greater than zero")]
    NotPositive(&'static str),

    #[error("invalid dns server address {0}")]
    InvalidDnsServer(String),

    #[error("invalid slack webhook url {0}")]
    InvalidWebhookUrl(String),

    #[error("cannot read system resolver configuration")]
    SystemResolver(#[from] std::io::Error),

    #[error("cannot set up tls")]
    Tls(#[from] rustls::Error),
}
