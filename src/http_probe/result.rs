use std::time::Duration;

use chrono::{DateTime, Utc};
use x509_parser::extensions::GeneralName;
use x509_parser::parse_x509_certificate;

/// Outcome of one successful probe.
#[derive(Debug, Clone)]
pub struct ProbeResult {
    pub url: String,
    /// `ip:port` of the connection the request went over.
    pub remote_address: String,
    pub leaf_certificate: Option<LeafCertificate>,
    pub phases: PhaseDurations,
    pub http_status: u16,
    pub http_version: String,
    pub body_bytes: u64,
}

/// Latency of each phase of a single request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhaseDurations {
    pub dns_lookup: Duration,
    pub tcp_connection: Duration,
    pub tls_handshake: Duration,
    pub server_processing: Duration,
    pub content_transfer: Duration,
    /// Spans from the start of the DNS lookup up to the first response byte.
    pub time_to_first_byte: Duration,
}

/// The end-entity certificate presented by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafCertificate {
    pub issuer_common_name: String,
    pub subject_common_name: String,
    pub dns_names: Vec<String>,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
}

impl LeafCertificate {
    /// Parses a DER encoded X.509 certificate.
    /// Returns `None` when the certificate cannot be parsed or carries a validity
    /// window outside the range `chrono` can represent.
    pub fn from_der(der: &[u8]) -> Option<Self> {
        let (_, parsed) = parse_x509_certificate(der).ok()?;

        let issuer_common_name = parsed
            .issuer()
            .iter_common_name()
            .next()
            .and_then(|cn| cn.as_str().ok())
            .unwrap_or_default()
            .to_string();
        let subject_common_name = parsed
            .subject()
            .iter_common_name()
            .next()
            .and_then(|cn| cn.as_str().ok())
            .unwrap_or_default()
            .to_string();

        let dns_names = match parsed.subject_alternative_name() {
            Ok(Some(san)) => san
                .value
                .general_names
                .iter()
                .filter_map(|name| match name {
                    GeneralName::DNSName(dns) => Some(dns.to_string()),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        };

        let validity = parsed.validity();
        let not_before = DateTime::from_timestamp(validity.not_before.timestamp(), 0)?;
        let not_after = DateTime::from_timestamp(validity.not_after.timestamp(), 0)?;

        Some(LeafCertificate {
            issuer_common_name,
            subject_common_name,
            dns_names,
            not_before,
            not_after,
        })
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.not_before <= now && now <= self.not_after
    }

    /// Whole days until `not_after`, negative once expired.
    pub fn days_remaining(&self, now: DateTime<Utc>) -> i64 {
        (self.not_after - now).num_days()
    }

    /// Whether the certificate names `host`, either as its subject common name
    /// or as one of its DNS subject alternative names.
    pub fn covers_host(&self, host: &str) -> bool {
        let host = host.trim_end_matches('.').to_ascii_lowercase();
        std::iter::once(&self.subject_common_name)
            .chain(self.dns_names.iter())
            .any(|pattern| name_matches(&pattern.to_ascii_lowercase(), &host))
    }
}

// A leading `*.` matches exactly one label.
fn name_matches(pattern: &str, host: &str) -> bool {
    match pattern.strip_prefix("*.") {
        Some(suffix) => host
            .split_once('.')
            .map(|(label, rest)| !label.is_empty() && rest == suffix)
            .unwrap_or(false),
        None => pattern == host,
    }
}
