use std::fmt::Write;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::http_probe::prelude::*;

/// Certificate block, printed for https targets. `host` is the probed host
/// name, checked against the certificate names.
pub fn cert_info(certificate: Option<&LeafCertificate>, host: &str, now: DateTime<Utc>) -> String {
    let mut s = String::from("--------- Certificate -------------------------\n");
    match certificate {
        Some(cert) => {
            let _ = writeln!(s, "Issuer:\t\t{}", cert.issuer_common_name);
            let _ = writeln!(s, "CommonName:\t{}", cert.subject_common_name);
            let _ = writeln!(s, "SANs:\t\t[{}]", cert.dns_names.join(" "));
            let _ = writeln!(s, "NotBefore:\t{}", cert.not_before.to_rfc3339_opts(SecondsFormat::Secs, true));
            let _ = writeln!(s, "NotAfter:\t{}", cert.not_after.to_rfc3339_opts(SecondsFormat::Secs, true));
            let validity = if cert.is_valid_at(now) { "valid" } else { "NOT VALID" };
            let _ = writeln!(s, "Validity:\t{} ({} days remaining)", validity, cert.days_remaining(now));
            if !cert.covers_host(host) {
                let _ = writeln!(s, "Warning:\tcertificate does not cover {host}");
            }
        }
        None => s.push_str("No certificate presented\n"),
    }
    s
}

/// Phase latency block.
pub fn time_info(result: &ProbeResult) -> String {
    let phases = &result.phases;
    let mut s = String::from("------------- Time ----------------------------\n");
    let _ = writeln!(s, "Target:             {}", result.url);
    let _ = writeln!(s, "Remote Address:     {}", result.remote_address);
    let _ = writeln!(
        s,
        "Response:           {} {}, {} body bytes",
        result.http_version, result.http_status, result.body_bytes
    );
    let _ = writeln!(s, "DNS Lookup:         {:?}", phases.dns_lookup);
    let _ = writeln!(s, "TCP Connection:     {:?}", phases.tcp_connection);
    let _ = writeln!(s, "TLS Handshake:      {:?}", phases.tls_handshake);
    let _ = writeln!(s, "Server Processing:  {:?}", phases.server_processing);
    let _ = writeln!(s, "Content Transfer:   {:?}", phases.content_transfer);
    let _ = writeln!(s, "Time to first byte: {:?}", phases.time_to_first_byte);
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::time::Duration;

    #[test]
    fn test_time_info() {
        let result = ProbeResult {
            url: "http://127.0.0.1:8080/".to_string(),
            remote_address: "127.0.0.1:8080".to_string(),
            leaf_certificate: None,
            phases: PhaseDurations {
                dns_lookup: Duration::ZERO,
                tcp_connection: Duration::from_micros(250),
                tls_handshake: Duration::ZERO,
                server_processing: Duration::from_millis(12),
                content_transfer: Duration::from_micros(80),
                time_to_first_byte: Duration::from_millis(13),
            },
            http_status: 204,
            http_version: "HTTP/1.1".to_string(),
            body_bytes: 0,
        };

        let text = time_info(&result);
        assert!(text.contains("Remote Address:     127.0.0.1:8080\n"));
        assert!(text.contains("Response:           HTTP/1.1 204, 0 body bytes\n"));
        assert!(text.contains("TCP Connection:     250µs\n"));
        assert!(text.contains("TLS Handshake:      0ns\n"));
        assert!(text.contains("Time to first byte: 13ms\n"));
    }

    #[test]
    fn test_cert_info() {
        let cert = LeafCertificate {
            issuer_common_name: "R11".to_string(),
            subject_common_name: "example.org".to_string(),
            dns_names: vec!["example.org".to_string(), "www.example.org".to_string()],
            not_before: Utc.with_ymd_and_hms(2026, 8, 1, 0, 0, 0).unwrap(),
            not_after: Utc.with_ymd_and_hms(2026, 10, 30, 0, 0, 0).unwrap(),
        };

        let now = Utc.with_ymd_and_hms(2026, 10, 19, 0, 0, 0).unwrap();

        let text = cert_info(Some(&cert), "www.example.org", now);
        assert!(text.contains("Issuer:\t\tR11\n"));
        assert!(text.contains("SANs:\t\t[example.org www.example.org]\n"));
        assert!(text.contains("NotAfter:\t2026-10-30T00:00:00Z\n"));
        assert!(text.contains("Validity:\tvalid (11 days remaining)\n"));
        assert!(!text.contains("Warning:"));

        let expired = cert_info(Some(&cert), "example.net", Utc.with_ymd_and_hms(2026, 11, 2, 0, 0, 0).unwrap());
        assert!(expired.contains("Validity:\tNOT VALID (-3 days remaining)\n"));
        assert!(expired.contains("Warning:\tcertificate does not cover example.net\n"));

        assert!(cert_info(None, "example.org", now).contains("No certificate presented"));
    }
}
