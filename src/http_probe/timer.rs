//! Checkpoint recording for the lifecycle of a single HTTP request.
//!
//! The hooks on [`PhaseTimer`] are called by whichever task happens to reach
//! the corresponding transition: the resolver and connector run on the probing
//! task, while the first response byte is observed inside the spawned hyper
//! connection task. Each checkpoint is a write-once cell, so the hooks need no
//! locking and a late or repeated call can never move a timestamp that was
//! already recorded. The cells are read exactly once, by [`PhaseTimer::finish`],
//! after the request has returned.

use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use rustls::pki_types::CertificateDer;

use super::result::{LeafCertificate, PhaseDurations};

#[derive(Debug, Default)]
struct Checkpoints {
    dns_start: OnceLock<Instant>,
    dns_done: OnceLock<Instant>,
    connect_done: OnceLock<Instant>,
    tls_start: OnceLock<Instant>,
    tls_done: OnceLock<Instant>,
    got_conn: OnceLock<Instant>,
    first_byte: OnceLock<Instant>,
    remote_address: OnceLock<SocketAddr>,
    leaf_certificate: OnceLock<LeafCertificate>,
}

/// Observes one request. Clones share the same checkpoints so a clone can be
/// handed to the I/O layer; a fresh timer must be created for every request.
#[derive(Debug, Clone, Default)]
pub struct PhaseTimer {
    checkpoints: Arc<Checkpoints>,
}

/// Everything the timer captured once the request completed.
#[derive(Debug, Clone)]
pub struct TimerReport {
    pub phases: PhaseDurations,
    pub remote_address: Option<SocketAddr>,
    pub leaf_certificate: Option<LeafCertificate>,
}

impl PhaseTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dns_start(&self) {
        mark(&self.checkpoints.dns_start);
    }

    pub fn dns_done(&self) {
        mark(&self.checkpoints.dns_done);
    }

    /// Stands in for the DNS checkpoints when no lookup happened (IP literal
    /// targets). Has no effect once a lookup has been recorded.
    /// Without a lookup the time to first byte is measured from connection start.
    pub fn connect_start(&self) {
        let now = Instant::now();
        let _ = self.checkpoints.dns_start.set(now);
        let _ = self.checkpoints.dns_done.set(now);
    }

    pub fn connect_done(&self, remote_address: SocketAddr) {
        mark(&self.checkpoints.connect_done);
        let _ = self.checkpoints.remote_address.set(remote_address);
    }

    pub fn tls_handshake_start(&self) {
        mark(&self.checkpoints.tls_start);
    }

    /// `leaf` is the first certificate of the peer chain, `None` when the
    /// handshake failed.
    pub fn tls_handshake_done(&self, leaf: Option<&CertificateDer<'_>>) {
        mark(&self.checkpoints.tls_done);
        let Some(der) = leaf else {
            return;
        };
        match LeafCertificate::from_der(der.as_ref()) {
            Some(certificate) => {
                let _ = self.checkpoints.leaf_certificate.set(certificate);
            }
            None => log::warn!("Peer presented a leaf certificate that could not be parsed"),
        }
    }

    pub fn got_conn(&self) {
        mark(&self.checkpoints.got_conn);
    }

    pub fn got_first_response_byte(&self) {
        mark(&self.checkpoints.first_byte);
    }

    /// Whether the connection has been handed to the HTTP layer. Reads before
    /// that point belong to connection setup, not to the response.
    pub fn has_conn(&self) -> bool {
        self.checkpoints.got_conn.get().is_some()
    }

    /// Closes the measurement and derives the phase durations.
    pub fn finish(self) -> TimerReport {
        let end = Instant::now();
        let c = &self.checkpoints;

        let phases = PhaseDurations {
            dns_lookup: span(&c.dns_start, &c.dns_done),
            tcp_connection: span(&c.dns_done, &c.connect_done),
            tls_handshake: span(&c.tls_start, &c.tls_done),
            server_processing: span(&c.got_conn, &c.first_byte),
            content_transfer: c
                .first_byte
                .get()
                .map(|first_byte| end.saturating_duration_since(*first_byte))
                .unwrap_or_default(),
            time_to_first_byte: span(&c.dns_start, &c.first_byte),
        };

        TimerReport {
            phases,
            remote_address: c.remote_address.get().copied(),
            leaf_certificate: c.leaf_certificate.get().cloned(),
        }
    }
}

fn mark(cell: &OnceLock<Instant>) {
    let _ = cell.set(Instant::now());
}

// Zero unless both ends were recorded.
fn span(from: &OnceLock<Instant>, to: &OnceLock<Instant>) -> Duration {
    match (from.get(), to.get()) {
        (Some(from), Some(to)) => to.saturating_duration_since(*from),
        _ => Duration::ZERO,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn pause() {
        thread::sleep(Duration::from_millis(2));
    }

    #[test]
    fn test_unused_timer_reports_zero() {
        let report = PhaseTimer::new().finish();
        assert_eq!(report.phases, PhaseDurations::default());
        assert!(report.remote_address.is_none());
        assert!(report.leaf_certificate.is_none());
    }

    #[test]
    fn test_plaintext_request_has_no_tls_phase() {
        let timer = PhaseTimer::new();
        timer.dns_start();
        pause();
        timer.dns_done();
        timer.connect_start();
        pause();
        timer.connect_done("127.0.0.1:8080".parse().unwrap());
        timer.got_conn();
        pause();
        timer.got_first_response_byte();

        let report = timer.finish();
        let phases = report.phases;
        assert_eq!(phases.tls_handshake, Duration::ZERO);
        assert!(phases.dns_lookup >= Duration::from_millis(2));
        assert!(phases.tcp_connection >= Duration::from_millis(2));
        assert!(phases.server_processing >= Duration::from_millis(2));
        assert!(phases.time_to_first_byte >= phases.dns_lookup);
        assert!(report.leaf_certificate.is_none());
        assert_eq!(report.remote_address, Some("127.0.0.1:8080".parse().unwrap()));
    }

    #[test]
    fn test_connect_start_fills_skipped_dns() {
        let timer = PhaseTimer::new();
        timer.connect_start();
        pause();
        timer.connect_done("10.0.0.1:443".parse().unwrap());
        timer.got_conn();
        timer.got_first_response_byte();

        let phases = timer.finish().phases;
        assert_eq!(phases.dns_lookup, Duration::ZERO);
        assert!(phases.tcp_connection >= Duration::from_millis(2));
        assert!(phases.time_to_first_byte >= phases.tcp_connection);
    }

    #[test]
    fn test_connect_start_keeps_recorded_dns() {
        let timer = PhaseTimer::new();
        timer.dns_start();
        pause();
        timer.dns_done();
        pause();
        timer.connect_start();

        let phases = timer.finish().phases;
        assert!(phases.dns_lookup >= Duration::from_millis(2));
        assert!(phases.dns_lookup < Duration::from_secs(1));
    }

    #[test]
    fn test_checkpoints_are_written_once() {
        let timer = PhaseTimer::new();
        timer.dns_start();
        timer.dns_done();
        pause();
        timer.dns_done();
        timer.connect_done("192.0.2.1:80".parse().unwrap());
        timer.connect_done("192.0.2.2:80".parse().unwrap());

        let report = timer.finish();
        assert!(report.phases.dns_lookup < Duration::from_millis(2));
        assert_eq!(report.remote_address, Some("192.0.2.1:80".parse().unwrap()));
    }

    #[test]
    fn test_failed_handshake_leaves_certificate_unset() {
        let timer = PhaseTimer::new();
        timer.tls_handshake_start();
        pause();
        timer.tls_handshake_done(None);

        let report = timer.finish();
        assert!(report.phases.tls_handshake >= Duration::from_millis(2));
        assert!(report.leaf_certificate.is_none());
    }

    #[test]
    fn test_hooks_from_another_thread() {
        let timer = PhaseTimer::new();
        timer.dns_start();
        timer.dns_done();
        timer.connect_done("127.0.0.1:80".parse().unwrap());
        timer.got_conn();

        let io_side = timer.clone();
        thread::spawn(move || {
            pause();
            io_side.got_first_response_byte();
        })
        .join()
        .unwrap();

        let phases = timer.finish().phases;
        assert!(phases.server_processing >= Duration::from_millis(2));
        assert!(phases.time_to_first_byte >= phases.server_processing);
    }

    #[test]
    fn test_content_transfer_requires_first_byte() {
        let timer = PhaseTimer::new();
        timer.dns_start();
        timer.dns_done();
        timer.got_conn();
        pause();

        let phases = timer.finish().phases;
        assert_eq!(phases.content_transfer, Duration::ZERO);
        assert_eq!(phases.server_processing, Duration::ZERO);
        assert_eq!(phases.time_to_first_byte, Duration::ZERO);
    }
}
