pub mod error;
pub mod probe;
pub mod result;
pub mod stream;
pub mod timer;

pub mod prelude {
    pub use super::error::ProbeError;
    pub use super::probe::Prober;
    pub use super::{report, report_with};
    pub use super::result::{LeafCertificate, PhaseDurations, ProbeResult};
}

use std::fmt::Write;

/// Formats an error together with its chain of sources, one per paragraph.
pub fn report(err: &(dyn std::error::Error + 'static)) -> String {
    report_with(err, "\n\nCaused by: ")
}

/// Formats an error followed by each of its sources, joined by `separator`.
pub fn report_with(mut err: &(dyn std::error::Error + 'static), separator: &str) -> String {
    let mut s = format!("{}", err);
    while let Some(src) = err.source() {
        let _ = write!(s, "{separator}{src}");
        err = src;
    }
    s
}
