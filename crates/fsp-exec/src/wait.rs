use std::path::Path;
use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Bounded polling policy used while waiting for a condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitPolicy {
    /// Maximum accumulated wait before giving up.
    pub timeout: Duration,
    /// Sleep between two consecutive checks.
    pub interval: Duration,
}

impl WaitPolicy {
    /// Creates a policy from whole seconds.
    pub fn from_secs(timeout_secs: u64, interval_secs: u64) -> Self {
        Self {
            timeout: Duration::from_secs(timeout_secs),
            interval: Duration::from_secs(interval_secs),
        }
    }

    /// Policy that checks once and never sleeps.
    pub fn immediate() -> Self {
        Self {
            timeout: Duration::ZERO,
            interval: Duration::from_secs(1),
        }
    }
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self::from_secs(300, 5)
    }
}

/// Result of a bounded wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Readiness {
    /// The condition held within the timeout.
    Ready,
    /// The timeout elapsed without the condition holding.
    TimedOut,
}

impl Readiness {
    /// Returns true for [`Readiness::Ready`].
    pub fn is_ready(self) -> bool {
        matches!(self, Readiness::Ready)
    }
}

/// Polls `predicate` until it holds or `policy.timeout` has accumulated.
///
/// Elapsed time is counted in whole intervals, so the predicate runs
/// `ceil(timeout / interval) + 1` times when it never holds. A zero
/// interval performs a single check instead of spinning.
pub fn await_condition<F>(mut predicate: F, policy: &WaitPolicy) -> Readiness
where
    F: FnMut() -> bool,
{
    if predicate() {
        return Readiness::Ready;
    }
    if policy.interval.is_zero() {
        return Readiness::TimedOut;
    }
    let mut waited = Duration::ZERO;
    while waited < policy.timeout {
        thread::sleep(policy.interval);
        waited += policy.interval;
        if predicate() {
            return Readiness::Ready;
        }
    }
    Readiness::TimedOut
}

/// Waits for `path` to exist, warning when it never appears.
///
/// Existence does not imply the producer finished writing the file.
pub fn await_file(path: &Path, policy: &WaitPolicy) -> Readiness {
    debug!(path = %path.display(), timeout = ?policy.timeout, "waiting for file");
    let readiness = await_condition(|| path.exists(), policy);
    if readiness == Readiness::TimedOut {
        warn!(path = %path.display(), timeout = ?policy.timeout, "file not found after waiting");
    }
    readiness
}
