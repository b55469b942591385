//! Size-based stabilization: a file is treated as completely written once its
//! size has not changed for a contiguous window.

use std::path::Path;
use std::time::Duration;

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::error::{IngestError, Result};

/// Polling cadence and windows used while waiting for a file to settle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StabilityPolicy {
    /// Delay between two size samples.
    pub poll_interval: Duration,
    /// Contiguous time the size must stay unchanged.
    pub stable_for: Duration,
    /// Upper bound on the whole wait.
    pub max_wait: Duration,
}

impl Default for StabilityPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            stable_for: Duration::from_secs(3),
            max_wait: Duration::from_secs(120),
        }
    }
}

/// Polls a single file's size until it stops changing.
#[derive(Clone, Debug, Default)]
pub struct StabilityDetector {
    policy: StabilityPolicy,
}

impl StabilityDetector {
    pub fn new(policy: StabilityPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &StabilityPolicy {
        &self.policy
    }

    /// Wait until `path` has kept the same size for `stable_for`, returning
    /// that size.
    ///
    /// The stable counter accumulates by one poll interval per unchanged
    /// sample and resets whenever the size moves. Fails with
    /// [`IngestError::StabilizationTimeout`] once `max_wait` has elapsed, with
    /// a not-found / I/O error if the file cannot be stat'ed, and with
    /// [`IngestError::Cancelled`] as soon as `cancel` fires.
    pub async fn wait_until_stable(
        &self,
        path: &Path,
        cancel: &CancellationToken,
    ) -> Result<u64> {
        let poll = self.policy.poll_interval;
        let mut waited = Duration::ZERO;
        let mut stable = Duration::ZERO;
        let mut last_size: Option<u64> = None;

        while waited < self.policy.max_wait {
            let size = tokio::fs::metadata(path)
                .await
                .map_err(|err| IngestError::from_io(err, path))?
                .len();

            if last_size == Some(size) {
                stable += poll;
                if stable >= self.policy.stable_for {
                    return Ok(size);
                }
            } else {
                stable = Duration::ZERO;
                last_size = Some(size);
            }
            trace!(path = %path.display(), size, ?stable, "stability sample");

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(IngestError::Cancelled(format!(
                        "stabilization of {} interrupted",
                        path.display()
                    )));
                }
                _ = sleep(poll) => {}
            }
            waited += poll;
        }

        Err(IngestError::StabilizationTimeout {
            path: path.to_path_buf(),
            max_wait: self.policy.max_wait,
        })
    }
}
