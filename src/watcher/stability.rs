//! Write-completion detection for files produced by another process.
//!
//! The device gives no signal when it has finished writing a file, so a file
//! is considered complete once its size and modification time have held
//! still for several consecutive samples and the modification time is old
//! enough that a coarse filesystem timestamp cannot hide a late write.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

use tokio_util::sync::CancellationToken;

use crate::config::PollingConfig;
use crate::utils::{age_since, sleep_or_cancel};

/// Timing rules for stability detection.
#[derive(Debug, Clone)]
pub struct StabilityPolicy {
    /// Minimum time since the last modification for a sample to count.
    pub min_age: Duration,
    /// Delay between samples.
    pub poll_interval: Duration,
    /// Consecutive qualifying samples needed.
    pub required_checks: u32,
    /// Overall bound on detection time.
    pub timeout: Duration,
}

impl From<&PollingConfig> for StabilityPolicy {
    fn from(config: &PollingConfig) -> Self {
        Self {
            min_age: Duration::from_millis(config.min_file_age_ms),
            poll_interval: Duration::from_millis(config.stability_interval_ms),
            required_checks: config.stability_required_checks,
            timeout: Duration::from_millis(config.stability_timeout_ms),
        }
    }
}

impl Default for StabilityPolicy {
    fn default() -> Self {
        Self::from(&PollingConfig::default())
    }
}

/// One `(size, mtime)` reading of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileSample {
    pub size: u64,
    pub modified: SystemTime,
}

impl FileSample {
    pub fn from_metadata(metadata: &std::fs::Metadata) -> Self {
        Self {
            size: metadata.len(),
            modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
        }
    }
}

/// Final answer of a detection run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StabilityVerdict {
    Stable,
    /// The budget ran out. The caller still reads the file.
    TimedOut,
    /// Shutdown was requested mid-detection.
    Cancelled,
}

/// Sampling state for one candidate file.
#[derive(Debug)]
pub struct FileObservation {
    path: PathBuf,
    last: Option<FileSample>,
    stable_checks: u32,
    started: Instant,
}

impl FileObservation {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            last: None,
            stable_checks: 0,
            started: Instant::now(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn stable_checks(&self) -> u32 {
        self.stable_checks
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Feed one sample taken at `now`; `None` means the file was missing.
    ///
    /// Returns `true` once the required number of consecutive unchanged,
    /// old-enough samples has been seen. Any change, or a missing file,
    /// resets the count.
    pub fn observe(
        &mut self,
        sample: Option<FileSample>,
        now: SystemTime,
        policy: &StabilityPolicy,
    ) -> bool {
        let Some(sample) = sample else {
            // Unlike a plain size/mtime poller, a file that vanishes must settle again from scratch
            self.last = None;
            self.stable_checks = 0;
            return false;
        };

        let unchanged = self.last == Some(sample);
        if unchanged && age_since(sample.modified, now) >= policy.min_age {
            self.stable_checks += 1;
        } else {
            self.stable_checks = 0;
        }
        self.last = Some(sample);

        self.stable_checks >= policy.required_checks
    }
}

/// Polls a file until it is stable, the budget expires, or shutdown.
#[derive(Debug, Clone, Default)]
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

    pub async fn wait(&self, path: &Path, cancel: &CancellationToken) -> StabilityVerdict {
        let mut observation = FileObservation::new(path);

        loop {
            let sample = sample_file(path).await;
            if observation.observe(sample, SystemTime::now(), &self.policy) {
                return StabilityVerdict::Stable;
            }

            if observation.elapsed() >= self.policy.timeout {
                crate::debug_event!(
                    "stability",
                    "timed out",
                    "{} after {} stable checks",
                    path.display(),
                    observation.stable_checks()
                );
                return StabilityVerdict::TimedOut;
            }

            if !sleep_or_cancel(self.policy.poll_interval, cancel).await {
                return StabilityVerdict::Cancelled;
            }
        }
    }
}

async fn sample_file(path: &Path) -> Option<FileSample> {
    match tokio::fs::metadata(path).await {
        Ok(metadata) => Some(FileSample::from_metadata(&metadata)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => {
            crate::debug_event!("stability", "stat failed", "{}: {e}", path.display());
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> StabilityPolicy {
        StabilityPolicy {
            min_age: Duration::from_millis(800),
            poll_interval: Duration::from_millis(250),
            required_checks: 2,
            timeout: Duration::from_secs(15),
        }
    }

    fn sample(size: u64, modified: SystemTime) -> Option<FileSample> {
        Some(FileSample { size, modified })
    }

    #[test]
    fn test_stable_after_required_identical_samples() {
        let policy = policy();
        let mtime = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);
        let now = mtime + Duration::from_secs(5);
        let mut obs = FileObservation::new("/in/a.xml");

        // First sample only establishes a baseline
        assert!(!obs.observe(sample(10, mtime), now, &policy));
        assert_eq!(obs.stable_checks(), 0);
        assert!(!obs.observe(sample(10, mtime), now, &policy));
        assert_eq!(obs.stable_checks(), 1);
        assert!(obs.observe(sample(10, mtime), now, &policy));
    }

    #[test]
    fn test_any_change_resets_counter() {
        let policy = policy();
        let mtime = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);
        let now = mtime + Duration::from_secs(5);
        let mut obs = FileObservation::new("/in/a.xml");

        obs.observe(sample(10, mtime), now, &policy);
        obs.observe(sample(10, mtime), now, &policy);
        assert_eq!(obs.stable_checks(), 1);

        // Size grew
        assert!(!obs.observe(sample(20, mtime), now, &policy));
        assert_eq!(obs.stable_checks(), 0);

        // Mtime moved
        let later = mtime + Duration::from_secs(1);
        assert!(!obs.observe(sample(20, later), now, &policy));
        assert_eq!(obs.stable_checks(), 0);

        assert!(!obs.observe(sample(20, later), now, &policy));
        assert!(obs.observe(sample(20, later), now, &policy));
    }

    #[test]
    fn test_young_file_never_counts() {
        let policy = policy();
        let mtime = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);
        let now = mtime + Duration::from_millis(500);
        let mut obs = FileObservation::new("/in/a.xml");

        for _ in 0..10 {
            assert!(!obs.observe(sample(10, mtime), now, &policy));
        }
        assert_eq!(obs.stable_checks(), 0);

        // Same sample once old enough
        let now = mtime + Duration::from_millis(800);
        assert!(!obs.observe(sample(10, mtime), now, &policy));
        assert!(obs.observe(sample(10, mtime), now, &policy));
    }

    #[test]
    fn test_missing_file_resets() {
        let policy = policy();
        let mtime = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);
        let now = mtime + Duration::from_secs(5);
        let mut obs = FileObservation::new("/in/a.xml");

        assert!(!obs.observe(None, now, &policy));
        obs.observe(sample(10, mtime), now, &policy);
        obs.observe(sample(10, mtime), now, &policy);
        assert_eq!(obs.stable_checks(), 1);

        assert!(!obs.observe(None, now, &policy));
        assert_eq!(obs.stable_checks(), 0);
        // Reappearing file starts over from a fresh baseline
        assert!(!obs.observe(sample(10, mtime), now, &policy));
        assert_eq!(obs.stable_checks(), 0);
    }

    #[test]
    fn test_future_mtime_is_not_old_enough() {
        let policy = policy();
        let now = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);
        let mtime = now + Duration::from_secs(60);
        let mut obs = FileObservation::new("/in/a.xml");

        for _ in 0..5 {
            assert!(!obs.observe(sample(10, mtime), now, &policy));
        }
    }

    #[test]
    fn test_required_checks_is_respected() {
        let policy = StabilityPolicy {
            required_checks: 4,
            ..policy()
        };
        let mtime = SystemTime::UNIX_EPOCH;
        let now = mtime + Duration::from_secs(60);
        let mut obs = FileObservation::new("/in/a.xml");

        let verdicts: Vec<bool> = (0..5)
            .map(|_| obs.observe(sample(1, mtime), now, &policy))
            .collect();
        assert_eq!(verdicts, vec![false, false, false, false, true]);
    }

    fn fast_policy() -> StabilityPolicy {
        StabilityPolicy {
            min_age: Duration::from_millis(0),
            poll_interval: Duration::from_millis(10),
            required_checks: 2,
            timeout: Duration::from_millis(300),
        }
    }

    #[tokio::test]
    async fn test_wait_on_settled_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("done.xml");
        std::fs::write(&path, "<R/>").unwrap();

        let detector = StabilityDetector::new(fast_policy());
        let verdict = detector.wait(&path, &CancellationToken::new()).await;
        assert_eq!(verdict, StabilityVerdict::Stable);
    }

    #[tokio::test]
    async fn test_wait_on_missing_file_times_out() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("ghost.xml");

        let detector = StabilityDetector::new(fast_policy());
        let started = Instant::now();
        let verdict = detector.wait(&path, &CancellationToken::new()).await;

        assert_eq!(verdict, StabilityVerdict::TimedOut);
        assert!(started.elapsed() >= Duration::from_millis(300));
    }

    #[tokio::test]
    async fn test_wait_cancelled() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("ghost.xml");
        let cancel = CancellationToken::new();
        cancel.cancel();

        let detector = StabilityDetector::new(StabilityPolicy {
            timeout: Duration::from_secs(60),
            ..fast_policy()
        });
        let verdict = detector.wait(&path, &cancel).await;
        assert_eq!(verdict, StabilityVerdict::Cancelled);
    }
}
