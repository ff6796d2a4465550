use std::time::{Duration, Instant};

use tracing::{info, warn};

/// Success is assumed this long after reaching 100% with no answer.
pub const COMPLETE_FALLBACK: Duration = Duration::from_secs(2);
/// A failed upload's progress display is hidden after this delay.
pub const FAILURE_HIDE_DELAY: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadPhase {
    Idle,
    Uploading { percent: u8 },
    Processing,
    Succeeded,
    Failed { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Success,
    Failure(String),
}

/// Progress of one firmware or UI upload.
///
/// The transfer itself happens elsewhere; this only folds progress callbacks
/// and terminal signals into a phase, and reports the first terminal outcome.
#[derive(Debug)]
pub struct UploadTracker {
    phase: UploadPhase,
    reached_full: bool,
    finished: bool,
    fallback_at: Option<Instant>,
    hide_at: Option<Instant>,
}

impl Default for UploadTracker {
    fn default() -> Self {
        Self {
            phase: UploadPhase::Idle,
            reached_full: false,
            finished: false,
            fallback_at: None,
            hide_at: None,
        }
    }
}

impl UploadTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> &UploadPhase {
        &self.phase
    }

    pub fn start(&mut self) {
        *self = Self {
            phase: UploadPhase::Uploading { percent: 0 },
            ..Self::default()
        };
    }

    pub fn progress(&mut self, sent: u64, total: u64, now: Instant) {
        if self.finished || total == 0 {
            return;
        }
        let percent =
            u8::try_from(u128::from(sent.min(total)) * 100 / u128::from(total)).unwrap_or(100);
        if percent >= 100 {
            self.reached_full = true;
            self.phase = UploadPhase::Processing;
            self.fallback_at.get_or_insert(now + COMPLETE_FALLBACK);
        } else {
            self.phase = UploadPhase::Uploading { percent };
        }
    }

    pub fn response(&mut self, status: u16, body: &str, now: Instant) -> Option<UploadOutcome> {
        if status == 200 && body.trim() == "OK" {
            return self.finish(UploadOutcome::Success, now);
        }
        let message = if body.trim().is_empty() {
            "Unknown error".to_owned()
        } else {
            body.trim().to_owned()
        };
        self.finish(UploadOutcome::Failure(message), now)
    }

    /// The device reboots as soon as it has the image, so a dropped
    /// connection after 100% is a success.
    pub fn transport_error(&mut self, now: Instant) -> Option<UploadOutcome> {
        if self.reached_full {
            self.finish(UploadOutcome::Success, now)
        } else {
            self.finish(UploadOutcome::Failure("Network error".to_owned()), now)
        }
    }

    pub fn poll(&mut self, now: Instant) -> Option<UploadOutcome> {
        if self.hide_at.is_some_and(|at| now >= at) {
            self.hide_at = None;
            self.phase = UploadPhase::Idle;
        }
        match self.fallback_at {
            Some(at) if now >= at => self.finish(UploadOutcome::Success, now),
            _ => None,
        }
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        [self.fallback_at, self.hide_at].into_iter().flatten().min()
    }

    fn finish(&mut self, outcome: UploadOutcome, now: Instant) -> Option<UploadOutcome> {
        if self.finished {
            return None;
        }
        self.finished = true;
        self.fallback_at = None;
        match &outcome {
            UploadOutcome::Success => {
                info!("upload complete");
                self.phase = UploadPhase::Succeeded;
            }
            UploadOutcome::Failure(message) => {
                warn!("upload failed: {message}");
                self.phase = UploadPhase::Failed {
                    message: message.clone(),
                };
                self.hide_at = Some(now + FAILURE_HIDE_DELAY);
            }
        }
        Some(outcome)
    }
}
