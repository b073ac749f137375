//! Blink-driven liveness with debounce and timeout.
//!
//! A blink is a run of at least `blink_min_frames` consecutive samples
//! below `blink_ear_threshold` followed by a sample at or above it. The
//! blink is stamped with the time of the reopening sample. A face stays
//! live for `liveness_timeout_seconds` after its most recent blink.

use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LivenessConfig {
    pub blink_ear_threshold: f64,
    pub blink_min_frames: u32,
    pub liveness_timeout_seconds: f64,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            blink_ear_threshold: 0.3,
            blink_min_frames: 3,
            liveness_timeout_seconds: 3.0,
        }
    }
}

impl LivenessConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.liveness_timeout_seconds.max(0.0))
    }
}

/// Per-face blink counter and most recent blink time.
#[derive(Debug, Clone, Default)]
pub struct BlinkState {
    consecutive_low_ear: u32,
    last_blink_time: Option<Instant>,
}

impl BlinkState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn consecutive_low_ear(&self) -> u32 {
        self.consecutive_low_ear
    }

    pub fn last_blink_time(&self) -> Option<Instant> {
        self.last_blink_time
    }

    /// Feeds one EAR sample taken at `now`. Returns `true` when the sample
    /// completes a blink.
    ///
    /// Non-finite samples are ignored and leave the state untouched.
    pub fn observe(&mut self, ear: f64, now: Instant, config: &LivenessConfig) -> bool {
        if !ear.is_finite() {
            return false;
        }

        if ear < config.blink_ear_threshold {
            self.consecutive_low_ear = self.consecutive_low_ear.saturating_add(1);
            return false;
        }

        let completed = self.consecutive_low_ear >= config.blink_min_frames;
        if completed {
            // Monotonic: an out-of-order timestamp never moves the blink back.
            self.last_blink_time = Some(match self.last_blink_time {
                Some(prev) if prev > now => prev,
                _ => now,
            });
        }
        self.consecutive_low_ear = 0;
        completed
    }

    /// Live iff a blink happened strictly less than the timeout before `now`.
    pub fn is_live(&self, now: Instant, config: &LivenessConfig) -> bool {
        match self.last_blink_time {
            Some(blink) => now.saturating_duration_since(blink) < config.timeout(),
            None => false,
        }
    }

    pub fn verdict(&self, now: Instant, config: &LivenessConfig) -> Liveness {
        if self.is_live(now, config) {
            Liveness::Live
        } else {
            Liveness::NotLive
        }
    }
}

/// Liveness verdict as rendered in frame results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Liveness {
    #[serde(rename = "Live")]
    Live,
    #[serde(rename = "Not Live")]
    NotLive,
}

impl Liveness {
    pub fn is_live(self) -> bool {
        matches!(self, Liveness::Live)
    }

    /// Overlay colour name for renderers: green when live, red otherwise.
    pub fn color_hint(self) -> &'static str {
        match self {
            Liveness::Live => "green",
            Liveness::NotLive => "red",
        }
    }
}

impl fmt::Display for Liveness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Liveness::Live => write!(f, "Live"),
            Liveness::NotLive => write!(f, "Not Live"),
        }
    }
}
