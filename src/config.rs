/*
MIT License

Copyright (c) 2024 Philipp Schuster

Permission is hereby granted, free of charge, to any person obtaining a copy
of this software and associated documentation files (the "Software"), to deal
in the Software without restriction, including without limitation the rights
to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
copies of the Software, and to permit persons to whom the Software is
furnished to do so, subject to the following conditions:

The above copyright notice and this permission notice shall be included in all
copies or substantial portions of the Software.

THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
SOFTWARE.
*/

//! Tunables of the beat search. All of them have sensible defaults for
//! heart-sound recordings; see [`FinderConfig::default`].

use crate::InvalidInputError;

/// Minimum plausible distance between two primary events. A heart doesn't
/// beat faster than 120 bpm at rest.
pub const EARLY_GAP_S: f32 = 0.5;

/// Maximum plausible distance between two primary events before the
/// detector relaxes its threshold and rewinds.
pub const LATE_GAP_S: f32 = 1.5;

/// Trailing window (in samples) the peak detector compares the current
/// sample against.
pub const DETECTION_WINDOW: usize = 30;

/// Trailing window (in samples) of the coarse pre-pass.
pub const ROUGH_WINDOW: usize = 200;

/// Upper bound of threshold-relaxing rewinds in a single detection pass.
pub const MAX_REWINDS: usize = 64;

/// Length the signal is reduced to when it is drowning in events.
pub const DOWN_SAMPLE_TARGET_LEN: usize = 1024;

/// Maximum number of passes of the outer rate loop.
pub const MAX_RATE_ATTEMPTS: usize = 3;

/// Growth of the nominal rate guess between outer passes.
pub const RATE_GROWTH: f32 = 1.5;

/// Configuration for the [`BeatFinder`].
///
/// [`BeatFinder`]: crate::BeatFinder
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FinderConfig {
    /// See [`EARLY_GAP_S`].
    pub early_gap_s: f32,
    /// See [`LATE_GAP_S`].
    pub late_gap_s: f32,
    /// Forward jump (seconds) after a recorded primary event, to step over a
    /// known secondary-sound artifact directly behind it. `0.0` disables it.
    pub nudge_s: f32,
    /// See [`DETECTION_WINDOW`].
    pub detection_window: usize,
    /// See [`ROUGH_WINDOW`].
    pub rough_window: usize,
    /// See [`MAX_REWINDS`].
    pub max_rewinds: usize,
    /// See [`DOWN_SAMPLE_TARGET_LEN`].
    pub down_sample_target_len: usize,
    /// See [`MAX_RATE_ATTEMPTS`].
    pub max_rate_attempts: usize,
    /// See [`RATE_GROWTH`].
    pub rate_growth: f32,
}

impl Default for FinderConfig {
    fn default() -> Self {
        Self {
            early_gap_s: EARLY_GAP_S,
            late_gap_s: LATE_GAP_S,
            nudge_s: 0.0,
            detection_window: DETECTION_WINDOW,
            rough_window: ROUGH_WINDOW,
            max_rewinds: MAX_REWINDS,
            down_sample_target_len: DOWN_SAMPLE_TARGET_LEN,
            max_rate_attempts: MAX_RATE_ATTEMPTS,
            rate_growth: RATE_GROWTH,
        }
    }
}

impl FinderConfig {
    /// Checks that the values can drive a search.
    pub fn validate(&self) -> Result<(), InvalidInputError> {
        if !(self.early_gap_s.is_finite() && self.early_gap_s > 0.0) {
            return Err(InvalidInputError::InvalidConfig("early gap must be > 0 s"));
        }
        if !(self.late_gap_s.is_finite() && self.late_gap_s > self.early_gap_s) {
            return Err(InvalidInputError::InvalidConfig(
                "late gap must be larger than the early gap",
            ));
        }
        if !(self.nudge_s.is_finite() && self.nudge_s >= 0.0) {
            return Err(InvalidInputError::InvalidConfig("nudge must be >= 0 s"));
        }
        if self.detection_window == 0 || self.rough_window == 0 {
            return Err(InvalidInputError::InvalidConfig(
                "trailing windows must not be empty",
            ));
        }
        if self.down_sample_target_len == 0 {
            return Err(InvalidInputError::InvalidConfig(
                "down-sample target length must not be 0",
            ));
        }
        if !(self.rate_growth.is_finite() && self.rate_growth > 1.0) {
            return Err(InvalidInputError::InvalidConfig("rate growth must be > 1"));
        }
        Ok(())
    }

    /// Returns the spacing rules for a signal sampled at `sampling_rate`.
    pub fn spacing_rules(&self, sampling_rate: u32) -> SpacingRules {
        let fs = sampling_rate as f32;
        SpacingRules {
            early_gap: libm::floorf(fs * self.early_gap_s) as usize,
            late_gap: libm::floorf(fs * self.late_gap_s) as usize,
            nudge: libm::floorf(fs * self.nudge_s) as usize,
        }
    }
}

/// Spacing constraints between consecutive primary events, in samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpacingRules {
    /// Events closer than this to the previous one are discarded.
    pub early_gap: usize,
    /// Events farther than this from the previous one relax the threshold.
    pub late_gap: usize,
    /// Forward jump after a recorded event.
    pub nudge: usize,
}

impl SpacingRules {
    /// Rescales the rules after the signal was resampled from `old_len` to
    /// `new_len` samples.
    #[must_use]
    pub fn rescaled(self, old_len: usize, new_len: usize) -> Self {
        if old_len == 0 {
            return self;
        }
        let scale = |n: usize| (n as u64 * new_len as u64 / old_len as u64) as usize;
        Self {
            early_gap: scale(self.early_gap),
            late_gap: scale(self.late_gap).max(scale(self.early_gap) + 1),
            nudge: scale(self.nudge),
        }
    }
}
