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

//! Module for [`PeakDetector`].

use crate::config::SpacingRules;
use crate::window::trailing_average;
use crate::Event;
use alloc::vec::Vec;

/// Factor the threshold is relaxed by when the distance to the previous
/// event exceeds the late gap.
const LATE_THRESHOLD_RELAXATION: f32 = 0.85;

/// State of the detector's hysteresis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// The next downward crossing may produce an event.
    Armed,
    /// An event was just recorded. Waits for the signal to rise above the
    /// threshold again before re-arming.
    Cooldown,
}

/// Result of a single detection pass.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionPass {
    /// Detected events, in ascending timestamp order.
    pub events: Vec<Event>,
    /// Number of rewinds that were performed.
    pub rewinds: usize,
    /// Whether a late event was recorded because no rewinds were left.
    pub rewind_limit_reached: bool,
    /// Threshold that was active at the end of the pass.
    pub final_threshold: f32,
}

/// Single-pass threshold-crossing detector with hysteresis.
///
/// An event is a downward crossing: the current sample is below the
/// threshold while the trailing average is still above it. This is the
/// falling edge of a pulse. The detector then cools down until the signal
/// rises above the threshold while the trailing average is below it, i.e.,
/// until the rising edge of the next pulse.
///
/// Spacing between consecutive events is governed by [`SpacingRules`]:
/// - A crossing closer than `early_gap` to the previous event is ignored.
/// - A crossing farther than `late_gap` from the previous event means that
///   weaker beats were missed in between. The threshold is relaxed by 15 %
///   and, if at least two events exist, the scan rewinds to the second-last
///   event and re-scans the signal. The number of rewinds is capped; once
///   the cap is reached, late events are recorded as they are.
///
/// ```text
///   ___       ___
///  |   |     |   |        threshold
/// -|---|-----|---|---------
///  |   |x    |   |x       x: event
/// _|   |_____|   |____
/// ```
#[derive(Debug, Clone)]
pub struct PeakDetector {
    rules: SpacingRules,
    window_len: usize,
    max_rewinds: usize,
}

impl PeakDetector {
    /// Creates a new detector.
    pub const fn new(rules: SpacingRules, window_len: usize, max_rewinds: usize) -> Self {
        Self {
            rules,
            window_len,
            max_rewinds,
        }
    }

    /// Scans the whole signal with the given absolute threshold.
    pub fn detect(&self, signal: &[f32], threshold: f32) -> DetectionPass {
        let mut events = Vec::<Event>::new();
        let mut threshold = threshold;
        let mut state = State::Armed;
        let mut rewinds = 0;
        let mut rewind_limit_reached = false;

        let mut index = 1;
        while index < signal.len() {
            let sample = signal[index];
            let average = trailing_average(signal, index, self.window_len);

            if state == State::Cooldown && sample > threshold && average < threshold {
                state = State::Armed;
            }

            if state == State::Armed && sample < threshold && average > threshold {
                let previous = events.last().map(|event| event.timestamp);

                let too_early = previous.is_some_and(|previous| {
                    index <= previous || index - previous < self.rules.early_gap
                });
                if too_early {
                    index += 1;
                    continue;
                }

                let too_late =
                    previous.is_some_and(|previous| index - previous > self.rules.late_gap);
                if too_late {
                    if rewinds < self.max_rewinds {
                        threshold *= LATE_THRESHOLD_RELAXATION;
                        rewinds += 1;
                        if let Some(second_last) = events.iter().rev().nth(1) {
                            log::trace!(
                                "late event at #{index}, rewinding to #{} with threshold {threshold}",
                                second_last.timestamp
                            );
                            index = second_last.timestamp;
                            continue;
                        }
                    } else if !rewind_limit_reached {
                        log::warn!(
                            "rewind limit of {} reached at #{index}, keeping late events",
                            self.max_rewinds
                        );
                        rewind_limit_reached = true;
                    }
                }

                events.push(Event::new(index, threshold));
                state = State::Cooldown;
                index += self.rules.nudge;
            }

            index += 1;
        }

        DetectionPass {
            events,
            rewinds,
            rewind_limit_reached,
            final_threshold: threshold,
        }
    }
}
