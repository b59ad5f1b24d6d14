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

//! Coarse pre-pass that guesses a rate and a threshold when the caller has no
//! idea about the beat rate of the recording.

use crate::config::SpacingRules;
use crate::stats::SignalStatistics;
use crate::window::trailing_average;
use alloc::vec::Vec;

/// Factor the threshold is lowered by in every round.
const THRESHOLD_DECAY: f32 = 0.8;

/// Range of beats per minute that ends the search.
const PLAUSIBLE_BPM: core::ops::RangeInclusive<u32> = 50..=150;

/// Outcome of [`estimate_rough`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoughEstimate {
    /// Events per minute found with [`Self::threshold`]. Seeds the rate bands
    /// of the fine search.
    pub rate: u32,
    /// Absolute amplitude threshold of the last round.
    pub threshold: f32,
}

/// Starts with the peak value as threshold and lowers it by 20 % per round
/// until the count of downward crossings implies a rate of `50..=150` events
/// per minute, or until the threshold reaches the mean amplitude.
pub fn estimate_rough(
    signal: &[f32],
    rules: SpacingRules,
    window_len: usize,
    stats: SignalStatistics,
    duration_s: f32,
) -> RoughEstimate {
    let mut threshold = stats.max_abs;
    loop {
        threshold *= THRESHOLD_DECAY;
        let count = downward_crossings(signal, rules, window_len, threshold).len();
        let rate = (count as f32 * 60.0 / duration_s) as u32;
        log::trace!("rough pass: {count} crossings, {rate} bpm at threshold {threshold}");

        if PLAUSIBLE_BPM.contains(&rate) || threshold <= stats.mean_abs {
            log::debug!("rough estimate: {rate} bpm at threshold {threshold}");
            return RoughEstimate { rate, threshold };
        }
    }
}

/// Returns the indices where the signal crosses `threshold` downwards while
/// the trailing average is still above it. Crossings closer than
/// `rules.early_gap` to the previous one are ignored.
fn downward_crossings(
    signal: &[f32],
    rules: SpacingRules,
    window_len: usize,
    threshold: f32,
) -> Vec<usize> {
    let mut crossings = Vec::<usize>::new();

    let mut index = 1;
    while index < signal.len() {
        let is_crossing = signal[index] < threshold
            && signal[index - 1] >= threshold
            && trailing_average(signal, index, window_len) > threshold;
        let is_spaced = crossings
            .last()
            .map_or(true, |&previous| index - previous >= rules.early_gap);

        if is_crossing && is_spaced {
            crossings.push(index);
            index += rules.nudge;
        }
        index += 1;
    }

    crossings
}
