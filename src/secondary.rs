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

//! Search for secondary sound components (S2, S3, S4) once the primary
//! beats are known.

use crate::window::trailing_average;
use crate::Event;
use alloc::vec::Vec;

/// Distance in samples between two probed positions.
const STRIDE: usize = 30;

/// The trailing window is `len / (target_count * WINDOW_DIVISOR)` samples.
const WINDOW_DIVISOR: usize = 32;

/// Factor the threshold is lowered by if too few events were found.
const THRESHOLD_DECAY: f32 = 0.8;

/// The search gives up once the threshold falls below this value.
const MIN_THRESHOLD: f32 = 0.05;

/// Probes the signal every [`STRIDE`] samples and records every position
/// whose trailing average exceeds `threshold`.
///
/// If fewer than `target_count` positions were found, the threshold is
/// lowered by 20 % and the whole signal is scanned again, until the target
/// is met or the threshold falls below `0.05`. The last scan is returned.
pub fn find_secondary_events(signal: &[f32], threshold: f32, target_count: usize) -> Vec<Event> {
    if target_count == 0 || signal.is_empty() {
        return Vec::new();
    }

    let window_len = (signal.len() / target_count.saturating_mul(WINDOW_DIVISOR)).max(1);
    let mut threshold = threshold;
    let mut events = Vec::new();

    loop {
        events.clear();
        events.extend(
            (0..signal.len())
                .step_by(STRIDE)
                .filter(|&index| trailing_average(signal, index, window_len) > threshold)
                .map(|index| Event::new(index, threshold)),
        );
        log::trace!(
            "secondary scan: {} of {target_count} events at threshold {threshold}",
            events.len()
        );

        if events.len() >= target_count {
            break;
        }
        threshold *= THRESHOLD_DECAY;
        if threshold < MIN_THRESHOLD {
            break;
        }
    }

    events
}
