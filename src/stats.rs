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

//! Gross amplitude statistics of a signal and the threshold blend built on
//! top of them.

/// Upper bound for the peak value that enters threshold formulas. Signals
/// are expected to be pre-normalized to roughly `-1.0..=1.0`.
const MAX_ABS_CLAMP: f32 = 0.99;

/// Mean and peak of the absolute sample values of a signal.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SignalStatistics {
    /// Mean of `|x|`. `0.0` for an empty signal.
    pub mean_abs: f32,
    /// Maximum of `|x|`. `0.0` for an empty signal.
    pub max_abs: f32,
}

impl SignalStatistics {
    /// Computes the statistics in a single pass.
    pub fn compute(signal: &[f32]) -> Self {
        let (sum, max_abs) = signal.iter().fold((0.0_f32, 0.0_f32), |(sum, max), &x| {
            let abs = libm::fabsf(x);
            (sum + abs, if abs > max { abs } else { max })
        });

        let mean_abs = if signal.is_empty() {
            0.0
        } else {
            sum / signal.len() as f32
        };

        Self { mean_abs, max_abs }
    }

    /// Returns the statistics adjusted for use in threshold formulas:
    /// - a peak above `1.0` is clamped to `0.99`,
    /// - a mean of `0.0` is replaced by a third of the peak.
    #[must_use]
    pub fn clamped(self) -> Self {
        let max_abs = if self.max_abs > 1.0 {
            MAX_ABS_CLAMP
        } else {
            self.max_abs
        };
        let mean_abs = if self.mean_abs <= 0.0 {
            max_abs / 3.0
        } else {
            self.mean_abs
        };
        Self { mean_abs, max_abs }
    }

    /// Converts a threshold multiplier into an absolute amplitude threshold:
    /// `(mean + m * max) / (m + 1)`. Large multipliers move the threshold
    /// towards the peak, small ones towards the mean.
    pub fn blend(&self, multiplier: f32) -> f32 {
        (self.mean_abs + multiplier * self.max_abs) / (multiplier + 1.0)
    }

    /// Inverse of [`Self::blend`]. Returns `None` if the threshold is at or
    /// above the peak, where the blend has no finite multiplier.
    pub fn multiplier_for(&self, threshold: f32) -> Option<f32> {
        let denominator = self.max_abs - threshold;
        if denominator <= 0.0 {
            None
        } else {
            Some((threshold - self.mean_abs) / denominator)
        }
    }
}
