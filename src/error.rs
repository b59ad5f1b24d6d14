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

//! Module for [`InvalidInputError`].

use thiserror::Error;

/// Possible errors when handing a signal to the [`BeatFinder`].
///
/// Degenerate but valid signals (flat lines, pure noise) are not errors: they
/// produce a best-effort [`Analysis`] instead.
///
/// [`BeatFinder`]: crate::BeatFinder
/// [`Analysis`]: crate::Analysis
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum InvalidInputError {
    /// The signal has no samples.
    #[error("the signal is empty")]
    EmptySignal,
    /// A sampling rate of `0 Hz` was provided.
    #[error("the sampling rate must not be 0 Hz")]
    ZeroSamplingRate,
    /// The signal spans less than a whole second. Rates per minute can't be
    /// computed from it.
    #[error("the signal ({samples} samples @ {sampling_rate} Hz) has a duration of zero seconds")]
    ZeroDuration { samples: usize, sampling_rate: u32 },
    /// The signal contains `NaN` or an infinite value.
    #[error("sample #{index} is not a finite value: {value}")]
    NonFiniteSample { index: usize, value: f32 },
    /// The configuration contains a value that can't produce a detection.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
}

/// Checks that the signal can be analyzed and returns its duration in
/// seconds.
pub(crate) fn validate_signal(
    signal: &[f32],
    sampling_rate: u32,
) -> Result<f32, InvalidInputError> {
    if sampling_rate == 0 {
        return Err(InvalidInputError::ZeroSamplingRate);
    }
    if signal.is_empty() {
        return Err(InvalidInputError::EmptySignal);
    }
    if let Some((index, &value)) = signal.iter().enumerate().find(|(_, x)| !x.is_finite()) {
        return Err(InvalidInputError::NonFiniteSample { index, value });
    }

    // rates are per minute; less than a whole second doesn't carry a beat
    if (signal.len() as u64) < u64::from(sampling_rate) {
        return Err(InvalidInputError::ZeroDuration {
            samples: signal.len(),
            sampling_rate,
        });
    }
    Ok(signal.len() as f32 / sampling_rate as f32)
}
