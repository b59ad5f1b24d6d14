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

//! Corrective reprocessing of a signal that the threshold search can't make
//! sense of.
//!
//! The search itself only knows the [`SignalConditioner`] trait. Users with
//! their own resampling or gain pipeline plug it in there; everyone else uses
//! the [`DefaultConditioner`].

use alloc::vec::Vec;
use biquad::{Biquad, Coefficients, DirectForm2Transposed, ToHertz, Type, Q_BUTTERWORTH_F32};

/// Ratio between the cutoff frequency of the anti-aliasing filter and the
/// sample rate after decimation. Stays below the Nyquist ratio of `0.5`.
const DOWN_SAMPLE_CUTOFF_RATIO: f32 = 0.4;

/// RMS level the gain control aims for.
const TARGET_RMS: f32 = 0.25;

/// Block length (samples) over which the RMS is measured.
const GAIN_WINDOW: usize = 256;

/// Smoothing coefficient applied when the gain has to go down.
const ATTACK_COEFF: f32 = 0.5;

/// Smoothing coefficient applied when the gain has to go up.
const RELEASE_COEFF: f32 = 0.9;

/// Bounds of the gain.
const MIN_GAIN: f32 = 0.1;
const MAX_GAIN: f32 = 10.0;

/// Below this RMS a block is considered silence and doesn't move the gain.
const MIN_RMS: f32 = 1e-6;

/// Reprocesses a signal on behalf of the threshold search.
pub trait SignalConditioner {
    /// Returns a signal of at most `target_len` samples that covers the same
    /// time span as `signal`. Used when a signal produces implausibly many
    /// events.
    fn down_sample(&mut self, signal: &[f32], sampling_rate: f32, target_len: usize) -> Vec<f32>;

    /// Returns an amplitude-rescaled signal of the same length. Used when a
    /// signal produces implausibly few events.
    fn normalize_amplitude(&mut self, signal: &[f32]) -> Vec<f32>;
}

/// Default [`SignalConditioner`].
///
/// - Down-sampling runs a Butterworth lowpass at 40 % of the new sample rate
///   and keeps every `n`-th sample.
/// - Amplitude normalization is a block-wise gain control towards a constant
///   RMS, with bounded gain and the result limited to `-1.0..=1.0`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultConditioner;

impl SignalConditioner for DefaultConditioner {
    fn down_sample(&mut self, signal: &[f32], sampling_rate: f32, target_len: usize) -> Vec<f32> {
        let factor = signal.len().div_ceil(target_len.max(1));
        if factor <= 1 {
            return signal.to_vec();
        }

        let effective_sampling_rate = sampling_rate / factor as f32;
        let cutoff = effective_sampling_rate * DOWN_SAMPLE_CUTOFF_RATIO;
        let coefficients = Coefficients::<f32>::from_params(
            Type::LowPass,
            sampling_rate.hz(),
            cutoff.hz(),
            Q_BUTTERWORTH_F32,
        );

        match coefficients {
            Ok(coefficients) => {
                let mut filter = DirectForm2Transposed::<f32>::new(coefficients);
                // every sample must run through the filter, only then decimate
                let filtered = signal.iter().map(|&x| filter.run(x)).collect::<Vec<_>>();
                filtered.into_iter().step_by(factor).collect()
            }
            Err(e) => {
                log::warn!("can't create lowpass filter ({e:?}), decimating without it");
                signal.iter().copied().step_by(factor).collect()
            }
        }
    }

    fn normalize_amplitude(&mut self, signal: &[f32]) -> Vec<f32> {
        let mut gain = GainControl::new();
        signal
            .chunks(GAIN_WINDOW)
            .flat_map(|block| {
                let block_gain = gain.update(block);
                block.iter().map(move |&x| (x * block_gain).clamp(-1.0, 1.0))
            })
            .collect()
    }
}

/// Smoothed gain towards [`TARGET_RMS`], updated once per block.
#[derive(Debug, Clone, Copy)]
struct GainControl {
    gain: f32,
}

impl GainControl {
    const fn new() -> Self {
        Self { gain: 1.0 }
    }

    /// Measures the block and returns the gain to apply to it.
    fn update(&mut self, block: &[f32]) -> f32 {
        if block.is_empty() {
            return self.gain;
        }
        let energy = block.iter().map(|x| x * x).sum::<f32>() / block.len() as f32;
        let rms = libm::sqrtf(energy);

        if rms > MIN_RMS {
            let desired = TARGET_RMS / rms;
            let coeff = if desired < self.gain {
                ATTACK_COEFF
            } else {
                RELEASE_COEFF
            };
            self.gain = (coeff * self.gain + (1.0 - coeff) * desired).clamp(MIN_GAIN, MAX_GAIN);
        }
        self.gain
    }
}
