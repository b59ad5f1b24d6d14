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

//! Run-length "signature" of the gross shape of a signal. It is a cheap
//! alternative to spectral analysis when comparing beats.

use crate::stats::SignalStatistics;
use alloc::vec::Vec;

/// Run-length encoded binarization of a signal.
///
/// The signal is saturated at `(2 * mean + max) / 3` (of the absolute
/// values): every sample above that level is a `1`, every other sample a
/// `0`. The runs of equal bits alternate, starting with
/// [`Self::starts_high`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Signature {
    /// Whether the first run consists of `1`s.
    pub starts_high: bool,
    /// Lengths of the alternating runs. Never contains `0`.
    pub runs: Vec<usize>,
}

impl Signature {
    /// Computes the signature of a signal.
    pub fn of(signal: &[f32]) -> Self {
        let threshold = saturation_level(signal);
        let mut bits = signal.iter().map(|&x| x > threshold);

        let Some(first) = bits.next() else {
            return Self::default();
        };

        let mut runs = vec![1_usize];
        let mut current = first;
        for bit in bits {
            if bit == current {
                // `runs` starts with one element and never shrinks
                if let Some(run) = runs.last_mut() {
                    *run += 1;
                }
            } else {
                current = bit;
                runs.push(1);
            }
        }

        Self {
            starts_high: first,
            runs,
        }
    }

    /// Number of samples the signature covers.
    pub fn len(&self) -> usize {
        self.runs.iter().sum()
    }

    /// Whether the signature covers no samples.
    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Expands the runs back into the binarized signal.
    pub fn bits(&self) -> impl Iterator<Item = bool> + '_ {
        self.runs
            .iter()
            .enumerate()
            .flat_map(move |(i, &run)| {
                let bit = self.starts_high ^ (i % 2 == 1);
                core::iter::repeat(bit).take(run)
            })
    }
}

/// Level between mean and peak where the signal is binarized.
fn saturation_level(signal: &[f32]) -> f32 {
    let stats = SignalStatistics::compute(signal);
    (2.0 * stats.mean_abs + stats.max_abs) / 3.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{pulse_train, PulseTrain};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn signature_of_pulse_train() {
        let signal = pulse_train(PulseTrain {
            len: 1000,
            period: 250,
            width: 50,
            offset: 100,
            ..Default::default()
        });
        let signature = Signature::of(&signal);

        check!(!signature.starts_high);
        check!(signature.runs == [100, 50, 200, 50, 200, 50, 200, 50, 100]);
        check!(signature.len() == signal.len());
    }

    #[test]
    fn runs_expand_to_binarized_signal() {
        let signal = [0.9, 0.8, 0.0, -0.9, 0.1, 0.95, 0.95, 0.0];
        let signature = Signature::of(&signal);
        let level = saturation_level(&signal);
        let expected = signal.iter().map(|&x| x > level).collect::<Vec<_>>();

        check!(signature.starts_high);
        check!(signature.len() == signal.len());
        check!(signature.bits().collect::<Vec<_>>() == expected);
    }

    #[test]
    fn runs_round_trip_on_random_signals() {
        let mut rng = StdRng::seed_from_u64(0xbeef);
        for _ in 0..200 {
            let len = rng.random_range(1..2000);
            let density = rng.random_range(0.0..1.0);
            let signal = (0..len)
                .map(|_| {
                    if rng.random_bool(density) {
                        rng.random_range(-1.0..=1.0)
                    } else {
                        0.0
                    }
                })
                .collect::<Vec<f32>>();
            let signature = Signature::of(&signal);
            let level = saturation_level(&signal);
            let expected = signal.iter().map(|&x| x > level).collect::<Vec<_>>();

            check!(signature.len() == signal.len());
            check!(signature.runs.iter().all(|&run| run > 0));
            check!(signature.starts_high == expected[0]);
            check!(signature.bits().collect::<Vec<_>>() == expected);
        }
    }

    #[test]
    fn empty_signal() {
        let signature = Signature::of(&[]);
        check!(signature.is_empty());
        check!(signature.len() == 0);
    }
}
