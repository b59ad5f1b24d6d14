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

//! Synthetic test signals.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::vec::Vec;

/// Parameters of [`pulse_train`]. All lengths are in samples.
#[derive(Debug, Clone, Copy)]
pub struct PulseTrain {
    pub len: usize,
    pub period: usize,
    pub width: usize,
    /// Begin of the first pulse.
    pub offset: usize,
    pub amplitude: f32,
    /// Uniform noise in `-noise..=noise` on every sample.
    pub noise: f32,
    pub seed: u64,
}

impl Default for PulseTrain {
    fn default() -> Self {
        Self {
            len: 10_000,
            period: 1000,
            width: 100,
            offset: 0,
            amplitude: 1.0,
            noise: 0.0,
            seed: 0x1337,
        }
    }
}

/// Rectangular pulses of `amplitude` on a zero baseline. Only complete
/// pulses are part of the signal.
pub fn pulse_train(params: PulseTrain) -> Vec<f32> {
    let mut signal = vec![0.0; params.len];

    let mut begin = params.offset;
    while begin + params.width <= params.len {
        signal[begin..begin + params.width].fill(params.amplitude);
        begin += params.period.max(1);
    }

    if params.noise > 0.0 {
        let mut rng = StdRng::seed_from_u64(params.seed);
        signal
            .iter_mut()
            .for_each(|x| *x += rng.random_range(-params.noise..=params.noise));
    }

    signal
}

/// Initializes logging for a test. Only the first call of the test binary
/// has an effect.
pub fn init_logger() {
    let _ = simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Trace)
        .init();
}

#[test]
fn pulse_train_has_complete_pulses_only() {
    let signal = pulse_train(PulseTrain {
        len: 2500,
        period: 1000,
        width: 600,
        offset: 100,
        ..Default::default()
    });
    // pulses at 100 and 1100, the one at 2100 would be cut
    check!(signal.iter().filter(|&&x| x == 1.0).count() == 1200);
    check!(signal[2100..].iter().all(|&x| x == 0.0));
}
