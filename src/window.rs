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

//! Trailing-window average used by all detectors of this crate.

/// Averages the **positive** samples in `signal[index - window_len..index]`.
///
/// The window is clamped to the bounds of the signal. An `index` smaller
/// than `window_len` is treated as `window_len`, i.e., the first window of
/// the signal is used. Negative samples are ignored, which suppresses
/// negative-going noise while tracking the rising edge of a pulse.
///
/// If the window holds no positive sample, the last sample of the whole
/// signal is returned. Callers rely on this quirk: on a signal with a zero
/// baseline this yields `0.0` behind a pulse.
///
/// Returns `0.0` for an empty signal.
pub fn trailing_average(signal: &[f32], index: usize, window_len: usize) -> f32 {
    let Some(&last) = signal.last() else {
        return 0.0;
    };

    let end = index.max(window_len).min(signal.len());
    let begin = end.saturating_sub(window_len);

    let (sum, count) = signal[begin..end]
        .iter()
        .filter(|&&x| x > 0.0)
        .fold((0.0_f32, 0_usize), |(sum, count), &x| (sum + x, count + 1));

    if count > 0 {
        sum / count as f32
    } else {
        last
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn averages_only_positive_samples() {
        let signal = [1.0, -1.0, 0.5, 0.0, 0.25];
        check!(approx_eq!(f32, trailing_average(&signal, 3, 3), 0.75));
        check!(approx_eq!(f32, trailing_average(&signal, 5, 2), 0.25));
    }

    #[test]
    fn falls_back_to_last_sample() {
        let signal = [0.0, -0.5, -0.5, 0.0, -0.1];
        check!(trailing_average(&signal, 4, 4) == -0.1);
        check!(trailing_average(&[], 4, 4) == 0.0);
    }

    #[test]
    fn window_is_clamped_to_signal() {
        let signal = [0.2, 0.4, 0.0, 0.0];
        // index below window length: first window
        check!(approx_eq!(f32, trailing_average(&signal, 1, 2), 0.3));
        // index beyond the end
        check!(approx_eq!(f32, trailing_average(&signal, 100, 4), 0.3));
        check!(trailing_average(&signal, 100, 2) == 0.0);
    }
}
