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

//! **beat-finder** finds the repeating beat events in a pre-filtered
//! amplitude signal, such as the envelope of a heart sound recording.
//!
//! The library is `no_std`-compatible but needs `alloc`.
//!
//! ## How it works
//!
//! 1. Unless a rate guess is given, a coarse threshold pass finds a rough
//!    events-per-minute estimate ([`estimate_rough`]).
//! 2. The [`ThresholdRefiner`] sweeps a threshold multiplier downwards. For
//!    each multiplier, the [`PeakDetector`] finds the falling edges of the
//!    pulses above the threshold, and the [`RateClassifier`] judges whether
//!    the resulting rate fits the nominal rate. Implausible rates lead to
//!    corrective reprocessing via a [`SignalConditioner`].
//! 3. Within the found beats, [`find_secondary_events`] searches denser
//!    sound components.
//! 4. [`BeatFinder::estimate`] repeats this with growing rate guesses as
//!    long as the result keeps improving.
//!
//! All results are heuristic estimates, not guarantees.
//!
//! ## Example
//! ```rust
//! use beat_finder::BeatFinder;
//!
//! let signal = (0..30_000)
//!     .map(|i| if i % 750 < 60 { 0.8 } else { 0.0 })
//!     .collect::<Vec<f32>>();
//!
//! let mut finder = BeatFinder::new();
//! let analysis = finder.estimate(&signal, 1000, 80).unwrap();
//! assert_eq!(analysis.primary.len(), 40);
//! ```

#![no_std]
#![deny(missing_debug_implementations)]

#[macro_use]
extern crate alloc;
#[cfg(test)]
extern crate std;

#[cfg(test)]
#[macro_use]
extern crate assert2;
#[cfg(test)]
#[macro_use]
extern crate float_cmp;

mod beat_finder;
mod classifier;
mod conditioning;
mod config;
mod error;
mod event;
mod peak_detector;
mod refiner;
mod rough;
mod secondary;
mod signature;
mod stats;
mod window;

#[cfg(test)]
mod test_utils;

pub use beat_finder::{Analysis, BeatFinder};
pub use classifier::{RateBands, RateClassifier, Verdict};
pub use conditioning::{DefaultConditioner, SignalConditioner};
pub use config::{
    FinderConfig, SpacingRules, DETECTION_WINDOW, DOWN_SAMPLE_TARGET_LEN, EARLY_GAP_S, LATE_GAP_S,
    MAX_RATE_ATTEMPTS, MAX_REWINDS, RATE_GROWTH, ROUGH_WINDOW,
};
pub use error::InvalidInputError;
pub use event::Event;
pub use peak_detector::{DetectionPass, PeakDetector};
pub use refiner::{
    start_multiplier, MultiplierSchedule, RefineVerdict, Refinement, ThresholdRefiner,
    INITIAL_MULTIPLIER, MIN_MULTIPLIER,
};
pub use rough::{estimate_rough, RoughEstimate};
pub use secondary::find_secondary_events;
pub use signature::Signature;
pub use stats::SignalStatistics;
pub use window::trailing_average;
