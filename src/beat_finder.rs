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

//! Module for [`BeatFinder`].

use crate::conditioning::{DefaultConditioner, SignalConditioner};
use crate::config::FinderConfig;
use crate::error::validate_signal;
use crate::refiner::{start_multiplier, RefineVerdict, Refinement, ThresholdRefiner, INITIAL_MULTIPLIER};
use crate::rough::estimate_rough;
use crate::secondary::find_secondary_events;
use crate::signature::Signature;
use crate::stats::SignalStatistics;
use crate::{Event, InvalidInputError};
use alloc::vec::Vec;

/// The secondary search aims for this many events per primary event, to
/// catch up to four heart sounds (S1 to S4) per beat.
const SECONDARY_OVERSAMPLING: usize = 4;

/// Threshold multiplier for the secondary search if the sweep didn't end
/// with an accepted rate.
const SECONDARY_FALLBACK_MULTIPLIER: f32 = 2.0;

/// The outer loop continues only while the primary event count exceeds this
/// share of the rate guess.
const MIN_PRIMARY_SHARE_OF_GUESS: f32 = 0.7;

/// Result of [`BeatFinder::estimate`] or [`BeatFinder::refine_at_rate`].
///
/// All event timestamps index into [`Self::normalized_signal`]. The result is
/// a heuristic estimate: check [`Self::verdict`] and the correction counters
/// to judge the quality of the recording.
#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    /// The principal beat events (S1-class).
    pub primary: Vec<Event>,
    /// Denser set of candidate sound components within the beats.
    pub secondary: Vec<Event>,
    /// The signal the events were found in.
    pub normalized_signal: Vec<f32>,
    /// Sampling rate of [`Self::normalized_signal`].
    pub sampling_rate: f32,
    /// Duration of the analyzed signal in seconds.
    pub duration_s: f32,
    /// Nominal rate the rate bands of the last sweep were derived from.
    pub nominal_rate: f32,
    /// Threshold multiplier of the last sweep iteration.
    pub multiplier: f32,
    /// How the last sweep ended.
    pub verdict: RefineVerdict,
    /// Number of down-sampling corrections over all passes.
    pub resample_count: usize,
    /// Number of amplitude normalizations over all passes.
    pub normalize_count: usize,
    /// Number of passes of the outer rate loop.
    pub passes: usize,
}

impl Analysis {
    /// Rate of the primary events in events per minute.
    pub fn beats_per_minute(&self) -> f32 {
        self.primary.len() as f32 * 60.0 / self.duration_s
    }

    /// Distances in samples between consecutive primary events.
    pub fn intervals(&self) -> impl Iterator<Item = usize> + '_ {
        self.primary
            .windows(2)
            .map(|pair| pair[1].timestamp - pair[0].timestamp)
    }
}

/// Finds repeating beat events in a pre-filtered amplitude signal.
///
/// The signal is expected to be low-pass filtered and roughly normalized to
/// `-1.0..=1.0`. The finder keeps the result of the latest analysis; one
/// finder serves one analysis at a time.
///
/// ## Example
/// ```rust
/// use beat_finder::BeatFinder;
///
/// // 20 s of a 60 bpm pulse train, sampled at 1 kHz
/// let signal = (0..20_000)
///     .map(|i| if i % 1000 < 80 { 1.0 } else { 0.0 })
///     .collect::<Vec<f32>>();
///
/// let mut finder = BeatFinder::new();
/// finder.estimate(&signal, 1000, 60).unwrap();
/// assert_eq!(finder.primary_events().len(), 20);
/// ```
#[derive(Debug)]
pub struct BeatFinder<C: SignalConditioner = DefaultConditioner> {
    config: FinderConfig,
    conditioner: C,
    analysis: Option<Analysis>,
}

impl BeatFinder {
    /// Creates a finder with the default configuration.
    pub fn new() -> Self {
        Self {
            config: FinderConfig::default(),
            conditioner: DefaultConditioner,
            analysis: None,
        }
    }

    /// Creates a finder with a custom configuration.
    pub fn with_config(config: FinderConfig) -> Result<Self, InvalidInputError> {
        Self::with_conditioner(config, DefaultConditioner)
    }
}

impl Default for BeatFinder {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: SignalConditioner> BeatFinder<C> {
    /// Creates a finder that uses a custom [`SignalConditioner`] for
    /// corrective reprocessing.
    pub fn with_conditioner(config: FinderConfig, conditioner: C) -> Result<Self, InvalidInputError> {
        config.validate()?;
        Ok(Self {
            config,
            conditioner,
            analysis: None,
        })
    }

    /// Searches the beats of the signal.
    ///
    /// Starting from `heart_rate_guess` (beats per minute, `0` if unknown,
    /// then a rough estimate takes its place), this runs a threshold sweep,
    /// grows the rate by 50 %, and repeats
    /// while the secondary event set keeps growing, at most three passes,
    /// and only as long as the primary event count exceeds 70 % of the
    /// guess. The last pass is the result.
    pub fn estimate(
        &mut self,
        signal: &[f32],
        sampling_rate: u32,
        heart_rate_guess: u32,
    ) -> Result<&Analysis, InvalidInputError> {
        let duration_s = validate_signal(signal, sampling_rate)?;

        let mut rate = heart_rate_guess as f32;
        let mut resample_count = 0;
        let mut normalize_count = 0;
        let mut passes = 0;
        let mut previous_secondary = 0;

        let analysis = loop {
            let mut analysis = self.analyze(signal, sampling_rate, rate, duration_s);
            passes += 1;
            resample_count += analysis.resample_count;
            normalize_count += analysis.normalize_count;

            let secondary_grew = analysis.secondary.len() > previous_secondary;
            let enough_primary =
                analysis.primary.len() as f32 > heart_rate_guess as f32 * MIN_PRIMARY_SHARE_OF_GUESS;
            log::debug!(
                "pass #{passes} at {rate} bpm: {} primary, {} secondary events",
                analysis.primary.len(),
                analysis.secondary.len()
            );

            if !(secondary_grew && enough_primary && passes < self.config.max_rate_attempts) {
                analysis.resample_count = resample_count;
                analysis.normalize_count = normalize_count;
                analysis.passes = passes;
                break analysis;
            }

            previous_secondary = analysis.secondary.len();
            // without a guess, the rough estimate of this pass is the new base
            rate = analysis.nominal_rate * self.config.rate_growth;
        };

        Ok(&*self.analysis.insert(analysis))
    }

    /// Runs a single threshold sweep at the given nominal rate (beats per
    /// minute, `0` if unknown) and searches the secondary events.
    pub fn refine_at_rate(
        &mut self,
        signal: &[f32],
        sampling_rate: u32,
        nominal_rate: u32,
    ) -> Result<&Analysis, InvalidInputError> {
        let duration_s = validate_signal(signal, sampling_rate)?;
        let analysis = self.analyze(signal, sampling_rate, nominal_rate as f32, duration_s);
        Ok(&*self.analysis.insert(analysis))
    }

    /// One pass: optional rough estimate, threshold sweep, secondary search.
    fn analyze(&mut self, signal: &[f32], sampling_rate: u32, rate: f32, duration_s: f32) -> Analysis {
        let (nominal_rate, start) = if rate >= 1.0 {
            (rate, INITIAL_MULTIPLIER)
        } else {
            let stats = SignalStatistics::compute(signal).clamped();
            let rough = estimate_rough(
                signal,
                self.config.spacing_rules(sampling_rate),
                self.config.rough_window,
                stats,
                duration_s,
            );
            (rough.rate as f32, start_multiplier(&stats, rough.threshold))
        };

        let Refinement {
            events: primary,
            verdict,
            multiplier,
            signal: normalized_signal,
            stats,
            sampling_rate: effective_sampling_rate,
            resample_count,
            normalize_count,
        } = ThresholdRefiner::new(&self.config, &mut self.conditioner).refine(
            signal,
            sampling_rate,
            nominal_rate,
            start,
            duration_s,
        );

        let secondary_multiplier = if verdict == RefineVerdict::Accepted {
            multiplier
        } else {
            SECONDARY_FALLBACK_MULTIPLIER
        };
        let secondary = find_secondary_events(
            &normalized_signal,
            stats.blend(secondary_multiplier),
            primary.len() * SECONDARY_OVERSAMPLING,
        );

        Analysis {
            primary,
            secondary,
            normalized_signal,
            sampling_rate: effective_sampling_rate,
            duration_s,
            nominal_rate,
            multiplier,
            verdict,
            resample_count,
            normalize_count,
            passes: 1,
        }
    }

    /// Returns the result of the latest analysis, if any.
    pub fn analysis(&self) -> Option<&Analysis> {
        self.analysis.as_ref()
    }

    /// Returns the primary events of the latest analysis.
    pub fn primary_events(&self) -> &[Event] {
        self.analysis.as_ref().map_or(&[], |a| &a.primary)
    }

    /// Returns the secondary events of the latest analysis.
    pub fn secondary_events(&self) -> &[Event] {
        self.analysis.as_ref().map_or(&[], |a| &a.secondary)
    }

    /// Returns the signal the latest events were found in.
    pub fn normalized_signal(&self) -> &[f32] {
        self.analysis.as_ref().map_or(&[], |a| &a.normalized_signal)
    }

    /// Number of down-sampling corrections of the latest analysis.
    pub fn resample_count(&self) -> usize {
        self.analysis.as_ref().map_or(0, |a| a.resample_count)
    }

    /// Number of amplitude normalizations of the latest analysis.
    pub fn normalize_count(&self) -> usize {
        self.analysis.as_ref().map_or(0, |a| a.normalize_count)
    }

    /// Returns the configuration.
    pub const fn config(&self) -> &FinderConfig {
        &self.config
    }

    /// Computes the run-length [`Signature`] of any signal. Independent of
    /// the state of the finder.
    pub fn signature(signal: &[f32]) -> Signature {
        Signature::of(signal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{init_logger, pulse_train, PulseTrain};
    use itertools::Itertools;

    fn check_periodic(analysis: &Analysis, expected_count: usize, period: usize) {
        let count = analysis.primary.len() as f32;
        let expected = expected_count as f32;
        check!((count - expected).abs() <= expected * 0.1, "count={count}");
        for interval in analysis.intervals() {
            let deviation = (interval as f32 - period as f32).abs();
            check!(deviation <= period as f32 * 0.2, "interval={interval}");
        }
    }

    #[test]
    fn is_send_and_sync() {
        fn accept<I: Send + Sync>() {}

        accept::<BeatFinder>();
    }

    #[test]
    fn recovers_periodic_pulses() {
        init_logger();
        let signal = pulse_train(PulseTrain {
            len: 20_000,
            period: 1000,
            width: 80,
            offset: 400,
            ..Default::default()
        });
        let mut finder = BeatFinder::new();
        let analysis = finder.estimate(&signal, 1000, 60).unwrap().clone();

        check_periodic(&analysis, 20, 1000);
        check!(analysis.verdict == RefineVerdict::Accepted);
        check!(analysis.passes == 1);
        check!(approx_eq!(f32, analysis.beats_per_minute(), 60.0, epsilon = 0.01));
        check!(finder.primary_events() == analysis.primary.as_slice());
        check!(finder.normalized_signal() == signal.as_slice());
    }

    #[test]
    fn recovers_noisy_periodic_pulses() {
        let signal = pulse_train(PulseTrain {
            len: 30_000,
            period: 750,
            width: 60,
            offset: 200,
            noise: 0.05,
            ..Default::default()
        });
        let mut finder = BeatFinder::new();
        let analysis = finder.estimate(&signal, 1000, 80).unwrap();

        check_periodic(analysis, 40, 750);
    }

    #[test]
    fn recovers_periodic_pulses_without_rate_guess() {
        for noise in [0.0, 0.05] {
            let signal = pulse_train(PulseTrain {
                len: 20_000,
                period: 1000,
                width: 80,
                offset: 400,
                noise,
                ..Default::default()
            });
            let mut finder = BeatFinder::new();
            let analysis = finder.estimate(&signal, 1000, 0).unwrap();

            check_periodic(analysis, 20, 1000);
            check!(analysis.nominal_rate >= 50.0);
            check!(analysis.nominal_rate <= 150.0);
        }
    }

    #[test]
    fn rough_rate_seeds_following_passes() {
        let signal = pulse_train(PulseTrain {
            len: 20_000,
            period: 1000,
            width: 80,
            offset: 400,
            ..Default::default()
        });
        let mut first_pass = BeatFinder::new();
        let rough_rate = first_pass.refine_at_rate(&signal, 1000, 0).unwrap().nominal_rate;
        check!(rough_rate == 60.0);

        let mut finder = BeatFinder::new();
        let analysis = finder.estimate(&signal, 1000, 0).unwrap();
        check!(analysis.passes >= 2);
        // a later pass runs at a grown rate instead of repeating the first one
        check!(analysis.nominal_rate >= rough_rate * 1.5);
        check_periodic(analysis, 20, 1000);
    }

    #[test]
    fn finds_secondary_events_within_beats() {
        let signal = pulse_train(PulseTrain {
            len: 20_000,
            period: 1000,
            width: 80,
            offset: 400,
            ..Default::default()
        });
        let mut finder = BeatFinder::new();
        finder.refine_at_rate(&signal, 1000, 60).unwrap();

        let secondary = finder.secondary_events();
        check!(secondary.len() >= finder.primary_events().len());
        check!(secondary
            .iter()
            .tuple_windows()
            .all(|(a, b)| a.timestamp < b.timestamp));
    }

    #[test]
    fn outer_loop_continues_on_long_recordings() {
        init_logger();
        // 90 s at 60 bpm: 90 primary events > 0.7 * 60
        let signal = pulse_train(PulseTrain {
            len: 90_000,
            period: 1000,
            width: 80,
            offset: 400,
            ..Default::default()
        });
        let mut finder = BeatFinder::new();
        let analysis = finder.estimate(&signal, 1000, 60).unwrap();

        check!(analysis.passes >= 2);
        check!(analysis.passes <= 3);
        check_periodic(analysis, 90, 1000);
    }

    #[test]
    fn zero_length_signal_is_rejected() {
        let mut finder = BeatFinder::new();
        check!(finder.estimate(&[], 1000, 60) == Err(InvalidInputError::EmptySignal));
        check!(finder.refine_at_rate(&[], 1000, 60) == Err(InvalidInputError::EmptySignal));
        check!(finder.estimate(&[0.0; 100], 0, 60) == Err(InvalidInputError::ZeroSamplingRate));
        check!(matches!(
            finder.estimate(&[0.5], u32::MAX, 60),
            Err(InvalidInputError::ZeroDuration { .. })
        ));
        check!(finder.analysis().is_none());
        check!(finder.primary_events().is_empty());
    }

    #[test]
    fn silence_yields_no_events() {
        let mut finder = BeatFinder::new();
        let analysis = finder.estimate(&[0.0; 10_000], 1000, 60).unwrap();

        check!(analysis.primary.is_empty());
        check!(analysis.secondary.is_empty());
        check!(analysis.verdict == RefineVerdict::Exhausted);
        check!(analysis.normalize_count == 0);
    }

    #[test]
    fn signature_is_independent_of_state() {
        let signal = pulse_train(PulseTrain {
            len: 4000,
            period: 1000,
            width: 100,
            offset: 0,
            ..Default::default()
        });
        let signature = BeatFinder::<DefaultConditioner>::signature(&signal);
        check!(signature.starts_high);
        check!(signature.len() == signal.len());
        check!(signature.runs == [100, 900, 100, 900, 100, 900, 100, 900]);
    }
}
