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

//! Module for [`ThresholdRefiner`]: the sweep over threshold multipliers.

use crate::classifier::{RateBands, RateClassifier, Verdict};
use crate::conditioning::SignalConditioner;
use crate::config::FinderConfig;
use crate::peak_detector::PeakDetector;
use crate::stats::SignalStatistics;
use crate::Event;
use alloc::borrow::Cow;
use alloc::vec::Vec;

/// Multiplier the sweep starts with when no rough estimate is involved.
pub const INITIAL_MULTIPLIER: f32 = 6.0;

/// The sweep ends once the multiplier drops to this value.
pub const MIN_MULTIPLIER: f32 = 0.05;

/// Bounds for a start multiplier derived from a rough threshold.
const START_MULTIPLIER_RANGE: (f32, f32) = (0.125, INITIAL_MULTIPLIER);

/// Coarse steps above a multiplier of `1.0`, fine steps below.
const COARSE_STEP: f32 = 0.5;
const FINE_STEP: f32 = 0.125;

/// The sequence of threshold multipliers of one sweep.
///
/// Decreases by `0.5` while the value is above `1.0` and by `0.125`
/// afterwards. Ends once the value is `<= 0.05`. The start value is always
/// yielded if it is above that bound.
#[derive(Debug, Clone, Copy)]
pub struct MultiplierSchedule {
    next: f32,
}

impl MultiplierSchedule {
    pub const fn new(start: f32) -> Self {
        Self { next: start }
    }
}

impl Iterator for MultiplierSchedule {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        // also catches NaN
        if !(self.next > MIN_MULTIPLIER) {
            return None;
        }
        let current = self.next;
        self.next -= if current > 1.0 { COARSE_STEP } else { FINE_STEP };
        Some(current)
    }
}

/// Derives the start multiplier from an absolute threshold, by inverting
/// the blend of mean and peak.
pub fn start_multiplier(stats: &SignalStatistics, threshold: f32) -> f32 {
    let (min, max) = START_MULTIPLIER_RANGE;
    stats
        .multiplier_for(threshold)
        .map_or(max, |multiplier| multiplier.clamp(min, max))
}

/// How a sweep ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefineVerdict {
    /// The event rate was accepted by the classifier.
    Accepted,
    /// The event count stopped changing.
    Stalled,
    /// All multipliers were tried. The result is the best-effort candidate.
    Exhausted,
}

/// Corrective action taken on the working signal during a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Correction {
    DownSample,
    Normalize,
}

/// Result of one sweep of the [`ThresholdRefiner`].
#[derive(Debug, Clone, PartialEq)]
pub struct Refinement {
    /// The primary events. Timestamps index into [`Self::signal`].
    pub events: Vec<Event>,
    /// How the sweep ended.
    pub verdict: RefineVerdict,
    /// Multiplier of the last iteration.
    pub multiplier: f32,
    /// The working signal at the end of the sweep. Differs from the input
    /// if a corrective action was taken.
    pub signal: Vec<f32>,
    /// Statistics (clamped) of [`Self::signal`].
    pub stats: SignalStatistics,
    /// Sampling rate of [`Self::signal`].
    pub sampling_rate: f32,
    /// Number of down-sampling corrections.
    pub resample_count: usize,
    /// Number of amplitude normalizations.
    pub normalize_count: usize,
}

/// Sweeps the threshold multiplier downwards, runs the [`PeakDetector`] for
/// each multiplier, and lets the [`RateClassifier`] judge the result.
///
/// Rates outside the plausible band trigger corrective reprocessing of the
/// working signal: too many events lead to down-sampling, too few events to
/// amplitude normalization. The refiner owns the working signal and replaces
/// it; the caller's signal is never touched.
#[derive(Debug)]
pub struct ThresholdRefiner<'a, C: SignalConditioner> {
    config: &'a FinderConfig,
    conditioner: &'a mut C,
}

impl<'a, C: SignalConditioner> ThresholdRefiner<'a, C> {
    pub fn new(config: &'a FinderConfig, conditioner: &'a mut C) -> Self {
        Self {
            config,
            conditioner,
        }
    }

    /// Runs one sweep.
    ///
    /// `nominal_rate` seeds the [`RateBands`], `start` is the first
    /// multiplier, `duration_s` is the (non-zero) duration of the signal.
    pub fn refine(
        &mut self,
        signal: &[f32],
        sampling_rate: u32,
        nominal_rate: f32,
        start: f32,
        duration_s: f32,
    ) -> Refinement {
        debug_assert!(duration_s > 0.0);

        let mut working = Cow::Borrowed(signal);
        let mut stats = SignalStatistics::compute(&working).clamped();
        let mut rules = self.config.spacing_rules(sampling_rate);
        let mut effective_sampling_rate = sampling_rate as f32;
        let mut resample_count = 0;
        let mut normalize_count = 0;

        let bands = RateBands::new(nominal_rate);
        let mut classifier = RateClassifier::new(bands);
        let mut last_events = Vec::new();
        let mut last_multiplier = start;

        for multiplier in MultiplierSchedule::new(start) {
            last_multiplier = multiplier;
            let threshold = stats.blend(multiplier);
            let detector =
                PeakDetector::new(rules, self.config.detection_window, self.config.max_rewinds);
            let events = detector.detect(&working, threshold).events;
            let events_per_minute = events.len() as f32 * 60.0 / duration_s;
            log::debug!(
                "multiplier {multiplier}: threshold {threshold}, {} events, {events_per_minute} per minute",
                events.len()
            );

            if bands.is_plausible(events_per_minute) {
                let verdict = match classifier.classify(events_per_minute, events) {
                    Verdict::Accepted(events) => Some((events, RefineVerdict::Accepted)),
                    Verdict::Stalled(events) => Some((events, RefineVerdict::Stalled)),
                    Verdict::Continue(events) => {
                        last_events = events;
                        None
                    }
                };
                if let Some((events, verdict)) = verdict {
                    return Refinement {
                        events,
                        verdict,
                        multiplier,
                        signal: working.into_owned(),
                        stats,
                        sampling_rate: effective_sampling_rate,
                        resample_count,
                        normalize_count,
                    };
                }
                continue;
            }

            let correction = if events.len() as f32 > duration_s * 4.0 {
                Some(Correction::DownSample)
            } else if (events.len() as f32) < duration_s / 3.0 {
                Some(Correction::Normalize)
            } else {
                None
            };
            last_events = events;

            match correction {
                Some(Correction::DownSample) if working.len() > self.config.down_sample_target_len => {
                    let old_len = working.len();
                    let reduced = self.conditioner.down_sample(
                        &working,
                        effective_sampling_rate,
                        self.config.down_sample_target_len,
                    );
                    if reduced.is_empty() || reduced.len() >= old_len {
                        log::warn!("down-sampling did not reduce the signal, ignoring it");
                        continue;
                    }
                    let new_len = reduced.len();
                    log::warn!("too many events, down-sampling signal from {old_len} to {new_len} samples");

                    rules = rules.rescaled(old_len, new_len);
                    effective_sampling_rate *= new_len as f32 / old_len as f32;
                    for event in &mut last_events {
                        event.timestamp = event.timestamp * new_len / old_len;
                    }
                    // Earlier candidates refer to the old signal.
                    classifier = RateClassifier::new(bands);
                    working = Cow::Owned(reduced);
                    stats = SignalStatistics::compute(&working).clamped();
                    resample_count += 1;
                }
                Some(Correction::Normalize) if stats.max_abs > 0.0 => {
                    log::warn!("too few events, normalizing signal amplitude");
                    let normalized = self.conditioner.normalize_amplitude(&working);
                    if normalized.len() != working.len() {
                        log::warn!("normalization changed the signal length, ignoring it");
                        continue;
                    }
                    working = Cow::Owned(normalized);
                    stats = SignalStatistics::compute(&working).clamped();
                    normalize_count += 1;
                }
                _ => {}
            }
        }

        let events = classifier.take_candidate().unwrap_or(last_events);
        log::debug!("multipliers exhausted, {} candidate events", events.len());
        Refinement {
            events,
            verdict: RefineVerdict::Exhausted,
            multiplier: last_multiplier,
            signal: working.into_owned(),
            stats,
            sampling_rate: effective_sampling_rate,
            resample_count,
            normalize_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conditioning::DefaultConditioner;
    use crate::test_utils::{init_logger, pulse_train, PulseTrain};
    use itertools::Itertools;

    #[test]
    fn schedule_from_initial_multiplier() {
        let schedule = MultiplierSchedule::new(INITIAL_MULTIPLIER).collect::<Vec<_>>();

        check!(schedule.first() == Some(&6.0));
        check!(schedule.last() == Some(&0.125));
        // 6.0..=1.5 in 0.5 steps, then 1.0..=0.125 in 0.125 steps
        check!(schedule.len() == 10 + 8);
        check!(schedule.iter().tuple_windows().all(|(a, b)| b < a));
        check!(schedule.iter().all(|&m| m > MIN_MULTIPLIER));
    }

    #[test]
    fn schedule_from_low_start() {
        // 0.4, 0.275, 0.15
        let schedule = MultiplierSchedule::new(0.4).collect::<Vec<_>>();
        check!(schedule.len() == 3);
        check!(schedule.iter().tuple_windows().all(|(a, b)| b < a));

        check!(MultiplierSchedule::new(0.05).next().is_none());
        check!(MultiplierSchedule::new(f32::NAN).next().is_none());
    }

    #[test]
    fn start_multiplier_inverts_blend() {
        let stats = SignalStatistics {
            mean_abs: 0.1,
            max_abs: 0.9,
        };
        check!(approx_eq!(f32, start_multiplier(&stats, 0.7), 3.0, epsilon = 0.0001));
        check!(start_multiplier(&stats, 0.05) == 0.125);
        check!(start_multiplier(&stats, 0.95) == INITIAL_MULTIPLIER);
    }

    #[test]
    fn accepts_clean_pulse_train() {
        let signal = pulse_train(PulseTrain {
            len: 20_000,
            period: 1000,
            width: 80,
            offset: 400,
            ..Default::default()
        });
        let config = FinderConfig::default();
        let mut conditioner = DefaultConditioner;
        let refinement = ThresholdRefiner::new(&config, &mut conditioner).refine(
            &signal,
            1000,
            60.0,
            INITIAL_MULTIPLIER,
            20.0,
        );

        check!(refinement.verdict == RefineVerdict::Accepted);
        check!(refinement.multiplier == INITIAL_MULTIPLIER);
        check!(refinement.events.len() == 20);
        check!(refinement.signal == signal);
        check!(refinement.resample_count == 0);
        check!(refinement.normalize_count == 0);
    }

    #[test]
    fn stalls_when_rate_does_not_fit_nominal_rate() {
        // 60 bpm, but 100 bpm were announced: 60 is plausible, not acceptable
        let signal = pulse_train(PulseTrain {
            len: 20_000,
            period: 1000,
            width: 80,
            offset: 400,
            ..Default::default()
        });
        let config = FinderConfig::default();
        let mut conditioner = DefaultConditioner;
        let refinement = ThresholdRefiner::new(&config, &mut conditioner).refine(
            &signal,
            1000,
            100.0,
            INITIAL_MULTIPLIER,
            20.0,
        );

        check!(refinement.verdict == RefineVerdict::Stalled);
        // three iterations with the same result
        check!(refinement.multiplier == 5.0);
        check!(refinement.events.len() == 20);
    }

    #[test]
    fn normalizes_signal_without_events() {
        // a single pulse in 20 s: too few events at every threshold
        let mut signal = vec![0.0; 20_000];
        signal[5000..5100].fill(0.5);

        let config = FinderConfig::default();
        let mut conditioner = DefaultConditioner;
        let refinement = ThresholdRefiner::new(&config, &mut conditioner).refine(
            &signal,
            1000,
            60.0,
            INITIAL_MULTIPLIER,
            20.0,
        );

        check!(refinement.verdict == RefineVerdict::Exhausted);
        check!(refinement.normalize_count > 0);
        check!(refinement.resample_count == 0);
        check!(refinement.events.len() <= 1);
        check!(refinement.signal.len() == signal.len());
    }

    #[test]
    fn down_samples_signal_with_too_many_events() {
        init_logger();
        // a 10 Hz pulse train: 600 events per minute
        let signal = pulse_train(PulseTrain {
            len: 20_000,
            period: 100,
            width: 20,
            offset: 10,
            ..Default::default()
        });
        let config = FinderConfig {
            early_gap_s: 0.05,
            late_gap_s: 0.15,
            ..Default::default()
        };
        let mut conditioner = DefaultConditioner;
        let refinement = ThresholdRefiner::new(&config, &mut conditioner).refine(
            &signal,
            1000,
            60.0,
            INITIAL_MULTIPLIER,
            20.0,
        );

        check!(refinement.resample_count >= 1);
        check!(refinement.signal.len() <= config.down_sample_target_len);
        check!(refinement.sampling_rate < 1000.0);
        check!(refinement
            .events
            .iter()
            .all(|event| event.timestamp < refinement.signal.len()));
    }
}
