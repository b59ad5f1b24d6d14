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

//! Judges whether a detected event rate is plausible for a nominal rate.

use crate::Event;
use alloc::vec::Vec;

/// Band edges relative to the nominal rate `n`. For `n = 60` these are
/// 25, 50, 80, and 160 events per minute.
const FLOOR_LOW: f32 = 0.41675;
const FLOOR_HIGH: f32 = 0.83335;
const CEILING_LOW: f32 = 1.33335;
const CEILING_HIGH: f32 = 2.6667;

/// Plausibility bands of events per minute, derived from a nominal rate.
///
/// ```text
/// 0 ... floor_low ... floor_high ... ceiling_low ... ceiling_high ...
///       |------------------- plausible -------------------|
///                     |------ acceptable -----|
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateBands {
    pub floor_low: f32,
    pub floor_high: f32,
    pub ceiling_low: f32,
    pub ceiling_high: f32,
}

impl RateBands {
    /// Derives the bands from a nominal rate.
    pub fn new(nominal_rate: f32) -> Self {
        Self {
            floor_low: nominal_rate * FLOOR_LOW,
            floor_high: nominal_rate * FLOOR_HIGH,
            ceiling_low: nominal_rate * CEILING_LOW,
            ceiling_high: nominal_rate * CEILING_HIGH,
        }
    }

    /// Whether the rate is worth a closer look by the [`RateClassifier`].
    pub fn is_plausible(&self, events_per_minute: f32) -> bool {
        self.floor_low < events_per_minute && events_per_minute < self.ceiling_high
    }

    /// Whether the rate is accepted without further ado.
    pub fn is_acceptable(&self, events_per_minute: f32) -> bool {
        self.floor_high < events_per_minute && events_per_minute < self.ceiling_low
    }
}

/// Verdict of the [`RateClassifier`] for one threshold iteration.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// The events are a good estimate. Stop refining.
    Accepted(Vec<Event>),
    /// The last iterations found the same number of events. Further
    /// refinement won't change anything; these are the best candidates.
    Stalled(Vec<Event>),
    /// Not convincing yet. The events are kept as fallback candidates.
    Continue(Vec<Event>),
}

/// Classifies the event sets of successive threshold iterations.
///
/// Besides the plain band check, the classifier remembers the event counts
/// of the two previous iterations to recognize convergence and stalls.
#[derive(Debug, Clone)]
pub struct RateClassifier {
    bands: RateBands,
    previous: Option<usize>,
    before_previous: Option<usize>,
    candidate: Option<Vec<Event>>,
}

impl RateClassifier {
    /// Creates a classifier without history.
    pub const fn new(bands: RateBands) -> Self {
        Self {
            bands,
            previous: None,
            before_previous: None,
            candidate: None,
        }
    }

    /// Returns the bands the classifier judges against.
    pub const fn bands(&self) -> &RateBands {
        &self.bands
    }

    /// Judges the events of one iteration.
    pub fn classify(&mut self, events_per_minute: f32, events: Vec<Event>) -> Verdict {
        if self.bands.is_acceptable(events_per_minute) {
            return Verdict::Accepted(events);
        }

        let count = events.len();
        if let (Some(previous), Some(before_previous)) = (self.previous, self.before_previous) {
            let last_delta = previous as i64 - before_previous as i64;
            let delta = count as i64 - previous as i64;
            if previous > 0 && last_delta > 0 && delta > last_delta {
                log::debug!("event count converged: {before_previous} -> {previous} -> {count}");
                return Verdict::Accepted(events);
            }
            if count == previous && count == before_previous {
                log::debug!("event count stalled at {count}");
                self.candidate = Some(events.clone());
                return Verdict::Stalled(events);
            }
        }

        self.before_previous = self.previous;
        self.previous = Some(count);
        self.candidate = Some(events.clone());
        Verdict::Continue(events)
    }

    /// Takes the best-effort candidate of the previous iterations.
    pub fn take_candidate(&mut self) -> Option<Vec<Event>> {
        self.candidate.take()
    }
}
