//! Descriptive statistics over per-frame sample sequences.
//!
//! Everything here works at full precision. Rounding to two places happens
//! only when a [`SummaryRecord`] is handed to a writer (see [`SummaryRecord::rounded`]).

use std::{fmt, fmt::Display};

use crate::contract::METRIC_COUNT;
use crate::{IterationResult, Metric};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SummaryRecord {
    pub count: usize,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub q1: f64,
    pub q2: f64,
    pub q3: f64,
    pub std_dev: f64,
}

impl SummaryRecord {
    /// Values in presentation order: mean, min, max, q1, q2, q3, stdev.
    #[must_use]
    pub fn values(&self) -> [f64; 7] {
        [
            self.mean,
            self.min,
            self.max,
            self.q1,
            self.q2,
            self.q3,
            self.std_dev,
        ]
    }

    #[must_use]
    pub fn rounded(&self) -> Self {
        Self {
            count: self.count,
            mean: round2(self.mean),
            min: round2(self.min),
            max: round2(self.max),
            q1: round2(self.q1),
            q2: round2(self.q2),
            q3: round2(self.q3),
            std_dev: round2(self.std_dev),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

impl Display for SummaryRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "n={}, mean={:.2}, min={:.2}, max={:.2}, q1={:.2}, q2={:.2}, q3={:.2}, stdev={:.2}",
            self.count, self.mean, self.min, self.max, self.q1, self.q2, self.q3, self.std_dev
        )
    }
}

/// Reduces a sample sequence to its summary.
///
/// An empty sequence yields the all-zero record with `count == 0`; a single
/// sample yields `std_dev == 0.0`. The input is not reordered.
#[must_use]
pub fn summarize(samples: &[f64]) -> SummaryRecord {
    if samples.is_empty() {
        return SummaryRecord::default();
    }

    let mut sorted = samples.to_vec();
    sorted.sort_by(f64::total_cmp);

    SummaryRecord {
        count: sorted.len(),
        mean: mean(&sorted),
        min: sorted[0],
        max: sorted[sorted.len() - 1],
        q1: percentile(&sorted, 25.0),
        q2: percentile(&sorted, 50.0),
        q3: percentile(&sorted, 75.0),
        std_dev: sample_std_dev(&sorted).unwrap_or(0.0),
    }
}

fn mean(samples: &[f64]) -> f64 {
    samples.iter().sum::<f64>() / samples.len() as f64
}

/// Percentile of an ascending slice, interpolating linearly between the
/// two closest ranks. Returns 0.0 for an empty slice.
#[must_use]
pub fn percentile(sorted: &[f64], percentile: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let rank = (percentile.clamp(0.0, 100.0) / 100.0) * (n - 1) as f64;
            let lower = rank.floor() as usize;
            let upper = rank.ceil() as usize;
            let weight = rank - lower as f64;
            sorted[lower] + (sorted[upper] - sorted[lower]) * weight
        }
    }
}

/// Sample standard deviation (n - 1 divisor). `None` below two samples.
#[must_use]
pub fn sample_std_dev(samples: &[f64]) -> Option<f64> {
    if samples.len() < 2 {
        return None;
    }
    let m = mean(samples);
    let variance =
        samples.iter().map(|x| (*x - m).powi(2)).sum::<f64>() / (samples.len() - 1) as f64;
    Some(variance.sqrt())
}

#[must_use]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Per-iteration summaries of one decoder variant, rolled up at report time.
#[derive(Debug, Clone, Default)]
pub struct BenchmarkResult {
    per_metric: [Vec<SummaryRecord>; METRIC_COUNT],
}

impl BenchmarkResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Summarizes every metric of a finished run and keeps the summaries.
    pub fn store(&mut self, result: &IterationResult) {
        for (metric, samples) in result.iter() {
            self.per_metric[metric.index()].push(summarize(samples));
        }
    }

    #[must_use]
    pub fn iterations(&self) -> usize {
        self.per_metric[0].len()
    }

    #[must_use]
    pub fn summaries(&self, metric: Metric) -> &[SummaryRecord] {
        &self.per_metric[metric.index()]
    }

    /// Cross-iteration view: mean of means, min of mins, max of maxes and the
    /// mean of the remaining components. Iterations that recorded nothing are
    /// ignored.
    #[must_use]
    pub fn rollup(&self, metric: Metric) -> SummaryRecord {
        let filled = self
            .summaries(metric)
            .iter()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();
        if filled.is_empty() {
            return SummaryRecord::default();
        }

        let avg = |pick: fn(&SummaryRecord) -> f64| {
            filled.iter().map(|s| pick(s)).sum::<f64>() / filled.len() as f64
        };
        SummaryRecord {
            count: filled.iter().map(|s| s.count).sum(),
            mean: avg(|s| s.mean),
            min: filled.iter().map(|s| s.min).fold(f64::INFINITY, f64::min),
            max: filled
                .iter()
                .map(|s| s.max)
                .fold(f64::NEG_INFINITY, f64::max),
            q1: avg(|s| s.q1),
            q2: avg(|s| s.q2),
            q3: avg(|s| s.q3),
            std_dev: avg(|s| s.std_dev),
        }
    }
}
