use std::cell::RefCell;
use std::rc::Rc;

use crate::Metric;
use crate::contract::METRIC_COUNT;

/// Live handle on one metric's sequence. Appends made through the recorder
/// show up in every clone of the handle.
pub type SharedSequence = Rc<RefCell<Vec<f64>>>;

/// Per-metric append-only sample sequences for a single decode run.
///
/// Single writer: the driving loop. Sequences are shared out through
/// [`SampleRecorder::sequence_for`] and frozen into an [`IterationResult`]
/// once the run ends. A `Ref` taken from a shared handle must be released
/// before the next `record`.
#[derive(Debug, Default)]
pub struct SampleRecorder {
    sequences: [SharedSequence; METRIC_COUNT],
}

impl SampleRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, metric: Metric, value: f64) {
        self.sequences[metric.index()].borrow_mut().push(value);
    }

    #[must_use]
    pub fn sequence_for(&self, metric: Metric) -> SharedSequence {
        Rc::clone(&self.sequences[metric.index()])
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sequences[Metric::FrameProcessingTime.index()]
            .borrow()
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ends the run. Handles still held elsewhere keep their view of the
    /// sequence but see no further appends.
    pub fn freeze(self) -> IterationResult {
        IterationResult {
            sequences: self.sequences.map(|shared| {
                Rc::try_unwrap(shared)
                    .map_or_else(|held| held.borrow().clone(), RefCell::into_inner)
            }),
        }
    }
}

/// Samples of one decode run of one variant. Read-only.
#[derive(Debug, Clone, Default)]
pub struct IterationResult {
    sequences: [Vec<f64>; METRIC_COUNT],
}

impl IterationResult {
    #[must_use]
    pub fn samples(&self, metric: Metric) -> &[f64] {
        &self.sequences[metric.index()]
    }

    #[must_use]
    pub fn frames(&self) -> usize {
        self.samples(Metric::FrameProcessingTime).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (Metric, &[f64])> {
        Metric::ALL.into_iter().map(|m| (m, self.samples(m)))
    }
}
