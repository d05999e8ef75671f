//! Rolling sample window and the stability verdict computed over it.

use std::collections::VecDeque;

/// One accepted sensor sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub value: f64,
    /// Monotonic milliseconds since the acquisition epoch.
    pub taken_at_ms: u64,
}

/// Verdict over the current window contents.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StabilityVerdict {
    /// Window is full and its spread is within the threshold.
    Stable { mean: f64, stddev: f64 },
    /// Not stable yet. `partial_mean` is the mean of whatever the window
    /// holds, None when it is empty.
    Unstable { partial_mean: Option<f64> },
}

/// Fixed-capacity rolling window. Oldest sample is evicted when full; the
/// window is never reset by sampling errors, only by `clear`.
#[derive(Debug, Clone)]
pub struct Window {
    buf: VecDeque<Sample>,
    capacity: usize,
}

impl Window {
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, s: Sample) {
        if self.buf.len() == self.capacity {
            self.buf.pop_front();
        }
        self.buf.push_back(s);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.buf.len() == self.capacity
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    pub fn mean(&self) -> Option<f64> {
        if self.buf.is_empty() {
            return None;
        }
        let sum: f64 = self.buf.iter().map(|s| s.value).sum();
        Some(sum / self.buf.len() as f64)
    }

    /// Population standard deviation over the window. None until full.
    pub fn stddev(&self) -> Option<f64> {
        if !self.is_full() {
            return None;
        }
        let mean = self.mean()?;
        let var: f64 = self
            .buf
            .iter()
            .map(|s| {
                let d = s.value - mean;
                d * d
            })
            .sum::<f64>()
            / self.buf.len() as f64;
        Some(var.sqrt())
    }

    pub fn verdict(&self, threshold: f64) -> StabilityVerdict {
        match (self.stddev(), self.mean()) {
            (Some(sd), Some(mean)) if sd <= threshold => StabilityVerdict::Stable {
                mean,
                stddev: sd,
            },
            _ => StabilityVerdict::Unstable {
                partial_mean: self.mean(),
            },
        }
    }
}
