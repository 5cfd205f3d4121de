//! Fixed-capacity rolling window of recent samples.

use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct RollingWindow {
    buf: VecDeque<f64>,
    cap: usize,
}

impl RollingWindow {
    /// Capacity is clamped to at least 1.
    pub fn new(cap: usize) -> Self {
        let cap = cap.max(1);
        Self {
            buf: VecDeque::with_capacity(cap),
            cap,
        }
    }

    /// Append a sample, evicting the oldest when full.
    pub fn push(&mut self, v: f64) {
        if self.buf.len() == self.cap {
            self.buf.pop_front();
        }
        self.buf.push_back(v);
    }

    /// Change the capacity keeping the newest `min(n, len)` samples.
    /// `n == 0` leaves the window untouched.
    pub fn resize(&mut self, n: usize) {
        if n == 0 {
            return;
        }
        while self.buf.len() > n {
            self.buf.pop_front();
        }
        self.cap = n;
    }

    pub fn mean(&self) -> f64 {
        if self.buf.is_empty() {
            return 0.0;
        }
        self.buf.iter().sum::<f64>() / self.buf.len() as f64
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.cap
    }

    /// Samples oldest first.
    pub fn samples(&self) -> impl Iterator<Item = f64> + '_ {
        self.buf.iter().copied()
    }
}
