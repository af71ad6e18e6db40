//! Adaptive delay between tombstone cleanup rounds.
//!
//! The scheduler estimates how fast tombstones are being added and picks a
//! delay that lets the map grow back to `target_size` at most, capped by
//! `max_delay_millis`. The new delay is the geometric mean of the current
//! delay and that estimate so a single burst cannot swing it from one
//! extreme to the other.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct CleanupScheduler {
    target_size: usize,
    max_delay_millis: u64,
    current_delay_millis: u64,
    pre_cleanup_size: usize,
    previous_post_cleanup_size: usize,
}

impl CleanupScheduler {
    pub fn new(target_size: usize, max_delay_millis: u64) -> Self {
        let max_delay_millis = max_delay_millis.max(1);
        Self {
            target_size,
            max_delay_millis,
            current_delay_millis: (max_delay_millis / 2).max(1),
            pre_cleanup_size: 0,
            previous_post_cleanup_size: 0,
        }
    }

    pub fn current_delay_millis(&self) -> u64 {
        self.current_delay_millis
    }

    pub fn current_delay(&self) -> Duration {
        Duration::from_millis(self.current_delay_millis)
    }

    /// Record the map size when a round starts.
    pub fn on_task_started(&mut self, size: usize) {
        self.pre_cleanup_size = size;
    }

    /// Compute the delay before the next round from the size after this one.
    pub fn on_task_completed(&mut self, post_cleanup_size: usize) -> Duration {
        if post_cleanup_size >= self.target_size {
            self.current_delay_millis = 1;
        } else {
            let estimate = self.max_delay_estimate(post_cleanup_size);
            let damped = (self.current_delay_millis as f64 * estimate).sqrt().round();
            self.current_delay_millis = (damped as u64).clamp(1, self.max_delay_millis);
        }
        self.previous_post_cleanup_size = post_cleanup_size;
        self.current_delay()
    }

    /// Delay after which the map would reach `target_size` at the observed
    /// add rate, at most `max_delay_millis`.
    fn max_delay_estimate(&self, post_cleanup_size: usize) -> f64 {
        let added = self.pre_cleanup_size as f64 - self.previous_post_cleanup_size as f64;
        let rate = added / self.current_delay_millis as f64;
        let max = self.max_delay_millis as f64;
        if rate <= 0.0 {
            max
        } else {
            let headroom = (self.target_size - post_cleanup_size) as f64;
            (headroom / rate + 1.0).min(max)
        }
    }
}
