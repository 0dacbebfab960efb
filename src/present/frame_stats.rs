//! Frame timing statistics for the present path.
//!
//! Keeps a rolling window of begin-to-finish render durations together with
//! submitted and dropped frame counts.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Rolling present statistics.
#[derive(Debug)]
pub struct FrameStats {
    frame_times: VecDeque<Duration>,
    window_size: usize,
    frame_start: Option<Instant>,
    frames_submitted: u64,
    frames_dropped: u64,
    last_predicted_display_time: f64,
}

impl Default for FrameStats {
    fn default() -> Self {
        Self::new(crate::constants::present::DEFAULT_FRAME_STATS_WINDOW)
    }
}

impl FrameStats {
    pub fn new(window_size: usize) -> Self {
        let window_size = window_size.max(1);
        Self {
            frame_times: VecDeque::with_capacity(window_size),
            window_size,
            frame_start: None,
            frames_submitted: 0,
            frames_dropped: 0,
            last_predicted_display_time: 0.0,
        }
    }

    pub fn begin_frame(&mut self, predicted_display_time: f64) {
        self.frame_start = Some(Instant::now());
        self.last_predicted_display_time = predicted_display_time;
    }

    /// Close the frame opened by `begin_frame`.
    pub fn end_frame(&mut self, submitted: bool) {
        if let Some(start) = self.frame_start.take() {
            self.record_duration(start.elapsed());
        }
        if submitted {
            self.frames_submitted += 1;
        } else {
            self.frames_dropped += 1;
        }
    }

    /// A finish arrived with no matching begin.
    pub fn record_dropped(&mut self) {
        self.frames_dropped += 1;
    }

    pub fn record_duration(&mut self, duration: Duration) {
        self.frame_times.push_back(duration);
        if self.frame_times.len() > self.window_size {
            self.frame_times.pop_front();
        }
    }

    pub fn frames_submitted(&self) -> u64 {
        self.frames_submitted
    }

    pub fn frames_dropped(&self) -> u64 {
        self.frames_dropped
    }

    pub fn last_predicted_display_time(&self) -> f64 {
        self.last_predicted_display_time
    }

    pub fn sample_count(&self) -> usize {
        self.frame_times.len()
    }

    /// Mean over the window, zero with no samples.
    pub fn average_frame_time(&self) -> Duration {
        if self.frame_times.is_empty() {
            return Duration::ZERO;
        }
        self.frame_times.iter().sum::<Duration>() / self.frame_times.len() as u32
    }

    pub fn fps(&self) -> f64 {
        let average = self.average_frame_time().as_secs_f64();
        if average > 0.0 {
            1.0 / average
        } else {
            0.0
        }
    }

    pub fn reset(&mut self) {
        self.frame_times.clear();
        self.frame_start = None;
        self.frames_submitted = 0;
        self.frames_dropped = 0;
    }
}
