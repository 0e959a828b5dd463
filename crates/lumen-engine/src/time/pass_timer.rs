use std::time::{Duration, Instant};

/// Durations of the two passes of one sensor frame.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct RenderTiming {
    /// Time spent rendering all first-pass camera textures.
    pub first_pass: Duration,

    /// Time spent compositing the second pass.
    pub second_pass: Duration,
}

impl RenderTiming {
    #[inline]
    pub fn total(&self) -> Duration {
        self.first_pass + self.second_pass
    }
}

/// Monotonic stopwatch for a single render pass.
#[derive(Debug, Clone)]
pub struct PassTimer {
    start: Instant,
}

impl PassTimer {
    /// Starts a new timer.
    pub fn start() -> Self {
        Self { start: Instant::now() }
    }

    /// Time elapsed since the timer was started or last restarted.
    pub fn elapsed(&self) -> Duration {
        Instant::now().saturating_duration_since(self.start)
    }

    /// Returns the elapsed time and restarts the timer.
    pub fn restart(&mut self) -> Duration {
        let now = Instant::now();
        let elapsed = now.saturating_duration_since(self.start);
        self.start = now;
        elapsed
    }
}

impl Default for PassTimer {
    fn default() -> Self {
        Self::start()
    }
}
