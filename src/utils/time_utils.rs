use std::time::Instant;

/// Wall-clock stopwatch for pipeline stages.
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self { start: Instant::now() }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    /// Returns the lap time and restarts the timer.
    pub fn lap_ms(&mut self) -> u64 {
        let lap = self.elapsed_ms();
        self.start = Instant::now();
        lap
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

/// Seconds to the millisecond position OpenCV seeks with.
pub fn secs_to_millis(secs: f64) -> f64 {
    secs * 1000.0
}
