//! Frame timing

use std::time::Instant;

/// Per-frame clock: tracks the delta between updates and the running total
pub struct Timer {
    last_frame: Instant,
    delta_time: f32,
    total_time: f32,
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

impl Timer {
    /// Start the clock
    pub fn new() -> Self {
        Self {
            last_frame: Instant::now(),
            delta_time: 0.0,
            total_time: 0.0,
        }
    }

    /// Advance the clock; call once at the top of each frame
    pub fn update(&mut self) {
        let now = Instant::now();
        self.delta_time = now.duration_since(self.last_frame).as_secs_f32();
        self.total_time += self.delta_time;
        self.last_frame = now;
    }

    /// Seconds since the previous update
    pub fn delta_time(&self) -> f32 {
        self.delta_time
    }

    /// Seconds since the clock started
    pub fn total_time(&self) -> f32 {
        self.total_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_accumulates_elapsed_time() {
        let mut timer = Timer::new();
        timer.update();
        let after_first = timer.total_time();
        timer.update();
        assert!(timer.delta_time() >= 0.0);
        assert!(timer.total_time() >= after_first);
    }
}
