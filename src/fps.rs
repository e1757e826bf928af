use std::time::{Duration, Instant};

const FPS_WINDOW: Duration = Duration::from_millis(1000);

/// Rolling frames-per-second estimate, refreshed once per window.
#[derive(Debug, Clone)]
pub struct FpsCounter {
    frame_count: u32,
    window_start: Instant,
    fps: f64,
}

impl FpsCounter {
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    pub fn starting_at(window_start: Instant) -> Self {
        Self {
            frame_count: 0,
            window_start,
            fps: 0.0,
        }
    }

    pub fn tick(&mut self) -> f64 {
        self.tick_at(Instant::now())
    }

    /// Count one processed frame at `now`.
    pub fn tick_at(&mut self, now: Instant) -> f64 {
        self.frame_count += 1;
        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed >= FPS_WINDOW {
            self.fps = self.frame_count as f64 / elapsed.as_secs_f64();
            self.frame_count = 0;
            self.window_start = now;
        }
        self.fps
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }
}

impl Default for FpsCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// Overlay text for the counter, e.g. `FPS: 29.97`.
pub fn fps_caption(fps: f64) -> String {
    format!("FPS: {:.2}", fps)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_zero_until_first_window_closes() {
        let start = Instant::now();
        let mut counter = FpsCounter::starting_at(start);
        for i in 1..10 {
            counter.tick_at(start + Duration::from_millis(i * 100));
        }
        assert_eq!(counter.fps(), 0.0);
    }

    #[test]
    fn computes_rate_when_window_elapses() {
        let start = Instant::now();
        let mut counter = FpsCounter::starting_at(start);
        for i in 1..=19 {
            counter.tick_at(start + Duration::from_millis(i * 50));
        }
        // 20th frame lands exactly on the 1000ms boundary
        let fps = counter.tick_at(start + Duration::from_millis(1000));
        assert!((fps - 20.0).abs() < 1e-9);
    }

    #[test]
    fn window_resets_after_rollover() {
        let start = Instant::now();
        let mut counter = FpsCounter::starting_at(start);
        counter.tick_at(start + Duration::from_millis(2000));
        assert!((counter.fps() - 0.5).abs() < 1e-9);

        // next window: 4 frames over 1s
        let second = start + Duration::from_millis(2000);
        for i in 1..=4 {
            counter.tick_at(second + Duration::from_millis(i * 250));
        }
        assert!((counter.fps() - 4.0).abs() < 1e-9);
    }

    #[test]
    fn caption_has_two_decimals() {
        assert_eq!(fps_caption(29.971), "FPS: 29.97");
        assert_eq!(fps_caption(0.0), "FPS: 0.00");
    }
}
