use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct Time {
    last: Instant,
}

/// Averages frame times over a fixed interval.
#[derive(Debug, Clone)]
pub struct FpsCounter {
    interval: Duration,
    elapsed: Duration,
    frames: u32,
}

impl Time {
    pub fn new() -> Self {
        Self {
            last: Instant::now(),
        }
    }

    pub fn tick(&mut self) -> Duration {
        let now = Instant::now();
        let dt = now.duration_since(self.last);
        self.last = now;
        dt
    }
}

impl Default for Time {
    fn default() -> Self {
        Self::new()
    }
}

impl FpsCounter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            elapsed: Duration::ZERO,
            frames: 0,
        }
    }

    /// Records one frame; yields the average rate once per interval.
    pub fn tick(&mut self, dt: Duration) -> Option<f32> {
        self.elapsed += dt;
        self.frames += 1;

        if self.elapsed < self.interval {
            return None;
        }

        let fps = self.frames as f32 / self.elapsed.as_secs_f32();
        self.elapsed = Duration::ZERO;
        self.frames = 0;

        Some(fps)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn reports_once_per_interval() {
        let mut fps = FpsCounter::new(Duration::from_millis(500));
        let frame = Duration::from_millis(10);

        for _ in 0..49 {
            assert_eq!(fps.tick(frame), None);
        }

        assert_relative_eq!(fps.tick(frame).unwrap(), 100.0, epsilon = 1e-3);
        assert_eq!(fps.tick(frame), None);
    }

    #[test]
    fn slow_frame_reports_immediately() {
        let mut fps = FpsCounter::new(Duration::from_millis(500));
        assert_relative_eq!(fps.tick(Duration::from_secs(2)).unwrap(), 0.5);
    }

    #[test]
    fn time_is_monotonic() {
        let mut time = Time::new();
        std::thread::sleep(Duration::from_millis(2));
        assert!(time.tick() >= Duration::from_millis(2));
    }
}
