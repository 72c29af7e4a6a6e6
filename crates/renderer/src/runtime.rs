use std::time::Duration;

use chrono::Utc;

/// Fixed simulation-time increment per rendered frame, in milliseconds.
///
/// Simulation time is frame-locked rather than wall-clocked so a cycle's
/// accumulation is reproducible regardless of actual frame pacing. It is
/// never reset by a reseed.
pub const SIM_TIME_STEP: f32 = 16.0;

/// Pause after a user-triggered reseed before ticking resumes.
pub const RESEED_DEBOUNCE: Duration = Duration::from_millis(300);

/// Delay between a cycle completing and the one-shot preview capture.
pub const PREVIEW_DELAY: Duration = Duration::from_millis(300);

/// Time values sampled once per tick and shared by every pass's uniforms.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameTimes {
    /// Wall-clock time in seconds since the Unix epoch.
    pub global_seconds: f32,
    /// Fixed-step simulation time in milliseconds.
    pub sim_time: f32,
}

/// Produces per-tick time samples: wall clock plus fixed-step sim time.
#[derive(Debug, Clone)]
pub struct FrameClock {
    sim_time: f32,
}

impl FrameClock {
    pub fn new() -> Self {
        Self { sim_time: 0.0 }
    }

    /// Samples the clock for the frame about to be drawn and advances the
    /// simulation step.
    pub fn tick(&mut self) -> FrameTimes {
        let times = FrameTimes {
            global_seconds: wall_clock_seconds(),
            sim_time: self.sim_time,
        };
        self.sim_time += SIM_TIME_STEP;
        times
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

fn wall_clock_seconds() -> f32 {
    Utc::now().timestamp_millis() as f32 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sim_time_advances_in_fixed_steps() {
        let mut clock = FrameClock::new();
        assert_eq!(clock.tick().sim_time, 0.0);
        assert_eq!(clock.tick().sim_time, SIM_TIME_STEP);
        assert_eq!(clock.tick().sim_time, SIM_TIME_STEP * 2.0);
    }

    #[test]
    fn global_time_is_roughly_now() {
        let sample = FrameClock::new().tick();
        let now = Utc::now().timestamp_millis() as f32 / 1000.0;
        assert!((sample.global_seconds - now).abs() < 5.0);
    }
}
