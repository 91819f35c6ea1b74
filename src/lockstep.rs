//! Fixed timestep accumulator
//!
//! Decouples the variable frame rate from the fixed simulation rate. Frame
//! time accumulates; every whole `DT` in the accumulator runs one tick and the
//! remainder becomes the render blend factor.

/// Largest blend value; `blend()` is always strictly below one
const MAX_BLEND: f32 = 1.0 - f32::EPSILON;

/// Longest frame time accepted by one [`Lockstep::run`] call, in seconds
pub const MAX_FRAME_TIME: f32 = 60.0;

#[derive(Debug, Clone)]
pub struct Lockstep {
    dt: f32,
    acc: f32,
    max_steps: Option<u32>,
}

impl Lockstep {
    pub fn new(dt: f32) -> Self {
        Self {
            dt,
            acc: 0.0,
            max_steps: None,
        }
    }

    /// Cap the ticks run by a single [`run`](Self::run) call
    pub fn with_max_steps(mut self, max_steps: u32) -> Self {
        self.max_steps = Some(max_steps);
        self
    }

    /// Fixed timestep
    pub fn dt(&self) -> f32 {
        self.dt
    }

    /// Time accumulated but not yet simulated
    pub fn residual(&self) -> f32 {
        self.acc
    }

    /// Accumulate `dt` and invoke `step(DT)` once per whole timestep
    ///
    /// Negative or non-finite frame times count as zero and frames longer
    /// than [`MAX_FRAME_TIME`] are cut to it. Returns the number of ticks run.
    pub fn run<F: FnMut(f32)>(&mut self, dt: f32, mut step: F) -> u32 {
        if dt.is_finite() && dt > 0.0 {
            if dt > MAX_FRAME_TIME {
                log::warn!("frame time {dt}s clamped to {MAX_FRAME_TIME}s");
            }
            self.acc += dt.min(MAX_FRAME_TIME);
        }

        let mut n = (self.acc / self.dt).floor();
        self.acc = (self.acc - n * self.dt).clamp(0.0, self.dt);

        if let Some(max) = self.max_steps {
            if n > max as f32 {
                log::warn!(
                    "lockstep fell behind by {} ticks, dropping them",
                    n - max as f32
                );
                n = max as f32;
            }
        }

        let count = n as u32;
        for _ in 0..count {
            step(self.dt);
        }
        count
    }

    /// Fraction of a timestep left in the accumulator, in [0, 1)
    pub fn blend(&self) -> f32 {
        (self.acc / self.dt).clamp(0.0, MAX_BLEND)
    }

    pub fn clear(&mut self) {
        self.acc = 0.0;
    }
}
