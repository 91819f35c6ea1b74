//! Synthetic player input
//!
//! The autopilot drives headless runs and tests: a seeded PCG stream picks a
//! joystick position, holds it for a while, and now and then taps the action
//! button. The same seed always produces the same input sequence.

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use crate::kernel::Kernel;
use crate::sim::Server;

/// Input for one frame
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AutoInput {
    /// Joystick X (-1.0 - 1.0)
    pub x: f32,
    /// Joystick Z (-1.0 - 1.0)
    pub z: f32,
    pub action: bool,
}

#[derive(Debug, Clone)]
pub struct Autopilot {
    rng: Pcg32,
    /// Frames left before a new joystick position
    hold: u32,
    /// Longest hold, in frames
    max_hold: u32,
    /// Chance of pressing action on a new hold
    action_chance: f64,
    current: AutoInput,
}

impl Autopilot {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Pcg32::seed_from_u64(seed),
            hold: 0,
            max_hold: 45,
            action_chance: 0.1,
            current: AutoInput::default(),
        }
    }

    pub fn with_max_hold(mut self, frames: u32) -> Self {
        self.max_hold = frames.max(1);
        self
    }

    pub fn with_action_chance(mut self, chance: f64) -> Self {
        self.action_chance = chance.clamp(0.0, 1.0);
        self
    }

    /// Input for the next frame
    pub fn next_input(&mut self) -> AutoInput {
        if self.hold == 0 {
            self.hold = self.rng.random_range(1..=self.max_hold);
            self.current = AutoInput {
                x: self.rng.random_range(-1.0..=1.0),
                z: self.rng.random_range(-1.0..=1.0),
                action: self.rng.random_bool(self.action_chance),
            };
        } else {
            // Action is a tap, not a hold
            self.current.action = false;
        }
        self.hold -= 1;
        self.current
    }

    /// Feed the next frame's input to player `p`
    pub fn drive<K: Kernel>(&mut self, server: &mut Server<K>, p: usize) {
        let input = self.next_input();
        server.set_x(input.x, p);
        server.set_z(input.z, p);
        server.set_action(input.action, p);
    }
}
