//! Physics kernel contract
//!
//! The simulation consumes physics only through the [`Kernel`] trait: build a
//! per-player (or shared) [`SimBuffer`] from a static [`Level`], step its balls
//! under a gravity vector, and run the zone tests. [`SolidKernel`] is the
//! reference implementation over axis-aligned boxes.

pub mod level;
mod solid;

pub use level::{BallSpawn, JumpZone, Level, Solid, SwitchZone, ViewPoint, Zone};
pub use solid::SolidKernel;

use std::cmp::Ordering;
use std::sync::Arc;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::cmd::CommandLog;
use crate::consts::{GROW_SCALES, GROW_TIME};
use crate::error::LoadError;

/// Item types found lying around a level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemKind {
    /// Already picked up
    None,
    Coin,
    Clock,
    Grow,
    Shrink,
    Speed,
    Missile,
    Banana,
}

/// Pickup item; `n` is its value (coins, seconds, ...)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub p: Vec3,
    pub kind: ItemKind,
    pub n: i32,
}

/// Runtime switch state
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Switch {
    pub zone: Zone,
    pub on: bool,
    /// Bitmask of balls currently standing in the zone
    pub entered: u32,
}

impl Switch {
    /// Whether ball `ball` is standing in the zone
    pub fn is_entered_by(&self, ball: usize) -> bool {
        ball < u32::BITS as usize && self.entered & (1 << ball) != 0
    }
}

/// A simulated ball
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ball {
    pub p: Vec3,
    pub v: Vec3,
    /// Angular velocity
    pub w: Vec3,
    /// Orientation basis
    pub e: [Vec3; 3],
    /// Pendulum basis (hangs along gravity, follows the heading)
    pub pend: [Vec3; 3],
    pub r: f32,
    /// Radii for small, normal and big
    pub sizes: [f32; 3],
    /// Index into `sizes` of the size being approached
    pub size: usize,
    /// Radius growth rate while a grow/shrink is in progress
    pub r_vel: f32,
    pub in_play: bool,
    /// Touched walkable ground during the last step
    pub grounded: bool,
}

impl Ball {
    pub fn new(p: Vec3, r: f32) -> Self {
        Self {
            p,
            v: Vec3::ZERO,
            w: Vec3::ZERO,
            e: [Vec3::X, Vec3::Y, Vec3::Z],
            pend: [Vec3::X, Vec3::Y, Vec3::Z],
            r,
            sizes: GROW_SCALES.map(|s| s * r),
            size: 1,
            r_vel: 0.0,
            in_play: true,
            grounded: false,
        }
    }

    /// Put the ball back at `p` at normal size, at rest
    pub fn reset(&mut self, p: Vec3) {
        *self = Self {
            sizes: self.sizes,
            ..Self::new(p, self.sizes[1])
        };
    }

    #[inline]
    pub fn bottom(&self) -> f32 {
        self.p.y - self.r
    }

    /// Start a grow or shrink toward the next size
    ///
    /// Returns `Greater` when growing, `Less` when shrinking and `Equal` when
    /// already at the limit.
    pub fn grow_init(&mut self, kind: ItemKind) -> Ordering {
        let next = match kind {
            ItemKind::Grow => (self.size + 1).min(2),
            ItemKind::Shrink => self.size.saturating_sub(1),
            _ => self.size,
        };
        if next == self.size {
            return Ordering::Equal;
        }
        let order = next.cmp(&self.size);
        self.size = next;
        self.r_vel = (self.sizes[next] - self.r) / GROW_TIME;
        order
    }

    /// Advance an in-progress grow/shrink; the bottom of the ball stays put
    ///
    /// Returns true when the radius changed.
    pub fn grow_step(&mut self, dt: f32) -> bool {
        if self.r_vel == 0.0 {
            return false;
        }
        let target = self.sizes[self.size];
        let mut dr = self.r_vel * dt;
        if (self.r_vel > 0.0 && self.r + dr >= target) || (self.r_vel < 0.0 && self.r + dr <= target)
        {
            dr = target - self.r;
            self.r_vel = 0.0;
        }
        self.r += dr;
        self.p.y += dr;
        true
    }
}

/// Variable (mutable) simulation state loaded from a level
#[derive(Debug, Clone)]
pub struct SimBuffer {
    pub base: Arc<Level>,
    pub balls: Vec<Ball>,
    pub items: Vec<Item>,
    pub switches: Vec<Switch>,
}

impl SimBuffer {
    pub fn ball(&self, i: usize) -> Option<&Ball> {
        self.balls.get(i)
    }

    pub fn ball_mut(&mut self, i: usize) -> Option<&mut Ball> {
        self.balls.get_mut(i)
    }
}

/// Result of a switch test
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchTest {
    /// At least one switch was toggled by the ball
    Inside,
    Outside,
}

/// Result of a jump test
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum JumpTest {
    /// Fully inside a jump zone; carries the exit position for the ball
    Inside(Vec3),
    /// Overlapping the edge of a jump zone
    Border,
    Outside,
}

/// Physics backend
pub trait Kernel {
    /// Build the mutable state of `base`
    fn load_vary(&self, base: &Arc<Level>) -> Result<SimBuffer, LoadError>;

    /// Release a buffer; only its owner ever holds one by value
    fn free_vary(&self, buffer: SimBuffer) {
        drop(buffer);
    }

    /// Advance ball `ball` by `dt` under `gravity`, returning the impact
    /// strength in [0, 1]
    fn step(&self, buffer: &mut SimBuffer, gravity: Vec3, dt: f32, ball: usize) -> f32;

    /// First untaken item touched by the ball, using `radius` for the item
    fn item_test(&self, buffer: &SimBuffer, ball: usize, radius: f32) -> Option<usize>;

    /// Update switch states, enqueueing switch commands into `log`
    fn swch_test(&self, buffer: &mut SimBuffer, ball: usize, log: &mut CommandLog) -> SwitchTest;

    fn jump_test(&self, buffer: &SimBuffer, ball: usize) -> JumpTest;

    /// Goal zone the ball is fully inside, if any
    fn goal_test(&self, buffer: &SimBuffer, ball: usize) -> Option<usize>;
}
