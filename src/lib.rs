//! Tiltball - A multi-player tilting-world ball game core
//!
//! Core modules:
//! - `kernel`: Physics kernel contract and the reference solid-box kernel
//! - `cmd`: Typed state-change commands and the FIFO command log
//! - `lockstep`: Fixed timestep accumulator
//! - `sim`: Authoritative server simulation (players, modes, status)
//! - `client`: Command replay and CURR/PREV interpolation
//! - `game`: Frame loop wiring server, log and client together
//! - `demo`: Command stream recording and playback

pub mod audio;
pub mod client;
pub mod cmd;
pub mod demo;
pub mod error;
pub mod game;
pub mod input;
pub mod kernel;
pub mod lockstep;
pub mod settings;
pub mod sim;

pub use client::Client;
pub use cmd::{Command, CommandLog};
pub use error::{DemoError, LoadError, SettingsError};
pub use game::Game;
pub use kernel::{Kernel, Level, SimBuffer, SolidKernel};
pub use lockstep::Lockstep;
pub use settings::{PhysicsPreset, Settings};
pub use sim::{Mode, Server, Status};

use glam::Vec3;

/// Game configuration constants
pub mod consts {
    use glam::Vec3;

    /// Simulation updates per second
    pub const UPS: u32 = 90;
    /// Fixed simulation timestep
    pub const DT: f32 = 1.0 / UPS as f32;

    /// Maximum simultaneous local players
    pub const MAX_PLAYERS: usize = 4;

    /// Default tilt response time (seconds)
    pub const RESPONSE: f32 = 0.05;
    /// Maximum floor tilt (degrees)
    pub const ANGLE_BOUND: f32 = 20.0;
    /// Maximum manual view rotation rate input
    pub const VIEWR_BOUND: f32 = 10.0;

    pub const VIEW_FADE_MIN: f32 = 0.2;
    pub const VIEW_FADE_MAX: f32 = 1.0;

    /// Gravity while playing or falling
    pub const GRAVITY_DN: Vec3 = Vec3::new(0.0, -9.8, 0.0);
    /// Gravity after reaching the goal (ball floats away)
    pub const GRAVITY_UP: Vec3 = Vec3::new(0.0, 9.8, 0.0);

    /// Duration of a grow/shrink animation
    pub const GROW_TIME: f32 = 0.5;
    /// Ball size multipliers for small, normal and big
    pub const GROW_SCALES: [f32; 3] = [0.5, 1.0, 2.0];

    pub const ZOOM_DELAY: f32 = GROW_TIME * 0.5;
    pub const ZOOM_TIME: f32 = ZOOM_DELAY + GROW_TIME;
    pub const ZOOM_MIN: f32 = 0.75;
    pub const ZOOM_MAX: f32 = 1.25;

    /// Pickup radius of an item
    pub const ITEM_RADIUS: f32 = 0.15;

    /// Spawn offset between players sharing a level (x and z)
    pub const PLAYER_OFFSET: f32 = 1.5;

    /// Jump transit: teleport at half time, finish at full time
    pub const JUMP_TELEPORT: f32 = 0.5;
    pub const JUMP_END: f32 = 1.0;

    /// Minimum impact that produces a bump sound
    pub const BUMP_THRESHOLD: f32 = 0.5;

    /// Speed item velocity multiplier
    pub const SPEED_BOOST: f32 = 1.5;
    /// Speed item kick when the ball is nearly stationary
    pub const SPEED_KICK: f32 = 3.0;
    /// Missile item blast radius and impulse
    pub const MISSILE_RADIUS: f32 = 4.0;
    pub const MISSILE_IMPULSE: f32 = 6.0;

    /// Number of balls on a billiards table (cue plus fifteen)
    pub const BILLIARD_BALLS: usize = 16;
    /// Rack distance of the cue ball from the apex along +Z
    pub const CUE_DISTANCE: f32 = 6.0;

    /// Default view distances (position lift, center lift, back distance)
    pub const VIEW_DP: f32 = 0.75;
    pub const VIEW_DC: f32 = 0.25;
    pub const VIEW_DZ: f32 = 2.0;
}

/// Linear interpolation between two scalars
#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Ease-in-out with overshoot, used by the view zoom
#[inline]
pub fn ease_in_out_back(t: f32) -> f32 {
    const C1: f32 = 1.70158;
    const C2: f32 = C1 * 1.525;

    if t < 0.5 {
        ((2.0 * t).powi(2) * ((C2 + 1.0) * 2.0 * t - C2)) / 2.0
    } else {
        ((2.0 * t - 2.0).powi(2) * ((C2 + 1.0) * (t * 2.0 - 2.0) + C2) + 2.0) / 2.0
    }
}

/// Project a vector onto the horizontal (XZ) plane
#[inline]
pub fn horizontal(v: Vec3) -> Vec3 {
    Vec3::new(v.x, 0.0, v.z)
}

/// Spawn offset for player `p` when several players share one level
#[inline]
pub fn player_offset(p: usize) -> Vec3 {
    let d = p as f32 * consts::PLAYER_OFFSET;
    Vec3::new(d, 0.0, d)
}
