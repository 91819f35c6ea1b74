//! Per-player server state
//!
//! Everything the server tracks for one player slot lives here: the physics
//! handle, input, tilt, camera, counters and the mode sub-states.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::tilt::Tilt;
use super::view::View;
use crate::consts::*;
use crate::kernel::SimBuffer;

/// Outcome of the current attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Status {
    /// Still playing
    #[default]
    None,
    /// Reached an open goal
    Goal,
    /// Ran out of time
    Time,
    /// Fell out of the level
    Fall,
}

impl Status {
    pub fn is_terminal(&self) -> bool {
        *self != Status::None
    }
}

/// Latest input for one player
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Input {
    /// Tilt response time (seconds)
    pub s: f32,
    /// Target tilt about the X axis (degrees)
    pub x: f32,
    /// Target tilt about the Z axis (degrees)
    pub z: f32,
    /// Manual view rotation rate
    pub r: f32,
    /// Camera mode index
    pub c: usize,
    pub action: bool,
    /// Action state seen by the previous tick (for edge detection)
    pub action_prev: bool,
}

impl Default for Input {
    fn default() -> Self {
        Self {
            s: RESPONSE,
            x: 0.0,
            z: 0.0,
            r: 0.0,
            c: 0,
            action: false,
            action_prev: false,
        }
    }
}

impl Input {
    pub fn set_x(&mut self, x: f32) {
        self.x = x.clamp(-ANGLE_BOUND, ANGLE_BOUND);
    }

    pub fn set_z(&mut self, z: f32) {
        self.z = z.clamp(-ANGLE_BOUND, ANGLE_BOUND);
    }

    pub fn set_r(&mut self, r: f32) {
        self.r = r.clamp(-VIEWR_BOUND, VIEWR_BOUND);
    }

    pub fn set_s(&mut self, s: f32) {
        self.s = s.max(0.0);
    }

    /// Rising edge of the action button, consumed once per tick
    pub fn action_edge(&mut self) -> bool {
        let edge = self.action && !self.action_prev;
        self.action_prev = self.action;
        edge
    }
}

/// Camera animation state
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    /// Speed-dependent distance factor
    pub k: f32,
    /// Time since manual rotation stopped (positive) or started (negative)
    pub time: f32,
    /// Chase ramp duration captured when manual rotation stops
    pub fade: f32,
    pub zoom: f32,
    pub zoom_start: f32,
    pub zoom_end: f32,
    /// Zoom animation clock; at `ZOOM_TIME` the zoom is idle
    pub zoom_time: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            k: 1.0,
            time: 0.0,
            fade: 0.0,
            zoom: 1.0,
            zoom_start: 1.0,
            zoom_end: 1.0,
            zoom_time: ZOOM_TIME,
        }
    }
}

impl Camera {
    /// Start a zoom toward `target` (clamped to the zoom range)
    pub fn zoom_to(&mut self, target: f32) {
        self.zoom_start = self.zoom;
        self.zoom_end = target.clamp(ZOOM_MIN, ZOOM_MAX);
        self.zoom_time = 0.0;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum JumpPhase {
    #[default]
    Idle,
    /// Entered a jump zone; the ball has not been moved yet
    Entered,
    /// Ball placed at the jump exit
    Placed,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Jump {
    /// Jumping is armed (ball has left every jump zone since the last jump)
    pub enabled: bool,
    pub phase: JumpPhase,
    pub dt: f32,
    pub dest: Vec3,
}

impl Default for Jump {
    fn default() -> Self {
        Self {
            enabled: true,
            phase: JumpPhase::Idle,
            dt: 0.0,
            dest: Vec3::ZERO,
        }
    }
}

impl Jump {
    pub fn in_transit(&self) -> bool {
        self.phase != JumpPhase::Idle
    }
}

/// Target mode flight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Flight {
    pub active: bool,
    /// Flight was engaged at least once this attempt
    pub engaged: bool,
    /// Flight was engaged and has since ended
    pub ended: bool,
    /// Landing has been scored
    pub landed: bool,
}

/// Fight mode punch
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum Punch {
    #[default]
    Idle,
    /// `hits` is a bitmask of balls already struck by this punch
    Extending { t: f32, hits: u32 },
    Retracting { t: f32 },
}

impl Punch {
    pub fn is_active(&self) -> bool {
        !matches!(self, Punch::Idle)
    }
}

/// Billiards cue charge
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Shot {
    pub charging: bool,
    /// Charge level in 0.0 - 1.0
    pub charge: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerState {
    /// Index of this player's ball in its buffer
    pub ball: usize,
    /// Respawn position of the ball
    pub spawn: Vec3,
    pub input: Input,
    pub tilt: Tilt,
    pub view: View,
    pub camera: Camera,
    pub status: Status,
    /// Time limit in seconds; zero means unlimited
    pub time_limit: f32,
    pub time_elapsed: f32,
    /// Remaining time with a limit, elapsed time without
    pub timer: f32,
    pub coins: i32,
    pub goal_enabled: bool,
    pub jump: Jump,
    pub flight: Flight,
    pub punch: Punch,
    pub shot: Shot,
    /// Tilted gravity for this tick; `None` freezes the ball
    pub gravity: Option<Vec3>,
}

impl PlayerState {
    pub fn new(ball: usize, spawn: Vec3, view: View, time_limit: f32, goal_enabled: bool) -> Self {
        Self {
            ball,
            spawn,
            input: Input::default(),
            tilt: Tilt::default(),
            view,
            camera: Camera::default(),
            status: Status::None,
            time_limit,
            time_elapsed: 0.0,
            timer: time_limit,
            coins: 0,
            goal_enabled,
            jump: Jump::default(),
            flight: Flight::default(),
            punch: Punch::default(),
            shot: Shot::default(),
            gravity: None,
        }
    }

    /// Reset the attempt in place, keeping coins and the clock
    pub fn respawn(&mut self, view: View) {
        let input = Input {
            action_prev: self.input.action,
            ..self.input
        };
        *self = Self {
            input,
            view,
            coins: self.coins,
            time_elapsed: self.time_elapsed,
            timer: self.timer,
            ..Self::new(self.ball, self.spawn, view, self.time_limit, self.goal_enabled)
        };
    }

    /// Advance the clock; returns true when the limit has been reached
    pub fn update_time(&mut self, dt: f32) -> bool {
        self.time_elapsed += dt;
        if self.time_limit > 0.0 && self.time_elapsed > self.time_limit {
            self.time_elapsed = self.time_limit;
        }
        self.timer = (self.time_limit - self.time_elapsed).abs();
        self.time_limit > 0.0 && self.time_elapsed >= self.time_limit
    }
}

/// Physics handle of a player slot
#[derive(Debug, Clone)]
pub enum SimHandle {
    /// The slot owns its buffer and is the only one allowed to free it
    Owned(SimBuffer),
    /// The slot steers a ball inside a lower slot's buffer
    Shared { owner: usize },
}

impl SimHandle {
    /// Slot that owns the buffer, given this handle sits in slot `p`
    pub fn owner(&self, p: usize) -> usize {
        match self {
            SimHandle::Owned(_) => p,
            SimHandle::Shared { owner } => *owner,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PlayerSlot {
    pub handle: SimHandle,
    pub state: PlayerState,
}

/// Fixed array of slots; `None` is an inactive slot
pub type Slots = [Option<PlayerSlot>; MAX_PLAYERS];

/// Borrow player `p`'s state together with the buffer it plays in
///
/// Shared slots borrow their owner's buffer through a split of the slot
/// array, so the owner must sit at a lower index.
pub fn split_slot(slots: &mut Slots, p: usize) -> Option<(&mut PlayerState, &mut SimBuffer)> {
    let owner = slots.get(p)?.as_ref()?.handle.owner(p);

    if owner == p {
        let PlayerSlot { handle, state } = slots[p].as_mut()?;
        match handle {
            SimHandle::Owned(buffer) => Some((state, buffer)),
            SimHandle::Shared { .. } => None,
        }
    } else if owner < p {
        let (head, tail) = slots.split_at_mut(p);
        let state = &mut tail[0].as_mut()?.state;
        match &mut head[owner].as_mut()?.handle {
            SimHandle::Owned(buffer) => Some((state, buffer)),
            SimHandle::Shared { .. } => None,
        }
    } else {
        None
    }
}

/// Buffer played in by slot `p`
pub fn slot_buffer(slots: &Slots, p: usize) -> Option<&SimBuffer> {
    let owner = slots.get(p)?.as_ref()?.handle.owner(p);
    match &slots.get(owner)?.as_ref()?.handle {
        SimHandle::Owned(buffer) => Some(buffer),
        SimHandle::Shared { .. } => None,
    }
}

/// Active slots playing in the buffer owned by `owner`, in slot order
pub fn sharers(slots: &Slots, owner: usize) -> Vec<usize> {
    slots
        .iter()
        .enumerate()
        .filter_map(|(q, slot)| {
            slot.as_ref()
                .filter(|slot| slot.handle.owner(q) == owner)
                .map(|_| q)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::{Kernel, Level, SolidKernel};
    use std::sync::Arc;

    fn buffer() -> SimBuffer {
        SolidKernel::default()
            .load_vary(&Arc::new(Level::flat("flat", 5.0)))
            .unwrap()
    }

    fn slot(handle: SimHandle) -> Option<PlayerSlot> {
        Some(PlayerSlot {
            handle,
            state: PlayerState::new(0, Vec3::ZERO, View::default(), 0.0, false),
        })
    }

    #[test]
    fn test_split_slot_shared_borrows_owner_buffer() {
        let mut slots: Slots = [
            slot(SimHandle::Owned(buffer())),
            slot(SimHandle::Shared { owner: 0 }),
            None,
            None,
        ];
        let (state, buffer) = split_slot(&mut slots, 1).unwrap();
        state.coins = 3;
        buffer.balls[0].p.x = 1.0;

        assert_eq!(slots[1].as_ref().unwrap().state.coins, 3);
        assert_eq!(slot_buffer(&slots, 0).unwrap().balls[0].p.x, 1.0);
        assert_eq!(sharers(&slots, 0), vec![0, 1]);
        assert!(split_slot(&mut slots, 2).is_none());
        assert!(split_slot(&mut slots, 9).is_none());
    }

    #[test]
    fn test_input_clamps() {
        let mut input = Input::default();
        input.set_x(100.0);
        input.set_z(-100.0);
        input.set_r(50.0);
        assert_eq!(input.x, ANGLE_BOUND);
        assert_eq!(input.z, -ANGLE_BOUND);
        assert_eq!(input.r, VIEWR_BOUND);
    }

    #[test]
    fn test_action_edge_fires_once() {
        let mut input = Input::default();
        input.action = true;
        assert!(input.action_edge());
        assert!(!input.action_edge());
        input.action = false;
        assert!(!input.action_edge());
        input.action = true;
        assert!(input.action_edge());
    }

    #[test]
    fn test_timer_counts_down_and_caps() {
        let mut state = PlayerState::new(0, Vec3::ZERO, View::default(), 1.0, false);
        assert!(!state.update_time(0.5));
        assert!((state.timer - 0.5).abs() < 1e-6);
        assert!(state.update_time(0.75));
        assert_eq!(state.time_elapsed, 1.0);
        assert_eq!(state.timer, 0.0);
    }

    #[test]
    fn test_respawn_keeps_coins_and_clock() {
        let mut state = PlayerState::new(0, Vec3::ZERO, View::default(), 0.0, true);
        state.coins = 7;
        state.time_elapsed = 3.0;
        state.status = Status::Fall;
        state.flight.engaged = true;
        state.respawn(View::default());
        assert_eq!(state.coins, 7);
        assert_eq!(state.time_elapsed, 3.0);
        assert_eq!(state.status, Status::None);
        assert!(!state.flight.engaged);
        assert!(state.goal_enabled);
    }
}
