//! Authoritative simulation
//!
//! The server owns every player slot and the physics buffers. It advances in
//! fixed ticks and reports every observable change to the command log; it
//! never talks to the client directly.
//! - Fixed timestep only
//! - No RNG
//! - Stable iteration order (by slot, then by ball index)

mod emit;
pub mod mode;
pub mod state;
mod tick;
pub mod tilt;
pub mod view;
mod world;

pub use mode::{Mode, ModeRules, TARGET_ZONES, TargetZone, Tuning, zone_score};
pub use state::{PlayerState, SimHandle, Status};
pub use tilt::Tilt;
pub use view::View;
pub use world::World;

use std::sync::Arc;

use crate::cmd::CommandLog;
use crate::consts::*;
use crate::error::LoadError;
use crate::kernel::{Ball, Kernel, Level, SimBuffer, SolidKernel};
use crate::lockstep::Lockstep;
use crate::settings::Settings;

/// Server side of a game: world, command log and lockstep
#[derive(Debug)]
pub struct Server<K: Kernel = SolidKernel> {
    world: World<K>,
    log: CommandLog,
    lockstep: Lockstep,
}

impl Server<SolidKernel> {
    pub fn new(settings: Settings) -> Self {
        Self::with_kernel(SolidKernel::default(), settings)
    }
}

impl<K: Kernel> Server<K> {
    pub fn with_kernel(kernel: K, settings: Settings) -> Self {
        Self {
            world: World::new(kernel, settings),
            log: CommandLog::new(),
            lockstep: Lockstep::new(DT),
        }
    }

    /// Bring `base` into play
    ///
    /// `time_limit_cs` is in centiseconds (zero for no limit). On error the
    /// server is left torn down and the log empty.
    pub fn init(
        &mut self,
        base: Arc<Level>,
        mode: Mode,
        time_limit_cs: u32,
        goal_enabled: bool,
    ) -> Result<(), LoadError> {
        self.lockstep.clear();
        let result = self
            .world
            .init(base, mode, time_limit_cs, goal_enabled, &mut self.log);
        if let Err(err) = &result {
            log::warn!("level load failed: {err}");
            self.log.clear();
        }
        self.lockstep.clear();
        result
    }

    /// Tear down the level; safe to call repeatedly
    pub fn free(&mut self) {
        self.world.free();
        self.log.clear();
        self.lockstep.clear();
    }

    /// Run as many fixed ticks as `dt` of frame time covers
    pub fn step(&mut self, dt: f32) -> u32 {
        let Self {
            world,
            log,
            lockstep,
        } = self;
        lockstep.run(dt, |dt| world.iter(dt, log))
    }

    /// Render blend factor for the client, in [0, 1)
    pub fn blend(&self) -> f32 {
        self.lockstep.blend()
    }

    pub fn log(&self) -> &CommandLog {
        &self.log
    }

    pub fn log_mut(&mut self) -> &mut CommandLog {
        &mut self.log
    }

    pub fn settings(&self) -> &Settings {
        &self.world.settings
    }

    pub fn mode(&self) -> Mode {
        self.world.rules.mode()
    }

    pub fn is_loaded(&self) -> bool {
        self.world.is_loaded()
    }

    pub fn is_active(&self, p: usize) -> bool {
        self.world.state(p).is_some()
    }

    /// Number of active player slots
    pub fn player_count(&self) -> usize {
        self.world.active_count()
    }

    // === Input ===

    /// Joystick tilt about X, `k` in -1.0 - 1.0
    pub fn set_x(&mut self, k: f32, p: usize) {
        let s = self.world.settings.joystick_response_secs();
        if let Some(input) = self.world.input_mut(p) {
            input.set_x(-ANGLE_BOUND * k);
            input.set_s(s);
        }
    }

    /// Joystick tilt about Z, `k` in -1.0 - 1.0
    pub fn set_z(&mut self, k: f32, p: usize) {
        let s = self.world.settings.joystick_response_secs();
        if let Some(input) = self.world.input_mut(p) {
            input.set_z(ANGLE_BOUND * k);
            input.set_s(s);
        }
    }

    /// Absolute tilt angles in degrees
    pub fn set_ang(&mut self, x: f32, z: f32, p: usize) {
        if let Some(input) = self.world.input_mut(p) {
            input.set_x(x);
            input.set_z(z);
        }
    }

    /// Relative mouse motion
    pub fn set_pos(&mut self, dx: i32, dy: i32, p: usize) {
        let sense = self.world.settings.mouse_sense.max(1) as f32;
        let s = self.world.settings.mouse_response_secs();
        let range = ANGLE_BOUND * 2.0;
        if let Some(input) = self.world.input_mut(p) {
            input.set_x(input.x + range * dy as f32 / sense);
            input.set_z(input.z + range * dx as f32 / sense);
            input.set_s(s);
        }
    }

    pub fn set_cam(&mut self, c: usize, p: usize) {
        if let Some(input) = self.world.input_mut(p) {
            input.c = c;
        }
    }

    /// Manual view rotation rate
    pub fn set_rot(&mut self, r: f32, p: usize) {
        if let Some(input) = self.world.input_mut(p) {
            input.set_r(r);
        }
    }

    /// Mode action button (flight, punch, cue)
    pub fn set_action(&mut self, down: bool, p: usize) {
        if let Some(input) = self.world.input_mut(p) {
            input.action = down;
        }
    }

    pub fn set_goal(&mut self, p: usize) {
        self.world.set_goal(p, &mut self.log);
    }

    pub fn respawn(&mut self, p: usize) {
        self.world.respawn(p, &mut self.log);
    }

    // === Queries ===

    pub fn player(&self, p: usize) -> Option<&PlayerState> {
        self.world.state(p)
    }

    /// Buffer player `p` plays in
    pub fn buffer(&self, p: usize) -> Option<&SimBuffer> {
        state::slot_buffer(&self.world.slots, p)
    }

    /// Mutable access to player `p`'s buffer, for scripted setups
    pub fn buffer_mut(&mut self, p: usize) -> Option<&mut SimBuffer> {
        state::split_slot(&mut self.world.slots, p).map(|(_, buffer)| buffer)
    }

    pub fn ball(&self, p: usize) -> Option<&Ball> {
        let ball = self.player(p)?.ball;
        self.buffer(p)?.balls.get(ball)
    }

    /// Mutable access to player `p`'s ball, for scripted setups
    pub fn ball_mut(&mut self, p: usize) -> Option<&mut Ball> {
        let (state, buffer) = state::split_slot(&mut self.world.slots, p)?;
        buffer.balls.get_mut(state.ball)
    }

    pub fn time_elapsed(&self, p: usize) -> f32 {
        self.player(p).map_or(0.0, |s| s.time_elapsed)
    }

    pub fn status(&self, p: usize) -> Status {
        self.player(p).map_or(Status::None, |s| s.status)
    }

    pub fn coins(&self, p: usize) -> i32 {
        self.player(p).map_or(0, |s| s.coins)
    }

    /// Ball speed
    pub fn speed(&self, p: usize) -> f32 {
        self.ball(p).map_or(0.0, |b| b.v.length())
    }

    /// Height of the ball above the level's kill plane
    pub fn altitude(&self, p: usize) -> f32 {
        match (self.ball(p), self.buffer(p)) {
            (Some(ball), Some(buffer)) if !buffer.base.is_empty() => {
                ball.p.y - buffer.base.fall_y()
            }
            _ => 0.0,
        }
    }

    /// Target mode scoring rings
    pub fn zones(&self) -> &'static [TargetZone] {
        &TARGET_ZONES
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server(players: usize) -> Server {
        let settings = Settings {
            players,
            ..Settings::default()
        };
        Server::new(settings)
    }

    #[test]
    fn test_init_emits_map_then_eou() {
        let mut server = server(2);
        server
            .init(Arc::new(Level::flat("map-easy/flat.sol", 5.0)), Mode::Normal, 0, false)
            .unwrap();
        let cmds: Vec<_> = server.log_mut().drain().collect();
        assert!(matches!(cmds.first(), Some(crate::Command::Map { .. })));
        assert_eq!(cmds[1], crate::Command::UpdatesPerSecond(UPS));
        assert_eq!(cmds.last(), Some(&crate::Command::EndOfUpdate));
        assert_eq!(server.player_count(), 2);
    }

    #[test]
    fn test_second_player_is_offset() {
        let mut server = server(2);
        server
            .init(Arc::new(Level::flat("flat", 5.0)), Mode::Normal, 0, false)
            .unwrap();
        let p0 = server.ball(0).unwrap().p;
        let p1 = server.ball(1).unwrap().p;
        assert_eq!(p1 - p0, glam::Vec3::new(1.5, 0.0, 1.5));
    }

    #[test]
    fn test_input_ignores_bad_player() {
        let mut server = server(1);
        server
            .init(Arc::new(Level::flat("flat", 5.0)), Mode::Normal, 0, false)
            .unwrap();
        server.set_x(1.0, 7);
        server.set_rot(100.0, 0);
        server.set_ang(90.0, -90.0, 0);
        let input = server.player(0).unwrap().input;
        assert_eq!(input.r, VIEWR_BOUND);
        assert_eq!(input.x, ANGLE_BOUND);
        assert_eq!(input.z, -ANGLE_BOUND);
    }

    #[test]
    fn test_free_is_idempotent() {
        let mut server = server(1);
        server
            .init(Arc::new(Level::flat("flat", 5.0)), Mode::Normal, 0, false)
            .unwrap();
        server.free();
        server.free();
        assert!(!server.is_loaded());
        assert!(server.log().is_empty());
        assert!(server.step(0.5) > 0);
        assert!(server.log().is_empty());
    }

    #[test]
    fn test_fatal_load_tears_down() {
        let mut server = server(2);
        let err = server.init(Arc::new(Level::new("empty")), Mode::Normal, 0, false);
        assert!(matches!(err, Err(LoadError::NoBall(_))));
        assert!(!server.is_loaded());
        assert!(server.log().is_empty());
    }

    #[test]
    fn test_altitude_and_speed() {
        let mut server = server(1);
        server
            .init(Arc::new(Level::flat("flat", 5.0)), Mode::Normal, 0, false)
            .unwrap();
        assert!((server.altitude(0) - 1.25).abs() < 1e-5);
        assert_eq!(server.speed(0), 0.0);
        assert_eq!(server.altitude(3), 0.0);
        assert_eq!(server.zones().len(), 5);
    }
}
