//! Client replication
//!
//! The client never sees the simulation. It replays the command log into a
//! per-player mirror, keeps the last two ticks for interpolation and runs the
//! purely visual timers (goal and jump animations, particles, fades).

pub mod draw;
pub mod lerp;
pub mod particles;

pub use draw::{Draw, DrawBall, SwitchMirror, item_color};
pub use lerp::{Pair, PlayerLerp};
pub use particles::{MAX_PARTICLES, Particle, Particles};

use std::io::Write;
use std::sync::Arc;

use glam::Vec3;

use crate::audio::{SoundCue, SoundQueue};
use crate::cmd::{Command, CommandLog};
use crate::consts::*;
use crate::demo::DemoRecorder;
use crate::error::{DemoError, LoadError};
use crate::kernel::{ItemKind, Level};
use crate::settings::Settings;
use crate::sim::{Status, View};

/// HUD counters
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Stats {
    pub timer: f32,
    pub status: Status,
    pub coins: i32,
}

/// One active client player
#[derive(Debug, Clone)]
pub struct ClientPlayer {
    pub draw: Draw,
    pub lerp: PlayerLerp,
    pub stats: Stats,
}

impl ClientPlayer {
    fn new(level: &Level, view: View) -> Self {
        let draw = Draw {
            view,
            ..Draw::from_level(level)
        };
        let lerp = PlayerLerp::new(&draw);
        Self {
            draw,
            lerp,
            stats: Stats::default(),
        }
    }
}

/// Command decoder state
#[derive(Debug, Clone, Copy)]
struct CmdState {
    curr_player: usize,
    curr_ball: usize,
    got_tilt_axes: bool,
    next_update: bool,
    first_update: bool,
    ups: u32,
}

impl Default for CmdState {
    fn default() -> Self {
        Self {
            curr_player: 0,
            curr_ball: 0,
            got_tilt_axes: false,
            next_update: false,
            first_update: true,
            ups: 0,
        }
    }
}

#[derive(Debug)]
pub struct Client {
    players: [Option<ClientPlayer>; MAX_PLAYERS],
    cs: CmdState,
    base: Option<Arc<Level>>,
    /// Major version of the loaded level
    version: i32,
    compat_map: bool,
    interpolation: bool,
    view_distances: (f32, f32, f32),
    particles: Particles,
    sounds: SoundQueue,
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

impl Client {
    pub fn new() -> Self {
        Self {
            players: std::array::from_fn(|_| None),
            cs: CmdState::default(),
            base: None,
            version: 0,
            compat_map: false,
            interpolation: true,
            view_distances: (VIEW_DP, VIEW_DC, VIEW_DZ),
            particles: Particles::new(),
            sounds: SoundQueue::new(),
        }
    }

    /// Build the mirrors for a level
    pub fn init(&mut self, base: &Arc<Level>, settings: &Settings) -> Result<(), LoadError> {
        self.free();
        base.validate()?;

        self.interpolation = settings.interpolation;
        self.view_distances = settings.view_distances();
        self.sounds.set_master_volume(settings.master_volume);

        let (dp, dc, dz) = self.view_distances;
        for p in 0..settings.player_count() {
            self.players[p] = Some(ClientPlayer::new(base, View::new(dp, dc, dz)));
        }

        self.version = base.version.0;
        self.compat_map = self.version == 1;
        self.base = Some(Arc::clone(base));
        self.particles.reset();
        self.cs = CmdState::default();
        log::debug!("client mirrors built for '{}'", base.name);
        Ok(())
    }

    pub fn free(&mut self) {
        for slot in self.players.iter_mut() {
            *slot = None;
        }
        self.base = None;
        self.particles.reset();
        self.sounds.clear();
        self.cs = CmdState::default();
    }

    pub fn is_loaded(&self) -> bool {
        self.base.is_some()
    }

    /// Apply every queued command
    pub fn sync(&mut self, log: &mut CommandLog) {
        while let Some(cmd) = log.dequeue() {
            self.run_cmd(&cmd);
        }
    }

    /// Apply every queued command, writing each to `demo` first
    ///
    /// A write failure does not stop replication; the first error is
    /// returned once the log is drained.
    pub fn sync_recording<W: Write>(
        &mut self,
        log: &mut CommandLog,
        demo: &mut DemoRecorder<W>,
    ) -> Result<(), DemoError> {
        let mut result = Ok(());
        while let Some(cmd) = log.dequeue() {
            if result.is_ok() {
                if let Err(err) = demo.record(&cmd) {
                    log::warn!("demo write failed: {err}");
                    result = Err(err);
                }
            }
            self.run_cmd(&cmd);
        }
        result
    }

    /// Apply one command to the addressed player's CURR state
    pub fn run_cmd(&mut self, cmd: &Command) {
        if self.cs.next_update {
            for player in self.players.iter_mut().flatten() {
                player.lerp.copy();
            }
            self.cs.next_update = false;
        }

        match cmd {
            Command::SetPlayer(p) => {
                self.cs.curr_player = if *p < MAX_PLAYERS { *p } else { 0 };
                return;
            }
            Command::EndOfUpdate => {
                self.end_of_update();
                return;
            }
            Command::UpdatesPerSecond(n) => {
                self.cs.ups = *n;
                return;
            }
            Command::Map { major, .. } => {
                self.compat_map = self.version == *major;
                return;
            }
            Command::Sound { sound, volume } => {
                self.sounds.play(*sound, *volume);
                return;
            }
            _ => {}
        }

        let cs = &mut self.cs;
        let Some(player) = self.players[cs.curr_player].as_mut() else {
            return;
        };
        let lerp = &mut player.lerp;
        let draw = &mut player.draw;

        match cmd {
            Command::ClearBalls => {
                lerp.balls.clear();
                cs.curr_ball = 0;
            }
            Command::MakeBall => {
                lerp.balls.push(Pair::new(DrawBall::default()));
                cs.curr_ball = lerp.balls.len() - 1;
            }
            Command::CurrentBall(i) => {
                if *i < lerp.balls.len() {
                    cs.curr_ball = *i;
                }
            }
            Command::BallPosition(p) => {
                if let Some(ball) = lerp.balls.get_mut(cs.curr_ball) {
                    ball.curr.p = *p;
                }
            }
            Command::BallBasis { e0, e1 } => {
                if let Some(ball) = lerp.balls.get_mut(cs.curr_ball) {
                    ball.curr.e = [*e0, *e1, e0.cross(*e1)];
                }
            }
            Command::BallPendBasis { e0, e1 } => {
                if let Some(ball) = lerp.balls.get_mut(cs.curr_ball) {
                    ball.curr.pend = [*e0, *e1, e0.cross(*e1)];
                }
            }
            Command::BallRadius(r) => {
                if let Some(ball) = lerp.balls.get_mut(cs.curr_ball) {
                    ball.curr.r = *r;
                }
            }
            Command::BallInPlay(in_play) => {
                if let Some(ball) = lerp.balls.get_mut(cs.curr_ball) {
                    ball.set(DrawBall {
                        in_play: *in_play,
                        ..ball.curr
                    });
                }
            }
            Command::ViewPosition(p) => lerp.view.curr.p = *p,
            Command::ViewCenter(c) => lerp.view.curr.c = *c,
            Command::ViewBasis { e0, e1 } => {
                lerp.view.curr.e = [*e0, *e1, e0.cross(*e1)];
            }
            Command::TiltAxes { x, z } => {
                cs.got_tilt_axes = true;
                lerp.tilt.curr.x = *x;
                lerp.tilt.curr.z = *z;
            }
            Command::TiltAngles { x, z } => {
                if !cs.got_tilt_axes {
                    let e = lerp.view.curr.e;
                    lerp.tilt.curr.set_axes(&e);
                }
                lerp.tilt.curr.rx = *x;
                lerp.tilt.curr.rz = *z;
            }
            Command::Timer(t) => player.stats.timer = *t,
            Command::Coins(n) => player.stats.coins = *n,
            Command::Status(status) => player.stats.status = *status,
            Command::GoalOpen => {
                if !draw.goal_e {
                    draw.goal_e = true;
                    lerp.goal_k.curr = if cs.first_update { 1.0 } else { 0.0 };
                }
            }
            Command::JumpEnter => {
                draw.jump_b = true;
                draw.jump_e = false;
                lerp.jump_dt.set(0.0);
            }
            Command::JumpExit => draw.jump_e = true,
            Command::Punch(active) => {
                draw.punch_active = *active;
                lerp.punch_active.set(*active);
            }
            Command::PickItem(i) => {
                if let Some(item) = draw.items.get_mut(*i) {
                    if item.kind != ItemKind::None {
                        self.particles.burst(item.p, item_color(item));
                        item.kind = ItemKind::None;
                    }
                }
            }
            Command::SwchEnter(i) => {
                if let Some(switch) = draw.switches.get_mut(*i) {
                    switch.entered = true;
                }
            }
            Command::SwchToggle(i) => {
                if let Some(switch) = draw.switches.get_mut(*i) {
                    switch.on = !switch.on;
                }
            }
            Command::SwchExit(i) => {
                if let Some(switch) = draw.switches.get_mut(*i) {
                    switch.entered = false;
                }
            }
            Command::SetPlayer(_)
            | Command::EndOfUpdate
            | Command::UpdatesPerSecond(_)
            | Command::Map { .. }
            | Command::Sound { .. } => {}
        }
    }

    fn end_of_update(&mut self) {
        self.cs.got_tilt_axes = false;
        self.cs.next_update = true;

        if self.cs.first_update {
            for player in self.players.iter_mut().flatten() {
                player.lerp.copy();
                player.lerp.apply(&mut player.draw);
            }
            self.cs.first_update = false;
            return;
        }

        // Slot 0 drives the shared particle gravity
        let g = match &self.players[0] {
            Some(player) => {
                let g = if player.stats.status == Status::Goal {
                    GRAVITY_UP
                } else {
                    GRAVITY_DN
                };
                player.lerp.tilt.curr.gravity(g)
            }
            None => GRAVITY_DN,
        };

        if self.cs.ups == 0 {
            return;
        }
        let dt = 1.0 / self.cs.ups as f32;

        for player in self.players.iter_mut().flatten() {
            let (draw, lerp) = (&mut player.draw, &mut player.lerp);
            if draw.goal_e && lerp.goal_k.curr < 1.0 {
                lerp.goal_k.curr += dt;
            }
            if draw.jump_b {
                lerp.jump_dt.curr += dt;
                if lerp.jump_dt.prev >= 1.0 {
                    draw.jump_b = false;
                }
            }
        }
        self.particles.step(g, dt);
    }

    /// Set the render blend factor
    pub fn blend(&mut self, a: f32) {
        let alpha = if self.interpolation { a } else { 1.0 };
        for player in self.players.iter_mut().flatten() {
            player.lerp.alpha = alpha;
        }
    }

    /// Refresh every player's draw state from the interpolation buffers
    pub fn apply_all(&mut self) {
        for player in self.players.iter_mut().flatten() {
            player.lerp.apply(&mut player.draw);
        }
    }

    // === Queries ===

    pub fn is_active(&self, p: usize) -> bool {
        self.player(p).is_some()
    }

    pub fn player(&self, p: usize) -> Option<&ClientPlayer> {
        self.players.get(p)?.as_ref()
    }

    pub fn draw(&self, p: usize) -> Option<&Draw> {
        self.player(p).map(|player| &player.draw)
    }

    pub fn lerp(&self, p: usize) -> Option<&PlayerLerp> {
        self.player(p).map(|player| &player.lerp)
    }

    /// Timer in centiseconds
    pub fn clock(&self, p: usize) -> i32 {
        self.player(p)
            .map_or(0, |player| (player.stats.timer * 100.0) as i32)
    }

    pub fn coins(&self, p: usize) -> i32 {
        self.player(p).map_or(0, |player| player.stats.coins)
    }

    pub fn status(&self, p: usize) -> Status {
        self.player(p).map_or(Status::None, |player| player.stats.status)
    }

    /// Whether the server's level version matches ours
    pub fn compat_map(&self) -> bool {
        self.compat_map
    }

    pub fn ups(&self) -> u32 {
        self.cs.ups
    }

    pub fn particles(&self) -> &Particles {
        &self.particles
    }

    /// Sound cues received since the last call
    pub fn take_sounds(&mut self) -> Vec<SoundCue> {
        self.sounds.drain()
    }

    pub fn sounds_mut(&mut self) -> &mut SoundQueue {
        &mut self.sounds
    }

    // === Presentation ===

    /// Free look for player 0
    pub fn look(&mut self, phi: f32, theta: f32) {
        if let Some(player) = self.players[0].as_mut() {
            player.lerp.view.curr.look(phi, theta);
            let view = player.lerp.view.curr;
            player.lerp.view.set(view);
        }
    }

    /// Intro fly-by: `k = 0` is the chase view, `k = ±1` the level's view points
    pub fn fly(&mut self, k: f32) {
        let Some(base) = self.base.as_ref() else {
            return;
        };
        let (dp, dc, dz) = self.view_distances;
        let spawn = base.balls.first().map(|b| b.p);
        for player in self.players.iter_mut().flatten() {
            let ball = player.lerp.balls.first().map(|b| b.curr.p).or(spawn);
            let view = View::fly(dp, dc, dz, ball, &base.views, k);
            player.lerp.view.set(view);
        }
    }

    pub fn fade(&mut self, d: f32) {
        for player in self.players.iter_mut().flatten() {
            player.draw.fade_d = d;
        }
    }

    pub fn step_fade(&mut self, dt: f32) {
        for player in self.players.iter_mut().flatten() {
            player.draw.step_fade(dt);
        }
    }

    pub fn kill_fade(&mut self) {
        for player in self.players.iter_mut().flatten() {
            player.draw.fade_k = 0.0;
            player.draw.fade_d = 0.0;
        }
    }

    /// Position of the camera for player `p`, for audio panning and the like
    pub fn view_position(&self, p: usize) -> Option<Vec3> {
        self.draw(p).map(|draw| draw.view.p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::ItemKind;

    fn client(players: usize, level: Level) -> Client {
        let settings = Settings {
            players,
            ..Settings::default()
        };
        let mut client = Client::new();
        client.init(&Arc::new(level), &settings).unwrap();
        client
    }

    fn feed(client: &mut Client, cmds: &[Command]) {
        for cmd in cmds {
            client.run_cmd(cmd);
        }
    }

    #[test]
    fn test_set_player_out_of_range_is_zero() {
        let mut client = client(2, Level::flat("flat", 5.0));
        feed(&mut client, &[Command::SetPlayer(1), Command::Coins(3)]);
        assert_eq!(client.coins(1), 3);
        feed(&mut client, &[Command::SetPlayer(9), Command::Coins(7)]);
        assert_eq!(client.coins(0), 7);
        assert_eq!(client.coins(1), 3);
    }

    #[test]
    fn test_inactive_player_commands_ignored() {
        let mut client = client(1, Level::flat("flat", 5.0));
        feed(&mut client, &[Command::SetPlayer(3), Command::Coins(5)]);
        assert_eq!(client.coins(3), 0);
        assert_eq!(client.coins(0), 0);
    }

    #[test]
    fn test_ball_commands_follow_current_ball() {
        let mut client = client(1, Level::flat("flat", 5.0));
        feed(
            &mut client,
            &[
                Command::SetPlayer(0),
                Command::ClearBalls,
                Command::MakeBall,
                Command::MakeBall,
                Command::BallPosition(Vec3::new(1.0, 0.0, 0.0)),
                Command::CurrentBall(0),
                Command::BallRadius(0.5),
                Command::CurrentBall(5),
                Command::BallPosition(Vec3::new(9.0, 9.0, 9.0)),
            ],
        );
        let lerp = client.lerp(0).unwrap();
        assert_eq!(lerp.balls.len(), 2);
        assert_eq!(lerp.balls[1].curr.p, Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(lerp.balls[0].curr.r, 0.5);
        assert_eq!(lerp.balls[0].curr.p, Vec3::new(9.0, 9.0, 9.0));
    }

    #[test]
    fn test_first_update_applies_immediately() {
        let mut client = client(1, Level::flat("flat", 5.0));
        feed(
            &mut client,
            &[
                Command::SetPlayer(0),
                Command::MakeBall,
                Command::BallPosition(Vec3::new(0.0, 0.25, 0.0)),
                Command::GoalOpen,
                Command::EndOfUpdate,
            ],
        );
        let draw = client.draw(0).unwrap();
        assert_eq!(draw.balls[0].p, Vec3::new(0.0, 0.25, 0.0));
        assert_eq!(draw.goal_k, 1.0);
        assert_eq!(client.lerp(0).unwrap().copies, 1);
    }

    #[test]
    fn test_copy_happens_lazily_after_end_of_update() {
        let mut client = client(1, Level::flat("flat", 5.0));
        feed(&mut client, &[Command::SetPlayer(0), Command::MakeBall, Command::EndOfUpdate]);
        feed(
            &mut client,
            &[Command::SetPlayer(0), Command::BallPosition(Vec3::X), Command::EndOfUpdate],
        );
        let lerp = client.lerp(0).unwrap();
        assert_eq!(lerp.copies, 2);
        assert_eq!(lerp.balls[0].prev.p, Vec3::ZERO);
        assert_eq!(lerp.balls[0].curr.p, Vec3::X);

        feed(&mut client, &[Command::SetPlayer(0)]);
        let lerp = client.lerp(0).unwrap();
        assert_eq!(lerp.copies, 3);
        assert_eq!(lerp.balls[0].prev.p, Vec3::X);
    }

    #[test]
    fn test_tilt_axes_fallback_to_view() {
        let mut client = client(1, Level::flat("flat", 5.0));
        feed(
            &mut client,
            &[
                Command::SetPlayer(0),
                Command::ViewBasis { e0: Vec3::Z, e1: Vec3::Y },
                Command::TiltAngles { x: 5.0, z: -5.0 },
            ],
        );
        let tilt = client.lerp(0).unwrap().tilt.curr;
        assert_eq!(tilt.x, Vec3::Z);
        assert_eq!(tilt.rx, 5.0);
        assert_eq!(tilt.rz, -5.0);
    }

    #[test]
    fn test_pick_item_bursts_once() {
        let level = Level::flat("flat", 5.0).with_item(Vec3::new(1.0, 0.2, 0.0), ItemKind::Coin, 1);
        let mut client = client(1, level);
        feed(
            &mut client,
            &[
                Command::SetPlayer(0),
                Command::PickItem(0),
                Command::PickItem(0),
                Command::PickItem(42),
            ],
        );
        assert_eq!(client.draw(0).unwrap().items[0].kind, ItemKind::None);
        assert_eq!(client.particles().len(), 24);
    }

    #[test]
    fn test_switch_mirror() {
        let level = Level::flat("flat", 5.0).with_switch(Vec3::ZERO, 0.5, false);
        let mut client = client(1, level);
        feed(
            &mut client,
            &[
                Command::SetPlayer(0),
                Command::SwchEnter(0),
                Command::SwchToggle(0),
                Command::SwchToggle(3),
            ],
        );
        let switch = client.draw(0).unwrap().switches[0];
        assert!(switch.on);
        assert!(switch.entered);
        feed(&mut client, &[Command::SwchExit(0)]);
        assert!(!client.draw(0).unwrap().switches[0].entered);
    }

    #[test]
    fn test_goal_animation_advances_per_tick() {
        let mut client = client(1, Level::flat("flat", 5.0));
        feed(&mut client, &[Command::UpdatesPerSecond(10), Command::EndOfUpdate]);
        feed(&mut client, &[Command::SetPlayer(0), Command::GoalOpen, Command::EndOfUpdate]);
        let k = client.lerp(0).unwrap().goal_k.curr;
        assert!((k - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_jump_animation_ends() {
        let mut client = client(1, Level::flat("flat", 5.0));
        feed(&mut client, &[Command::UpdatesPerSecond(4), Command::EndOfUpdate]);
        feed(&mut client, &[Command::SetPlayer(0), Command::JumpEnter, Command::EndOfUpdate]);
        for _ in 0..6 {
            feed(&mut client, &[Command::SetPlayer(0), Command::EndOfUpdate]);
        }
        assert!(!client.draw(0).unwrap().jump_b);
    }

    #[test]
    fn test_map_compat_flag() {
        let mut client = client(1, Level::flat("flat", 5.0).with_version(2, 1));
        assert!(!client.compat_map());
        feed(&mut client, &[Command::Map { name: "flat".into(), major: 2, minor: 0 }]);
        assert!(client.compat_map());
        feed(&mut client, &[Command::Map { name: "flat".into(), major: 1, minor: 0 }]);
        assert!(!client.compat_map());
    }

    #[test]
    fn test_blend_without_interpolation_is_one() {
        let settings = Settings {
            interpolation: false,
            ..Settings::default()
        };
        let mut client = Client::new();
        client.init(&Arc::new(Level::flat("flat", 5.0)), &settings).unwrap();
        client.blend(0.3);
        assert_eq!(client.lerp(0).unwrap().alpha, 1.0);
    }

    #[test]
    fn test_sounds_and_clock() {
        let mut client = client(1, Level::flat("flat", 5.0));
        feed(
            &mut client,
            &[
                Command::Sound { sound: crate::audio::Sound::Coin, volume: 1.0 },
                Command::SetPlayer(0),
                Command::Timer(12.345),
            ],
        );
        assert_eq!(client.take_sounds().len(), 1);
        assert!(client.take_sounds().is_empty());
        assert_eq!(client.clock(0), 1234);
    }

    #[test]
    fn test_look_snaps_prev() {
        let mut client = client(1, Level::flat("flat", 5.0));
        client.look(0.0, 0.0);
        let view = client.lerp(0).unwrap().view;
        assert_eq!(view.prev, view.curr);
        assert!((view.curr.c - (view.curr.p - Vec3::Z)).length() < 1e-6);
    }

    #[test]
    fn test_init_rejects_empty_level() {
        let mut client = Client::new();
        let err = client.init(&Arc::new(Level::new("empty")), &Settings::default());
        assert!(err.is_err());
        assert!(!client.is_loaded());
    }
}
