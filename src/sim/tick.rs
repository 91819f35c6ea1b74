//! Fixed timestep simulation tick
//!
//! One tick runs in phases so shared buffers see every player's input before
//! their balls move:
//! 1. per player: mode pre-step, tilt, jump transit
//! 2. per buffer owner: grow/shrink and physics for every ball, then
//!    buffer-wide mode rules
//! 3. per player: replication, view, clock and status tests
//!
//! and closes with `EndOfUpdate`.

use std::cmp::Ordering;

use glam::Vec3;

use super::emit;
use super::state::{JumpPhase, PlayerState, Punch, SimHandle, Status, sharers, split_slot};
use super::world::World;
use crate::audio::Sound;
use crate::cmd::{Command, CommandLog};
use crate::consts::*;
use crate::ease_in_out_back;
use crate::kernel::{ItemKind, JumpTest, Kernel, SimBuffer, SwitchTest};
use crate::settings::Settings;

impl<K: Kernel> World<K> {
    /// Advance the world by one fixed timestep
    pub(crate) fn iter(&mut self, dt: f32, log: &mut CommandLog) {
        if self.base.is_none() {
            return;
        }
        for p in 0..MAX_PLAYERS {
            self.pre_step(p, dt, log);
        }
        for owner in 0..MAX_PLAYERS {
            self.physics(owner, dt, log);
        }
        for p in 0..MAX_PLAYERS {
            self.post_step(p, dt, log);
        }
        emit::end_of_update(log);
    }

    fn pre_step(&mut self, p: usize, dt: f32, log: &mut CommandLog) {
        let tilts = self.rules.tilts();
        let Some((state, buffer)) = split_slot(&mut self.slots, p) else {
            return;
        };

        let g = match state.status {
            Status::None | Status::Fall => GRAVITY_DN,
            Status::Goal => GRAVITY_UP,
            Status::Time => {
                state.gravity = None;
                return;
            }
        };

        if state.status == Status::None {
            self.rules.pre_step(p, state, buffer, dt, log);
        }

        let (tx, tz) = self.rules.tilt_target(state);
        state.tilt.integrate(tx, tz, dt, state.input.s);
        state.tilt.set_axes(&state.view.e);
        emit::tilt(log, p, &state.tilt);

        state.gravity = Some(if tilts { state.tilt.gravity(g) } else { g });

        if state.jump.in_transit() {
            state.jump.dt += dt;
            if state.jump.dt >= JUMP_TELEPORT {
                if let Some(ball) = buffer.balls.get_mut(state.ball) {
                    if state.jump.phase == JumpPhase::Entered {
                        state.view.p += state.jump.dest - ball.p;
                        state.jump.phase = JumpPhase::Placed;
                    }
                    ball.p = state.jump.dest;
                }
            }
            if state.jump.dt >= JUMP_END {
                state.jump.phase = JumpPhase::Idle;
            }
        }
    }

    fn physics(&mut self, owner: usize, dt: f32, log: &mut CommandLog) {
        let players = sharers(&self.slots, owner);
        let tilts = self.rules.tilts();

        // Gravity per ball from the players steering them
        let Some(n) = self.slots[owner].as_ref().and_then(|slot| match &slot.handle {
            SimHandle::Owned(buffer) => Some(buffer.balls.len()),
            SimHandle::Shared { .. } => None,
        }) else {
            return;
        };
        let mut gravity = vec![Some(GRAVITY_DN); n];
        let mut frozen = vec![false; n];
        for &q in &players {
            let Some(state) = self.slots[q].as_ref().map(|slot| &slot.state) else {
                continue;
            };
            if state.status == Status::Time {
                if let Some(f) = frozen.get_mut(state.ball) {
                    *f = true;
                }
            }
            let Some(g) = gravity.get_mut(state.ball) else {
                continue;
            };
            if state.jump.in_transit() {
                *g = None;
            } else if tilts || state.gravity.is_none() {
                *g = state.gravity;
            }
        }

        let Some(SimHandle::Owned(buffer)) = self.slots[owner].as_mut().map(|slot| &mut slot.handle)
        else {
            return;
        };

        // Grow/shrink once per ball, however many players steer it
        for (i, ball) in buffer.balls.iter_mut().enumerate() {
            if frozen[i] || !ball.grow_step(dt) {
                continue;
            }
            for &q in &players {
                emit::ball_radius(log, q, i, ball.r);
            }
        }

        for (i, g) in gravity.into_iter().enumerate() {
            let Some(g) = g else { continue };
            let b = self.kernel.step(buffer, g, dt, i);
            if b > BUMP_THRESHOLD {
                let ball = &buffer.balls[i];
                let sound = match ball.r.partial_cmp(&ball.sizes[1]) {
                    Some(Ordering::Greater) => Sound::BumpLarge,
                    Some(Ordering::Less) => Sound::BumpSmall,
                    _ => Sound::BumpMedium,
                };
                emit::sound(log, sound, (b - BUMP_THRESHOLD) * 2.0);
            }
        }

        let pockets = self.rules.after_physics(buffer, log);

        for pocket in pockets {
            for &q in &players {
                if pocket.scratch {
                    emit::ball_radius(log, q, pocket.ball, pocket.r);
                } else {
                    emit::ball_in_play(log, q, pocket.ball, false);
                }
            }
            let Some(shooter) = pocket.shooter.filter(|_| pocket.score != 0) else {
                continue;
            };
            if let Some(slot) = self.slots.get_mut(shooter).and_then(|s| s.as_mut()) {
                slot.state.coins += pocket.score;
                emit::coins(log, shooter, slot.state.coins);
            }
        }
    }

    fn post_step(&mut self, p: usize, dt: f32, log: &mut CommandLog) {
        let audience = self.audience(p);
        let checks_goal = self.rules.checks_goal();
        let Some((state, buffer)) = split_slot(&mut self.slots, p) else {
            return;
        };

        let live = match state.status {
            Status::None => true,
            Status::Goal | Status::Fall => false,
            Status::Time => return,
        };

        emit::balls(log, p, buffer);
        update_view(&self.settings, p, state, buffer, dt, log);
        if live {
            state.update_time(dt);
            emit::timer(log, p, state.timer);
        }

        let mut status = update_state(&self.kernel, checks_goal, p, state, buffer, live, &audience, log);
        if live && status == Status::None {
            status = self
                .rules
                .post_step(p, state, buffer, log)
                .unwrap_or(Status::None);
        }

        if live && status != Status::None {
            if state.punch.is_active() {
                state.punch = Punch::Idle;
                emit::punch(log, p, false);
            }
            state.status = status;
            emit::status(log, p, status);
            log::info!("player {p} finished with {status:?}");
        }
    }
}

/// Chase camera, zoom and manual rotation
fn update_view(
    settings: &Settings,
    p: usize,
    state: &mut PlayerState,
    buffer: &SimBuffer,
    dt: f32,
    log: &mut CommandLog,
) {
    let Some(ball) = buffer.balls.get(state.ball) else {
        return;
    };
    let cam = &mut state.camera;
    let view = &mut state.view;

    if cam.zoom_time < ZOOM_TIME {
        cam.zoom_time += dt;
        if cam.zoom_time >= ZOOM_TIME {
            cam.zoom_time = ZOOM_TIME;
            cam.zoom = cam.zoom_end;
        } else if cam.zoom_time >= ZOOM_DELAY {
            let a = ease_in_out_back((cam.zoom_time - ZOOM_DELAY) / (ZOOM_TIME - ZOOM_DELAY));
            cam.zoom = cam.zoom_start + (cam.zoom_end - cam.zoom_start) * a;
        }
    }
    let scl = cam.zoom;

    let dc = view.dc
        * if state.jump.in_transit() {
            2.0 * (state.jump.dt - 0.5).abs()
        } else {
            1.0
        };
    let da = 90.0 * state.input.r * dt;
    let spd = settings.camera_speed(state.input.c);

    // Track manual rotation time
    if da == 0.0 {
        if cam.time < 0.0 {
            cam.fade = (-cam.time).clamp(VIEW_FADE_MIN, VIEW_FADE_MAX);
            cam.time = 0.0;
        }
        cam.time += dt;
    } else {
        if cam.time > 0.0 {
            cam.fade = 0.0;
            cam.time = 0.0;
        }
        cam.time -= dt;
    }

    view.c = ball.p;
    let view_v = Vec3::new(-ball.v.x, 0.0, -ball.v.z);

    if spd >= 0.0 {
        if da == 0.0 {
            view.e[2] = (view.p - view.c).try_normalize().unwrap_or(view.e[2]);
            let s = if cam.fade > 0.0 {
                (cam.time / cam.fade).powi(3)
            } else {
                1.0
            };
            view.e[2] += view_v * (view_v.length() * spd * s.clamp(0.0, 1.0) * dt);
        }
    } else {
        let a = view.a.to_radians();
        view.e[2] = Vec3::new(a.sin(), 0.0, a.cos());
    }

    if da != 0.0 {
        view.e[2] = glam::Quat::from_rotation_y(da.to_radians()) * view.e[2];
    }

    view.e[0] = view.e[1].cross(view.e[2]).try_normalize().unwrap_or(Vec3::X);
    view.e[2] = view.e[0].cross(view.e[1]).try_normalize().unwrap_or(Vec3::Z);

    let k = 1.0 + view.e[2].dot(view_v) / 10.0;
    cam.k = (cam.k + (k - cam.k) * dt).max(0.5);

    view.p = ball.p + view.e[1] * (scl * view.dp * cam.k) + view.e[2] * (scl * view.dz * cam.k);
    view.c = ball.p + view.e[1] * (scl * dc);
    view.a = view.e[2].x.atan2(view.e[2].z).to_degrees();

    emit::view(log, p, view);
}

/// Item, switch, jump, goal, time and fall tests; returns the new status
#[allow(clippy::too_many_arguments)]
fn update_state<K: Kernel>(
    kernel: &K,
    checks_goal: bool,
    p: usize,
    state: &mut PlayerState,
    buffer: &mut SimBuffer,
    live: bool,
    audience: &[usize],
    log: &mut CommandLog,
) -> Status {
    let ball = state.ball;

    if live {
        if let Some(index) = kernel.item_test(buffer, ball, ITEM_RADIUS) {
            pick_item(p, state, buffer, index, audience, log);
        }
    }

    let mut switches = CommandLog::new();
    let touched = kernel.swch_test(buffer, ball, &mut switches);
    let cmds: Vec<Command> = switches.drain().collect();
    emit::broadcast(log, audience, &cmds);
    if touched == SwitchTest::Inside {
        emit::sound(log, Sound::Switch, 1.0);
    }

    if !state.jump.in_transit() {
        match kernel.jump_test(buffer, ball) {
            JumpTest::Inside(dest) if state.jump.enabled => {
                state.jump.phase = JumpPhase::Entered;
                state.jump.enabled = false;
                state.jump.dt = 0.0;
                state.jump.dest = dest;
                emit::sound(log, Sound::Jump, 1.0);
                emit::jump(log, p, true);
            }
            JumpTest::Outside if !state.jump.enabled => {
                state.jump.enabled = true;
                emit::jump(log, p, false);
            }
            _ => {}
        }
    }

    if !live {
        return Status::None;
    }

    if checks_goal && state.goal_enabled && kernel.goal_test(buffer, ball).is_some() {
        emit::sound(log, Sound::Goal, 1.0);
        return Status::Goal;
    }

    if state.time_limit > 0.0 && state.time_elapsed >= state.time_limit {
        emit::sound(log, Sound::Time, 1.0);
        return Status::Time;
    }

    let fell = buffer.base.is_empty()
        || buffer
            .balls
            .get(ball)
            .is_some_and(|b| b.p.y < buffer.base.fall_y());
    if fell {
        emit::sound(log, Sound::Fall, 1.0);
        return Status::Fall;
    }

    Status::None
}

/// Apply an item's effect and take it out of the level
fn pick_item(
    p: usize,
    state: &mut PlayerState,
    buffer: &mut SimBuffer,
    index: usize,
    audience: &[usize],
    log: &mut CommandLog,
) {
    let Some(item) = buffer.items.get(index).copied() else {
        return;
    };
    emit::broadcast(log, audience, &[Command::PickItem(index)]);

    match item.kind {
        ItemKind::None => {}
        ItemKind::Coin => {
            state.coins += item.n;
            emit::coins(log, p, state.coins);
        }
        ItemKind::Banana => {
            state.coins += item.n;
            emit::coins(log, p, state.coins);
            emit::sound(log, Sound::Banana, 1.0);
        }
        ItemKind::Clock => {
            emit::sound(log, Sound::Clock, 1.0);
            let value = item.n as f32;
            if state.time_limit > 0.0 {
                state.time_limit += value;
            } else {
                state.time_elapsed = (state.time_elapsed - value).max(0.0);
            }
            state.update_time(0.0);
            emit::timer(log, p, state.timer);
        }
        ItemKind::Grow | ItemKind::Shrink => {
            if let Some(ball) = buffer.balls.get_mut(state.ball) {
                let sound = match ball.grow_init(item.kind) {
                    Ordering::Less => Some(Sound::Shrink),
                    Ordering::Greater => Some(Sound::Grow),
                    Ordering::Equal => None,
                };
                if let Some(sound) = sound {
                    emit::sound(log, sound, 1.0);
                    state.camera.zoom_to(ball.sizes[ball.size] / ball.sizes[1]);
                }
            }
        }
        ItemKind::Speed => {
            let forward = state.view.forward();
            if let Some(ball) = buffer.balls.get_mut(state.ball) {
                if ball.v.length() > 0.5 {
                    ball.v *= SPEED_BOOST;
                } else {
                    ball.v += forward * SPEED_KICK;
                }
            }
            emit::sound(log, Sound::Speed, 1.0);
        }
        ItemKind::Missile => {
            if let Some(origin) = buffer.balls.get(state.ball).map(|b| b.p) {
                for (j, other) in buffer.balls.iter_mut().enumerate() {
                    if j == state.ball || !other.in_play {
                        continue;
                    }
                    let d = other.p - origin;
                    if d.length() >= MISSILE_RADIUS {
                        continue;
                    }
                    let away = crate::horizontal(d).try_normalize().unwrap_or(Vec3::X);
                    other.v += (away + Vec3::Y * 0.5).normalize() * MISSILE_IMPULSE;
                }
            }
            emit::sound(log, Sound::Missile, 1.0);
        }
    }

    emit::sound(log, Sound::Coin, 1.0);
    buffer.items[index].kind = ItemKind::None;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::{Level, SolidKernel};
    use crate::sim::Mode;
    use std::sync::Arc;

    fn world(level: Level, mode: Mode, players: usize) -> (World<SolidKernel>, CommandLog) {
        let settings = Settings {
            players,
            ..Settings::default()
        };
        let mut world = World::new(SolidKernel::default(), settings);
        let mut log = CommandLog::new();
        world.init(Arc::new(level), mode, 0, false, &mut log).unwrap();
        log.clear();
        (world, log)
    }

    fn buffer(world: &World<SolidKernel>, p: usize) -> &SimBuffer {
        crate::sim::state::slot_buffer(&world.slots, p).unwrap()
    }

    #[test]
    fn test_tick_ends_with_eou() {
        let (mut world, mut log) = world(Level::flat("flat", 5.0), Mode::Normal, 1);
        world.iter(DT, &mut log);
        let cmds: Vec<_> = log.drain().collect();
        assert_eq!(cmds.last(), Some(&Command::EndOfUpdate));
        assert!(cmds.contains(&Command::SetPlayer(0)));
    }

    #[test]
    fn test_coin_pickup() {
        let level = Level::flat("coins", 5.0).with_item(Vec3::new(0.0, 0.25, 0.0), ItemKind::Coin, 5);
        let (mut world, mut log) = world(level, Mode::Normal, 1);
        world.iter(DT, &mut log);

        assert_eq!(world.state(0).unwrap().coins, 5);
        assert_eq!(buffer(&world, 0).items[0].kind, ItemKind::None);
        let cmds: Vec<_> = log.drain().collect();
        assert!(cmds.contains(&Command::PickItem(0)));
        assert!(cmds.contains(&Command::Coins(5)));
    }

    #[test]
    fn test_clock_without_limit_rewinds_elapsed() {
        let level = Level::flat("clock", 5.0).with_item(Vec3::new(0.0, 0.25, 0.0), ItemKind::Clock, 2);
        let (mut world, mut log) = world(level, Mode::Normal, 1);
        world.slots[0].as_mut().unwrap().state.time_elapsed = 5.0;
        world.iter(DT, &mut log);
        let state = world.state(0).unwrap();
        assert!((state.time_elapsed - (3.0 + DT)).abs() < 1e-4);
    }

    #[test]
    fn test_grow_item_starts_zoom() {
        let level = Level::flat("grow", 5.0).with_item(Vec3::new(0.0, 0.25, 0.0), ItemKind::Grow, 0);
        let (mut world, mut log) = world(level, Mode::Normal, 1);
        world.iter(DT, &mut log);
        let state = world.state(0).unwrap();
        assert_eq!(state.camera.zoom_end, ZOOM_MAX);
        assert_eq!(buffer(&world, 0).balls[0].size, 2);
    }

    #[test]
    fn test_goal_requires_open_goal() {
        let level = Level::flat("goal", 5.0).with_goal(Vec3::ZERO, 1.0);
        let (mut world, mut log) = world(level, Mode::Normal, 1);
        world.iter(DT, &mut log);
        assert_eq!(world.state(0).unwrap().status, Status::None);

        world.set_goal(0, &mut log);
        world.iter(DT, &mut log);
        assert_eq!(world.state(0).unwrap().status, Status::Goal);
        assert!(log.iter().any(|c| *c == Command::Status(Status::Goal)));
    }

    #[test]
    fn test_time_out_freezes_ball() {
        let settings = Settings::default();
        let mut world = World::new(SolidKernel::default(), settings);
        let mut log = CommandLog::new();
        world
            .init(Arc::new(Level::flat("timed", 5.0)), Mode::Normal, 5, false, &mut log)
            .unwrap();
        for _ in 0..10 {
            world.iter(DT, &mut log);
        }
        assert_eq!(world.state(0).unwrap().status, Status::Time);

        let before = buffer(&world, 0).balls[0].clone();
        world.iter(DT, &mut log);
        assert_eq!(buffer(&world, 0).balls[0], before);
    }

    #[test]
    fn test_jump_carries_ball() {
        let level = Level::flat("jump", 10.0).with_jump(Vec3::ZERO, 1.0, Vec3::new(5.0, 0.0, 0.0));
        let (mut world, mut log) = world(level, Mode::Normal, 1);
        for _ in 0..(2 * UPS as usize) {
            world.iter(DT, &mut log);
        }
        let ball = &buffer(&world, 0).balls[0];
        assert!((ball.p.x - 5.0).abs() < 0.1, "ball at {}", ball.p);
        assert!(!world.state(0).unwrap().jump.in_transit());
    }

    #[test]
    fn test_missile_pushes_other_balls() {
        let level = Level::flat("battle", 10.0).with_item(Vec3::new(0.0, 0.25, 0.0), ItemKind::Missile, 0);
        let (mut world, mut log) = world(level, Mode::Battle, 2);
        world.iter(DT, &mut log);
        let other = &buffer(&world, 0).balls[1];
        assert!(other.v.length() > 1.0);
    }

    #[test]
    fn test_shared_switch_toggles_once_while_occupied() {
        let level = Level::flat("battle", 10.0).with_switch(Vec3::ZERO, 1.0, false);
        let (mut world, mut log) = world(level, Mode::Battle, 2);
        for _ in 0..10 {
            world.iter(DT, &mut log);
        }
        let toggles = log.iter().filter(|c| matches!(c, Command::SwchToggle(0))).count();
        // One toggle, mirrored to both players
        assert_eq!(toggles, 2);
        assert!(buffer(&world, 0).switches[0].on);
        assert!(!log.iter().any(|c| matches!(c, Command::SwchExit(_))));
    }

    fn cue_grow_ticks(players: usize) -> (usize, usize) {
        let (mut world, mut log) = world(Level::flat("table", 10.0), Mode::Billiards, players);
        let (_, table) = split_slot(&mut world.slots, 0).unwrap();
        table.balls[0].grow_init(ItemKind::Grow);

        world.iter(DT, &mut log);
        let radii = log
            .drain()
            .filter(|c| matches!(c, Command::BallRadius(_)))
            .count();

        let mut ticks = 1;
        while buffer(&world, 0).balls[0].r_vel != 0.0 {
            world.iter(DT, &mut log);
            ticks += 1;
            assert!(ticks < 1000);
        }
        (ticks, radii)
    }

    #[test]
    fn test_shared_cue_grows_at_fixed_rate() {
        let (solo, solo_radii) = cue_grow_ticks(1);
        let (shared, shared_radii) = cue_grow_ticks(4);
        assert_eq!(solo, shared);
        assert!((44..=46).contains(&solo));
        assert_eq!(solo_radii, 1);
        assert_eq!(shared_radii, 4);
    }

    #[test]
    fn test_finish_mid_punch_releases_punch() {
        let (mut world, mut log) = world(Level::flat("arena", 6.0), Mode::Fight, 2);
        world.slots[0].as_mut().unwrap().state.input.action = true;
        world.iter(DT, &mut log);
        assert!(world.state(0).unwrap().punch.is_active());

        let (_, arena) = split_slot(&mut world.slots, 0).unwrap();
        arena.balls[0].p.y = -50.0;
        log.clear();
        world.iter(DT, &mut log);

        let state = world.state(0).unwrap();
        assert_eq!(state.status, Status::Fall);
        assert_eq!(state.punch, Punch::Idle);
        let cmds: Vec<_> = log.drain().collect();
        let release = cmds.iter().position(|c| *c == Command::Punch(false));
        let fall = cmds.iter().position(|c| *c == Command::Status(Status::Fall));
        assert!(release.is_some() && release < fall);
    }

    #[test]
    fn test_respawn_mid_punch_releases_punch() {
        let (mut world, mut log) = world(Level::flat("arena", 6.0), Mode::Fight, 2);
        world.slots[0].as_mut().unwrap().state.input.action = true;
        world.iter(DT, &mut log);
        log.clear();

        world.respawn(0, &mut log);
        assert_eq!(world.state(0).unwrap().punch, Punch::Idle);
        assert!(log.iter().any(|c| *c == Command::Punch(false)));
    }
}
