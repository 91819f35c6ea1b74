//! Command builders
//!
//! Every player-scoped helper selects its player first, so helpers can be
//! called in any order.

use super::state::Status;
use super::tilt::Tilt;
use super::view::View;
use crate::audio::Sound;
use crate::cmd::{Command, CommandLog};
use crate::kernel::{Ball, SimBuffer};

pub fn player(log: &mut CommandLog, p: usize) {
    log.enqueue(Command::SetPlayer(p));
}

pub fn sound(log: &mut CommandLog, sound: Sound, volume: f32) {
    log.enqueue(Command::Sound { sound, volume });
}

pub fn tilt(log: &mut CommandLog, p: usize, tilt: &Tilt) {
    player(log, p);
    log.enqueue(Command::TiltAxes {
        x: tilt.x,
        z: tilt.z,
    });
    log.enqueue(Command::TiltAngles {
        x: tilt.rx,
        z: tilt.rz,
    });
}

fn ball_body(log: &mut CommandLog, ball: &Ball) {
    log.enqueue(Command::BallPosition(ball.p));
    log.enqueue(Command::BallBasis {
        e0: ball.e[0],
        e1: ball.e[1],
    });
    log.enqueue(Command::BallPendBasis {
        e0: ball.pend[0],
        e1: ball.pend[1],
    });
}

/// Position and orientation of every ball in the buffer
pub fn balls(log: &mut CommandLog, p: usize, buffer: &SimBuffer) {
    player(log, p);
    for (i, ball) in buffer.balls.iter().enumerate() {
        log.enqueue(Command::CurrentBall(i));
        ball_body(log, ball);
    }
}

/// Rebuild the client's ball list from scratch
pub fn init_balls(log: &mut CommandLog, p: usize, buffer: &SimBuffer) {
    player(log, p);
    log.enqueue(Command::ClearBalls);
    for ball in &buffer.balls {
        log.enqueue(Command::MakeBall);
        ball_body(log, ball);
        log.enqueue(Command::BallRadius(ball.r));
        if !ball.in_play {
            log.enqueue(Command::BallInPlay(false));
        }
    }
}

pub fn ball_radius(log: &mut CommandLog, p: usize, index: usize, r: f32) {
    player(log, p);
    log.enqueue(Command::CurrentBall(index));
    log.enqueue(Command::BallRadius(r));
}

pub fn ball_in_play(log: &mut CommandLog, p: usize, index: usize, in_play: bool) {
    player(log, p);
    log.enqueue(Command::CurrentBall(index));
    log.enqueue(Command::BallInPlay(in_play));
}

pub fn view(log: &mut CommandLog, p: usize, view: &View) {
    player(log, p);
    log.enqueue(Command::ViewPosition(view.p));
    log.enqueue(Command::ViewCenter(view.c));
    log.enqueue(Command::ViewBasis {
        e0: view.e[0],
        e1: view.e[1],
    });
}

pub fn timer(log: &mut CommandLog, p: usize, timer: f32) {
    player(log, p);
    log.enqueue(Command::Timer(timer));
}

pub fn coins(log: &mut CommandLog, p: usize, coins: i32) {
    player(log, p);
    log.enqueue(Command::Coins(coins));
}

pub fn status(log: &mut CommandLog, p: usize, status: Status) {
    player(log, p);
    log.enqueue(Command::Status(status));
}

pub fn goal_open(log: &mut CommandLog, p: usize) {
    player(log, p);
    log.enqueue(Command::GoalOpen);
}

pub fn jump(log: &mut CommandLog, p: usize, enter: bool) {
    player(log, p);
    log.enqueue(if enter {
        Command::JumpEnter
    } else {
        Command::JumpExit
    });
}

pub fn punch(log: &mut CommandLog, p: usize, active: bool) {
    player(log, p);
    log.enqueue(Command::Punch(active));
}

/// Replay level-mirror commands to every player sharing a buffer
pub fn broadcast(log: &mut CommandLog, players: &[usize], cmds: &[Command]) {
    if cmds.is_empty() {
        return;
    }
    for &p in players {
        player(log, p);
        log.extend(cmds.iter().cloned());
    }
}

pub fn end_of_update(log: &mut CommandLog) {
    log.enqueue(Command::EndOfUpdate);
}
