//! CURR/PREV interpolation buffers
//!
//! Commands always write the `curr` half. At each tick boundary the client
//! commits `curr` into `prev`; drawing blends `prev -> curr` by the lockstep
//! blend factor.

use glam::{Mat3, Quat, Vec3};

use super::draw::{Draw, DrawBall};
use crate::sim::{Tilt, View};

/// One quantity as of the last two ticks
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pair<T> {
    pub curr: T,
    pub prev: T,
}

impl<T: Clone> Pair<T> {
    pub fn new(value: T) -> Self {
        Self {
            curr: value.clone(),
            prev: value,
        }
    }

    /// Overwrite both halves (snapped quantities)
    pub fn set(&mut self, value: T) {
        self.prev = value.clone();
        self.curr = value;
    }

    fn commit(&mut self) {
        self.prev = self.curr.clone();
    }
}

impl Pair<f32> {
    pub fn at(&self, a: f32) -> f32 {
        crate::lerp(self.prev, self.curr, a)
    }
}

/// Interpolation state for one player
#[derive(Debug, Clone)]
pub struct PlayerLerp {
    pub alpha: f32,
    pub balls: Vec<Pair<DrawBall>>,
    pub tilt: Pair<Tilt>,
    pub view: Pair<View>,
    pub goal_k: Pair<f32>,
    pub jump_dt: Pair<f32>,
    /// Discrete: drawn from `curr` only
    pub punch_active: Pair<bool>,
    /// Number of commits so far
    pub copies: u64,
}

impl PlayerLerp {
    pub fn new(draw: &Draw) -> Self {
        Self {
            alpha: 1.0,
            balls: draw.balls.iter().copied().map(Pair::new).collect(),
            tilt: Pair::new(draw.tilt),
            view: Pair::new(draw.view),
            goal_k: Pair::new(draw.goal_k),
            jump_dt: Pair::new(draw.jump_dt),
            punch_active: Pair::new(draw.punch_active),
            copies: 0,
        }
    }

    /// PREV <- CURR
    pub fn copy(&mut self) {
        for ball in &mut self.balls {
            ball.commit();
        }
        self.tilt.commit();
        self.view.commit();
        self.goal_k.commit();
        self.jump_dt.commit();
        self.punch_active.commit();
        self.copies += 1;
    }

    /// Write the blended state into `draw`
    pub fn apply(&self, draw: &mut Draw) {
        let a = self.alpha;

        draw.balls.clear();
        draw.balls
            .extend(self.balls.iter().map(|ball| blend_ball(&ball.prev, &ball.curr, a)));

        draw.goal_k = self.goal_k.at(a);
        draw.jump_dt = self.jump_dt.at(a);
        draw.punch_active = self.punch_active.curr;

        let (t0, t1) = (&self.tilt.prev, &self.tilt.curr);
        draw.tilt = Tilt {
            x: t0.x.lerp(t1.x, a),
            rx: crate::lerp(t0.rx, t1.rx, a),
            z: t0.z.lerp(t1.z, a),
            rz: crate::lerp(t0.rz, t1.rz, a),
        };

        draw.view = self.view.prev.lerp(&self.view.curr, a);
    }
}

fn basis_quat(e: &[Vec3; 3]) -> Quat {
    Quat::from_mat3(&Mat3::from_cols(e[0], e[1], e[2])).normalize()
}

fn quat_basis(q: Quat) -> [Vec3; 3] {
    [q * Vec3::X, q * Vec3::Y, q * Vec3::Z]
}

/// Positions and radii blend linearly, orientations by slerp
fn blend_ball(prev: &DrawBall, curr: &DrawBall, a: f32) -> DrawBall {
    DrawBall {
        p: prev.p.lerp(curr.p, a),
        e: quat_basis(basis_quat(&prev.e).slerp(basis_quat(&curr.e), a)),
        pend: quat_basis(basis_quat(&prev.pend).slerp(basis_quat(&curr.pend), a)),
        r: crate::lerp(prev.r, curr.r, a),
        in_play: curr.in_play,
    }
}
