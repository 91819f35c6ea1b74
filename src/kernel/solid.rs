//! Reference kernel: spheres against axis-aligned boxes
//!
//! Balls collide with the level's solid boxes and with each other. Contacts
//! are resolved by pushing the ball out along the contact normal and
//! reflecting the inbound velocity with restitution. Zone tests treat every
//! zone as a vertical cylinder standing on its floor disc.

use std::sync::Arc;

use glam::{Quat, Vec3};

use super::{Ball, JumpTest, Kernel, Level, SimBuffer, Solid, Switch, SwitchTest, Zone};
use crate::cmd::{Command, CommandLog};
use crate::error::LoadError;
use crate::horizontal;

/// Height of a trigger zone above its floor disc
const ZONE_HEIGHT: f32 = 1.0;
/// Contact normals steeper than this count as ground
const GROUND_NORMAL_Y: f32 = 0.7;

/// Result of a collision check
#[derive(Debug, Clone, Copy)]
struct Contact {
    /// Surface normal at the contact (pointing toward the ball center)
    normal: Vec3,
    /// Penetration depth (for position correction)
    penetration: f32,
}

/// Where a ball sits relative to a zone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ZoneTest {
    Inside,
    Border,
    Outside,
}

#[derive(Debug, Clone)]
pub struct SolidKernel {
    /// Bounciness of surfaces
    pub restitution: f32,
    /// Inbound speeds below this do not bounce
    pub rest_speed: f32,
    /// Inbound speed that maps to full impact strength
    pub impact_speed: f32,
}

impl Default for SolidKernel {
    fn default() -> Self {
        Self {
            restitution: 0.7,
            rest_speed: 0.5,
            impact_speed: 10.0,
        }
    }
}

/// Sphere against box
fn sphere_box(p: Vec3, r: f32, solid: &Solid) -> Option<Contact> {
    let closest = p.clamp(solid.min, solid.max);
    let d = p - closest;
    let dist_sq = d.length_squared();

    if dist_sq > r * r {
        return None;
    }

    let dist = dist_sq.sqrt();
    if dist > 1e-6 {
        return Some(Contact {
            normal: d / dist,
            penetration: r - dist,
        });
    }

    // Center inside the box - push out through the nearest face
    let to_min = p - solid.min;
    let to_max = solid.max - p;
    let faces = [
        (to_min.x, Vec3::NEG_X),
        (to_max.x, Vec3::X),
        (to_min.y, Vec3::NEG_Y),
        (to_max.y, Vec3::Y),
        (to_min.z, Vec3::NEG_Z),
        (to_max.z, Vec3::Z),
    ];
    let (depth, normal) = faces
        .into_iter()
        .fold((f32::INFINITY, Vec3::Y), |best, face| if face.0 < best.0 { face } else { best });
    Some(Contact {
        normal,
        penetration: depth + r,
    })
}

fn zone_test(ball: &Ball, zone: &Zone) -> ZoneTest {
    let h = ball.p.y - zone.p.y;
    if h < -ball.r || h > ZONE_HEIGHT {
        return ZoneTest::Outside;
    }
    let d = horizontal(ball.p - zone.p).length();
    if d + ball.r < zone.r {
        ZoneTest::Inside
    } else if d - ball.r > zone.r {
        ZoneTest::Outside
    } else {
        ZoneTest::Border
    }
}

/// Two distinct balls borrowed mutably at once
fn pair_mut(balls: &mut [Ball], i: usize, j: usize) -> (&mut Ball, &mut Ball) {
    if i < j {
        let (head, tail) = balls.split_at_mut(j);
        (&mut head[i], &mut tail[0])
    } else {
        let (head, tail) = balls.split_at_mut(i);
        (&mut tail[0], &mut head[j])
    }
}

impl SolidKernel {
    /// Reflect the inbound part of `v` off a surface, returning the inbound speed
    fn bounce(&self, v: &mut Vec3, normal: Vec3) -> f32 {
        let vn = v.dot(normal);
        if vn >= 0.0 {
            return 0.0;
        }
        let e = if -vn < self.rest_speed { 0.0 } else { self.restitution };
        *v -= normal * vn * (1.0 + e);
        -vn
    }

    /// Roll the orientation basis over the ground and swing the pendulum
    fn update_basis(ball: &mut Ball, ground: Option<Vec3>, gravity: Vec3, dt: f32) {
        if let Some(n) = ground {
            ball.w = n.cross(ball.v) / ball.r;
        }
        let q = Quat::from_scaled_axis(ball.w * dt);
        for e in &mut ball.e {
            *e = (q * *e).normalize();
        }

        let up = (-gravity).try_normalize().unwrap_or(Vec3::Y);
        let side = ball.e[0].cross(up).try_normalize().unwrap_or(Vec3::Z);
        ball.pend = [up.cross(side), up, side];
    }
}

impl Kernel for SolidKernel {
    fn load_vary(&self, base: &Arc<Level>) -> Result<SimBuffer, LoadError> {
        base.validate()?;

        Ok(SimBuffer {
            base: Arc::clone(base),
            balls: base.balls.iter().map(|s| Ball::new(s.p, s.r)).collect(),
            items: base.items.clone(),
            switches: base
                .switches
                .iter()
                .map(|s| Switch {
                    zone: s.zone,
                    on: s.on,
                    entered: 0,
                })
                .collect(),
        })
    }

    fn step(&self, buffer: &mut SimBuffer, gravity: Vec3, dt: f32, i: usize) -> f32 {
        let SimBuffer { base, balls, .. } = buffer;
        if !balls.get(i).is_some_and(|b| b.in_play) {
            return 0.0;
        }

        let mut impact: f32 = 0.0;
        let mut ground = None;

        {
            let ball = &mut balls[i];
            ball.v += gravity * dt;
            ball.p += ball.v * dt;

            for solid in &base.solids {
                if let Some(contact) = sphere_box(ball.p, ball.r, solid) {
                    ball.p += contact.normal * contact.penetration;
                    impact = impact.max(self.bounce(&mut ball.v, contact.normal));
                    if contact.normal.y > GROUND_NORMAL_Y {
                        ground = Some(contact.normal);
                    }
                }
            }
        }

        for j in 0..balls.len() {
            if j == i || !balls[j].in_play {
                continue;
            }
            let (a, b) = pair_mut(balls, i, j);
            let d = a.p - b.p;
            let dist = d.length();
            let reach = a.r + b.r;
            if dist >= reach || dist < 1e-6 {
                continue;
            }
            let n = d / dist;
            let push = n * ((reach - dist) * 0.5);
            a.p += push;
            b.p -= push;

            let rel = (a.v - b.v).dot(n);
            if rel < 0.0 {
                let k = -(1.0 + self.restitution) * rel * 0.5;
                a.v += n * k;
                b.v -= n * k;
                impact = impact.max(-rel);
            }
        }

        let ball = &mut balls[i];
        ball.grounded = ground.is_some();
        Self::update_basis(ball, ground, gravity, dt);

        (impact / self.impact_speed).clamp(0.0, 1.0)
    }

    fn item_test(&self, buffer: &SimBuffer, ball: usize, radius: f32) -> Option<usize> {
        let ball = buffer.balls.get(ball)?;
        buffer.items.iter().position(|item| {
            item.kind != super::ItemKind::None && (ball.p - item.p).length() < ball.r + radius
        })
    }

    fn swch_test(&self, buffer: &mut SimBuffer, ball: usize, log: &mut CommandLog) -> SwitchTest {
        let Some(b) = buffer.balls.get(ball) else {
            return SwitchTest::Outside;
        };
        if ball >= u32::BITS as usize {
            return SwitchTest::Outside;
        }
        let bit = 1u32 << ball;
        let mut result = SwitchTest::Outside;

        // The switch toggles when its zone goes from empty to occupied and
        // reports an exit once the last ball has left.
        for (k, switch) in buffer.switches.iter_mut().enumerate() {
            match zone_test(b, &switch.zone) {
                ZoneTest::Inside => {
                    if switch.entered & bit == 0 {
                        let was_empty = switch.entered == 0;
                        switch.entered |= bit;
                        if was_empty {
                            switch.on = !switch.on;
                            log.enqueue(Command::SwchEnter(k));
                            log.enqueue(Command::SwchToggle(k));
                            result = SwitchTest::Inside;
                        }
                    }
                }
                ZoneTest::Outside => {
                    if switch.entered & bit != 0 {
                        switch.entered &= !bit;
                        if switch.entered == 0 {
                            log.enqueue(Command::SwchExit(k));
                        }
                    }
                }
                ZoneTest::Border => {}
            }
        }
        result
    }

    fn jump_test(&self, buffer: &SimBuffer, ball: usize) -> JumpTest {
        let Some(ball) = buffer.balls.get(ball) else {
            return JumpTest::Outside;
        };
        let mut result = JumpTest::Outside;

        for jump in &buffer.base.jumps {
            match zone_test(ball, &jump.zone) {
                ZoneTest::Inside => {
                    return JumpTest::Inside(jump.target + (ball.p - jump.zone.p));
                }
                ZoneTest::Border => result = JumpTest::Border,
                ZoneTest::Outside => {}
            }
        }
        result
    }

    fn goal_test(&self, buffer: &SimBuffer, ball: usize) -> Option<usize> {
        let ball = buffer.balls.get(ball)?;
        buffer
            .base
            .goals
            .iter()
            .position(|goal| zone_test(ball, goal) == ZoneTest::Inside)
    }
}
