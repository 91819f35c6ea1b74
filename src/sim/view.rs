//! Camera state shared by server and client

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::consts::{VIEW_DC, VIEW_DP, VIEW_DZ};
use crate::horizontal;
use crate::kernel::ViewPoint;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct View {
    /// Camera position
    pub p: Vec3,
    /// Look-at center
    pub c: Vec3,
    /// Basis: right, up, back
    pub e: [Vec3; 3],
    /// Heading angle (degrees)
    pub a: f32,
    /// Camera lift above the ball
    pub dp: f32,
    /// Look-at lift above the ball
    pub dc: f32,
    /// Camera distance behind the ball
    pub dz: f32,
}

impl Default for View {
    fn default() -> Self {
        Self::new(VIEW_DP, VIEW_DC, VIEW_DZ)
    }
}

impl View {
    pub fn new(dp: f32, dc: f32, dz: f32) -> Self {
        Self {
            p: Vec3::new(0.0, dp, dz),
            c: Vec3::new(0.0, dc, 0.0),
            e: [Vec3::X, Vec3::Y, Vec3::Z],
            a: 0.0,
            dp,
            dc,
            dz,
        }
    }

    /// Intro fly-by view
    ///
    /// `k = 0` is the chase view behind `ball`; `k = 1` is the level's first
    /// view point and `k = -1` its second. Positions blend by `k²`.
    pub fn fly(dp: f32, dc: f32, dz: f32, ball: Option<Vec3>, views: &[ViewPoint], k: f32) -> Self {
        let mut view = Self::new(dp, dc, dz);

        let at = ball.unwrap_or(Vec3::ZERO);
        let p0 = at + Vec3::Y * dp + Vec3::Z * dz;
        let c0 = at + Vec3::Y * dc;

        let mut p1 = Vec3::ZERO;
        let mut c1 = Vec3::ZERO;
        if k >= 0.0 {
            if let Some(v) = views.first() {
                p1 = v.p;
                c1 = v.q;
            }
        }
        if k <= 0.0 {
            if let Some(v) = views.get(1) {
                p1 = v.p;
                c1 = v.q;
            }
        }

        view.p = p0 + (p1 - p0) * (k * k);
        view.c = c0 + (c1 - c0) * (k * k);
        view.orthonormalize();
        view
    }

    /// Rebuild the basis from position and center, keeping world up
    pub fn orthonormalize(&mut self) {
        let back = self.p - self.c;
        self.e[1] = Vec3::Y;
        self.e[0] = self.e[1].cross(back).try_normalize().unwrap_or(Vec3::X);
        self.e[2] = self.e[0].cross(self.e[1]).try_normalize().unwrap_or(Vec3::Z);
    }

    /// Horizontal facing direction (opposite the back vector)
    pub fn forward(&self) -> Vec3 {
        horizontal(-self.e[2]).try_normalize().unwrap_or(Vec3::NEG_Z)
    }

    /// Free look: aim the center from the current position
    pub fn look(&mut self, phi: f32, theta: f32) {
        let (phi, theta) = (phi.to_radians(), theta.to_radians());
        self.c = self.p + Vec3::new(theta.sin() * phi.cos(), phi.sin(), -theta.cos() * phi.cos());
    }

    /// Component-wise blend toward `other`
    pub fn lerp(&self, other: &View, a: f32) -> View {
        View {
            p: self.p.lerp(other.p, a),
            c: self.c.lerp(other.c, a),
            e: [
                self.e[0].lerp(other.e[0], a),
                self.e[1].lerp(other.e[1], a),
                self.e[2].lerp(other.e[2], a),
            ],
            a: crate::lerp(self.a, other.a, a),
            ..*other
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fly_zero_is_chase_view() {
        let ball = Vec3::new(2.0, 1.0, 0.0);
        let view = View::fly(0.75, 0.25, 2.0, Some(ball), &[], 0.0);
        assert!((view.p - Vec3::new(2.0, 1.75, 2.0)).length() < 1e-6);
        assert!((view.c - Vec3::new(2.0, 1.25, 0.0)).length() < 1e-6);
        assert!((view.e[2].length() - 1.0).abs() < 1e-5);
        assert!(view.e[0].dot(view.e[2]).abs() < 1e-5);
    }

    #[test]
    fn test_fly_one_is_first_view_point() {
        let views = [ViewPoint {
            p: Vec3::new(0.0, 10.0, 10.0),
            q: Vec3::ZERO,
        }];
        let view = View::fly(0.75, 0.25, 2.0, Some(Vec3::ZERO), &views, 1.0);
        assert!((view.p - views[0].p).length() < 1e-6);
        assert!(view.c.length() < 1e-6);
    }

    #[test]
    fn test_forward_faces_away_from_camera() {
        let view = View::default();
        assert!((view.forward() - Vec3::NEG_Z).length() < 1e-6);
    }
}
