//! Floor tilt
//!
//! The player never moves the ball directly: input tilts the world around two
//! axes taken from the camera, and the tilted gravity drives the ball.

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Tilt angles (degrees) and the axes they rotate about
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tilt {
    pub x: Vec3,
    pub rx: f32,
    pub z: Vec3,
    pub rz: f32,
}

impl Default for Tilt {
    fn default() -> Self {
        Self {
            x: Vec3::X,
            rx: 0.0,
            z: Vec3::Z,
            rz: 0.0,
        }
    }
}

impl Tilt {
    /// Take the tilt axes from a view basis
    ///
    /// X follows the camera's right vector; Z follows its back vector unless
    /// the camera looks more down than forward, in which case the up vector
    /// (negated) stands in.
    pub fn set_axes(&mut self, e: &[Vec3; 3]) {
        self.x = e[0];
        self.z = if e[1].y.abs() < e[2].y.abs() { -e[1] } else { e[2] };
    }

    /// Move the angles toward the input target with first-order response
    pub fn integrate(&mut self, target_x: f32, target_z: f32, dt: f32, response: f32) {
        let k = dt / dt.max(response);
        self.rx += (target_x - self.rx) * k;
        self.rz += (target_z - self.rz) * k;
    }

    /// Rotate `g` by the tilt
    pub fn gravity(&self, g: Vec3) -> Vec3 {
        let x = self.x.try_normalize().unwrap_or(Vec3::X);
        let z = self.z.try_normalize().unwrap_or(Vec3::Z);
        let rot =
            Quat::from_axis_angle(z, self.rz.to_radians()) * Quat::from_axis_angle(x, self.rx.to_radians());
        rot * g
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::{ANGLE_BOUND, DT, GRAVITY_DN, RESPONSE};

    #[test]
    fn test_level_tilt_keeps_gravity() {
        let tilt = Tilt::default();
        assert!((tilt.gravity(GRAVITY_DN) - GRAVITY_DN).length() < 1e-6);
    }

    #[test]
    fn test_tilt_rotates_gravity() {
        let tilt = Tilt {
            rz: ANGLE_BOUND,
            ..Tilt::default()
        };
        let g = tilt.gravity(GRAVITY_DN);
        assert!(g.x.abs() > 1.0);
        assert!((g.length() - 9.8).abs() < 1e-4);
    }

    #[test]
    fn test_integrate_converges() {
        let mut tilt = Tilt::default();
        for _ in 0..90 {
            tilt.integrate(10.0, -10.0, DT, RESPONSE);
        }
        assert!((tilt.rx - 10.0).abs() < 1e-3);
        assert!((tilt.rz + 10.0).abs() < 1e-3);
    }

    #[test]
    fn test_instant_response_when_dt_exceeds_response() {
        let mut tilt = Tilt::default();
        tilt.integrate(5.0, 5.0, 0.1, 0.05);
        assert_eq!(tilt.rx, 5.0);
    }

    #[test]
    fn test_axes_from_overhead_view() {
        let mut tilt = Tilt::default();
        // Camera looking straight down: back vector points up
        tilt.set_axes(&[Vec3::X, Vec3::NEG_Z, Vec3::Y]);
        assert_eq!(tilt.z, Vec3::Z);
    }
}
