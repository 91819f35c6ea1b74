//! In-memory level description
//!
//! The static ("base") part of a level, shared by every physics buffer loaded
//! from it. Levels are built in code; there is no file parser.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::{Item, ItemKind};
use crate::error::LoadError;

/// Axis-aligned solid box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Solid {
    pub min: Vec3,
    pub max: Vec3,
}

impl Solid {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }
}

/// Where a ball starts
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BallSpawn {
    pub p: Vec3,
    pub r: f32,
}

/// Circular trigger zone on the floor (switches, jumps, goals)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    /// Center of the zone's floor disc
    pub p: Vec3,
    pub r: f32,
}

/// Jump zone: a ball fully inside is carried to `target`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JumpZone {
    pub zone: Zone,
    pub target: Vec3,
}

/// Switch zone with its initial state
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SwitchZone {
    pub zone: Zone,
    pub on: bool,
}

/// Fixed camera point used by the fly-by intro
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewPoint {
    /// Camera position
    pub p: Vec3,
    /// Look-at point
    pub q: Vec3,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Level {
    /// Level file name, sent to clients in the `Map` command
    pub name: String,
    /// Level format version (major, minor)
    pub version: (i32, i32),
    pub solids: Vec<Solid>,
    pub balls: Vec<BallSpawn>,
    pub items: Vec<Item>,
    pub switches: Vec<SwitchZone>,
    pub jumps: Vec<JumpZone>,
    pub goals: Vec<Zone>,
    pub views: Vec<ViewPoint>,
    /// Explicit kill plane height; defaults to the lowest solid bottom
    pub kill_y: Option<f32>,
}

impl Level {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: (1, 0),
            solids: Vec::new(),
            balls: Vec::new(),
            items: Vec::new(),
            switches: Vec::new(),
            jumps: Vec::new(),
            goals: Vec::new(),
            views: Vec::new(),
            kill_y: None,
        }
    }

    /// Square floor slab of half-width `half` with its top at y = 0, a ball
    /// spawn of radius 0.25 resting at the origin and a view point behind it
    pub fn flat(name: impl Into<String>, half: f32) -> Self {
        Self::new(name)
            .with_solid(Vec3::new(-half, -1.0, -half), Vec3::new(half, 0.0, half))
            .with_ball(Vec3::new(0.0, 0.25, 0.0), 0.25)
            .with_view(Vec3::new(0.0, 3.0, 6.0), Vec3::ZERO)
    }

    pub fn with_version(mut self, major: i32, minor: i32) -> Self {
        self.version = (major, minor);
        self
    }

    pub fn with_solid(mut self, min: Vec3, max: Vec3) -> Self {
        self.solids.push(Solid::new(min, max));
        self
    }

    pub fn with_ball(mut self, p: Vec3, r: f32) -> Self {
        self.balls.push(BallSpawn { p, r });
        self
    }

    pub fn with_item(mut self, p: Vec3, kind: ItemKind, n: i32) -> Self {
        self.items.push(Item { p, kind, n });
        self
    }

    pub fn with_switch(mut self, p: Vec3, r: f32, on: bool) -> Self {
        self.switches.push(SwitchZone {
            zone: Zone { p, r },
            on,
        });
        self
    }

    pub fn with_jump(mut self, p: Vec3, r: f32, target: Vec3) -> Self {
        self.jumps.push(JumpZone {
            zone: Zone { p, r },
            target,
        });
        self
    }

    pub fn with_goal(mut self, p: Vec3, r: f32) -> Self {
        self.goals.push(Zone { p, r });
        self
    }

    pub fn with_view(mut self, p: Vec3, q: Vec3) -> Self {
        self.views.push(ViewPoint { p, q });
        self
    }

    pub fn with_kill_y(mut self, y: f32) -> Self {
        self.kill_y = Some(y);
        self
    }

    /// True when the level has no solid geometry at all
    pub fn is_empty(&self) -> bool {
        self.solids.is_empty()
    }

    /// Height below which a ball has fallen out of the level
    pub fn fall_y(&self) -> f32 {
        self.kill_y.unwrap_or_else(|| {
            self.solids
                .iter()
                .map(|s| s.min.y)
                .fold(f32::INFINITY, f32::min)
        })
    }

    /// Reject malformed data before any buffer is built from it
    pub fn validate(&self) -> Result<(), LoadError> {
        let invalid = |reason: String| LoadError::InvalidLevel {
            name: self.name.clone(),
            reason,
        };

        if self.balls.is_empty() {
            return Err(LoadError::NoBall(self.name.clone()));
        }
        for (i, spawn) in self.balls.iter().enumerate() {
            if !spawn.p.is_finite() || !spawn.r.is_finite() || spawn.r <= 0.0 {
                return Err(invalid(format!("ball spawn {i} has a bad position or radius")));
            }
        }
        for (i, solid) in self.solids.iter().enumerate() {
            if !(solid.min.is_finite() && solid.max.is_finite())
                || solid.min.cmpgt(solid.max).any()
            {
                return Err(invalid(format!("solid {i} has inverted or non-finite bounds")));
            }
        }
        let zones = self
            .switches
            .iter()
            .map(|s| s.zone)
            .chain(self.jumps.iter().map(|j| j.zone))
            .chain(self.goals.iter().copied());
        for zone in zones {
            if !zone.p.is_finite() || !zone.r.is_finite() || zone.r <= 0.0 {
                return Err(invalid(format!("zone at {} has a bad radius", zone.p)));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_level_is_valid() {
        let level = Level::flat("flat", 5.0);
        assert!(level.validate().is_ok());
        assert!(!level.is_empty());
        assert_eq!(level.fall_y(), -1.0);
    }

    #[test]
    fn test_missing_ball_rejected() {
        let level = Level::new("empty");
        assert!(matches!(level.validate(), Err(LoadError::NoBall(_))));
    }

    #[test]
    fn test_bad_radius_rejected() {
        let level = Level::new("bad").with_ball(Vec3::ZERO, -1.0);
        assert!(matches!(
            level.validate(),
            Err(LoadError::InvalidLevel { .. })
        ));
    }

    #[test]
    fn test_kill_plane_override() {
        let level = Level::flat("flat", 5.0).with_kill_y(-10.0);
        assert_eq!(level.fall_y(), -10.0);
    }
}
