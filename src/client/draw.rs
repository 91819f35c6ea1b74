//! Presentation state handed to the renderer

use glam::Vec3;

use crate::kernel::{Item, ItemKind, Level};
use crate::sim::{Tilt, View};

/// Ball as drawn
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawBall {
    pub p: Vec3,
    pub e: [Vec3; 3],
    pub pend: [Vec3; 3],
    pub r: f32,
    pub in_play: bool,
}

impl Default for DrawBall {
    fn default() -> Self {
        Self {
            p: Vec3::ZERO,
            e: [Vec3::X, Vec3::Y, Vec3::Z],
            pend: [Vec3::X, Vec3::Y, Vec3::Z],
            r: 0.25,
            in_play: true,
        }
    }
}

/// Switch flags mirrored from the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SwitchMirror {
    pub on: bool,
    pub entered: bool,
}

/// Everything one player's viewport needs
#[derive(Debug, Clone, PartialEq)]
pub struct Draw {
    pub balls: Vec<DrawBall>,
    pub items: Vec<Item>,
    pub switches: Vec<SwitchMirror>,
    pub tilt: Tilt,
    pub view: View,

    pub goal_e: bool,
    pub goal_k: f32,

    pub jump_e: bool,
    /// Jump in progress
    pub jump_b: bool,
    pub jump_dt: f32,

    /// Fade level (1.0 = black)
    pub fade_k: f32,
    /// Fade direction and speed
    pub fade_d: f32,

    pub punch_active: bool,
}

impl Default for Draw {
    fn default() -> Self {
        Self {
            balls: Vec::new(),
            items: Vec::new(),
            switches: Vec::new(),
            tilt: Tilt::default(),
            view: View::default(),
            goal_e: false,
            goal_k: 0.0,
            jump_e: true,
            jump_b: false,
            jump_dt: 0.0,
            fade_k: 1.0,
            fade_d: -2.0,
            punch_active: false,
        }
    }
}

impl Draw {
    /// Fresh mirror of a level's dynamic parts
    pub fn from_level(level: &Level) -> Self {
        Self {
            items: level.items.clone(),
            switches: level
                .switches
                .iter()
                .map(|s| SwitchMirror {
                    on: s.on,
                    entered: false,
                })
                .collect(),
            ..Self::default()
        }
    }

    pub fn step_fade(&mut self, dt: f32) {
        if (self.fade_k < 1.0 && self.fade_d > 0.0) || (self.fade_k > 0.0 && self.fade_d < 0.0) {
            self.fade_k += self.fade_d * dt;
        }
        if self.fade_k < 0.0 {
            self.fade_k = 0.0;
            self.fade_d = 0.0;
        }
        if self.fade_k > 1.0 {
            self.fade_k = 1.0;
            self.fade_d = 0.0;
        }
    }
}

/// Particle tint for a picked-up item
pub fn item_color(item: &Item) -> [f32; 4] {
    match item.kind {
        ItemKind::Coin if item.n >= 10 => [0.2, 0.2, 1.0, 1.0],
        ItemKind::Coin if item.n >= 5 => [1.0, 0.2, 0.2, 1.0],
        ItemKind::Coin => [1.0, 1.0, 0.2, 1.0],
        ItemKind::Clock => [0.2, 1.0, 0.2, 1.0],
        ItemKind::Grow | ItemKind::Shrink => [0.8, 0.4, 1.0, 1.0],
        ItemKind::Speed => [1.0, 0.6, 0.0, 1.0],
        ItemKind::Missile => [1.0, 0.1, 0.1, 1.0],
        ItemKind::Banana => [1.0, 0.9, 0.3, 1.0],
        ItemKind::None => [1.0, 1.0, 1.0, 1.0],
    }
}
