//! Game settings and preferences
//!
//! Stored as JSON next to the binary. Every field has a default, so partial
//! files load fine.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::consts::MAX_PLAYERS;
use crate::error::SettingsError;
use crate::sim::Tuning;

/// Tilt response presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PhysicsPreset {
    #[default]
    Normal,
    Arcade,
}

impl PhysicsPreset {
    pub fn as_str(&self) -> &'static str {
        match self {
            PhysicsPreset::Normal => "Normal",
            PhysicsPreset::Arcade => "Arcade",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "normal" => Some(PhysicsPreset::Normal),
            "arcade" => Some(PhysicsPreset::Arcade),
            _ => None,
        }
    }

    /// Multiplier on tilt response times (smaller is snappier)
    pub fn response_scale(&self) -> f32 {
        match self {
            PhysicsPreset::Normal => 1.0,
            PhysicsPreset::Arcade => 0.5,
        }
    }
}

/// Game settings/preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Local players (1 - 4)
    pub players: usize,
    pub physics: PhysicsPreset,

    // === Input ===
    /// Joystick tilt response time (milliseconds)
    pub joystick_response: u32,
    /// Mouse tilt response time (milliseconds)
    pub mouse_response: u32,
    /// Mouse motion for a full tilt sweep
    pub mouse_sense: u32,

    // === Camera ===
    /// Chase speed per camera mode, in thousandths; negative is manual
    pub camera_speeds: [i32; 3],
    /// View height above the ball (hundredths)
    pub view_dp: i32,
    /// View center height above the ball (hundredths)
    pub view_dc: i32,
    /// View distance behind the ball (hundredths)
    pub view_dz: i32,

    // === Presentation (carried for the renderer) ===
    pub shadow: bool,
    pub reflection: bool,
    /// Blend between the last two ticks when drawing
    pub interpolation: bool,
    /// Master volume (0.0 - 1.0)
    pub master_volume: f32,

    /// Mode tunables
    pub tuning: Tuning,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            players: 1,
            physics: PhysicsPreset::Normal,

            joystick_response: 50,
            mouse_response: 50,
            mouse_sense: 300,

            camera_speeds: [250, 0, -1],
            view_dp: 75,
            view_dc: 25,
            view_dz: 200,

            shadow: true,
            reflection: true,
            interpolation: true,
            master_volume: 0.8,

            tuning: Tuning::default(),
        }
    }
}

impl Settings {
    /// Configured player count clamped to the supported range
    pub fn player_count(&self) -> usize {
        self.players.clamp(1, MAX_PLAYERS)
    }

    pub fn joystick_response_secs(&self) -> f32 {
        self.joystick_response as f32 / 1000.0 * self.physics.response_scale()
    }

    pub fn mouse_response_secs(&self) -> f32 {
        self.mouse_response as f32 / 1000.0 * self.physics.response_scale()
    }

    /// Chase speed for camera mode `c`; unknown modes use the first
    pub fn camera_speed(&self, c: usize) -> f32 {
        let raw = self
            .camera_speeds
            .get(c)
            .copied()
            .unwrap_or(self.camera_speeds[0]);
        raw as f32 / 1000.0
    }

    /// (height, center height, distance) in world units
    pub fn view_distances(&self) -> (f32, f32, f32) {
        (
            self.view_dp as f32 / 100.0,
            self.view_dc as f32 / 100.0,
            self.view_dz as f32 / 100.0,
        )
    }

    pub fn from_json(json: &str) -> Result<Self, SettingsError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load settings from `path`
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let json = fs::read_to_string(path.as_ref())?;
        let settings = Self::from_json(&json)?;
        log::info!("loaded settings from {}", path.as_ref().display());
        Ok(settings)
    }

    /// Load settings from `path`, falling back to defaults
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path) {
            Ok(settings) => settings,
            Err(err) => {
                log::info!("using default settings ({err})");
                Self::default()
            }
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SettingsError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path.as_ref(), json)?;
        log::info!("settings saved");
        Ok(())
    }
}
