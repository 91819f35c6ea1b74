//! Command protocol
//!
//! Every observable state change produced by the server is one immutable
//! [`Command`]. Commands are ordered: the client applies them strictly in the
//! order they were enqueued, and [`Command::EndOfUpdate`] closes each tick.

mod proxy;

pub use proxy::CommandLog;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::audio::Sound;
use crate::sim::Status;

/// One atomic, ordered state change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Command {
    /// Address the following player-scoped commands to this slot
    SetPlayer(usize),
    /// Level identity, sent once at load
    Map { name: String, major: i32, minor: i32 },
    /// End of one simulation tick
    EndOfUpdate,
    /// Simulation rate, sent once at load
    UpdatesPerSecond(u32),
    Sound { sound: Sound, volume: f32 },

    // Current ball of the current player
    BallPosition(Vec3),
    /// First two basis vectors; the third is their cross product
    BallBasis { e0: Vec3, e1: Vec3 },
    BallPendBasis { e0: Vec3, e1: Vec3 },
    BallRadius(f32),
    BallInPlay(bool),
    /// Select the ball subsequent ball commands apply to
    CurrentBall(usize),
    ClearBalls,
    /// Append a ball and make it current
    MakeBall,

    // View and tilt of the current player
    ViewPosition(Vec3),
    ViewCenter(Vec3),
    ViewBasis { e0: Vec3, e1: Vec3 },
    TiltAngles { x: f32, z: f32 },
    TiltAxes { x: Vec3, z: Vec3 },

    // Counters and flags of the current player
    Timer(f32),
    Coins(i32),
    Status(Status),
    GoalOpen,
    JumpEnter,
    JumpExit,
    Punch(bool),

    // Level mirror of the current player
    PickItem(usize),
    SwchEnter(usize),
    SwchToggle(usize),
    SwchExit(usize),
}

impl Command {
    /// Short tag name, for logs
    pub fn tag(&self) -> &'static str {
        match self {
            Command::SetPlayer(_) => "SetPlayer",
            Command::Map { .. } => "Map",
            Command::EndOfUpdate => "EndOfUpdate",
            Command::UpdatesPerSecond(_) => "UpdatesPerSecond",
            Command::Sound { .. } => "Sound",
            Command::BallPosition(_) => "BallPosition",
            Command::BallBasis { .. } => "BallBasis",
            Command::BallPendBasis { .. } => "BallPendBasis",
            Command::BallRadius(_) => "BallRadius",
            Command::BallInPlay(_) => "BallInPlay",
            Command::CurrentBall(_) => "CurrentBall",
            Command::ClearBalls => "ClearBalls",
            Command::MakeBall => "MakeBall",
            Command::ViewPosition(_) => "ViewPosition",
            Command::ViewCenter(_) => "ViewCenter",
            Command::ViewBasis { .. } => "ViewBasis",
            Command::TiltAngles { .. } => "TiltAngles",
            Command::TiltAxes { .. } => "TiltAxes",
            Command::Timer(_) => "Timer",
            Command::Coins(_) => "Coins",
            Command::Status(_) => "Status",
            Command::GoalOpen => "GoalOpen",
            Command::JumpEnter => "JumpEnter",
            Command::JumpExit => "JumpExit",
            Command::Punch(_) => "Punch",
            Command::PickItem(_) => "PickItem",
            Command::SwchEnter(_) => "SwchEnter",
            Command::SwchToggle(_) => "SwchToggle",
            Command::SwchExit(_) => "SwchExit",
        }
    }

    /// Whether this command is scoped to the player selected by `SetPlayer`
    pub fn is_player_scoped(&self) -> bool {
        !matches!(
            self,
            Command::SetPlayer(_)
                | Command::Map { .. }
                | Command::EndOfUpdate
                | Command::UpdatesPerSecond(_)
                | Command::Sound { .. }
        )
    }
}
