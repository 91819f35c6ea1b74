//! Sound cues
//!
//! The core never touches an audio device. The server names cues in the
//! command stream, the client collects them in a [`SoundQueue`] and the host
//! drains the queue into whatever mixer it has.

use serde::{Deserialize, Serialize};

/// Sound effect types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sound {
    /// Small ball hits something
    BumpSmall,
    /// Normal ball hits something
    BumpMedium,
    /// Big ball hits something
    BumpLarge,
    Coin,
    Clock,
    Grow,
    Shrink,
    Speed,
    Missile,
    Banana,
    /// Goal opened or switch toggled
    Switch,
    Jump,
    Goal,
    /// Time ran out
    Time,
    Fall,
    /// Flight engaged in target mode
    Flight,
    /// Landed inside a target zone
    Land,
    Punch,
    PunchHit,
    /// Cue struck in billiards
    Shot,
    /// Object ball pocketed
    Pocket,
    /// Cue ball pocketed
    Scratch,
}

impl Sound {
    /// Asset path the host mixer should play
    pub fn path(&self) -> &'static str {
        match self {
            Sound::BumpSmall => "snd/bumps.ogg",
            Sound::BumpMedium => "snd/bumpm.ogg",
            Sound::BumpLarge => "snd/bumpl.ogg",
            Sound::Coin => "snd/coin.ogg",
            Sound::Clock => "snd/clock.ogg",
            Sound::Grow => "snd/grow.ogg",
            Sound::Shrink => "snd/shrink.ogg",
            Sound::Speed => "snd/speed.ogg",
            Sound::Missile => "snd/missile.ogg",
            Sound::Banana => "snd/banana.ogg",
            Sound::Switch => "snd/switch.ogg",
            Sound::Jump => "snd/jump.ogg",
            Sound::Goal => "snd/goal.ogg",
            Sound::Time => "snd/time.ogg",
            Sound::Fall => "snd/fall.ogg",
            Sound::Flight => "snd/flight.ogg",
            Sound::Land => "snd/land.ogg",
            Sound::Punch => "snd/punch.ogg",
            Sound::PunchHit => "snd/punchhit.ogg",
            Sound::Shot => "snd/shot.ogg",
            Sound::Pocket => "snd/pocket.ogg",
            Sound::Scratch => "snd/scratch.ogg",
        }
    }
}

/// A cue waiting to be played
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SoundCue {
    pub sound: Sound,
    /// Volume in 0.0 - 1.0, already scaled by the queue's master volume
    pub volume: f32,
}

/// Pending sound cues, drained by the host once per frame
#[derive(Debug, Clone)]
pub struct SoundQueue {
    cues: Vec<SoundCue>,
    master_volume: f32,
    muted: bool,
}

impl Default for SoundQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl SoundQueue {
    /// Upper bound on queued cues; older cues are dropped past this
    pub const CAPACITY: usize = 64;

    pub fn new() -> Self {
        Self {
            cues: Vec::new(),
            master_volume: 1.0,
            muted: false,
        }
    }

    /// Set master volume (0.0 - 1.0)
    pub fn set_master_volume(&mut self, vol: f32) {
        self.master_volume = vol.clamp(0.0, 1.0);
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
        if muted {
            self.cues.clear();
        }
    }

    fn effective_volume(&self, a: f32) -> f32 {
        if self.muted {
            0.0
        } else {
            a.clamp(0.0, 1.0) * self.master_volume
        }
    }

    /// Queue a cue at volume `a`
    pub fn play(&mut self, sound: Sound, a: f32) {
        let volume = self.effective_volume(a);
        if volume <= 0.0 {
            return;
        }
        if self.cues.len() >= Self::CAPACITY {
            self.cues.remove(0);
        }
        self.cues.push(SoundCue { sound, volume });
    }

    /// Take every pending cue in play order
    pub fn drain(&mut self) -> Vec<SoundCue> {
        std::mem::take(&mut self.cues)
    }

    pub fn len(&self) -> usize {
        self.cues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cues.is_empty()
    }

    pub fn clear(&mut self) {
        self.cues.clear();
    }
}
