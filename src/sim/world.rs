//! Level lifecycle and player slots

use std::sync::Arc;

use super::emit;
use super::mode::{Mode, ModeRules};
use super::state::{Input, PlayerSlot, PlayerState, SimHandle, Slots, sharers, slot_buffer, split_slot};
use super::view::View;
use crate::audio::Sound;
use crate::cmd::{Command, CommandLog};
use crate::consts::*;
use crate::error::LoadError;
use crate::kernel::{Kernel, Level};
use crate::player_offset;
use crate::settings::Settings;

/// Everything the server simulates, minus the lockstep and the log
#[derive(Debug)]
pub struct World<K: Kernel> {
    pub(crate) kernel: K,
    pub(crate) settings: Settings,
    pub(crate) rules: ModeRules,
    pub(crate) base: Option<Arc<Level>>,
    pub(crate) slots: Slots,
}

impl<K: Kernel> World<K> {
    pub fn new(kernel: K, settings: Settings) -> Self {
        Self {
            kernel,
            settings,
            rules: ModeRules::Normal,
            base: None,
            slots: std::array::from_fn(|_| None),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.base.is_some()
    }

    /// Chase view behind `at`
    pub(crate) fn spawn_view(&self, at: glam::Vec3) -> View {
        let (dp, dc, dz) = self.settings.view_distances();
        let views = self.base.as_ref().map_or(&[][..], |base| &base.views[..]);
        View::fly(dp, dc, dz, Some(at), views, 0.0)
    }

    /// Load `base` for every configured player
    ///
    /// Slot 0 failing (or the base itself) is fatal; any later slot that
    /// fails to load is left inactive.
    pub(crate) fn init(
        &mut self,
        base: Arc<Level>,
        mode: Mode,
        time_limit_cs: u32,
        goal_enabled: bool,
        log: &mut CommandLog,
    ) -> Result<(), LoadError> {
        self.free();
        base.validate()?;

        let count = self.settings.player_count();
        let time_limit = time_limit_cs as f32 / 100.0;
        self.rules = ModeRules::new(mode, &self.settings.tuning);
        self.rules.bind_level(&base);
        self.base = Some(Arc::clone(&base));

        log.enqueue(Command::Map {
            name: base.name.clone(),
            major: base.version.0,
            minor: base.version.1,
        });
        log.enqueue(Command::UpdatesPerSecond(UPS));

        let shared = mode.shares_buffer();
        let mut shared_spawns = Vec::new();

        for p in 0..count {
            let handle = if p == 0 || !shared {
                match self.kernel.load_vary(&base) {
                    Ok(mut buffer) => {
                        if shared {
                            shared_spawns = self.rules.layout_shared(&mut buffer, count);
                        } else if let Some(ball) = buffer.balls.first_mut() {
                            ball.p += player_offset(p);
                        }
                        SimHandle::Owned(buffer)
                    }
                    Err(err) if p == 0 => {
                        self.free();
                        return Err(err);
                    }
                    Err(err) => {
                        let err = LoadError::Slot {
                            slot: p,
                            source: Box::new(err),
                        };
                        log::warn!("{err}; slot left inactive");
                        continue;
                    }
                }
            } else {
                SimHandle::Shared { owner: 0 }
            };

            let ball = self.rules.player_ball(p);
            let spawn = match &handle {
                SimHandle::Owned(buffer) if !shared => buffer.balls.first().map(|b| b.p),
                _ => shared_spawns.get(p).copied(),
            }
            .unwrap_or_default();

            let view = self.spawn_view(spawn);
            let state = PlayerState::new(ball, spawn, view, time_limit, goal_enabled);
            self.slots[p] = Some(PlayerSlot { handle, state });
        }

        for p in 0..MAX_PLAYERS {
            let (Some(slot), Some(buffer)) = (self.slots[p].as_ref(), slot_buffer(&self.slots, p))
            else {
                continue;
            };
            let state = &slot.state;
            emit::timer(log, p, state.timer);
            if state.goal_enabled {
                emit::goal_open(log, p);
            }
            emit::init_balls(log, p, buffer);
            emit::view(log, p, &state.view);
        }
        emit::end_of_update(log);

        log::info!(
            "loaded '{}' in {} mode for {} player(s)",
            base.name,
            mode.as_str(),
            self.active_count()
        );
        Ok(())
    }

    /// Drop every slot, releasing owned buffers through the kernel
    pub(crate) fn free(&mut self) {
        for slot in self.slots.iter_mut() {
            if let Some(PlayerSlot {
                handle: SimHandle::Owned(buffer),
                ..
            }) = slot.take()
            {
                self.kernel.free_vary(buffer);
            }
        }
        if let Some(base) = self.base.take() {
            log::info!("freed '{}'", base.name);
        }
    }

    pub fn active_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Players whose client mirrors must see changes to `p`'s buffer
    pub(crate) fn audience(&self, p: usize) -> Vec<usize> {
        match self.slots.get(p).and_then(|s| s.as_ref()) {
            Some(slot) => sharers(&self.slots, slot.handle.owner(p)),
            None => Vec::new(),
        }
    }

    pub(crate) fn input_mut(&mut self, p: usize) -> Option<&mut Input> {
        self.slots
            .get_mut(p)?
            .as_mut()
            .map(|slot| &mut slot.state.input)
    }

    pub(crate) fn state(&self, p: usize) -> Option<&PlayerState> {
        self.slots.get(p)?.as_ref().map(|slot| &slot.state)
    }

    /// Open the goal for player `p`
    pub(crate) fn set_goal(&mut self, p: usize, log: &mut CommandLog) {
        emit::sound(log, Sound::Switch, 1.0);
        if let Some(slot) = self.slots.get_mut(p).and_then(|s| s.as_mut()) {
            slot.state.goal_enabled = true;
            emit::goal_open(log, p);
        }
    }

    /// Reset player `p` to its spawn point without reloading anything
    pub(crate) fn respawn(&mut self, p: usize, log: &mut CommandLog) {
        let audience = self.audience(p);
        let Some(spawn) = self.state(p).map(|s| s.spawn) else {
            return;
        };
        let view = self.spawn_view(spawn);
        let Some((state, buffer)) = split_slot(&mut self.slots, p) else {
            return;
        };

        if let Some(ball) = buffer.balls.get_mut(state.ball) {
            ball.reset(spawn);
        }
        let punching = state.punch.is_active();
        state.respawn(view);

        if punching {
            emit::punch(log, p, false);
        }
        emit::status(log, p, state.status);
        emit::timer(log, p, state.timer);
        emit::view(log, p, &state.view);
        if let Some(ball) = buffer.balls.get(state.ball) {
            for &q in &audience {
                emit::ball_radius(log, q, state.ball, ball.r);
                emit::ball_in_play(log, q, state.ball, true);
            }
        }
        log::debug!("player {p} respawned");
    }
}
