//! Frame loop
//!
//! Server and client run interleaved on one thread. Each frame the server
//! runs however many fixed ticks the frame time covers, the client replays
//! what they produced, and the leftover fraction of a tick becomes the render
//! blend factor.

use std::io::Write;
use std::sync::Arc;

use crate::client::Client;
use crate::demo::DemoRecorder;
use crate::error::{DemoError, LoadError};
use crate::kernel::{Kernel, Level, SolidKernel};
use crate::settings::Settings;
use crate::sim::{Mode, Server};

#[derive(Debug)]
pub struct Game<K: Kernel = SolidKernel> {
    pub server: Server<K>,
    pub client: Client,
}

impl Game<SolidKernel> {
    pub fn new(settings: Settings) -> Self {
        Self::with_kernel(SolidKernel::default(), settings)
    }
}

impl<K: Kernel> Game<K> {
    pub fn with_kernel(kernel: K, settings: Settings) -> Self {
        Self {
            server: Server::with_kernel(kernel, settings),
            client: Client::new(),
        }
    }

    /// Load `level` on both sides and replay the initial state
    pub fn load(
        &mut self,
        level: Arc<Level>,
        mode: Mode,
        time_limit_cs: u32,
        goal_enabled: bool,
    ) -> Result<(), LoadError> {
        let settings = self.server.settings().clone();
        self.client.init(&level, &settings)?;
        if let Err(err) = self.server.init(level, mode, time_limit_cs, goal_enabled) {
            self.client.free();
            return Err(err);
        }
        self.client.sync(self.server.log_mut());
        Ok(())
    }

    /// Advance one frame of `dt` seconds; returns the ticks run
    pub fn step(&mut self, dt: f32) -> u32 {
        let ticks = self.server.step(dt);
        self.client.sync(self.server.log_mut());
        self.present();
        ticks
    }

    /// Like [`step`](Self::step), also writing the commands to a demo
    pub fn step_recording<W: Write>(
        &mut self,
        dt: f32,
        demo: &mut DemoRecorder<W>,
    ) -> Result<u32, DemoError> {
        let ticks = self.server.step(dt);
        let result = self.client.sync_recording(self.server.log_mut(), demo);
        self.present();
        result.map(|()| ticks)
    }

    fn present(&mut self) {
        self.client.blend(self.server.blend());
        self.client.apply_all();
    }

    pub fn free(&mut self) {
        self.server.free();
        self.client.free();
    }
}
