//! Tiltball headless runner
//!
//! Plays a built-in course with autopilot input and logs what happens.
//!
//! Usage: `tiltball [mode] [players] [seconds] [demo.jsonl]`

use std::env;
use std::process::ExitCode;
use std::sync::Arc;

use glam::Vec3;

use tiltball::demo::DemoRecorder;
use tiltball::input::Autopilot;
use tiltball::kernel::ItemKind;
use tiltball::{Game, Level, Mode, Settings, Status};

/// Frame time of the simulated display
const FRAME_DT: f32 = 1.0 / 60.0;

fn course() -> Level {
    Level::flat("courses/tilt-01.json", 8.0)
        .with_version(1, 2)
        .with_item(Vec3::new(1.5, 0.2, -2.0), ItemKind::Coin, 1)
        .with_item(Vec3::new(-1.5, 0.2, -2.0), ItemKind::Coin, 5)
        .with_item(Vec3::new(0.0, 0.2, -4.0), ItemKind::Clock, 10)
        .with_item(Vec3::new(3.0, 0.2, 0.0), ItemKind::Grow, 0)
        .with_switch(Vec3::new(-3.0, 0.0, 0.0), 0.5, false)
        .with_jump(Vec3::new(0.0, 0.0, 4.0), 0.5, Vec3::new(0.0, 0.0, -6.0))
        .with_goal(Vec3::new(0.0, 0.0, -7.0), 0.75)
        .with_view(Vec3::new(0.0, 6.0, 10.0), Vec3::ZERO)
        .with_view(Vec3::new(0.0, 6.0, -12.0), Vec3::new(0.0, 0.0, -7.0))
}

fn main() -> ExitCode {
    env_logger::init();
    log::info!("Tiltball (headless) starting...");

    let args: Vec<String> = env::args().skip(1).collect();
    let mode = args
        .first()
        .and_then(|s| Mode::from_str(s))
        .unwrap_or(Mode::Normal);
    let players = args.get(1).and_then(|s| s.parse().ok()).unwrap_or(1);
    let seconds: f32 = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(20.0);

    let settings = Settings {
        players,
        ..Settings::load_or_default("tiltball.json")
    };
    let mut game = Game::new(settings);

    if let Err(err) = game.load(Arc::new(course()), mode, 6000, mode == Mode::Normal) {
        log::error!("failed to load course: {err}");
        return ExitCode::FAILURE;
    }

    let mut demo = match args.get(3) {
        Some(path) => match DemoRecorder::create(path) {
            Ok(demo) => Some(demo),
            Err(err) => {
                log::warn!("not recording: {err}");
                None
            }
        },
        None => None,
    };

    let mut pilots: Vec<Autopilot> = (0..game.server.player_count())
        .map(|p| Autopilot::new(0x7117_ba11 + p as u64))
        .collect();
    let mut last = [Status::None; tiltball::consts::MAX_PLAYERS];
    let frames = (seconds / FRAME_DT) as u32;
    let mut ticks = 0;

    for _ in 0..frames {
        for (p, pilot) in pilots.iter_mut().enumerate() {
            pilot.drive(&mut game.server, p);
        }

        ticks += match demo.as_mut() {
            Some(recorder) => match game.step_recording(FRAME_DT, recorder) {
                Ok(n) => n,
                Err(err) => {
                    log::warn!("demo recording stopped: {err}");
                    demo = None;
                    0
                }
            },
            None => game.step(FRAME_DT),
        };
        game.client.step_fade(FRAME_DT);

        for (p, status) in last.iter_mut().enumerate() {
            let now = game.client.status(p);
            if now != *status {
                log::info!("player {p}: {status:?} -> {now:?}");
                *status = now;
            }
            if now.is_terminal() && game.server.is_active(p) {
                game.server.respawn(p);
            }
        }

        for cue in game.client.take_sounds() {
            log::debug!("sound {} at {:.2}", cue.sound.path(), cue.volume);
        }
    }

    if let Some(mut recorder) = demo {
        if let Err(err) = recorder.flush() {
            log::warn!("demo flush failed: {err}");
        }
        log::info!("recorded {} commands", recorder.count());
    }

    println!(
        "{} mode, {} player(s), {ticks} ticks",
        mode.as_str(),
        game.server.player_count()
    );
    for p in 0..game.server.player_count() {
        println!(
            "  player {p}: coins {}, clock {}, speed {:.2}, altitude {:.2}",
            game.client.coins(p),
            game.client.clock(p),
            game.server.speed(p),
            game.server.altitude(p),
        );
    }

    game.free();
    ExitCode::SUCCESS
}
