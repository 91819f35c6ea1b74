//! Command stream determinism and client replication laws

use std::sync::Arc;

use glam::Vec3;
use proptest::prelude::*;

use tiltball::consts::DT;
use tiltball::input::Autopilot;
use tiltball::kernel::ItemKind;
use tiltball::{Client, Command, Level, Mode, Server, Settings};

fn course() -> Level {
    Level::flat("course", 8.0)
        .with_item(Vec3::new(1.0, 0.2, -1.0), ItemKind::Coin, 1)
        .with_item(Vec3::new(-1.0, 0.2, -1.0), ItemKind::Grow, 0)
        .with_switch(Vec3::new(0.0, 0.0, -3.0), 0.5, false)
        .with_goal(Vec3::new(0.0, 0.0, -6.0), 0.75)
}

/// Serialized command stream of a seeded run
fn record(mode: Mode, players: usize, seed: u64) -> Vec<u8> {
    let mut server = Server::new(Settings {
        players,
        ..Settings::default()
    });
    server.init(Arc::new(course()), mode, 3000, true).unwrap();

    let mut pilots: Vec<Autopilot> = (0..players).map(|p| Autopilot::new(seed + p as u64)).collect();
    let frames = [1.0 / 60.0, 1.0 / 144.0, 1.0 / 30.0, 0.0];

    let mut bytes = Vec::new();
    for i in 0..400 {
        for (p, pilot) in pilots.iter_mut().enumerate() {
            pilot.drive(&mut server, p);
        }
        server.step(frames[i % frames.len()]);
        for cmd in server.log_mut().drain() {
            serde_json::to_writer(&mut bytes, &cmd).unwrap();
            bytes.push(b'\n');
        }
    }
    bytes
}

#[test]
fn test_identical_runs_produce_identical_streams() {
    for (mode, players) in [(Mode::Normal, 1), (Mode::Battle, 3), (Mode::Fight, 2), (Mode::Billiards, 2)] {
        let a = record(mode, players, 99);
        let b = record(mode, players, 99);
        assert!(!a.is_empty());
        assert!(a == b, "{mode:?} runs diverged");
    }
}

#[test]
fn test_different_input_changes_stream() {
    assert_ne!(record(Mode::Normal, 1, 1), record(Mode::Normal, 1, 2));
}

#[test]
fn test_prev_copy_once_per_tick_boundary() {
    let settings = Settings {
        players: 2,
        ..Settings::default()
    };
    let level = Arc::new(course());
    let mut server = Server::new(settings.clone());
    let mut client = Client::new();
    client.init(&level, &settings).unwrap();
    server.init(level, Mode::Battle, 0, false).unwrap();
    server.set_z(1.0, 0);
    server.step(DT * 10.0 + DT * 0.5);

    let cmds: Vec<Command> = server.log_mut().drain().collect();
    let mut eous = 0;
    let mut last_was_eou = false;
    for cmd in &cmds {
        let before: Vec<u64> = (0..2).map(|p| client.lerp(p).unwrap().copies).collect();
        client.run_cmd(cmd);
        let is_eou = *cmd == Command::EndOfUpdate;
        for p in 0..2 {
            let delta = client.lerp(p).unwrap().copies - before[p];
            let expected = if (is_eou && eous == 0) || last_was_eou { 1 } else { 0 };
            assert_eq!(delta, expected, "player {p} at {cmd:?} after {eous} updates");
        }
        if is_eou {
            eous += 1;
        }
        last_was_eou = is_eou;
    }
    assert_eq!(eous, 11);
}

#[test]
fn test_client_tracks_server_after_blend() {
    let settings = Settings::default();
    let level = Arc::new(course());
    let mut server = Server::new(settings.clone());
    let mut client = Client::new();
    client.init(&level, &settings).unwrap();
    server.init(level, Mode::Normal, 0, false).unwrap();
    server.set_x(-1.0, 0);

    for _ in 0..30 {
        server.step(DT);
        client.sync(server.log_mut());
    }
    client.blend(1.0);
    client.apply_all();
    let drawn = client.draw(0).unwrap().balls[0].p;
    assert!((drawn - server.ball(0).unwrap().p).length() < 1e-5);

    client.blend(0.0);
    client.apply_all();
    let prev = client.lerp(0).unwrap().balls[0].prev.p;
    assert_eq!(client.draw(0).unwrap().balls[0].p, prev);
}

fn indexed(kind: u8, i: usize) -> Command {
    match kind % 6 {
        0 => Command::PickItem(i),
        1 => Command::SwchEnter(i),
        2 => Command::SwchToggle(i),
        3 => Command::SwchExit(i),
        4 => Command::CurrentBall(i),
        _ => Command::SetPlayer(i + 3),
    }
}

proptest! {
    #[test]
    fn prop_out_of_range_commands_are_no_ops(
        cmds in prop::collection::vec((0u8..6, 1usize..10_000), 1..64)
    ) {
        let level = Arc::new(
            Level::flat("flat", 5.0)
                .with_item(Vec3::new(1.0, 0.2, 0.0), ItemKind::Coin, 1)
                .with_switch(Vec3::ZERO, 0.5, false),
        );
        let mut client = Client::new();
        client.init(&level, &Settings::default()).unwrap();
        client.run_cmd(&Command::SetPlayer(0));
        client.run_cmd(&Command::MakeBall);

        let draw = client.draw(0).unwrap().clone();
        let balls = client.lerp(0).unwrap().balls.clone();

        for (kind, i) in cmds {
            client.run_cmd(&indexed(kind, i));
            client.run_cmd(&Command::BallPosition(Vec3::ONE));
        }

        let after = client.draw(0).unwrap();
        prop_assert_eq!(&after.items, &draw.items);
        prop_assert_eq!(&after.switches, &draw.switches);
        prop_assert!(client.particles().is_empty());
        let lerp = client.lerp(0).unwrap();
        prop_assert_eq!(lerp.balls.len(), balls.len());
        prop_assert_eq!(lerp.balls[0].curr.p, Vec3::ONE);
    }

    #[test]
    fn prop_server_input_bounds(p in 0usize..16, k in -10.0f32..10.0, dx in -5000i32..5000) {
        let mut server = Server::new(Settings::default());
        server.init(Arc::new(Level::flat("flat", 5.0)), Mode::Normal, 0, false).unwrap();
        server.set_x(k, p);
        server.set_z(k, p);
        server.set_pos(dx, -dx, p);
        server.set_rot(k, p);
        server.set_cam(p, p);
        server.set_goal(p);
        server.respawn(p);
        server.step(DT);

        let input = server.player(0).unwrap().input;
        prop_assert!(input.x.abs() <= tiltball::consts::ANGLE_BOUND);
        prop_assert!(input.z.abs() <= tiltball::consts::ANGLE_BOUND);
        prop_assert!(input.r.abs() <= tiltball::consts::VIEWR_BOUND);
        prop_assert!(server.ball(0).unwrap().p.is_finite());
        prop_assert_eq!(server.is_active(p), p == 0);
    }
}
