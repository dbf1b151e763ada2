//! crazycanvas - replicated capture-the-flag paint shooter core
//!
//! Headless match runner: hosts an authoritative server, connects an
//! in-process client, drives a scripted runner bot at the flag and back,
//! and reports the result. Physics and rendering hosts embed the crates
//! directly; this binary exists for smoke-running matches end to end.

mod config;

use anyhow::{Context, Result};
use bevy_ecs::entity::Entity;
use config::MatchConfig;
use crazycanvas_client::ClientGame;
use crazycanvas_core::tunables::FLAG_SPAWN_RADIUS;
use crazycanvas_core::{AmmoType, TeamIndex, FIXED_TICK_SECONDS};
use crazycanvas_game::components::{Attachment, Position};
use crazycanvas_server::ServerGame;
use glam::Vec3;
use rand::Rng;
use std::{env, path::PathBuf};
use tracing::info;

const BLUE: TeamIndex = TeamIndex(0);
const RED: TeamIndex = TeamIndex(1);
const RUNNER_SPEED: f32 = 5.0;
const TRIGGER_RADIUS: f32 = 1.2;

fn main() -> Result<()> {
    // WARN by default, overridable via RUST_LOG.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    info!("Starting crazycanvas v{}", env!("CARGO_PKG_VERSION"));

    let cli = CliOptions::parse(env::args().skip(1));
    let mut config = match cli.config {
        Some(path) => MatchConfig::load_from_path(&path),
        None => MatchConfig::load(),
    };
    if let Some(mode) = cli.mode {
        config.mode = mode;
    }
    if let Some(max_score) = cli.max_score {
        config.max_score = max_score;
    }
    if let Some(max_ticks) = cli.max_ticks {
        config.max_ticks = max_ticks;
    }

    run_match(&config)
}

fn run_match(config: &MatchConfig) -> Result<()> {
    let mode = config.game_mode();
    let mut server = ServerGame::new(mode, config.max_score);

    let flag_home = Vec3::ZERO;
    let blue_base = Vec3::new(-12.0, 0.0, 0.0);
    let red_base = Vec3::new(12.0, 0.0, 0.0);

    server.spawn_flag_spawn(flag_home, FLAG_SPAWN_RADIUS, None)?;
    let mut rng = rand::thread_rng();
    let jitter = Vec3::new(
        rng.gen_range(-FLAG_SPAWN_RADIUS..FLAG_SPAWN_RADIUS),
        0.0,
        rng.gen_range(-FLAG_SPAWN_RADIUS..FLAG_SPAWN_RADIUS),
    );
    let flag = server.spawn_flag(flag_home + jitter, None)?;
    let blue_point = server.spawn_delivery_point(blue_base, BLUE)?;
    server.spawn_delivery_point(red_base, RED)?;

    let runner = server.spawn_player(BLUE, blue_base, Vec3::X)?;
    server.spawn_player(RED, red_base, Vec3::NEG_X)?;
    let runner_uid = server
        .uid_of(runner)
        .context("Runner has no network uid")?;
    let mut client = ClientGame::new(runner_uid);

    server.start_match();

    let mut ticks = 0u64;
    while ticks < config.max_ticks {
        if server.has_begun() {
            drive_runner(&mut server, runner, flag, blue_point, blue_base);
            // Squeeze the trigger once a second for flavor.
            if ticks % 30 == 0 {
                client.local_fire(AmmoType::Paint);
            }
        }

        server.tick();
        for packet in server.take_outbound() {
            client.apply_packet(packet)?;
        }
        client.tick();
        for packet in client.take_outbound() {
            server.apply_client_packet(runner, packet);
        }

        if server.game_over().is_some() {
            break;
        }
        ticks += 1;
    }

    match server.game_over() {
        Some(winner) => info!(
            winner = winner.0,
            blue = server.score(BLUE),
            red = server.score(RED),
            ticks,
            "match finished"
        ),
        None => info!(
            blue = server.score(BLUE),
            red = server.score(RED),
            ticks,
            "tick budget exhausted without a winner"
        ),
    }
    Ok(())
}

/// Walk the runner at the flag, then home, reporting trigger overlaps the
/// way a physics scene would.
fn drive_runner(
    server: &mut ServerGame,
    runner: Entity,
    flag: Entity,
    blue_point: Entity,
    blue_base: Vec3,
) {
    let carrying = server
        .world()
        .get::<Attachment>(flag)
        .map(|a| a.attached && a.holder == runner)
        .unwrap_or(false);
    let Some(flag_pos) = server.world().get::<Position>(flag).map(|p| p.0) else {
        return;
    };
    let Some(runner_pos) = server.world().get::<Position>(runner).map(|p| p.0) else {
        return;
    };

    let target = if carrying { blue_base } else { flag_pos };
    let step = (target - runner_pos).normalize_or_zero() * RUNNER_SPEED * FIXED_TICK_SECONDS;
    let next = runner_pos + step;
    if let Some(mut position) = server.world_mut().get_mut::<Position>(runner) {
        position.0 = next;
    }

    if !carrying && next.distance(flag_pos) < TRIGGER_RADIUS {
        server.handle_flag_trigger_overlap(flag, runner);
    }
    if carrying && next.distance(blue_base) < TRIGGER_RADIUS {
        server.handle_delivery_trigger_overlap(blue_point, flag);
    }
}

struct CliOptions {
    config: Option<PathBuf>,
    mode: Option<String>,
    max_score: Option<u32>,
    max_ticks: Option<u64>,
}

impl CliOptions {
    fn parse<I: Iterator<Item = String>>(mut args: I) -> Self {
        let mut opts = CliOptions {
            config: None,
            mode: None,
            max_score: None,
            max_ticks: None,
        };
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" => opts.config = args.next().map(PathBuf::from),
                "--mode" => opts.mode = args.next(),
                "--max-score" => {
                    opts.max_score = args.next().and_then(|v| v.parse().ok());
                }
                "--max-ticks" => {
                    opts.max_ticks = args.next().and_then(|v| v.parse().ok());
                }
                other => tracing::error!("Unknown argument: {other}"),
            }
        }
        opts
    }
}
