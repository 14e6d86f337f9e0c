#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Headless command-line adapter that replays a key script against a Dynamite level.

mod script;

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use clap::Parser;
use dynamite_core::{Command, Event};
use dynamite_rendering::{Scene, TileGridPresentation};
use dynamite_system_dispatch::Game;
use dynamite_world::{self as world, query, SimulationConfig, TileMap, World};
use log::{debug, info};

use crate::script::{KeyScript, KeyStep, BUILTIN_SCRIPT};

/// Wall-clock delta fed to the dispatcher once per simulated frame.
const FRAME_DT: Duration = Duration::from_millis(50);

/// Level used when no legend file is supplied.
const BUILTIN_LEVEL: &str = "\
#T#####T##
#DS#......
####>>>>v.
#T##^...v.
....^<<<<.
..X.......
";

/// Command-line arguments accepted by the Dynamite CLI.
#[derive(Debug, Parser)]
#[command(name = "dynamite", about = "Replays scripted key presses against a Dynamite level.")]
struct CliArgs {
    /// Legend file describing the level; a built-in level is used when omitted.
    #[arg(long, value_name = "PATH")]
    level: Option<PathBuf>,
    /// TOML file overriding simulation constants.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Key script with one `<frame> <press|release|tap> <key>` instruction per line.
    #[arg(long, value_name = "PATH")]
    keys: Option<PathBuf>,
    /// Number of frames to simulate.
    #[arg(long, default_value_t = 200)]
    frames: u32,
}

/// Entry point for the Dynamite command-line interface.
fn main() -> Result<()> {
    env_logger::init();
    let args = CliArgs::parse();
    run(&args)
}

fn run(args: &CliArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let legend = match &args.level {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("failed to read level {}", path.display()))?,
        None => BUILTIN_LEVEL.to_owned(),
    };
    let map = TileMap::from_legend(&legend).context("failed to parse level legend")?;
    let script = match &args.keys {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("failed to read key script {}", path.display()))?;
            KeyScript::parse(&text)
                .with_context(|| format!("failed to parse key script {}", path.display()))?
        }
        None => KeyScript::parse(BUILTIN_SCRIPT).context("failed to parse built-in key script")?,
    };
    info!(
        "replaying {} key transitions over {} frames",
        script.transitions(),
        args.frames
    );

    let mut game = Game::new(&config).context("invalid typematic settings")?;
    let mut scene = Scene::new(TileGridPresentation::with_dimensions(map.columns(), map.rows()));
    let mut events = Vec::new();
    let mut world = World::load(map, config, &mut events).context("failed to load level")?;
    present(&mut scene, &events)?;

    for frame in 0..args.frames {
        let mut commands = Vec::new();
        for step in script.at(frame) {
            match *step {
                KeyStep::Press(key) => game.on_key_press(key, &mut commands),
                KeyStep::Release(key) => game.on_key_release(key, &mut commands),
            }
        }
        game.timer(FRAME_DT, &mut commands);

        for command in commands {
            if command == Command::ReloadLevel {
                scene.clear();
            }
            let mut events = Vec::new();
            world::apply(&mut world, command, &mut events)
                .with_context(|| format!("frame {frame}: {command:?} failed"))?;
            present(&mut scene, &events)?;
        }
    }

    report(&world, &scene);
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<SimulationConfig> {
    let Some(path) = path else {
        return Ok(SimulationConfig::default());
    };
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("failed to parse config {}", path.display()))
}

fn present(scene: &mut Scene, events: &[Event]) -> Result<()> {
    for event in events {
        match event {
            Event::TimeAdvanced { .. } | Event::VisualMoved { .. } => debug!("{event:?}"),
            _ => info!("{event:?}"),
        }
        scene
            .apply(event)
            .with_context(|| format!("scene rejected {event:?}"))?;
    }
    Ok(())
}

fn report(world: &World, scene: &Scene) {
    let player = query::player(world);
    info!(
        "stopped after {} logic ticks; player {player} at {:?} (screen {:?}), {:?}",
        query::tick_index(world),
        query::position(world, player),
        scene.screen_position(player),
        query::player_state(world)
    );
    info!(
        "{} visuals, {} explosions on screen, {} bombs carried",
        scene.visuals().count(),
        scene.explosions().len(),
        query::carried_bombs(world).len()
    );
}
