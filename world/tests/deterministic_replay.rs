use std::time::Duration;

use dynamite_core::{Action, Command, Event};
use dynamite_world::{self as world, query, SimulationConfig, TileMap, World};

const LEVEL: &str = "
    ..........
    .>>>>>>>v.
    .^#DS##.v.
    .^#T###.v.
    .^<<<<<<<.
    ..........
";

#[test]
fn deterministic_replay_produces_identical_runs() {
    let first = replay(scripted_commands());
    let second = replay(scripted_commands());

    assert!(!first.events.is_empty());
    assert_eq!(first, second, "replay diverged between runs");
}

#[derive(Debug, PartialEq)]
struct ReplayOutcome {
    entities: Vec<query::EntitySnapshot>,
    events: Vec<Event>,
    tick: u64,
}

fn replay(commands: Vec<Command>) -> ReplayOutcome {
    let map = TileMap::from_legend(LEVEL).expect("valid level");
    let mut events = Vec::new();
    let mut world =
        World::load(map, SimulationConfig::default(), &mut events).expect("level loads");

    for command in commands {
        world::apply(&mut world, command, &mut events).expect("command applies");
        query::verify_invariants(&world).expect("invariants hold");
    }

    ReplayOutcome {
        entities: query::entities(&world),
        tick: query::tick_index(&world),
        events,
    }
}

fn press(action: Action) -> [Command; 2] {
    [Command::Press { action }, Command::Release { action }]
}

fn wait(frames: usize, millis: u64) -> impl Iterator<Item = Command> {
    std::iter::repeat(Command::Tick {
        dt: Duration::from_millis(millis),
    })
    .take(frames)
}

fn scripted_commands() -> Vec<Command> {
    let mut commands = Vec::new();
    commands.extend(press(Action::Left));
    commands.extend(press(Action::Interact));
    commands.extend(press(Action::Interact));
    commands.extend(press(Action::Right));
    commands.extend(press(Action::Right));
    commands.extend(wait(12, 25));
    commands.extend(press(Action::Up));
    commands.extend(press(Action::DropBomb));
    commands.extend(wait(40, 50));
    commands.extend(press(Action::Right));
    commands.extend(press(Action::DropBomb));
    commands.extend(press(Action::Log));
    commands.extend(wait(90, 40));
    commands.push(Command::ReloadLevel);
    commands.extend(press(Action::Right));
    commands.extend(wait(10, 100));
    commands
}
