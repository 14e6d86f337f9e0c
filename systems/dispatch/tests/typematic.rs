use std::time::Duration;

use dynamite_core::{Action, Command, Event, Vector};
use dynamite_system_dispatch::{Game, GameState, Key};
use dynamite_world::{self as world, query, SimulationConfig, TileMap, World};

fn presses(commands: &[Command]) -> usize {
    commands
        .iter()
        .filter(|command| matches!(command, Command::Press { .. }))
        .count()
}

fn run(world: &mut World, commands: Vec<Command>) -> Vec<Event> {
    let mut events = Vec::new();
    for command in commands {
        world::apply(world, command, &mut events).expect("command applies");
    }
    query::verify_invariants(world).expect("invariants hold");
    events
}

#[test]
fn held_key_repeats_after_the_initial_delay() {
    let mut game = Game::new(&SimulationConfig::default()).expect("valid config");
    let mut out = Vec::new();
    game.on_key_press(Key::Right, &mut out);
    assert_eq!(out, vec![Command::Press { action: Action::Right }]);
    assert_eq!(game.repeating(), Some(Action::Right));

    let mut out = Vec::new();
    game.timer(Duration::from_millis(500), &mut out);
    assert_eq!(presses(&out), 0);
    assert_eq!(out, vec![Command::Tick { dt: Duration::from_millis(500) }]);

    let mut out = Vec::new();
    game.timer(Duration::from_millis(500), &mut out);
    assert_eq!(
        out,
        vec![
            Command::Press { action: Action::Right },
            Command::Tick { dt: Duration::from_millis(500) },
        ]
    );

    let mut out = Vec::new();
    game.timer(Duration::from_millis(600), &mut out);
    assert_eq!(presses(&out), 2);
}

#[test]
fn releasing_the_key_stops_the_repeat() {
    let mut game = Game::new(&SimulationConfig::default()).expect("valid config");
    let mut out = Vec::new();
    game.on_key_press(Key::W, &mut out);
    game.on_key_release(Key::Up, &mut out);
    assert_eq!(
        out,
        vec![
            Command::Press { action: Action::Up },
            Command::Release { action: Action::Up },
        ]
    );
    assert_eq!(game.repeating(), None);

    let mut out = Vec::new();
    game.timer(Duration::from_secs(3), &mut out);
    assert_eq!(presses(&out), 0);
}

#[test]
fn pressing_again_restarts_the_delay() {
    let mut game = Game::new(&SimulationConfig::default()).expect("valid config");
    let mut out = Vec::new();
    game.on_key_press(Key::Left, &mut out);
    game.timer(Duration::from_millis(900), &mut out);
    game.on_key_press(Key::A, &mut out);
    out.clear();

    game.timer(Duration::from_millis(900), &mut out);
    assert_eq!(presses(&out), 0);
    game.timer(Duration::from_millis(100), &mut out);
    assert_eq!(
        out.iter()
            .filter(|command| **command == Command::Press { action: Action::Left })
            .count(),
        1
    );
}

#[test]
fn pause_freezes_the_logic_clock_and_drops_actions() {
    let mut game = Game::new(&SimulationConfig::default()).expect("valid config");
    let mut out = Vec::new();
    game.on_key_press(Key::Escape, &mut out);
    assert_eq!(game.state(), GameState::Paused);

    game.on_key_press(Key::Right, &mut out);
    game.timer(Duration::from_secs(2), &mut out);
    assert!(out.is_empty());

    game.on_key_press(Key::Escape, &mut out);
    assert_eq!(game.state(), GameState::Playing);
    game.timer(Duration::from_millis(50), &mut out);
    assert_eq!(out, vec![Command::Tick { dt: Duration::from_millis(50) }]);
}

#[test]
fn reload_key_requests_a_fresh_level() {
    let mut game = Game::new(&SimulationConfig::default()).expect("valid config");
    let mut out = Vec::new();
    game.on_key_press(Key::R, &mut out);
    assert_eq!(out, vec![Command::ReloadLevel]);
    assert_eq!(game.state(), GameState::Playing);
}

#[test]
fn holding_a_key_walks_the_player_until_blocked() {
    let map = TileMap::from_legend("S###").expect("valid legend");
    let mut world =
        World::load(map, SimulationConfig::default(), &mut Vec::new()).expect("level loads");
    let mut game = Game::new(query::config(&world)).expect("valid config");

    let mut out = Vec::new();
    game.on_key_press(Key::D, &mut out);
    let _ = run(&mut world, out);

    for _ in 0..20 {
        let mut out = Vec::new();
        game.timer(Duration::from_millis(50), &mut out);
        let _ = run(&mut world, out);
    }
    assert_eq!(query::position(&world, query::player(&world)), Some(Vector::new(3, 0)));

    let mut out = Vec::new();
    game.on_key_release(Key::D, &mut out);
    for _ in 0..20 {
        game.timer(Duration::from_millis(50), &mut out);
    }
    let _ = run(&mut world, out);
    assert_eq!(query::position(&world, query::player(&world)), Some(Vector::new(3, 0)));
}
