use dynamite_core::{
    Action, Command, Direction, EntityId, EntityKind, Event, MoveState, Occupant, Vec2, Vector,
};
use dynamite_world::{self as world, query, LevelError, SimulationConfig, TileMap, World};

fn load_with(legend: &str, config: SimulationConfig) -> World {
    let map = TileMap::from_legend(legend).expect("valid legend");
    World::load(map, config, &mut Vec::new()).expect("level loads")
}

fn load(legend: &str) -> World {
    load_with(legend, SimulationConfig::default())
}

fn apply(world: &mut World, command: Command) -> Vec<Event> {
    let mut events = Vec::new();
    world::apply(world, command, &mut events).expect("command applies");
    query::verify_invariants(world).expect("invariants hold");
    events
}

fn tick(world: &mut World, count: u32) -> Vec<Event> {
    let dt = query::config(world).logic_interval();
    let mut events = Vec::new();
    for _ in 0..count {
        events.extend(apply(world, Command::Tick { dt }));
    }
    events
}

fn tap(world: &mut World, action: Action) -> Vec<Event> {
    let mut events = apply(world, Command::Press { action });
    events.extend(apply(world, Command::Release { action }));
    events
}

/// Takes a bomb from the dispenser west of the player and drops it to the east.
fn drop_east(world: &mut World) -> EntityId {
    let _ = tap(world, Action::Left);
    let _ = tap(world, Action::Interact);
    let _ = tap(world, Action::Right);
    let bomb = *query::carried_bombs(world).last().expect("bomb picked up");
    let _ = tap(world, Action::DropBomb);
    bomb
}

fn player_position(world: &World) -> Option<Vector> {
    query::position(world, query::player(world))
}

#[test]
fn single_tile_level_blocks_every_direction() {
    let mut world = load("S");
    assert_eq!(query::player_state(&world), Some(MoveState::Stationary));

    for action in [Action::Up, Action::Down, Action::Left, Action::Right] {
        let _ = tap(&mut world, action);
        let _ = tap(&mut world, action);
        let _ = tick(&mut world, 20);
        assert_eq!(player_position(&world), Some(Vector::new(0, 0)));
        assert_eq!(query::player_state(&world), Some(MoveState::Stationary));
    }
}

#[test]
fn step_right_arrives_after_movement_interval() {
    let mut world = load(
        "
        #####
        #####
        ##S##
        #####
        #####
        ",
    );
    assert_eq!(player_position(&world), Some(Vector::new(2, 2)));

    let _ = tap(&mut world, Action::Right);
    let _ = tick(&mut world, 14);
    assert_ne!(query::player_state(&world), Some(MoveState::Stationary));

    let _ = tick(&mut world, 1);
    assert_eq!(player_position(&world), Some(Vector::new(3, 2)));
    assert_eq!(query::player_state(&world), Some(MoveState::Stationary));
    assert_eq!(
        query::visual_position(&world, query::player(&world)),
        Some(Vec2::new(3.0, 2.0))
    );
}

#[test]
fn opposite_key_aborts_and_returns_home() {
    let mut world = load("#S##");
    let player = query::player(&world);

    let _ = tap(&mut world, Action::Right);
    let _ = tick(&mut world, 3);
    assert_eq!(query::occupant(&world, Vector::new(2, 0)), Some(Occupant::Claim(player)));

    let _ = tap(&mut world, Action::Left);
    assert_eq!(query::occupant(&world, Vector::new(2, 0)), None);
    assert_eq!(query::player_state(&world), Some(MoveState::MovingCommitted));

    let abort_ticks = query::config(&world).abort_logics();
    let _ = tick(&mut world, abort_ticks);
    assert_eq!(query::player_state(&world), Some(MoveState::Stationary));
    assert_eq!(player_position(&world), Some(Vector::new(1, 0)));
    assert_eq!(query::visual_position(&world, player), Some(Vec2::new(1.0, 0.0)));
    assert_eq!(query::orientation(&world), Some(Direction::East));
}

#[test]
fn key_pressed_while_moving_replays_on_arrival() {
    let mut world = load("S##\n###");

    let _ = tap(&mut world, Action::Right);
    let _ = tick(&mut world, 2);
    let _ = tap(&mut world, Action::Down);
    let _ = tick(&mut world, 13);

    assert_eq!(player_position(&world), Some(Vector::new(1, 0)));
    assert_eq!(query::orientation(&world), Some(Direction::South));
    assert_eq!(query::player_state(&world), Some(MoveState::Stationary));
}

#[test]
fn held_key_keeps_walking() {
    let mut world = load("S###");

    let _ = apply(&mut world, Command::Press { action: Action::Right });
    let _ = tick(&mut world, 30);
    assert_eq!(player_position(&world), Some(Vector::new(2, 0)));
    assert_ne!(query::player_state(&world), Some(MoveState::Stationary));

    let _ = apply(&mut world, Command::Release { action: Action::Right });
    let _ = tick(&mut world, 15);
    assert_eq!(player_position(&world), Some(Vector::new(3, 0)));
    assert_eq!(query::player_state(&world), Some(MoveState::Stationary));
}

#[test]
fn bomb_drifts_one_cell_per_water_interval() {
    let config = SimulationConfig {
        timed_bomb_interval: 10_000,
        ..SimulationConfig::default()
    };
    let mut world = load_with("DS>>>>>.", config);
    let bomb = drop_east(&mut world);
    assert!(query::is_floating(&world, bomb));

    let _ = tick(&mut world, 39);
    assert_eq!(query::position(&world, bomb), Some(Vector::new(2, 0)));
    let _ = tick(&mut world, 1);
    assert_eq!(query::position(&world, bomb), Some(Vector::new(3, 0)));
    let _ = tick(&mut world, 60);
    assert_eq!(query::position(&world, bomb), Some(Vector::new(4, 0)));
    let _ = tick(&mut world, 60);
    assert_eq!(query::position(&world, bomb), Some(Vector::new(5, 0)));

    let _ = tick(&mut world, 300);
    assert_eq!(query::position(&world, bomb), Some(Vector::new(7, 0)));
    let snapshot = query::entity(&world, bomb).expect("bomb still present");
    assert_eq!(snapshot.claim, None);
    assert_eq!(snapshot.visual, Vec2::new(7.0, 0.0));
}

#[test]
fn fuse_fires_exactly_once_after_interval() {
    let mut world = load("DS##");
    let bomb = drop_east(&mut world);

    let events = tick(&mut world, 400);
    let mut current_tick = 0;
    let mut detonations = Vec::new();
    let mut flashes = 0;
    for event in &events {
        match event {
            Event::TimeAdvanced { tick } => current_tick = *tick,
            Event::BombDetonated { bomb: detonated, .. } if *detonated == bomb => {
                detonations.push(current_tick);
            }
            Event::AnimationPlayed { entity, .. } if *entity == bomb => flashes += 1,
            _ => {}
        }
    }

    assert_eq!(detonations, vec![240]);
    assert!(flashes > 8, "warning flashed {flashes} times");
    assert!(query::entity(&world, bomb).is_none());
}

#[test]
fn explosion_removes_adjacent_dam() {
    let mut world = load("DS#X");
    let dam = query::entities(&world)
        .into_iter()
        .find(|entity| entity.kind == EntityKind::Dam)
        .map(|entity| entity.id)
        .expect("dam spawned");
    assert_eq!(query::occupant(&world, Vector::new(3, 0)), Some(Occupant::Entity(dam)));

    let _ = drop_east(&mut world);
    let events = tick(&mut world, 240);

    assert!(events.contains(&Event::EntityDestroyed { entity: dam }));
    assert_eq!(query::occupant(&world, Vector::new(3, 0)), None);
    assert!(query::tile(&world, Vector::new(3, 0)).expect("tile").is_water());
}

#[test]
fn reload_restores_the_pristine_level() {
    let mut world = load("DS##");
    let _ = drop_east(&mut world);
    let _ = tick(&mut world, 30);

    let events = apply(&mut world, Command::ReloadLevel);

    assert!(matches!(events.last(), Some(Event::LevelLoaded { columns: 4, rows: 1, .. })));
    assert_eq!(player_position(&world), Some(Vector::new(1, 0)));
    assert_eq!(query::tick_index(&world), 0);
    assert_eq!(query::active_timers(&world), 0);
    assert!(query::carried_bombs(&world).is_empty());
    assert_eq!(query::entities(&world).len(), 2);
}

#[test]
fn level_without_spawn_is_rejected() {
    let map = TileMap::from_legend("##\n#.").expect("valid legend");
    let result = World::load(map, SimulationConfig::default(), &mut Vec::new());
    assert!(matches!(result, Err(LevelError::MissingSpawnPoint)));
}

#[test]
fn additional_spawn_points_are_ignored() {
    let world = load("S#S");
    let players = query::entities(&world)
        .into_iter()
        .filter(|entity| entity.kind == EntityKind::Player)
        .count();
    assert_eq!(players, 1);
    assert_eq!(player_position(&world), Some(Vector::new(0, 0)));
    assert_eq!(query::occupant(&world, Vector::new(2, 0)), None);
}

#[test]
fn blast_next_to_a_ridden_raft_strands_the_rider_until_the_raft_leaves() {
    let mut world = load(
        "
        DS##
        ##.#
        ",
    );
    let player = query::player(&world);

    let _ = tap(&mut world, Action::Left);
    let _ = tap(&mut world, Action::Interact);
    let _ = tap(&mut world, Action::Interact);
    let _ = tap(&mut world, Action::Right);
    for _ in 0..2 {
        let _ = tap(&mut world, Action::Right);
        let _ = tick(&mut world, 15);
    }
    let _ = tap(&mut world, Action::Down);
    let neighbour = *query::carried_bombs(&world).last().expect("first bomb");
    let _ = tap(&mut world, Action::DropBomb);
    assert_eq!(query::position(&world, neighbour), Some(Vector::new(3, 1)));

    let _ = tap(&mut world, Action::Left);
    let _ = tap(&mut world, Action::Left);
    let _ = tick(&mut world, 15);
    let _ = tap(&mut world, Action::Down);
    let raft = *query::carried_bombs(&world).last().expect("second bomb");
    let _ = tap(&mut world, Action::DropBomb);
    let _ = tap(&mut world, Action::Down);
    let _ = tick(&mut world, 15);
    assert_eq!(player_position(&world), Some(Vector::new(2, 1)));
    assert_eq!(query::entity(&world, player).and_then(|entity| entity.standing_on), Some(raft));

    let events = tick(&mut world, 220);
    assert!(events.contains(&Event::EntityBlasted {
        entity: player,
        origin: Vector::new(3, 1),
        strength: 2
    }));
    assert!(events.contains(&Event::ChildDetached {
        parent: raft,
        child: player
    }));

    assert_eq!(query::position(&world, raft), Some(Vector::new(1, 1)));
    assert!(!query::is_floating(&world, raft));
    assert_eq!(player_position(&world), Some(Vector::new(2, 1)));
    assert_eq!(query::occupant(&world, Vector::new(2, 1)), Some(Occupant::Entity(player)));
    assert_eq!(query::entity(&world, player).and_then(|entity| entity.standing_on), None);
    query::verify_invariants(&world).expect("invariants after the blast");
}
