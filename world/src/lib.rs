#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative world state management for Dynamite.
//!
//! The world owns the tile map, the occupancy grid, the entity arena and the
//! logic schedule. Adapters drive it exclusively through [`apply`] and observe
//! it through the [`query`] module and the emitted events.

mod bomb;
mod config;
mod entity;
mod error;
mod grid;
mod map;
mod player;
mod protocol;

use std::{collections::BTreeMap, time::Duration};

use dynamite_core::{Action, Command, EntityId, Event, Occupant, Vector};
use dynamite_system_timing::{Clock, Schedule, TimerStep};
use log::{error, info, warn};

use entity::{behavior, Entity, Role};
use grid::OccupancyGrid;
use player::PlayerState;

pub use config::SimulationConfig;
pub use error::{ContractViolation, LevelError, WorldError};
pub use map::{MapError, Spawn, Terrain, Tile, TileMap};

/// Work items carried by the logic timers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum TimerAction {
    AnimationTick(EntityId),
    AnimationHalfway(EntityId),
    AnimationFinished(EntityId),
    ToggleWarning(EntityId),
    Detonate(EntityId),
    RemoveDebris(EntityId),
}

/// Represents the authoritative Dynamite world state.
#[derive(Debug)]
pub struct World {
    config: SimulationConfig,
    pristine: TileMap,
    map: TileMap,
    grid: OccupancyGrid,
    entities: BTreeMap<EntityId, Entity>,
    next_entity: u32,
    schedule: Schedule<TimerAction>,
    player: EntityId,
    key_handler: Option<EntityId>,
    held: Option<Action>,
    stranded: BTreeMap<Vector, EntityId>,
    tick_index: u64,
    halted: bool,
}

impl World {
    /// Builds a world from a static map and materialises its spawn directives.
    pub fn load(
        map: TileMap,
        config: SimulationConfig,
        out_events: &mut Vec<Event>,
    ) -> Result<Self, LevelError> {
        let clock = Clock::new("logic", config.logic_interval())?;
        let mut world = Self {
            grid: OccupancyGrid::new(map.columns(), map.rows()),
            map: map.clone(),
            pristine: map,
            config,
            entities: BTreeMap::new(),
            next_entity: 0,
            schedule: Schedule::new(clock),
            player: EntityId::new(0),
            key_handler: None,
            held: None,
            stranded: BTreeMap::new(),
            tick_index: 0,
            halted: false,
        };
        world.materialize(out_events)?;
        Ok(world)
    }

    fn materialize(&mut self, out_events: &mut Vec<Event>) -> Result<(), LevelError> {
        self.map = self.pristine.clone();
        self.grid = OccupancyGrid::new(self.map.columns(), self.map.rows());
        self.entities.clear();
        self.next_entity = 0;
        self.schedule.reset();
        self.key_handler = None;
        self.held = None;
        self.stranded.clear();
        self.tick_index = 0;

        let spawns: Vec<(Vector, Tile)> = self
            .pristine
            .cells()
            .filter(|(_, tile)| tile.spawn().is_some())
            .map(|(cell, tile)| (cell, *tile))
            .collect();

        let mut player = None;
        for (cell, tile) in spawns {
            let _ = self.map.set(cell, tile.without_spawn());
            let Some(spawn) = tile.spawn() else {
                continue;
            };
            let role = match spawn {
                Spawn::Player if player.is_some() => {
                    warn!("ignoring additional player spawn at {cell}");
                    continue;
                }
                Spawn::Player => Role::Player(PlayerState::new(self.config.spawn_orientation)),
                Spawn::Blockage => Role::Dam,
                Spawn::Tree => Role::Scenery,
                Spawn::Dispenser => Role::Dispenser,
            };
            let is_player = matches!(role, Role::Player(_));
            let id = self.spawn_entity(role, cell, out_events)?;
            if is_player {
                player = Some(id);
            }
        }

        let player = player.ok_or(LevelError::MissingSpawnPoint)?;
        self.player = player;
        self.key_handler = Some(player);
        info!(
            "level loaded: {}x{} tiles, {} entities, player {player}",
            self.map.columns(),
            self.map.rows(),
            self.entities.len()
        );
        out_events.push(Event::LevelLoaded {
            columns: self.map.columns(),
            rows: self.map.rows(),
            player,
        });
        Ok(())
    }

    /// Adds an off-grid entity to the arena.
    pub(crate) fn create_entity(&mut self, role: Role) -> EntityId {
        let id = EntityId::new(self.next_entity);
        self.next_entity += 1;
        let _ = self.entities.insert(id, Entity::new(id, role));
        id
    }

    fn spawn_entity(
        &mut self,
        role: Role,
        cell: Vector,
        out_events: &mut Vec<Event>,
    ) -> Result<EntityId, ContractViolation> {
        let id = self.create_entity(role);
        self.entity_mut(id)?.visual = cell.as_vec2();
        self.assign_position(id, Some(cell), out_events)?;
        let entity = self.entity(id)?;
        out_events.push(Event::VisualCreated {
            entity: id,
            kind: entity.kind(),
            position: entity.visual,
            sprite: entity.sprite(),
        });
        Ok(id)
    }

    pub(crate) fn entity(&self, id: EntityId) -> Result<&Entity, ContractViolation> {
        self.entities
            .get(&id)
            .ok_or(ContractViolation::UnknownEntity(id))
    }

    pub(crate) fn entity_mut(&mut self, id: EntityId) -> Result<&mut Entity, ContractViolation> {
        self.entities
            .get_mut(&id)
            .ok_or(ContractViolation::UnknownEntity(id))
    }

    fn advance(
        &mut self,
        dt: Duration,
        out_events: &mut Vec<Event>,
    ) -> Result<(), ContractViolation> {
        let ticks = self.schedule.advance(dt);
        for _ in 0..ticks {
            self.logic_tick(out_events)?;
        }
        Ok(())
    }

    fn logic_tick(&mut self, out_events: &mut Vec<Event>) -> Result<(), ContractViolation> {
        self.tick_index = self.tick_index.saturating_add(1);
        out_events.push(Event::TimeAdvanced {
            tick: self.tick_index,
        });

        for id in self.schedule.tick_order() {
            let action = match self.schedule.advance_timer(id) {
                TimerStep::Idle => None,
                TimerStep::Tick(action) | TimerStep::End(action) => action,
            };
            if let Some(action) = action {
                self.dispatch(action, out_events)?;
            }
        }
        Ok(())
    }

    fn dispatch(
        &mut self,
        action: TimerAction,
        out_events: &mut Vec<Event>,
    ) -> Result<(), ContractViolation> {
        match action {
            TimerAction::AnimationTick(id) => self.animation_tick(id, out_events),
            TimerAction::AnimationHalfway(id) => {
                let entity = self.entity_mut(id)?;
                entity.animator.reached_halfway();
                let kind = entity.kind();
                behavior(kind).animation_halfway(self, id, out_events)
            }
            TimerAction::AnimationFinished(id) => {
                let entity = self.entity_mut(id)?;
                entity.animator.finish();
                entity.visual = entity.animator.target();
                let (kind, position) = (entity.kind(), entity.visual);
                out_events.push(Event::VisualMoved {
                    entity: id,
                    position,
                });
                self.carry_rider_visual(id, out_events)?;
                behavior(kind).animation_finished(self, id, out_events)
            }
            TimerAction::ToggleWarning(id) => self.toggle_warning(id, out_events),
            TimerAction::Detonate(id) => self.detonate(id, out_events),
            TimerAction::RemoveDebris(id) => self.remove_debris(id, out_events),
        }
    }

    fn animation_tick(
        &mut self,
        id: EntityId,
        out_events: &mut Vec<Event>,
    ) -> Result<(), ContractViolation> {
        let position = {
            let entity = self
                .entities
                .get_mut(&id)
                .ok_or(ContractViolation::UnknownEntity(id))?;
            entity.visual = entity.animator.value(&self.schedule);
            entity.visual
        };
        out_events.push(Event::VisualMoved {
            entity: id,
            position,
        });
        self.carry_rider_visual(id, out_events)
    }

    /// Moves an idle rider's visual along with its platform.
    fn carry_rider_visual(
        &mut self,
        platform: EntityId,
        out_events: &mut Vec<Event>,
    ) -> Result<(), ContractViolation> {
        let (rider, position) = {
            let entity = self.entity(platform)?;
            (entity.occupant, entity.visual)
        };
        let Some(rider) = rider else {
            return Ok(());
        };
        let rider = self.entity_mut(rider)?;
        if rider.animator.is_running() {
            return Ok(());
        }
        rider.visual = position;
        out_events.push(Event::VisualMoved {
            entity: rider.id,
            position,
        });
        Ok(())
    }

    fn press(
        &mut self,
        action: Action,
        out_events: &mut Vec<Event>,
    ) -> Result<(), ContractViolation> {
        if action.direction().is_some() {
            self.held = Some(action);
        }
        match self.key_handler {
            Some(handler) => self.player_action(handler, action, out_events),
            None => Ok(()),
        }
    }

    fn release(&mut self, action: Action) {
        if self.held == Some(action) {
            self.held = None;
        }
    }

    /// Writes the occupancy grid and the entity table to the log.
    pub(crate) fn dump_state(&self) {
        let (columns, rows) = self.grid.dimensions();
        info!("tick {} | {columns}x{rows} grid", self.tick_index);
        for row in 0..rows as i32 {
            let line: Vec<String> = (0..columns as i32)
                .map(|column| match self.grid.occupant(Vector::new(column, row)) {
                    Some(Occupant::Entity(id)) => format!("{:>4}", id.to_string()),
                    Some(Occupant::Claim(id)) => format!("{:>4}", format!("c{}", id.get())),
                    None => "   .".to_owned(),
                })
                .collect();
            info!("{}", line.concat());
        }
        for entity in self.entities.values() {
            info!(
                "{} {:?} position={:?} visual={} claim={:?} queued={:?} on={:?} rider={:?}",
                entity.id,
                entity.kind(),
                entity.position,
                entity.visual,
                entity.claim,
                entity.queued_tile,
                entity.standing_on,
                entity.occupant
            );
        }
    }
}

/// Applies the provided command to the world, mutating state deterministically.
///
/// A contract violation halts the world: the failing call returns the error
/// and every later call returns [`WorldError::Halted`].
pub fn apply(
    world: &mut World,
    command: Command,
    out_events: &mut Vec<Event>,
) -> Result<(), WorldError> {
    if world.halted {
        return Err(WorldError::Halted);
    }

    let result = match command {
        Command::Tick { dt } => world.advance(dt, out_events).map_err(WorldError::from),
        Command::Press { action } => world.press(action, out_events).map_err(WorldError::from),
        Command::Release { action } => {
            world.release(action);
            Ok(())
        }
        Command::ReloadLevel => {
            info!("reloading level");
            world.materialize(out_events).map_err(WorldError::from)
        }
    };

    if let Err(failure) = &result {
        error!("halting simulation: {failure}");
        world.halted = true;
    }
    result
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use dynamite_core::{Direction, EntityId, EntityKind, MoveState, Occupant, Vec2, Vector};

    use super::{entity::Role, ContractViolation, SimulationConfig, Tile, TileMap, World};

    /// Read-only view of a single entity.
    #[derive(Clone, Debug, PartialEq)]
    pub struct EntitySnapshot {
        /// Identifier of the entity.
        pub id: EntityId,
        /// Variant of the entity.
        pub kind: EntityKind,
        /// Logical cell, if the entity is on the grid.
        pub position: Option<Vector>,
        /// Rendered position in grid units.
        pub visual: Vec2,
        /// Whether other entities may stand on it.
        pub is_platform: bool,
        /// Platform the entity rides on.
        pub standing_on: Option<EntityId>,
        /// Rider standing on the entity.
        pub rider: Option<EntityId>,
        /// Cell reserved by an in-flight move.
        pub claim: Option<Vector>,
        /// Cell whose wait queue holds the entity.
        pub queued_tile: Option<Vector>,
    }

    /// Identifier of the player spawned by the level.
    #[must_use]
    pub fn player(world: &World) -> EntityId {
        world.player
    }

    /// Movement state of the player.
    #[must_use]
    pub fn player_state(world: &World) -> Option<MoveState> {
        player_role(world).map(|player| player.state)
    }

    /// Direction the player faces.
    #[must_use]
    pub fn orientation(world: &World) -> Option<Direction> {
        player_role(world).map(|player| player.orientation)
    }

    /// Bombs in the player's inventory, oldest first.
    #[must_use]
    pub fn carried_bombs(world: &World) -> Vec<EntityId> {
        player_role(world)
            .map(|player| player.bombs.clone())
            .unwrap_or_default()
    }

    /// Snapshot of a single entity.
    #[must_use]
    pub fn entity(world: &World, id: EntityId) -> Option<EntitySnapshot> {
        world.entities.get(&id).map(|entity| EntitySnapshot {
            id: entity.id,
            kind: entity.kind(),
            position: entity.position,
            visual: entity.visual,
            is_platform: entity.is_platform,
            standing_on: entity.standing_on,
            rider: entity.occupant,
            claim: entity.claim,
            queued_tile: entity.queued_tile,
        })
    }

    /// Snapshots of every entity in identifier order.
    #[must_use]
    pub fn entities(world: &World) -> Vec<EntitySnapshot> {
        world
            .entities
            .keys()
            .filter_map(|id| entity(world, *id))
            .collect()
    }

    /// Logical cell of an entity.
    #[must_use]
    pub fn position(world: &World, id: EntityId) -> Option<Vector> {
        world.entities.get(&id).and_then(|entity| entity.position)
    }

    /// Rendered position of an entity in grid units.
    #[must_use]
    pub fn visual_position(world: &World, id: EntityId) -> Option<Vec2> {
        world.entities.get(&id).map(|entity| entity.visual)
    }

    /// Whether a bomb is currently floating on water.
    #[must_use]
    pub fn is_floating(world: &World, id: EntityId) -> bool {
        world
            .entities
            .get(&id)
            .is_some_and(|entity| matches!(&entity.role, Role::Bomb(bomb) if bomb.floating))
    }

    /// Owner recorded in the slot at `cell`.
    #[must_use]
    pub fn occupant(world: &World, cell: Vector) -> Option<Occupant> {
        world.grid.occupant(cell)
    }

    /// Entities waiting for `cell`, head first.
    #[must_use]
    pub fn waiting(world: &World, cell: Vector) -> Vec<EntityId> {
        world.grid.waiting(cell)
    }

    /// Tile at `cell` after spawn directives were consumed.
    #[must_use]
    pub fn tile(world: &World, cell: Vector) -> Option<Tile> {
        world.map.get(cell).copied()
    }

    /// Live tile map of the level.
    #[must_use]
    pub fn tile_map(world: &World) -> &TileMap {
        &world.map
    }

    /// Whether `id` could start a move onto `cell` right now.
    #[must_use]
    pub fn can_move_to(world: &World, id: EntityId, cell: Vector) -> bool {
        world.can_move_to(id, cell).unwrap_or(false)
    }

    /// Number of logic ticks since the level was (re)loaded.
    #[must_use]
    pub fn tick_index(world: &World) -> u64 {
        world.tick_index
    }

    /// Number of timers registered with the logic clock.
    #[must_use]
    pub fn active_timers(world: &World) -> usize {
        world.schedule.len()
    }

    /// Whether a contract violation halted the world.
    #[must_use]
    pub fn is_halted(world: &World) -> bool {
        world.halted
    }

    /// Configuration the world runs with.
    #[must_use]
    pub fn config(world: &World) -> &SimulationConfig {
        &world.config
    }

    /// Checks the occupancy, claim, queue and platform invariants.
    pub fn verify_invariants(world: &World) -> Result<(), ContractViolation> {
        for (cell, occupant) in world.grid.occupied() {
            let owner = world.entity(occupant.owner())?;
            let recorded = match occupant {
                Occupant::Entity(_) => owner.position,
                Occupant::Claim(_) => owner.claim,
            };
            if recorded != Some(cell) {
                return Err(ContractViolation::OccupancyMismatch {
                    entity: owner.id,
                    cell,
                    occupant: Some(occupant),
                    recorded,
                });
            }
        }

        for entity in world.entities.values() {
            if let (Some(cell), None) = (entity.position, entity.standing_on) {
                let occupant = world.grid.occupant(cell);
                let stranded = world.stranded.get(&cell) == Some(&entity.id);
                if occupant != Some(Occupant::Entity(entity.id)) && !stranded {
                    return Err(ContractViolation::OccupancyMismatch {
                        entity: entity.id,
                        cell,
                        occupant,
                        recorded: entity.position,
                    });
                }
            }
            if let Some(cell) = entity.claim {
                let occupant = world.grid.occupant(cell);
                if occupant != Some(Occupant::Claim(entity.id)) {
                    return Err(ContractViolation::OccupancyMismatch {
                        entity: entity.id,
                        cell,
                        occupant,
                        recorded: entity.claim,
                    });
                }
            }
            world.verify_relationships(entity.id)?;
        }

        for (cell, waiter) in world.grid.waiters() {
            let entity = world.entity(waiter)?;
            if entity.queued_tile != Some(cell) {
                return Err(ContractViolation::OccupancyMismatch {
                    entity: waiter,
                    cell,
                    occupant: world.grid.occupant(cell),
                    recorded: entity.queued_tile,
                });
            }
        }
        Ok(())
    }

    fn player_role(world: &World) -> Option<&crate::player::PlayerState> {
        match &world.entities.get(&world.player)?.role {
            Role::Player(player) => Some(player),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use dynamite_system_timing::TimingError;

    use super::*;

    fn load(legend: &str) -> World {
        let map = TileMap::from_legend(legend).expect("legend");
        World::load(map, SimulationConfig::default(), &mut Vec::new()).expect("load")
    }

    #[test]
    fn contract_violation_halts_the_world() {
        let mut world = load("S#");
        let ghost = EntityId::new(99);
        world
            .entity_mut(world.player)
            .expect("player")
            .standing_on = Some(ghost);

        let mut events = Vec::new();
        apply(&mut world, Command::Press { action: Action::Right }, &mut events).expect("press");
        let dt = world.config.logic_interval();
        let failure = (0..7)
            .map(|_| apply(&mut world, Command::Tick { dt }, &mut events))
            .find_map(Result::err);

        assert_eq!(
            failure,
            Some(WorldError::Contract(ContractViolation::UnknownEntity(ghost)))
        );
        assert!(query::is_halted(&world));
        assert_eq!(
            apply(&mut world, Command::ReloadLevel, &mut events),
            Err(WorldError::Halted)
        );
    }

    #[test]
    fn zero_logic_interval_is_rejected() {
        let map = TileMap::from_legend("S").expect("legend");
        let config = SimulationConfig {
            logic_interval_seconds: 0.0,
            ..SimulationConfig::default()
        };
        let result = World::load(map, config, &mut Vec::new());
        assert!(matches!(
            result,
            Err(LevelError::Timing(TimingError::ZeroInterval { .. }))
        ));
    }

    #[test]
    fn log_action_leaves_state_untouched() {
        let mut world = load("S#");
        let mut events = Vec::new();
        apply(&mut world, Command::Press { action: Action::Log }, &mut events).expect("log");
        assert!(events.is_empty());
        assert_eq!(query::player_state(&world), Some(dynamite_core::MoveState::Stationary));
    }
}
