//! Timed bombs: fuse, flotation, drifting along currents and detonation.

use dynamite_core::{
    BlastPattern, EntityId, EntityKind, Event, Navigability, Occupant, Sprite, Vec2, Vector,
    BLAST_PATTERN_1,
};
use dynamite_system_timing::{Easing, Timer, TimerId};
use log::{debug, info};

use crate::{
    entity::{behavior, Behavior, Role},
    ContractViolation, TimerAction, World,
};

/// Height a bomb dropped into water falls from, in grid units.
const DROP_HEIGHT: f32 = 0.5;

/// Offset of a rider's visual relative to the bomb carrying it.
const RIDER_OFFSET: Vec2 = Vec2::new(0.0, -0.25);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Fuse {
    toggle: TimerId,
    detonate: TimerId,
    detonates_at: u64,
}

#[derive(Clone, Debug, Default)]
pub(crate) struct BombState {
    pub(crate) floating: bool,
    pub(crate) warning: bool,
    exploded: bool,
    /// Stalled at halfway until the destination frees up.
    waiting: bool,
    /// Queued without animating, holding the interval to move with once served.
    parked: Option<u32>,
    destination: Option<Vector>,
    fuse: Option<Fuse>,
}

pub(crate) struct BombBehavior;

impl Behavior for BombBehavior {
    fn stepped_on(
        &self,
        _world: &mut World,
        platform: EntityId,
        rider: EntityId,
        out: &mut Vec<Event>,
    ) -> Result<(), ContractViolation> {
        out.push(Event::ChildAttached {
            parent: platform,
            child: rider,
            offset: RIDER_OFFSET,
        });
        Ok(())
    }

    fn stepped_off(
        &self,
        _world: &mut World,
        platform: EntityId,
        rider: EntityId,
        out: &mut Vec<Event>,
    ) -> Result<(), ContractViolation> {
        out.push(Event::ChildDetached {
            parent: platform,
            child: rider,
        });
        Ok(())
    }

    fn tile_available(
        &self,
        world: &mut World,
        id: EntityId,
        cell: Vector,
        out: &mut Vec<Event>,
    ) -> Result<(), ContractViolation> {
        world.bomb_tile_available(id, cell, out)
    }

    fn blasted(
        &self,
        world: &mut World,
        id: EntityId,
        origin: Vector,
        strength: u32,
        out: &mut Vec<Event>,
    ) -> Result<(), ContractViolation> {
        world.release_rider(id, origin, strength, out)?;
        world.push_bomb(id, origin, out)
    }

    fn animation_halfway(
        &self,
        world: &mut World,
        id: EntityId,
        out: &mut Vec<Event>,
    ) -> Result<(), ContractViolation> {
        world.bomb_halfway(id, out)
    }

    fn animation_finished(
        &self,
        world: &mut World,
        id: EntityId,
        out: &mut Vec<Event>,
    ) -> Result<(), ContractViolation> {
        world.bomb_arrived(id, out)
    }
}

impl World {
    fn bomb(&self, id: EntityId) -> Result<&BombState, ContractViolation> {
        match &self.entity(id)?.role {
            Role::Bomb(bomb) => Ok(bomb),
            _ => Err(ContractViolation::WrongRole {
                entity: id,
                expected: EntityKind::TimedBomb,
            }),
        }
    }

    fn bomb_mut(&mut self, id: EntityId) -> Result<&mut BombState, ContractViolation> {
        match &mut self.entity_mut(id)?.role {
            Role::Bomb(bomb) => Ok(bomb),
            _ => Err(ContractViolation::WrongRole {
                entity: id,
                expected: EntityKind::TimedBomb,
            }),
        }
    }

    /// Puts a carried bomb on the grid and lights its fuse.
    pub(crate) fn place_bomb(
        &mut self,
        bomb: EntityId,
        cell: Vector,
        out: &mut Vec<Event>,
    ) -> Result<(), ContractViolation> {
        let floating = self.map.get(cell).is_some_and(|tile| tile.is_water());
        let start = if floating {
            cell.as_vec2() - Vec2::new(0.0, DROP_HEIGHT)
        } else {
            cell.as_vec2()
        };
        self.entity_mut(bomb)?.visual = start;
        self.assign_position(bomb, Some(cell), out)?;
        if floating {
            self.bomb_mut(bomb)?.floating = true;
            self.entity_mut(bomb)?.is_platform = true;
        }

        out.push(Event::VisualCreated {
            entity: bomb,
            kind: EntityKind::TimedBomb,
            position: start,
            sprite: Sprite::timed_bomb(floating, false),
        });
        out.push(Event::BombDropped { bomb, cell });
        self.light_fuse(bomb)?;

        if floating {
            self.animate(bomb, cell, self.config.land_logics, Easing::QuadIn, false)?;
        }
        Ok(())
    }

    fn light_fuse(&mut self, bomb: EntityId) -> Result<(), ContractViolation> {
        let toggle = self.schedule.start(
            Timer::periodic("warning", self.config.warning_toggle_logics)
                .on_end(TimerAction::ToggleWarning(bomb)),
        )?;
        let detonate = self.schedule.start(
            Timer::one_shot("fuse", self.config.timed_bomb_interval)
                .on_end(TimerAction::Detonate(bomb)),
        )?;
        let detonates_at = self.tick_index + u64::from(self.config.timed_bomb_interval);
        self.bomb_mut(bomb)?.fuse = Some(Fuse {
            toggle,
            detonate,
            detonates_at,
        });
        debug!("{bomb} fuse lit, detonates at tick {detonates_at}");
        Ok(())
    }

    /// Cancels the fuse timers of a bomb. No-op for other variants.
    pub(crate) fn douse_fuse(&mut self, id: EntityId) -> Result<(), ContractViolation> {
        let fuse = match &mut self.entity_mut(id)?.role {
            Role::Bomb(bomb) => bomb.fuse.take(),
            _ => None,
        };
        if let Some(fuse) = fuse {
            let _ = self.schedule.cancel(fuse.toggle);
            let _ = self.schedule.cancel(fuse.detonate);
        }
        Ok(())
    }

    pub(crate) fn toggle_warning(
        &mut self,
        bomb: EntityId,
        out: &mut Vec<Event>,
    ) -> Result<(), ContractViolation> {
        let tick_index = self.tick_index;
        let (sprite, fuse) = {
            let state = self.bomb_mut(bomb)?;
            state.warning = !state.warning;
            (Sprite::timed_bomb(state.floating, state.warning), state.fuse)
        };
        out.push(Event::AnimationPlayed {
            entity: bomb,
            sprite,
        });

        if let Some(fuse) = fuse {
            let remaining = fuse.detonates_at.saturating_sub(tick_index);
            if remaining <= u64::from(self.config.ticks_per_second()) {
                let hurried = (self.config.warning_toggle_logics / 2).max(1);
                self.schedule.set_interval(fuse.toggle, hurried)?;
            }
        }
        Ok(())
    }

    pub(crate) fn detonate(
        &mut self,
        bomb: EntityId,
        out: &mut Vec<Event>,
    ) -> Result<(), ContractViolation> {
        self.douse_fuse(bomb)?;
        self.interrupt_bomb_move(bomb, out)?;
        self.bomb_mut(bomb)?.exploded = true;

        let (cell, visual) = {
            let entity = self.entity(bomb)?;
            (entity.position, entity.visual)
        };
        let Some(cell) = cell else {
            return Ok(());
        };
        info!("{bomb} detonated at {cell}");
        out.push(Event::ExplosionSpawned { position: visual });
        out.push(Event::VisualDeleted { entity: bomb });
        out.push(Event::BombDetonated { bomb, cell });

        let _ = self.schedule.start(
            Timer::one_shot("debris", self.config.post_explosion_logics)
                .on_end(TimerAction::RemoveDebris(bomb)),
        )?;
        self.apply_blast(cell, BLAST_PATTERN_1, out)
    }

    pub(crate) fn remove_debris(
        &mut self,
        bomb: EntityId,
        out: &mut Vec<Event>,
    ) -> Result<(), ContractViolation> {
        self.destroy(bomb, out)
    }

    /// Notifies every distinct owner of the cells covered by `pattern`.
    fn apply_blast(
        &mut self,
        origin: Vector,
        pattern: BlastPattern,
        out: &mut Vec<Event>,
    ) -> Result<(), ContractViolation> {
        let mut targets: Vec<EntityId> = Vec::new();
        for cell in pattern.cells(origin) {
            if let Some(occupant) = self.grid.occupant(cell) {
                let owner = occupant.owner();
                if !targets.contains(&owner) {
                    targets.push(owner);
                }
            }
        }

        let strength = pattern.strength();
        for target in targets {
            let Some(kind) = self.entities.get(&target).map(|entity| entity.kind()) else {
                continue;
            };
            out.push(Event::EntityBlasted {
                entity: target,
                origin,
                strength,
            });
            behavior(kind).blasted(self, target, origin, strength, out)?;
        }
        Ok(())
    }

    /// Slides a blasted bomb away from the explosion.
    pub(crate) fn push_bomb(
        &mut self,
        bomb: EntityId,
        origin: Vector,
        out: &mut Vec<Event>,
    ) -> Result<(), ContractViolation> {
        if self.bomb(bomb)?.exploded {
            return Ok(());
        }
        let Some(position) = self.entity(bomb)?.position else {
            return Ok(());
        };
        let push = position - origin;
        if push.is_zero() {
            return Ok(());
        }
        self.interrupt_bomb_move(bomb, out)?;
        debug!("{bomb} pushed by {push}");
        self.start_bomb_move(bomb, push, self.config.push_speed_logics, out)
    }

    /// Starts moving one step along `delta`, claiming or queueing for the target.
    fn start_bomb_move(
        &mut self,
        bomb: EntityId,
        delta: Vector,
        interval: u32,
        out: &mut Vec<Event>,
    ) -> Result<(), ContractViolation> {
        let Some(origin) = self.entity(bomb)?.position else {
            return Ok(());
        };
        let destination = origin + delta;
        let enterable = self
            .map
            .get(destination)
            .is_some_and(|tile| tile.navigability().allows(Navigability::BOMB));
        if !enterable {
            debug!("{bomb} cannot move from {origin} to {destination}");
            return Ok(());
        }

        match self.grid.occupant(destination) {
            None => self.set_claim(bomb, Some(destination), out)?,
            Some(Occupant::Claim(owner)) if owner == bomb => {}
            Some(_) => {
                let deadlocked = self.closes_wait_cycle(bomb, destination)?;
                self.queue_for_tile(bomb, destination)?;
                if deadlocked {
                    debug!("{bomb} would wait on its own cell, holding at {origin}");
                    let state = self.bomb_mut(bomb)?;
                    state.destination = Some(destination);
                    state.parked = Some(interval);
                    return Ok(());
                }
            }
        }
        self.bomb_mut(bomb)?.destination = Some(destination);
        self.animate(bomb, destination, interval, Easing::Linear, true)
    }

    /// Whether following the queued cells of the owners from `cell` leads back to `bomb`.
    fn closes_wait_cycle(&self, bomb: EntityId, cell: Vector) -> Result<bool, ContractViolation> {
        let mut cell = cell;
        for _ in 0..self.entities.len() {
            let Some(occupant) = self.grid.occupant(cell) else {
                return Ok(false);
            };
            let owner = occupant.owner();
            if owner == bomb {
                return Ok(true);
            }
            match self.entity(owner)?.queued_tile {
                Some(next) => cell = next,
                None => return Ok(false),
            }
        }
        Ok(false)
    }

    fn interrupt_bomb_move(
        &mut self,
        bomb: EntityId,
        out: &mut Vec<Event>,
    ) -> Result<(), ContractViolation> {
        self.cancel_animation(bomb)?;
        self.leave_queue(bomb)?;
        self.set_claim(bomb, None, out)?;
        let state = self.bomb_mut(bomb)?;
        state.destination = None;
        state.waiting = false;
        state.parked = None;
        Ok(())
    }

    fn bomb_halfway(
        &mut self,
        bomb: EntityId,
        out: &mut Vec<Event>,
    ) -> Result<(), ContractViolation> {
        let Some(destination) = self.bomb(bomb)?.destination else {
            return Ok(());
        };
        if self.grid.occupant(destination) == Some(Occupant::Claim(bomb)) {
            return self.assign_position(bomb, Some(destination), out);
        }

        debug!("{bomb} stalls halfway to {destination}");
        let entity = self
            .entities
            .get_mut(&bomb)
            .ok_or(ContractViolation::UnknownEntity(bomb))?;
        entity.animator.pause(&mut self.schedule)?;
        self.bomb_mut(bomb)?.waiting = true;
        Ok(())
    }

    fn bomb_tile_available(
        &mut self,
        bomb: EntityId,
        cell: Vector,
        out: &mut Vec<Event>,
    ) -> Result<(), ContractViolation> {
        let (destination, waiting) = {
            let state = self.bomb(bomb)?;
            (state.destination, state.waiting)
        };
        if destination != Some(cell) {
            return Err(ContractViolation::UnexpectedTile {
                entity: bomb,
                cell,
                destination,
            });
        }
        self.set_claim(bomb, Some(cell), out)?;
        if let Some(interval) = self.bomb_mut(bomb)?.parked.take() {
            return self.animate(bomb, cell, interval, Easing::Linear, true);
        }
        if !waiting {
            return Ok(());
        }

        self.assign_position(bomb, Some(cell), out)?;
        self.bomb_mut(bomb)?.waiting = false;
        let entity = self
            .entities
            .get_mut(&bomb)
            .ok_or(ContractViolation::UnknownEntity(bomb))?;
        entity.animator.unpause(&mut self.schedule)?;
        Ok(())
    }

    fn bomb_arrived(
        &mut self,
        bomb: EntityId,
        out: &mut Vec<Event>,
    ) -> Result<(), ContractViolation> {
        let state = self.bomb_mut(bomb)?;
        state.destination = None;
        if state.exploded {
            return Ok(());
        }
        self.settle_bomb(bomb, out)
    }

    /// Floats or grounds the bomb by terrain, then keeps it drifting on a current.
    fn settle_bomb(
        &mut self,
        bomb: EntityId,
        out: &mut Vec<Event>,
    ) -> Result<(), ContractViolation> {
        let Some(cell) = self.entity(bomb)?.position else {
            return Ok(());
        };
        let Some(tile) = self.map.get(cell).copied() else {
            return Ok(());
        };

        let floating = self.bomb(bomb)?.floating;
        if tile.is_water() != floating {
            let carrying = self.entity(bomb)?.occupant.is_some();
            if tile.is_water() || !carrying {
                self.set_floating(bomb, tile.is_water(), out)?;
            }
        }

        if tile.is_water() && !tile.flow().is_zero() {
            let speed = self.config.water_speed_logics;
            self.start_bomb_move(bomb, tile.flow(), speed, out)?;
        }
        Ok(())
    }

    fn set_floating(
        &mut self,
        bomb: EntityId,
        floating: bool,
        out: &mut Vec<Event>,
    ) -> Result<(), ContractViolation> {
        let sprite = {
            let state = self.bomb_mut(bomb)?;
            state.floating = floating;
            Sprite::timed_bomb(floating, state.warning)
        };
        self.entity_mut(bomb)?.is_platform = floating;
        out.push(Event::AnimationPlayed {
            entity: bomb,
            sprite,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use dynamite_core::{Action, Command};

    use super::*;
    use crate::{apply, query, SimulationConfig, TileMap};

    fn load(legend: &str) -> World {
        let map = TileMap::from_legend(legend).expect("legend");
        World::load(map, SimulationConfig::default(), &mut Vec::new()).expect("load")
    }

    fn run(world: &mut World, command: Command) -> Vec<Event> {
        let mut events = Vec::new();
        apply(world, command, &mut events).expect("apply");
        events
    }

    fn ticks(world: &mut World, count: u32) -> Vec<Event> {
        let dt = query::config(world).logic_interval();
        (0..count)
            .flat_map(|_| run(world, Command::Tick { dt }))
            .collect()
    }

    fn tap(world: &mut World, action: Action) {
        let _ = run(world, Command::Press { action });
        let _ = run(world, Command::Release { action });
    }

    /// Picks up a bomb from the dispenser west of the player and drops it east.
    fn drop_east(world: &mut World) -> EntityId {
        tap(world, Action::Left);
        tap(world, Action::Interact);
        tap(world, Action::Right);
        let bomb = *query::carried_bombs(world).last().expect("bomb in inventory");
        tap(world, Action::DropBomb);
        bomb
    }

    #[test]
    fn bomb_on_land_detonates_once_and_leaves_debris() {
        let mut world = load("DS##");
        let bomb = drop_east(&mut world);
        assert_eq!(query::position(&world, bomb), Some(Vector::new(2, 0)));
        assert!(!query::is_floating(&world, bomb));

        let events = ticks(&mut world, 240);
        assert_eq!(
            events
                .iter()
                .filter(|event| matches!(event, Event::BombDetonated { .. }))
                .count(),
            1
        );
        assert_eq!(query::occupant(&world, Vector::new(2, 0)), Some(Occupant::Entity(bomb)));

        let _ = ticks(&mut world, 20);
        assert!(query::entity(&world, bomb).is_none());
        assert_eq!(query::occupant(&world, Vector::new(2, 0)), None);
        assert_eq!(query::active_timers(&world), 0);
    }

    #[test]
    fn bomb_dropped_in_still_water_floats_as_platform() {
        let mut world = load("DS.");
        let bomb = drop_east(&mut world);

        assert_eq!(query::position(&world, bomb), Some(Vector::new(2, 0)));
        assert!(query::is_floating(&world, bomb));
        let snapshot = query::entity(&world, bomb).expect("bomb");
        assert!(snapshot.is_platform);
        assert_eq!(snapshot.visual, Vec2::new(2.0, -0.5));

        let _ = ticks(&mut world, 10);
        assert_eq!(query::visual_position(&world, bomb), Some(Vec2::new(2.0, 0.0)));
        assert_eq!(query::position(&world, bomb), Some(Vector::new(2, 0)));
        query::verify_invariants(&world).expect("invariants");
    }

    fn patient_world(legend: &str) -> World {
        let config = SimulationConfig {
            timed_bomb_interval: 10_000,
            ..SimulationConfig::default()
        };
        let map = TileMap::from_legend(legend).expect("legend");
        World::load(map, config, &mut Vec::new()).expect("load")
    }

    fn place(world: &mut World, cell: Vector) -> EntityId {
        let bomb = world.create_entity(Role::Bomb(BombState::default()));
        world.place_bomb(bomb, cell, &mut Vec::new()).expect("place");
        bomb
    }

    #[test]
    fn explosion_pushes_neighbouring_bomb_away() {
        let mut world = load("S####");
        let first = place(&mut world, Vector::new(2, 0));
        let _ = ticks(&mut world, 100);
        let second = place(&mut world, Vector::new(3, 0));

        let events = ticks(&mut world, 140);
        assert!(events.contains(&Event::EntityBlasted {
            entity: second,
            origin: Vector::new(2, 0),
            strength: 2
        }));
        assert_eq!(query::occupant(&world, Vector::new(4, 0)), Some(Occupant::Claim(second)));

        let _ = ticks(&mut world, 10);
        assert_eq!(query::position(&world, second), Some(Vector::new(4, 0)));
        assert_eq!(query::visual_position(&world, second), Some(Vec2::new(4.0, 0.0)));
        assert_eq!(query::occupant(&world, Vector::new(3, 0)), None);
        assert_eq!(query::occupant(&world, Vector::new(2, 0)), Some(Occupant::Entity(first)));
        query::verify_invariants(&world).expect("invariants");
    }

    #[test]
    fn pushed_bomb_waits_for_an_occupied_cell_then_arrives() {
        let mut world = patient_world("S#####");
        let first = place(&mut world, Vector::new(2, 0));
        let pushed = place(&mut world, Vector::new(3, 0));
        let blocker = place(&mut world, Vector::new(4, 0));

        world.detonate(first, &mut Vec::new()).expect("detonate");
        assert_eq!(query::waiting(&world, Vector::new(4, 0)), vec![pushed]);

        let _ = ticks(&mut world, 8);
        assert_eq!(query::position(&world, pushed), Some(Vector::new(3, 0)));
        let stalled = query::visual_position(&world, pushed).expect("visual");
        assert!(stalled.x > 3.0 && stalled.x < 4.0, "{stalled:?}");
        let _ = ticks(&mut world, 8);
        assert_eq!(query::visual_position(&world, pushed), Some(stalled));
        query::verify_invariants(&world).expect("invariants while waiting");

        world.destroy(blocker, &mut Vec::new()).expect("destroy blocker");
        assert_eq!(query::position(&world, pushed), Some(Vector::new(4, 0)));
        assert!(query::waiting(&world, Vector::new(4, 0)).is_empty());

        let _ = ticks(&mut world, 5);
        assert_eq!(query::visual_position(&world, pushed), Some(Vec2::new(4.0, 0.0)));
        assert_eq!(query::occupant(&world, Vector::new(3, 0)), None);
        assert_eq!(query::occupant(&world, Vector::new(4, 0)), Some(Occupant::Entity(pushed)));
        query::verify_invariants(&world).expect("invariants");
    }

    #[test]
    fn bombs_on_opposing_currents_do_not_wait_on_each_other_forever() {
        let mut world = patient_world("><\nS#");
        let east = place(&mut world, Vector::new(0, 0));
        let west = place(&mut world, Vector::new(1, 0));

        let _ = ticks(&mut world, 100);
        assert_eq!(query::waiting(&world, Vector::new(1, 0)), vec![east]);
        assert_eq!(query::waiting(&world, Vector::new(0, 0)), vec![west]);
        assert_eq!(query::visual_position(&world, west), Some(Vec2::new(1.0, 0.0)));
        assert_eq!(query::position(&world, east), Some(Vector::new(0, 0)));
        assert_eq!(query::position(&world, west), Some(Vector::new(1, 0)));
        query::verify_invariants(&world).expect("invariants while blocked");

        world.destroy(east, &mut Vec::new()).expect("destroy");
        assert_eq!(query::occupant(&world, Vector::new(0, 0)), Some(Occupant::Claim(west)));

        let _ = ticks(&mut world, 30);
        assert_eq!(query::position(&world, west), Some(Vector::new(0, 0)));
        assert_eq!(query::occupant(&world, Vector::new(1, 0)), None);
        query::verify_invariants(&world).expect("invariants");
    }

    #[test]
    fn drifting_raft_carries_its_rider() {
        let mut world = patient_world("S>.#");
        let player = query::player(&world);
        let raft = place(&mut world, Vector::new(1, 0));
        tap(&mut world, Action::Right);

        let _ = ticks(&mut world, 15);
        assert_eq!(query::position(&world, player), Some(Vector::new(1, 0)));
        assert_eq!(query::entity(&world, raft).and_then(|raft| raft.rider), Some(player));

        let events = ticks(&mut world, 25);
        assert!(events.contains(&Event::EntityMoved {
            entity: player,
            from: Some(Vector::new(1, 0)),
            to: Some(Vector::new(2, 0))
        }));
        assert_eq!(query::position(&world, raft), Some(Vector::new(2, 0)));
        assert_eq!(query::position(&world, player), Some(Vector::new(2, 0)));
        query::verify_invariants(&world).expect("invariants while riding");

        let _ = ticks(&mut world, 30);
        tap(&mut world, Action::Right);
        let events = ticks(&mut world, 15);
        assert!(events.contains(&Event::ChildDetached {
            parent: raft,
            child: player
        }));
        assert_eq!(query::position(&world, player), Some(Vector::new(3, 0)));
        assert_eq!(query::entity(&world, raft).and_then(|raft| raft.rider), None);
        query::verify_invariants(&world).expect("invariants after leaving");
    }
}
