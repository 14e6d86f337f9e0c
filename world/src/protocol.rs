//! Position assignment, claims, wait queues and platform relationships.
//!
//! Every mutation of the occupancy grid goes through this module so that a
//! slot, the entity it names and any platform link always agree.

use dynamite_core::{EntityId, Event, Occupant, Vector};
use dynamite_system_timing::{AnimationHooks, Easing};
use log::debug;

use crate::{entity::behavior, ContractViolation, TimerAction, World};

impl World {
    /// Moves `id` to `new`, or takes it off the grid when `new` is `None`.
    ///
    /// Vacating a slot re-seats a stranded rider or serves the slot's wait
    /// queue only after the mover (and anything riding it) is installed.
    pub(crate) fn assign_position(
        &mut self,
        id: EntityId,
        new: Option<Vector>,
        out_events: &mut Vec<Event>,
    ) -> Result<(), ContractViolation> {
        let (old, standing_on, rider) = {
            let entity = self.entity(id)?;
            (entity.position, entity.standing_on, entity.occupant)
        };
        if let Some(cell) = new {
            if old == new && self.grid.occupant(cell) == Some(Occupant::Entity(id)) {
                return Ok(());
            }
        }
        if new.is_none() {
            if let Some(rider) = rider {
                return Err(ContractViolation::RiderAbandoned { platform: id, rider });
            }
        }

        let mut departed = None;
        if let Some(cell) = old {
            if self.stranded.get(&cell) == Some(&id) {
                let _ = self.stranded.remove(&cell);
            }
            if self.grid.occupant(cell) == Some(Occupant::Entity(id)) {
                let _ = self.grid.set_occupant(cell, None);
                departed = Some(cell);
            } else if let Some(platform) = standing_on {
                if new.is_none() || self.entity(platform)?.position != new {
                    self.step_off(id, platform, out_events)?;
                }
            }
        }

        self.entity_mut(id)?.position = new;
        if let Some(cell) = new {
            self.occupy(id, cell, out_events)?;
        }
        if old != new {
            out_events.push(Event::EntityMoved {
                entity: id,
                from: old,
                to: new,
            });
        }

        if let Some(rider) = rider {
            if old != new {
                self.assign_position(rider, new, out_events)?;
            }
        }

        if let Some(cell) = departed {
            self.reseat_or_serve(cell, out_events)?;
        }
        self.verify_relationships(id)
    }

    fn occupy(
        &mut self,
        id: EntityId,
        cell: Vector,
        out_events: &mut Vec<Event>,
    ) -> Result<(), ContractViolation> {
        match self.grid.occupant(cell) {
            None => self.install(id, cell),
            Some(Occupant::Claim(owner)) if owner == id => {
                self.entity_mut(id)?.claim = None;
                self.install(id, cell)
            }
            Some(Occupant::Entity(platform)) if self.can_mount(platform, id)? => {
                self.mount(id, platform, out_events)
            }
            Some(occupant) => Err(ContractViolation::OccupiedTile {
                entity: id,
                cell,
                occupant,
            }),
        }
    }

    fn install(&mut self, id: EntityId, cell: Vector) -> Result<(), ContractViolation> {
        if self.grid.set_occupant(cell, Some(Occupant::Entity(id))) {
            Ok(())
        } else {
            Err(ContractViolation::OutsideGrid { entity: id, cell })
        }
    }

    /// Whether `rider` may stand on `platform`.
    pub(crate) fn can_mount(
        &self,
        platform: EntityId,
        rider: EntityId,
    ) -> Result<bool, ContractViolation> {
        if platform == rider {
            return Ok(false);
        }
        let platform = self.entity(platform)?;
        Ok(platform.is_platform && platform.occupant.map_or(true, |current| current == rider))
    }

    fn mount(
        &mut self,
        rider: EntityId,
        platform: EntityId,
        out_events: &mut Vec<Event>,
    ) -> Result<(), ContractViolation> {
        let rider_entity = self.entity_mut(rider)?;
        let already = rider_entity.standing_on == Some(platform);
        rider_entity.standing_on = Some(platform);
        let platform_entity = self.entity_mut(platform)?;
        platform_entity.occupant = Some(rider);
        let kind = platform_entity.kind();
        if already {
            return Ok(());
        }
        debug!("{rider} stepped onto platform {platform}");
        behavior(kind).stepped_on(self, platform, rider, out_events)
    }

    fn step_off(
        &mut self,
        rider: EntityId,
        platform: EntityId,
        out_events: &mut Vec<Event>,
    ) -> Result<(), ContractViolation> {
        self.entity_mut(rider)?.standing_on = None;
        let platform_entity = self.entity_mut(platform)?;
        if platform_entity.occupant != Some(rider) {
            return Err(ContractViolation::AsymmetricRelationship { rider, platform });
        }
        platform_entity.occupant = None;
        let kind = platform_entity.kind();
        debug!("{rider} stepped off platform {platform}");
        behavior(kind).stepped_off(self, platform, rider, out_events)
    }

    /// Detaches the rider of `platform` and tells it the platform is gone.
    pub(crate) fn detach_rider(
        &mut self,
        platform: EntityId,
        out_events: &mut Vec<Event>,
    ) -> Result<(), ContractViolation> {
        let Some(rider) = self.entity(platform)?.occupant else {
            return Ok(());
        };
        self.step_off(rider, platform, out_events)?;
        let kind = self.entity(rider)?.kind();
        behavior(kind).platform_gone(self, rider, out_events)
    }

    /// Passes an explosion on to the rider of `platform`, then detaches it.
    pub(crate) fn release_rider(
        &mut self,
        platform: EntityId,
        origin: Vector,
        strength: u32,
        out_events: &mut Vec<Event>,
    ) -> Result<(), ContractViolation> {
        let Some(rider) = self.entity(platform)?.occupant else {
            return Ok(());
        };
        out_events.push(Event::EntityBlasted {
            entity: rider,
            origin,
            strength,
        });
        let kind = self.entity(rider)?.kind();
        behavior(kind).blasted(self, rider, origin, strength, out_events)?;
        self.detach_rider(platform, out_events)
    }

    /// Leaves a detached rider at its coordinate until the slot frees up.
    pub(crate) fn strand(&mut self, id: EntityId) -> Result<(), ContractViolation> {
        let Some(cell) = self.entity(id)?.position else {
            return Ok(());
        };
        match self.grid.occupant(cell) {
            Some(Occupant::Entity(owner)) if owner == id => Ok(()),
            None => self.install(id, cell),
            Some(_) => {
                debug!("{id} stranded at {cell}");
                let _ = self.stranded.insert(cell, id);
                Ok(())
            }
        }
    }

    fn reseat_or_serve(
        &mut self,
        cell: Vector,
        out_events: &mut Vec<Event>,
    ) -> Result<(), ContractViolation> {
        if let Some(rider) = self.stranded.remove(&cell) {
            let entity = self.entity(rider)?;
            if entity.position == Some(cell) && entity.standing_on.is_none() {
                debug!("re-seating stranded {rider} at {cell}");
                return self.install(rider, cell);
            }
        }
        self.serve_queue(cell, out_events)
    }

    fn serve_queue(
        &mut self,
        cell: Vector,
        out_events: &mut Vec<Event>,
    ) -> Result<(), ContractViolation> {
        if self.grid.occupant(cell).is_some() {
            return Ok(());
        }
        let Some(waiter) = self.grid.pop_waiter(cell) else {
            return Ok(());
        };
        let entity = self.entity_mut(waiter)?;
        entity.queued_tile = None;
        let kind = entity.kind();
        debug!("offering {cell} to queue head {waiter}");
        behavior(kind).tile_available(self, waiter, cell, out_events)?;

        match self.grid.occupant(cell) {
            Some(occupant) if occupant.owner() == waiter => Ok(()),
            occupant => Err(ContractViolation::QueueHeadNotServed {
                cell,
                waiter,
                occupant,
            }),
        }
    }

    /// Moves the claim of `id` to `new`, releasing the previous one.
    pub(crate) fn set_claim(
        &mut self,
        id: EntityId,
        new: Option<Vector>,
        out_events: &mut Vec<Event>,
    ) -> Result<(), ContractViolation> {
        let old = self.entity(id)?.claim;
        if old == new {
            return Ok(());
        }

        let mut departed = None;
        if let Some(cell) = old {
            if self.grid.occupant(cell) == Some(Occupant::Claim(id)) {
                let _ = self.grid.set_occupant(cell, None);
                departed = Some(cell);
            }
        }
        self.entity_mut(id)?.claim = None;

        if let Some(cell) = new {
            if let Some(occupant) = self.grid.occupant(cell) {
                return Err(ContractViolation::ClaimConflict {
                    entity: id,
                    cell,
                    occupant,
                });
            }
            if !self.grid.set_occupant(cell, Some(Occupant::Claim(id))) {
                return Err(ContractViolation::OutsideGrid { entity: id, cell });
            }
            self.entity_mut(id)?.claim = Some(cell);
        }

        if let Some(cell) = departed {
            self.reseat_or_serve(cell, out_events)?;
        }
        Ok(())
    }

    /// Appends `id` to the wait queue of `cell`.
    pub(crate) fn queue_for_tile(
        &mut self,
        id: EntityId,
        cell: Vector,
    ) -> Result<(), ContractViolation> {
        if let Some(queued) = self.entity(id)?.queued_tile {
            return Err(ContractViolation::AlreadyQueued {
                entity: id,
                queued,
                cell,
            });
        }
        if !self.grid.enqueue(cell, id) {
            return Err(ContractViolation::OutsideGrid { entity: id, cell });
        }
        debug!("{id} waits for {cell}");
        self.entity_mut(id)?.queued_tile = Some(cell);
        Ok(())
    }

    /// Removes `id` from the queue it waits in, if any.
    pub(crate) fn leave_queue(&mut self, id: EntityId) -> Result<(), ContractViolation> {
        if let Some(cell) = self.entity_mut(id)?.queued_tile.take() {
            let _ = self.grid.remove_waiter(cell, id);
        }
        Ok(())
    }

    /// Checks that `id` and its platform or rider point at each other.
    pub(crate) fn verify_relationships(&self, id: EntityId) -> Result<(), ContractViolation> {
        let entity = self.entity(id)?;
        if let Some(platform) = entity.standing_on {
            if self.entity(platform)?.occupant != Some(id) {
                return Err(ContractViolation::AsymmetricRelationship { rider: id, platform });
            }
        }
        if let Some(rider) = entity.occupant {
            if self.entity(rider)?.standing_on != Some(id) {
                return Err(ContractViolation::AsymmetricRelationship { rider, platform: id });
            }
        }
        Ok(())
    }

    /// Starts an animation whose hooks report back to `id`.
    pub(crate) fn animate(
        &mut self,
        id: EntityId,
        to: Vector,
        interval: u32,
        easing: Easing,
        halfway: bool,
    ) -> Result<(), ContractViolation> {
        let hooks = AnimationHooks {
            tick: Some(TimerAction::AnimationTick(id)),
            halfway: halfway.then_some(TimerAction::AnimationHalfway(id)),
            finished: Some(TimerAction::AnimationFinished(id)),
        };
        let entity = self
            .entities
            .get_mut(&id)
            .ok_or(ContractViolation::UnknownEntity(id))?;
        let from = entity.visual;
        entity
            .animator
            .animate(&mut self.schedule, from, to.as_vec2(), interval, easing, hooks)?;
        Ok(())
    }

    pub(crate) fn cancel_animation(&mut self, id: EntityId) -> Result<(), ContractViolation> {
        let entity = self
            .entities
            .get_mut(&id)
            .ok_or(ContractViolation::UnknownEntity(id))?;
        entity.animator.cancel(&mut self.schedule);
        Ok(())
    }

    /// Takes `id` off the grid and out of the arena.
    pub(crate) fn destroy(
        &mut self,
        id: EntityId,
        out_events: &mut Vec<Event>,
    ) -> Result<(), ContractViolation> {
        self.detach_rider(id, out_events)?;
        self.cancel_animation(id)?;
        self.douse_fuse(id)?;
        self.leave_queue(id)?;
        self.set_claim(id, None, out_events)?;
        self.assign_position(id, None, out_events)?;
        let _ = self.entities.remove(&id);
        debug!("{id} destroyed");
        out_events.push(Event::EntityDestroyed { entity: id });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use dynamite_core::{Command, EntityKind};

    use super::*;
    use crate::{apply, bomb::BombState, entity::Role, query, SimulationConfig, TileMap};

    fn load(legend: &str) -> World {
        let config = SimulationConfig {
            timed_bomb_interval: 10_000,
            ..SimulationConfig::default()
        };
        let map = TileMap::from_legend(legend).expect("legend");
        World::load(map, config, &mut Vec::new()).expect("load")
    }

    fn ticks(world: &mut World, count: u32) {
        let dt = query::config(world).logic_interval();
        for _ in 0..count {
            apply(world, Command::Tick { dt }, &mut Vec::new()).expect("tick");
        }
    }

    fn place(world: &mut World, cell: Vector) -> EntityId {
        let bomb = world.create_entity(Role::Bomb(BombState::default()));
        world.place_bomb(bomb, cell, &mut Vec::new()).expect("place");
        bomb
    }

    fn dam(world: &World) -> EntityId {
        query::entities(world)
            .into_iter()
            .find(|entity| entity.kind == EntityKind::Dam)
            .map(|entity| entity.id)
            .expect("dam")
    }

    #[test]
    fn freed_cell_goes_to_the_first_waiter() {
        let mut world = load("S##\n>X<");
        let dam_cell = Vector::new(1, 1);
        let first = place(&mut world, Vector::new(0, 1));
        let second = place(&mut world, Vector::new(2, 1));

        ticks(&mut world, 40);
        assert_eq!(query::waiting(&world, dam_cell), vec![first, second]);
        assert_eq!(query::position(&world, first), Some(Vector::new(0, 1)));

        let dam = dam(&world);
        world.destroy(dam, &mut Vec::new()).expect("destroy dam");

        assert_eq!(query::occupant(&world, dam_cell), Some(Occupant::Entity(first)));
        assert_eq!(query::waiting(&world, dam_cell), vec![second]);
        assert_eq!(query::occupant(&world, Vector::new(0, 1)), None);
        query::verify_invariants(&world).expect("invariants");

        ticks(&mut world, 40);
        assert_eq!(query::visual_position(&world, first), Some(dam_cell.as_vec2()));
        assert_eq!(query::waiting(&world, dam_cell), vec![second]);
    }

    #[test]
    fn claiming_an_occupied_cell_is_a_contract_violation() {
        let mut world = load("S#");
        let player = query::player(&world);
        let bomb = world.create_entity(Role::Bomb(BombState::default()));

        let result = world.set_claim(bomb, Some(Vector::new(0, 0)), &mut Vec::new());
        assert_eq!(
            result,
            Err(ContractViolation::ClaimConflict {
                entity: bomb,
                cell: Vector::new(0, 0),
                occupant: Occupant::Entity(player),
            })
        );
    }

    #[test]
    fn queueing_twice_is_rejected() {
        let mut world = load("S##");
        let bomb = world.create_entity(Role::Bomb(BombState::default()));
        world.queue_for_tile(bomb, Vector::new(0, 0)).expect("first queue");

        assert_eq!(
            world.queue_for_tile(bomb, Vector::new(1, 0)),
            Err(ContractViolation::AlreadyQueued {
                entity: bomb,
                queued: Vector::new(0, 0),
                cell: Vector::new(1, 0),
            })
        );
        world.leave_queue(bomb).expect("leave");
        assert!(query::waiting(&world, Vector::new(0, 0)).is_empty());
    }

    #[test]
    fn stranded_rider_is_reseated_before_the_queue() {
        let mut world = load("S.#");
        let player = query::player(&world);
        let raft = place(&mut world, Vector::new(1, 0));
        let mut events = Vec::new();
        apply(&mut world, Command::Press { action: dynamite_core::Action::Right }, &mut events)
            .expect("press");
        apply(&mut world, Command::Release { action: dynamite_core::Action::Right }, &mut events)
            .expect("release");
        ticks(&mut world, 15);
        assert_eq!(query::entity(&world, player).and_then(|e| e.standing_on), Some(raft));

        let waiter = world.create_entity(Role::Bomb(BombState::default()));
        world.queue_for_tile(waiter, Vector::new(1, 0)).expect("queue");

        let mut events = Vec::new();
        world.detach_rider(raft, &mut events).expect("detach");
        assert!(events.contains(&Event::ChildDetached {
            parent: raft,
            child: player
        }));
        query::verify_invariants(&world).expect("stranded rider is consistent");

        world.destroy(raft, &mut events).expect("destroy raft");
        assert_eq!(query::occupant(&world, Vector::new(1, 0)), Some(Occupant::Entity(player)));
        assert_eq!(query::waiting(&world, Vector::new(1, 0)), vec![waiter]);
        query::verify_invariants(&world).expect("invariants");
    }
}
