//! Player movement state machine, interaction and bomb handling.

use dynamite_core::{
    Action, Direction, EntityId, EntityKind, Event, MoveState, Navigability, Occupant, Sprite,
    Vector,
};
use dynamite_system_timing::Easing;
use log::debug;

use crate::{
    bomb::BombState,
    entity::{behavior, Behavior, Role},
    ContractViolation, World,
};

/// State owned by the player entity.
#[derive(Clone, Debug)]
pub(crate) struct PlayerState {
    pub(crate) orientation: Direction,
    pub(crate) state: MoveState,
    heading: Option<Direction>,
    destination: Option<Vector>,
    queued: Option<Action>,
    pub(crate) bombs: Vec<EntityId>,
}

impl PlayerState {
    pub(crate) fn new(orientation: Direction) -> Self {
        Self {
            orientation,
            state: MoveState::Stationary,
            heading: None,
            destination: None,
            queued: None,
            bombs: Vec::new(),
        }
    }
}

pub(crate) struct PlayerBehavior;

impl Behavior for PlayerBehavior {
    fn animation_halfway(
        &self,
        world: &mut World,
        id: EntityId,
        out: &mut Vec<Event>,
    ) -> Result<(), ContractViolation> {
        world.commit_player_move(id, out)
    }

    fn animation_finished(
        &self,
        world: &mut World,
        id: EntityId,
        out: &mut Vec<Event>,
    ) -> Result<(), ContractViolation> {
        world.finish_player_move(id, out)
    }
}

impl World {
    fn player(&self, id: EntityId) -> Result<&PlayerState, ContractViolation> {
        match &self.entity(id)?.role {
            Role::Player(player) => Ok(player),
            _ => Err(ContractViolation::WrongRole {
                entity: id,
                expected: EntityKind::Player,
            }),
        }
    }

    fn player_mut(&mut self, id: EntityId) -> Result<&mut PlayerState, ContractViolation> {
        match &mut self.entity_mut(id)?.role {
            Role::Player(player) => Ok(player),
            _ => Err(ContractViolation::WrongRole {
                entity: id,
                expected: EntityKind::Player,
            }),
        }
    }

    fn set_move_state(
        &mut self,
        id: EntityId,
        state: MoveState,
        out: &mut Vec<Event>,
    ) -> Result<(), ContractViolation> {
        self.player_mut(id)?.state = state;
        out.push(Event::PlayerStateChanged { player: id, state });
        Ok(())
    }

    /// Routes an input action through the player's state machine.
    pub(crate) fn player_action(
        &mut self,
        id: EntityId,
        action: Action,
        out: &mut Vec<Event>,
    ) -> Result<(), ContractViolation> {
        if action == Action::Log {
            self.dump_state();
            return Ok(());
        }

        let (state, heading) = {
            let player = self.player(id)?;
            (player.state, player.heading)
        };
        match (state, action.direction()) {
            (MoveState::Stationary, Some(direction)) => self.player_step(id, direction, out),
            (MoveState::Stationary, None) => match action {
                Action::Interact => self.player_interact(id, out),
                Action::DropBomb => self.player_drop_bomb(id, out),
                _ => Ok(()),
            },
            (MoveState::MovingAbortable, Some(direction))
                if heading == Some(direction.opposite()) =>
            {
                self.abort_player_move(id, out)
            }
            (MoveState::MovingAbortable, Some(direction)) if heading == Some(direction) => Ok(()),
            (MoveState::MovingAbortable | MoveState::MovingCommitted, _) => {
                debug!("{id} queues {action:?} until it stops moving");
                self.player_mut(id)?.queued = Some(action);
                Ok(())
            }
        }
    }

    fn player_step(
        &mut self,
        id: EntityId,
        direction: Direction,
        out: &mut Vec<Event>,
    ) -> Result<(), ContractViolation> {
        if self.player(id)?.orientation != direction {
            self.player_mut(id)?.orientation = direction;
            out.push(Event::AnimationPlayed {
                entity: id,
                sprite: Sprite::player(direction),
            });
            return Ok(());
        }

        let Some(origin) = self.entity(id)?.position else {
            return Ok(());
        };
        let step = origin + direction.delta();
        if self.can_move_to(id, step)? {
            return self.begin_player_move(id, direction, step, false, out);
        }

        let open_water = self.map.get(step).is_some_and(|tile| tile.is_water())
            && self.grid.occupant(step).is_none();
        let leap = origin + direction.delta() * 2;
        if open_water && self.can_move_to(id, leap)? {
            return self.begin_player_move(id, direction, leap, true, out);
        }

        debug!("{id} cannot move {direction:?} from {origin}");
        Ok(())
    }

    /// Whether `id` may start moving onto `cell`.
    pub(crate) fn can_move_to(
        &self,
        id: EntityId,
        cell: Vector,
    ) -> Result<bool, ContractViolation> {
        let Some(tile) = self.map.get(cell) else {
            return Ok(false);
        };
        match self.grid.occupant(cell) {
            None => Ok(tile.navigability().allows(Navigability::PLAYER)),
            Some(Occupant::Entity(other)) => {
                let other = self.entity(other)?;
                Ok(other.id != id && other.is_platform && other.occupant.is_none())
            }
            Some(Occupant::Claim(_)) => Ok(false),
        }
    }

    /// Whether a move already underway may still complete onto `cell`.
    fn can_enter(&self, id: EntityId, cell: Vector) -> Result<bool, ContractViolation> {
        match self.grid.occupant(cell) {
            None => Ok(self
                .map
                .get(cell)
                .is_some_and(|tile| tile.navigability().allows(Navigability::PLAYER))),
            Some(Occupant::Claim(owner)) => Ok(owner == id),
            Some(Occupant::Entity(platform)) => self.can_mount(platform, id),
        }
    }

    fn begin_player_move(
        &mut self,
        id: EntityId,
        direction: Direction,
        destination: Vector,
        leap: bool,
        out: &mut Vec<Event>,
    ) -> Result<(), ContractViolation> {
        if self.grid.occupant(destination).is_none() {
            self.set_claim(id, Some(destination), out)?;
        }
        {
            let player = self.player_mut(id)?;
            player.heading = Some(direction);
            player.destination = Some(destination);
        }
        let interval = if leap {
            self.config.player_leap_logics
        } else {
            self.config.player_movement_logics
        };
        self.animate(id, destination, interval, Easing::Linear, true)?;
        debug!("{id} moving towards {destination} over {interval} ticks");
        self.set_move_state(id, MoveState::MovingAbortable, out)
    }

    fn commit_player_move(
        &mut self,
        id: EntityId,
        out: &mut Vec<Event>,
    ) -> Result<(), ContractViolation> {
        let Some(destination) = self.player(id)?.destination else {
            return Ok(());
        };
        if !self.can_enter(id, destination)? {
            debug!("{destination} is no longer free, {id} turns back");
            return self.abort_player_move(id, out);
        }
        self.assign_position(id, Some(destination), out)?;
        self.set_move_state(id, MoveState::MovingCommitted, out)
    }

    fn abort_player_move(
        &mut self,
        id: EntityId,
        out: &mut Vec<Event>,
    ) -> Result<(), ContractViolation> {
        self.cancel_animation(id)?;
        self.set_claim(id, None, out)?;
        {
            let player = self.player_mut(id)?;
            player.heading = None;
            player.destination = None;
        }
        let Some(home) = self.entity(id)?.position else {
            return self.set_move_state(id, MoveState::Stationary, out);
        };
        let interval = self.config.abort_logics();
        self.animate(id, home, interval, Easing::Linear, false)?;
        self.set_move_state(id, MoveState::MovingCommitted, out)
    }

    fn finish_player_move(
        &mut self,
        id: EntityId,
        out: &mut Vec<Event>,
    ) -> Result<(), ContractViolation> {
        let queued = {
            let player = self.player_mut(id)?;
            player.heading = None;
            player.destination = None;
            player.queued.take()
        };
        self.set_move_state(id, MoveState::Stationary, out)?;
        match queued.or(self.held) {
            Some(action) => self.player_action(id, action, out),
            None => Ok(()),
        }
    }

    fn faced_cell(&self, id: EntityId) -> Result<Option<Vector>, ContractViolation> {
        let orientation = self.player(id)?.orientation;
        Ok(self
            .entity(id)?
            .position
            .map(|position| position + orientation.delta()))
    }

    fn player_interact(
        &mut self,
        id: EntityId,
        out: &mut Vec<Event>,
    ) -> Result<(), ContractViolation> {
        let Some(cell) = self.faced_cell(id)? else {
            return Ok(());
        };
        match self.grid.occupant(cell) {
            Some(Occupant::Entity(target)) => {
                let kind = self.entity(target)?.kind();
                behavior(kind).interact(self, target, id, out)
            }
            _ => {
                debug!("nothing to interact with at {cell}");
                Ok(())
            }
        }
    }

    /// Adds a fresh bomb to the inventory of `player` unless it is full.
    pub(crate) fn hand_out_bomb(
        &mut self,
        player: EntityId,
        out: &mut Vec<Event>,
    ) -> Result<(), ContractViolation> {
        let carried = self.player(player)?.bombs.len();
        if carried >= self.config.max_bombs {
            debug!("{player} already carries {carried} bombs");
            return Ok(());
        }
        let bomb = self.create_entity(Role::Bomb(BombState::default()));
        let bombs = &mut self.player_mut(player)?.bombs;
        bombs.push(bomb);
        out.push(Event::BombPickedUp {
            bomb,
            carried: bombs.len(),
        });
        Ok(())
    }

    fn player_drop_bomb(
        &mut self,
        id: EntityId,
        out: &mut Vec<Event>,
    ) -> Result<(), ContractViolation> {
        let Some(&bomb) = self.player(id)?.bombs.last() else {
            debug!("{id} has no bomb to drop");
            return Ok(());
        };
        let Some(cell) = self.faced_cell(id)? else {
            return Ok(());
        };
        let placeable = self
            .map
            .get(cell)
            .is_some_and(|tile| tile.navigability().allows(Navigability::BOMB))
            && self.grid.occupant(cell).is_none();
        if !placeable {
            debug!("cannot drop a bomb at {cell}");
            return Ok(());
        }
        let _ = self.player_mut(id)?.bombs.pop();
        self.place_bomb(bomb, cell, out)
    }
}
