//! Entity arena records and the per-variant behaviour table.

use dynamite_core::{EntityId, EntityKind, Event, Sprite, Vec2, Vector};
use dynamite_system_timing::Animator;
use log::debug;

use crate::{
    bomb::{BombBehavior, BombState},
    player::{PlayerBehavior, PlayerState},
    ContractViolation, World,
};

/// Variant-specific state of an entity.
#[derive(Clone, Debug)]
pub(crate) enum Role {
    Player(PlayerState),
    Bomb(BombState),
    Dam,
    Scenery,
    Dispenser,
}

/// A game object living in the world arena.
///
/// Links to other entities are arena identifiers, never owning handles.
/// `standing_on` and `occupant` always mirror each other.
#[derive(Clone, Debug)]
pub(crate) struct Entity {
    pub(crate) id: EntityId,
    pub(crate) position: Option<Vector>,
    pub(crate) visual: Vec2,
    pub(crate) is_platform: bool,
    pub(crate) standing_on: Option<EntityId>,
    pub(crate) occupant: Option<EntityId>,
    pub(crate) claim: Option<Vector>,
    pub(crate) queued_tile: Option<Vector>,
    pub(crate) animator: Animator,
    pub(crate) role: Role,
}

impl Entity {
    pub(crate) fn new(id: EntityId, role: Role) -> Self {
        Self {
            id,
            position: None,
            visual: Vec2::ZERO,
            is_platform: false,
            standing_on: None,
            occupant: None,
            claim: None,
            queued_tile: None,
            animator: Animator::new(),
            role,
        }
    }

    pub(crate) fn kind(&self) -> EntityKind {
        match self.role {
            Role::Player(_) => EntityKind::Player,
            Role::Bomb(_) => EntityKind::TimedBomb,
            Role::Dam => EntityKind::Dam,
            Role::Scenery => EntityKind::Scenery,
            Role::Dispenser => EntityKind::Dispenser,
        }
    }

    pub(crate) fn sprite(&self) -> Sprite {
        match &self.role {
            Role::Player(player) => Sprite::player(player.orientation),
            Role::Bomb(bomb) => Sprite::timed_bomb(bomb.floating, bomb.warning),
            Role::Dam => Sprite::Dam,
            Role::Scenery => Sprite::FirTree,
            Role::Dispenser => Sprite::Dispenser,
        }
    }
}

/// Capability interface every entity variant implements.
///
/// Hooks default to no-ops; a variant overrides only what it reacts to.
pub(crate) trait Behavior {
    /// `rider` mounted the platform `platform`.
    fn stepped_on(
        &self,
        _world: &mut World,
        _platform: EntityId,
        _rider: EntityId,
        _out: &mut Vec<Event>,
    ) -> Result<(), ContractViolation> {
        Ok(())
    }

    /// `rider` left the platform `platform`.
    fn stepped_off(
        &self,
        _world: &mut World,
        _platform: EntityId,
        _rider: EntityId,
        _out: &mut Vec<Event>,
    ) -> Result<(), ContractViolation> {
        Ok(())
    }

    /// The head of `cell`'s wait queue is offered the cell.
    fn tile_available(
        &self,
        _world: &mut World,
        _id: EntityId,
        _cell: Vector,
        _out: &mut Vec<Event>,
    ) -> Result<(), ContractViolation> {
        Ok(())
    }

    fn blasted(
        &self,
        world: &mut World,
        id: EntityId,
        origin: Vector,
        strength: u32,
        out: &mut Vec<Event>,
    ) -> Result<(), ContractViolation> {
        world.release_rider(id, origin, strength, out)
    }

    /// The platform carrying `id` was destroyed or blown away.
    fn platform_gone(
        &self,
        world: &mut World,
        id: EntityId,
        _out: &mut Vec<Event>,
    ) -> Result<(), ContractViolation> {
        world.strand(id)
    }

    fn interact(
        &self,
        _world: &mut World,
        _id: EntityId,
        _actor: EntityId,
        _out: &mut Vec<Event>,
    ) -> Result<(), ContractViolation> {
        Ok(())
    }

    fn animation_halfway(
        &self,
        _world: &mut World,
        _id: EntityId,
        _out: &mut Vec<Event>,
    ) -> Result<(), ContractViolation> {
        Ok(())
    }

    fn animation_finished(
        &self,
        _world: &mut World,
        _id: EntityId,
        _out: &mut Vec<Event>,
    ) -> Result<(), ContractViolation> {
        Ok(())
    }
}

/// Resolves the behaviour object of a variant.
pub(crate) fn behavior(kind: EntityKind) -> &'static dyn Behavior {
    match kind {
        EntityKind::Player => &PlayerBehavior,
        EntityKind::TimedBomb => &BombBehavior,
        EntityKind::Dam => &DamBehavior,
        EntityKind::Scenery => &SceneryBehavior,
        EntityKind::Dispenser => &DispenserBehavior,
    }
}

struct DamBehavior;

impl Behavior for DamBehavior {
    fn blasted(
        &self,
        world: &mut World,
        id: EntityId,
        origin: Vector,
        strength: u32,
        out: &mut Vec<Event>,
    ) -> Result<(), ContractViolation> {
        world.release_rider(id, origin, strength, out)?;
        debug!("dam {id} blown up by explosion at {origin}");
        out.push(Event::VisualDeleted { entity: id });
        world.destroy(id, out)
    }
}

struct SceneryBehavior;

impl Behavior for SceneryBehavior {}

struct DispenserBehavior;

impl Behavior for DispenserBehavior {
    fn interact(
        &self,
        world: &mut World,
        _id: EntityId,
        actor: EntityId,
        out: &mut Vec<Event>,
    ) -> Result<(), ContractViolation> {
        world.hand_out_bomb(actor, out)
    }
}
