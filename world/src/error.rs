//! Error taxonomy of the simulation.
//!
//! Contract violations mean an invariant of the occupancy protocol broke and
//! the world can no longer be trusted; they halt the simulation. Blocked
//! moves and similar expected outcomes are not errors at all.

use dynamite_core::{EntityId, EntityKind, Occupant, Vector};
use dynamite_system_timing::TimingError;
use thiserror::Error;

use crate::map::MapError;

/// Broken invariants detected while mutating the world.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ContractViolation {
    /// An identifier referenced an entity that no longer exists.
    #[error("entity {0} does not exist")]
    UnknownEntity(EntityId),
    /// An entity was asked to behave as a variant it is not.
    #[error("entity {entity} is not a {expected:?}")]
    WrongRole {
        /// Entity that was addressed.
        entity: EntityId,
        /// Variant the caller expected.
        expected: EntityKind,
    },
    /// An entity moved onto a cell held by someone else.
    #[error("entity {entity} cannot enter {cell}: occupied by {occupant:?}")]
    OccupiedTile {
        /// Entity that tried to move.
        entity: EntityId,
        /// Destination cell.
        cell: Vector,
        /// Current owner of the cell.
        occupant: Occupant,
    },
    /// An entity tried to reserve a cell that is not empty.
    #[error("entity {entity} cannot claim {cell}: occupied by {occupant:?}")]
    ClaimConflict {
        /// Entity that tried to claim.
        entity: EntityId,
        /// Cell it tried to reserve.
        cell: Vector,
        /// Current owner of the cell.
        occupant: Occupant,
    },
    /// An entity queued for a second cell without leaving the first queue.
    #[error("entity {entity} is already queued for {queued} and cannot queue for {cell}")]
    AlreadyQueued {
        /// Entity that tried to queue.
        entity: EntityId,
        /// Cell it is already waiting for.
        queued: Vector,
        /// Cell it asked to wait for.
        cell: Vector,
    },
    /// An entity referenced a cell outside the level bounds.
    #[error("entity {entity} referenced {cell}, which lies outside the grid")]
    OutsideGrid {
        /// Entity that referenced the cell.
        entity: EntityId,
        /// Offending cell.
        cell: Vector,
    },
    /// The head of a wait queue did not take the cell it was offered.
    #[error("queue head {waiter} was notified for {cell} but the slot holds {occupant:?}")]
    QueueHeadNotServed {
        /// Cell that became available.
        cell: Vector,
        /// Entity that was notified.
        waiter: EntityId,
        /// Owner of the slot after the notification.
        occupant: Option<Occupant>,
    },
    /// An entity was offered a cell it was not heading for.
    #[error("entity {entity} was offered {cell} but is heading for {destination:?}")]
    UnexpectedTile {
        /// Entity that was notified.
        entity: EntityId,
        /// Cell offered by the queue.
        cell: Vector,
        /// Cell the entity is animating towards.
        destination: Option<Vector>,
    },
    /// A rider and its platform disagree about their relationship.
    #[error("rider {rider} and platform {platform} disagree about standing on each other")]
    AsymmetricRelationship {
        /// Entity claiming to stand on the platform, or recorded as its rider.
        rider: EntityId,
        /// Platform involved.
        platform: EntityId,
    },
    /// A platform tried to leave the grid while still carrying a rider.
    #[error("platform {platform} left the grid while carrying {rider}")]
    RiderAbandoned {
        /// Platform that left.
        platform: EntityId,
        /// Rider it still carried.
        rider: EntityId,
    },
    /// An occupancy slot and the entity it names disagree.
    #[error("entity {entity} records {recorded:?} but slot {cell} holds {occupant:?}")]
    OccupancyMismatch {
        /// Entity involved.
        entity: EntityId,
        /// Cell inspected.
        cell: Vector,
        /// Owner recorded in the slot.
        occupant: Option<Occupant>,
        /// Position or claim recorded on the entity.
        recorded: Option<Vector>,
    },
    /// A timer or animator contract was broken.
    #[error(transparent)]
    Timing(#[from] TimingError),
}

/// Errors raised while loading a level.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LevelError {
    /// The static map contains no player spawn point.
    #[error("level defines no player spawn point")]
    MissingSpawnPoint,
    /// The static map could not be built.
    #[error(transparent)]
    Map(#[from] MapError),
    /// The configured logic clock is unusable.
    #[error("invalid logic clock: {0}")]
    Timing(#[from] TimingError),
    /// Materialising the spawn directives broke the occupancy protocol.
    #[error("spawning the level failed: {0}")]
    Contract(#[from] ContractViolation),
}

/// Errors returned by [`crate::apply`].
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum WorldError {
    /// An invariant broke while processing the command.
    #[error("contract violation: {0}")]
    Contract(#[from] ContractViolation),
    /// Reloading the level failed.
    #[error(transparent)]
    Level(#[from] LevelError),
    /// An earlier contract violation halted the simulation.
    #[error("simulation halted after an earlier contract violation")]
    Halted,
}
