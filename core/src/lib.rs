#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Dynamite simulation.
//!
//! This crate defines the message surface that connects adapters, the
//! authoritative world, and pure systems. Adapters submit [`Command`] values
//! describing input and elapsed time, the world executes those commands via
//! its `apply` entry point, and then broadcasts [`Event`] values that render
//! sinks and observers react to. Grid coordinates are [`Vector`] values,
//! visual positions are [`Vec2`] values expressed in grid units.

use std::{
    fmt,
    ops::{Add, BitOr, Mul, Neg, Sub},
    time::Duration,
};

pub use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Integer 2D coordinate used both as a grid cell and as a delta.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Vector {
    x: i32,
    y: i32,
}

impl Vector {
    /// The zero vector.
    pub const ZERO: Vector = Vector::new(0, 0);

    /// Creates a new vector from its components.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Horizontal component; grows to the right.
    #[must_use]
    pub const fn x(&self) -> i32 {
        self.x
    }

    /// Vertical component; grows downwards.
    #[must_use]
    pub const fn y(&self) -> i32 {
        self.y
    }

    /// Reports whether both components are zero.
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.x == 0 && self.y == 0
    }

    /// Multiplies both components by the provided factor.
    #[must_use]
    pub const fn scale(self, factor: i32) -> Self {
        Self::new(self.x * factor, self.y * factor)
    }

    /// Sum of the absolute components.
    #[must_use]
    pub fn manhattan_length(self) -> u32 {
        self.x.unsigned_abs() + self.y.unsigned_abs()
    }

    /// Converts the coordinate into a visual position expressed in grid units.
    #[must_use]
    pub fn as_vec2(self) -> Vec2 {
        Vec2::new(self.x as f32, self.y as f32)
    }
}

impl Add for Vector {
    type Output = Vector;

    fn add(self, rhs: Vector) -> Vector {
        Vector::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vector {
    type Output = Vector;

    fn sub(self, rhs: Vector) -> Vector {
        Vector::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Neg for Vector {
    type Output = Vector;

    fn neg(self) -> Vector {
        Vector::new(-self.x, -self.y)
    }
}

impl Mul<i32> for Vector {
    type Output = Vector;

    fn mul(self, rhs: i32) -> Vector {
        self.scale(rhs)
    }
}

impl fmt::Display for Vector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Cardinal directions an entity may face or travel in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Direction {
    /// Towards decreasing row indices.
    North,
    /// Towards increasing column indices.
    East,
    /// Towards increasing row indices.
    South,
    /// Towards decreasing column indices.
    West,
}

impl Direction {
    /// All directions in clockwise order starting at north.
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];

    /// Unit grid delta for a single step in this direction.
    #[must_use]
    pub const fn delta(self) -> Vector {
        match self {
            Self::North => Vector::new(0, -1),
            Self::East => Vector::new(1, 0),
            Self::South => Vector::new(0, 1),
            Self::West => Vector::new(-1, 0),
        }
    }

    /// Direction pointing the other way.
    #[must_use]
    pub const fn opposite(self) -> Direction {
        match self {
            Self::North => Self::South,
            Self::East => Self::West,
            Self::South => Self::North,
            Self::West => Self::East,
        }
    }
}

/// Abstract commands raw key presses are mapped onto.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Action {
    /// Face or walk north.
    Up,
    /// Face or walk south.
    Down,
    /// Face or walk west.
    Left,
    /// Face or walk east.
    Right,
    /// Interact with the entity in the faced cell.
    Interact,
    /// Drop the most recently collected bomb onto the faced cell.
    DropBomb,
    /// Dump the simulation state to the log.
    Log,
}

impl Action {
    /// Direction associated with a movement action.
    #[must_use]
    pub const fn direction(self) -> Option<Direction> {
        match self {
            Self::Up => Some(Direction::North),
            Self::Down => Some(Direction::South),
            Self::Left => Some(Direction::West),
            Self::Right => Some(Direction::East),
            Self::Interact | Self::DropBomb | Self::Log => None,
        }
    }

    /// Movement action that travels in the provided direction.
    #[must_use]
    pub const fn from_direction(direction: Direction) -> Self {
        match direction {
            Direction::North => Self::Up,
            Direction::East => Self::Right,
            Direction::South => Self::Down,
            Direction::West => Self::Left,
        }
    }
}

/// Movement state of the player.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MoveState {
    /// Standing still and accepting new moves.
    Stationary,
    /// Travelling towards a destination; an opposite key still aborts the step.
    MovingAbortable,
    /// Past the commit point (or returning from an abort); the step will complete.
    MovingCommitted,
}

/// Unique identifier assigned to an entity placed on (or carried around) the grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(u32);

impl EntityId {
    /// Creates a new entity identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Variants of entities the simulation knows about.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    /// The player character, the active key handler.
    Player,
    /// A bomb with a fuse that detonates a fixed number of ticks after placement.
    TimedBomb,
    /// A water blockage that holds back drifting bombs until blown up.
    Dam,
    /// Inert decoration that blocks its cell.
    Scenery,
    /// Hands out bombs to the player on interaction.
    Dispenser,
}

/// Logical owner recorded in an occupancy slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Occupant {
    /// The entity itself stands in the cell.
    Entity(EntityId),
    /// The entity reserved the cell while animating towards it.
    Claim(EntityId),
}

impl Occupant {
    /// Entity that logically owns the slot.
    #[must_use]
    pub const fn owner(self) -> EntityId {
        match self {
            Self::Entity(id) | Self::Claim(id) => id,
        }
    }
}

/// Bitmask of entity categories allowed to occupy a tile.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Navigability(u8);

impl Navigability {
    /// Nothing may stand here.
    pub const NONE: Navigability = Navigability(0);
    /// The player may stand here.
    pub const PLAYER: Navigability = Navigability(0b01);
    /// Bombs may rest or float here.
    pub const BOMB: Navigability = Navigability(0b10);
    /// Every category may stand here.
    pub const ALL: Navigability = Navigability(0b11);

    /// Reports whether every bit of `category` is set.
    #[must_use]
    pub const fn allows(self, category: Navigability) -> bool {
        self.0 & category.0 == category.0
    }
}

impl BitOr for Navigability {
    type Output = Navigability;

    fn bitor(self, rhs: Navigability) -> Navigability {
        Navigability(self.0 | rhs.0)
    }
}

/// Fixed set of offsets, relative to a detonating bomb, that an explosion reaches.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlastPattern {
    offsets: &'static [Vector],
    strength: u32,
}

/// Cross-shaped pattern reaching the bomb's own cell and its four neighbours.
pub const BLAST_PATTERN_1: BlastPattern = BlastPattern::new(
    &[
        Vector::new(0, 0),
        Vector::new(-1, 0),
        Vector::new(1, 0),
        Vector::new(0, -1),
        Vector::new(0, 1),
    ],
    2,
);

impl BlastPattern {
    /// Creates a pattern from offsets sharing one uniform strength.
    #[must_use]
    pub const fn new(offsets: &'static [Vector], strength: u32) -> Self {
        Self { offsets, strength }
    }

    /// Offsets relative to the detonation origin.
    #[must_use]
    pub const fn offsets(&self) -> &'static [Vector] {
        self.offsets
    }

    /// Strength applied uniformly to every reached cell.
    #[must_use]
    pub const fn strength(&self) -> u32 {
        self.strength
    }

    /// Cells reached when the pattern is centred on `origin`.
    pub fn cells(&self, origin: Vector) -> impl Iterator<Item = Vector> + '_ {
        self.offsets.iter().map(move |offset| origin + *offset)
    }
}

/// Sprite variants the render sink is asked to display.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sprite {
    /// Player facing north.
    PlayerUp,
    /// Player facing south.
    PlayerDown,
    /// Player facing west.
    PlayerLeft,
    /// Player facing east.
    PlayerRight,
    /// Timed bomb resting on land.
    TimedBomb,
    /// Timed bomb resting on land, warning frame.
    TimedBombRed,
    /// Timed bomb floating on water.
    TimedBombFloat,
    /// Timed bomb floating on water, warning frame.
    TimedBombFloatRed,
    /// Explosion effect.
    Explosion,
    /// Tree scenery.
    FirTree,
    /// Water blockage.
    Dam,
    /// Bomb dispenser.
    Dispenser,
}

impl Sprite {
    /// Sprite showing the player facing `direction`.
    #[must_use]
    pub const fn player(direction: Direction) -> Self {
        match direction {
            Direction::North => Self::PlayerUp,
            Direction::East => Self::PlayerRight,
            Direction::South => Self::PlayerDown,
            Direction::West => Self::PlayerLeft,
        }
    }

    /// Sprite for a timed bomb in the provided visual state.
    #[must_use]
    pub const fn timed_bomb(floating: bool, warning: bool) -> Self {
        match (floating, warning) {
            (false, false) => Self::TimedBomb,
            (false, true) => Self::TimedBombRed,
            (true, false) => Self::TimedBombFloat,
            (true, true) => Self::TimedBombFloatRed,
        }
    }

    /// Asset name used by render sinks.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::PlayerUp => "pc-up",
            Self::PlayerDown => "pc-down",
            Self::PlayerLeft => "pc-left",
            Self::PlayerRight => "pc-right",
            Self::TimedBomb => "timed-bomb",
            Self::TimedBombRed => "timed-bomb-red",
            Self::TimedBombFloat => "timed-bomb-float",
            Self::TimedBombFloatRed => "timed-bomb-float-red",
            Self::Explosion => "explosion",
            Self::FirTree => "fir-tree",
            Self::Dam => "dam",
            Self::Dispenser => "dispenser",
        }
    }
}

/// Commands that express all permissible world mutations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    /// Advances the logic clock by the provided wall-clock delta.
    Tick {
        /// Wall-clock time that elapsed since the previous tick.
        dt: Duration,
    },
    /// A key mapped to `action` went down, or its typematic repeat fired.
    Press {
        /// Abstract action requested by the key.
        action: Action,
    },
    /// A key mapped to `action` was released.
    Release {
        /// Abstract action whose key went up.
        action: Action,
    },
    /// Tears the level down and materialises it again from the static map.
    ReloadLevel,
}

/// Events broadcast by the world after processing commands.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// The level finished materialising its spawn directives.
    LevelLoaded {
        /// Number of tile columns in the level.
        columns: u32,
        /// Number of tile rows in the level.
        rows: u32,
        /// Identifier of the spawned player.
        player: EntityId,
    },
    /// One logic tick elapsed.
    TimeAdvanced {
        /// Number of logic ticks elapsed since the level was loaded.
        tick: u64,
    },
    /// A visual should be created for the entity.
    VisualCreated {
        /// Entity the visual represents.
        entity: EntityId,
        /// Variant of the entity.
        kind: EntityKind,
        /// Initial position in grid units.
        position: Vec2,
        /// Initial sprite.
        sprite: Sprite,
    },
    /// The entity's visual moved.
    VisualMoved {
        /// Entity whose visual moved.
        entity: EntityId,
        /// New position in grid units.
        position: Vec2,
    },
    /// The entity's visual switched sprite or animation.
    AnimationPlayed {
        /// Entity whose visual changed.
        entity: EntityId,
        /// Sprite now displayed.
        sprite: Sprite,
    },
    /// A rider's visual was attached to its platform.
    ChildAttached {
        /// Platform carrying the rider.
        parent: EntityId,
        /// Rider standing on the platform.
        child: EntityId,
        /// Offset of the rider relative to the platform, in grid units.
        offset: Vec2,
    },
    /// A rider's visual was detached from its platform.
    ChildDetached {
        /// Platform that carried the rider.
        parent: EntityId,
        /// Rider that stepped off.
        child: EntityId,
    },
    /// The entity's visual should be removed.
    VisualDeleted {
        /// Entity whose visual is gone.
        entity: EntityId,
    },
    /// An explosion effect should play at the position.
    ExplosionSpawned {
        /// Centre of the explosion in grid units.
        position: Vec2,
    },
    /// The entity's logical grid position changed.
    EntityMoved {
        /// Entity that moved.
        entity: EntityId,
        /// Previous cell, if the entity was on the grid.
        from: Option<Vector>,
        /// New cell, if the entity remains on the grid.
        to: Option<Vector>,
    },
    /// The player's movement state machine transitioned.
    PlayerStateChanged {
        /// Player whose state changed.
        player: EntityId,
        /// State entered.
        state: MoveState,
    },
    /// The player collected a bomb from a dispenser.
    BombPickedUp {
        /// Bomb added to the inventory.
        bomb: EntityId,
        /// Number of bombs carried after the pickup.
        carried: usize,
    },
    /// The player placed a bomb on the grid.
    BombDropped {
        /// Bomb that was placed.
        bomb: EntityId,
        /// Cell the bomb was placed on.
        cell: Vector,
    },
    /// A bomb's fuse ran out.
    BombDetonated {
        /// Bomb that exploded.
        bomb: EntityId,
        /// Cell the explosion originated from.
        cell: Vector,
    },
    /// An entity was reached by an explosion.
    EntityBlasted {
        /// Entity that was blasted.
        entity: EntityId,
        /// Cell the explosion originated from.
        origin: Vector,
        /// Strength of the blast pattern.
        strength: u32,
    },
    /// An entity was removed from the simulation.
    EntityDestroyed {
        /// Entity that no longer exists.
        entity: EntityId,
    },
}
