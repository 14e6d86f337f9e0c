//! Static per-coordinate tile metadata and the character legend that builds it.

use dynamite_core::{Direction, Navigability, Vector};
use thiserror::Error;

/// Ground a tile is made of.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Terrain {
    /// Solid ground the player walks on.
    Land,
    /// Water that only bombs may enter.
    Water,
}

/// Entity a tile materialises when the level loads.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Spawn {
    /// The player character.
    Player,
    /// A dam holding back the water.
    Blockage,
    /// A fir tree.
    Tree,
    /// A bomb dispenser.
    Dispenser,
}

/// Immutable metadata of a single grid coordinate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Tile {
    terrain: Terrain,
    navigability: Navigability,
    current: Vector,
    spawn: Option<Spawn>,
}

impl Tile {
    /// Land tile accessible to every category.
    #[must_use]
    pub const fn land() -> Self {
        Self {
            terrain: Terrain::Land,
            navigability: Navigability::ALL,
            current: Vector::ZERO,
            spawn: None,
        }
    }

    /// Still water, accessible to bombs only.
    #[must_use]
    pub const fn water() -> Self {
        Self {
            terrain: Terrain::Water,
            navigability: Navigability::BOMB,
            current: Vector::ZERO,
            spawn: None,
        }
    }

    /// Water flowing towards `direction`.
    #[must_use]
    pub const fn current(direction: Direction) -> Self {
        Self {
            current: direction.delta(),
            ..Self::water()
        }
    }

    /// Returns the tile carrying a spawn directive.
    #[must_use]
    pub const fn with_spawn(self, spawn: Spawn) -> Self {
        Self {
            spawn: Some(spawn),
            ..self
        }
    }

    /// Ground of the tile.
    #[must_use]
    pub const fn terrain(&self) -> Terrain {
        self.terrain
    }

    /// Categories allowed to occupy the tile.
    #[must_use]
    pub const fn navigability(&self) -> Navigability {
        self.navigability
    }

    /// Drift vector applied to floating bombs; zero on still tiles.
    #[must_use]
    pub const fn flow(&self) -> Vector {
        self.current
    }

    /// Spawn directive, if the level has not consumed it yet.
    #[must_use]
    pub const fn spawn(&self) -> Option<Spawn> {
        self.spawn
    }

    /// Reports whether the tile is water.
    #[must_use]
    pub const fn is_water(&self) -> bool {
        matches!(self.terrain, Terrain::Water)
    }

    pub(crate) const fn without_spawn(self) -> Self {
        Self {
            spawn: None,
            ..self
        }
    }

    fn from_legend(character: char) -> Option<Self> {
        let tile = match character {
            '.' => Self::water(),
            '^' => Self::current(Direction::North),
            'v' => Self::current(Direction::South),
            '<' => Self::current(Direction::West),
            '>' => Self::current(Direction::East),
            'X' => Self::water().with_spawn(Spawn::Blockage),
            '#' => Self::land(),
            'S' => Self::land().with_spawn(Spawn::Player),
            'T' => Self::land().with_spawn(Spawn::Tree),
            'D' => Self::land().with_spawn(Spawn::Dispenser),
            _ => return None,
        };
        Some(tile)
    }
}

/// Errors raised while building a [`TileMap`].
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum MapError {
    /// The legend contained no rows.
    #[error("map legend is empty")]
    Empty,
    /// A legend row differs in width from the first row.
    #[error("row {line} has {found} tiles, expected {expected}")]
    RaggedRow {
        /// One-based line of the offending row.
        line: usize,
        /// Width of the first row.
        expected: usize,
        /// Width of the offending row.
        found: usize,
    },
    /// The legend used a character with no meaning.
    #[error("unknown map character {character:?} at line {line}, column {column}")]
    UnknownLegend {
        /// Offending character.
        character: char,
        /// One-based line.
        line: usize,
        /// One-based column.
        column: usize,
    },
    /// The tile list does not match the requested dimensions.
    #[error("expected {expected} tiles, got {found}")]
    SizeMismatch {
        /// `columns * rows`.
        expected: usize,
        /// Number of tiles supplied.
        found: usize,
    },
}

/// Rectangular level layout stored in row-major order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TileMap {
    columns: u32,
    rows: u32,
    tiles: Vec<Tile>,
}

impl TileMap {
    /// Builds a map from row-major tiles.
    pub fn new(columns: u32, rows: u32, tiles: Vec<Tile>) -> Result<Self, MapError> {
        let expected = columns as usize * rows as usize;
        if expected == 0 {
            return Err(MapError::Empty);
        }
        if tiles.len() != expected {
            return Err(MapError::SizeMismatch {
                expected,
                found: tiles.len(),
            });
        }
        Ok(Self {
            columns,
            rows,
            tiles,
        })
    }

    /// Parses a character legend, one text line per row, first line is row zero.
    ///
    /// Blank lines and surrounding whitespace are ignored.
    pub fn from_legend(text: &str) -> Result<Self, MapError> {
        let mut width = None;
        let mut rows = 0u32;
        let mut tiles = Vec::new();

        for (index, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            let found = line.chars().count();
            let expected = *width.get_or_insert(found);
            if found != expected {
                return Err(MapError::RaggedRow {
                    line: index + 1,
                    expected,
                    found,
                });
            }
            for (column, character) in line.chars().enumerate() {
                let tile = Tile::from_legend(character).ok_or(MapError::UnknownLegend {
                    character,
                    line: index + 1,
                    column: column + 1,
                })?;
                tiles.push(tile);
            }
            rows += 1;
        }

        let columns = width.ok_or(MapError::Empty)?;
        let columns = u32::try_from(columns).map_err(|_| MapError::SizeMismatch {
            expected: u32::MAX as usize,
            found: columns,
        })?;
        Self::new(columns, rows, tiles)
    }

    /// Number of tile columns.
    #[must_use]
    pub const fn columns(&self) -> u32 {
        self.columns
    }

    /// Number of tile rows.
    #[must_use]
    pub const fn rows(&self) -> u32 {
        self.rows
    }

    /// Tile at `cell`, or `None` outside the map.
    #[must_use]
    pub fn get(&self, cell: Vector) -> Option<&Tile> {
        self.index(cell).and_then(|index| self.tiles.get(index))
    }

    /// Replaces the tile at `cell`. Returns `false` outside the map.
    pub fn set(&mut self, cell: Vector, tile: Tile) -> bool {
        match self.index(cell).and_then(|index| self.tiles.get_mut(index)) {
            Some(slot) => {
                *slot = tile;
                true
            }
            None => false,
        }
    }

    /// Iterates every coordinate with its tile in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = (Vector, &Tile)> + '_ {
        let columns = self.columns as usize;
        self.tiles.iter().enumerate().map(move |(index, tile)| {
            let cell = Vector::new((index % columns) as i32, (index / columns) as i32);
            (cell, tile)
        })
    }

    fn index(&self, cell: Vector) -> Option<usize> {
        let column = u32::try_from(cell.x()).ok()?;
        let row = u32::try_from(cell.y()).ok()?;
        if column < self.columns && row < self.rows {
            Some(row as usize * self.columns as usize + column as usize)
        } else {
            None
        }
    }
}
