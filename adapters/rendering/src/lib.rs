#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Shared rendering contracts for Dynamite adapters.
//!
//! The world never draws anything. It broadcasts visual [`Event`]s and a
//! [`Scene`] folds them into the set of visuals an adapter presents.

use std::{collections::BTreeMap, error::Error, fmt};

use anyhow::{bail, Result as AnyResult};
use dynamite_core::{EntityId, EntityKind, Event, Sprite};
use glam::Vec2;

/// Screen geometry of the tile grid.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TileGridPresentation {
    /// Number of tile columns.
    pub columns: u32,
    /// Number of tile rows.
    pub rows: u32,
    /// Horizontal screen size of one tile.
    pub tile_width: f32,
    /// Vertical screen size of one tile.
    pub tile_height: f32,
    /// Screen position of the upper-left tile.
    pub origin: Vec2,
}

impl TileGridPresentation {
    /// Tile width used by the default layout.
    pub const DEFAULT_TILE_WIDTH: f32 = 64.0;
    /// Tile height used by the default layout.
    pub const DEFAULT_TILE_HEIGHT: f32 = 40.0;
    /// Margin around the grid used by the default layout.
    pub const DEFAULT_MARGIN: f32 = 100.0;

    /// Creates a presentation with explicit tile sizes.
    pub fn new(
        columns: u32,
        rows: u32,
        tile_width: f32,
        tile_height: f32,
        origin: Vec2,
    ) -> Result<Self, RenderingError> {
        if !(tile_width > 0.0 && tile_height > 0.0) {
            return Err(RenderingError::InvalidTileSize {
                width: tile_width,
                height: tile_height,
            });
        }

        Ok(Self {
            columns,
            rows,
            tile_width,
            tile_height,
            origin,
        })
    }

    /// Creates the default layout for a grid of the provided dimensions.
    #[must_use]
    pub fn with_dimensions(columns: u32, rows: u32) -> Self {
        Self {
            columns,
            rows,
            tile_width: Self::DEFAULT_TILE_WIDTH,
            tile_height: Self::DEFAULT_TILE_HEIGHT,
            origin: Vec2::splat(Self::DEFAULT_MARGIN),
        }
    }

    /// Maps a position in grid units onto screen coordinates; y grows downward.
    #[must_use]
    pub fn map_to_screen(&self, position: Vec2) -> Vec2 {
        self.origin + position * Vec2::new(self.tile_width, self.tile_height)
    }

    /// Total screen width covered by the grid.
    #[must_use]
    pub fn width(&self) -> f32 {
        self.columns as f32 * self.tile_width
    }

    /// Total screen height covered by the grid.
    #[must_use]
    pub fn height(&self) -> f32 {
        self.rows as f32 * self.tile_height
    }
}

/// A visual tracked by the scene.
#[derive(Clone, Debug, PartialEq)]
pub struct Visual {
    /// Variant of the entity the visual represents.
    pub kind: EntityKind,
    /// Sprite currently displayed.
    pub sprite: Sprite,
    /// Own position in grid units.
    pub position: Vec2,
    /// Platform the visual is attached to, with the offset relative to it.
    pub parent: Option<(EntityId, Vec2)>,
}

/// An explosion effect still on screen.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ExplosionPresentation {
    /// Centre of the explosion in grid units.
    pub position: Vec2,
    /// Logic ticks the effect has been visible.
    pub age: u32,
}

/// Render-side model of the world, updated from world events only.
#[derive(Clone, Debug)]
pub struct Scene {
    /// Geometry of the tile grid.
    pub tile_grid: TileGridPresentation,
    visuals: BTreeMap<EntityId, Visual>,
    explosions: Vec<ExplosionPresentation>,
    explosion_lifetime: u32,
}

impl Scene {
    /// Logic ticks an explosion stays visible by default.
    pub const DEFAULT_EXPLOSION_LIFETIME: u32 = 20;

    /// Creates an empty scene.
    #[must_use]
    pub fn new(tile_grid: TileGridPresentation) -> Self {
        Self {
            tile_grid,
            visuals: BTreeMap::new(),
            explosions: Vec::new(),
            explosion_lifetime: Self::DEFAULT_EXPLOSION_LIFETIME,
        }
    }

    /// Folds one world event into the scene.
    ///
    /// Events that reference visuals the scene never created are rejected.
    pub fn apply(&mut self, event: &Event) -> AnyResult<()> {
        match event {
            Event::LevelLoaded { columns, rows, .. } => {
                self.tile_grid.columns = *columns;
                self.tile_grid.rows = *rows;
            }
            Event::TimeAdvanced { .. } => {
                let lifetime = self.explosion_lifetime;
                for explosion in &mut self.explosions {
                    explosion.age += 1;
                }
                self.explosions.retain(|explosion| explosion.age < lifetime);
            }
            Event::VisualCreated {
                entity,
                kind,
                position,
                sprite,
            } => {
                let _ = self.visuals.insert(
                    *entity,
                    Visual {
                        kind: *kind,
                        sprite: *sprite,
                        position: *position,
                        parent: None,
                    },
                );
            }
            Event::VisualMoved { entity, position } => {
                self.visual_mut(*entity)?.position = *position;
            }
            Event::AnimationPlayed { entity, sprite } => {
                self.visual_mut(*entity)?.sprite = *sprite;
            }
            Event::ChildAttached {
                parent,
                child,
                offset,
            } => {
                if !self.visuals.contains_key(parent) {
                    bail!("cannot attach {child} to unknown parent visual {parent}");
                }
                self.visual_mut(*child)?.parent = Some((*parent, *offset));
            }
            Event::ChildDetached { parent, child } => {
                let visual = self.visual_mut(*child)?;
                if matches!(visual.parent, Some((current, _)) if current == *parent) {
                    visual.parent = None;
                }
            }
            Event::VisualDeleted { entity } => {
                if self.visuals.remove(entity).is_none() {
                    bail!("cannot delete unknown visual {entity}");
                }
                for visual in self.visuals.values_mut() {
                    if matches!(visual.parent, Some((parent, _)) if parent == *entity) {
                        visual.parent = None;
                    }
                }
            }
            Event::ExplosionSpawned { position } => {
                self.explosions.push(ExplosionPresentation {
                    position: *position,
                    age: 0,
                });
            }
            Event::EntityDestroyed { entity } => {
                let _ = self.visuals.remove(entity);
            }
            Event::EntityMoved { .. }
            | Event::PlayerStateChanged { .. }
            | Event::BombPickedUp { .. }
            | Event::BombDropped { .. }
            | Event::BombDetonated { .. }
            | Event::EntityBlasted { .. } => {}
        }
        Ok(())
    }

    /// Forgets every visual; used before a level is materialised again.
    pub fn clear(&mut self) {
        self.visuals.clear();
        self.explosions.clear();
    }

    fn visual_mut(&mut self, entity: EntityId) -> AnyResult<&mut Visual> {
        match self.visuals.get_mut(&entity) {
            Some(visual) => Ok(visual),
            None => bail!("no visual exists for {entity}"),
        }
    }

    /// Visual of the provided entity.
    #[must_use]
    pub fn visual(&self, entity: EntityId) -> Option<&Visual> {
        self.visuals.get(&entity)
    }

    /// Every visual in entity order.
    pub fn visuals(&self) -> impl Iterator<Item = (EntityId, &Visual)> + '_ {
        self.visuals.iter().map(|(id, visual)| (*id, visual))
    }

    /// Explosions still on screen.
    #[must_use]
    pub fn explosions(&self) -> &[ExplosionPresentation] {
        &self.explosions
    }

    /// Screen position of a visual, following its parent while attached.
    #[must_use]
    pub fn screen_position(&self, entity: EntityId) -> Option<Vec2> {
        let visual = self.visuals.get(&entity)?;
        let position = match visual.parent.and_then(|(parent, offset)| {
            self.visuals.get(&parent).map(|platform| platform.position + offset)
        }) {
            Some(attached) => attached,
            None => visual.position,
        };
        Some(self.tile_grid.map_to_screen(position))
    }
}

/// Errors that can occur when constructing rendering descriptors.
#[derive(Debug, PartialEq)]
pub enum RenderingError {
    /// Tiles must cover a positive screen area.
    InvalidTileSize {
        /// Requested tile width.
        width: f32,
        /// Requested tile height.
        height: f32,
    },
}

impl fmt::Display for RenderingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidTileSize { width, height } => {
                write!(f, "tile size must be positive (received {width}x{height})")
            }
        }
    }
}

impl Error for RenderingError {}
