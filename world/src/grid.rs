use std::collections::VecDeque;

use dynamite_core::{EntityId, Occupant, Vector};

#[derive(Clone, Debug, Default)]
struct Slot {
    occupant: Option<Occupant>,
    waiting: VecDeque<EntityId>,
}

/// Dense per-cell ownership record with a FIFO of entities waiting for each cell.
#[derive(Clone, Debug)]
pub(crate) struct OccupancyGrid {
    columns: u32,
    rows: u32,
    cells: Vec<Slot>,
}

impl OccupancyGrid {
    pub(crate) fn new(columns: u32, rows: u32) -> Self {
        let capacity_u64 = u64::from(columns) * u64::from(rows);
        let capacity = usize::try_from(capacity_u64).unwrap_or(0);
        Self {
            columns,
            rows,
            cells: vec![Slot::default(); capacity],
        }
    }

    pub(crate) fn occupant(&self, cell: Vector) -> Option<Occupant> {
        self.slot(cell).and_then(|slot| slot.occupant)
    }

    /// Overwrites the slot. Returns `false` for cells outside the grid.
    pub(crate) fn set_occupant(&mut self, cell: Vector, occupant: Option<Occupant>) -> bool {
        match self.slot_mut(cell) {
            Some(slot) => {
                slot.occupant = occupant;
                true
            }
            None => false,
        }
    }

    pub(crate) fn enqueue(&mut self, cell: Vector, id: EntityId) -> bool {
        match self.slot_mut(cell) {
            Some(slot) => {
                slot.waiting.push_back(id);
                true
            }
            None => false,
        }
    }

    pub(crate) fn pop_waiter(&mut self, cell: Vector) -> Option<EntityId> {
        self.slot_mut(cell)?.waiting.pop_front()
    }

    pub(crate) fn remove_waiter(&mut self, cell: Vector, id: EntityId) -> bool {
        let Some(slot) = self.slot_mut(cell) else {
            return false;
        };
        let before = slot.waiting.len();
        slot.waiting.retain(|waiting| *waiting != id);
        slot.waiting.len() != before
    }

    pub(crate) fn waiting(&self, cell: Vector) -> Vec<EntityId> {
        self.slot(cell)
            .map(|slot| slot.waiting.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Every owned slot in row-major order.
    pub(crate) fn occupied(&self) -> impl Iterator<Item = (Vector, Occupant)> + '_ {
        self.cells
            .iter()
            .enumerate()
            .filter_map(move |(index, slot)| {
                slot.occupant.map(|occupant| (self.cell(index), occupant))
            })
    }

    /// Every queued entity with the cell it waits for, row-major then FIFO.
    pub(crate) fn waiters(&self) -> impl Iterator<Item = (Vector, EntityId)> + '_ {
        self.cells.iter().enumerate().flat_map(move |(index, slot)| {
            slot.waiting.iter().map(move |id| (self.cell(index), *id))
        })
    }

    pub(crate) fn dimensions(&self) -> (u32, u32) {
        (self.columns, self.rows)
    }

    fn slot(&self, cell: Vector) -> Option<&Slot> {
        self.index(cell).and_then(|index| self.cells.get(index))
    }

    fn slot_mut(&mut self, cell: Vector) -> Option<&mut Slot> {
        self.index(cell).and_then(|index| self.cells.get_mut(index))
    }

    fn cell(&self, index: usize) -> Vector {
        let width = self.columns.max(1) as usize;
        Vector::new((index % width) as i32, (index / width) as i32)
    }

    fn index(&self, cell: Vector) -> Option<usize> {
        let column = u32::try_from(cell.x()).ok()?;
        let row = u32::try_from(cell.y()).ok()?;
        if column < self.columns && row < self.rows {
            let width = usize::try_from(self.columns).ok()?;
            Some(usize::try_from(row).ok()? * width + usize::try_from(column).ok()?)
        } else {
            None
        }
    }
}
