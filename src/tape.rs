//! A single physical tape: cells plus a head position.

use serde::Serialize;
use std::fmt;

use crate::cell::{Cell, Movement, Symbol};

/// A physical tape that extends to the right on demand.
///
/// The head never moves left of cell 0, and the tape always keeps at least one cell after
/// the head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tape {
    cells: Vec<Cell>,
    head: usize,
}

impl Default for Tape {
    fn default() -> Self {
        Self::new()
    }
}

impl Tape {
    /// Creates a blank tape.
    pub fn new() -> Self {
        Self {
            cells: vec![Cell::EMPTY],
            head: 0,
        }
    }

    /// Creates a tape holding `input` followed by one empty cell, head on the first cell.
    pub fn with_input(input: impl IntoIterator<Item = Cell>) -> Self {
        let mut tape = Self::new();
        tape.load(input);
        tape
    }

    pub fn load(&mut self, input: impl IntoIterator<Item = Cell>) {
        self.cells = input.into_iter().collect();
        self.cells.push(Cell::EMPTY);
        self.head = 0;
    }

    pub fn read(&self) -> &Cell {
        &self.cells[self.head]
    }

    pub fn write(&mut self, cell: Cell) {
        self.cells[self.head] = cell;
    }

    /// Moves the head, clamping at cell 0 and padding the right end with empty cells.
    pub fn apply_move(&mut self, movement: Movement) {
        let target = self.head as isize + movement.offset();
        self.head = target.max(0) as usize;
        while self.cells.len() <= self.head + 1 {
            self.cells.push(Cell::EMPTY);
        }
    }

    pub fn head(&self) -> usize {
        self.head
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn snapshot(&self) -> TapeSnapshot {
        TapeSnapshot {
            cells: self.cells.clone(),
            head: self.head,
        }
    }

    /// Overwrites the whole tape, e.g. to go back a step in the history.
    pub fn restore(&mut self, snapshot: &TapeSnapshot) {
        self.cells = snapshot.cells.clone();
        if self.cells.is_empty() {
            self.cells.push(Cell::EMPTY);
        }
        self.head = snapshot.head.min(self.cells.len() - 1);
    }
}

/// The content and head position of one tape at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TapeSnapshot {
    pub cells: Vec<Cell>,
    pub head: usize,
}

impl TapeSnapshot {
    /// The cells up to the last non-empty one.
    pub fn trimmed(&self) -> &[Cell] {
        let end = self
            .cells
            .iter()
            .rposition(|cell| cell.symbol != Symbol::Empty || cell.head)
            .map_or(0, |last| last + 1);
        &self.cells[..end]
    }

    /// The tape as text, with empty cells as spaces and trailing empty cells dropped.
    ///
    /// | a | b | _ | c | _ | _ |  ->  "ab c"
    pub fn to_text(&self) -> String {
        self.trimmed()
            .iter()
            .map(|cell| match &cell.symbol {
                Symbol::Empty => " ".to_string(),
                _ => cell.glyph(),
            })
            .collect()
    }
}

impl fmt::Display for TapeSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, cell) in self.cells.iter().enumerate() {
            let glyph = if cell.is_empty() && !cell.head {
                "_".to_string()
            } else {
                cell.glyph()
            };
            if index == self.head {
                write!(f, "[{glyph}]")?;
            } else {
                write!(f, " {glyph} ")?;
            }
        }
        Ok(())
    }
}
