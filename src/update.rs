//! The effect of a transition: one tape update per tape plus the state to continue in.

use log::warn;
use std::fmt;

use crate::cell::{Cell, Movement};
use crate::tape::Tape;

/// What a transition does to one tape.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TapeUpdate {
    /// Overwrite the current cell, then move.
    Write { cell: Cell, movement: Movement },
    /// Move without touching the current cell.
    Preserve { movement: Movement },
    /// Blank the current cell, paste its content one cell to the right, then move again.
    Shift { then: Movement },
    /// Shift everything from the current position up to the next empty cell one cell
    /// right, write `marker` into the vacated cell and step right.
    FirstCellMarker { marker: Cell },
    /// Shift everything after the nearest `marker` to its left one cell right, write
    /// `insert` right after the marker and step right.
    InsertAfterMarker { marker: Cell, insert: Cell },
}

impl TapeUpdate {
    pub fn write(cell: Cell, movement: Movement) -> Self {
        TapeUpdate::Write { cell, movement }
    }

    pub fn preserve(movement: Movement) -> Self {
        TapeUpdate::Preserve { movement }
    }

    pub fn apply_to_tape(&self, tape: &mut Tape) {
        match self {
            TapeUpdate::Write { cell, movement } => {
                tape.write(cell.clone());
                tape.apply_move(*movement);
            }
            TapeUpdate::Preserve { movement } => tape.apply_move(*movement),
            TapeUpdate::Shift { then } => {
                let paste = tape.read().clone();
                tape.write(Cell::EMPTY);
                tape.apply_move(Movement::R);
                tape.write(paste);
                tape.apply_move(*then);
            }
            TapeUpdate::FirstCellMarker { marker } => {
                seek_last_written(tape);
                let mut paste = tape.read().clone();
                while paste != Cell::EMPTY {
                    shift_one_back(tape, paste);
                    paste = tape.read().clone();
                }
                tape.write(marker.clone());
                tape.apply_move(Movement::R);
            }
            TapeUpdate::InsertAfterMarker { marker, insert } => {
                seek_last_written(tape);
                let mut paste = tape.read().clone();
                while paste != *marker {
                    if !shift_one_back(tape, paste) {
                        warn!("marker {marker} not found before the start of the tape");
                        return;
                    }
                    paste = tape.read().clone();
                }
                tape.apply_move(Movement::R);
                tape.write(insert.clone());
                tape.apply_move(Movement::R);
            }
        }
    }

    /// Rewrites the guard token inside state names this update writes.
    pub(crate) fn rename_guard(&mut self, old: &str, new: &str) {
        match self {
            TapeUpdate::Write { cell, .. } => cell.rename_guard(old, new),
            TapeUpdate::FirstCellMarker { marker } => marker.rename_guard(old, new),
            TapeUpdate::InsertAfterMarker { marker, insert } => {
                marker.rename_guard(old, new);
                insert.rename_guard(old, new);
            }
            TapeUpdate::Preserve { .. } | TapeUpdate::Shift { .. } => {}
        }
    }
}

/// Steps right to the next empty cell, then back onto the last written one.
fn seek_last_written(tape: &mut Tape) {
    tape.apply_move(Movement::R);
    while *tape.read() != Cell::EMPTY {
        tape.apply_move(Movement::R);
    }
    tape.apply_move(Movement::L);
}

/// Moves `paste` one cell right and steps onto the cell before it.
///
/// Returns false when the tape origin was already reached.
fn shift_one_back(tape: &mut Tape, paste: Cell) -> bool {
    tape.write(Cell::EMPTY);
    tape.apply_move(Movement::R);
    tape.write(paste);
    if tape.head() < 2 {
        tape.apply_move(Movement::left(2));
        return false;
    }
    tape.apply_move(Movement::left(2));
    true
}

impl fmt::Display for TapeUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TapeUpdate::Write { cell, movement } => write!(f, "{cell} [move {movement}]"),
            TapeUpdate::Preserve { movement } => write!(f, "[no change] [move {movement}]"),
            TapeUpdate::Shift { then } => write!(
                f,
                "{} [move {}] [paste matched symbol] [move {then}]",
                Cell::EMPTY,
                Movement::R
            ),
            TapeUpdate::FirstCellMarker { marker } => write!(
                f,
                "[insert {marker}, shifting to the next empty cell, then move 1R]"
            ),
            TapeUpdate::InsertAfterMarker { marker, insert } => {
                write!(f, "[insert {insert} after {marker}, then move 1R]")
            }
        }
    }
}

/// The result of a transition: one update per tape and the next state.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Outcome {
    updates: Vec<TapeUpdate>,
    next_state: String,
}

impl Outcome {
    pub fn new(updates: Vec<TapeUpdate>, next_state: impl Into<String>) -> Self {
        Self {
            updates,
            next_state: next_state.into(),
        }
    }

    /// An outcome for a single-tape machine.
    pub fn single(update: TapeUpdate, next_state: impl Into<String>) -> Self {
        Self::new(vec![update], next_state)
    }

    pub fn updates(&self) -> &[TapeUpdate] {
        &self.updates
    }

    pub fn next_state(&self) -> &str {
        &self.next_state
    }

    /// Applies each update to the tape at the same index.
    pub fn apply(&self, tapes: &mut [Tape]) {
        for (update, tape) in self.updates.iter().zip(tapes.iter_mut()) {
            update.apply_to_tape(tape);
        }
    }

    /// The only mutation an outcome allows: rewriting the guard token.
    pub(crate) fn rename_guard(&mut self, old: &str, new: &str) {
        if self.next_state.contains(old) {
            self.next_state = self.next_state.replace(old, new);
        }
        for update in &mut self.updates {
            update.rename_guard(old, new);
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.updates.as_slice() {
            [update] => write!(f, "{update}")?,
            updates => {
                let inner = updates.iter().map(TapeUpdate::to_string).collect::<Vec<_>>();
                write!(f, "<{}>", inner.join(", "))?;
            }
        }
        write!(f, " [next state: {}]", self.next_state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tape::TapeSnapshot;

    fn tape(text: &str) -> Tape {
        Tape::with_input(text.chars().map(Cell::from))
    }

    fn text(tape: &Tape) -> String {
        tape.snapshot().to_text()
    }

    #[test]
    fn test_write_and_preserve() {
        let mut t = tape("ab");
        TapeUpdate::write(Cell::from('x'), Movement::R).apply_to_tape(&mut t);
        TapeUpdate::preserve(Movement::R).apply_to_tape(&mut t);

        assert_eq!(text(&t), "xb");
        assert_eq!(t.head(), 2);
    }

    #[test]
    fn test_shift() {
        let mut t = tape("ab");
        TapeUpdate::Shift { then: Movement::R }.apply_to_tape(&mut t);

        assert_eq!(text(&t), " a");
        assert_eq!(t.head(), 2);
    }

    #[test]
    fn test_first_cell_marker() {
        let mut t = tape("abc");
        TapeUpdate::FirstCellMarker { marker: Cell::START }.apply_to_tape(&mut t);

        assert_eq!(
            t.snapshot().trimmed(),
            &[Cell::START, Cell::from('a'), Cell::from('b'), Cell::from('c')]
        );
        assert_eq!(t.head(), 1);
    }

    #[test]
    fn test_insert_after_marker() {
        let mut t = Tape::with_input(vec![Cell::START, Cell::from('a'), Cell::from('b')]);
        t.apply_move(Movement::R);
        TapeUpdate::InsertAfterMarker {
            marker: Cell::START,
            insert: Cell::BOUND_L,
        }
        .apply_to_tape(&mut t);

        let expected = TapeSnapshot {
            cells: vec![
                Cell::START,
                Cell::BOUND_L,
                Cell::from('a'),
                Cell::from('b'),
                Cell::EMPTY,
            ],
            head: 2,
        };
        assert_eq!(t.snapshot().trimmed(), &expected.cells[..4]);
        assert_eq!(t.head(), expected.head);
    }

    #[test]
    fn test_insert_after_missing_marker_stops_at_origin() {
        let mut t = tape("ab");
        TapeUpdate::InsertAfterMarker {
            marker: Cell::START,
            insert: Cell::BOUND_L,
        }
        .apply_to_tape(&mut t);

        assert_eq!(t.head(), 0);
        assert_eq!(text(&t), " ab");
    }

    #[test]
    fn test_update_display() {
        assert_eq!(
            TapeUpdate::write(Cell::EMPTY, Movement::R).to_string(),
            "{e} [move 1R]"
        );
        assert_eq!(
            TapeUpdate::preserve(Movement::N).to_string(),
            "[no change] [move N]"
        );
        assert_eq!(
            TapeUpdate::Shift {
                then: Movement::left(2)
            }
            .to_string(),
            "{e} [move 1R] [paste matched symbol] [move 2L]"
        );
        assert_eq!(
            TapeUpdate::InsertAfterMarker {
                marker: Cell::START,
                insert: Cell::EMPTY
            }
            .to_string(),
            "[insert {e} after {^^}, then move 1R]"
        );
    }

    #[test]
    fn test_outcome_display_and_rename() {
        let mut outcome = Outcome::new(
            vec![
                TapeUpdate::write(Cell::state("Ω_a_Ω"), Movement::R),
                TapeUpdate::preserve(Movement::N),
            ],
            "Ω_1L_Ω_q_Ω",
        );
        outcome.rename_guard("Ω", "ΩΩ");

        assert_eq!(outcome.next_state(), "ΩΩ_1L_ΩΩ_q_ΩΩ");
        assert_eq!(
            outcome.to_string(),
            "<Q:{ΩΩ_a_ΩΩ} [move 1R], [no change] [move N]> [next state: ΩΩ_1L_ΩΩ_q_ΩΩ]"
        );

        let single = Outcome::single(TapeUpdate::write(Cell::from('1'), Movement::R), "qstart");
        assert_eq!(single.to_string(), "1 [move 1R] [next state: qstart]");
    }
}
