//! Values stored in tape cells, head movements, and the match targets used while a machine
//! is being specified.
//!
//! Every type here implements `Display` in the developer notation used by transition
//! listings: `{e}` for the empty cell, `{*}` for the wildcard, `{^^}`, `{<}`, `{>}` and `{$$}`
//! for the multi-tape protocol markers, a `-{HEAD}` suffix for simulated heads, and
//! `Q:{name}` for state names carried on the tape.

use serde::Serialize;
use std::fmt;

/// Combining overline used to mark simulated heads in tape glyphs.
const OVERBAR: char = '\u{0305}';

/// The value held by a cell, without its simulated-head tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Symbol {
    /// A user symbol, typically one character.
    Literal(String),
    Empty,
    /// Marks the start of the simulated tapes.
    TapeStart,
    /// Left boundary of one simulated tape segment.
    BoundLeft,
    /// Right boundary of one simulated tape segment.
    BoundRight,
    /// Marks the end of the last simulated tape segment.
    AfterLast,
    /// A state name stored on the tape to resume a simulated step.
    State(String),
    /// The combination of cells read from several real tapes.
    Tuple(Vec<Cell>),
}

/// One tape cell: a symbol plus the simulated-head tag.
///
/// Two cells are the same transition key iff both the symbol and the tag agree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Cell {
    pub symbol: Symbol,
    pub head: bool,
}

impl Cell {
    pub const EMPTY: Cell = Cell::marker(Symbol::Empty);
    pub const START: Cell = Cell::marker(Symbol::TapeStart);
    pub const BOUND_L: Cell = Cell::marker(Symbol::BoundLeft);
    pub const BOUND_R: Cell = Cell::marker(Symbol::BoundRight);
    pub const AFTER_LAST: Cell = Cell::marker(Symbol::AfterLast);

    const fn marker(symbol: Symbol) -> Self {
        Cell {
            symbol,
            head: false,
        }
    }

    pub fn literal(value: impl Into<String>) -> Self {
        Cell::marker(Symbol::Literal(value.into()))
    }

    /// A state name pseudo-symbol, never tagged as a head.
    pub fn state(name: impl Into<String>) -> Self {
        Cell::marker(Symbol::State(name.into()))
    }

    pub fn tuple(cells: Vec<Cell>) -> Self {
        Cell::marker(Symbol::Tuple(cells))
    }

    /// Returns the head-tagged variant of this cell.
    pub fn as_head(&self) -> Self {
        Cell {
            symbol: self.symbol.clone(),
            head: true,
        }
    }

    /// Returns this cell without the head tag.
    pub fn untagged(&self) -> Self {
        Cell {
            symbol: self.symbol.clone(),
            head: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.symbol == Symbol::Empty
    }

    /// The cells of a tuple, or this cell alone.
    pub fn components(&self) -> Vec<Cell> {
        match &self.symbol {
            Symbol::Tuple(cells) => cells.clone(),
            _ => vec![self.clone()],
        }
    }

    /// Rewrites the guard token inside state-name symbols.
    pub(crate) fn rename_guard(&mut self, old: &str, new: &str) {
        match &mut self.symbol {
            Symbol::State(name) if name.contains(old) => *name = name.replace(old, new),
            Symbol::Tuple(cells) => cells
                .iter_mut()
                .for_each(|cell| cell.rename_guard(old, new)),
            _ => {}
        }
    }

    /// The glyph drawn for this cell on a rendered tape.
    ///
    /// Simulated heads get an overline; the empty cell is drawn as nothing.
    pub fn glyph(&self) -> String {
        let bar = if self.head {
            OVERBAR.to_string()
        } else {
            String::new()
        };
        match &self.symbol {
            Symbol::Literal(value) => format!("{value}{bar}"),
            Symbol::Empty => bar,
            Symbol::TapeStart => format!("{{^{bar}^{bar}}}"),
            Symbol::BoundLeft => format!("{{<{bar}}}"),
            Symbol::BoundRight => format!("{{>{bar}}}"),
            Symbol::AfterLast => format!("{{${bar}${bar}}}"),
            Symbol::State(name) => format!("Q:{{{name}}}"),
            Symbol::Tuple(cells) => {
                let inner = cells.iter().map(Cell::glyph).collect::<Vec<_>>();
                format!("<{}>", inner.join(","))
            }
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let head = if self.head { "-{HEAD}" } else { "" };
        match &self.symbol {
            // User symbols that look like reserved notation get a prefix
            Symbol::Literal(value)
                if value.chars().count() >= 3 && value.starts_with('{') && value.ends_with('}') =>
            {
                write!(f, "S:{value}{head}")
            }
            Symbol::Literal(value) => write!(f, "{value}{head}"),
            Symbol::Empty => write!(f, "{{e}}{head}"),
            Symbol::TapeStart => write!(f, "{{^^}}{head}"),
            Symbol::BoundLeft => write!(f, "{{<}}{head}"),
            Symbol::BoundRight => write!(f, "{{>}}{head}"),
            Symbol::AfterLast => write!(f, "{{$$}}{head}"),
            Symbol::State(name) => write!(f, "Q:{{{name}}}"),
            Symbol::Tuple(cells) => {
                let inner = cells.iter().map(Cell::to_string).collect::<Vec<_>>();
                write!(f, "<{}>", inner.join(","))
            }
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::literal(value)
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::literal(value)
    }
}

impl From<char> for Cell {
    fn from(value: char) -> Self {
        Cell::literal(value.to_string())
    }
}

impl From<Symbol> for Cell {
    fn from(symbol: Symbol) -> Self {
        Cell::marker(symbol)
    }
}

/// A signed number of cells to move the head; negative is left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Movement(isize);

impl Movement {
    pub const L: Movement = Movement(-1);
    pub const R: Movement = Movement(1);
    pub const N: Movement = Movement(0);

    pub fn new(offset: isize) -> Self {
        Movement(offset)
    }

    pub fn left(cells: usize) -> Self {
        Movement(-(cells as isize))
    }

    pub fn right(cells: usize) -> Self {
        Movement(cells as isize)
    }

    pub fn offset(self) -> isize {
        self.0
    }

    pub fn is_multi_cell(self) -> bool {
        self.0.unsigned_abs() > 1
    }

    /// Splits into a single-cell step and the remainder.
    ///
    /// The remainder is zero iff the magnitude is at most one; a zero movement splits into
    /// two zero movements.
    pub fn split(self) -> (Movement, Movement) {
        match self.0 {
            0 => (Movement::N, Movement::N),
            offset if offset < 0 => (Movement::L, Movement(offset + 1)),
            offset => (Movement::R, Movement(offset - 1)),
        }
    }
}

impl fmt::Display for Movement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            0 => f.write_str("N"),
            offset if offset < 0 => write!(f, "{}L", -offset),
            offset => write!(f, "{offset}R"),
        }
    }
}

/// What a single-tape transition matches.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Target {
    Cell(Cell),
    /// Several symbols sharing one outcome.
    OneOf(Vec<Cell>),
    /// Every symbol not otherwise matched in the state.
    Wildcard,
}

impl Target {
    pub fn one_of<I, C>(cells: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Cell>,
    {
        Target::OneOf(cells.into_iter().map(Into::into).collect())
    }

    /// Every symbol of a string, one cell per character.
    pub fn chars(symbols: &str) -> Self {
        Target::one_of(symbols.chars())
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Cell(cell) => write!(f, "{cell}"),
            Target::OneOf(cells) => {
                let inner = cells.iter().map(Cell::to_string).collect::<Vec<_>>();
                write!(f, "[{}]", inner.join(","))
            }
            Target::Wildcard => f.write_str("{*}"),
        }
    }
}

/// Implements `From` for every type a single cell can be built from.
macro_rules! from_cell_like {
    ($target:ty, $variant:path) => {
        impl From<Cell> for $target {
            fn from(cell: Cell) -> Self {
                $variant(cell)
            }
        }

        impl From<Symbol> for $target {
            fn from(symbol: Symbol) -> Self {
                $variant(Cell::from(symbol))
            }
        }

        impl From<&str> for $target {
            fn from(value: &str) -> Self {
                $variant(Cell::from(value))
            }
        }

        impl From<String> for $target {
            fn from(value: String) -> Self {
                $variant(Cell::from(value))
            }
        }

        impl From<char> for $target {
            fn from(value: char) -> Self {
                $variant(Cell::from(value))
            }
        }
    };
}

from_cell_like!(Target, Target::Cell);

/// What a transition writes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Output {
    Cell(Cell),
    /// Leave the matched content in place.
    NoChange,
}

impl Output {
    /// Resolves `NoChange` against the cell that was matched.
    pub fn resolve(&self, matched: &Cell) -> Cell {
        match self {
            Output::Cell(cell) => cell.clone(),
            Output::NoChange => matched.clone(),
        }
    }
}

from_cell_like!(Output, Output::Cell);

/// What a multi-tape transition matches.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MultiTarget {
    /// Any combination not otherwise matched.
    Wildcard,
    /// One target per tape.
    Tapes(Vec<Target>),
}

impl fmt::Display for MultiTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MultiTarget::Wildcard => f.write_str("{*}"),
            MultiTarget::Tapes(targets) => {
                let inner = targets.iter().map(Target::to_string).collect::<Vec<_>>();
                write!(f, "<{}>", inner.join(","))
            }
        }
    }
}

impl From<Vec<Target>> for MultiTarget {
    fn from(targets: Vec<Target>) -> Self {
        MultiTarget::Tapes(targets)
    }
}
