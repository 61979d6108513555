//! The transitions registered for one state.
//!
//! Lookups resolve in three tiers: exact entries, then multi-match groups, then the
//! wildcard. Every member of a multi-match group also occupies its exact slot with a
//! sentinel, so exact lookup still finds it and later wildcard expansion can skip it.

use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::alphabet::Alphabet;
use crate::cell::{Cell, MultiTarget};
use crate::types::TableError;
use crate::update::Outcome;

/// Separator between a transition key and its outcome in developer listings.
const RESULT_SEPARATOR: &str = " \u{27F6} ";

#[derive(Debug, Clone, PartialEq, Eq)]
enum ExactEntry {
    Outcome(Outcome),
    /// Sentinel pointing at the owning multi-match group.
    MultiMatch(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct MultiMatchGroup {
    cells: Vec<Cell>,
    outcome: Outcome,
    /// The per-tape targets a multi-tape group was expanded from.
    original: Option<MultiTarget>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransitionTable {
    exact: HashMap<Cell, ExactEntry>,
    order: Vec<Cell>,
    groups: Vec<MultiMatchGroup>,
    wildcard: Option<Outcome>,
}

/// One registered transition, as enumerated for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionEntry<'a> {
    Exact {
        cell: &'a Cell,
        outcome: &'a Outcome,
    },
    MultiMatch {
        cells: &'a [Cell],
        original: Option<&'a MultiTarget>,
        outcome: &'a Outcome,
    },
    Wildcard {
        outcome: &'a Outcome,
    },
}

impl<'a> TransitionEntry<'a> {
    pub fn outcome(&self) -> &'a Outcome {
        match self {
            TransitionEntry::Exact { outcome, .. }
            | TransitionEntry::MultiMatch { outcome, .. }
            | TransitionEntry::Wildcard { outcome } => outcome,
        }
    }
}

impl fmt::Display for TransitionEntry<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransitionEntry::Exact { cell, outcome } => {
                write!(f, "{cell}{RESULT_SEPARATOR}{outcome}")
            }
            TransitionEntry::MultiMatch {
                original: Some(original),
                outcome,
                ..
            } => write!(f, "{original}{RESULT_SEPARATOR}{outcome}"),
            TransitionEntry::MultiMatch { cells, outcome, .. } => {
                let keys = cells.iter().map(Cell::to_string).collect::<Vec<_>>();
                write!(f, "{}{RESULT_SEPARATOR}{outcome}", keys.join(","))
            }
            TransitionEntry::Wildcard { outcome } => {
                write!(f, "{}{RESULT_SEPARATOR}{outcome}", MultiTarget::Wildcard)
            }
        }
    }
}

impl TransitionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// A state can exist without transitions, e.g. when it is only referenced.
    pub fn is_empty(&self) -> bool {
        self.exact.is_empty() && self.groups.is_empty() && self.wildcard.is_none()
    }

    pub fn has_wildcard(&self) -> bool {
        self.wildcard.is_some()
    }

    fn check_slot(&self, cell: &Cell, alphabet: &Alphabet) -> Result<(), TableError> {
        if self.wildcard.is_some() {
            return Err(TableError::AfterWildcard(cell.to_string()));
        }
        if self.exact.contains_key(cell) {
            return Err(TableError::Duplicate(cell.to_string()));
        }
        if !alphabet.is_valid(cell) {
            return Err(TableError::InvalidSymbol(cell.to_string()));
        }
        Ok(())
    }

    pub fn define_exact(
        &mut self,
        cell: Cell,
        outcome: Outcome,
        alphabet: &Alphabet,
    ) -> Result<(), TableError> {
        self.check_slot(&cell, alphabet)?;
        self.order.push(cell.clone());
        self.exact.insert(cell, ExactEntry::Outcome(outcome));
        Ok(())
    }

    /// Registers one outcome shared by all `cells`.
    ///
    /// Either every cell is registered or, on error, none is.
    pub fn define_multi_match(
        &mut self,
        cells: Vec<Cell>,
        outcome: Outcome,
        original: Option<MultiTarget>,
        alphabet: &Alphabet,
    ) -> Result<(), TableError> {
        let mut seen = HashSet::new();
        for cell in &cells {
            self.check_slot(cell, alphabet)?;
            if !seen.insert(cell) {
                return Err(TableError::Duplicate(cell.to_string()));
            }
        }

        let index = self.groups.len();
        for cell in &cells {
            self.order.push(cell.clone());
            self.exact.insert(cell.clone(), ExactEntry::MultiMatch(index));
        }
        self.groups.push(MultiMatchGroup {
            cells,
            outcome,
            original,
        });
        Ok(())
    }

    pub fn define_wildcard(&mut self, outcome: Outcome) -> Result<(), TableError> {
        if self.wildcard.is_some() {
            return Err(TableError::WildcardRedefined);
        }
        self.wildcard = Some(outcome);
        Ok(())
    }

    /// Resolves a cell: exact entry, then its multi-match group, then the wildcard.
    pub fn lookup(&self, cell: &Cell) -> Option<&Outcome> {
        match self.exact.get(cell) {
            Some(ExactEntry::Outcome(outcome)) => Some(outcome),
            Some(ExactEntry::MultiMatch(index)) => self.groups.get(*index).map(|g| &g.outcome),
            None => self.wildcard.as_ref(),
        }
    }

    /// Whether the cell has an exact or multi-match entry, ignoring the wildcard.
    pub fn is_matched(&self, cell: &Cell) -> bool {
        self.exact.contains_key(cell)
    }

    /// The members of `candidates` no tier resolves yet.
    pub fn unmatched(&self, candidates: &[Cell]) -> Vec<Cell> {
        candidates
            .iter()
            .filter(|cell| self.lookup(cell).is_none())
            .cloned()
            .collect()
    }

    /// Every registered transition: exact entries in registration order, then multi-match
    /// groups, then the wildcard.
    pub fn entries(&self) -> Vec<TransitionEntry<'_>> {
        let exact = self.order.iter().filter_map(|cell| match self.exact.get(cell) {
            Some(ExactEntry::Outcome(outcome)) => Some(TransitionEntry::Exact { cell, outcome }),
            _ => None,
        });
        let groups = self.groups.iter().map(|group| TransitionEntry::MultiMatch {
            cells: &group.cells,
            original: group.original.as_ref(),
            outcome: &group.outcome,
        });
        let wildcard = self
            .wildcard
            .iter()
            .map(|outcome| TransitionEntry::Wildcard { outcome });
        exact.chain(groups).chain(wildcard).collect()
    }

    pub fn outcomes(&self) -> impl Iterator<Item = &Outcome> {
        self.exact
            .values()
            .filter_map(|entry| match entry {
                ExactEntry::Outcome(outcome) => Some(outcome),
                ExactEntry::MultiMatch(_) => None,
            })
            .chain(self.groups.iter().map(|group| &group.outcome))
            .chain(self.wildcard.iter())
    }

    /// Developer-facing listing, one line per registered transition.
    pub fn developer_display(&self) -> Vec<String> {
        self.entries().iter().map(ToString::to_string).collect()
    }

    pub(crate) fn rename_guard(&mut self, old: &str, new: &str) {
        let exact = std::mem::take(&mut self.exact);
        self.exact = exact
            .into_iter()
            .map(|(mut cell, mut entry)| {
                cell.rename_guard(old, new);
                if let ExactEntry::Outcome(outcome) = &mut entry {
                    outcome.rename_guard(old, new);
                }
                (cell, entry)
            })
            .collect();
        for cell in &mut self.order {
            cell.rename_guard(old, new);
        }
        for group in &mut self.groups {
            group.cells.iter_mut().for_each(|cell| cell.rename_guard(old, new));
            group.outcome.rename_guard(old, new);
        }
        if let Some(outcome) = &mut self.wildcard {
            outcome.rename_guard(old, new);
        }
    }
}
