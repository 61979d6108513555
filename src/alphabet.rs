//! The closed set of symbols a compiled machine may find on its tape.

use log::debug;
use std::collections::HashSet;

use crate::cell::{Cell, Symbol};

/// Declared input and tape symbols, plus everything the multi-tape simulation adds.
///
/// The registry is constructed once from the declared alphabets; the only later changes are
/// the one-time closure for multi-tape simulation and state-name pseudo-symbols.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alphabet {
    /// Input symbols, extra symbols and the empty cell, in declaration order.
    developer: Vec<Cell>,
    /// Every valid symbol, in registration order.
    machine: Vec<Cell>,
    members: HashSet<Cell>,
    /// Head-tagged variants of the developer symbols, once simulating.
    tape_heads: Vec<Cell>,
    simulating: bool,
}

impl Default for Alphabet {
    fn default() -> Self {
        Self::new(Vec::new(), Vec::new())
    }
}

impl Alphabet {
    /// Creates the registry from declared input and extra tape symbols.
    ///
    /// The empty cell is always part of the alphabet; duplicates are dropped.
    pub fn new(input: Vec<Cell>, extra: Vec<Cell>) -> Self {
        let mut alphabet = Self {
            developer: Vec::new(),
            machine: Vec::new(),
            members: HashSet::new(),
            tape_heads: Vec::new(),
            simulating: false,
        };
        for cell in input.into_iter().chain(extra).chain([Cell::EMPTY]) {
            if alphabet.insert(cell.clone()) {
                alphabet.developer.push(cell);
            }
        }
        alphabet
    }

    fn insert(&mut self, cell: Cell) -> bool {
        if !self.members.insert(cell.clone()) {
            return false;
        }
        self.machine.push(cell);
        true
    }

    /// Adds the head-tagged symbols and protocol markers used to run several logical tapes
    /// on one physical tape. Does nothing when already closed.
    pub(crate) fn close_for_simulation(&mut self) {
        if self.simulating {
            return;
        }
        self.simulating = true;
        self.tape_heads = self.developer.iter().map(Cell::as_head).collect();
        for head in self.tape_heads.clone() {
            self.insert(head);
        }
        for marker in [Cell::START, Cell::BOUND_L, Cell::BOUND_R, Cell::AFTER_LAST] {
            self.insert(marker);
        }
        // Only the right boundary is ever marked as a head
        self.insert(Cell::BOUND_R.as_head());
        debug!("alphabet closed for simulation: {} symbols", self.machine.len());
    }

    /// Registers the pseudo-symbol for a state name.
    pub(crate) fn add_state_symbol(&mut self, state: &str) {
        self.insert(Cell::state(state));
    }

    /// Checks a cell, or every component of a tuple, against the registry.
    pub fn is_valid(&self, cell: &Cell) -> bool {
        match &cell.symbol {
            Symbol::Tuple(cells) => cells.iter().all(|inner| self.is_valid(inner)),
            _ => self.members.contains(cell),
        }
    }

    /// The symbols declared by the machine author, including the empty cell.
    pub fn developer(&self) -> &[Cell] {
        &self.developer
    }

    /// Every symbol a tape of the compiled machine can hold.
    pub fn whole(&self) -> &[Cell] {
        &self.machine
    }

    /// Head-tagged developer symbols; empty unless simulating multiple tapes.
    pub fn tape_heads(&self) -> &[Cell] {
        &self.tape_heads
    }

    pub fn is_simulating(&self) -> bool {
        self.simulating
    }

    pub(crate) fn rename_guard(&mut self, old: &str, new: &str) {
        for cell in &mut self.machine {
            cell.rename_guard(old, new);
        }
        self.members = self.machine.iter().cloned().collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alphabet(input: &str, extra: &str) -> Alphabet {
        Alphabet::new(
            input.chars().map(Cell::from).collect(),
            extra.chars().map(Cell::from).collect(),
        )
    }

    #[test]
    fn test_developer_alphabet_includes_empty() {
        let alphabet = alphabet("ab", "ba$");

        assert_eq!(
            alphabet.developer(),
            &[Cell::from('a'), Cell::from('b'), Cell::from('$'), Cell::EMPTY]
        );
        assert!(alphabet.is_valid(&Cell::EMPTY));
        assert!(!alphabet.is_valid(&Cell::from('c')));
        assert!(!alphabet.is_valid(&Cell::from('a').as_head()));
        assert!(alphabet.tape_heads().is_empty());
    }

    #[test]
    fn test_tuple_validity() {
        let alphabet = alphabet("ab", "");

        assert!(alphabet.is_valid(&Cell::tuple(vec![Cell::from('a'), Cell::EMPTY])));
        assert!(!alphabet.is_valid(&Cell::tuple(vec![Cell::from('a'), Cell::from('z')])));
    }

    #[test]
    fn test_simulation_closure() {
        let mut alphabet = alphabet("x", "");
        alphabet.close_for_simulation();
        alphabet.close_for_simulation();

        assert!(alphabet.is_simulating());
        assert_eq!(
            alphabet.tape_heads(),
            &[Cell::from('x').as_head(), Cell::EMPTY.as_head()]
        );
        for cell in [Cell::START, Cell::BOUND_L, Cell::BOUND_R, Cell::AFTER_LAST] {
            assert!(alphabet.is_valid(&cell));
        }
        assert!(alphabet.is_valid(&Cell::BOUND_R.as_head()));
        assert!(!alphabet.is_valid(&Cell::BOUND_L.as_head()));
        // 2 developer + 2 heads + 4 markers + 1 head-tagged bound
        assert_eq!(alphabet.whole().len(), 9);
    }

    #[test]
    fn test_state_symbols_and_rename() {
        let mut alphabet = alphabet("x", "");
        alphabet.close_for_simulation();
        alphabet.add_state_symbol("Ω_q");
        alphabet.add_state_symbol("Ω_q");
        assert!(alphabet.is_valid(&Cell::state("Ω_q")));
        assert_eq!(alphabet.whole().len(), 10);

        alphabet.rename_guard("Ω", "ΩΩ");
        assert!(alphabet.is_valid(&Cell::state("ΩΩ_q")));
        assert!(!alphabet.is_valid(&Cell::state("Ω_q")));
    }
}
