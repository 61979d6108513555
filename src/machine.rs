//! This module defines the `CompiledMachine`, the read-only result of lowering, and the
//! `TuringMachine` interpreter that executes it on one or more physical tapes.
//!
//! The transition function of a compiled machine is total: an unknown state, a symbol
//! outside the alphabet, or a missing transition all resolve to writing an empty cell,
//! moving right and rejecting.

use log::{trace, warn};
use std::collections::HashMap;

use crate::alphabet::Alphabet;
use crate::cell::{Cell, Movement};
use crate::features::FeatureSet;
use crate::multitape::decode_segments;
use crate::render::{HistoryRenderer, Renderer, SilentRenderer, StepRecord};
use crate::table::TransitionTable;
use crate::tape::{Tape, TapeSnapshot};
use crate::types::{Halt, Step, RUN_BATCH_SIZE, STATE_REJECT};
use crate::update::{Outcome, TapeUpdate};

/// A machine whose transition tables can no longer change.
#[derive(Debug, Clone)]
pub struct CompiledMachine {
    start_state: String,
    states: HashMap<String, TransitionTable>,
    order: Vec<String>,
    alphabet: Alphabet,
    features: FeatureSet,
    logical_tapes: usize,
    physical_tapes: usize,
    reject: Outcome,
}

impl CompiledMachine {
    pub(crate) fn new(
        start_state: String,
        states: HashMap<String, TransitionTable>,
        order: Vec<String>,
        alphabet: Alphabet,
        features: FeatureSet,
        logical_tapes: usize,
        physical_tapes: usize,
    ) -> Self {
        let reject = Outcome::new(
            vec![TapeUpdate::write(Cell::EMPTY, Movement::R); physical_tapes],
            STATE_REJECT,
        );
        Self {
            start_state,
            states,
            order,
            alphabet,
            features,
            logical_tapes,
            physical_tapes,
            reject,
        }
    }

    /// Resolves the outcome for `cell` read in `state`.
    ///
    /// # Arguments
    ///
    /// * `state` - The current state.
    /// * `cell` - The cell under the head, or the tuple of cells under every head.
    ///
    /// # Returns
    ///
    /// * The registered outcome, or the reject outcome when there is none.
    pub fn lookup(&self, state: &str, cell: &Cell) -> &Outcome {
        let Some(table) = self.states.get(state) else {
            warn!("unknown state {state}, rejecting");
            return &self.reject;
        };
        if !self.alphabet.is_valid(cell) {
            warn!("{cell} in state {state} is not part of the alphabet, rejecting");
            return &self.reject;
        }
        match table.lookup(cell) {
            Some(outcome) => outcome,
            None => {
                warn!("no transition from state {state} on {cell}, rejecting");
                &self.reject
            }
        }
    }

    pub fn start_state(&self) -> &str {
        &self.start_state
    }

    /// Number of tapes the interpreter allocates.
    pub fn tape_count(&self) -> usize {
        self.physical_tapes
    }

    /// Number of tapes the machine was specified with.
    pub fn logical_tape_count(&self) -> usize {
        self.logical_tapes
    }

    /// Whether several logical tapes share one physical tape.
    pub fn is_simulated(&self) -> bool {
        self.logical_tapes > self.physical_tapes
    }

    pub fn alphabet(&self) -> &Alphabet {
        &self.alphabet
    }

    pub fn features(&self) -> &FeatureSet {
        &self.features
    }

    /// State names in creation order.
    pub fn state_names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn transitions(&self, state: &str) -> Option<&TransitionTable> {
        self.states.get(state)
    }

    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    /// Number of registered entries; a multi-match group counts once.
    pub fn transition_count(&self) -> usize {
        self.states.values().map(|table| table.entries().len()).sum()
    }

    /// Every state with transitions, followed by its entries.
    ///
    /// ```text
    /// qstart:
    ///   0 ⟶ 0 [move N] [next state: ACCEPT]
    ///   {*} ⟶ [no change] [move 1R] [next state: qstart]
    /// ```
    pub fn developer_display(&self) -> String {
        let mut listing = String::new();
        for name in &self.order {
            let Some(table) = self.states.get(name).filter(|table| !table.is_empty()) else {
                continue;
            };
            listing.push_str(name);
            listing.push_str(":\n");
            for line in table.developer_display() {
                listing.push_str("  ");
                listing.push_str(&line);
                listing.push('\n');
            }
        }
        listing
    }
}

/// Executes a compiled machine step by step.
///
/// The renderer is notified after loading and after every step.
pub struct TuringMachine<R: Renderer = SilentRenderer> {
    program: CompiledMachine,
    state: String,
    tapes: Vec<Tape>,
    input: Vec<Cell>,
    step_count: usize,
    renderer: R,
}

impl TuringMachine {
    /// Creates an interpreter without a renderer. The tapes start blank.
    pub fn new(program: CompiledMachine) -> Self {
        Self::with_renderer(program, SilentRenderer)
    }
}

impl<R: Renderer> TuringMachine<R> {
    pub fn with_renderer(program: CompiledMachine, mut renderer: R) -> Self {
        renderer.on_tape_count_changed(program.logical_tape_count());
        Self {
            state: program.start_state().to_string(),
            tapes: vec![Tape::new(); program.tape_count()],
            input: Vec::new(),
            step_count: 0,
            renderer,
            program,
        }
    }

    /// Resets the machine and writes `input` onto the first tape, one cell per character.
    pub fn load(&mut self, input: &str) {
        self.load_cells(input.chars().map(Cell::from));
    }

    pub fn load_cells(&mut self, input: impl IntoIterator<Item = Cell>) {
        self.input = input.into_iter().collect();
        self.reset();
    }

    /// Goes back to the start state with the last loaded input.
    pub fn reset(&mut self) {
        self.tapes = vec![Tape::new(); self.program.tape_count()];
        if let Some(first) = self.tapes.first_mut() {
            first.load(self.input.iter().cloned());
        }
        self.state = self.program.start_state().to_string();
        self.step_count = 0;
        self.renderer.on_step(&self.state, &self.tapes);
    }

    /// The cell under the head, or the tuple of cells under every head.
    fn read_key(&self) -> Cell {
        match self.tapes.as_slice() {
            [tape] => tape.read().clone(),
            tapes => Cell::tuple(tapes.iter().map(|tape| tape.read().clone()).collect()),
        }
    }

    /// Executes one transition.
    ///
    /// # Returns
    ///
    /// * `Step::Continue` if the new state is not terminal.
    /// * `Step::Halt(_)` if the machine is now (or already was) in `ACCEPT` or `REJECT`.
    pub fn step(&mut self) -> Step {
        if let Some(halt) = self.halt() {
            return Step::Halt(halt);
        }

        let key = self.read_key();
        let outcome = self.program.lookup(&self.state, &key);
        trace!("{} on {} -> {}", self.state, key, outcome);
        outcome.apply(&mut self.tapes);
        self.state = outcome.next_state().to_string();
        self.step_count += 1;
        self.renderer.on_step(&self.state, &self.tapes);

        match self.halt() {
            Some(halt) => Step::Halt(halt),
            None => Step::Continue,
        }
    }

    /// Runs at most `max_steps` steps, in batches of `RUN_BATCH_SIZE`.
    ///
    /// Returns `Step::Continue` if the limit was reached before the machine halted.
    pub fn run(&mut self, max_steps: usize) -> Step {
        let mut remaining = max_steps;
        while remaining > 0 {
            let batch = remaining.min(RUN_BATCH_SIZE);
            for _ in 0..batch {
                if let Step::Halt(halt) = self.step() {
                    return Step::Halt(halt);
                }
            }
            remaining -= batch;
            trace!("{} steps executed, state {}", self.step_count, self.state);
        }
        Step::Continue
    }

    pub fn state(&self) -> &str {
        &self.state
    }

    pub fn is_terminal(&self) -> bool {
        self.halt().is_some()
    }

    pub fn halt(&self) -> Option<Halt> {
        Halt::from_state(&self.state)
    }

    pub fn step_count(&self) -> usize {
        self.step_count
    }

    /// The content and head of physical tape `index`.
    pub fn tape_snapshot(&self, index: usize) -> Option<TapeSnapshot> {
        self.tapes.get(index).map(Tape::snapshot)
    }

    pub fn tape_snapshots(&self) -> Vec<TapeSnapshot> {
        self.tapes.iter().map(Tape::snapshot).collect()
    }

    /// One snapshot per logical tape, decoded from the shared tape when simulating.
    pub fn logical_tapes(&self) -> Vec<TapeSnapshot> {
        match self.tapes.as_slice() {
            [tape] if self.program.is_simulated() => {
                decode_segments(tape.cells(), self.program.logical_tape_count())
            }
            tapes => tapes.iter().map(Tape::snapshot).collect(),
        }
    }

    /// Puts the machine back into a recorded configuration.
    pub fn restore(&mut self, record: &StepRecord) {
        self.state = record.state.clone();
        for (tape, snapshot) in self.tapes.iter_mut().zip(&record.tapes) {
            tape.restore(snapshot);
        }
    }

    pub fn program(&self) -> &CompiledMachine {
        &self.program
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }
}

impl TuringMachine<HistoryRenderer> {
    /// Undoes the last step. Returns false at the first recorded configuration.
    pub fn step_back(&mut self) -> bool {
        match self.renderer.previous() {
            Some(record) => {
                self.restore(&record);
                self.step_count = self.step_count.saturating_sub(1);
                true
            }
            None => false,
        }
    }
}
