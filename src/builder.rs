//! This module defines the `MachineBuilder`, which accepts high-level transition requests and
//! lowers them onto the features that are enabled.
//!
//! Anything the feature set cannot express directly is synthesized: extra states for
//! unsupported movements, individual entries for unsupported multi-match and wildcard
//! targets, state chains for disabled gadgets, and the multi-tape simulation protocol.
//! Every synthesized state name is wrapped in the guard token, which grows whenever a
//! user-supplied name contains it.

use log::debug;
use std::collections::HashMap;

use crate::alphabet::Alphabet;
use crate::cell::{Cell, Movement, MultiTarget, Output, Target};
use crate::features::{Feature, FeatureSet};
use crate::gadgets::Gadget;
use crate::machine::CompiledMachine;
use crate::table::TransitionTable;
use crate::types::{BuildError, TableError, GUARD_TOKEN, START_STATE};
use crate::update::{Outcome, TapeUpdate};

/// How many tapes the machine being built uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TapeMode {
    /// No transition was added yet.
    Unset,
    Single,
    Multi(usize),
}

/// The families of memoized synthesized states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum SynthesisKind {
    Continuation,
    Paste,
    FirstCellMarker,
    InsertAfterMarker,
    MultiMove,
}

/// Canonical signature of a synthesized state: its family plus the rendered parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct SynthesisKey {
    kind: SynthesisKind,
    parts: Vec<String>,
}

impl SynthesisKey {
    pub(crate) fn new<I, S>(kind: SynthesisKind, parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: ToString,
    {
        Self {
            kind,
            parts: parts.into_iter().map(|part| part.to_string()).collect(),
        }
    }

    fn rename_guard(&mut self, old: &str, new: &str) {
        for part in &mut self.parts {
            *part = rename(part, old, new);
        }
    }
}

fn rename(name: &str, old: &str, new: &str) -> String {
    if name.contains(old) {
        name.replace(old, new)
    } else {
        name.to_string()
    }
}

/// Builds a machine from high-level transition requests.
///
/// Configuration (features and alphabets) must happen before the first state is defined.
/// All registration calls complete before `compile` hands the tables to an interpreter.
#[derive(Debug, Clone)]
pub struct MachineBuilder {
    pub(crate) start_state: String,
    pub(crate) features: FeatureSet,
    pub(crate) alphabet: Alphabet,
    pub(crate) states: HashMap<String, TransitionTable>,
    /// State names in creation order, for listings.
    pub(crate) order: Vec<String>,
    pub(crate) guard: String,
    pub(crate) synthesized: HashMap<SynthesisKey, String>,
    pub(crate) tape_mode: TapeMode,
}

impl Default for MachineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MachineBuilder {
    /// Creates a builder whose machine starts in `qstart`.
    pub fn new() -> Self {
        Self::with_start_state(START_STATE)
    }

    pub fn with_start_state(start_state: &str) -> Self {
        Self {
            start_state: start_state.to_string(),
            features: FeatureSet::new(),
            alphabet: Alphabet::default(),
            states: HashMap::new(),
            order: Vec::new(),
            guard: GUARD_TOKEN.to_string(),
            synthesized: HashMap::new(),
            tape_mode: TapeMode::Unset,
        }
    }

    fn ensure_configurable(&self) -> Result<(), BuildError> {
        if !self.order.is_empty() || self.tape_mode != TapeMode::Unset {
            return Err(BuildError::ConfigurationLocked);
        }
        Ok(())
    }

    /// Declares the input symbols and any extra symbols the machine may write.
    ///
    /// The empty cell is always added.
    pub fn declare_alphabets<I, E>(&mut self, input: I, extra: E) -> Result<&mut Self, BuildError>
    where
        I: IntoIterator,
        I::Item: Into<Cell>,
        E: IntoIterator,
        E::Item: Into<Cell>,
    {
        self.ensure_configurable()?;
        self.alphabet = Alphabet::new(
            input.into_iter().map(Into::into).collect(),
            extra.into_iter().map(Into::into).collect(),
        );
        Ok(self)
    }

    pub fn enable_features<I>(&mut self, features: I) -> Result<&mut Self, BuildError>
    where
        I: IntoIterator<Item = Feature>,
    {
        self.ensure_configurable()?;
        for feature in features {
            self.features.enable(feature)?;
        }
        Ok(self)
    }

    /// Enables features by canonical (`feature-wildcard`) or short (`wildcard`) name.
    pub fn enable_features_by_name(&mut self, names: &[&str]) -> Result<&mut Self, BuildError> {
        let features = names
            .iter()
            .map(|name| name.parse::<Feature>())
            .collect::<Result<Vec<_>, _>>()?;
        self.enable_features(features)
    }

    pub fn features(&self) -> &FeatureSet {
        &self.features
    }

    pub fn alphabet(&self) -> &Alphabet {
        &self.alphabet
    }

    /// The current guard token wrapped around synthesized state names.
    pub fn guard(&self) -> &str {
        &self.guard
    }

    pub fn start_state(&self) -> &str {
        &self.start_state
    }

    /// Number of logical tapes; 1 until `set_tape_count` is called.
    pub fn tape_count(&self) -> usize {
        match self.tape_mode {
            TapeMode::Multi(count) => count,
            TapeMode::Unset | TapeMode::Single => 1,
        }
    }

    /// Returns a handle for adding transitions from `name`, creating the state if needed.
    pub fn state(&mut self, name: &str) -> StateHandle<'_> {
        self.check_guard(name);
        self.ensure_state(name);
        StateHandle {
            builder: self,
            name: name.to_string(),
        }
    }

    /// State names in creation order.
    pub fn state_names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn transitions(&self, state: &str) -> Option<&TransitionTable> {
        self.states.get(state)
    }

    /// Adds a single-tape transition from `from_state`.
    ///
    /// # Arguments
    ///
    /// * `from_state` - The state the transition leaves.
    /// * `from` - A symbol, several symbols, or the wildcard.
    /// * `to` - The symbol to write, or `Output::NoChange`.
    /// * `movement` - Any number of cells; unsupported movements are split.
    /// * `next` - The state to continue in.
    pub fn add_transition(
        &mut self,
        from_state: &str,
        from: Target,
        to: Output,
        movement: Movement,
        next: &str,
    ) -> Result<(), BuildError> {
        self.claim_single_tape("add_transition")?;
        self.check_guard(next);
        self.check_guard(from_state);
        self.lower_transition(from_state, from, to, movement, next)
    }

    /// Adds a gadget transition from `from_state`.
    pub fn add_gadget(
        &mut self,
        from_state: &str,
        from: Target,
        gadget: Gadget,
        next: &str,
    ) -> Result<(), BuildError> {
        self.claim_single_tape("add_gadget")?;
        self.check_guard(from_state);
        self.check_guard(next);
        self.lower_gadget(from_state, from, gadget, next)
    }

    fn claim_single_tape(&mut self, call: &'static str) -> Result<(), BuildError> {
        match self.tape_mode {
            TapeMode::Unset => {
                self.tape_mode = TapeMode::Single;
                Ok(())
            }
            TapeMode::Single => Ok(()),
            TapeMode::Multi(_) => Err(BuildError::RequiresSingleTape(call)),
        }
    }

    /// Finishes building and hands the tables to a read-only compiled machine.
    pub fn compile(self) -> CompiledMachine {
        let (logical, physical) = match self.tape_mode {
            TapeMode::Multi(count) if self.features.is_enabled(Feature::MultiTape) => {
                (count, count)
            }
            TapeMode::Multi(count) => (count, 1),
            TapeMode::Unset | TapeMode::Single => (1, 1),
        };
        debug!(
            "compiled {} states, {} logical / {} physical tapes",
            self.states.len(),
            logical,
            physical
        );
        CompiledMachine::new(
            self.start_state,
            self.states,
            self.order,
            self.alphabet,
            self.features,
            logical,
            physical,
        )
    }

    /// Grows the guard if a user-supplied name contains it, renaming every synthesized
    /// state so the two can never collide.
    pub(crate) fn check_guard(&mut self, name: &str) {
        if !name.contains(&self.guard) {
            return;
        }
        let mut grown = format!("{}{}", self.guard, GUARD_TOKEN);
        while name.contains(&grown) {
            grown.push_str(GUARD_TOKEN);
        }
        debug!("guard grows from {} to {} for {}", self.guard, grown, name);
        let old = std::mem::replace(&mut self.guard, grown);
        self.rename_guard(&old);
    }

    fn rename_guard(&mut self, old: &str) {
        let new = self.guard.clone();
        let states = std::mem::take(&mut self.states);
        self.states = states
            .into_iter()
            .map(|(name, mut table)| {
                table.rename_guard(old, &new);
                (rename(&name, old, &new), table)
            })
            .collect();
        for name in &mut self.order {
            *name = rename(name, old, &new);
        }
        let synthesized = std::mem::take(&mut self.synthesized);
        self.synthesized = synthesized
            .into_iter()
            .map(|(mut key, name)| {
                key.rename_guard(old, &new);
                (key, rename(&name, old, &new))
            })
            .collect();
        self.alphabet.rename_guard(old, &new);
        self.start_state = rename(&self.start_state, old, &new);
    }

    pub(crate) fn ensure_state(&mut self, name: &str) {
        if !self.states.contains_key(name) {
            self.order.push(name.to_string());
            self.states.insert(name.to_string(), TransitionTable::new());
        }
    }

    pub(crate) fn has_state(&self, name: &str) -> bool {
        self.states.contains_key(name)
    }

    /// Runs `define` against the table of `state`, attributing failures to the state.
    pub(crate) fn define<F>(&mut self, state: &str, define: F) -> Result<(), BuildError>
    where
        F: FnOnce(&mut TransitionTable, &Alphabet) -> Result<(), TableError>,
    {
        self.ensure_state(state);
        let table = self.states.entry(state.to_string()).or_default();
        define(table, &self.alphabet).map_err(|source| BuildError::Transition {
            state: state.to_string(),
            source,
        })
    }

    pub(crate) fn lookup(&self, state: &str, cell: &Cell) -> Option<&Outcome> {
        self.states.get(state).and_then(|table| table.lookup(cell))
    }

    /// Machine symbols not yet resolved by any tier of `state`.
    pub(crate) fn unmatched_symbols(&self, state: &str) -> Vec<Cell> {
        match self.states.get(state) {
            Some(table) => table.unmatched(self.alphabet.whole()),
            None => self.alphabet.whole().to_vec(),
        }
    }

    /// Returns the memoized state for `key` and whether it was just created.
    ///
    /// New states are named by `name`, which receives the current guard.
    pub(crate) fn synthesized_state<F>(&mut self, key: SynthesisKey, name: F) -> (String, bool)
    where
        F: FnOnce(&str) -> String,
    {
        if let Some(existing) = self.synthesized.get(&key) {
            return (existing.clone(), false);
        }
        let state = name(&self.guard);
        debug!("synthesized state {state}");
        self.synthesized.insert(key, state.clone());
        (state, true)
    }

    /// Lowers a single-tape transition without any guard or tape-count checks.
    pub(crate) fn lower_transition(
        &mut self,
        from_state: &str,
        from: Target,
        to: Output,
        movement: Movement,
        next: &str,
    ) -> Result<(), BuildError> {
        if self.features.supports_movement(movement) {
            return self.define_supported(from_state, from, to, movement, next);
        }
        // A zero move becomes a right step followed by a left step
        let (step, remainder) = if movement == Movement::N {
            (Movement::R, Movement::L)
        } else {
            movement.split()
        };
        let continuation = self.continuation_state(remainder, next)?;
        self.define_supported(from_state, from, to, step, &continuation)
    }

    /// The state that finishes `remainder` and then jumps to `next`.
    fn continuation_state(&mut self, remainder: Movement, next: &str) -> Result<String, BuildError> {
        let key = SynthesisKey::new(
            SynthesisKind::Continuation,
            [remainder.to_string(), next.to_string()],
        );
        let (state, fresh) =
            self.synthesized_state(key, |g| format!("{g}_{remainder}_{g}_{next}_{g}"));
        if fresh {
            self.lower_transition(&state, Target::Wildcard, Output::NoChange, remainder, next)?;
        }
        Ok(state)
    }

    /// Registers a transition whose movement is supported, expanding wildcard and
    /// multi-match targets the feature set cannot hold.
    fn define_supported(
        &mut self,
        from_state: &str,
        from: Target,
        to: Output,
        movement: Movement,
        next: &str,
    ) -> Result<(), BuildError> {
        match from {
            Target::Cell(cell) => {
                let outcome = Outcome::single(TapeUpdate::write(to.resolve(&cell), movement), next);
                self.define(from_state, |table, alphabet| {
                    table.define_exact(cell, outcome, alphabet)
                })
            }
            Target::OneOf(cells) => self.define_one_of(from_state, cells, to, movement, next),
            Target::Wildcard if self.features.is_enabled(Feature::Wildcard) => {
                let outcome = Outcome::single(update_for(&to, movement), next);
                self.define(from_state, |table, _| table.define_wildcard(outcome))
            }
            Target::Wildcard => {
                let remaining = self.unmatched_symbols(from_state);
                self.define_one_of(from_state, remaining, to, movement, next)
            }
        }
    }

    fn define_one_of(
        &mut self,
        from_state: &str,
        cells: Vec<Cell>,
        to: Output,
        movement: Movement,
        next: &str,
    ) -> Result<(), BuildError> {
        let grouped = self.features.is_enabled(Feature::MultiMatch)
            && (to != Output::NoChange || self.features.is_enabled(Feature::MultiMatchNoChange));
        if !grouped {
            for cell in cells {
                let outcome = Outcome::single(TapeUpdate::write(to.resolve(&cell), movement), next);
                self.define(from_state, |table, alphabet| {
                    table.define_exact(cell, outcome, alphabet)
                })?;
            }
            return Ok(());
        }
        if cells.is_empty() {
            debug!("nothing left to match in {from_state}");
            self.ensure_state(from_state);
            return Ok(());
        }
        let outcome = Outcome::single(update_for(&to, movement), next);
        self.define(from_state, |table, alphabet| {
            table.define_multi_match(cells, outcome, None, alphabet)
        })
    }
}

/// The update for a target that may share its outcome across symbols.
pub(crate) fn update_for(to: &Output, movement: Movement) -> TapeUpdate {
    match to {
        Output::Cell(cell) => TapeUpdate::write(cell.clone(), movement),
        Output::NoChange => TapeUpdate::preserve(movement),
    }
}

/// Adds transitions from one state; created by `MachineBuilder::state`.
///
/// Every method returns the handle again so definitions can be chained with `?`.
#[derive(Debug)]
pub struct StateHandle<'a> {
    builder: &'a mut MachineBuilder,
    name: String,
}

impl StateHandle<'_> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn transition(
        &mut self,
        from: impl Into<Target>,
        to: impl Into<Output>,
        movement: Movement,
        next: &str,
    ) -> Result<&mut Self, BuildError> {
        self.builder
            .add_transition(&self.name, from.into(), to.into(), movement, next)?;
        Ok(self)
    }

    pub fn gadget(
        &mut self,
        from: impl Into<Target>,
        gadget: Gadget,
        next: &str,
    ) -> Result<&mut Self, BuildError> {
        self.builder
            .add_gadget(&self.name, from.into(), gadget, next)?;
        Ok(self)
    }

    pub fn multi_tape_transition(
        &mut self,
        from: impl Into<MultiTarget>,
        to: Vec<Output>,
        moves: Vec<Movement>,
        next: &str,
    ) -> Result<&mut Self, BuildError> {
        self.builder
            .add_multi_tape_transition(&self.name, from.into(), to, moves, next)?;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::TuringMachine;
    use crate::types::{Halt, STATE_ACCEPT, STATE_REJECT};

    fn builder(features: &[Feature], input: &str) -> MachineBuilder {
        let mut builder = MachineBuilder::new();
        builder
            .declare_alphabets(input.chars(), std::iter::empty::<char>())
            .unwrap()
            .enable_features(features.iter().copied())
            .unwrap();
        builder
    }

    #[test]
    fn test_configuration_locked_after_first_state() {
        let mut builder = builder(&[], "ab");
        builder.state("qstart");

        assert_eq!(
            builder.enable_features([Feature::Wildcard]).unwrap_err(),
            BuildError::ConfigurationLocked
        );
        assert!(builder.declare_alphabets("x".chars(), "".chars()).is_err());
    }

    #[test]
    fn test_multimatch_expands_without_feature() {
        let mut builder = builder(&[], "0123456789");
        builder
            .state("qstart")
            .transition(Target::chars("13579"), '1', Movement::R, "qstart")
            .unwrap();

        let table = builder.transitions("qstart").unwrap();
        assert_eq!(table.entries().len(), 5);
        let outcome = table.lookup(&Cell::from('7')).unwrap();
        assert_eq!(outcome.to_string(), "1 [move 1R] [next state: qstart]");
    }

    #[test]
    fn test_multimatch_no_change_needs_its_own_feature() {
        let mut builder = builder(&[Feature::MultiMatch], "0123");
        builder
            .state("qstart")
            .transition(Target::chars("02"), Output::NoChange, Movement::R, "qstart")
            .unwrap()
            .transition(Target::chars("13"), '1', Movement::R, "qstart")
            .unwrap();

        let table = builder.transitions("qstart").unwrap();
        // Two individual no-change entries plus one group
        assert_eq!(table.entries().len(), 3);
        assert_eq!(
            table.lookup(&Cell::from('2')).unwrap().to_string(),
            "2 [move 1R] [next state: qstart]"
        );
    }

    #[test]
    fn test_wildcard_expands_over_remaining_symbols() {
        let mut builder = builder(&[Feature::MultiMatch, Feature::MultiMatchNoChange], "ab0");
        builder
            .state("qstart")
            .transition('0', '0', Movement::R, STATE_ACCEPT)
            .unwrap()
            .transition(Target::Wildcard, Output::NoChange, Movement::R, "qstart")
            .unwrap();

        let table = builder.transitions("qstart").unwrap();
        assert!(!table.has_wildcard());
        assert_eq!(
            table.developer_display()[1],
            "a,b,{e} ⟶ [no change] [move 1R] [next state: qstart]"
        );
    }

    #[test]
    fn test_wildcard_after_multimatch_fails_on_redefinition() {
        let mut builder = builder(&[Feature::MultiMatch, Feature::Wildcard], "ab");
        builder
            .state("qstart")
            .transition(Target::Wildcard, 'a', Movement::R, "qstart")
            .unwrap();

        let error = builder
            .state("qstart")
            .transition(Target::chars("ab"), 'b', Movement::R, "qstart")
            .unwrap_err();
        assert_eq!(
            error,
            BuildError::Transition {
                state: "qstart".to_string(),
                source: TableError::AfterWildcard("a".to_string()),
            }
        );

        let error = builder
            .state("qstart")
            .transition(Target::Wildcard, 'b', Movement::R, "qstart")
            .unwrap_err();
        assert!(matches!(
            error,
            BuildError::Transition {
                source: TableError::WildcardRedefined,
                ..
            }
        ));
    }

    #[test]
    fn test_unsupported_moves_synthesize_continuations() {
        let mut builder = builder(&[Feature::Wildcard], "a");
        builder
            .state("qstart")
            .transition('a', 'a', Movement::N, STATE_ACCEPT)
            .unwrap()
            .transition(Cell::EMPTY, Cell::EMPTY, Movement::right(3), STATE_REJECT)
            .unwrap();

        let stay = "Ω_1L_Ω_ACCEPT_Ω";
        assert_eq!(
            builder.lookup("qstart", &Cell::from('a')).unwrap().next_state(),
            stay
        );
        assert_eq!(
            builder.transitions(stay).unwrap().developer_display(),
            vec!["{*} ⟶ [no change] [move 1L] [next state: ACCEPT]".to_string()]
        );

        // 3R -> 1R, then 2R -> 1R, then 1R
        let first = builder.lookup("qstart", &Cell::EMPTY).unwrap().next_state().to_string();
        assert_eq!(first, "Ω_2R_Ω_REJECT_Ω");
        let second = builder.lookup(&first, &Cell::EMPTY).unwrap().next_state().to_string();
        assert_eq!(second, "Ω_1R_Ω_REJECT_Ω");
        assert_eq!(
            builder.lookup(&second, &Cell::EMPTY).unwrap().next_state(),
            STATE_REJECT
        );
    }

    #[test]
    fn test_continuations_are_shared() {
        let mut builder = builder(&[Feature::Wildcard], "ab");
        builder
            .state("qstart")
            .transition('a', 'a', Movement::N, "q1")
            .unwrap()
            .transition('b', 'b', Movement::N, "q1")
            .unwrap();
        builder
            .state("q1")
            .transition('a', 'b', Movement::N, "q1")
            .unwrap();

        let continuations = builder
            .state_names()
            .filter(|name| name.starts_with(GUARD_TOKEN))
            .count();
        assert_eq!(continuations, 1);
    }

    #[test]
    fn test_guard_grows_and_renames() {
        let mut builder = builder(&[Feature::Wildcard], "a");
        builder
            .state("qstart")
            .transition('a', 'a', Movement::N, "q1")
            .unwrap();
        assert!(builder.has_state("Ω_1L_Ω_q1_Ω"));

        builder
            .state("Ωuser")
            .transition('a', 'a', Movement::N, "q1")
            .unwrap();

        assert_eq!(builder.guard(), "ΩΩ");
        assert!(!builder.has_state("Ω_1L_Ω_q1_Ω"));
        assert!(builder.has_state("ΩΩ_1L_ΩΩ_q1_ΩΩ"));
        assert!(builder.has_state("Ωuser"));
        assert_eq!(
            builder.lookup("qstart", &Cell::from('a')).unwrap().next_state(),
            "ΩΩ_1L_ΩΩ_q1_ΩΩ"
        );
        // The renamed continuation is reused, not duplicated
        assert_eq!(
            builder.lookup("Ωuser", &Cell::from('a')).unwrap().next_state(),
            "ΩΩ_1L_ΩΩ_q1_ΩΩ"
        );
    }

    #[test]
    fn test_guard_skips_names_containing_longer_tokens() {
        let mut builder = builder(&[], "a");
        builder.state("xΩΩy");
        assert_eq!(builder.guard(), "ΩΩΩ");
    }

    #[test]
    fn test_single_tape_calls_block_tape_count() {
        let mut builder = builder(&[], "a");
        builder
            .state("qstart")
            .transition('a', 'a', Movement::R, STATE_ACCEPT)
            .unwrap();

        assert_eq!(
            builder.set_tape_count(2, "q0").unwrap_err(),
            BuildError::TapeCountAfterSingleTape
        );
    }

    #[test]
    fn test_invalid_target_symbol() {
        let mut builder = builder(&[], "a");
        let error = builder
            .state("qstart")
            .transition('z', 'a', Movement::R, STATE_ACCEPT)
            .unwrap_err();

        assert_eq!(error.to_string(), "Transition from state qstart: z is not part of the tape alphabet");
    }

    /// Where the head ends after a jump by `offset` from cell 3.
    fn jump_end(features: &[Feature], offset: isize) -> (Option<Halt>, usize) {
        let mut builder = builder(features, "a");
        builder
            .state("qstart")
            .transition('a', Output::NoChange, Movement::right(3), "qjump")
            .unwrap();
        builder
            .state("qjump")
            .transition(Target::Wildcard, Output::NoChange, Movement::new(offset), STATE_ACCEPT)
            .unwrap();

        let mut machine = TuringMachine::new(builder.compile());
        machine.load("aaaaaa");
        machine.run(100);
        let head = machine.tape_snapshot(0).map(|tape| tape.head).unwrap_or_default();
        (machine.halt(), head)
    }

    proptest::proptest! {
        #[test]
        fn test_split_moves_match_direct_moves(offset in -5isize..=5) {
            let split = jump_end(&[], offset);
            let direct = jump_end(&[Feature::MoveNone, Feature::MoveMulti, Feature::Wildcard], offset);

            proptest::prop_assert_eq!(split, direct);
            proptest::prop_assert_eq!(direct.1, (3 + offset).max(0) as usize);
        }
    }
}
