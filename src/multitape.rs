//! Multi-tape machines.
//!
//! With real tapes enabled, a transition key is the tuple of the cells under every head.
//! Otherwise all logical tapes share one physical tape:
//!
//! ```text
//! {^^} Q:{state} {<} a b̄ c {e} {>} {<} {ē} {>} ... {$$}
//! ```
//!
//! Each logical tape is a segment between `{<}` and `{>}` with exactly one head-tagged
//! cell. A simulated step writes the current state name after `{^^}`, scans right for
//! the head of every tape in order, applies the updates right to left while re-tagging
//! the heads, records the next state, and finally grows every segment whose head ran
//! onto its right boundary.

use log::debug;

use crate::builder::{update_for, MachineBuilder, SynthesisKey, SynthesisKind, TapeMode};
use crate::cell::{Cell, Movement, MultiTarget, Output, Symbol, Target};
use crate::features::Feature;
use crate::gadgets::Gadget;
use crate::tape::TapeSnapshot;
use crate::types::{BuildError, STATE_ACCEPT, STATE_REJECT};
use crate::update::{Outcome, TapeUpdate};

fn process_state(guard: &str) -> String {
    format!("{guard}_process")
}

fn insertions_state(guard: &str) -> String {
    format!("{guard}_doEmptyCellInsertions")
}

/// Every combination that picks one cell from each list, first list varying slowest.
fn cartesian(choices: &[Vec<Cell>]) -> Vec<Vec<Cell>> {
    choices.iter().fold(vec![Vec::new()], |combos, options| {
        combos
            .iter()
            .flat_map(|prefix| {
                options.iter().map(move |cell| {
                    let mut combo = prefix.clone();
                    combo.push(cell.clone());
                    combo
                })
            })
            .collect()
    })
}

/// Replaces every `NoChange` with the cell read on the same tape.
fn substitute(to: &[Output], combo: &[Cell]) -> Vec<Cell> {
    to.iter()
        .zip(combo)
        .map(|(output, cell)| output.resolve(cell))
        .collect()
}

/// Names of the search and apply states of one simulated transition.
///
/// Search states are shared by every transition of the same origin whose first targets
/// agree; apply states by every transition into the same state whose first updates agree.
struct SimulationNames {
    guard: String,
    search: String,
    apply: String,
    targets: Vec<String>,
    steps: Vec<String>,
}

impl SimulationNames {
    fn new(guard: &str, origin: &str, next: &str, combo: &[Cell], writes: &[Cell], moves: &[Movement]) -> Self {
        Self {
            guard: guard.to_string(),
            search: format!("{guard}s_{origin}{guard}"),
            apply: format!("{guard}a_{next}{guard}"),
            targets: combo.iter().map(Cell::to_string).collect(),
            steps: writes
                .iter()
                .zip(moves)
                .map(|(write, movement)| format!("{write},{movement}"))
                .collect(),
        }
    }

    fn tape_count(&self) -> usize {
        self.targets.len()
    }

    /// The state looking for the head of tape `k`; after the last tape, the first apply state.
    fn finding(&self, k: usize) -> String {
        let g = &self.guard;
        match k {
            0 => self.search.clone(),
            k if k == self.tape_count() => self.applying(k),
            k => {
                let found = self.targets[..k]
                    .iter()
                    .map(|target| format!("_{g}{target}{g}"))
                    .collect::<String>();
                format!("{}_f{found}", self.search)
            }
        }
    }

    /// The state applying the update of tape `tapes - 1`; with zero tapes, the state that
    /// returns to the start and records the next state.
    fn applying(&self, tapes: usize) -> String {
        if tapes == 0 {
            return self.apply.clone();
        }
        let g = &self.guard;
        let steps = self.steps[..tapes]
            .iter()
            .map(|step| format!("_{g}{step}{g}"))
            .collect::<String>();
        format!("{}_p{steps}", self.apply)
    }

    fn mark_head(&self, tapes: usize) -> String {
        format!("{}-markHead", self.applying(tapes))
    }
}

impl MachineBuilder {
    /// Switches the machine to `count` tapes, starting in `first_state`.
    ///
    /// Without real tapes this also registers the states that lay out the simulated tapes
    /// and grow them between steps.
    pub fn set_tape_count(&mut self, count: usize, first_state: &str) -> Result<(), BuildError> {
        if count <= 1 {
            return Err(BuildError::InvalidTapeCount(count));
        }
        match self.tape_mode {
            TapeMode::Single => return Err(BuildError::TapeCountAfterSingleTape),
            TapeMode::Multi(_) => return Err(BuildError::TapeCountAlreadySet),
            TapeMode::Unset => {}
        }
        self.check_guard(first_state);
        self.tape_mode = TapeMode::Multi(count);

        if self.features.is_enabled(Feature::MultiTape) {
            debug!("using {count} real tapes");
            self.start_state = first_state.to_string();
            self.ensure_state(first_state);
            return Ok(());
        }
        debug!("simulating {count} tapes on one tape");
        self.alphabet.close_for_simulation();
        self.alphabet.add_state_symbol(first_state);
        self.alphabet.add_state_symbol(STATE_ACCEPT);
        self.alphabet.add_state_symbol(STATE_REJECT);
        self.lay_out_tapes(count, first_state)?;
        self.grow_segments()
    }

    /// Turns the input into `count` segments, tags the first cell of each as its head and
    /// hands over to `first_state`.
    fn lay_out_tapes(&mut self, count: usize, first_state: &str) -> Result<(), BuildError> {
        let g = self.guard.clone();
        let init = |name: &str| format!("{g}_init_{name}");
        let start = self.start_state.clone();
        let process = process_state(&g);

        self.lower_gadget(
            &start,
            Target::Wildcard,
            Gadget::FirstCellMarker { marker: Cell::START },
            &init("insertLeftBound"),
        )?;
        self.lower_gadget(
            &init("insertLeftBound"),
            Target::Wildcard,
            Gadget::InsertAfterMarker {
                marker: Cell::START,
                insert: Cell::BOUND_L,
            },
            &init("insertEmpty"),
        )?;
        // The empty cell after {^^} holds the state name between steps
        self.lower_gadget(
            &init("insertEmpty"),
            Target::Wildcard,
            Gadget::InsertAfterMarker {
                marker: Cell::START,
                insert: Cell::EMPTY,
            },
            &init("findEnd"),
        )?;

        let find_end = init("findEnd");
        self.lower_transition(&find_end, Cell::EMPTY.into(), Cell::EMPTY.into(), Movement::R, &init("afterEnd"))?;
        self.lower_transition(&find_end, Target::Wildcard, Output::NoChange, Movement::R, &find_end)?;

        // Skip over the space of the remaining segments: {<} {ē} {>} each
        self.lower_transition(
            &init("afterEnd"),
            Cell::EMPTY.into(),
            Cell::BOUND_R.into(),
            Movement::right((count - 1) * 3 + 1),
            &init("afterLast"),
        )?;
        self.lower_transition(&init("afterLast"), Cell::EMPTY.into(), Cell::AFTER_LAST.into(), Movement::L, &init("atBoundR"))?;

        // Fill the remaining segments backwards
        self.lower_transition(&init("atBoundR"), Cell::EMPTY.into(), Cell::BOUND_R.into(), Movement::L, &init("atExtraHead"))?;
        self.lower_transition(&init("atBoundR"), Cell::BOUND_R.into(), Cell::BOUND_R.into(), Movement::L, &init("findStart"))?;
        self.lower_transition(
            &init("atExtraHead"),
            Cell::EMPTY.into(),
            Cell::EMPTY.as_head().into(),
            Movement::L,
            &init("atBoundL"),
        )?;
        self.lower_transition(&init("atBoundL"), Cell::EMPTY.into(), Cell::BOUND_L.into(), Movement::L, &init("atBoundR"))?;

        let find_start = init("findStart");
        self.lower_transition(&find_start, Cell::START.into(), Cell::START.into(), Movement::R, &init("atStart"))?;
        self.lower_transition(&find_start, Target::Wildcard, Output::NoChange, Movement::L, &find_start)?;

        self.lower_transition(
            &init("atStart"),
            Cell::EMPTY.into(),
            Cell::state(first_state).into(),
            Movement::right(2),
            &init("markFirstHead"),
        )?;
        for cell in self.alphabet.developer().to_vec() {
            self.lower_transition(
                &init("markFirstHead"),
                Target::Cell(cell.clone()),
                Output::Cell(cell.as_head()),
                Movement::left(2),
                &process,
            )?;
        }
        self.ensure_state(&process);
        Ok(())
    }

    /// Registers the pass that runs after every simulated step: each segment whose head sits
    /// on its right boundary gets a new empty cell, then the recorded state is resumed.
    fn grow_segments(&mut self) -> Result<(), BuildError> {
        let g = self.guard.clone();
        let pre = insertions_state(&g);
        let state = |name: &str| format!("{pre}-{name}");
        let head_on_bound = Cell::BOUND_R.as_head();

        let developer = self.alphabet.developer().to_vec();
        let heads = self.alphabet.tape_heads().to_vec();
        let tape_content = || {
            developer
                .iter()
                .chain(&heads)
                .cloned()
                .chain([Cell::BOUND_L, Cell::BOUND_R])
                .collect::<Vec<_>>()
        };

        self.lower_transition(&pre, Cell::BOUND_L.into(), Cell::BOUND_L.into(), Movement::R, &state("search"))?;

        let search = state("search");
        self.lower_transition(&search, Target::OneOf(tape_content()), Output::NoChange, Movement::R, &search)?;
        self.lower_transition(&search, Cell::AFTER_LAST.into(), Cell::AFTER_LAST.into(), Movement::L, &state("done"))?;
        self.lower_transition(&search, head_on_bound.clone().into(), head_on_bound.clone().into(), Movement::R, &state("findToGrab"))?;

        let find_to_grab = state("findToGrab");
        let mut passable = tape_content();
        passable.push(head_on_bound.clone());
        self.lower_transition(&find_to_grab, Target::OneOf(passable), Output::NoChange, Movement::R, &find_to_grab)?;
        self.lower_transition(
            &find_to_grab,
            Cell::AFTER_LAST.into(),
            Cell::AFTER_LAST.into(),
            Movement::N,
            &state("foundToGrab"),
        )?;

        self.lower_gadget(
            &state("foundToGrab"),
            Target::Wildcard,
            Gadget::InsertAfterMarker {
                marker: head_on_bound.clone(),
                insert: Cell::BOUND_R,
            },
            &state("justInserted"),
        )?;
        self.lower_transition(
            &state("justInserted"),
            Target::OneOf(vec![Cell::BOUND_L, Cell::AFTER_LAST]),
            Output::NoChange,
            Movement::left(2),
            &state("nowMakeEmptyHead"),
        )?;
        self.lower_transition(
            &state("nowMakeEmptyHead"),
            head_on_bound.clone().into(),
            Cell::EMPTY.as_head().into(),
            Movement::L,
            &state("done"),
        )?;

        let done = state("done");
        self.lower_transition(&done, Target::OneOf(tape_content()), Output::NoChange, Movement::L, &done)?;
        self.lower_transition(&done, head_on_bound.clone().into(), head_on_bound.into(), Movement::R, &find_to_grab)?;
        for terminal in [STATE_ACCEPT, STATE_REJECT] {
            let recorded = Cell::state(terminal);
            self.lower_transition(&done, recorded.clone().into(), recorded.into(), Movement::N, terminal)?;
        }
        Ok(())
    }

    /// Adds a transition reading one target per tape.
    ///
    /// # Arguments
    ///
    /// * `from_state` - The state the transition leaves.
    /// * `from` - The global wildcard, or one target per tape.
    /// * `to` - One output per tape.
    /// * `moves` - One movement per tape.
    /// * `next` - The state to continue in.
    pub fn add_multi_tape_transition(
        &mut self,
        from_state: &str,
        from: MultiTarget,
        to: Vec<Output>,
        moves: Vec<Movement>,
        next: &str,
    ) -> Result<(), BuildError> {
        const CALL: &str = "add_multi_tape_transition";
        let TapeMode::Multi(count) = self.tape_mode else {
            return Err(BuildError::RequiresMultipleTapes(CALL));
        };
        let arity = |actual: usize, what: &'static str| {
            if actual == count {
                Ok(())
            } else {
                Err(BuildError::TapeArity {
                    call: CALL,
                    expected: count,
                    actual,
                    what,
                })
            }
        };
        if let MultiTarget::Tapes(targets) = &from {
            arity(targets.len(), "targets")?;
        }
        arity(to.len(), "outputs")?;
        arity(moves.len(), "movements")?;

        self.check_guard(from_state);
        self.check_guard(next);
        self.lower_multi(from_state, from, to, moves, next)
    }

    fn lower_multi(
        &mut self,
        from_state: &str,
        from: MultiTarget,
        to: Vec<Output>,
        moves: Vec<Movement>,
        next: &str,
    ) -> Result<(), BuildError> {
        let moves_directly = self.features.is_enabled(Feature::MoveMulti)
            && self.features.is_enabled(Feature::MultiTape);
        if !moves_directly && moves.iter().any(|movement| movement.is_multi_cell()) {
            let (firsts, laters): (Vec<_>, Vec<_>) =
                moves.iter().map(|movement| movement.split()).unzip();
            let remaining = laters
                .iter()
                .map(Movement::to_string)
                .collect::<Vec<_>>()
                .join(",");
            let key = SynthesisKey::new(SynthesisKind::MultiMove, [remaining.clone(), next.to_string()]);
            let (continuation, fresh) =
                self.synthesized_state(key, |g| format!("{g}_{remaining}_{g}_{next}_{g}"));
            if fresh {
                let keep = vec![Output::NoChange; to.len()];
                self.lower_multi(&continuation, MultiTarget::Wildcard, keep, laters, next)?;
            }
            return self.lower_multi(from_state, from, to, firsts, &continuation);
        }

        if self.features.is_enabled(Feature::MultiTape) {
            self.real_multi(from_state, from, to, moves, next)
        } else {
            self.simulated_multi(from_state, from, to, moves, next)
        }
    }

    fn real_multi(
        &mut self,
        from_state: &str,
        from: MultiTarget,
        to: Vec<Output>,
        moves: Vec<Movement>,
        next: &str,
    ) -> Result<(), BuildError> {
        let targets = match from {
            MultiTarget::Wildcard if self.features.is_enabled(Feature::Wildcard) => {
                let outcome = Outcome::new(updates(&to, &moves), next);
                return self.define(from_state, |table, _| table.define_wildcard(outcome));
            }
            MultiTarget::Wildcard => vec![Target::Wildcard; to.len()],
            MultiTarget::Tapes(targets) => targets,
        };

        if targets.iter().all(|target| matches!(target, Target::Cell(_))) {
            let cells = targets
                .into_iter()
                .filter_map(|target| match target {
                    Target::Cell(cell) => Some(cell),
                    _ => None,
                })
                .collect();
            let outcome = Outcome::new(updates(&to, &moves), next);
            return self.define(from_state, |table, alphabet| {
                table.define_exact(Cell::tuple(cells), outcome, alphabet)
            });
        }

        let whole = self.alphabet.whole().to_vec();
        let choices = targets
            .iter()
            .map(|target| match target {
                Target::Cell(cell) => vec![cell.clone()],
                Target::OneOf(cells) => cells.clone(),
                Target::Wildcard => whole.clone(),
            })
            .collect::<Vec<_>>();
        let mut combos = cartesian(&choices);
        if targets.contains(&Target::Wildcard) {
            combos.retain(|combo| self.lookup(from_state, &Cell::tuple(combo.clone())).is_none());
        }
        self.real_multi_match(from_state, combos, to, moves, next, MultiTarget::Tapes(targets))
    }

    fn real_multi_match(
        &mut self,
        from_state: &str,
        combos: Vec<Vec<Cell>>,
        to: Vec<Output>,
        moves: Vec<Movement>,
        next: &str,
        original: MultiTarget,
    ) -> Result<(), BuildError> {
        let keeps_content = to.contains(&Output::NoChange);
        let grouped = self.features.is_enabled(Feature::MultiMatch)
            && (!keeps_content || self.features.is_enabled(Feature::MultiMatchNoChange));
        if grouped {
            if combos.is_empty() {
                self.ensure_state(from_state);
                return Ok(());
            }
            let keys = combos.into_iter().map(Cell::tuple).collect();
            let outcome = Outcome::new(updates(&to, &moves), next);
            return self.define(from_state, |table, alphabet| {
                table.define_multi_match(keys, outcome, Some(original), alphabet)
            });
        }
        for combo in combos {
            let writes = substitute(&to, &combo)
                .into_iter()
                .zip(&moves)
                .map(|(cell, movement)| TapeUpdate::write(cell, *movement))
                .collect();
            let outcome = Outcome::new(writes, next);
            self.define(from_state, |table, alphabet| {
                table.define_exact(Cell::tuple(combo), outcome, alphabet)
            })?;
        }
        Ok(())
    }

    fn simulated_multi(
        &mut self,
        from_state: &str,
        from: MultiTarget,
        to: Vec<Output>,
        moves: Vec<Movement>,
        next: &str,
    ) -> Result<(), BuildError> {
        let targets = match from {
            MultiTarget::Wildcard => vec![Target::Wildcard; to.len()],
            MultiTarget::Tapes(targets) => targets,
        };
        let developer = self.alphabet.developer().to_vec();
        let choices = targets
            .iter()
            .map(|target| match target {
                Target::Cell(cell) => vec![cell.clone()],
                Target::OneOf(cells) => cells.clone(),
                Target::Wildcard => developer.clone(),
            })
            .collect::<Vec<_>>();
        let mut combos = cartesian(&choices);
        if targets.contains(&Target::Wildcard) {
            combos.retain(|combo| !self.is_simulated_combination_defined(from_state, combo));
        }
        for combo in combos {
            let writes = substitute(&to, &combo);
            self.simulated_combination(from_state, &combo, &writes, &moves, next)?;
        }
        Ok(())
    }

    /// Whether the search chain of `from_state` already dispatches on `combo`.
    fn is_simulated_combination_defined(&self, from_state: &str, combo: &[Cell]) -> bool {
        let names = SimulationNames::new(&self.guard, from_state, "", combo, &[], &[]);
        let last = combo.len() - 1;
        combo
            .last()
            .is_some_and(|cell| self.lookup(&names.finding(last), &cell.as_head()).is_some())
    }

    /// Registers the search and apply chains for one concrete read combination.
    fn simulated_combination(
        &mut self,
        from_state: &str,
        combo: &[Cell],
        writes: &[Cell],
        moves: &[Movement],
        next: &str,
    ) -> Result<(), BuildError> {
        let g = self.guard.clone();
        let names = SimulationNames::new(&g, from_state, next, combo, writes, moves);
        let count = combo.len();
        let developer = self.alphabet.developer().to_vec();
        let heads = self.alphabet.tape_heads().to_vec();
        let with_bounds = || {
            developer
                .iter()
                .cloned()
                .chain([Cell::BOUND_L, Cell::BOUND_R])
                .collect::<Vec<_>>()
        };

        let process = process_state(&g);
        let recorded = Cell::state(from_state);
        if self.lookup(&process, &recorded).is_none() {
            self.alphabet.add_state_symbol(from_state);
            self.lower_transition(&process, recorded.clone().into(), Cell::EMPTY.into(), Movement::R, &names.finding(0))?;
            let done = format!("{}-done", insertions_state(&g));
            self.lower_transition(&done, recorded.clone().into(), recorded.into(), Movement::N, &process)?;
        }

        for (k, cell) in combo.iter().enumerate() {
            let finding = names.finding(k);
            if !self.has_state(&finding) {
                self.lower_transition(&finding, Target::OneOf(with_bounds()), Output::NoChange, Movement::R, &finding)?;
            }
            let head = cell.as_head();
            if k + 1 != count && self.lookup(&finding, &head).is_some() {
                continue;
            }
            self.lower_transition(&finding, head.clone().into(), head.into(), Movement::R, &names.finding(k + 1))?;
        }

        for k in (0..count).rev() {
            let applying = names.applying(k + 1);
            if self.has_state(&applying) {
                continue;
            }
            let mark_head = names.mark_head(k + 1);
            let then = names.applying(k);
            self.lower_transition(&applying, Target::OneOf(with_bounds()), Output::NoChange, Movement::L, &applying)?;
            self.lower_transition(
                &applying,
                Target::OneOf(heads.clone()),
                Output::Cell(writes[k].clone()),
                moves[k],
                &mark_head,
            )?;
            // A head moved past the left boundary steps back into its segment
            self.lower_transition(&mark_head, Cell::BOUND_L.into(), Cell::BOUND_L.into(), Movement::R, &mark_head)?;
            self.lower_transition(&mark_head, Cell::BOUND_R.into(), Cell::BOUND_R.as_head().into(), Movement::L, &then)?;
            for cell in &developer {
                self.lower_transition(&mark_head, cell.clone().into(), cell.as_head().into(), Movement::L, &then)?;
            }
        }

        let base = names.applying(0);
        if !self.has_state(&base) {
            let record = format!("{base}-doRecord");
            self.lower_transition(&base, Target::OneOf(developer.clone()), Output::NoChange, Movement::L, &base)?;
            self.lower_transition(&base, Cell::BOUND_L.into(), Cell::BOUND_L.into(), Movement::L, &record)?;
            self.lower_transition(
                &record,
                Cell::EMPTY.into(),
                Cell::state(next).into(),
                Movement::R,
                &insertions_state(&g),
            )?;
        }
        Ok(())
    }
}

/// Per-tape updates for an outcome shared by several combinations.
fn updates(to: &[Output], moves: &[Movement]) -> Vec<TapeUpdate> {
    to.iter()
        .zip(moves)
        .map(|(output, movement)| update_for(output, *movement))
        .collect()
}

/// Splits a simulated physical tape into its logical tapes.
///
/// Segments that were not laid out yet come back as blank tapes.
pub fn decode_segments(cells: &[Cell], count: usize) -> Vec<TapeSnapshot> {
    let mut tapes = Vec::with_capacity(count);
    let mut current: Option<TapeSnapshot> = None;
    for cell in cells {
        match (&cell.symbol, current.as_mut()) {
            (Symbol::BoundLeft, _) => {
                current = Some(TapeSnapshot {
                    cells: Vec::new(),
                    head: 0,
                });
            }
            (Symbol::BoundRight, Some(segment)) => {
                // A head on the boundary stands on a cell that is not inserted yet
                if cell.head || segment.cells.is_empty() {
                    segment.head = segment.cells.len();
                    segment.cells.push(Cell::EMPTY);
                }
                tapes.extend(current.take());
            }
            (_, Some(segment)) => {
                if cell.head {
                    segment.head = segment.cells.len();
                }
                segment.cells.push(cell.untagged());
            }
            (_, None) => {}
        }
    }
    tapes.truncate(count);
    while tapes.len() < count {
        tapes.push(TapeSnapshot {
            cells: vec![Cell::EMPTY],
            head: 0,
        });
    }
    tapes
}
