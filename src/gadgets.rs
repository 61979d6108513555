//! Gadgets are named tape operations with two realizations: the matching `TapeUpdate`
//! variant when the gadget's feature is enabled, and an explicit state chain with the
//! same tape effect otherwise.

use std::fmt;
use std::str::FromStr;

use crate::builder::{MachineBuilder, SynthesisKey, SynthesisKind};
use crate::cell::{Cell, Movement, Output, Target};
use crate::features::Feature;
use crate::types::BuildError;
use crate::update::{Outcome, TapeUpdate};

/// A gadget request with its parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Gadget {
    /// Blank the matched cell, paste it one cell right, then move by `then`.
    Shift { then: Movement },
    /// Shift the content up to the next empty cell right and write `marker` at the front.
    FirstCellMarker { marker: Cell },
    /// Shift the content after the nearest `marker` right and write `insert` after it.
    InsertAfterMarker { marker: Cell, insert: Cell },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GadgetKind {
    Shift,
    FirstCellMarker,
    InsertAfterMarker,
}

impl GadgetKind {
    pub fn name(self) -> &'static str {
        match self {
            GadgetKind::Shift => "SHIFT",
            GadgetKind::FirstCellMarker => "FIRST-CELL-MARKER",
            GadgetKind::InsertAfterMarker => "INSERT-AFTER-MARKER",
        }
    }

    /// The feature that lets the gadget be registered directly.
    pub fn feature(self) -> Feature {
        match self {
            GadgetKind::Shift => Feature::GadgetShift,
            GadgetKind::FirstCellMarker => Feature::GadgetFirstCellMarker,
            GadgetKind::InsertAfterMarker => Feature::GadgetInsertAfterMarker,
        }
    }
}

impl FromStr for GadgetKind {
    type Err = BuildError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "SHIFT" => Ok(GadgetKind::Shift),
            "FIRST-CELL-MARKER" => Ok(GadgetKind::FirstCellMarker),
            "INSERT-AFTER-MARKER" => Ok(GadgetKind::InsertAfterMarker),
            _ => Err(BuildError::UnknownGadget(s.to_string())),
        }
    }
}

impl fmt::Display for GadgetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Gadget {
    pub fn kind(&self) -> GadgetKind {
        match self {
            Gadget::Shift { .. } => GadgetKind::Shift,
            Gadget::FirstCellMarker { .. } => GadgetKind::FirstCellMarker,
            Gadget::InsertAfterMarker { .. } => GadgetKind::InsertAfterMarker,
        }
    }

    /// The tape update that performs this gadget in a single step.
    pub fn update(&self) -> TapeUpdate {
        match self {
            Gadget::Shift { then } => TapeUpdate::Shift { then: *then },
            Gadget::FirstCellMarker { marker } => TapeUpdate::FirstCellMarker {
                marker: marker.clone(),
            },
            Gadget::InsertAfterMarker { marker, insert } => TapeUpdate::InsertAfterMarker {
                marker: marker.clone(),
                insert: insert.clone(),
            },
        }
    }
}

impl MachineBuilder {
    /// Lowers a gadget request without guard or tape-count checks.
    pub(crate) fn lower_gadget(
        &mut self,
        from_state: &str,
        from: Target,
        gadget: Gadget,
        next: &str,
    ) -> Result<(), BuildError> {
        if self.features.is_enabled(gadget.kind().feature()) {
            return self.register_for_targets(from_state, from, gadget.update(), next);
        }
        match gadget {
            Gadget::Shift { then } => self.shift_by_states(from_state, from, then, next),
            Gadget::FirstCellMarker { marker } => {
                self.first_cell_marker_by_states(from_state, from, marker, next)
            }
            Gadget::InsertAfterMarker { marker, insert } => {
                self.insert_after_marker_by_states(from_state, from, marker, insert, next)
            }
        }
    }

    /// Registers one update for every cell `from` stands for.
    fn register_for_targets(
        &mut self,
        from_state: &str,
        from: Target,
        update: TapeUpdate,
        next: &str,
    ) -> Result<(), BuildError> {
        let outcome = Outcome::single(update, next);
        let cells = match from {
            Target::Cell(cell) => {
                return self.define(from_state, |table, alphabet| {
                    table.define_exact(cell, outcome, alphabet)
                });
            }
            Target::Wildcard if self.features.is_enabled(Feature::Wildcard) => {
                return self.define(from_state, |table, _| table.define_wildcard(outcome));
            }
            Target::Wildcard => self.unmatched_symbols(from_state),
            Target::OneOf(cells) => cells,
        };
        if self.features.is_enabled(Feature::MultiMatch) {
            if cells.is_empty() {
                self.ensure_state(from_state);
                return Ok(());
            }
            return self.define(from_state, |table, alphabet| {
                table.define_multi_match(cells, outcome, None, alphabet)
            });
        }
        for cell in cells {
            let outcome = outcome.clone();
            self.define(from_state, |table, alphabet| {
                table.define_exact(cell, outcome, alphabet)
            })?;
        }
        Ok(())
    }

    /// The concrete cells a gadget target stands for in `from_state`.
    fn target_cells(&self, from_state: &str, from: Target) -> Vec<Cell> {
        match from {
            Target::Cell(cell) => vec![cell],
            Target::OneOf(cells) => cells,
            Target::Wildcard => self.unmatched_symbols(from_state),
        }
    }

    /// Each matched symbol is blanked and carried right by a per-symbol paste state.
    fn shift_by_states(
        &mut self,
        from_state: &str,
        from: Target,
        then: Movement,
        next: &str,
    ) -> Result<(), BuildError> {
        for symbol in self.target_cells(from_state, from) {
            let key = SynthesisKey::new(
                SynthesisKind::Paste,
                [symbol.to_string(), then.to_string(), next.to_string()],
            );
            let (paste, fresh) = self.synthesized_state(key, |g| {
                format!("{g}_paste{symbol}_{g}_{then}_{g}_{next}_{g}")
            });
            if fresh {
                self.lower_transition(
                    &paste,
                    Target::Wildcard,
                    Output::Cell(symbol.clone()),
                    then,
                    next,
                )?;
            }
            self.lower_transition(
                from_state,
                Target::Cell(symbol),
                Output::Cell(Cell::EMPTY),
                Movement::R,
                &paste,
            )?;
        }
        Ok(())
    }

    /// Walks right to the first empty cell, then shifts cell by cell back to the origin.
    fn first_cell_marker_by_states(
        &mut self,
        from_state: &str,
        from: Target,
        marker: Cell,
        next: &str,
    ) -> Result<(), BuildError> {
        let key = SynthesisKey::new(
            SynthesisKind::FirstCellMarker,
            [
                from_state.to_string(),
                from.to_string(),
                marker.to_string(),
                next.to_string(),
            ],
        );
        let (prefix, fresh) = self.synthesized_state(key, |g| {
            format!("{g}_firstCellMarker_{g}_{from_state}_{g}_{from}_{g}")
        });
        if !fresh {
            return Ok(());
        }
        let find_end = format!("{prefix}_findEnd");
        let do_shifts = format!("{prefix}_doShifts");

        self.lower_transition(from_state, from, Output::NoChange, Movement::R, &find_end)?;
        self.walk_to_end(&find_end, &do_shifts)?;

        self.lower_transition(&do_shifts, Target::Cell(Cell::EMPTY), Output::Cell(marker), Movement::R, next)?;
        self.lower_gadget(
            &do_shifts,
            Target::Wildcard,
            Gadget::Shift {
                then: Movement::left(2),
            },
            &do_shifts,
        )
    }

    /// Like the first-cell marker, but the cascade stops at `marker` and `insert` is
    /// written right after it.
    fn insert_after_marker_by_states(
        &mut self,
        from_state: &str,
        from: Target,
        marker: Cell,
        insert: Cell,
        next: &str,
    ) -> Result<(), BuildError> {
        let key = SynthesisKey::new(
            SynthesisKind::InsertAfterMarker,
            [
                from_state.to_string(),
                from.to_string(),
                marker.to_string(),
                insert.to_string(),
                next.to_string(),
            ],
        );
        let (prefix, fresh) = self.synthesized_state(key, |g| {
            format!("{g}_afterCellMarker_{g}_{from_state}_{g}_{from}_{g}")
        });
        if !fresh {
            return Ok(());
        }
        let find_end = format!("{prefix}_findEnd");
        let do_shifts = format!("{prefix}_doShifts");
        let do_insert = format!("{prefix}_doInsert");

        self.lower_transition(from_state, from, Output::NoChange, Movement::R, &find_end)?;
        self.walk_to_end(&find_end, &do_shifts)?;

        self.lower_transition(
            &do_shifts,
            Target::Cell(marker.clone()),
            Output::Cell(marker),
            Movement::R,
            &do_insert,
        )?;
        self.lower_gadget(
            &do_shifts,
            Target::Wildcard,
            Gadget::Shift {
                then: Movement::left(2),
            },
            &do_shifts,
        )?;
        self.lower_transition(
            &do_insert,
            Target::Cell(Cell::EMPTY),
            Output::Cell(insert),
            Movement::R,
            next,
        )
    }

    /// `state` moves right until the first empty cell and steps back onto the last
    /// written one before continuing in `then`.
    fn walk_to_end(&mut self, state: &str, then: &str) -> Result<(), BuildError> {
        self.lower_transition(
            state,
            Target::Cell(Cell::EMPTY),
            Output::Cell(Cell::EMPTY),
            Movement::L,
            then,
        )?;
        self.lower_transition(state, Target::Wildcard, Output::NoChange, Movement::R, state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::Symbol;
    use crate::machine::TuringMachine;
    use crate::types::{Halt, Step, STATE_ACCEPT};

    fn builder(features: &[Feature]) -> MachineBuilder {
        let mut builder = MachineBuilder::new();
        builder
            .declare_alphabets("abc".chars(), ["#"])
            .unwrap()
            .enable_features(features.iter().copied())
            .unwrap();
        builder
    }

    fn run(builder: MachineBuilder, input: &str) -> (Option<Halt>, String) {
        let mut machine = TuringMachine::new(builder.compile());
        machine.load(input);
        machine.run(10_000);
        let text = machine.tape_snapshot(0).map(|t| t.to_text()).unwrap_or_default();
        (machine.halt(), text)
    }

    #[test]
    fn test_gadget_kind_from_str() {
        assert_eq!("SHIFT".parse::<GadgetKind>().unwrap(), GadgetKind::Shift);
        assert_eq!(
            "insert-after-marker".parse::<GadgetKind>().unwrap(),
            GadgetKind::InsertAfterMarker
        );
        assert_eq!(
            "ROTATE".parse::<GadgetKind>().unwrap_err(),
            BuildError::UnknownGadget("ROTATE".to_string())
        );
    }

    #[test]
    fn test_enabled_gadget_registers_update() {
        let mut builder = builder(&[Feature::GadgetShift, Feature::Wildcard]);
        builder
            .state("qstart")
            .gadget(Target::Wildcard, Gadget::Shift { then: Movement::R }, STATE_ACCEPT)
            .unwrap();

        let table = builder.transitions("qstart").unwrap();
        assert!(table.has_wildcard());
        assert_eq!(
            table.developer_display(),
            vec!["{*} ⟶ {e} [move 1R] [paste matched symbol] [move 1R] [next state: ACCEPT]"
                .to_string()]
        );
    }

    #[test]
    fn test_shift_fallback_uses_paste_states() {
        let mut builder = builder(&[]);
        builder
            .state("qstart")
            .gadget(Target::chars("ab"), Gadget::Shift { then: Movement::R }, STATE_ACCEPT)
            .unwrap();

        let paste_a = "Ω_pastea_Ω_1R_Ω_ACCEPT_Ω";
        assert_eq!(
            builder.lookup("qstart", &Cell::from('a')).unwrap().next_state(),
            paste_a
        );
        assert!(builder.has_state("Ω_pasteb_Ω_1R_Ω_ACCEPT_Ω"));
        assert_eq!(
            builder.lookup(paste_a, &Cell::from('c')).unwrap().to_string(),
            "a [move 1R] [next state: ACCEPT]"
        );

        // The pasted symbol overwrites its right neighbour
        let (halt, text) = run(builder, "ab");
        assert_eq!(halt, Some(Halt::Accept));
        assert_eq!(text, " a");
    }

    #[test]
    fn test_paste_states_are_shared() {
        let mut builder = builder(&[]);
        builder
            .state("qstart")
            .gadget('a', Gadget::Shift { then: Movement::R }, STATE_ACCEPT)
            .unwrap();
        builder
            .state("q1")
            .gadget('a', Gadget::Shift { then: Movement::R }, STATE_ACCEPT)
            .unwrap();

        let pastes = builder
            .state_names()
            .filter(|name| name.contains("_paste"))
            .count();
        assert_eq!(pastes, 1);
        assert_eq!(
            builder.lookup("qstart", &Cell::from('a')),
            builder.lookup("q1", &Cell::from('a'))
        );
    }

    #[test]
    fn test_first_cell_marker_fallback_matches_gadget() {
        for features in [vec![], vec![Feature::GadgetFirstCellMarker]] {
            let mut builder = builder(&features);
            builder
                .state("qstart")
                .gadget(
                    Target::chars("abc"),
                    Gadget::FirstCellMarker {
                        marker: Cell::from("#"),
                    },
                    "check",
                )
                .unwrap();
            builder
                .state("check")
                .transition('a', 'a', Movement::R, STATE_ACCEPT)
                .unwrap();

            let (halt, text) = run(builder, "abc");
            assert_eq!(halt, Some(Halt::Accept), "features {features:?}");
            assert_eq!(text, "#abc", "features {features:?}");
        }
    }

    #[test]
    fn test_insert_after_marker_fallback_matches_gadget() {
        for features in [vec![], vec![Feature::GadgetInsertAfterMarker]] {
            let mut builder = builder(&features);
            builder
                .state("qstart")
                .transition('#', '#', Movement::R, "insert")
                .unwrap();
            builder
                .state("insert")
                .gadget(
                    Target::chars("abc"),
                    Gadget::InsertAfterMarker {
                        marker: Cell::from("#"),
                        insert: Cell::from('c'),
                    },
                    "check",
                )
                .unwrap();
            builder
                .state("check")
                .transition('a', 'a', Movement::R, STATE_ACCEPT)
                .unwrap();

            let (halt, text) = run(builder, "#ab");
            assert_eq!(halt, Some(Halt::Accept), "features {features:?}");
            assert_eq!(text, "#cab", "features {features:?}");
        }
    }

    #[test]
    fn test_repeated_gadget_request_is_idempotent() {
        let mut builder = builder(&[]);
        let marker = Gadget::FirstCellMarker {
            marker: Cell::from("#"),
        };
        builder
            .state("qstart")
            .gadget('a', marker.clone(), STATE_ACCEPT)
            .unwrap();
        let states = builder.state_names().count();

        builder
            .state("qstart")
            .gadget('a', marker, STATE_ACCEPT)
            .unwrap();
        assert_eq!(builder.state_names().count(), states);
    }

    #[test]
    fn test_gadget_on_wildcard_without_features_expands() {
        let mut builder = builder(&[Feature::GadgetShift]);
        builder
            .state("qstart")
            .transition('a', 'a', Movement::R, "qstart")
            .unwrap()
            .gadget(Target::Wildcard, Gadget::Shift { then: Movement::N }, STATE_ACCEPT)
            .unwrap();

        let table = builder.transitions("qstart").unwrap();
        assert!(!table.has_wildcard());
        assert!(table.lookup(&Cell::from('b')).is_some());
        assert!(table.lookup(&Cell::from(Symbol::Empty)).is_some());
        assert_eq!(
            table.lookup(&Cell::from('a')).unwrap().next_state(),
            "qstart"
        );
    }

    #[test]
    fn test_machine_steps_through_shift() {
        let mut builder = builder(&[Feature::GadgetShift]);
        builder
            .state("qstart")
            .gadget('a', Gadget::Shift { then: Movement::L }, STATE_ACCEPT)
            .unwrap();
        let mut machine = TuringMachine::new(builder.compile());
        machine.load("a");

        assert_eq!(machine.step(), Step::Halt(Halt::Accept));
        assert_eq!(machine.tape_snapshot(0).unwrap().to_text(), " a");
    }
}
