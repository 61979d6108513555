//! A catalogue of stored demo machines.
//!
//! Each program carries the features it is usually compiled with and its alphabets, so a
//! host can compile it with those defaults or with any other feature set. Whatever set is
//! chosen, a program computes the same result; only the shape of the compiled tables
//! changes.

use std::fmt;
use std::sync::RwLock;

use crate::builder::MachineBuilder;
use crate::cell::{Cell, Movement, MultiTarget, Output, Target};
use crate::features::{Feature, FeatureSet};
use crate::gadgets::Gadget;
use crate::machine::CompiledMachine;
use crate::types::{BuildError, STATE_ACCEPT, STATE_REJECT};

/// A machine definition with its default configuration.
#[derive(Clone)]
pub struct StoredProgram {
    /// Short key used to select the program, e.g. `replace-odd`.
    pub name: &'static str,
    pub description: &'static str,
    pub default_features: &'static [Feature],
    pub input_alphabet: &'static str,
    pub extra_alphabet: &'static str,
    /// An input the program accepts.
    pub sample_input: &'static str,
    define: fn(&mut MachineBuilder) -> Result<(), BuildError>,
}

impl fmt::Debug for StoredProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredProgram")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("default_features", &self.default_features)
            .field("input_alphabet", &self.input_alphabet)
            .field("extra_alphabet", &self.extra_alphabet)
            .finish_non_exhaustive()
    }
}

impl StoredProgram {
    pub fn default_feature_set(&self) -> Result<FeatureSet, BuildError> {
        FeatureSet::with(self.default_features)
    }

    /// Creates a builder with the program's alphabets and the given features, with
    /// every state of the program defined.
    pub fn builder(&self, features: &FeatureSet) -> Result<MachineBuilder, BuildError> {
        let mut builder = MachineBuilder::new();
        builder
            .declare_alphabets(self.input_alphabet.chars(), self.extra_alphabet.chars())?
            .enable_features(features.iter())?;
        (self.define)(&mut builder)?;
        Ok(builder)
    }

    /// Compiles the program with its default features.
    pub fn compile(&self) -> Result<CompiledMachine, BuildError> {
        self.compile_with(&self.default_feature_set()?)
    }

    pub fn compile_with(&self, features: &FeatureSet) -> Result<CompiledMachine, BuildError> {
        Ok(self.builder(features)?.compile())
    }
}

const DIGITS_ODD: &str = "13579";
const DIGITS_EVEN: &str = "02468";

/// Replaces every odd digit with `1`.
fn replace_odd_digits(builder: &mut MachineBuilder) -> Result<(), BuildError> {
    builder
        .state("qstart")
        .transition(Cell::EMPTY, Cell::EMPTY, Movement::R, STATE_ACCEPT)?
        .transition(Target::chars(DIGITS_ODD), '1', Movement::R, "qstart")?
        .transition(Target::chars(DIGITS_EVEN), Output::NoChange, Movement::R, "qstart")?;
    Ok(())
}

/// Overwrites every letter after the first period with a period.
fn replace_letters(builder: &mut MachineBuilder) -> Result<(), BuildError> {
    builder
        .state("qstart")
        .transition('.', '.', Movement::R, "qreplacing")?
        .transition(Cell::EMPTY, Cell::EMPTY, Movement::R, STATE_REJECT)?
        .transition(Target::Wildcard, Output::NoChange, Movement::R, "qstart")?;
    builder
        .state("qreplacing")
        .transition(Cell::EMPTY, Cell::EMPTY, Movement::R, STATE_ACCEPT)?
        .transition(Target::Wildcard, '.', Movement::R, "qreplacing")?;
    Ok(())
}

/// Stops on the first `0` and rejects inputs without one.
fn find_first_zero(builder: &mut MachineBuilder) -> Result<(), BuildError> {
    builder
        .state("qstart")
        .transition('0', '0', Movement::N, STATE_ACCEPT)?
        .transition(Cell::EMPTY, Cell::EMPTY, Movement::R, STATE_REJECT)?
        .transition(Target::Wildcard, Output::NoChange, Movement::R, "qstart")?;
    Ok(())
}

/// Moves the whole input one cell right, last symbol first.
fn shift_right(builder: &mut MachineBuilder) -> Result<(), BuildError> {
    builder
        .state("qstart")
        .transition(Target::chars("abc"), Output::NoChange, Movement::R, "qstart")?
        .transition(Cell::EMPTY, Cell::EMPTY, Movement::L, "qshift")?;
    builder
        .state("qshift")
        .gadget(
            Target::chars("abc"),
            Gadget::Shift {
                then: Movement::left(2),
            },
            "qshift",
        )?
        .transition(Cell::EMPTY, Cell::EMPTY, Movement::R, STATE_ACCEPT)?;
    Ok(())
}

/// Puts a `#` in front of the input.
fn mark_first_cell(builder: &mut MachineBuilder) -> Result<(), BuildError> {
    builder
        .state("qstart")
        .gadget(
            Target::chars("abc"),
            Gadget::FirstCellMarker {
                marker: Cell::from('#'),
            },
            STATE_ACCEPT,
        )?
        .transition(Cell::EMPTY, '#', Movement::R, STATE_ACCEPT)?;
    Ok(())
}

/// Inserts a `+` right after the `#`, rejecting inputs without one.
fn insert_after_marker(builder: &mut MachineBuilder) -> Result<(), BuildError> {
    builder
        .state("qstart")
        .transition('#', Output::NoChange, Movement::R, "qinsert")?
        .transition(Target::chars("ab"), Output::NoChange, Movement::R, "qstart")?
        .transition(Cell::EMPTY, Cell::EMPTY, Movement::R, STATE_REJECT)?;
    builder
        .state("qinsert")
        .gadget(
            Target::chars("ab#"),
            Gadget::InsertAfterMarker {
                marker: Cell::from('#'),
                insert: Cell::from('+'),
            },
            STATE_ACCEPT,
        )?
        .transition(Cell::EMPTY, '+', Movement::R, STATE_ACCEPT)?;
    Ok(())
}

/// Copies the input onto a second tape behind a `$`, then reads both copies in opposite
/// directions.
fn palindrome(builder: &mut MachineBuilder) -> Result<(), BuildError> {
    let any = || Target::one_of([Cell::from('a'), Cell::from('b'), Cell::EMPTY]);
    let keep = || vec![Output::NoChange, Output::NoChange];

    builder.set_tape_count(2, "qmark")?;
    builder.state("qmark").multi_tape_transition(
        vec![any(), Target::from(Cell::EMPTY)],
        vec![Output::NoChange, Output::from('$')],
        vec![Movement::N, Movement::R],
        "qcopy",
    )?;

    let mut copy = builder.state("qcopy");
    for symbol in ['a', 'b'] {
        copy.multi_tape_transition(
            vec![Target::from(symbol), Target::from(Cell::EMPTY)],
            vec![Output::NoChange, Output::from(symbol)],
            vec![Movement::R, Movement::R],
            "qcopy",
        )?;
    }
    copy.multi_tape_transition(
        vec![Target::from(Cell::EMPTY), Target::from(Cell::EMPTY)],
        keep(),
        vec![Movement::L, Movement::L],
        "qrewind",
    )?;

    builder
        .state("qrewind")
        .multi_tape_transition(
            vec![any(), Target::chars("ab")],
            keep(),
            vec![Movement::N, Movement::L],
            "qrewind",
        )?
        .multi_tape_transition(
            vec![any(), Target::from('$')],
            keep(),
            vec![Movement::N, Movement::R],
            "qcompare",
        )?;

    let mut compare = builder.state("qcompare");
    for symbol in ['a', 'b'] {
        compare.multi_tape_transition(
            vec![Target::from(symbol), Target::from(symbol)],
            keep(),
            vec![Movement::L, Movement::R],
            "qcompare",
        )?;
    }
    compare
        .multi_tape_transition(
            vec![any(), Target::from(Cell::EMPTY)],
            keep(),
            vec![Movement::N, Movement::N],
            STATE_ACCEPT,
        )?
        .multi_tape_transition(
            MultiTarget::Wildcard,
            keep(),
            vec![Movement::N, Movement::N],
            STATE_REJECT,
        )?;
    Ok(())
}

fn stored_programs() -> Vec<StoredProgram> {
    vec![
        StoredProgram {
            name: "replace-odd",
            description: "Replace odd digits with `1`s",
            default_features: &[Feature::MultiMatch, Feature::MultiMatchNoChange],
            input_alphabet: "0123456789",
            extra_alphabet: "",
            sample_input: "1234567",
            define: replace_odd_digits,
        },
        StoredProgram {
            name: "replace-letters",
            description: "Replace letters after the first period",
            default_features: &[
                Feature::MultiMatch,
                Feature::MultiMatchNoChange,
                Feature::Wildcard,
            ],
            input_alphabet: "abcdefghijklmnopqrstuvwxyz.",
            extra_alphabet: "",
            sample_input: "keep.these",
            define: replace_letters,
        },
        StoredProgram {
            name: "find-zero",
            description: "End on the first `0`",
            default_features: &[
                Feature::MultiMatch,
                Feature::MultiMatchNoChange,
                Feature::Wildcard,
                Feature::MoveNone,
            ],
            input_alphabet: "abcdefghijklmnopqrstuvwxyz0",
            extra_alphabet: "",
            sample_input: "abc0def",
            define: find_first_zero,
        },
        StoredProgram {
            name: "shift-right",
            description: "Shift the input one cell to the right",
            default_features: &[
                Feature::MultiMatch,
                Feature::MultiMatchNoChange,
                Feature::MoveMulti,
                Feature::GadgetShift,
            ],
            input_alphabet: "abc",
            extra_alphabet: "",
            sample_input: "abcab",
            define: shift_right,
        },
        StoredProgram {
            name: "mark-first-cell",
            description: "Put a `#` in front of the input",
            default_features: &[Feature::MultiMatch, Feature::GadgetFirstCellMarker],
            input_alphabet: "abc",
            extra_alphabet: "#",
            sample_input: "cab",
            define: mark_first_cell,
        },
        StoredProgram {
            name: "insert-after-marker",
            description: "Insert a `+` after the `#` marker",
            default_features: &[
                Feature::MultiMatch,
                Feature::MultiMatchNoChange,
                Feature::GadgetInsertAfterMarker,
            ],
            input_alphabet: "ab#",
            extra_alphabet: "+",
            sample_input: "ab#ba",
            define: insert_after_marker,
        },
        StoredProgram {
            name: "palindrome",
            description: "Accept palindromes over `a` and `b` using two tapes",
            default_features: &[
                Feature::MultiMatch,
                Feature::MultiMatchNoChange,
                Feature::Wildcard,
                Feature::MoveNone,
                Feature::MultiTape,
            ],
            input_alphabet: "ab",
            extra_alphabet: "$",
            sample_input: "abba",
            define: palindrome,
        },
    ]
}

lazy_static::lazy_static! {
    pub static ref PROGRAMS: RwLock<Vec<StoredProgram>> = RwLock::new(Vec::new());
}

/// Summary of a stored program compiled with its default features.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramInfo {
    pub index: usize,
    pub name: String,
    pub description: String,
    pub default_features: FeatureSet,
    pub tape_count: usize,
    pub state_count: usize,
    pub transition_count: usize,
}

pub struct ProgramManager;

impl ProgramManager {
    /// Fills the catalogue if it is still empty.
    pub fn load() -> Result<(), BuildError> {
        let mut programs = PROGRAMS
            .write()
            .map_err(|_| BuildError::Validation("Failed to acquire write lock".to_string()))?;
        if programs.is_empty() {
            *programs = stored_programs();
        }
        Ok(())
    }

    pub fn get_program_count() -> usize {
        let _ = Self::load();

        PROGRAMS.read().map(|programs| programs.len()).unwrap_or(0)
    }

    pub fn get_program_by_index(index: usize) -> Result<StoredProgram, BuildError> {
        Self::load()?;

        PROGRAMS
            .read()
            .map_err(|_| BuildError::Validation("Failed to acquire read lock".to_string()))?
            .get(index)
            .cloned()
            .ok_or_else(|| BuildError::UnknownProgram(format!("index {}", index)))
    }

    pub fn get_program_by_name(name: &str) -> Result<StoredProgram, BuildError> {
        Self::load()?;

        PROGRAMS
            .read()
            .map_err(|_| BuildError::Validation("Failed to acquire read lock".to_string()))?
            .iter()
            .find(|program| program.name == name)
            .cloned()
            .ok_or_else(|| BuildError::UnknownProgram(name.to_string()))
    }

    /// Looks a program up by name, or by index when `key` is a number.
    pub fn get_program(key: &str) -> Result<StoredProgram, BuildError> {
        match key.parse::<usize>() {
            Ok(index) => Self::get_program_by_index(index),
            Err(_) => Self::get_program_by_name(key),
        }
    }

    pub fn list_program_names() -> Vec<String> {
        let _ = Self::load();

        PROGRAMS
            .read()
            .map(|programs| {
                programs
                    .iter()
                    .map(|program| program.name.to_string())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Compiles the program at `index` with its default features and summarizes it.
    pub fn get_program_info(index: usize) -> Result<ProgramInfo, BuildError> {
        let program = Self::get_program_by_index(index)?;
        let machine = program.compile()?;

        Ok(ProgramInfo {
            index,
            name: program.name.to_string(),
            description: program.description.to_string(),
            default_features: program.default_feature_set()?,
            tape_count: machine.logical_tape_count(),
            state_count: machine.state_count(),
            transition_count: machine.transition_count(),
        })
    }

    /// Indices of the programs whose name or description contains `query`, ignoring case.
    pub fn search_programs(query: &str) -> Vec<usize> {
        let _ = Self::load();
        let query = query.to_lowercase();

        PROGRAMS
            .read()
            .map(|programs| {
                programs
                    .iter()
                    .enumerate()
                    .filter(|(_, program)| {
                        program.name.to_lowercase().contains(&query)
                            || program.description.to_lowercase().contains(&query)
                    })
                    .map(|(index, _)| index)
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::TuringMachine;
    use crate::tape::TapeSnapshot;
    use crate::types::{Halt, MAX_EXECUTION_STEPS};
    use proptest::prelude::*;

    type RunResult = (Option<Halt>, Vec<String>);

    fn run(program: &StoredProgram, features: &FeatureSet, input: &str) -> RunResult {
        let mut machine = TuringMachine::new(program.compile_with(features).unwrap());
        machine.load(input);
        machine.run(MAX_EXECUTION_STEPS);
        let tapes = machine
            .logical_tapes()
            .iter()
            .map(TapeSnapshot::to_text)
            .collect();
        (machine.halt(), tapes)
    }

    fn run_default(name: &str, input: &str) -> RunResult {
        let program = ProgramManager::get_program_by_name(name).unwrap();
        run(&program, &program.default_feature_set().unwrap(), input)
    }

    fn accepted(tapes: &[&str]) -> RunResult {
        (
            Some(Halt::Accept),
            tapes.iter().map(|tape| tape.to_string()).collect(),
        )
    }

    #[test]
    fn test_program_lookup() {
        let names = ProgramManager::list_program_names();
        assert_eq!(names.len(), ProgramManager::get_program_count());
        assert_eq!(names[0], "replace-odd");

        let program = ProgramManager::get_program("1").unwrap();
        assert_eq!(program.name, "replace-letters");
        assert_eq!(
            ProgramManager::get_program("palindrome").unwrap().name,
            "palindrome"
        );

        assert_eq!(
            ProgramManager::get_program_by_name("missing").unwrap_err(),
            BuildError::UnknownProgram("missing".to_string())
        );
        assert!(ProgramManager::get_program_by_index(names.len()).is_err());
    }

    #[test]
    fn test_search_programs() {
        let results = ProgramManager::search_programs("REPLACE");
        assert_eq!(results, vec![0, 1]);

        let results = ProgramManager::search_programs("two tapes");
        assert_eq!(results.len(), 1);
        assert!(ProgramManager::search_programs("nothing like this").is_empty());
    }

    #[test]
    fn test_program_info() {
        let info = ProgramManager::get_program_info(0).unwrap();

        assert_eq!(info.name, "replace-odd");
        assert_eq!(info.tape_count, 1);
        assert_eq!(info.state_count, 1);
        assert_eq!(info.transition_count, 3);

        let palindrome = ProgramManager::search_programs("palindrome")[0];
        assert_eq!(
            ProgramManager::get_program_info(palindrome)
                .unwrap()
                .tape_count,
            2
        );
    }

    #[test]
    fn test_every_program_accepts_its_sample() {
        for name in ProgramManager::list_program_names() {
            let program = ProgramManager::get_program_by_name(&name).unwrap();
            let (halt, _) = run(
                &program,
                &program.default_feature_set().unwrap(),
                program.sample_input,
            );
            assert_eq!(halt, Some(Halt::Accept), "program {name}");
        }
    }

    #[test]
    fn test_program_results() {
        assert_eq!(run_default("replace-odd", "1234567"), accepted(&["1214161"]));
        assert_eq!(
            run_default("replace-letters", "ab.cd.e"),
            accepted(&["ab....."])
        );
        assert_eq!(run_default("find-zero", "ab0c"), accepted(&["ab0c"]));
        assert_eq!(run_default("find-zero", "abc").0, Some(Halt::Reject));
        assert_eq!(run_default("shift-right", "abc"), accepted(&[" abc"]));
        assert_eq!(run_default("mark-first-cell", "cab"), accepted(&["#cab"]));
        assert_eq!(
            run_default("insert-after-marker", "ab#ba"),
            accepted(&["ab#+ba"])
        );
        assert_eq!(run_default("insert-after-marker", "ab").0, Some(Halt::Reject));
        assert_eq!(run_default("palindrome", "aba").0, Some(Halt::Accept));
        assert_eq!(run_default("palindrome", "ab").0, Some(Halt::Reject));
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(run_default("replace-odd", ""), accepted(&[""]));
        assert_eq!(run_default("shift-right", ""), accepted(&[""]));
        assert_eq!(run_default("mark-first-cell", ""), accepted(&["#"]));
        assert_eq!(run_default("palindrome", "").0, Some(Halt::Accept));
    }

    fn program_and_input() -> impl Strategy<Value = (usize, String)> {
        (0..stored_programs().len()).prop_flat_map(|index| {
            let alphabet = stored_programs()[index]
                .input_alphabet
                .chars()
                .collect::<Vec<_>>();
            (
                Just(index),
                prop::collection::vec(prop::sample::select(alphabet), 0..5)
                    .prop_map(|symbols| symbols.into_iter().collect::<String>()),
            )
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(48))]

        #[test]
        fn test_features_do_not_change_results((index, input) in program_and_input()) {
            let program = ProgramManager::get_program_by_index(index).unwrap();
            let expected = run(&program, &program.default_feature_set().unwrap(), &input);

            prop_assert!(expected.0.is_some());
            prop_assert_eq!(&run(&program, &FeatureSet::new(), &input), &expected);
            prop_assert_eq!(&run(&program, &FeatureSet::all(), &input), &expected);
        }
    }
}
