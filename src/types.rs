//! This module defines the constants, step results, and error types shared by the lowering
//! engine and the interpreter.

use thiserror::Error;

/// Terminal state reached when the machine accepts its input.
pub const STATE_ACCEPT: &str = "ACCEPT";
/// Terminal state reached when the machine rejects its input, including every runtime fallback.
pub const STATE_REJECT: &str = "REJECT";
/// The state a freshly built machine starts in unless another one is configured.
pub const START_STATE: &str = "qstart";
/// The reserved token wrapped around every synthesized state name.
pub const GUARD_TOKEN: &str = "\u{03A9}";
/// The maximum number of steps hosts execute before giving up on a run.
pub const MAX_EXECUTION_STEPS: usize = 100_000;
/// Number of steps executed between two yields of `TuringMachine::run`.
pub const RUN_BATCH_SIZE: usize = 500;

/// Returns true for the two fixed terminal states.
pub fn is_terminal_state(state: &str) -> bool {
    state == STATE_ACCEPT || state == STATE_REJECT
}

/// Represents the outcome of a single interpreter step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// The machine performed a step and is not in a terminal state.
    Continue,
    /// The machine is in a terminal state.
    Halt(Halt),
}

impl Step {
    /// `true` iff the machine can keep running.
    pub fn is_continue(self) -> bool {
        matches!(self, Step::Continue)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Halt {
    Accept,
    Reject,
}

impl Halt {
    /// Maps a terminal state name to its halt kind.
    pub fn from_state(state: &str) -> Option<Self> {
        match state {
            STATE_ACCEPT => Some(Halt::Accept),
            STATE_REJECT => Some(Halt::Reject),
            _ => None,
        }
    }
}

/// Failures raised by a single state's transition table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableError {
    /// A transition was added after the wildcard of the state was set.
    #[error("cannot define a transition on {0} after the wildcard was set")]
    AfterWildcard(String),
    /// The cell already has an exact or multi-match entry.
    #[error("transition on {0} is already defined")]
    Duplicate(String),
    /// The cell is not part of the machine alphabet.
    #[error("{0} is not part of the tape alphabet")]
    InvalidSymbol(String),
    /// The wildcard of the state was already set.
    #[error("wildcard transition is already defined")]
    WildcardRedefined,
}

/// Represents every specification-time error of the lowering engine.
///
/// All of these are programmer errors in the machine definition; none of them is recovered
/// from automatically.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("Unknown feature: {0}")]
    UnknownFeature(String),
    #[error("Feature already enabled: {0}")]
    FeatureAlreadyEnabled(String),
    /// Features and alphabets are fixed once the first state exists.
    #[error("Features and alphabets must be configured before any state is defined")]
    ConfigurationLocked,
    #[error("Unknown gadget: {0}")]
    UnknownGadget(String),
    /// A transition table rejected a definition.
    #[error("Transition from state {state}: {source}")]
    Transition { state: String, source: TableError },
    #[error("Tape count must be greater than one, got {0}")]
    InvalidTapeCount(usize),
    #[error("Tape count can only be set once")]
    TapeCountAlreadySet,
    #[error("Tape count cannot be set after single-tape transitions were added")]
    TapeCountAfterSingleTape,
    #[error("{0} requires a tape count set with set_tape_count")]
    RequiresMultipleTapes(&'static str),
    #[error("{0} cannot be used on a machine with multiple tapes")]
    RequiresSingleTape(&'static str),
    /// A multi-tape call supplied the wrong number of per-tape values.
    #[error("{call} for {expected} tapes was given {actual} {what}")]
    TapeArity {
        call: &'static str,
        expected: usize,
        actual: usize,
        what: &'static str,
    },
    #[error("Program not found: {0}")]
    UnknownProgram(String),
    /// Static analysis of a compiled machine found a problem.
    #[error("Machine validation error: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(is_terminal_state(STATE_ACCEPT));
        assert!(is_terminal_state(STATE_REJECT));
        assert!(!is_terminal_state(START_STATE));
        assert_eq!(Halt::from_state("ACCEPT"), Some(Halt::Accept));
        assert_eq!(Halt::from_state("qstart"), None);
    }

    #[test]
    fn test_error_display() {
        let error = BuildError::Transition {
            state: "q0".to_string(),
            source: TableError::Duplicate("a".to_string()),
        };

        let error_msg = format!("{}", error);
        assert!(error_msg.contains("q0"));
        assert!(error_msg.contains("already defined"));

        let error = BuildError::TapeArity {
            call: "add_multi_tape_transition",
            expected: 2,
            actual: 3,
            what: "moves",
        };
        assert_eq!(
            error.to_string(),
            "add_multi_tape_transition for 2 tapes was given 3 moves"
        );
    }
}
