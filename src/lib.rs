//! This crate lowers high-level Turing machine definitions onto a primitive machine model
//! and interprets the result.
//!
//! A definition may use multi-symbol matches, wildcards, arbitrary head movements, gadgets
//! and several tapes. Whatever the enabled feature set does not support directly is
//! synthesized from plain single-symbol, single-move transitions, so a definition computes
//! the same result under every feature set.

pub mod alphabet;
pub mod analyzer;
pub mod builder;
pub mod cell;
pub mod features;
pub mod gadgets;
pub mod machine;
pub mod multitape;
pub mod programs;
pub mod render;
pub mod table;
pub mod tape;
pub mod types;
pub mod update;

/// Re-exports the `analyze` function and `AnalysisError` enum from the analyzer module.
pub use analyzer::{analyze, AnalysisError};
/// Re-exports the builder and its per-state handle.
pub use builder::{MachineBuilder, StateHandle};
/// Re-exports the cell model used to describe transitions.
pub use cell::{Cell, Movement, MultiTarget, Output, Symbol, Target};
/// Re-exports the feature catalog.
pub use features::{Feature, FeatureSet};
/// Re-exports the gadget requests.
pub use gadgets::{Gadget, GadgetKind};
/// Re-exports the compiled machine and its interpreter.
pub use machine::{CompiledMachine, TuringMachine};
/// Re-exports `ProgramInfo`, `ProgramManager`, `StoredProgram` and `PROGRAMS` from the programs module.
pub use programs::{ProgramInfo, ProgramManager, StoredProgram, PROGRAMS};
/// Re-exports the renderer boundary.
pub use render::{HistoryRenderer, Renderer, SilentRenderer, StepRecord};
pub use tape::{Tape, TapeSnapshot};
/// Re-exports step results, errors and constants from the types module.
pub use types::{
    BuildError, Halt, Step, TableError, MAX_EXECUTION_STEPS, RUN_BATCH_SIZE, START_STATE,
    STATE_ACCEPT, STATE_REJECT,
};
pub use update::{Outcome, TapeUpdate};
