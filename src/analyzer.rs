//! This module provides static checks over a compiled machine. They find definitions that
//! compile fine but can only reject at run time: a start state without transitions,
//! transitions into states that have none, and states nothing leads to.

use std::collections::{BTreeSet, HashSet, VecDeque};

use crate::machine::CompiledMachine;
use crate::types::{is_terminal_state, BuildError};

/// Represents the problems the analysis of a compiled machine can find.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum AnalysisError {
    /// The start state has no transitions, so every run rejects immediately.
    InvalidStartState(String),
    /// Transitions lead to non-terminal states that have no transitions.
    UndefinedNextStates(Vec<String>),
    /// States with transitions that cannot be reached from the start state.
    UnreachableStates(Vec<String>),
}

impl From<AnalysisError> for BuildError {
    fn from(error: AnalysisError) -> Self {
        match error {
            AnalysisError::InvalidStartState(state) => {
                BuildError::Validation(format!("Start state {state} has no transitions"))
            }
            AnalysisError::UndefinedNextStates(states) => BuildError::Validation(format!(
                "Transitions lead to states without transitions: {:?}",
                states
            )),
            AnalysisError::UnreachableStates(states) => {
                BuildError::Validation(format!("Unreachable states detected: {:?}", states))
            }
        }
    }
}

/// Analyzes a compiled machine.
///
/// # Arguments
///
/// * `machine` - The machine to check.
///
/// # Returns
///
/// * `Ok(())` if no problem was found.
/// * `Err(BuildError::Validation)` describing the first problem otherwise.
pub fn analyze(machine: &CompiledMachine) -> Result<(), BuildError> {
    let errors = [
        check_valid_start_state,
        check_undefined_next_states,
        check_unreachable_states,
    ]
    .iter()
    .filter_map(|check| check(machine).err())
    .collect::<Vec<_>>();

    match errors.into_iter().next() {
        Some(first) => Err(first.into()),
        None => Ok(()),
    }
}

fn has_transitions(machine: &CompiledMachine, state: &str) -> bool {
    machine
        .transitions(state)
        .is_some_and(|table| !table.is_empty())
}

/// Every state the outcomes of `state` lead to.
fn successors<'a>(machine: &'a CompiledMachine, state: &str) -> impl Iterator<Item = &'a str> {
    machine
        .transitions(state)
        .into_iter()
        .flat_map(|table| table.outcomes())
        .map(|outcome| outcome.next_state())
}

fn check_valid_start_state(machine: &CompiledMachine) -> Result<(), AnalysisError> {
    if has_transitions(machine, machine.start_state()) {
        Ok(())
    } else {
        Err(AnalysisError::InvalidStartState(
            machine.start_state().to_string(),
        ))
    }
}

fn check_undefined_next_states(machine: &CompiledMachine) -> Result<(), AnalysisError> {
    let undefined = machine
        .state_names()
        .flat_map(|state| successors(machine, state))
        .filter(|next| !is_terminal_state(next) && !has_transitions(machine, next))
        .map(str::to_string)
        .collect::<BTreeSet<_>>();

    if undefined.is_empty() {
        Ok(())
    } else {
        Err(AnalysisError::UndefinedNextStates(
            undefined.into_iter().collect(),
        ))
    }
}

fn check_unreachable_states(machine: &CompiledMachine) -> Result<(), AnalysisError> {
    let mut reached = HashSet::new();
    let mut queue = VecDeque::from([machine.start_state()]);
    while let Some(state) = queue.pop_front() {
        if !reached.insert(state) {
            continue;
        }
        queue.extend(successors(machine, state));
    }

    let unreachable = machine
        .state_names()
        .filter(|state| has_transitions(machine, state) && !reached.contains(state))
        .map(str::to_string)
        .collect::<BTreeSet<_>>();

    if unreachable.is_empty() {
        Ok(())
    } else {
        Err(AnalysisError::UnreachableStates(
            unreachable.into_iter().collect(),
        ))
    }
}
