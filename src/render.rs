//! The boundary between the interpreter and whatever displays a run.
//!
//! The interpreter calls a `Renderer` after loading and after every step. Renderers only
//! observe; the one exception is `HistoryRenderer`, whose records a host may hand back to
//! `TuringMachine::restore`.

use serde::Serialize;

use crate::tape::{Tape, TapeSnapshot};

pub trait Renderer {
    /// Called with the state and the physical tapes after loading and after every step.
    fn on_step(&mut self, state: &str, tapes: &[Tape]);

    /// Called once with the number of logical tapes when a machine is attached.
    fn on_tape_count_changed(&mut self, _count: usize) {}
}

/// Discards every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentRenderer;

impl Renderer for SilentRenderer {
    fn on_step(&mut self, _state: &str, _tapes: &[Tape]) {}
}

/// The machine configuration after one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepRecord {
    pub state: String,
    pub tapes: Vec<TapeSnapshot>,
}

/// Records every configuration so a host can list a run or go back in it.
#[derive(Debug, Clone, Default)]
pub struct HistoryRenderer {
    records: Vec<StepRecord>,
    tape_count: usize,
}

impl HistoryRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[StepRecord] {
        &self.records
    }

    pub fn tape_count(&self) -> usize {
        self.tape_count
    }

    /// Whether there is a configuration before the current one.
    pub fn can_restore(&self) -> bool {
        self.records.len() > 1
    }

    /// Drops the current configuration and returns the one before it.
    pub fn previous(&mut self) -> Option<StepRecord> {
        if !self.can_restore() {
            return None;
        }
        self.records.pop();
        self.records.last().cloned()
    }
}

impl Renderer for HistoryRenderer {
    fn on_step(&mut self, state: &str, tapes: &[Tape]) {
        self.records.push(StepRecord {
            state: state.to_string(),
            tapes: tapes.iter().map(Tape::snapshot).collect(),
        });
    }

    fn on_tape_count_changed(&mut self, count: usize) {
        self.tape_count = count;
        self.records.clear();
    }
}

/// Lets two renderers observe the same run.
impl<A: Renderer, B: Renderer> Renderer for (A, B) {
    fn on_step(&mut self, state: &str, tapes: &[Tape]) {
        self.0.on_step(state, tapes);
        self.1.on_step(state, tapes);
    }

    fn on_tape_count_changed(&mut self, count: usize) {
        self.0.on_tape_count_changed(count);
        self.1.on_tape_count_changed(count);
    }
}

impl<R: Renderer + ?Sized> Renderer for Box<R> {
    fn on_step(&mut self, state: &str, tapes: &[Tape]) {
        (**self).on_step(state, tapes);
    }

    fn on_tape_count_changed(&mut self, count: usize) {
        (**self).on_tape_count_changed(count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::Cell;

    #[derive(Default)]
    struct CountingRenderer {
        steps: usize,
        tape_count: usize,
    }

    impl Renderer for CountingRenderer {
        fn on_step(&mut self, _state: &str, _tapes: &[Tape]) {
            self.steps += 1;
        }

        fn on_tape_count_changed(&mut self, count: usize) {
            self.tape_count = count;
        }
    }

    fn tapes(text: &str) -> Vec<Tape> {
        vec![Tape::with_input(text.chars().map(Cell::from))]
    }

    #[test]
    fn test_history_previous() {
        let mut history = HistoryRenderer::new();
        history.on_tape_count_changed(1);
        assert!(history.previous().is_none());

        history.on_step("q0", &tapes("a"));
        history.on_step("q1", &tapes("b"));
        assert!(history.can_restore());

        let record = history.previous().unwrap();
        assert_eq!(record.state, "q0");
        assert_eq!(record.tapes[0].to_text(), "a");
        assert!(!history.can_restore());
    }

    #[test]
    fn test_pair_and_boxed_renderers() {
        let mut pair = (CountingRenderer::default(), HistoryRenderer::new());
        pair.on_tape_count_changed(2);
        pair.on_step("q0", &tapes("a"));

        assert_eq!(pair.0.steps, 1);
        assert_eq!(pair.0.tape_count, 2);
        assert_eq!(pair.1.records().len(), 1);

        let mut boxed: Box<dyn Renderer> = Box::new(CountingRenderer::default());
        boxed.on_step("q0", &tapes("a"));
    }

    #[test]
    fn test_step_record_json() {
        let record = StepRecord {
            state: "q0".to_string(),
            tapes: vec![TapeSnapshot {
                cells: vec![Cell::from('a')],
                head: 0,
            }],
        };
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["state"], "q0");
        assert_eq!(json["tapes"][0]["head"], 0);
        assert_eq!(json["tapes"][0]["cells"][0]["head"], false);
    }
}
