//! Stepping through the source level steps of one transaction.

use std::{collections::BTreeMap, sync::Arc};

use crate::{
    analysis::storage::Assignment,
    artifact::source::Sources,
    error::{Result, SdbError},
    provider::DataProvider,
    state::{State, Value},
    trace::{Step, TransactionInfo},
};

/// Breakpoint lines (1-based) per file name.
pub type Breakpoints = BTreeMap<String, Vec<usize>>;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Direction {
    #[default]
    Forward,
    Backward,
}

/// Which variables of a step to list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scope {
    /// Locals, parameters and return variables.
    Local,
    /// State variables and constants.
    Global,
}

#[derive(Debug)]
pub struct Session {
    sources: Sources,
    tx: TransactionInfo,
    steps: Vec<Step>,
    breakpoints: Breakpoints,
    direction: Direction,
    /// The step the next [`Session::step`] applies.
    index: usize,
    /// The step whose snapshot is loaded into `state`.
    applied: Option<usize>,
    state: State,
}

impl Session {
    /// Storage is read as of the end of the block preceding the transaction.
    pub fn new(
        provider: Arc<dyn DataProvider>,
        sources: Sources,
        tx: TransactionInfo,
        steps: Vec<Step>,
        storage_nocache: bool,
    ) -> Result<Self> {
        let block = tx.block_number.ok_or_else(|| SdbError::PendingTransaction(tx.hash.to_string()))?;
        let block = block.to::<u64>().saturating_sub(1);
        debug!(tx = %tx.hash, block, steps = steps.len(), "new session");

        Ok(Self {
            sources,
            tx,
            steps,
            breakpoints: Breakpoints::new(),
            direction: Direction::Forward,
            index: 0,
            applied: None,
            state: State::new(provider, block, storage_nocache),
        })
    }

    pub fn tx(&self) -> &TransactionInfo {
        &self.tx
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Applies the step under the cursor and moves the cursor. Returns `true` once the end
    /// (or, backwards, the beginning) of the steps is reached.
    pub fn step(&mut self) -> bool {
        let Some(step) = self.steps.get(self.index) else { return true };
        self.state.apply(step);
        self.applied = Some(self.index);

        match self.direction {
            Direction::Forward => {
                self.index += 1;
                self.index == self.steps.len()
            }
            Direction::Backward => match self.index.checked_sub(1) {
                Some(index) => {
                    self.index = index;
                    false
                }
                None => true,
            },
        }
    }

    /// The applied step.
    pub fn current(&self) -> Option<&Step> {
        self.steps.get(self.applied?)
    }

    /// Changes the direction the cursor moves in. The next step is the neighbour of the
    /// applied step in the new direction.
    pub fn set_direction(&mut self, direction: Direction) {
        if direction == self.direction {
            return;
        }
        if let Some(applied) = self.applied {
            self.index = match direction {
                Direction::Forward => applied + 1,
                Direction::Backward => applied.saturating_sub(1),
            };
        }
        self.direction = direction;
    }

    pub fn reverse(&mut self) {
        self.set_direction(match self.direction {
            Direction::Forward => Direction::Backward,
            Direction::Backward => Direction::Forward,
        });
    }

    pub fn breakpoints(&self) -> &Breakpoints {
        &self.breakpoints
    }

    pub fn set_breakpoints(&mut self, breakpoints: Breakpoints) {
        self.breakpoints = breakpoints;
    }

    fn is_breakpoint(&self, step: &Step) -> bool {
        step.line().is_some_and(|line| {
            self.breakpoints.get(&step.file_name).is_some_and(|lines| lines.contains(&line))
        })
    }

    /// Steps until a step on a breakpoint line is applied. Returns `true` when the end was
    /// reached instead.
    pub fn continue_until_breakpoint(&mut self) -> bool {
        loop {
            if self.step() {
                return true;
            }
            if self.current().is_some_and(|step| self.is_breakpoint(step)) {
                return false;
            }
        }
    }

    /// The source line of the applied step.
    pub fn get_line(&self) -> Option<&str> {
        let step = self.current()?;
        self.sources.get(&step.file_name)?.line(step.line()?)
    }

    /// The variables of the applied step in `scope`, with their decoded values.
    pub async fn get_variables(&mut self, scope: Scope) -> Vec<(String, Value)> {
        let assignments: Vec<Assignment> = match self.current() {
            Some(step) => step
                .assignments
                .iter()
                .filter(|assignment| assignment.variable.state == (scope == Scope::Global))
                .cloned()
                .collect(),
            None => return Vec::new(),
        };
        self.state.decode_all(&assignments).await
    }
}
