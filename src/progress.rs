//! Cooperative stepping for long-running operations.
//!
//! Long operations (indexing a whole collection) advance through discrete
//! `continue_step` calls. Each step does a bounded amount of work and
//! returns control to the caller, which may stop calling at any point;
//! everything committed so far stays durable.

use crate::error::Result;

/// Outcome of a single continuation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// More work remains; call `continue_step` again.
    ToBeContinued,
    /// The operation completed.
    Finished,
}

/// A pausable, resumable operation driven by a caller-side loop.
pub trait Progressive {
    /// Advance the operation by one bounded unit of work.
    ///
    /// An `Err` return is terminal: the operation is in its failure state
    /// and further calls return the same kind of error.
    fn continue_step(&mut self) -> Result<StepOutcome>;

    /// Completion estimate scaled to 0..=100, or -1 when the total amount
    /// of work is not yet known.
    fn rate_of_progress(&self) -> i32;

    /// Drive `continue_step` until the operation finishes.
    fn run_to_end(&mut self) -> Result<()> {
        while self.continue_step()? == StepOutcome::ToBeContinued {}
        Ok(())
    }
}
