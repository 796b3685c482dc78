//! Progress reporting trait.
//!
//! This module defines the ProgressCallback trait, which decouples the
//! backup loop from whatever surface shows progress (console, host progress
//! dialog, GUI). The surface is also where cancellation comes from: the loop
//! polls `is_cancel_requested` before every action.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::model::{BackupAction, BackupPlan};
use crate::summary::RunOutcome;

/// Trait for receiving progress updates from a backup run.
///
/// All methods are called synchronously during the run.
pub trait ProgressCallback: Send {
    /// Called once before the first action, with the total step count.
    fn on_run_started(&self, plan: &BackupPlan);

    /// Called when an action is about to be processed.
    ///
    /// `message` is the step text, e.g. "Backing up file 2 of 5: Bracket".
    fn on_action_started(&self, plan: &BackupPlan, index: usize, action: &BackupAction, message: &str);

    /// Called when an action reached a terminal state.
    fn on_action_completed(&self, plan: &BackupPlan, index: usize, action: &BackupAction);

    /// Called when the run ends, normally or by cancellation.
    fn on_run_finished(&self, plan: &BackupPlan, outcome: &RunOutcome);

    /// Polled before each action; returning true stops the run.
    fn is_cancel_requested(&self) -> bool {
        false
    }
}

/// Step text shown for action `index` (zero-based) of `total`.
pub fn step_message(index: usize, total: usize, name: &str) -> String {
    format!("Backing up file {} of {}: {}", index + 1, total, name)
}

/// Shared cancellation flag.
///
/// Clones share the same flag, so a UI thread can hold one clone and the
/// progress surface another.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_canceled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_message_is_one_based() {
        assert_eq!(step_message(0, 3, "Part A_"), "Backing up file 1 of 3: Part A_");
        assert_eq!(step_message(2, 3, "x"), "Backing up file 3 of 3: x");
    }

    #[test]
    fn test_cancel_token_clones_share_state() {
        let token = CancelToken::new();
        let other = token.clone();
        assert!(!other.is_canceled());

        token.cancel();
        assert!(other.is_canceled());
    }
}
