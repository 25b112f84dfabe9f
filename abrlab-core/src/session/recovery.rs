//! Recovery policy for fatal engine errors.
//!
//! Network failures get one reload, media failures one engine-level
//! recovery call. A second fatal error of the same class before the engine
//! shows progress means recovery did not help, and the session gives up.

use std::collections::HashSet;

use crate::media::EngineErrorKind;

/// What the session should do about a fatal engine error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    /// Restart loading the current source
    Reload,
    /// Ask the engine to recover its media pipeline
    RecoverMedia,
    /// Stop and surface the failure
    GiveUp,
}

/// Tracks which error classes have already had their recovery attempt.
#[derive(Debug, Default)]
pub struct RecoveryPolicy {
    attempted: HashSet<EngineErrorKind>,
}

impl RecoveryPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decides how to handle a fatal error of `kind`.
    pub fn on_fatal(&mut self, kind: EngineErrorKind) -> RecoveryAction {
        let action = match kind {
            EngineErrorKind::Network => RecoveryAction::Reload,
            EngineErrorKind::Media => RecoveryAction::RecoverMedia,
            EngineErrorKind::Other => return RecoveryAction::GiveUp,
        };
        if self.attempted.insert(kind) {
            action
        } else {
            RecoveryAction::GiveUp
        }
    }

    /// Engine made forward progress: recovery budget is restored.
    pub fn on_progress(&mut self) {
        self.attempted.clear();
    }

    /// Whether a recovery attempt is outstanding for `kind`.
    pub fn is_recovering(&self, kind: EngineErrorKind) -> bool {
        self.attempted.contains(&kind)
    }

    pub fn reset(&mut self) {
        self.attempted.clear();
    }
}
