//! Ordered first-success-wins candidate chains.
//!
//! Both the direct tier (`{w},` then `max` then `full`) and each tile
//! (`{w},` then `pct:100` then `full`) are an ordered list of requests where
//! the first success wins. [`FallbackChain`] walks such a list:
//!
//! ```text
//!   TryingCandidate(0) ──reject──▶ TryingCandidate(1) ──reject──▶ ... ──▶ Exhausted
//!          │                              │
//!        accept                         accept
//!          ▼                              ▼
//!     Accepted(0)                    Accepted(1)
//! ```
//!
//! Each candidate is tried exactly once and there is no way back from
//! `Accepted` or `Exhausted`.

use crate::error::AttemptLog;

/// Position of a [`FallbackChain`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainState {
    /// Candidate `i` is the one to try next
    TryingCandidate(usize),

    /// Candidate `i` succeeded
    Accepted(usize),

    /// Every candidate was rejected
    Exhausted,
}

/// An ordered list of candidates evaluated until one is accepted.
#[derive(Debug, Clone)]
pub struct FallbackChain<T> {
    candidates: Vec<T>,
    state: ChainState,
    attempts: AttemptLog,
}

impl<T> FallbackChain<T> {
    /// Start a chain at its first candidate. An empty list starts exhausted.
    pub fn new(candidates: Vec<T>) -> Self {
        let state = if candidates.is_empty() {
            ChainState::Exhausted
        } else {
            ChainState::TryingCandidate(0)
        };
        Self {
            candidates,
            state,
            attempts: AttemptLog::new(),
        }
    }

    pub fn state(&self) -> ChainState {
        self.state
    }

    /// The candidate to try next, if the chain is still running.
    pub fn current(&self) -> Option<&T> {
        match self.state {
            ChainState::TryingCandidate(i) => self.candidates.get(i),
            _ => None,
        }
    }

    /// Mark the current candidate as successful.
    pub fn accept(&mut self) {
        if let ChainState::TryingCandidate(i) = self.state {
            self.state = ChainState::Accepted(i);
        }
    }

    /// Record why the current candidate failed and move to the next one.
    pub fn reject(&mut self, url: impl Into<String>, reason: impl Into<String>) {
        if let ChainState::TryingCandidate(i) = self.state {
            self.attempts.push(url, reason);
            self.state = if i + 1 < self.candidates.len() {
                ChainState::TryingCandidate(i + 1)
            } else {
                ChainState::Exhausted
            };
        }
    }

    /// The accepted candidate, if any.
    pub fn accepted(&self) -> Option<&T> {
        match self.state {
            ChainState::Accepted(i) => self.candidates.get(i),
            _ => None,
        }
    }

    /// Rejections recorded so far.
    pub fn attempts(&self) -> &AttemptLog {
        &self.attempts
    }

    pub fn into_attempts(self) -> AttemptLog {
        self.attempts
    }
}
