//! Connection state machine for the TN3270 handler
//!
//! Tracks the session lifecycle with permission-checked transitions, a
//! bounded transition history, per-state counters, and observer callbacks
//! fired on every successful change. The validity check is a pure
//! function of (from, to) so observers always agree on what is legal.

use std::collections::{HashMap, VecDeque};
use std::time::Instant;

/// Number of transitions retained in the history ring
const HISTORY_CAP: usize = 64;

/// Session lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Negotiating,
    Connected,
    /// NVT fallback detected; payloads are raw ASCII
    AsciiMode,
    /// Full 3270 data stream mode (classic or TN3270E)
    Tn3270Mode,
    Error,
    Recovering,
    Closing,
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Disconnected => "DISCONNECTED",
            Self::Connecting => "CONNECTING",
            Self::Negotiating => "NEGOTIATING",
            Self::Connected => "CONNECTED",
            Self::AsciiMode => "ASCII_MODE",
            Self::Tn3270Mode => "TN3270_MODE",
            Self::Error => "ERROR",
            Self::Recovering => "RECOVERING",
            Self::Closing => "CLOSING",
        }
    }

    /// States in which session operations (send, receive, edits) are allowed.
    pub fn is_operational(&self) -> bool {
        matches!(self, Self::Connected | Self::AsciiMode | Self::Tn3270Mode)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Pure transition permission check.
///
/// Closing is reachable from every live state (close is safe anywhere) and
/// Error from every connected state; everything else follows the lifecycle
/// DISCONNECTED -> CONNECTING -> NEGOTIATING -> CONNECTED -> mode ->
/// (ERROR | RECOVERING)* -> CLOSING -> DISCONNECTED.
pub fn is_valid_transition(from: SessionState, to: SessionState) -> bool {
    use SessionState::*;
    if from == to {
        return false;
    }
    match (from, to) {
        (_, Closing) => from != Disconnected,
        (Closing, Disconnected) => true,
        (Disconnected, Connecting) => true,
        (Connecting, Negotiating) | (Connecting, Error) => true,
        (Negotiating, Connected)
        | (Negotiating, AsciiMode)
        | (Negotiating, Tn3270Mode)
        | (Negotiating, Error) => true,
        (Connected, AsciiMode) | (Connected, Tn3270Mode) | (Connected, Error) => true,
        (AsciiMode, Error) | (AsciiMode, Recovering) => true,
        (Tn3270Mode, Error) | (Tn3270Mode, Recovering) => true,
        (Error, Recovering) | (Error, Disconnected) => true,
        (Recovering, Connecting) | (Recovering, Error) => true,
        _ => false,
    }
}

/// One recorded transition
#[derive(Debug, Clone)]
pub struct TransitionRecord {
    pub state: SessionState,
    pub timestamp: Instant,
    pub reason: String,
}

/// Observer invoked with (old_state, new_state, reason) after a transition
pub type StateObserver = Box<dyn Fn(SessionState, SessionState, &str) + Send + Sync>;

/// Permission-checked state machine with history, counters and observers
pub struct StateMachine {
    current: SessionState,
    history: VecDeque<TransitionRecord>,
    counters: HashMap<SessionState, u64>,
    observers: Vec<StateObserver>,
}

impl std::fmt::Debug for StateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateMachine")
            .field("current", &self.current)
            .field("history_len", &self.history.len())
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    pub fn new() -> Self {
        Self {
            current: SessionState::Disconnected,
            history: VecDeque::with_capacity(HISTORY_CAP),
            counters: HashMap::new(),
            observers: Vec::new(),
        }
    }

    /// Lock-free snapshot of the current state (single Copy value).
    pub fn current(&self) -> SessionState {
        self.current
    }

    /// Attempt a transition; invalid ones are refused and logged.
    pub fn transition_to(&mut self, new_state: SessionState, reason: &str) -> bool {
        if !is_valid_transition(self.current, new_state) {
            log::warn!(
                "refused state transition {} -> {} ({reason})",
                self.current,
                new_state
            );
            return false;
        }
        let old = self.current;
        self.current = new_state;

        if self.history.len() == HISTORY_CAP {
            self.history.pop_front();
        }
        self.history.push_back(TransitionRecord {
            state: new_state,
            timestamp: Instant::now(),
            reason: reason.to_string(),
        });
        *self.counters.entry(new_state).or_insert(0) += 1;

        log::debug!("state {} -> {} ({reason})", old, new_state);
        for observer in &self.observers {
            observer(old, new_state, reason);
        }
        true
    }

    /// Register an observer fired after every successful transition.
    pub fn add_observer(&mut self, observer: StateObserver) {
        self.observers.push(observer);
    }

    /// How many times each state has been entered
    pub fn counter(&self, state: SessionState) -> u64 {
        self.counters.get(&state).copied().unwrap_or(0)
    }

    /// The bounded transition history, oldest first
    pub fn history(&self) -> impl Iterator<Item = &TransitionRecord> {
        self.history.iter()
    }
}
