//! Call lifecycle state machine.
//!
//! The `Idle → Starting → Active → Ending → Idle` transitions are guarded
//! synchronously, before any external I/O is started, so concurrent
//! `call-start` commands can never create duplicate call-session records.

/// Lifecycle of a room's (at most one) tracked call session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallState {
    Idle,
    /// A create request is in flight; no record id yet.
    Starting,
    Active {
        call_session_id: String,
    },
    /// A close request is in flight for the given record.
    Ending {
        call_session_id: String,
    },
}

pub struct CallLifecycle {
    state: CallState,
}

impl CallLifecycle {
    pub fn new() -> Self {
        Self {
            state: CallState::Idle,
        }
    }

    pub fn state(&self) -> &CallState {
        &self.state
    }

    /// Begin a call. Succeeds only from `Idle`; a `call-start` arriving while
    /// `Starting` or `Active` is rejected.
    pub fn try_start(&mut self) -> bool {
        if self.state == CallState::Idle {
            self.state = CallState::Starting;
            true
        } else {
            false
        }
    }

    /// The external record was created. `Starting → Active`.
    pub fn record_created(&mut self, call_session_id: String) -> bool {
        if self.state == CallState::Starting {
            self.state = CallState::Active { call_session_id };
            true
        } else {
            false
        }
    }

    /// The external create failed. `Starting → Idle`.
    pub fn create_failed(&mut self) {
        if self.state == CallState::Starting {
            self.state = CallState::Idle;
        }
    }

    /// The room emptied while a call was active. `Active → Ending`, returning
    /// the record id to close.
    pub fn begin_ending(&mut self) -> Option<String> {
        if let CallState::Active { call_session_id } = &self.state {
            let id = call_session_id.clone();
            self.state = CallState::Ending {
                call_session_id: id.clone(),
            };
            Some(id)
        } else {
            None
        }
    }

    /// The external record was closed. `Ending → Idle`.
    pub fn close_complete(&mut self) {
        if matches!(self.state, CallState::Ending { .. }) {
            self.state = CallState::Idle;
        }
    }

    /// The external close failed: keep the reference rather than losing it.
    /// `Ending → Active`.
    pub fn close_failed(&mut self) {
        if let CallState::Ending { call_session_id } = &self.state {
            self.state = CallState::Active {
                call_session_id: call_session_id.clone(),
            };
        }
    }
}

impl Default for CallLifecycle {
    fn default() -> Self {
        Self::new()
    }
}
