//! Application lifecycle state machine.
//!
//! Tracks the host-driven lifecycle (created → started → resumed → paused →
//! stopped → destroyed, with restart transitions) and validates each host
//! event against the current state. The bridge never invents transitions; it
//! only forwards host-issued ones, and rejects out-of-order events with a
//! logged [`ProtocolViolation`] instead of crashing.

use crate::errors::ProtocolViolation;

/// Lifecycle of the application instance. `Idle` is the absent-before-create
/// state; the engine handle exists iff the state has left `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LifecycleState {
    Idle = 0,
    Created = 1,
    Started = 2,
    Resumed = 3,
    Paused = 4,
    Stopped = 5,
    Destroyed = 6,
}

impl LifecycleState {
    pub fn name(self) -> &'static str {
        match self {
            LifecycleState::Idle => "Idle",
            LifecycleState::Created => "Created",
            LifecycleState::Started => "Started",
            LifecycleState::Resumed => "Resumed",
            LifecycleState::Paused => "Paused",
            LifecycleState::Stopped => "Stopped",
            LifecycleState::Destroyed => "Destroyed",
        }
    }

    pub(crate) fn from_u8(raw: u8) -> Self {
        match raw {
            1 => LifecycleState::Created,
            2 => LifecycleState::Started,
            3 => LifecycleState::Resumed,
            4 => LifecycleState::Paused,
            5 => LifecycleState::Stopped,
            6 => LifecycleState::Destroyed,
            _ => LifecycleState::Idle,
        }
    }

    /// Range in which the surface timeline is serviced: Started..Stopped
    /// inclusive. Surface callbacks outside it are ignored and logged.
    pub fn is_surface_active(self) -> bool {
        matches!(
            self,
            LifecycleState::Started
                | LifecycleState::Resumed
                | LifecycleState::Paused
                | LifecycleState::Stopped
        )
    }
}

/// One host lifecycle notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    Create,
    Start,
    Restart,
    Resume,
    Pause,
    Stop,
    Destroy,
}

impl LifecycleEvent {
    pub fn name(self) -> &'static str {
        match self {
            LifecycleEvent::Create => "on_create",
            LifecycleEvent::Start => "on_start",
            LifecycleEvent::Restart => "on_restart",
            LifecycleEvent::Resume => "on_resume",
            LifecycleEvent::Pause => "on_pause",
            LifecycleEvent::Stop => "on_stop",
            LifecycleEvent::Destroy => "on_destroy",
        }
    }
}

#[derive(Debug)]
pub struct LifecycleMachine {
    state: LifecycleState,
}

impl Default for LifecycleMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl LifecycleMachine {
    pub fn new() -> Self {
        Self {
            state: LifecycleState::Idle,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Validate `event` against the current state without committing it.
    ///
    /// Returns the state the machine would enter. `Restart` is legal only in
    /// `Stopped` and does not move the state by itself; the host follows it
    /// with `Start`.
    pub fn peek(&self, event: LifecycleEvent) -> Result<LifecycleState, ProtocolViolation> {
        use LifecycleEvent as E;
        use LifecycleState as S;

        let next = match (self.state, event) {
            (S::Idle, E::Create) => S::Created,
            (S::Created | S::Stopped, E::Start) => S::Started,
            (S::Stopped, E::Restart) => S::Stopped,
            (S::Started | S::Paused, E::Resume) => S::Resumed,
            (S::Resumed, E::Pause) => S::Paused,
            (S::Paused, E::Stop) => S::Stopped,
            // The host may tear down an instance that never started.
            (S::Stopped | S::Created, E::Destroy) => S::Destroyed,
            (state, event) => return Err(ProtocolViolation::new(event.name(), state.name())),
        };

        Ok(next)
    }

    /// Commit `event`, returning the new state.
    pub fn apply(&mut self, event: LifecycleEvent) -> Result<LifecycleState, ProtocolViolation> {
        let next = self.peek(event)?;
        log::trace!("lifecycle {} -> {}", self.state.name(), next.name());
        self.state = next;
        Ok(next)
    }
}
