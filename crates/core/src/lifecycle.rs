//! Manager lifecycle as a pure state machine.
//!
//! `installing → waiting → activating → active`, with `redundant` for
//! superseded or failed instances. [`Lifecycle::apply`] maps
//! `(state, event)` to `(state, effects)` without touching any store or
//! network; the caller runs the returned [`Effect`]s and feeds their
//! completion back in as events.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::Error;
use crate::install::{InstallPolicy, PrecacheOutcome};

/// Lifecycle states of one manager instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    Installing,
    Waiting,
    Activating,
    Active,
    Redundant,
}

impl WorkerState {
    /// Only an active instance serves requests from its store.
    pub fn intercepts(&self) -> bool {
        matches!(self, WorkerState::Active)
    }
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            WorkerState::Installing => "installing",
            WorkerState::Waiting => "waiting",
            WorkerState::Activating => "activating",
            WorkerState::Active => "active",
            WorkerState::Redundant => "redundant",
        };
        f.write_str(s)
    }
}

/// Inputs to the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// Precache finished, successfully or not.
    InstallFinished(PrecacheOutcome),
    /// The host page asked to skip the waiting phase.
    SkipWaiting,
    /// The previous instance no longer controls any client.
    PredecessorReleased,
    /// Stale stores purged and clients claimed.
    ActivationFinished,
    /// A newer instance took over.
    Superseded,
}

impl std::fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LifecycleEvent::InstallFinished(_) => "install_finished",
            LifecycleEvent::SkipWaiting => "skip_waiting",
            LifecycleEvent::PredecessorReleased => "predecessor_released",
            LifecycleEvent::ActivationFinished => "activation_finished",
            LifecycleEvent::Superseded => "superseded",
        };
        f.write_str(s)
    }
}

/// Side effects the caller must perform after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Open the store and populate it from the manifest.
    Precache,
    /// Delete every store not named for this version.
    PurgeStaleStores,
    /// Take control of all connected clients.
    ClaimClients,
}

const ACTIVATION_EFFECTS: [Effect; 2] = [Effect::PurgeStaleStores, Effect::ClaimClients];

/// Lifecycle position of one instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lifecycle {
    state: WorkerState,
    has_predecessor: bool,
    skip_waiting: bool,
}

/// Result of a transition: the next lifecycle and what to do about it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub lifecycle: Lifecycle,
    pub effects: Vec<Effect>,
}

impl Lifecycle {
    /// A freshly registered instance. It starts installing immediately.
    ///
    /// With no predecessor there is nothing to wait for, so a successful
    /// install goes straight to activation.
    pub fn start(has_predecessor: bool) -> Transition {
        Transition {
            lifecycle: Lifecycle { state: WorkerState::Installing, has_predecessor, skip_waiting: false },
            effects: vec![Effect::Precache],
        }
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// Whether a skip-waiting request arrived during install.
    pub fn skip_waiting_requested(&self) -> bool {
        self.skip_waiting
    }

    fn to(self, state: WorkerState, effects: &[Effect]) -> Transition {
        Transition { lifecycle: Lifecycle { state, ..self }, effects: effects.to_vec() }
    }

    /// Apply one event.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidTransition` for events that make no sense in
    /// the current state (e.g. anything sent to a redundant instance).
    pub fn apply(self, event: LifecycleEvent, policy: &InstallPolicy) -> Result<Transition, Error> {
        use LifecycleEvent as E;
        use WorkerState as S;

        match (self.state, &event) {
            (S::Redundant, _) => Err(Error::InvalidTransition { state: self.state, event: event.clone() }),

            (_, E::Superseded) => Ok(self.to(S::Redundant, &[])),

            (S::Installing, E::SkipWaiting) => {
                Ok(Transition { lifecycle: Lifecycle { skip_waiting: true, ..self }, effects: Vec::new() })
            }
            (S::Installing, E::InstallFinished(outcome)) => {
                if !policy.accepts(outcome) {
                    Ok(self.to(S::Redundant, &[]))
                } else if self.skip_waiting || !self.has_predecessor {
                    Ok(self.to(S::Activating, &ACTIVATION_EFFECTS))
                } else {
                    Ok(self.to(S::Waiting, &[]))
                }
            }

            (S::Waiting, E::SkipWaiting | E::PredecessorReleased) => Ok(self.to(S::Activating, &ACTIVATION_EFFECTS)),

            (S::Activating, E::ActivationFinished) => Ok(self.to(S::Active, &[])),

            // Already past the waiting phase; nothing to skip.
            (S::Activating | S::Active, E::SkipWaiting) => Ok(self.to(self.state, &[])),

            _ => Err(Error::InvalidTransition { state: self.state, event: event.clone() }),
        }
    }
}
