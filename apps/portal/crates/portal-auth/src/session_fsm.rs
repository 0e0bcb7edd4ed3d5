//! Session lifecycle state machine using rust-fsm.
//!
//! The machine tracks the phase of the session controller. The identity and
//! role themselves live in [`crate::SessionState`]; the machine only decides
//! which transitions are legal and whether the state is still loading.
//!
//! ## State Diagram
//!
//! ```text
//! ┌─────────────────┐
//! │  Initializing   │ (initial)
//! └───┬─────────┬───┘
//!     │         │ NoSession
//!     │         ▼
//!     │   ┌─────────────┐   SessionChanged / CredentialsAccepted
//!     │   │  Anonymous  │ ─────────────────────────────┐
//!     │   └─────────────┘                              │
//!     │ SessionFound  ▲                                ▼
//!     │               │ SessionCleared /        ┌───────────────┐
//!     └───────────────┼──SignOutComplete────────│ ResolvingRole │
//!                     │                         └───────┬───────┘
//!                     │                                 │ RoleResolved /
//!                     │                                 │ RoleLookupFailed
//!              ┌──────┴────────┐                        │
//!              │ Authenticated │ ◄──────────────────────┘
//!              └───────────────┘
//! ```
//!
//! Every state accepts `SessionChanged` (back to `ResolvingRole`) and
//! `SessionCleared` (to `Anonymous`). There is no terminal state.

use rust_fsm::*;
use serde::{Deserialize, Serialize};

state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub session_machine(Initializing)

    Initializing => {
        SessionFound => ResolvingRole,
        NoSession => Anonymous,
        SessionChanged => ResolvingRole,
        SessionCleared => Anonymous,
        CredentialsAccepted => ResolvingRole,
        SignOutComplete => Anonymous
    },
    ResolvingRole => {
        RoleResolved => Authenticated,
        RoleLookupFailed => Authenticated,
        SessionChanged => ResolvingRole,
        SessionCleared => Anonymous,
        CredentialsAccepted => ResolvingRole,
        SignOutComplete => Anonymous
    },
    Authenticated => {
        SessionChanged => ResolvingRole,
        SessionCleared => Anonymous,
        CredentialsAccepted => ResolvingRole,
        SignOutComplete => Anonymous
    },
    Anonymous => {
        SessionChanged => ResolvingRole,
        SessionCleared => Anonymous,
        CredentialsAccepted => ResolvingRole,
        SignOutComplete => Anonymous
    }
}

pub use session_machine::Input as SessionInput;
pub use session_machine::State as SessionMachineState;
pub use session_machine::StateMachine as SessionMachine;

/// Serializable view of the machine state for status output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// Startup session check has not completed.
    Initializing,
    /// Identity known, role lookup in flight.
    ResolvingRole,
    /// Identity known, role lookup finished (role may still be absent).
    Authenticated,
    /// No identity.
    Anonymous,
}

impl SessionPhase {
    /// Returns true while the controller is waiting on the provider or the
    /// role lookup.
    pub fn is_loading(&self) -> bool {
        matches!(self, SessionPhase::Initializing | SessionPhase::ResolvingRole)
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionPhase::ResolvingRole | SessionPhase::Authenticated)
    }
}

impl From<&SessionMachineState> for SessionPhase {
    fn from(state: &SessionMachineState) -> Self {
        match state {
            SessionMachineState::Initializing => SessionPhase::Initializing,
            SessionMachineState::ResolvingRole => SessionPhase::ResolvingRole,
            SessionMachineState::Authenticated => SessionPhase::Authenticated,
            SessionMachineState::Anonymous => SessionPhase::Anonymous,
        }
    }
}
