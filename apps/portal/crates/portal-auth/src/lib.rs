//! Session and role handling for the HW Legacy Group portal.
//!
//! [`SessionController`] is the single owner of the signed-in identity and
//! its role. It talks to the hosted services through the [`IdentityProvider`]
//! and [`RoleDirectory`] traits; [`SupabaseAuthClient`] implements both.

mod controller;
mod error;
mod guards;
mod provider;
mod session_fsm;
mod supabase;
mod types;

pub use controller::SessionController;
pub use error::{AuthError, AuthResult};
pub use guards::{guard, nav_links, Access, NavLink, NavTarget, Route};
pub use provider::{AuthEventBus, AuthSubscription, IdentityProvider, RoleDirectory};
pub use session_fsm::{SessionInput, SessionMachine, SessionMachineState, SessionPhase};
pub use supabase::{RefreshConfig, SupabaseAuthClient};
pub use types::{
    AccountCreation, AuthChangeEvent, AuthEvent, Identity, Role, Session, SessionState,
};
