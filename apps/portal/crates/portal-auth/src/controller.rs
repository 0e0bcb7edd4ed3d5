//! Session/role controller.
//!
//! Owns the process-wide [`SessionState`]. State changes come from three
//! places:
//! - the startup session check
//! - the provider's session-change subscription, handled serially by a
//!   listener task
//! - explicit `sign_in` / `sign_up` / `sign_out` calls
//!
//! Every mutation goes through one mutex that guards the FSM and a
//! generation counter. Role lookups run outside the lock and carry the
//! generation they were started under; a result whose generation is no
//! longer current is dropped, so a late lookup can never attach a role to a
//! newer (or absent) identity.

use crate::provider::{AuthSubscription, IdentityProvider, RoleDirectory};
use crate::session_fsm::{SessionInput, SessionMachine, SessionMachineState, SessionPhase};
use crate::{AuthError, AuthEvent, AuthResult, Identity, Role, SessionState};
use parking_lot::Mutex;
use portal_storage::SessionStore;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

struct Core {
    machine: SessionMachine,
    generation: u64,
}

struct Inner {
    provider: Arc<dyn IdentityProvider>,
    roles: Arc<dyn RoleDirectory>,
    store: Arc<SessionStore>,
    core: Mutex<Core>,
    state_tx: watch::Sender<SessionState>,
}

impl Inner {
    fn consume(core: &mut Core, input: &SessionInput) -> AuthResult<()> {
        core.machine.consume(input).map_err(|_| {
            AuthError::InvalidStateTransition(format!(
                "Cannot apply {:?} in state {:?}",
                input,
                core.machine.state()
            ))
        })?;
        Ok(())
    }

    fn phase(&self) -> SessionPhase {
        SessionPhase::from(self.core.lock().machine.state())
    }

    /// Record `identity` as current and mark the role pending.
    ///
    /// The role of the previous identity is kept only when the user id is
    /// unchanged. Returns the generation the role lookup must report under.
    fn begin_session(&self, identity: Identity, input: SessionInput) -> AuthResult<u64> {
        let mut core = self.core.lock();
        self.begin_locked(&mut core, identity, input)
    }

    /// Provider-reported session for `identity`.
    ///
    /// Returns `None` when that identity is already current and its role
    /// lookup is still in flight; the pending lookup settles it.
    fn session_changed(&self, identity: Identity) -> AuthResult<Option<u64>> {
        let mut core = self.core.lock();
        let resolving_same_user = matches!(core.machine.state(), SessionMachineState::ResolvingRole)
            && self
                .state_tx
                .borrow()
                .identity
                .as_ref()
                .is_some_and(|current| current.id == identity.id);
        if resolving_same_user {
            debug!(user_id = %identity.id, "Role lookup already in flight for this session");
            return Ok(None);
        }
        self.begin_locked(&mut core, identity, SessionInput::SessionChanged)
            .map(Some)
    }

    fn begin_locked(&self, core: &mut Core, identity: Identity, input: SessionInput) -> AuthResult<u64> {
        Self::consume(core, &input)?;
        core.generation += 1;
        let generation = core.generation;

        self.state_tx.send_modify(|state| {
            let same_user = state
                .identity
                .as_ref()
                .is_some_and(|current| current.id == identity.id);
            if !same_user {
                state.role = None;
            }
            state.identity = Some(identity);
            state.loading = true;
        });

        Ok(generation)
    }

    /// Clear identity and role in one update.
    fn end_session(&self, input: SessionInput) -> AuthResult<()> {
        let mut core = self.core.lock();
        Self::consume(&mut core, &input)?;
        core.generation += 1;
        self.state_tx.send_replace(SessionState::signed_out());
        Ok(())
    }

    /// Apply a role lookup outcome if its generation is still current.
    fn finish_role(&self, generation: u64, role: Option<Role>, input: SessionInput) -> bool {
        let mut core = self.core.lock();
        if core.generation != generation {
            debug!(
                generation,
                current = core.generation,
                "Discarding stale role lookup result"
            );
            return false;
        }
        if let Err(e) = Self::consume(&mut core, &input) {
            warn!(error = %e, "Role result does not fit the session state");
            return false;
        }

        self.state_tx.send_modify(|state| {
            state.role = role;
            state.loading = false;
        });
        true
    }

    /// Look up the role for `identity`. Failures degrade to no role.
    async fn resolve_role(&self, identity: &Identity, generation: u64) {
        match self.roles.lookup_role(&identity.id).await {
            Ok(role) => {
                if self.finish_role(generation, role, SessionInput::RoleResolved) {
                    info!(user_id = %identity.id, role = ?role, "Role resolved");
                }
            }
            Err(e) => {
                warn!(
                    user_id = %identity.id,
                    error = %e,
                    "Role lookup failed, continuing without a role"
                );
                self.finish_role(generation, None, SessionInput::RoleLookupFailed);
            }
        }
    }

    fn spawn_resolve(self: &Arc<Self>, identity: Identity, generation: u64) {
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            inner.resolve_role(&identity, generation).await;
        });
    }

    /// Startup session check.
    ///
    /// `SessionFound` and `NoSession` are only accepted while initializing,
    /// so a result that arrives after an explicit sign-in or sign-out is
    /// dropped by the FSM.
    async fn startup(self: &Arc<Self>) {
        let session = match self.provider.get_session().await {
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, "Startup session check failed, treating as signed out");
                None
            }
        };

        match session {
            Some(session) => {
                match self.begin_session(session.identity.clone(), SessionInput::SessionFound) {
                    Ok(generation) => {
                        info!(user_id = %session.identity.id, "Existing session found on startup");
                        self.spawn_resolve(session.identity, generation);
                    }
                    Err(_) => debug!("Startup session superseded"),
                }
            }
            None => match self.end_session(SessionInput::NoSession) {
                Ok(()) => info!("No existing session found on startup"),
                Err(_) => debug!("Startup result superseded"),
            },
        }
    }

    fn handle_event(self: &Arc<Self>, event: AuthEvent) {
        debug!(
            event = ?event.kind,
            has_session = event.session.is_some(),
            "Session change received"
        );

        match event.session {
            Some(session) => {
                match self.session_changed(session.identity.clone()) {
                    Ok(Some(generation)) => self.spawn_resolve(session.identity, generation),
                    Ok(None) => {}
                    Err(e) => warn!(error = %e, "Ignoring session change"),
                }
            }
            None => {
                if let Err(e) = self.end_session(SessionInput::SessionCleared) {
                    warn!(error = %e, "Ignoring session clear");
                }
            }
        }
    }
}

async fn run_listener(
    inner: Arc<Inner>,
    mut subscription: AuthSubscription,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    tokio::select! {
        _ = inner.startup() => {}
        _ = shutdown_rx.recv() => {
            subscription.unsubscribe();
            debug!("Session listener stopped during startup");
            return;
        }
    }

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            event = subscription.recv() => match event {
                Some(event) => inner.handle_event(event),
                None => {
                    debug!("Auth event bus closed");
                    break;
                }
            },
        }
    }

    subscription.unsubscribe();
    debug!("Session listener stopped");
}

/// Owner of the session state for the lifetime of a portal context.
///
/// Construct once with [`SessionController::start`] and call
/// [`SessionController::shutdown`] when the context goes away. Readers get
/// snapshots via [`SessionController::state`] or a [`watch::Receiver`].
pub struct SessionController {
    inner: Arc<Inner>,
    shutdown_tx: broadcast::Sender<()>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl SessionController {
    /// Subscribe to the provider and start the startup session check.
    ///
    /// Must be called from within a tokio runtime. The subscription is taken
    /// before the check runs so no session change is missed.
    pub fn start(
        provider: Arc<dyn IdentityProvider>,
        roles: Arc<dyn RoleDirectory>,
        store: Arc<SessionStore>,
    ) -> Self {
        let (state_tx, _) = watch::channel(SessionState::initial());
        let subscription = provider.subscribe();

        let inner = Arc::new(Inner {
            provider,
            roles,
            store,
            core: Mutex::new(Core {
                machine: SessionMachine::new(),
                generation: 0,
            }),
            state_tx,
        });

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let listener = tokio::spawn(run_listener(Arc::clone(&inner), subscription, shutdown_rx));

        Self {
            inner,
            shutdown_tx,
            listener: Mutex::new(Some(listener)),
        }
    }

    /// Current state snapshot.
    pub fn state(&self) -> SessionState {
        self.inner.state_tx.borrow().clone()
    }

    /// Current FSM phase.
    pub fn phase(&self) -> SessionPhase {
        self.inner.phase()
    }

    /// Receiver that observes every state replacement.
    pub fn watch(&self) -> watch::Receiver<SessionState> {
        self.inner.state_tx.subscribe()
    }

    /// Wait until `loading` is false and return that state.
    ///
    /// Never returns if a provider call or role lookup hangs.
    pub async fn settled(&self) -> SessionState {
        let mut rx = self.watch();
        rx.wait_for(|state| !state.loading)
            .await
            .map(|state| state.clone())
            .unwrap_or_else(|_| self.state())
    }

    /// Sign in with email and password and resolve the role before returning.
    ///
    /// On failure the state is left unchanged.
    pub async fn sign_in(&self, email: &str, password: &str) -> AuthResult<Identity> {
        let session = match self.inner.provider.verify_credentials(email, password).await {
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, "Sign-in failed");
                return Err(e);
            }
        };

        let identity = session.identity;
        let generation = self
            .inner
            .begin_session(identity.clone(), SessionInput::CredentialsAccepted)?;
        self.inner.resolve_role(&identity, generation).await;

        info!(user_id = %identity.id, "Signed in");
        Ok(identity)
    }

    /// Create an account. When the provider returns a session the user is
    /// signed in exactly like [`SessionController::sign_in`]; when email
    /// confirmation is pending the state is left unchanged.
    pub async fn sign_up(&self, email: &str, password: &str) -> AuthResult<Identity> {
        let created = match self.inner.provider.create_account(email, password).await {
            Ok(created) => created,
            Err(e) => {
                warn!(error = %e, "Sign-up failed");
                return Err(e);
            }
        };

        match created.session {
            Some(session) => {
                let generation = self
                    .inner
                    .begin_session(session.identity.clone(), SessionInput::CredentialsAccepted)?;
                self.inner.resolve_role(&session.identity, generation).await;
                info!(user_id = %session.identity.id, "Signed up and signed in");
            }
            None => {
                info!(user_id = %created.identity.id, "Signed up, email confirmation pending");
            }
        }

        Ok(created.identity)
    }

    /// Terminate the hosted session, then clear local state and purge client
    /// storage.
    ///
    /// When the provider rejects the request the local state is left as-is
    /// and the error is returned.
    pub async fn sign_out(&self) -> AuthResult<()> {
        if let Err(e) = self.inner.provider.terminate_session().await {
            warn!(error = %e, "Sign-out failed, keeping local session");
            return Err(e);
        }

        self.inner.end_session(SessionInput::SignOutComplete)?;

        if let Err(e) = self.inner.store.purge_all() {
            warn!(error = %e, "Failed to purge client storage after sign-out");
        }

        info!("Signed out");
        Ok(())
    }

    /// Stop the listener and release the provider subscription.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
        let listener = self.listener.lock().take();
        if let Some(handle) = listener {
            if let Err(e) = handle.await {
                warn!(error = %e, "Session listener ended abnormally");
            }
        }
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        if let Some(handle) = self.listener.get_mut().take() {
            handle.abort();
        }
    }
}
