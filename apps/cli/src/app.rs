//! Per-invocation portal context.

use anyhow::{bail, Context, Result};
use portal_auth::{guard, Access, Route, SessionController, SessionState, SupabaseAuthClient};
use portal_config_and_utils::{Config, Paths};
use portal_content::ContentClient;
use portal_storage::create_session_store;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// How long to wait for the startup session check before giving up.
const SETTLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Everything a command needs: configuration, the Supabase client and the
/// session controller built on top of it.
///
/// One context is opened per command and closed when the command finishes,
/// which releases the controller's provider subscription.
pub struct PortalContext {
    pub config: Config,
    auth: Arc<SupabaseAuthClient>,
    pub controller: SessionController,
}

impl PortalContext {
    /// Load configuration, open storage and start the controller.
    pub async fn open(paths: &Paths) -> Result<Self> {
        let config = Config::load(paths).context("Failed to load configuration")?;
        config.validate().context("Invalid configuration")?;

        let store = Arc::new(create_session_store(paths, config.persist_session)?);
        let auth = Arc::new(SupabaseAuthClient::from_config(&config, Arc::clone(&store)));
        let controller = SessionController::start(auth.clone(), auth.clone(), store);

        let context = Self {
            config,
            auth,
            controller,
        };
        context.settle().await?;
        Ok(context)
    }

    async fn settle(&self) -> Result<SessionState> {
        match tokio::time::timeout(SETTLE_TIMEOUT, self.controller.settled()).await {
            Ok(state) => {
                debug!(
                    authenticated = state.is_authenticated(),
                    role = ?state.role,
                    "Session settled"
                );
                Ok(state)
            }
            Err(_) => {
                warn!("Timed out waiting for the session check");
                bail!("Timed out contacting {}", self.auth.api_url());
            }
        }
    }

    /// Content client acting as the signed-in user when there is one.
    pub fn content_client(&self) -> Result<ContentClient> {
        let access_token = if self.controller.state().is_authenticated() {
            self.auth.access_token()?
        } else {
            None
        };
        Ok(ContentClient::from_config(&self.config).with_access_token(access_token))
    }

    /// Fail unless the current session may open `route`.
    pub fn require(&self, route: &Route) -> Result<()> {
        match guard(route, &self.controller.state()) {
            Access::Allow => Ok(()),
            Access::Pending => bail!("Session is still loading"),
            Access::Redirect(Route::Login) => bail!("Not logged in. Run 'hwlg login' first"),
            Access::Redirect(_) => bail!("This command requires the admin role"),
        }
    }

    /// Stop the controller.
    pub async fn close(self) {
        self.controller.shutdown().await;
    }
}
