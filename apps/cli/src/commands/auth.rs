//! Authentication commands.

use super::prompt_credentials;
use crate::app::PortalContext;
use crate::output::{self, OutputFormat};
use anyhow::{anyhow, Result};
use portal_auth::{guard, nav_links, Access, NavLink, NavTarget, Role, Route, SessionPhase};
use serde::Serialize;

/// Login with email and password.
pub async fn login(ctx: &PortalContext, format: OutputFormat) -> Result<()> {
    let state = ctx.controller.state();
    if let Some(identity) = &state.identity {
        output::print_success(&format!("Already logged in as {}", identity.email), format);
        return Ok(());
    }

    let (email, password) = prompt_credentials()?;
    output::print_progress("Logging in...", format);

    let identity = ctx
        .controller
        .sign_in(&email, &password)
        .await
        .map_err(|e| anyhow!("Login failed: {}", e))?;

    let role = role_label(ctx.controller.state().role);
    output::print_success(
        &format!("Logged in as {} (role: {})", identity.email, role),
        format,
    );
    Ok(())
}

/// Create an account with email and password.
pub async fn register(ctx: &PortalContext, format: OutputFormat) -> Result<()> {
    if let Some(identity) = &ctx.controller.state().identity {
        output::print_error(
            &format!("Already logged in as {}. Log out first", identity.email),
            format,
        );
        return Ok(());
    }

    let (email, password) = prompt_credentials()?;
    output::print_progress("Creating account...", format);

    let identity = ctx
        .controller
        .sign_up(&email, &password)
        .await
        .map_err(|e| anyhow!("Registration failed: {}", e))?;

    let signed_in = ctx
        .controller
        .state()
        .identity
        .is_some_and(|current| current.id == identity.id);
    if signed_in {
        output::print_success(&format!("Account created, logged in as {}", identity.email), format);
    } else {
        output::print_success(
            &format!(
                "Account created for {}. Check your email to confirm it, then run 'hwlg login'",
                identity.email
            ),
            format,
        );
    }
    Ok(())
}

/// Logout and clear all local session data.
pub async fn logout(ctx: &PortalContext, format: OutputFormat) -> Result<()> {
    if !ctx.controller.state().is_authenticated() {
        output::print_success("Not logged in", format);
        return Ok(());
    }

    ctx.controller
        .sign_out()
        .await
        .map_err(|e| anyhow!("Logout failed: {}", e))?;
    output::print_success("Logged out successfully", format);
    Ok(())
}

#[derive(Debug, Serialize)]
struct StatusReport {
    logged_in: bool,
    user_id: Option<String>,
    email: Option<String>,
    role: Option<Role>,
    loading: bool,
    phase: SessionPhase,
    navigation: Vec<NavLink>,
}

/// Show the session state and the navigation it unlocks.
pub async fn status(ctx: &PortalContext, format: OutputFormat) -> Result<()> {
    let state = ctx.controller.state();
    let report = StatusReport {
        logged_in: state.is_authenticated(),
        user_id: state.identity.as_ref().map(|i| i.id.clone()),
        email: state.identity.as_ref().map(|i| i.email.clone()),
        role: state.role,
        loading: state.loading,
        phase: ctx.controller.phase(),
        navigation: nav_links(&state),
    };

    match format {
        OutputFormat::Text => {
            output::print_heading("Session");
            if report.logged_in {
                output::print_row("Auth", "logged in");
                output::print_row("User ID", report.user_id.as_deref().unwrap_or("-"));
                output::print_row("Email", report.email.as_deref().unwrap_or("-"));
                output::print_row("Role", role_label(report.role));
            } else {
                output::print_row("Auth", "not logged in");
            }
            output::print_row("Phase", &format!("{:?}", report.phase));

            output::print_heading("Navigation");
            for link in &report.navigation {
                match &link.target {
                    NavTarget::Link(path) => output::print_row(link.label, path),
                    NavTarget::SignOut => output::print_row(link.label, "hwlg logout"),
                }
            }
        }
        OutputFormat::Json => output::print_json(&report)?,
    }
    Ok(())
}

#[derive(Debug, PartialEq, Eq, Serialize)]
struct RouteReport {
    route: String,
    access: &'static str,
    redirect: Option<String>,
}

impl RouteReport {
    fn new(route: &Route, access: &Access) -> Self {
        let (access, redirect) = match access {
            Access::Allow => ("allow", None),
            Access::Pending => ("pending", None),
            Access::Redirect(target) => ("redirect", Some(target.path())),
        };
        Self {
            route: route.path(),
            access,
            redirect,
        }
    }
}

/// Evaluate the route guard for `path` against the current session.
pub async fn route(ctx: &PortalContext, path: &str, format: OutputFormat) -> Result<()> {
    let route = Route::parse(path).ok_or_else(|| anyhow!("Unknown route: {}", path))?;
    let access = guard(&route, &ctx.controller.state());
    let report = RouteReport::new(&route, &access);

    match format {
        OutputFormat::Text => match &report.redirect {
            Some(target) => println!("{} -> redirect to {}", report.route, target),
            None => println!("{} -> {}", report.route, report.access),
        },
        OutputFormat::Json => output::print_json(&report)?,
    }
    Ok(())
}

fn role_label(role: Option<Role>) -> &'static str {
    role.map(|r| r.as_str()).unwrap_or("none")
}
