//! Route table, access guards and the navigation model.

use crate::{Role, SessionState};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// A portal route.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Route {
    Home,
    About,
    Properties,
    Property(String),
    Businesses,
    Business(String),
    Login,
    Register,
    Dashboard,
    Admin,
    Page(String),
}

impl Route {
    /// Parse a path such as `/properties/42?tab=photos`.
    ///
    /// Query strings, fragments and a trailing slash are ignored. Returns
    /// `None` for paths outside the route table.
    pub fn parse(path: &str) -> Option<Route> {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        let route = match segments.as_slice() {
            [] => Route::Home,
            ["about"] => Route::About,
            ["properties"] => Route::Properties,
            ["properties", id] => Route::Property(id.to_string()),
            ["businesses"] => Route::Businesses,
            ["businesses", id] => Route::Business(id.to_string()),
            ["login"] => Route::Login,
            ["register"] => Route::Register,
            ["dashboard"] => Route::Dashboard,
            ["admin"] => Route::Admin,
            ["pages", slug] => Route::Page(slug.to_string()),
            _ => return None,
        };
        Some(route)
    }

    pub fn path(&self) -> String {
        match self {
            Route::Home => "/".to_string(),
            Route::About => "/about".to_string(),
            Route::Properties => "/properties".to_string(),
            Route::Property(id) => format!("/properties/{id}"),
            Route::Businesses => "/businesses".to_string(),
            Route::Business(id) => format!("/businesses/{id}"),
            Route::Login => "/login".to_string(),
            Route::Register => "/register".to_string(),
            Route::Dashboard => "/dashboard".to_string(),
            Route::Admin => "/admin".to_string(),
            Route::Page(slug) => format!("/pages/{slug}"),
        }
    }

    /// Routes that need the session to be settled before deciding.
    pub fn is_protected(&self) -> bool {
        matches!(self, Route::Dashboard | Route::Admin)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

impl FromStr for Route {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Route::parse(s).ok_or_else(|| format!("unknown route: {s}"))
    }
}

/// Guard decision for a route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    Allow,
    /// Session still loading; decide again once it settles.
    Pending,
    Redirect(Route),
}

/// Decide whether `state` may view `route`.
///
/// `/admin` needs the admin role and sends everyone else home. `/dashboard`
/// needs a signed-in user and sends visitors to the login page.
pub fn guard(route: &Route, state: &SessionState) -> Access {
    if !route.is_protected() {
        return Access::Allow;
    }
    if state.loading {
        return Access::Pending;
    }

    match route {
        Route::Admin if state.is_admin() => Access::Allow,
        Route::Admin => Access::Redirect(Route::Home),
        Route::Dashboard if state.is_authenticated() => Access::Allow,
        Route::Dashboard => Access::Redirect(Route::Login),
        _ => Access::Allow,
    }
}

/// What a navigation entry does when chosen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "path", rename_all = "snake_case")]
pub enum NavTarget {
    Link(String),
    SignOut,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavLink {
    pub label: &'static str,
    pub target: NavTarget,
}

impl NavLink {
    fn link(label: &'static str, route: Route) -> Self {
        Self {
            label,
            target: NavTarget::Link(route.path()),
        }
    }
}

/// Navigation bar entries for `state`.
pub fn nav_links(state: &SessionState) -> Vec<NavLink> {
    let mut links = vec![
        NavLink::link("Home", Route::Home),
        NavLink::link("Properties", Route::Properties),
        NavLink::link("Businesses", Route::Businesses),
        NavLink::link("About Us", Route::About),
    ];

    if state.is_authenticated() {
        if state.role == Some(Role::Admin) {
            links.push(NavLink::link("Admin Dashboard", Route::Admin));
        } else {
            links.push(NavLink::link("User Dashboard", Route::Dashboard));
        }
        links.push(NavLink {
            label: "Sign Out",
            target: NavTarget::SignOut,
        });
    } else {
        links.push(NavLink::link("Login", Route::Login));
        links.push(NavLink::link("Register", Route::Register));
    }

    links
}
