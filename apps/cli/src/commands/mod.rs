//! CLI command implementations.

mod auth;
mod content;
mod pages;

pub use auth::{login, logout, register, route, status};
pub use content::{admin_overview, content_delete, content_list, content_set};
pub use pages::{pages_create, pages_delete, pages_list, pages_show, pages_update};

use anyhow::{bail, Result};
use std::io::{self, Write};

/// Prompt for an email address and a hidden password.
fn prompt_credentials() -> Result<(String, String)> {
    // Prompts on stderr; stdout carries command output
    eprint!("Email: ");
    io::stderr().flush()?;
    let mut email = String::new();
    io::stdin().read_line(&mut email)?;
    let email = email.trim().to_string();

    if email.is_empty() {
        bail!("Email is required");
    }

    let password = rpassword::prompt_password("Password: ")?;
    if password.is_empty() {
        bail!("Password is required");
    }

    Ok((email, password))
}
