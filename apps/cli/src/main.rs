//! hwlg - command-line front end for the HW Legacy Group portal.

mod app;
mod commands;
mod output;

use app::PortalContext;
use clap::{Parser, Subcommand};
use output::OutputFormat;
use portal_config_and_utils::{init_logging, parse_level, Paths};
use portal_content::PageUpdate;
use std::path::PathBuf;
use tracing::debug;

/// hwlg - Sign in to the portal and manage its pages and site content.
#[derive(Parser)]
#[command(name = "hwlg")]
#[command(about = "HW Legacy Group portal CLI for sessions and content")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(short, long, default_value = "text", global = true)]
    format: OutputFormat,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Login with email and password
    Login,

    /// Create an account with email and password
    Register,

    /// Logout and clear all local session data
    Logout,

    /// Show session state and navigation
    Status,

    /// Check whether the current session may open a route
    Route {
        /// Route path, e.g. /admin or /properties/42
        path: String,
    },

    /// Show pages and content together (admin)
    Admin,

    /// Manage CMS pages
    Pages {
        #[command(subcommand)]
        command: PageCommands,
    },

    /// Manage site content entries (admin)
    Content {
        #[command(subcommand)]
        command: ContentCommands,
    },
}

#[derive(Subcommand)]
enum PageCommands {
    /// List pages (admin)
    List,
    /// Show a page as plain text
    Show {
        /// Page slug
        slug: String,
    },
    /// Create a page (admin)
    Create {
        /// Page title
        #[arg(short, long)]
        title: String,
        /// URL slug (lowercase letters, digits and hyphens)
        #[arg(short, long)]
        slug: String,
        /// HTML body
        #[arg(short, long, conflicts_with = "content_file")]
        content: Option<String>,
        /// Read the HTML body from a file
        #[arg(long)]
        content_file: Option<PathBuf>,
    },
    /// Update a page (admin)
    Update {
        /// Page ID
        id: String,
        /// New title
        #[arg(short, long)]
        title: Option<String>,
        /// New slug
        #[arg(short, long)]
        slug: Option<String>,
        /// New HTML body
        #[arg(short, long, conflicts_with = "content_file")]
        content: Option<String>,
        /// Read the new HTML body from a file
        #[arg(long)]
        content_file: Option<PathBuf>,
    },
    /// Delete a page (admin)
    Delete {
        /// Page ID
        id: String,
    },
}

#[derive(Subcommand)]
enum ContentCommands {
    /// List content entries
    List,
    /// Create or replace an entry
    Set {
        /// Entry key
        key: String,
        /// Entry value
        value: String,
    },
    /// Delete an entry
    Delete {
        /// Entry key
        key: String,
    },
}

async fn dispatch(ctx: &PortalContext, command: Commands, format: OutputFormat) -> anyhow::Result<()> {
    match command {
        Commands::Login => commands::login(ctx, format).await,
        Commands::Register => commands::register(ctx, format).await,
        Commands::Logout => commands::logout(ctx, format).await,
        Commands::Status => commands::status(ctx, format).await,
        Commands::Route { path } => commands::route(ctx, &path, format).await,
        Commands::Admin => commands::admin_overview(ctx, format).await,
        Commands::Pages { command } => match command {
            PageCommands::List => commands::pages_list(ctx, format).await,
            PageCommands::Show { slug } => commands::pages_show(ctx, &slug, format).await,
            PageCommands::Create {
                title,
                slug,
                content,
                content_file,
            } => commands::pages_create(ctx, title, slug, content, content_file, format).await,
            PageCommands::Update {
                id,
                title,
                slug,
                content,
                content_file,
            } => {
                let update = PageUpdate {
                    title,
                    slug,
                    content,
                };
                commands::pages_update(ctx, &id, update, content_file, format).await
            }
            PageCommands::Delete { id } => commands::pages_delete(ctx, &id, format).await,
        },
        Commands::Content { command } => match command {
            ContentCommands::List => commands::content_list(ctx, format).await,
            ContentCommands::Set { key, value } => {
                commands::content_set(ctx, &key, &value, format).await
            }
            ContentCommands::Delete { key } => commands::content_delete(ctx, &key, format).await,
        },
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let paths = Paths::new()?;
    paths.ensure_dirs()?;

    // JSONL file only; stderr is reserved for command output
    let level = parse_level(&cli.log_level).to_string().to_lowercase();
    init_logging("hwlg", &level, &paths, false);
    debug!(base_dir = %paths.base_dir().display(), "Starting hwlg");

    let ctx = PortalContext::open(&paths).await?;
    let result = dispatch(&ctx, cli.command, cli.format).await;
    ctx.close().await;
    result
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let format = cli.format;

    if let Err(e) = run(cli).await {
        output::print_error(&format!("{:#}", e), format);
        std::process::exit(1);
    }
}
