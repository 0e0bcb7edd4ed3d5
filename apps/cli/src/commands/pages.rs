//! CMS page commands.

use crate::app::PortalContext;
use crate::output::{self, OutputFormat};
use anyhow::{anyhow, Context, Result};
use portal_auth::Route;
use portal_content::{NewPage, Page, PageUpdate};
use std::path::{Path, PathBuf};

/// List all pages (admin only).
pub async fn pages_list(ctx: &PortalContext, format: OutputFormat) -> Result<()> {
    ctx.require(&Route::Admin)?;
    let pages = ctx.content_client()?.list_pages().await?;

    match format {
        OutputFormat::Text => {
            if pages.is_empty() {
                println!("No pages found");
            } else {
                println!("{:<36} {:<24} {:<30} {}", "ID", "Slug", "Title", "Created");
                println!("{}", "-".repeat(110));
                for page in &pages {
                    println!(
                        "{:<36} {:<24} {:<30} {}",
                        page.id,
                        output::truncate(&page.slug, 24),
                        output::truncate(&page.title, 30),
                        page.created_at.format("%Y-%m-%d %H:%M")
                    );
                }
            }
        }
        OutputFormat::Json => output::print_json(&pages)?,
    }
    Ok(())
}

/// Render a page by slug as plain text.
pub async fn pages_show(ctx: &PortalContext, slug: &str, format: OutputFormat) -> Result<()> {
    ctx.require(&Route::Page(slug.to_string()))?;
    let page = ctx
        .content_client()?
        .page_by_slug(slug)
        .await?
        .ok_or_else(|| anyhow!("Page not found: {}", slug))?;

    match format {
        OutputFormat::Text => {
            output::print_heading(&page.title);
            println!("{}", page.plain_text().trim());
        }
        OutputFormat::Json => output::print_json(&rendered(&page))?,
    }
    Ok(())
}

/// Create a page (admin only).
pub async fn pages_create(
    ctx: &PortalContext,
    title: String,
    slug: String,
    content: Option<String>,
    content_file: Option<PathBuf>,
    format: OutputFormat,
) -> Result<()> {
    ctx.require(&Route::Admin)?;
    let content = read_body(content, content_file.as_deref())?.unwrap_or_default();
    let page = ctx
        .content_client()?
        .create_page(&NewPage {
            title,
            slug,
            content,
        })
        .await?;

    match format {
        OutputFormat::Text => println!("Created page {} ({})", page.slug, page.id),
        OutputFormat::Json => output::print_json(&rendered(&page))?,
    }
    Ok(())
}

/// Update fields of an existing page (admin only).
pub async fn pages_update(
    ctx: &PortalContext,
    id: &str,
    update: PageUpdate,
    content_file: Option<PathBuf>,
    format: OutputFormat,
) -> Result<()> {
    ctx.require(&Route::Admin)?;
    let update = PageUpdate {
        content: read_body(update.content, content_file.as_deref())?,
        ..update
    };
    let page = ctx.content_client()?.update_page(id, &update).await?;

    match format {
        OutputFormat::Text => println!("Updated page {} ({})", page.slug, page.id),
        OutputFormat::Json => output::print_json(&rendered(&page))?,
    }
    Ok(())
}

/// Delete a page (admin only).
pub async fn pages_delete(ctx: &PortalContext, id: &str, format: OutputFormat) -> Result<()> {
    ctx.require(&Route::Admin)?;
    ctx.content_client()?.delete_page(id).await?;
    output::print_success(&format!("Deleted page {}", id), format);
    Ok(())
}

/// JSON view of a page with the body already converted to text.
fn rendered(page: &Page) -> serde_json::Value {
    serde_json::json!({
        "id": page.id,
        "title": page.title,
        "slug": page.slug,
        "text": page.plain_text(),
        "created_at": page.created_at,
    })
}

fn read_body(inline: Option<String>, file: Option<&Path>) -> Result<Option<String>> {
    match (inline, file) {
        (Some(body), _) => Ok(Some(body)),
        (None, Some(path)) => std::fs::read_to_string(path)
            .map(Some)
            .with_context(|| format!("Failed to read {}", path.display())),
        (None, None) => Ok(None),
    }
}
