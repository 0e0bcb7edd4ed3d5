//! Site content commands (admin only).

use crate::app::PortalContext;
use crate::output::{self, OutputFormat};
use anyhow::Result;
use portal_auth::Route;

/// List content entries, most recently updated first.
pub async fn content_list(ctx: &PortalContext, format: OutputFormat) -> Result<()> {
    ctx.require(&Route::Admin)?;
    let entries = ctx.content_client()?.list_content().await?;

    match format {
        OutputFormat::Text => {
            if entries.is_empty() {
                println!("No content entries found");
            } else {
                println!("{:<30} {:<50} {}", "Key", "Value", "Updated");
                println!("{}", "-".repeat(100));
                for entry in &entries {
                    println!(
                        "{:<30} {:<50} {}",
                        output::truncate(&entry.key, 30),
                        output::truncate(&entry.value, 50),
                        entry.updated_at.format("%Y-%m-%d %H:%M")
                    );
                }
            }
        }
        OutputFormat::Json => output::print_json(&entries)?,
    }
    Ok(())
}

/// Create or replace the entry for `key`.
pub async fn content_set(
    ctx: &PortalContext,
    key: &str,
    value: &str,
    format: OutputFormat,
) -> Result<()> {
    ctx.require(&Route::Admin)?;
    let entry = ctx.content_client()?.upsert_content(key, value).await?;

    match format {
        OutputFormat::Text => println!("Saved {}", entry.key),
        OutputFormat::Json => output::print_json(&entry)?,
    }
    Ok(())
}

/// Delete the entry for `key`.
pub async fn content_delete(ctx: &PortalContext, key: &str, format: OutputFormat) -> Result<()> {
    ctx.require(&Route::Admin)?;
    ctx.content_client()?.delete_content(key).await?;
    output::print_success(&format!("Deleted {}", key), format);
    Ok(())
}

/// Summary of both admin lists, fetched together.
pub async fn admin_overview(ctx: &PortalContext, format: OutputFormat) -> Result<()> {
    ctx.require(&Route::Admin)?;
    let overview = ctx.content_client()?.load_admin_overview().await?;

    match format {
        OutputFormat::Text => {
            output::print_heading(&format!("Pages ({})", overview.pages.len()));
            for page in &overview.pages {
                output::print_row(&page.slug, &output::truncate(&page.title, 50));
            }
            output::print_heading(&format!("Content ({})", overview.content.len()));
            for entry in &overview.content {
                output::print_row(&entry.key, &output::truncate(&entry.value, 50));
            }
        }
        OutputFormat::Json => {
            let summary = serde_json::json!({
                "pages": overview.pages.iter().map(|p| serde_json::json!({
                    "id": p.id,
                    "slug": p.slug,
                    "title": p.title,
                    "created_at": p.created_at,
                })).collect::<Vec<_>>(),
                "content": overview.content,
            });
            output::print_json(&summary)?;
        }
    }
    Ok(())
}
