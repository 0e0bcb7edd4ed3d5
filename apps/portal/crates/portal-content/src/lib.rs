//! CMS tables behind the portal's admin panel and dynamic pages.

mod client;
mod error;
mod models;

pub use client::ContentClient;
pub use error::{ContentError, ContentResult};
pub use models::{validate_slug, AdminOverview, ContentEntry, NewPage, Page, PageUpdate};
