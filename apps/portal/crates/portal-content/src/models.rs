//! Rows of the `pages` and `content` tables.

use crate::{ContentError, ContentResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const MAX_SLUG_LEN: usize = 100;

/// A CMS page, addressed by its slug.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub id: String,
    pub title: String,
    pub slug: String,
    /// Stored HTML body. Never print this directly; use [`Page::plain_text`].
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Page {
    /// Page body converted from HTML to plain text.
    pub fn plain_text(&self) -> String {
        nanohtml2text::html2text(&self.content)
    }
}

/// A site-wide key/value content entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentEntry {
    pub id: String,
    pub key: String,
    pub value: String,
    pub updated_at: DateTime<Utc>,
}

/// Fields for a new page.
#[derive(Debug, Clone, Serialize)]
pub struct NewPage {
    pub title: String,
    pub slug: String,
    pub content: String,
}

impl NewPage {
    pub fn validate(&self) -> ContentResult<()> {
        if self.title.trim().is_empty() {
            return Err(ContentError::InvalidInput("title is empty".to_string()));
        }
        validate_slug(&self.slug)
    }
}

/// Partial page update; `None` fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PageUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl PageUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.slug.is_none() && self.content.is_none()
    }

    pub fn validate(&self) -> ContentResult<()> {
        if self.is_empty() {
            return Err(ContentError::InvalidInput("nothing to update".to_string()));
        }
        if let Some(title) = &self.title {
            if title.trim().is_empty() {
                return Err(ContentError::InvalidInput("title is empty".to_string()));
            }
        }
        if let Some(slug) = &self.slug {
            validate_slug(slug)?;
        }
        Ok(())
    }
}

/// Body for a content upsert.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct ContentUpsert<'a> {
    pub key: &'a str,
    pub value: &'a str,
    pub updated_at: DateTime<Utc>,
}

/// Both admin lists, newest first.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AdminOverview {
    pub pages: Vec<Page>,
    pub content: Vec<ContentEntry>,
}

/// Check that `slug` is lowercase ASCII letters and digits separated by
/// single hyphens.
pub fn validate_slug(slug: &str) -> ContentResult<()> {
    let invalid = |reason: &str| Err(ContentError::InvalidSlug(format!("{slug:?}: {reason}")));

    if slug.is_empty() {
        return invalid("empty");
    }
    if slug.len() > MAX_SLUG_LEN {
        return invalid("too long");
    }
    if slug.starts_with('-') || slug.ends_with('-') {
        return invalid("leading or trailing hyphen");
    }
    if slug.contains("--") {
        return invalid("repeated hyphen");
    }
    if !slug
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return invalid("only a-z, 0-9 and '-' are allowed");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(content: &str) -> Page {
        Page {
            id: "p1".to_string(),
            title: "About".to_string(),
            slug: "about".to_string(),
            content: content.to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_validate_slug_accepts() {
        for slug in ["about", "privacy-policy", "faq-2024", "a"] {
            assert!(validate_slug(slug).is_ok(), "{slug}");
        }
    }

    #[test]
    fn test_validate_slug_rejects() {
        for slug in ["", "-x", "x-", "a--b", "About", "a b", "a/b", "ü"] {
            assert!(
                matches!(validate_slug(slug), Err(ContentError::InvalidSlug(_))),
                "{slug}"
            );
        }
        assert!(validate_slug(&"a".repeat(MAX_SLUG_LEN + 1)).is_err());
    }

    #[test]
    fn test_plain_text_strips_markup() {
        let text = page("<h1>Welcome</h1><p>Invest <b>today</b></p>")
            .plain_text();
        assert!(text.contains("Welcome"));
        assert!(text.contains("today"));
        assert!(!text.contains('<'));
    }

    #[test]
    fn test_new_page_validation() {
        let mut new_page = NewPage {
            title: "FAQ".to_string(),
            slug: "faq".to_string(),
            content: String::new(),
        };
        assert!(new_page.validate().is_ok());

        new_page.title = "  ".to_string();
        assert!(matches!(
            new_page.validate(),
            Err(ContentError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_page_update_validation_and_serialization() {
        assert!(PageUpdate::default().validate().is_err());

        let update = PageUpdate {
            content: Some("<p>new</p>".to_string()),
            ..Default::default()
        };
        assert!(update.validate().is_ok());
        assert_eq!(
            serde_json::to_value(&update).unwrap(),
            serde_json::json!({ "content": "<p>new</p>" })
        );

        let bad = PageUpdate {
            slug: Some("Bad Slug".to_string()),
            ..Default::default()
        };
        assert!(matches!(bad.validate(), Err(ContentError::InvalidSlug(_))));
    }

    #[test]
    fn test_page_deserializes_postgrest_row() {
        let row = serde_json::json!({
            "id": "7c9e6679-7425-40de-944b-e07fc1f90ae7",
            "title": "Terms",
            "slug": "terms",
            "content": "<p>Terms</p>",
            "created_at": "2024-03-01T12:00:00+00:00"
        });
        let page: Page = serde_json::from_value(row).unwrap();
        assert_eq!(page.slug, "terms");
    }
}
