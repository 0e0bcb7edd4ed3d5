//! PostgREST client for the `pages` and `content` tables.

use crate::models::ContentUpsert;
use crate::{
    validate_slug, AdminOverview, ContentEntry, ContentError, ContentResult, NewPage, Page,
    PageUpdate,
};
use chrono::Utc;
use portal_config_and_utils::{summarize_response_body, Config};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

const PAGES_TABLE: &str = "pages";
const CONTENT_TABLE: &str = "content";

/// Client for the portal's content tables.
///
/// Requests carry the signed-in user's access token when one is set, so the
/// hosted row-level security policies decide what is visible and writable.
#[derive(Clone)]
pub struct ContentClient {
    http_client: reqwest::Client,
    api_url: String,
    anon_key: String,
    access_token: Option<String>,
}

impl ContentClient {
    /// Create a new content client.
    ///
    /// # Arguments
    /// * `api_url` - The Supabase project API URL (e.g., `https://xyz.supabase.co`)
    /// * `anon_key` - The Supabase anonymous API key
    pub fn new(api_url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        let api_url: String = api_url.into();
        Self {
            http_client: reqwest::Client::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.into(),
            access_token: None,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.supabase_api_base(), &config.supabase_anon_key)
    }

    /// Send requests as the user owning `access_token` instead of anonymously.
    pub fn with_access_token(mut self, access_token: Option<String>) -> Self {
        self.access_token = access_token;
        self
    }

    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.api_url, table)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let bearer = self.access_token.as_deref().unwrap_or(&self.anon_key);
        request
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", bearer))
            .header("Accept", "application/json")
    }

    async fn read_rows<T: DeserializeOwned>(response: Response, context: &str) -> ContentResult<Vec<T>> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body_summary = summarize_response_body(&body);
            warn!(status = %status, body_summary = %body_summary, "{context} failed");
            if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
                return Err(ContentError::PermissionDenied {
                    status: status.as_u16(),
                });
            }
            return Err(ContentError::Api {
                status: status.as_u16(),
                summary: body_summary,
            });
        }
        Ok(response.json().await?)
    }

    /// All pages, newest first.
    pub async fn list_pages(&self) -> ContentResult<Vec<Page>> {
        let request = self
            .http_client
            .get(self.rest_url(PAGES_TABLE))
            .query(&[("select", "*"), ("order", "created_at.desc")]);
        let response = self.authorize(request).send().await?;
        let pages: Vec<Page> = Self::read_rows(response, "List pages").await?;
        debug!(count = pages.len(), "Fetched pages");
        Ok(pages)
    }

    /// Page with `slug`, or `None` when there is no such page.
    pub async fn page_by_slug(&self, slug: &str) -> ContentResult<Option<Page>> {
        validate_slug(slug)?;
        let request = self.http_client.get(self.rest_url(PAGES_TABLE)).query(&[
            ("slug", format!("eq.{}", slug)),
            ("select", "*".to_string()),
            ("limit", "1".to_string()),
        ]);
        let response = self.authorize(request).send().await?;
        let pages: Vec<Page> = Self::read_rows(response, "Fetch page").await?;
        Ok(pages.into_iter().next())
    }

    pub async fn create_page(&self, page: &NewPage) -> ContentResult<Page> {
        page.validate()?;
        let request = self
            .http_client
            .post(self.rest_url(PAGES_TABLE))
            .header("Prefer", "return=representation")
            .json(page);
        let response = self.authorize(request).send().await?;
        let created: Vec<Page> = Self::read_rows(response, "Create page").await?;
        let created = created
            .into_iter()
            .next()
            .ok_or_else(|| ContentError::NotFound(format!("page {} after insert", page.slug)))?;
        info!(page_id = %created.id, slug = %created.slug, "Page created");
        Ok(created)
    }

    pub async fn update_page(&self, id: &str, update: &PageUpdate) -> ContentResult<Page> {
        update.validate()?;
        let request = self
            .http_client
            .patch(self.rest_url(PAGES_TABLE))
            .query(&[("id", format!("eq.{}", id))])
            .header("Prefer", "return=representation")
            .json(update);
        let response = self.authorize(request).send().await?;
        let updated: Vec<Page> = Self::read_rows(response, "Update page").await?;
        let updated = updated
            .into_iter()
            .next()
            .ok_or_else(|| ContentError::NotFound(format!("page {}", id)))?;
        info!(page_id = %updated.id, "Page updated");
        Ok(updated)
    }

    pub async fn delete_page(&self, id: &str) -> ContentResult<()> {
        let request = self
            .http_client
            .delete(self.rest_url(PAGES_TABLE))
            .query(&[("id", format!("eq.{}", id))])
            .header("Prefer", "return=representation");
        let response = self.authorize(request).send().await?;
        let deleted: Vec<Page> = Self::read_rows(response, "Delete page").await?;
        if deleted.is_empty() {
            return Err(ContentError::NotFound(format!("page {}", id)));
        }
        info!(page_id = %id, "Page deleted");
        Ok(())
    }

    /// All content entries, most recently updated first.
    pub async fn list_content(&self) -> ContentResult<Vec<ContentEntry>> {
        let request = self
            .http_client
            .get(self.rest_url(CONTENT_TABLE))
            .query(&[("select", "*"), ("order", "updated_at.desc")]);
        let response = self.authorize(request).send().await?;
        let entries: Vec<ContentEntry> = Self::read_rows(response, "List content").await?;
        debug!(count = entries.len(), "Fetched content entries");
        Ok(entries)
    }

    /// Insert or replace the entry for `key`.
    pub async fn upsert_content(&self, key: &str, value: &str) -> ContentResult<ContentEntry> {
        if key.trim().is_empty() {
            return Err(ContentError::InvalidInput("key is empty".to_string()));
        }
        let request = self
            .http_client
            .post(self.rest_url(CONTENT_TABLE))
            .query(&[("on_conflict", "key")])
            .header("Prefer", "resolution=merge-duplicates,return=representation")
            .json(&ContentUpsert {
                key,
                value,
                updated_at: Utc::now(),
            });
        let response = self.authorize(request).send().await?;
        let entries: Vec<ContentEntry> = Self::read_rows(response, "Upsert content").await?;
        let entry = entries
            .into_iter()
            .next()
            .ok_or_else(|| ContentError::NotFound(format!("content {} after upsert", key)))?;
        info!(key = %entry.key, "Content saved");
        Ok(entry)
    }

    pub async fn delete_content(&self, key: &str) -> ContentResult<()> {
        let request = self
            .http_client
            .delete(self.rest_url(CONTENT_TABLE))
            .query(&[("key", format!("eq.{}", key))])
            .header("Prefer", "return=representation");
        let response = self.authorize(request).send().await?;
        let deleted: Vec<ContentEntry> = Self::read_rows(response, "Delete content").await?;
        if deleted.is_empty() {
            return Err(ContentError::NotFound(format!("content {}", key)));
        }
        info!(key = %key, "Content deleted");
        Ok(())
    }

    /// Pages and content for the admin panel, fetched concurrently.
    pub async fn load_admin_overview(&self) -> ContentResult<AdminOverview> {
        let (pages, content) = tokio::try_join!(self.list_pages(), self.list_content())?;
        Ok(AdminOverview { pages, content })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn page_row(id: &str, slug: &str) -> serde_json::Value {
        serde_json::json!({
            "id": id,
            "title": format!("Title {slug}"),
            "slug": slug,
            "content": format!("<p>{slug}</p>"),
            "created_at": "2024-03-01T12:00:00+00:00"
        })
    }

    fn content_row(key: &str, value: &str) -> serde_json::Value {
        serde_json::json!({
            "id": format!("c-{key}"),
            "key": key,
            "value": value,
            "updated_at": "2024-03-02T08:30:00+00:00"
        })
    }

    fn client(server: &MockServer) -> ContentClient {
        ContentClient::new(server.uri(), "anon").with_access_token(Some("user-token".to_string()))
    }

    #[tokio::test]
    async fn test_list_pages_newest_first_with_user_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/pages"))
            .and(query_param("order", "created_at.desc"))
            .and(header("apikey", "anon"))
            .and(header("Authorization", "Bearer user-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                page_row("2", "new"),
                page_row("1", "old")
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let pages = client(&server).list_pages().await.unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].slug, "new");
    }

    #[tokio::test]
    async fn test_anonymous_requests_use_anon_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/content"))
            .and(header("Authorization", "Bearer anon"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let entries = ContentClient::new(server.uri(), "anon")
            .list_content()
            .await
            .unwrap();
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn test_page_by_slug_found_and_missing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/pages"))
            .and(query_param("slug", "eq.about"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!([page_row("1", "about")])),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/pages"))
            .and(query_param("slug", "eq.missing"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;

        let client = client(&server);
        let page = client.page_by_slug("about").await.unwrap().unwrap();
        assert_eq!(page.plain_text().trim(), "about");
        assert!(client.page_by_slug("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_page_by_slug_rejects_bad_slug_without_request() {
        let server = MockServer::start().await;
        let err = client(&server).page_by_slug("../etc").await.unwrap_err();
        assert!(matches!(err, ContentError::InvalidSlug(_)));
        assert!(server.received_requests().await.unwrap_or_default().is_empty());
    }

    #[tokio::test]
    async fn test_create_page() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/pages"))
            .and(header("Prefer", "return=representation"))
            .and(body_partial_json(serde_json::json!({ "slug": "faq", "title": "FAQ" })))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(serde_json::json!([page_row("9", "faq")])),
            )
            .expect(1)
            .mount(&server)
            .await;

        let page = client(&server)
            .create_page(&NewPage {
                title: "FAQ".to_string(),
                slug: "faq".to_string(),
                content: "<p>Questions</p>".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(page.id, "9");
    }

    #[tokio::test]
    async fn test_update_missing_page_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/rest/v1/pages"))
            .and(query_param("id", "eq.404"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;

        let err = client(&server)
            .update_page(
                "404",
                &PageUpdate {
                    title: Some("New".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ContentError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_page() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/rest/v1/pages"))
            .and(query_param("id", "eq.1"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!([page_row("1", "a")])),
            )
            .expect(1)
            .mount(&server)
            .await;

        client(&server).delete_page("1").await.unwrap();
    }

    #[tokio::test]
    async fn test_upsert_content_merges_on_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/content"))
            .and(query_param("on_conflict", "key"))
            .and(header(
                "Prefer",
                "resolution=merge-duplicates,return=representation",
            ))
            .and(body_partial_json(
                serde_json::json!({ "key": "hero_title", "value": "Build wealth" }),
            ))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!([
                content_row("hero_title", "Build wealth")
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let entry = client(&server)
            .upsert_content("hero_title", "Build wealth")
            .await
            .unwrap();
        assert_eq!(entry.value, "Build wealth");
    }

    #[tokio::test]
    async fn test_delete_missing_content_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/rest/v1/content"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;

        let err = client(&server).delete_content("nope").await.unwrap_err();
        assert!(matches!(err, ContentError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_permission_denied() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/content"))
            .respond_with(ResponseTemplate::new(403).set_body_string("row-level security"))
            .mount(&server)
            .await;

        let err = client(&server).upsert_content("k", "v").await.unwrap_err();
        assert!(matches!(err, ContentError::PermissionDenied { status: 403 }));
    }

    #[tokio::test]
    async fn test_admin_overview_fetches_both_lists() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/pages"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!([page_row("1", "a")])),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/content"))
            .and(query_param("order", "updated_at.desc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                content_row("a", "1"),
                content_row("b", "2")
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let overview = client(&server).load_admin_overview().await.unwrap();
        assert_eq!(overview.pages.len(), 1);
        assert_eq!(overview.content.len(), 2);
    }

    #[tokio::test]
    async fn test_admin_overview_fails_if_either_list_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/pages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/content"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = client(&server).load_admin_overview().await.unwrap_err();
        assert!(matches!(err, ContentError::Api { status: 500, .. }));
    }
}
