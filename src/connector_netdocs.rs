//! NetDocuments REST connector.
//!
//! Talks to the NetDocuments v1 API with a bearer token. Obtaining the
//! token (the OAuth authorization-code exchange) happens outside docsync;
//! the token is read from config or from the environment.
//!
//! # Configuration
//!
//! ```toml
//! [source]
//! kind = "netdocuments"
//!
//! [source.netdocuments]
//! base_url = "https://api.vault.netvoyage.com"
//! access_token_env = "NETDOCUMENTS_ACCESS_TOKEN"
//! timeout_secs = 60
//! ```
//!
//! # Endpoints
//!
//! | Operation | Request |
//! |-----------|---------|
//! | search | `GET /v1/search?q=&max=&searchType=fulltext[&cabinet=]` |
//! | recent | `GET /v1/search?q=modified:[N days ago TO now]&sort=modified&order=desc` |
//! | folder | `GET /v1/folders/{id}/documents` |
//! | info | `GET /v1/documents/{id}` |
//! | download | `GET /v1/documents/{id}/content` |
//! | status | `GET /v1/user` |
//! | cabinets | `GET /v1/cabinets` |
//! | workspaces | `GET /v1/cabinets/{id}/workspaces` |
//! | folders | `GET /v1/workspaces/{id}/folders` |
//!
//! List responses are `{ "items": [...] }`.

use std::io::Write;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use reqwest::StatusCode;
use serde_json::Value;
use tracing::{debug, warn};

use docsync_core::models::DocumentRecord;

use crate::config::NetDocumentsConfig;
use crate::traits::{ConnectionStatus, Container, DownloadedFile, RemoteSource};

pub struct NetDocumentsClient {
    base_url: String,
    token: Option<String>,
    client: reqwest::Client,
}

impl NetDocumentsClient {
    pub fn new(config: &NetDocumentsConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.resolve_token(),
            client,
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
    }

    fn token(&self) -> Result<&str> {
        self.token.as_deref().ok_or_else(|| {
            anyhow!("Not authenticated: no NetDocuments access token configured")
        })
    }

    /// GET a JSON endpoint. A 404 is `Ok(None)`.
    async fn get_json(&self, endpoint: &str, params: &[(&str, String)]) -> Result<Option<Value>> {
        let url = self.url(endpoint);
        debug!(%url, "GET");
        let resp = self
            .client
            .get(&url)
            .bearer_auth(self.token()?)
            .query(params)
            .send()
            .await
            .with_context(|| format!("Request to {} failed", url))?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let resp = resp
            .error_for_status()
            .with_context(|| format!("Request to {} failed", url))?;
        let body = resp
            .json::<Value>()
            .await
            .with_context(|| format!("Invalid JSON from {}", url))?;
        Ok(Some(body))
    }

    async fn list(&self, endpoint: &str, params: &[(&str, String)]) -> Result<Vec<DocumentRecord>> {
        Ok(self
            .get_json(endpoint, params)
            .await?
            .map(|body| parse_items(&body))
            .unwrap_or_default())
    }

    async fn containers(&self, endpoint: &str, kind: &str) -> Result<Vec<Container>> {
        Ok(self
            .get_json(endpoint, &[])
            .await?
            .map(|body| parse_containers(&body, kind))
            .unwrap_or_default())
    }
}

#[async_trait]
impl RemoteSource for NetDocumentsClient {
    fn name(&self) -> &str {
        "netdocuments"
    }

    async fn search(
        &self,
        query: &str,
        cabinet: Option<&str>,
        max_results: usize,
    ) -> Result<Vec<DocumentRecord>> {
        let mut params = vec![
            ("q", query.to_string()),
            ("max", max_results.to_string()),
            ("searchType", "fulltext".to_string()),
        ];
        if let Some(cabinet) = cabinet {
            params.push(("cabinet", cabinet.to_string()));
        }
        self.list("/v1/search", &params).await
    }

    async fn recent_documents(&self, days: u32, max_results: usize) -> Result<Vec<DocumentRecord>> {
        let params = [
            ("q", recent_query(days)),
            ("max", max_results.to_string()),
            ("sort", "modified".to_string()),
            ("order", "desc".to_string()),
        ];
        self.list("/v1/search", &params).await
    }

    async fn folder_documents(&self, folder_id: &str) -> Result<Vec<DocumentRecord>> {
        self.list(&format!("/v1/folders/{}/documents", folder_id), &[])
            .await
    }

    async fn download(&self, document_id: &str) -> Result<DownloadedFile> {
        let info = self
            .info(document_id)
            .await?
            .ok_or_else(|| anyhow!("document {} not found", document_id))?;

        let url = self.url(&format!("/v1/documents/{}/content", document_id));
        let mut resp = self
            .client
            .get(&url)
            .bearer_auth(self.token()?)
            .send()
            .await
            .with_context(|| format!("Request to {} failed", url))?
            .error_for_status()
            .with_context(|| format!("Download of {} failed", info.name))?;

        let suffix = std::path::Path::new(&info.name)
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_else(|| ".tmp".to_string());
        let (mut file, downloaded) = DownloadedFile::create_with_suffix(&suffix)?;
        while let Some(bytes) = resp.chunk().await? {
            file.write_all(&bytes)?;
        }
        file.flush()?;
        Ok(downloaded)
    }

    async fn info(&self, document_id: &str) -> Result<Option<DocumentRecord>> {
        let body = self
            .get_json(&format!("/v1/documents/{}", document_id), &[])
            .await?;
        match body {
            Some(item) => Ok(Some(parse_record(&item).ok_or_else(|| {
                anyhow!("malformed metadata for document {}", document_id)
            })?)),
            None => Ok(None),
        }
    }

    async fn connection_status(&self) -> ConnectionStatus {
        if self.token.is_none() {
            return ConnectionStatus::disconnected("Not authenticated");
        }
        match self.get_json("/v1/user", &[]).await {
            Ok(Some(user)) => ConnectionStatus::connected(
                user.get("name")
                    .and_then(Value::as_str)
                    .unwrap_or("Unknown"),
            ),
            Ok(None) => ConnectionStatus::disconnected("Failed to get user info"),
            Err(e) => ConnectionStatus::disconnected(format!("{:#}", e)),
        }
    }

    async fn cabinets(&self) -> Result<Vec<Container>> {
        self.containers("/v1/cabinets", "Cabinet").await
    }

    async fn workspaces(&self, cabinet_id: &str) -> Result<Vec<Container>> {
        self.containers(&format!("/v1/cabinets/{}/workspaces", cabinet_id), "Workspace")
            .await
    }

    async fn folders(&self, workspace_id: &str) -> Result<Vec<Container>> {
        self.containers(&format!("/v1/workspaces/{}/folders", workspace_id), "Folder")
            .await
    }
}

fn recent_query(days: u32) -> String {
    format!("modified:[{} days ago TO now]", days)
}

/// Records from an `{ "items": [...] }` response. Malformed items are dropped.
fn parse_items(body: &Value) -> Vec<DocumentRecord> {
    let Some(items) = body.get("items").and_then(Value::as_array) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| {
            let record = parse_record(item);
            if record.is_none() {
                warn!(item = %item, "dropping document without id or valid modified time");
            }
            record
        })
        .collect()
}

/// Cabinets, workspaces or folders from an `{ "items": [...] }` response.
/// Unnamed items are labelled `"{kind} {id}"`; items without an id are
/// dropped.
fn parse_containers(body: &Value, kind: &str) -> Vec<Container> {
    let Some(items) = body.get("items").and_then(Value::as_array) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| {
            let id = parse_id(item)?;
            let name = item
                .get("name")
                .and_then(Value::as_str)
                .filter(|n| !n.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| format!("{} {}", kind, id));
            Some(Container { id, name })
        })
        .collect()
}

fn parse_id(item: &Value) -> Option<String> {
    match item.get("id")? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn parse_record(item: &Value) -> Option<DocumentRecord> {
    let id = parse_id(item)?;
    let modified = parse_modified(item.get("modified")?)?;
    let text = |key: &str| {
        item.get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    let name = Some(text("name"))
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| format!("document_{}", id));

    Some(DocumentRecord {
        id,
        name,
        modified,
        author: text("author"),
        workspace: text("workspace"),
    })
}

/// RFC 3339, naive ISO-8601 (taken as UTC), or epoch seconds.
fn parse_modified(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|t| t.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
                    .ok()
                    .map(|t| t.and_utc())
            }),
        Value::Number(n) => Utc.timestamp_opt(n.as_i64()?, 0).single(),
        _ => None,
    }
}

/// Fail fast when a client is built for a source that cannot authenticate.
pub fn require_token(config: &NetDocumentsConfig) -> Result<()> {
    if config.resolve_token().is_none() {
        bail!(
            "No NetDocuments access token: set source.netdocuments.access_token or ${}",
            config.access_token_env
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_items_and_drops_malformed() {
        let body = json!({
            "items": [
                {"id": "4821-9911", "name": "Lease.pdf", "modified": "2024-04-02T15:04:05Z",
                 "author": "J. Doe", "workspace": "Acme v. Widget"},
                {"id": 77, "name": "Memo.docx", "modified": "2024-04-01T08:00:00"},
                {"name": "no-id.txt", "modified": "2024-04-01T08:00:00Z"},
                {"id": "x", "name": "bad-date.txt", "modified": "last tuesday"}
            ]
        });
        let records = parse_items(&body);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, "4821-9911");
        assert_eq!(records[0].workspace, "Acme v. Widget");
        assert_eq!(
            records[0].modified,
            Utc.with_ymd_and_hms(2024, 4, 2, 15, 4, 5).unwrap()
        );
        assert_eq!(records[1].id, "77");
        assert_eq!(records[1].author, "");
    }

    #[test]
    fn missing_name_gets_placeholder() {
        let record = parse_record(&json!({"id": "9", "modified": 1_700_000_000})).unwrap();
        assert_eq!(record.name, "document_9");
        assert_eq!(record.modified.timestamp(), 1_700_000_000);
    }

    #[test]
    fn body_without_items_is_empty() {
        assert!(parse_items(&json!({"error": "nope"})).is_empty());
    }

    #[test]
    fn containers_get_placeholder_names() {
        let body = json!({
            "items": [
                {"id": "NG-1", "name": "Litigation"},
                {"id": 42},
                {"name": "orphan"}
            ]
        });
        let cabinets = parse_containers(&body, "Cabinet");
        assert_eq!(
            cabinets,
            vec![
                Container::new("NG-1", "Litigation"),
                Container::new("42", "Cabinet 42"),
            ]
        );
        assert!(parse_containers(&json!({}), "Folder").is_empty());
    }

    #[test]
    fn recent_query_uses_relative_range() {
        assert_eq!(recent_query(7), "modified:[7 days ago TO now]");
    }

    #[test]
    fn url_joins_without_double_slash() {
        let cfg = NetDocumentsConfig {
            base_url: "https://api.example.test/".to_string(),
            access_token: Some("t".to_string()),
            access_token_env: "UNUSED".to_string(),
            timeout_secs: 5,
        };
        let client = NetDocumentsClient::new(&cfg).unwrap();
        assert_eq!(client.url("/v1/search"), "https://api.example.test/v1/search");
    }

    #[tokio::test]
    async fn status_without_token_is_disconnected() {
        let cfg = NetDocumentsConfig {
            base_url: "https://api.example.test".to_string(),
            access_token: None,
            access_token_env: "DOCSYNC_TEST_TOKEN_NEVER_SET".to_string(),
            timeout_secs: 5,
        };
        let client = NetDocumentsClient::new(&cfg).unwrap();
        let status = client.connection_status().await;
        assert!(!status.connected);
        assert!(require_token(&cfg).is_err());
        assert!(client.search("*", None, 10).await.is_err());
    }
}
