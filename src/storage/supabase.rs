//! Supabase Storage REST client
//!
//! Talks to `{url}/storage/v1` with the service key sent as both the
//! `apikey` header and a bearer token.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

use super::{BackendReply, ListOptions, ObjectEntry, ObjectStore, StoredObject};
use crate::config::StorageConfig;
use crate::error::{Error, Result};

const API_PREFIX: [&str; 2] = ["storage", "v1"];

/// Response of the sign endpoint
#[derive(Debug, Deserialize)]
struct SignedUrlBody {
    #[serde(rename = "signedURL", alias = "signedUrl", default)]
    signed_url: Option<String>,
}

/// Object store backed by the Supabase Storage API
pub struct SupabaseStore {
    client: Client,
    base: Url,
}

impl SupabaseStore {
    /// Build a client from storage configuration
    pub fn new(config: &StorageConfig, timeout: std::time::Duration) -> Result<Self> {
        let base = Url::parse(&config.url)
            .map_err(|e| Error::Config(format!("Invalid storage url '{}': {}", config.url, e)))?;
        if base.cannot_be_a_base() {
            return Err(Error::Config(format!("Storage url '{}' cannot be a base", config.url)));
        }

        let key = HeaderValue::from_str(&config.key)
            .map_err(|_| Error::Config("storage.key contains invalid header characters".into()))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", config.key))
            .map_err(|_| Error::Config("storage.key contains invalid header characters".into()))?;

        let mut headers = HeaderMap::new();
        headers.insert("apikey", key);
        headers.insert(AUTHORIZATION, bearer);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self { client, base })
    }

    /// Build an endpoint URL from path segments below `/storage/v1`.
    ///
    /// Object paths are split on `/` so each segment is percent-encoded on its own.
    fn endpoint(&self, segments: &[&str], object_path: Option<&str>) -> Result<Url> {
        let mut url = self.base.clone();
        {
            let mut parts = url
                .path_segments_mut()
                .map_err(|_| Error::Config("storage url cannot be a base".into()))?;
            parts.pop_if_empty();
            parts.extend(API_PREFIX);
            parts.extend(segments);
            if let Some(path) = object_path {
                parts.extend(path.split('/').filter(|s| !s.is_empty()));
            }
        }
        Ok(url)
    }

    /// Turn the relative link returned by the sign endpoint into an absolute URL
    fn absolute_url(&self, signed: &str) -> String {
        if signed.starts_with("http://") || signed.starts_with("https://") {
            return signed.to_string();
        }
        format!(
            "{}/{}/{}",
            self.base.as_str().trim_end_matches('/'),
            API_PREFIX.join("/"),
            signed.trim_start_matches('/')
        )
    }

    /// Send a request and return the body of a successful response
    async fn fetch(&self, request: RequestBuilder) -> Result<Bytes> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            return Err(failure_error(status, &body));
        }
        Ok(body)
    }

    /// Send a request and decode its JSON body through `BackendReply`
    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let body = self.fetch(request).await?;
        serde_json::from_slice::<BackendReply<T>>(&body)?.into_result()
    }

    /// Send a request whose payload is ignored; an empty 2xx body is success
    async fn send_unit(&self, request: RequestBuilder) -> Result<()> {
        let body = self.fetch(request).await?;
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(());
        }
        serde_json::from_slice::<BackendReply<serde_json::Value>>(&body)?
            .into_result()
            .map(|_| ())
    }
}

/// Error for a non-success response, preferring the message of a recognised error body
fn failure_error(status: reqwest::StatusCode, body: &[u8]) -> Error {
    match serde_json::from_slice::<BackendReply<serde_json::Value>>(body).map(BackendReply::into_result) {
        Ok(Err(e)) => e,
        _ => status_error(status, body),
    }
}

/// Error for a non-success status whose body was not a recognised error shape
fn status_error(status: reqwest::StatusCode, body: &[u8]) -> Error {
    let text = String::from_utf8_lossy(body);
    if text.trim().is_empty() {
        Error::Backend(format!("Storage backend returned {}", status))
    } else {
        Error::Backend(text.trim().to_string())
    }
}

#[async_trait]
impl ObjectStore for SupabaseStore {
    async fn list(&self, bucket: &str, options: &ListOptions) -> Result<Vec<ObjectEntry>> {
        let url = self.endpoint(&["object", "list", bucket], None)?;
        let body = json!({
            "prefix": options.prefix,
            "limit": options.limit,
            "offset": options.offset,
            "sortBy": { "column": "name", "order": "asc" },
        });
        self.send_json(self.client.post(url).json(&body)).await
    }

    async fn upload(&self, bucket: &str, path: &str, object: StoredObject) -> Result<()> {
        let url = self.endpoint(&["object", bucket], Some(path))?;
        let content_type = object
            .content_type
            .unwrap_or_else(|| "application/octet-stream".to_string());
        let request = self
            .client
            .post(url)
            .header(CONTENT_TYPE, content_type)
            .header("x-upsert", "false")
            .body(object.bytes);
        self.send_unit(request).await
    }

    async fn download(&self, bucket: &str, path: &str) -> Result<StoredObject> {
        let url = self.endpoint(&["object", bucket], Some(path))?;
        let response = self.client.get(url).send().await?;
        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body: Bytes = response.bytes().await?;

        if !status.is_success() {
            return Err(failure_error(status, &body));
        }

        Ok(StoredObject { bytes: body, content_type })
    }

    async fn remove(&self, bucket: &str, paths: &[String]) -> Result<()> {
        let url = self.endpoint(&["object", bucket], None)?;
        let body = json!({ "prefixes": paths });
        self.send_unit(self.client.delete(url).json(&body)).await
    }

    async fn create_signed_url(
        &self,
        bucket: &str,
        path: &str,
        expires_in_secs: u64,
    ) -> Result<Option<String>> {
        let url = self.endpoint(&["object", "sign", bucket], Some(path))?;
        let body = json!({ "expiresIn": expires_in_secs });
        let signed: SignedUrlBody = self.send_json(self.client.post(url).json(&body)).await?;
        Ok(signed.signed_url.map(|link| self.absolute_url(&link)))
    }

    async fn list_buckets(&self) -> Result<Vec<serde_json::Value>> {
        let url = self.endpoint(&["bucket"], None)?;
        self.send_json(self.client.get(url)).await
    }

    async fn create_bucket(&self, name: &str, public: bool) -> Result<serde_json::Value> {
        let url = self.endpoint(&["bucket"], None)?;
        let body = json!({ "id": name, "name": name, "public": public });
        self.send_json(self.client.post(url).json(&body)).await
    }

    async fn delete_bucket(&self, name: &str) -> Result<()> {
        let url = self.endpoint(&["bucket", name], None)?;
        self.send_unit(self.client.delete(url)).await
    }

    fn kind(&self) -> &'static str {
        "supabase"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiError;
    use mockito::Matcher;
    use std::time::Duration;

    fn store(url: &str) -> SupabaseStore {
        let config = StorageConfig {
            url: url.to_string(),
            key: "service-key".to_string(),
            ..StorageConfig::default()
        };
        SupabaseStore::new(&config, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_endpoint_encodes_object_segments() {
        let store = store("https://project.supabase.co");
        let url = store
            .endpoint(&["object", "Bucket1"], Some("docs/my report.pdf"))
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://project.supabase.co/storage/v1/object/Bucket1/docs/my%20report.pdf"
        );
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let store = store("http://localhost:54321/");
        let url = store.endpoint(&["bucket", "media"], None).unwrap();
        assert_eq!(url.as_str(), "http://localhost:54321/storage/v1/bucket/media");
    }

    #[test]
    fn test_absolute_signed_url() {
        let store = store("https://project.supabase.co");
        assert_eq!(
            store.absolute_url("/object/sign/Bucket1/a.txt?token=abc"),
            "https://project.supabase.co/storage/v1/object/sign/Bucket1/a.txt?token=abc"
        );
        assert_eq!(
            store.absolute_url("https://cdn.example.com/a.txt"),
            "https://cdn.example.com/a.txt"
        );
    }

    #[test]
    fn test_rejects_bad_url() {
        let config = StorageConfig {
            url: "not a url".to_string(),
            key: "k".to_string(),
            ..StorageConfig::default()
        };
        assert!(matches!(
            SupabaseStore::new(&config, Duration::from_secs(1)),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_failure_error_uses_body_message() {
        let err = failure_error(
            reqwest::StatusCode::NOT_FOUND,
            br#"{"statusCode": "404", "error": "not_found", "message": "Object not found"}"#,
        );
        assert_eq!(err.to_string(), "Object not found");
    }

    #[test]
    fn test_status_error_text() {
        let err = status_error(reqwest::StatusCode::BAD_GATEWAY, b"");
        assert_eq!(err.to_string(), "Storage backend returned 502 Bad Gateway");
        let err = status_error(reqwest::StatusCode::BAD_REQUEST, b" invalid key ");
        assert_eq!(err.to_string(), "invalid key");
    }

    const CONFLICT: &str =
        r#"{"statusCode": "409", "error": "Duplicate", "message": "The resource already exists"}"#;
    const MISSING: &str =
        r#"{"statusCode": "404", "error": "not_found", "message": "Object not found"}"#;

    #[tokio::test]
    async fn test_list_sends_credentials_and_paging() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/storage/v1/object/list/Bucket1")
            .match_header("apikey", "service-key")
            .match_header("authorization", "Bearer service-key")
            .match_body(Matcher::Json(json!({
                "prefix": "docs",
                "limit": 100,
                "offset": 0,
                "sortBy": { "column": "name", "order": "asc" },
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"[{"name": "sub", "metadata": null}, {"name": "a.txt", "metadata": {"size": 5}}]"#)
            .create_async()
            .await;

        let store = store(&server.url());
        let entries = store
            .list("Bucket1", &ListOptions::first_page("docs", 100))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(entries[0], ObjectEntry::folder("sub"));
        assert_eq!(entries[1].size(), 5);
    }

    #[tokio::test]
    async fn test_upload_refuses_overwrite_and_reports_message() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/storage/v1/object/Bucket1/docs/a.txt")
            .match_header("x-upsert", "false")
            .match_header("content-type", "text/plain")
            .match_body("hello")
            .with_status(400)
            .with_body(CONFLICT)
            .create_async()
            .await;

        let store = store(&server.url());
        let object = StoredObject {
            bytes: Bytes::from_static(b"hello"),
            content_type: Some("text/plain".to_string()),
        };
        let err = store.upload("Bucket1", "docs/a.txt", object).await.unwrap_err();

        mock.assert_async().await;
        assert_eq!(err.to_string(), "The resource already exists");
        let api = ApiError::from(err);
        assert_eq!(api.status, axum::http::StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(api.message, "The resource already exists");
    }

    #[tokio::test]
    async fn test_download_keeps_content_type_and_reports_missing() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/storage/v1/object/Bucket1/a.txt")
            .with_status(200)
            .with_header("content-type", "text/plain")
            .with_body("hello")
            .create_async()
            .await;
        server
            .mock("GET", "/storage/v1/object/Bucket1/ghost.txt")
            .with_status(400)
            .with_body(MISSING)
            .create_async()
            .await;

        let store = store(&server.url());
        let object = store.download("Bucket1", "a.txt").await.unwrap();
        assert_eq!(object.bytes, Bytes::from_static(b"hello"));
        assert_eq!(object.content_type.as_deref(), Some("text/plain"));

        let err = store.download("Bucket1", "ghost.txt").await.unwrap_err();
        assert!(matches!(err, Error::Backend(ref m) if m == "Object not found"));
    }

    #[tokio::test]
    async fn test_remove_sends_prefixes() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("DELETE", "/storage/v1/object/Bucket1")
            .match_body(Matcher::Json(json!({ "prefixes": ["docs/a.txt", "docs/.keep"] })))
            .with_status(200)
            .with_body(r#"[{"name": "docs/a.txt"}, {"name": "docs/.keep"}]"#)
            .create_async()
            .await;

        let store = store(&server.url());
        let paths = vec!["docs/a.txt".to_string(), "docs/.keep".to_string()];
        store.remove("Bucket1", &paths).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_empty_success_body_is_accepted() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("DELETE", "/storage/v1/object/Bucket1")
            .with_status(204)
            .create_async()
            .await;
        server
            .mock("DELETE", "/storage/v1/bucket/media")
            .with_status(204)
            .create_async()
            .await;

        let store = store(&server.url());
        store.remove("Bucket1", &["a.txt".to_string()]).await.unwrap();
        store.delete_bucket("media").await.unwrap();
    }

    #[tokio::test]
    async fn test_signed_url_is_made_absolute() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/storage/v1/object/sign/Bucket1/docs/a.txt")
            .match_body(Matcher::Json(json!({ "expiresIn": 3600 })))
            .with_status(200)
            .with_body(r#"{"signedURL": "/object/sign/Bucket1/docs/a.txt?token=t0k"}"#)
            .create_async()
            .await;
        server
            .mock("POST", "/storage/v1/object/sign/Bucket1/ghost.txt")
            .with_status(400)
            .with_body(MISSING)
            .create_async()
            .await;

        let store = store(&server.url());
        let link = store
            .create_signed_url("Bucket1", "docs/a.txt", 3600)
            .await
            .unwrap();
        mock.assert_async().await;
        assert_eq!(
            link.as_deref(),
            Some(format!("{}/storage/v1/object/sign/Bucket1/docs/a.txt?token=t0k", server.url()).as_str())
        );

        let err = store.create_signed_url("Bucket1", "ghost.txt", 3600).await.unwrap_err();
        assert_eq!(err.to_string(), "Object not found");
    }

    #[tokio::test]
    async fn test_list_buckets_bare_and_wrapped() {
        let mut bare = mockito::Server::new_async().await;
        bare.mock("GET", "/storage/v1/bucket")
            .with_status(200)
            .with_body(r#"[{"id": "Bucket1", "name": "Bucket1", "public": false}]"#)
            .create_async()
            .await;
        let mut wrapped = mockito::Server::new_async().await;
        wrapped
            .mock("GET", "/storage/v1/bucket")
            .with_status(200)
            .with_body(r#"{"data": [{"id": "Bucket1", "name": "Bucket1", "public": false}]}"#)
            .create_async()
            .await;

        let from_bare = store(&bare.url()).list_buckets().await.unwrap();
        let from_wrapped = store(&wrapped.url()).list_buckets().await.unwrap();
        assert_eq!(from_bare, from_wrapped);
        assert_eq!(from_bare[0]["name"], "Bucket1");
    }

    #[tokio::test]
    async fn test_create_and_delete_bucket() {
        let mut server = mockito::Server::new_async().await;
        let create = server
            .mock("POST", "/storage/v1/bucket")
            .match_body(Matcher::Json(json!({ "id": "media", "name": "media", "public": true })))
            .with_status(200)
            .with_body(r#"{"name": "media"}"#)
            .create_async()
            .await;
        let delete = server
            .mock("DELETE", "/storage/v1/bucket/media")
            .with_status(200)
            .with_body(r#"{"message": "Successfully deleted"}"#)
            .create_async()
            .await;
        server
            .mock("DELETE", "/storage/v1/bucket/full")
            .with_status(409)
            .with_body(
                r#"{"statusCode": "409", "error": "Bucket not empty", "message": "The bucket you tried to delete is not empty"}"#,
            )
            .create_async()
            .await;

        let store = store(&server.url());
        let created = store.create_bucket("media", true).await.unwrap();
        assert_eq!(created["name"], "media");
        store.delete_bucket("media").await.unwrap();
        create.assert_async().await;
        delete.assert_async().await;

        let err = store.delete_bucket("full").await.unwrap_err();
        assert_eq!(err.to_string(), "The bucket you tried to delete is not empty");
    }
}
