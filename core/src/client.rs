//! Root handle over one CMS project.
//!
//! # Design
//! `CmsClient` owns the validated `ClientConfig` and a transport, both behind
//! `Arc`, and hands clones of them to the migrator and collection builders.
//! Nothing else is stored: no cache, no queue, no retry state. Cloning the
//! client is cheap and every clone shares the same connection pool.

use std::sync::Arc;

use serde_json::Value;

use crate::collection::Collection;
use crate::config::ClientConfig;
use crate::error::CmsResult;
use crate::http::HttpMethod;
use crate::migrator::SchemaMigrator;
use crate::schema::Schema;
use crate::transport::{build_request, encode_body, parse_response, HttpTransport, Transport};
use crate::value::ContentItem;

#[derive(Clone)]
pub struct CmsClient {
    config: Arc<ClientConfig>,
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for CmsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CmsClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl CmsClient {
    /// Validate the connection parameters and create a client using the
    /// default reqwest transport. No request is made.
    pub fn new(api_url: &str, api_key: &str, project_id: &str) -> CmsResult<Self> {
        let config = ClientConfig::new(api_url, api_key, project_id)?;
        Ok(Self::from_config(config))
    }

    pub fn from_config(config: ClientConfig) -> Self {
        Self::with_transport(config, Arc::new(HttpTransport::new()))
    }

    /// Use a custom transport, e.g. a preconfigured `reqwest::Client` or an
    /// in-memory fake.
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            config: Arc::new(config),
            transport,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn schema_migrator(&self) -> SchemaMigrator {
        SchemaMigrator::new(self.config.clone(), self.transport.clone())
    }

    /// Push `schema` to the project. Resolves only on a 2xx response.
    pub async fn migrate_schema(&self, schema: &Schema) -> CmsResult<()> {
        self.schema_migrator().migrate(schema).await
    }

    /// Builder bound to `name`. Pure; fails only on a blank name.
    pub fn collection(&self, name: &str) -> CmsResult<Collection> {
        Collection::new(name, self.config.clone(), self.transport.clone())
    }

    /// Shorthand for `collection(collection)?.create(content)`. The target
    /// collection is always explicit.
    pub async fn create_content(&self, collection: &str, content: &ContentItem) -> CmsResult<ContentItem> {
        self.collection(collection)?.create(content).await
    }

    /// Low-level call under `/projects/{projectId}/<segments...>` returning
    /// the decoded JSON body (`Value::Null` for empty 2xx bodies).
    pub async fn request(
        &self,
        method: HttpMethod,
        segments: &[&str],
        query: &[(String, String)],
        body: Option<&Value>,
    ) -> CmsResult<Value> {
        let body = body.map(encode_body).transpose()?;
        let request = build_request(&self.config, method, segments, query, body)?;
        let response = self.transport.execute(request).await?;
        parse_response(response)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::error::CmsError;
    use crate::http::{HttpRequest, HttpResponse};

    struct Canned {
        response: HttpResponse,
        seen: Mutex<Vec<HttpRequest>>,
    }

    #[async_trait]
    impl Transport for Canned {
        async fn execute(&self, request: HttpRequest) -> CmsResult<HttpResponse> {
            self.seen.lock().unwrap().push(request);
            Ok(self.response.clone())
        }
    }

    fn client_with(status: u16, body: &str) -> (CmsClient, Arc<Canned>) {
        let transport = Arc::new(Canned {
            response: HttpResponse {
                status,
                headers: Vec::new(),
                body: body.to_string(),
            },
            seen: Mutex::new(Vec::new()),
        });
        let config = ClientConfig::new("http://localhost:3000", "k", "blog").unwrap();
        (CmsClient::with_transport(config, transport.clone()), transport)
    }

    #[test]
    fn empty_api_url_fails_before_any_request() {
        let err = CmsClient::new("", "k", "p").unwrap_err();
        assert!(matches!(err, CmsError::Config(_)));
    }

    #[test]
    fn collection_factory_rejects_blank_names() {
        let (client, transport) = client_with(200, "");
        assert!(client.collection("").is_err());
        assert_eq!(client.collection("posts").unwrap().name(), "posts");
        assert!(transport.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn create_content_targets_the_named_collection() {
        let (client, transport) = client_with(201, r#"{"id":"1","title":"Hi"}"#);
        let item = client
            .create_content("posts", &ContentItem::new().with("title", "Hi"))
            .await
            .unwrap();
        assert_eq!(item.id(), Some("1"));
        let seen = transport.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].url, "http://localhost:3000/projects/blog/collections/posts/items");
    }

    #[tokio::test]
    async fn raw_request_decodes_json() {
        let (client, transport) = client_with(200, r#"{"fields":[]}"#);
        let value = client
            .request(HttpMethod::Get, &["schema"], &[], None)
            .await
            .unwrap();
        assert_eq!(value, serde_json::json!({"fields": []}));
        assert_eq!(
            transport.seen.lock().unwrap()[0].header("authorization"),
            Some("Bearer k")
        );
    }

    #[test]
    fn debug_does_not_leak_the_key() {
        let client = CmsClient::new("http://localhost:3000", "hunter2", "p").unwrap();
        assert!(!format!("{client:?}").contains("hunter2"));
    }
}
