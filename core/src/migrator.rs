//! Schema migration: one declarative `PUT /projects/{projectId}/schema`.
//!
//! # Design
//! The whole field list goes out in a single request and the backend applies
//! it atomically, so there is no partial-migration state. Re-sending an
//! unchanged schema is a no-op on the backend. Local validation runs first;
//! on failure nothing is sent.

use std::sync::Arc;

use tracing::info;

use crate::config::ClientConfig;
use crate::error::CmsResult;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::schema::Schema;
use crate::transport::{build_request, encode_body, parse_response, Transport};

#[derive(Clone)]
pub struct SchemaMigrator {
    config: Arc<ClientConfig>,
    transport: Arc<dyn Transport>,
}

impl SchemaMigrator {
    pub fn new(config: Arc<ClientConfig>, transport: Arc<dyn Transport>) -> Self {
        Self { config, transport }
    }

    /// Validate `schema` and build the migration request.
    pub fn build_migrate(&self, schema: &Schema) -> CmsResult<HttpRequest> {
        schema.validate()?;
        let body = encode_body(schema)?;
        build_request(&self.config, HttpMethod::Put, &["schema"], &[], Some(body))
    }

    /// Any 2xx is success; the body, if any, is ignored.
    pub fn parse_migrate(&self, response: HttpResponse) -> CmsResult<()> {
        parse_response(response).map(|_| ())
    }

    pub async fn migrate(&self, schema: &Schema) -> CmsResult<()> {
        let request = self.build_migrate(schema)?;
        let response = self.transport.execute(request).await?;
        self.parse_migrate(response)?;
        info!(
            project = self.config.project_id(),
            fields = schema.fields.len(),
            "schema migrated"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::error::CmsError;
    use crate::schema::SchemaField;
    use crate::value::FieldType;

    /// Records requests and answers each with a fixed response.
    struct Recording {
        status: u16,
        requests: Mutex<Vec<HttpRequest>>,
    }

    #[async_trait]
    impl Transport for Recording {
        async fn execute(&self, request: HttpRequest) -> CmsResult<HttpResponse> {
            self.requests.lock().unwrap().push(request);
            Ok(HttpResponse {
                status: self.status,
                headers: Vec::new(),
                body: String::new(),
            })
        }
    }

    fn migrator(status: u16) -> (SchemaMigrator, Arc<Recording>) {
        let transport = Arc::new(Recording {
            status,
            requests: Mutex::new(Vec::new()),
        });
        let config = Arc::new(ClientConfig::new("http://localhost:3000", "k", "blog").unwrap());
        (SchemaMigrator::new(config, transport.clone()), transport)
    }

    fn schema() -> Schema {
        Schema::new(vec![
            SchemaField::new("title", FieldType::String).required(),
            SchemaField::new("published", FieldType::Boolean).with_default(false),
        ])
    }

    #[test]
    fn build_migrate_produces_put_with_ordered_fields() {
        let (migrator, _) = migrator(200);
        let req = migrator.build_migrate(&schema()).unwrap();
        assert_eq!(req.method, HttpMethod::Put);
        assert_eq!(req.url, "http://localhost:3000/projects/blog/schema");
        let body: serde_json::Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(body["fields"][0]["name"], "title");
        assert_eq!(body["fields"][1]["name"], "published");
        assert_eq!(body["fields"][1]["default"], false);
    }

    #[tokio::test]
    async fn migrate_sends_exactly_one_request() {
        let (migrator, transport) = migrator(204);
        migrator.migrate(&schema()).await.unwrap();
        assert_eq!(transport.requests.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn invalid_schema_sends_nothing() {
        let (migrator, transport) = migrator(204);
        let bad = schema().field(SchemaField::new("title", FieldType::Text));
        let err = migrator.migrate(&bad).await.unwrap_err();
        assert!(err.is_validation());
        assert!(transport.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn non_2xx_fails_the_migration() {
        let (migrator, _) = migrator(500);
        let err = migrator.migrate(&schema()).await.unwrap_err();
        assert!(matches!(err, CmsError::Server { status: 500, .. }));
    }
}
