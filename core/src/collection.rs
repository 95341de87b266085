//! Query builder bound to one collection.
//!
//! # Design
//! `Collection` is an immutable value: a name plus shared handles to the
//! config and transport. It can be cloned and used from many tasks at once.
//! Each operation is a `build_*` / `parse_*` pair plus an async method that
//! runs one round-trip between them. Content is passed through verbatim;
//! field checks against the migrated schema are left to the backend.

use std::sync::Arc;

use serde_json::Value;

use crate::config::ClientConfig;
use crate::error::{CmsError, CmsResult};
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::query::QueryOptions;
use crate::transport::{build_request, encode_body, parse_response, Transport};
use crate::value::ContentItem;

#[derive(Clone)]
pub struct Collection {
    name: String,
    config: Arc<ClientConfig>,
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("name", &self.name)
            .field("project_id", &self.config.project_id())
            .finish_non_exhaustive()
    }
}

impl Collection {
    /// Fails with a validation error if `name` is blank.
    pub fn new(
        name: impl Into<String>,
        config: Arc<ClientConfig>,
        transport: Arc<dyn Transport>,
    ) -> CmsResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(CmsError::invalid_field("collection", "collection name must not be empty"));
        }
        Ok(Self {
            name,
            config,
            transport,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn items_request(
        &self,
        method: HttpMethod,
        id: Option<&str>,
        query: &[(String, String)],
        body: Option<String>,
    ) -> CmsResult<HttpRequest> {
        match id {
            Some(id) => {
                if id.trim().is_empty() {
                    return Err(CmsError::invalid_field("id", "item id must not be empty"));
                }
                build_request(
                    &self.config,
                    method,
                    &["collections", self.name.as_str(), "items", id],
                    query,
                    body,
                )
            }
            None => build_request(
                &self.config,
                method,
                &["collections", self.name.as_str(), "items"],
                query,
                body,
            ),
        }
    }

    // -- find --

    pub fn build_find(&self, options: &QueryOptions) -> CmsResult<HttpRequest> {
        let query = options.to_query_pairs()?;
        self.items_request(HttpMethod::Get, None, &query, None)
    }

    /// Accepts a bare JSON array or an `{"items": [...]}` envelope. An empty
    /// body is an empty page.
    pub fn parse_find(&self, response: HttpResponse) -> CmsResult<Vec<ContentItem>> {
        let items = match parse_response(response)? {
            Value::Null => return Ok(Vec::new()),
            Value::Array(items) => Value::Array(items),
            Value::Object(mut envelope) => match envelope.remove("items") {
                Some(items @ Value::Array(_)) => items,
                _ => {
                    return Err(CmsError::Deserialization(
                        "expected an array of items or an `items` envelope".to_string(),
                    ))
                }
            },
            other => {
                return Err(CmsError::Deserialization(format!(
                    "expected an array of items, got {other}"
                )))
            }
        };
        serde_json::from_value(items).map_err(|e| CmsError::Deserialization(e.to_string()))
    }

    /// Run a query. An omitted `limit` returns the backend's default page
    /// size; an `offset` past the end returns an empty list.
    pub async fn find(&self, options: &QueryOptions) -> CmsResult<Vec<ContentItem>> {
        let request = self.build_find(options)?;
        let response = self.transport.execute(request).await?;
        self.parse_find(response)
    }

    // -- get --

    pub fn build_get(&self, id: &str) -> CmsResult<HttpRequest> {
        self.items_request(HttpMethod::Get, Some(id), &[], None)
    }

    pub fn parse_get(&self, response: HttpResponse) -> CmsResult<ContentItem> {
        parse_item(response)
    }

    /// Fetch one item. A missing item is a 404 `Request` error
    /// (see `CmsError::is_not_found`).
    pub async fn get(&self, id: &str) -> CmsResult<ContentItem> {
        let request = self.build_get(id)?;
        let response = self.transport.execute(request).await?;
        self.parse_get(response)
    }

    // -- create --

    /// The body is `content.fields` verbatim; `content.id` is never sent.
    pub fn build_create(&self, content: &ContentItem) -> CmsResult<HttpRequest> {
        let body = encode_body(content)?;
        self.items_request(HttpMethod::Post, None, &[], Some(body))
    }

    pub fn parse_create(&self, response: HttpResponse) -> CmsResult<ContentItem> {
        parse_item(response)
    }

    /// Create an item and return it with its backend-assigned id.
    pub async fn create(&self, content: &ContentItem) -> CmsResult<ContentItem> {
        let request = self.build_create(content)?;
        let response = self.transport.execute(request).await?;
        self.parse_create(response)
    }

    // -- update --

    /// Partial update: only the fields present in `changes` are sent.
    pub fn build_update(&self, id: &str, changes: &ContentItem) -> CmsResult<HttpRequest> {
        let body = encode_body(changes)?;
        self.items_request(HttpMethod::Patch, Some(id), &[], Some(body))
    }

    pub fn parse_update(&self, response: HttpResponse) -> CmsResult<ContentItem> {
        parse_item(response)
    }

    pub async fn update(&self, id: &str, changes: &ContentItem) -> CmsResult<ContentItem> {
        let request = self.build_update(id, changes)?;
        let response = self.transport.execute(request).await?;
        self.parse_update(response)
    }

    // -- delete --

    pub fn build_delete(&self, id: &str) -> CmsResult<HttpRequest> {
        self.items_request(HttpMethod::Delete, Some(id), &[], None)
    }

    pub fn parse_delete(&self, response: HttpResponse) -> CmsResult<()> {
        parse_response(response).map(|_| ())
    }

    pub async fn delete(&self, id: &str) -> CmsResult<()> {
        let request = self.build_delete(id)?;
        let response = self.transport.execute(request).await?;
        self.parse_delete(response)
    }
}

/// Decode a single item and require a non-empty id.
fn parse_item(response: HttpResponse) -> CmsResult<ContentItem> {
    let value = parse_response(response)?;
    if !value.is_object() {
        return Err(CmsError::Deserialization(format!(
            "expected a content item object, got {value}"
        )));
    }
    let item: ContentItem =
        serde_json::from_value(value).map_err(|e| CmsError::Deserialization(e.to_string()))?;
    match item.id() {
        Some(id) if !id.is_empty() => Ok(item),
        _ => Err(CmsError::Deserialization(
            "backend returned an item without an id".to_string(),
        )),
    }
}
