//! In-memory CMS backend used by the client's integration tests.
//!
//! Implements the wire contract the client speaks: bearer-key auth, one
//! declarative schema per project, and item CRUD per collection with
//! equality filters, single-key sort, paging and projection.

use std::{cmp::Ordering, collections::HashMap, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

/// Key accepted by [`app`].
pub const MOCK_API_KEY: &str = "mock-api-key";

/// Page size applied when a query has no `limit`.
pub const DEFAULT_PAGE_SIZE: usize = 100;

pub type Item = Map<String, Value>;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SchemaBody {
    pub fields: Vec<FieldDef>,
}

#[derive(Default)]
struct Project {
    schema: Vec<FieldDef>,
    collections: HashMap<String, Vec<Item>>,
}

#[derive(Clone)]
struct AppState {
    api_key: Arc<str>,
    projects: Arc<RwLock<HashMap<String, Project>>>,
}

#[derive(Deserialize)]
struct ListParams {
    #[serde(rename = "where")]
    filter: Option<String>,
    select: Option<String>,
    limit: Option<usize>,
    offset: Option<usize>,
    sort: Option<String>,
    order: Option<String>,
}

#[derive(Debug)]
struct ApiError(StatusCode, String);

impl ApiError {
    fn invalid(message: impl Into<String>) -> Self {
        ApiError(StatusCode::UNPROCESSABLE_ENTITY, message.into())
    }

    fn not_found(message: impl Into<String>) -> Self {
        ApiError(StatusCode::NOT_FOUND, message.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::debug!(status = %self.0, error = %self.1, "rejecting request");
        (self.0, Json(serde_json::json!({ "error": self.1 }))).into_response()
    }
}

pub fn app() -> Router {
    app_with_key(MOCK_API_KEY)
}

pub fn app_with_key(api_key: &str) -> Router {
    let state = AppState {
        api_key: Arc::from(api_key),
        projects: Arc::new(RwLock::new(HashMap::new())),
    };
    Router::new()
        .route("/projects/{project}/schema", get(get_schema).put(put_schema))
        .route(
            "/projects/{project}/collections/{collection}/items",
            get(list_items).post(create_item),
        )
        .route(
            "/projects/{project}/collections/{collection}/items/{id}",
            get(get_item).patch(update_item).delete(delete_item),
        )
        .with_state(state)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    match token {
        Some(token) if token == &*state.api_key => Ok(()),
        Some(_) => Err(ApiError(StatusCode::FORBIDDEN, "invalid API key".to_string())),
        None => Err(ApiError(StatusCode::UNAUTHORIZED, "missing bearer token".to_string())),
    }
}

// --- schema ---

async fn get_schema(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(project): Path<String>,
) -> Result<Json<SchemaBody>, ApiError> {
    authorize(&state, &headers)?;
    let projects = state.projects.read().await;
    let fields = projects.get(&project).map(|p| p.schema.clone()).unwrap_or_default();
    Ok(Json(SchemaBody { fields }))
}

async fn put_schema(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(project): Path<String>,
    Json(body): Json<SchemaBody>,
) -> Result<StatusCode, ApiError> {
    authorize(&state, &headers)?;
    validate_schema(&body.fields)?;
    state.projects.write().await.entry(project).or_default().schema = body.fields;
    Ok(StatusCode::NO_CONTENT)
}

fn validate_schema(fields: &[FieldDef]) -> Result<(), ApiError> {
    let mut seen = std::collections::HashSet::new();
    for field in fields {
        if !matches!(
            field.field_type.as_str(),
            "string" | "text" | "number" | "boolean" | "date"
        ) {
            return Err(ApiError::invalid(format!(
                "unknown type `{}` for field `{}`",
                field.field_type, field.name
            )));
        }
        if !seen.insert(field.name.as_str()) {
            return Err(ApiError::invalid(format!("duplicate field `{}`", field.name)));
        }
        if let Some(default) = field.default.as_ref().filter(|d| !d.is_null()) {
            if !type_matches(&field.field_type, default) {
                return Err(ApiError::invalid(format!(
                    "default for `{}` does not match type {}",
                    field.name, field.field_type
                )));
            }
        }
    }
    Ok(())
}

fn type_matches(field_type: &str, value: &Value) -> bool {
    match field_type {
        "string" | "text" | "date" => value.is_string(),
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        _ => false,
    }
}

/// Check `item` against `schema`. With `fill_defaults`, missing optional
/// fields receive their declared default and missing required fields fail.
fn apply_schema(schema: &[FieldDef], item: &mut Item, fill_defaults: bool) -> Result<(), ApiError> {
    for field in schema {
        match item.get(&field.name) {
            Some(Value::Null) | None => {
                if field.required && (fill_defaults || item.contains_key(&field.name)) {
                    return Err(ApiError::invalid(format!(
                        "missing required field `{}`",
                        field.name
                    )));
                }
                if fill_defaults {
                    if let Some(default) = &field.default {
                        item.insert(field.name.clone(), default.clone());
                    }
                }
            }
            Some(value) if !type_matches(&field.field_type, value) => {
                return Err(ApiError::invalid(format!(
                    "field `{}` must be of type {}",
                    field.name, field.field_type
                )));
            }
            Some(_) => {}
        }
    }
    Ok(())
}

// --- items ---

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (None | Some(Value::Null), None | Some(Value::Null)) => Ordering::Equal,
        (None | Some(Value::Null), _) => Ordering::Less,
        (_, None | Some(Value::Null)) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

async fn list_items(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((project, collection)): Path<(String, String)>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<Item>>, ApiError> {
    authorize(&state, &headers)?;

    let filter: Item = match params.filter.as_deref() {
        Some(raw) => serde_json::from_str(raw).map_err(|e| {
            ApiError(StatusCode::BAD_REQUEST, format!("`where` must be a JSON object: {e}"))
        })?,
        None => Item::new(),
    };
    let descending = match params.order.as_deref() {
        None | Some("asc") => false,
        Some("desc") => true,
        Some(other) => {
            return Err(ApiError(StatusCode::BAD_REQUEST, format!("unknown order `{other}`")))
        }
    };

    let projects = state.projects.read().await;
    let stored = projects
        .get(&project)
        .and_then(|p| p.collections.get(&collection))
        .map(Vec::as_slice)
        .unwrap_or_default();

    let mut items: Vec<&Item> = stored
        .iter()
        .filter(|item| {
            filter
                .iter()
                .all(|(k, v)| item.get(k).is_some_and(|actual| values_equal(actual, v)))
        })
        .collect();

    if let Some(sort) = &params.sort {
        // Stable sort: ties keep insertion order.
        items.sort_by(|a, b| {
            let ord = compare_values(a.get(sort), b.get(sort));
            if descending {
                ord.reverse()
            } else {
                ord
            }
        });
    }

    let select: Option<Vec<&str>> = params
        .select
        .as_deref()
        .map(|s| s.split(',').filter(|f| !f.is_empty()).collect());

    let page = items
        .into_iter()
        .skip(params.offset.unwrap_or(0))
        .take(params.limit.unwrap_or(DEFAULT_PAGE_SIZE))
        .map(|item| match &select {
            Some(fields) => item
                .iter()
                .filter(|(k, _)| k.as_str() == "id" || fields.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            None => item.clone(),
        })
        .collect();

    Ok(Json(page))
}

async fn create_item(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((project, collection)): Path<(String, String)>,
    Json(mut item): Json<Item>,
) -> Result<(StatusCode, Json<Item>), ApiError> {
    authorize(&state, &headers)?;
    let mut projects = state.projects.write().await;
    let project = projects.entry(project).or_default();
    item.remove("id");
    apply_schema(&project.schema, &mut item, true)?;
    item.insert("id".to_string(), Value::String(Uuid::new_v4().to_string()));
    project
        .collections
        .entry(collection)
        .or_default()
        .push(item.clone());
    Ok((StatusCode::CREATED, Json(item)))
}

async fn get_item(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((project, collection, id)): Path<(String, String, String)>,
) -> Result<Json<Item>, ApiError> {
    authorize(&state, &headers)?;
    let projects = state.projects.read().await;
    projects
        .get(&project)
        .and_then(|p| p.collections.get(&collection))
        .and_then(|items| items.iter().find(|i| i.get("id") == Some(&Value::String(id.clone()))))
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("item `{id}` not found")))
}

async fn update_item(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((project, collection, id)): Path<(String, String, String)>,
    Json(mut changes): Json<Item>,
) -> Result<Json<Item>, ApiError> {
    authorize(&state, &headers)?;
    let mut projects = state.projects.write().await;
    let project = projects
        .get_mut(&project)
        .ok_or_else(|| ApiError::not_found(format!("item `{id}` not found")))?;
    changes.remove("id");
    apply_schema(&project.schema, &mut changes, false)?;
    let item = project
        .collections
        .get_mut(&collection)
        .and_then(|items| {
            items
                .iter_mut()
                .find(|i| i.get("id") == Some(&Value::String(id.clone())))
        })
        .ok_or_else(|| ApiError::not_found(format!("item `{id}` not found")))?;
    for (k, v) in changes {
        item.insert(k, v);
    }
    Ok(Json(item.clone()))
}

async fn delete_item(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((project, collection, id)): Path<(String, String, String)>,
) -> Result<StatusCode, ApiError> {
    authorize(&state, &headers)?;
    let mut projects = state.projects.write().await;
    let items = projects
        .get_mut(&project)
        .and_then(|p| p.collections.get_mut(&collection))
        .ok_or_else(|| ApiError::not_found(format!("item `{id}` not found")))?;
    let before = items.len();
    items.retain(|i| i.get("id") != Some(&Value::String(id.clone())));
    if items.len() == before {
        return Err(ApiError::not_found(format!("item `{id}` not found")));
    }
    Ok(StatusCode::NO_CONTENT)
}
