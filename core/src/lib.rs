//! Async client core for a hosted CMS backend.
//!
//! # Overview
//! Declares content schemas and runs create/query/update/delete operations
//! against one CMS project, authenticating every call with a caller-supplied
//! API key.
//!
//! # Design
//! - `CmsClient` holds only an immutable `ClientConfig` and a `Transport`;
//!   it is `Clone` and safe to share across tasks.
//! - `SchemaMigrator` and `Collection` split each operation into `build_*`
//!   (produces an `HttpRequest`) and `parse_*` (consumes an `HttpResponse`),
//!   with an async method doing the single round-trip in between.
//! - No retries, caching or timeouts; every failure surfaces as a `CmsError`
//!   whose kind tells the caller whether a retry makes sense.
//! - DTOs are defined independently from the mock-server crate; integration
//!   tests catch wire drift.

pub mod client;
pub mod collection;
pub mod config;
pub mod error;
pub mod http;
pub mod migrator;
pub mod query;
pub mod schema;
pub mod transport;
pub mod value;

pub use client::CmsClient;
pub use collection::Collection;
pub use config::ClientConfig;
pub use error::{CmsError, CmsResult};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use migrator::SchemaMigrator;
pub use query::{QueryOptions, Sort, SortOrder};
pub use schema::{Schema, SchemaField};
pub use transport::{HttpTransport, Transport};
pub use value::{ContentItem, FieldType, FieldValue};
