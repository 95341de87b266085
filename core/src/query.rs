//! Filter, projection, ordering and paging options for `Collection::find`.
//!
//! Every member is optional; an absent member places no constraint. Options
//! compile into query-string pairs:
//!
//! | option   | parameter                              |
//! |----------|----------------------------------------|
//! | `where`  | `where` = JSON object, equality-AND    |
//! | `select` | `select` = comma-separated field names |
//! | `limit`  | `limit`                                |
//! | `offset` | `offset`                               |
//! | `sort`   | `sort` = field, `order` = `asc`/`desc` |
//!
//! An omitted `limit` means the backend's default page size, which is not
//! necessarily "everything". Ties under `sort` come back in the backend's
//! natural order, which is unspecified.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CmsError, CmsResult};
use crate::value::FieldValue;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Single-key ordering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sort {
    pub field: String,
    #[serde(default)]
    pub order: SortOrder,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOptions {
    pub filter: BTreeMap<String, FieldValue>,
    pub select: Vec<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    pub sort: Option<Sort>,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `field` to equal `value`. Repeating a field replaces its value.
    pub fn filter(mut self, field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.filter.insert(field.into(), value.into());
        self
    }

    /// Project onto `fields`. Duplicates keep their first position.
    pub fn select<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for field in fields {
            let field = field.into();
            if !self.select.contains(&field) {
                self.select.push(field);
            }
        }
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn sort(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.sort = Some(Sort {
            field: field.into(),
            order,
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.filter.is_empty()
            && self.select.is_empty()
            && self.limit.is_none()
            && self.offset.is_none()
            && self.sort.is_none()
    }

    /// Reject blank field names before anything is sent.
    pub fn validate(&self) -> CmsResult<()> {
        let blank = |name: &str| name.trim().is_empty();
        if self.filter.keys().any(|k| blank(k)) {
            return Err(CmsError::invalid_field("where", "filter field names must not be empty"));
        }
        if self.select.iter().any(|s| blank(s) || s.contains(',')) {
            return Err(CmsError::invalid_field(
                "select",
                "selected field names must be non-empty and contain no commas",
            ));
        }
        if let Some(sort) = &self.sort {
            if blank(&sort.field) {
                return Err(CmsError::invalid_field("sort", "sort field must not be empty"));
            }
        }
        Ok(())
    }

    /// Compile into ordered query-string pairs (not yet percent-encoded).
    pub fn to_query_pairs(&self) -> CmsResult<Vec<(String, String)>> {
        self.validate()?;
        let mut pairs = Vec::new();
        if !self.filter.is_empty() {
            let encoded = serde_json::to_string(&self.filter)
                .map_err(|e| CmsError::Serialization(e.to_string()))?;
            pairs.push(("where".to_string(), encoded));
        }
        if !self.select.is_empty() {
            pairs.push(("select".to_string(), self.select.join(",")));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit".to_string(), limit.to_string()));
        }
        if let Some(offset) = self.offset {
            pairs.push(("offset".to_string(), offset.to_string()));
        }
        if let Some(sort) = &self.sort {
            pairs.push(("sort".to_string(), sort.field.clone()));
            pairs.push(("order".to_string(), sort.order.as_str().to_string()));
        }
        Ok(pairs)
    }
}
