//! Declarative content schema.
//!
//! A `Schema` is an ordered list of `SchemaField`s. Order is sent verbatim
//! and only affects how the backend displays fields.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{CmsError, CmsResult};
use crate::value::{FieldType, FieldValue};

/// Definition of one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<FieldValue>,
}

impl SchemaField {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: false,
            default: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_default(mut self, value: impl Into<FieldValue>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Check name, default/type compatibility and the required/default rule.
    pub fn validate(&self) -> CmsResult<()> {
        if self.name.trim().is_empty() {
            return Err(CmsError::invalid_field(&self.name, "field name must not be empty"));
        }
        match &self.default {
            None | Some(FieldValue::Null) => Ok(()),
            Some(_) if self.required => Err(CmsError::invalid_field(
                &self.name,
                "a required field cannot declare a default",
            )),
            Some(value) if !value.matches(self.field_type) => Err(CmsError::invalid_field(
                &self.name,
                format!(
                    "default of kind {} does not match field type {}",
                    value.kind(),
                    self.field_type
                ),
            )),
            Some(_) => Ok(()),
        }
    }
}

/// An ordered set of field definitions with unique names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub fields: Vec<SchemaField>,
}

impl Schema {
    pub fn new(fields: Vec<SchemaField>) -> Self {
        Self { fields }
    }

    /// Builder-style append.
    pub fn field(mut self, field: SchemaField) -> Self {
        self.fields.push(field);
        self
    }

    pub fn get(&self, name: &str) -> Option<&SchemaField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Validate every field and name uniqueness. Stops at the first failure.
    pub fn validate(&self) -> CmsResult<()> {
        if self.fields.is_empty() {
            return Err(CmsError::Validation {
                field: None,
                status: None,
                message: "schema must declare at least one field".to_string(),
            });
        }
        let mut seen = HashSet::with_capacity(self.fields.len());
        for field in &self.fields {
            field.validate()?;
            if !seen.insert(field.name.as_str()) {
                return Err(CmsError::invalid_field(&field.name, "duplicate field name"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blog_schema() -> Schema {
        Schema::new(vec![
            SchemaField::new("title", FieldType::String).required(),
            SchemaField::new("published", FieldType::Boolean).with_default(false),
        ])
    }

    #[test]
    fn well_formed_schema_validates() {
        assert!(blog_schema().validate().is_ok());
    }

    #[test]
    fn serializes_fields_in_declaration_order() {
        let json = serde_json::to_value(blog_schema()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "fields": [
                    {"name": "title", "type": "string", "required": true},
                    {"name": "published", "type": "boolean", "required": false, "default": false}
                ]
            })
        );
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let schema = blog_schema().field(SchemaField::new("title", FieldType::Text));
        let err = schema.validate().unwrap_err();
        match err {
            CmsError::Validation { field, .. } => assert_eq!(field.as_deref(), Some("title")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn mismatched_default_is_rejected() {
        let schema = Schema::new(vec![SchemaField::new("views", FieldType::Number).with_default("ten")]);
        let err = schema.validate().unwrap_err();
        assert!(err.to_string().contains("views"));
        assert!(err.to_string().contains("number"));
    }

    #[test]
    fn required_field_with_default_is_rejected() {
        let schema = Schema::new(vec![SchemaField::new("title", FieldType::String)
            .required()
            .with_default("untitled")]);
        assert!(schema.validate().unwrap_err().is_validation());
    }

    #[test]
    fn null_default_counts_as_absent() {
        let schema = Schema::new(vec![SchemaField::new("title", FieldType::String)
            .required()
            .with_default(FieldValue::Null)]);
        assert!(schema.validate().is_ok());
    }

    #[test]
    fn empty_schema_and_blank_names_are_rejected() {
        assert!(Schema::default().validate().is_err());
        let schema = Schema::new(vec![SchemaField::new(" ", FieldType::Text)]);
        assert!(schema.validate().is_err());
    }

    #[test]
    fn date_default_accepts_rfc3339_text() {
        let schema = Schema::new(vec![
            SchemaField::new("published_at", FieldType::Date).with_default("2024-01-01T00:00:00Z")
        ]);
        assert!(schema.validate().is_ok());
    }

    #[test]
    fn lookup_by_name() {
        let schema = blog_schema();
        assert_eq!(schema.get("published").map(|f| f.field_type), Some(FieldType::Boolean));
        assert!(schema.get("missing").is_none());
    }
}
