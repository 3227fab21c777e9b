//! Type definitions for resource type descriptors.
//!
//! A descriptor is the static, per-type schema consumed by the record
//! materializer, the table loader and the relationship resolver. Descriptors
//! are immutable once registered.

use std::collections::HashSet;
use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

fn default_field_type() -> FieldType {
    FieldType::String
}

fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z][A-Za-z0-9_]*$").expect("identifier pattern is a valid regex")
    })
}

/// Semantic type of a field, driving value coercion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    String,
    Integer,
    Float,
    Boolean,
    DateTime,
    /// Holds the key of a record in another (or the same) table
    Reference,
    /// Coded value, usually paired with an enum constraint
    Code,
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldType::String => "string",
            FieldType::Integer => "integer",
            FieldType::Float => "float",
            FieldType::Boolean => "boolean",
            FieldType::DateTime => "date_time",
            FieldType::Reference => "reference",
            FieldType::Code => "code",
        };
        write!(f, "{}", name)
    }
}

/// Set of allowed values for a field, compared case-insensitively
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EnumConstraint {
    allowed: Vec<String>,
}

impl EnumConstraint {
    pub fn new<I, S>(allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: allowed.into_iter().map(Into::into).collect(),
        }
    }

    pub fn allowed(&self) -> &[String] {
        &self.allowed
    }

    /// Returns the canonical spelling of `value` if it is allowed.
    pub fn canonical(&self, value: &str) -> Option<&str> {
        self.allowed
            .iter()
            .find(|allowed| {
                allowed
                    .chars()
                    .flat_map(char::to_lowercase)
                    .eq(value.chars().flat_map(char::to_lowercase))
            })
            .map(|s| s.as_str())
    }
}

/// Field definition of a resource type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldDef {
    /// Field (column) name
    pub name: String,
    /// Semantic type
    #[serde(rename = "type", default = "default_field_type")]
    pub field_type: FieldType,
    /// Allowed values, if the field is enum-constrained
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub allowed_values: Option<EnumConstraint>,
    /// Documentation string
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            allowed_values: None,
            doc: None,
        }
    }

    pub fn with_enum<I, S>(mut self, allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_values = Some(EnumConstraint::new(allowed));
        self
    }
}

/// Static statement that `child_type.child_field` may reference
/// `parent_type.parent_key_field`.
///
/// May be self-referential (`parent_type == child_type`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RelationshipDeclaration {
    pub parent_type: String,
    pub parent_key_field: String,
    pub child_type: String,
    pub child_field: String,
}

impl RelationshipDeclaration {
    pub fn new(
        parent_type: impl Into<String>,
        parent_key_field: impl Into<String>,
        child_type: impl Into<String>,
        child_field: impl Into<String>,
    ) -> Self {
        Self {
            parent_type: parent_type.into(),
            parent_key_field: parent_key_field.into(),
            child_type: child_type.into(),
            child_field: child_field.into(),
        }
    }

    pub fn is_self_referential(&self) -> bool {
        self.parent_type == self.child_type
    }
}

impl fmt::Display for RelationshipDeclaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{} -> {}.{}",
            self.parent_type, self.parent_key_field, self.child_type, self.child_field
        )
    }
}

/// Schema of one resource type.
///
/// Built with the `with_*` methods (or loaded from YAML by
/// [`crate::schema::load_schemas`]) and checked by [`validate`](Self::validate)
/// on registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceTypeDescriptor {
    name: String,
    fields: Vec<FieldDef>,
    identifier_field: Option<String>,
    time_index: Option<String>,
    relationships: Vec<RelationshipDeclaration>,
}

impl ResourceTypeDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            identifier_field: None,
            time_index: None,
            relationships: Vec::new(),
        }
    }

    pub fn with_field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    pub fn with_fields(mut self, fields: impl IntoIterator<Item = FieldDef>) -> Self {
        self.fields.extend(fields);
        self
    }

    /// Name the field that holds this type's explicit identifier.
    pub fn with_identifier_field(mut self, field: impl Into<String>) -> Self {
        self.identifier_field = Some(field.into());
        self
    }

    /// Mark the type temporal, indexed by `field`.
    pub fn with_time_index(mut self, field: impl Into<String>) -> Self {
        self.time_index = Some(field.into());
        self
    }

    /// Declare that `child_field` of this type references
    /// `parent_type.parent_key_field`.
    pub fn with_relationship(
        mut self,
        child_field: impl Into<String>,
        parent_type: impl Into<String>,
        parent_key_field: impl Into<String>,
    ) -> Self {
        let declaration =
            RelationshipDeclaration::new(parent_type, parent_key_field, self.name.clone(), child_field);
        self.relationships.push(declaration);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    pub fn identifier_field(&self) -> Option<&str> {
        self.identifier_field.as_deref()
    }

    pub fn time_index(&self) -> Option<&str> {
        self.time_index.as_deref()
    }

    pub fn relationships(&self) -> &[RelationshipDeclaration] {
        &self.relationships
    }

    /// Validate descriptor consistency.
    ///
    /// Parent types of relationships are not checked: they may
    /// name types that are never registered or loaded.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let invalid = |reason: String| ConfigurationError::InvalidDescriptor {
            resource_type: self.name.clone(),
            reason,
        };

        if !identifier_pattern().is_match(&self.name) {
            return Err(invalid(format!("'{}' is not a valid type name", self.name)));
        }

        if self.fields.is_empty() {
            return Err(invalid("no fields declared".to_string()));
        }

        let mut seen = HashSet::new();
        for field in &self.fields {
            if field.name.is_empty() {
                return Err(invalid("field name cannot be empty".to_string()));
            }
            if !seen.insert(field.name.as_str()) {
                return Err(invalid(format!("duplicate field '{}'", field.name)));
            }
        }

        if let Some(ref identifier) = self.identifier_field {
            if !self.has_field(identifier) {
                return Err(invalid(format!(
                    "identifier field '{}' is not declared",
                    identifier
                )));
            }
        }

        if let Some(ref time_index) = self.time_index {
            if !self.has_field(time_index) {
                return Err(invalid(format!(
                    "time index field '{}' is not declared",
                    time_index
                )));
            }
        }

        for declaration in &self.relationships {
            if declaration.child_type != self.name {
                return Err(invalid(format!(
                    "relationship '{}' belongs to '{}'",
                    declaration, declaration.child_type
                )));
            }
            if !self.has_field(&declaration.child_field) {
                return Err(invalid(format!(
                    "relationship '{}' references undeclared field '{}'",
                    declaration, declaration.child_field
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn observation() -> ResourceTypeDescriptor {
        ResourceTypeDescriptor::new("Observation")
            .with_field(FieldDef::new("id", FieldType::String))
            .with_field(FieldDef::new("subject", FieldType::Reference))
            .with_field(FieldDef::new("effective", FieldType::DateTime))
            .with_identifier_field("id")
            .with_time_index("effective")
            .with_relationship("subject", "Patient", "identifier")
    }

    #[test]
    fn test_enum_constraint_is_case_insensitive() {
        let constraint = EnumConstraint::new(["C", "R", "U", "D", "E"]);

        assert_eq!(constraint.canonical("c"), Some("C"));
        assert_eq!(constraint.canonical("E"), Some("E"));
        assert_eq!(constraint.canonical("Z"), None);
    }

    #[test]
    fn test_with_relationship_uses_own_name_as_child() {
        let descriptor = observation();

        assert_eq!(
            descriptor.relationships(),
            &[RelationshipDeclaration::new("Patient", "identifier", "Observation", "subject")]
        );
        assert!(descriptor.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_duplicate_fields() {
        let descriptor = ResourceTypeDescriptor::new("Patient")
            .with_field(FieldDef::new("id", FieldType::String))
            .with_field(FieldDef::new("id", FieldType::Integer));

        let err = descriptor.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate field 'id'"));
    }

    #[test]
    fn test_validate_rejects_undeclared_time_index() {
        let descriptor = ResourceTypeDescriptor::new("Encounter")
            .with_field(FieldDef::new("id", FieldType::String))
            .with_time_index("period_start");

        assert!(descriptor.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_undeclared_child_field() {
        let descriptor = ResourceTypeDescriptor::new("Observation")
            .with_field(FieldDef::new("id", FieldType::String))
            .with_relationship("specimen", "Specimen", "id");

        assert!(descriptor.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_type_name() {
        let descriptor = ResourceTypeDescriptor::new("audit-event")
            .with_field(FieldDef::new("id", FieldType::String));

        assert!(descriptor.validate().is_err());
    }

    #[test]
    fn test_field_def_from_yaml() {
        let yaml = "name: action\ntype: code\nenum: [C, R, U, D, E]\n";
        let field: FieldDef = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(field.field_type, FieldType::Code);
        assert_eq!(field.allowed_values.unwrap().allowed().len(), 5);

        let untyped: FieldDef = serde_yaml::from_str("name: note\n").unwrap();
        assert_eq!(untyped.field_type, FieldType::String);
    }
}
