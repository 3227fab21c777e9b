//! Record materializer: turns one raw row plus a type descriptor into a
//! typed [`Record`].
//!
//! Unknown columns are dropped, enum-constrained fields are checked
//! case-insensitively, each cell is coerced by its field's semantic type,
//! and the record identity is resolved from the type's declared identifier
//! field, then `identifier` → `id` → `object_id`.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use indexmap::IndexMap;
use tracing::warn;

use crate::error::{MaterializationError, Result};
use crate::record::{FieldValue, Record};
use crate::schema::{FieldDef, FieldType, ResourceTypeDescriptor, SchemaRegistry};

/// Raw row: column name → cell, `None` for a null cell
pub type RawRow = IndexMap<String, Option<String>>;

/// Identity fields in precedence order
pub const IDENTITY_FIELDS: [&str; 3] = ["identifier", "id", "object_id"];

const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"];

/// A materialized record together with the row columns that were dropped
#[derive(Debug, Clone, PartialEq)]
pub struct Materialized {
    pub record: Record,
    pub dropped_columns: Vec<String>,
}

/// Materializes rows of any registered type by looking up its descriptor.
///
/// # Example
///
/// ```ignore
/// let materializer = Materializer::new(&registry);
/// let record = materializer.materialize("Patient", &row)?;
/// ```
pub struct Materializer<'a> {
    registry: &'a SchemaRegistry,
}

impl<'a> Materializer<'a> {
    pub fn new(registry: &'a SchemaRegistry) -> Self {
        Self { registry }
    }

    /// Materialize one row of `resource_type`.
    ///
    /// Columns not declared by the type are dropped with a warning.
    pub fn materialize(&self, resource_type: &str, row: &RawRow) -> Result<Record> {
        let descriptor = self.registry.lookup(resource_type)?;
        let materialized = materialize_row(descriptor, row)?;

        if !materialized.dropped_columns.is_empty() {
            warn!(
                resource_type,
                columns = ?materialized.dropped_columns,
                "Dropping columns not declared by the resource type"
            );
        }

        Ok(materialized.record)
    }
}

/// Materialize one row against a resolved descriptor.
///
/// Every declared field is present in the record, in declaration order.
pub fn materialize_row(
    descriptor: &ResourceTypeDescriptor,
    row: &RawRow,
) -> Result<Materialized, MaterializationError> {
    let dropped_columns: Vec<String> = row
        .keys()
        .filter(|column| !descriptor.has_field(column))
        .cloned()
        .collect();

    let mut fields = IndexMap::with_capacity(descriptor.fields().len());
    for field in descriptor.fields() {
        let raw = row.get(&field.name).and_then(|cell| cell.as_deref());
        let value = match raw {
            Some(raw) => coerce(field, raw)?,
            None => FieldValue::Null,
        };
        fields.insert(field.name.clone(), value);
    }

    let identity = resolve_identity(descriptor, &fields)?;

    Ok(Materialized {
        record: Record::new(descriptor.name(), fields, identity),
        dropped_columns,
    })
}

/// Resolve record identity: the first non-null of the descriptor's
/// identifier field, `identifier`, `id`, `object_id`.
pub fn resolve_identity(
    descriptor: &ResourceTypeDescriptor,
    fields: &IndexMap<String, FieldValue>,
) -> Result<FieldValue, MaterializationError> {
    descriptor
        .identifier_field()
        .into_iter()
        .chain(IDENTITY_FIELDS)
        .filter_map(|name| fields.get(name))
        .find(|value| !value.is_null())
        .cloned()
        .ok_or_else(|| MaterializationError::MissingIdentifier {
            resource_type: descriptor.name().to_string(),
        })
}

/// Coerce a non-null raw cell by the field's enum constraint and semantic type
fn coerce(field: &FieldDef, raw: &str) -> Result<FieldValue, MaterializationError> {
    let raw = raw.trim();

    if raw.is_empty() {
        return Ok(FieldValue::Null);
    }

    // Enum values are coerced in their canonical spelling
    let raw = match field.allowed_values {
        Some(ref constraint) => constraint.canonical(raw).ok_or_else(|| MaterializationError::EnumViolation {
            field: field.name.clone(),
            value: raw.to_string(),
            allowed: constraint.allowed().to_vec(),
        })?,
        None => raw,
    };

    let invalid = || MaterializationError::InvalidValue {
        field: field.name.clone(),
        value: raw.to_string(),
        expected: field.field_type,
    };

    match field.field_type {
        FieldType::String | FieldType::Reference | FieldType::Code => {
            Ok(FieldValue::String(raw.to_string()))
        }
        FieldType::Integer => raw.parse().map(FieldValue::Int).map_err(|_| invalid()),
        FieldType::Float => raw.parse().map(FieldValue::Float).map_err(|_| invalid()),
        FieldType::Boolean => parse_bool(raw).map(FieldValue::Bool).ok_or_else(invalid),
        FieldType::DateTime => parse_datetime(raw).map(FieldValue::DateTime).ok_or_else(invalid),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "1" => Some(true),
        "false" | "f" | "no" | "n" | "0" => Some(false),
        _ => None,
    }
}

fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }

    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt);
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn row(cells: &[(&str, Option<&str>)]) -> RawRow {
        cells
            .iter()
            .map(|(k, v)| (k.to_string(), v.map(|s| s.to_string())))
            .collect()
    }

    fn audit_event() -> ResourceTypeDescriptor {
        ResourceTypeDescriptor::new("AuditEvent")
            .with_field(FieldDef::new("id", FieldType::String))
            .with_field(FieldDef::new("action", FieldType::Code).with_enum(["C", "R", "U", "D", "E"]))
            .with_field(FieldDef::new("recorded", FieldType::DateTime))
    }

    fn observation() -> ResourceTypeDescriptor {
        ResourceTypeDescriptor::new("Observation")
            .with_field(FieldDef::new("identifier", FieldType::String))
            .with_field(FieldDef::new("id", FieldType::String))
            .with_field(FieldDef::new("object_id", FieldType::String))
            .with_field(FieldDef::new("value", FieldType::Float))
            .with_field(FieldDef::new("count", FieldType::Integer))
            .with_field(FieldDef::new("abnormal", FieldType::Boolean))
    }

    #[test]
    fn test_enum_violation() {
        let result = materialize_row(&audit_event(), &row(&[("id", Some("a1")), ("action", Some("Z"))]));

        assert_eq!(
            result,
            Err(MaterializationError::EnumViolation {
                field: "action".to_string(),
                value: "Z".to_string(),
                allowed: vec!["C", "R", "U", "D", "E"].into_iter().map(String::from).collect(),
            })
        );
    }

    #[test]
    fn test_enum_match_is_case_insensitive() {
        let materialized =
            materialize_row(&audit_event(), &row(&[("id", Some("a1")), ("action", Some("c"))])).unwrap();

        assert_eq!(materialized.record.get("action"), Some(&FieldValue::from("C")));
    }

    #[test]
    fn test_null_enum_value_is_not_checked() {
        let materialized =
            materialize_row(&audit_event(), &row(&[("id", Some("a1")), ("action", None)])).unwrap();

        assert_eq!(materialized.record.get("action"), Some(&FieldValue::Null));
    }

    #[test]
    fn test_unknown_columns_are_dropped() {
        let materialized = materialize_row(
            &audit_event(),
            &row(&[("id", Some("a1")), ("export_batch", Some("7")), ("action", Some("R"))]),
        )
        .unwrap();

        assert_eq!(materialized.dropped_columns, vec!["export_batch".to_string()]);
        assert_eq!(materialized.record.get("export_batch"), None);
        let names: Vec<&str> = materialized.record.iter().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["id", "action", "recorded"]);
    }

    #[test]
    fn test_identity_precedence() {
        let descriptor = observation();

        let all = row(&[("identifier", Some("i1")), ("id", Some("d1")), ("object_id", Some("o1"))]);
        let no_identifier = row(&[("identifier", None), ("id", Some("d1")), ("object_id", Some("o1"))]);
        let only_object_id = row(&[("object_id", Some("o1"))]);

        assert_eq!(materialize_row(&descriptor, &all).unwrap().record.identity(), &FieldValue::from("i1"));
        assert_eq!(
            materialize_row(&descriptor, &no_identifier).unwrap().record.identity(),
            &FieldValue::from("d1")
        );
        assert_eq!(
            materialize_row(&descriptor, &only_object_id).unwrap().record.identity(),
            &FieldValue::from("o1")
        );
    }

    #[test]
    fn test_identity_from_declared_identifier_field() {
        let descriptor = ResourceTypeDescriptor::new("Patient")
            .with_field(FieldDef::new("mrn", FieldType::String))
            .with_field(FieldDef::new("id", FieldType::String))
            .with_identifier_field("mrn");

        let declared = row(&[("mrn", Some("m1")), ("id", Some("d1"))]);
        let fallback = row(&[("mrn", None), ("id", Some("d1"))]);

        assert_eq!(materialize_row(&descriptor, &declared).unwrap().record.identity(), &FieldValue::from("m1"));
        assert_eq!(materialize_row(&descriptor, &fallback).unwrap().record.identity(), &FieldValue::from("d1"));
        assert!(materialize_row(&descriptor, &row(&[("mrn", None)])).is_err());
    }

    #[test]
    fn test_enum_value_is_coerced_by_field_type() {
        let descriptor = ResourceTypeDescriptor::new("AuditEvent")
            .with_field(FieldDef::new("id", FieldType::String))
            .with_field(FieldDef::new("outcome", FieldType::Integer).with_enum(["0", "4", "8", "12"]))
            .with_field(FieldDef::new("flagged", FieldType::Boolean).with_enum(["true", "false"]));

        let record = materialize_row(
            &descriptor,
            &row(&[("id", Some("a1")), ("outcome", Some("8")), ("flagged", Some("TRUE"))]),
        )
        .unwrap()
        .record;

        assert_eq!(record.get("outcome"), Some(&FieldValue::Int(8)));
        assert_eq!(record.get("flagged"), Some(&FieldValue::Bool(true)));
    }

    #[test]
    fn test_missing_identifier() {
        let result = materialize_row(&observation(), &row(&[("value", Some("1.5")), ("id", Some("  "))]));

        assert_eq!(
            result,
            Err(MaterializationError::MissingIdentifier {
                resource_type: "Observation".to_string()
            })
        );
    }

    #[test]
    fn test_value_coercion() {
        let materialized = materialize_row(
            &observation(),
            &row(&[
                ("id", Some("o1")),
                ("value", Some(" 4.25 ")),
                ("count", Some("3")),
                ("abnormal", Some("Yes")),
            ]),
        )
        .unwrap();

        let record = materialized.record;
        assert_eq!(record.get("value"), Some(&FieldValue::Float(4.25)));
        assert_eq!(record.get("count"), Some(&FieldValue::Int(3)));
        assert_eq!(record.get("abnormal"), Some(&FieldValue::Bool(true)));
    }

    #[test]
    fn test_invalid_value() {
        let result = materialize_row(&observation(), &row(&[("id", Some("o1")), ("count", Some("three"))]));

        assert!(matches!(
            result,
            Err(MaterializationError::InvalidValue { ref field, expected: FieldType::Integer, .. }) if field == "count"
        ));
    }

    #[test]
    fn test_parse_datetime_formats() {
        let midnight = NaiveDate::from_ymd_opt(2023, 5, 17).unwrap().and_hms_opt(0, 0, 0).unwrap();
        let morning = NaiveDate::from_ymd_opt(2023, 5, 17).unwrap().and_hms_opt(9, 15, 0).unwrap();

        assert_eq!(parse_datetime("2023-05-17"), Some(midnight));
        assert_eq!(parse_datetime("2023-05-17T09:15:00"), Some(morning));
        assert_eq!(parse_datetime("2023-05-17 09:15:00"), Some(morning));
        assert_eq!(parse_datetime("2023-05-17T11:15:00+02:00"), Some(morning));
        assert_eq!(parse_datetime("17/05/2023"), None);
    }

    #[test]
    fn test_materializer_looks_up_descriptor() {
        let registry = SchemaRegistry::from_descriptors([audit_event()]).unwrap();
        let materializer = Materializer::new(&registry);

        let record = materializer
            .materialize("AuditEvent", &row(&[("id", Some("a1")), ("action", Some("e"))]))
            .unwrap();
        assert_eq!(record.resource_type(), "AuditEvent");

        let unknown = materializer.materialize("Specimen", &row(&[("id", Some("s1"))]));
        assert!(matches!(unknown, Err(Error::Configuration(_))));
    }
}
