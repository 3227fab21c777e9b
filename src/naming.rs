//! Mapping between input file names and resource type names.

use convert_case::{Case, Casing};

use crate::schema::SchemaRegistry;

/// Convert a string to PascalCase
pub fn to_pascal_case(s: &str) -> String {
    s.to_case(Case::Pascal)
}

/// Resolve a file stem to a registered resource type.
///
/// Tries the stem verbatim, then its PascalCase form
/// (`medication_request` → `MedicationRequest`), then a case-insensitive
/// match ignoring `_` and `-`.
pub fn resource_type_for_stem(registry: &SchemaRegistry, stem: &str) -> Option<String> {
    if registry.contains(stem) {
        return Some(stem.to_string());
    }

    let pascal = to_pascal_case(stem);
    if registry.contains(&pascal) {
        return Some(pascal);
    }

    let folded = fold(stem);
    registry
        .type_names()
        .find(|name| fold(name) == folded)
        .map(|name| name.to_string())
}

fn fold(s: &str) -> String {
    s.chars()
        .filter(|c| *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}
