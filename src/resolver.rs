//! Relationship resolver.
//!
//! Walks the records of every loaded table against the relationship
//! declarations of its type and emits the type-level edges that at least one
//! record realizes. A declaration counts when some record populates its
//! child field and the parent table is loaded. Parent records are not
//! checked for a matching key.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::loader::table::Table;
use crate::schema::{RelationshipDeclaration, SchemaRegistry};

/// A realized relationship: `(source_table, source_key_field)` →
/// `(target_table, target_key_field)`, parent to child
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Edge {
    pub source_table: String,
    pub source_key_field: String,
    pub target_table: String,
    pub target_key_field: String,
}

impl Edge {
    pub fn new(
        source_table: impl Into<String>,
        source_key_field: impl Into<String>,
        target_table: impl Into<String>,
        target_key_field: impl Into<String>,
    ) -> Self {
        Self {
            source_table: source_table.into(),
            source_key_field: source_key_field.into(),
            target_table: target_table.into(),
            target_key_field: target_key_field.into(),
        }
    }

    pub fn from_declaration(declaration: &RelationshipDeclaration) -> Self {
        Self::new(
            &declaration.parent_type,
            &declaration.parent_key_field,
            &declaration.child_type,
            &declaration.child_field,
        )
    }

    /// Whether either endpoint is `table`
    pub fn references(&self, table: &str) -> bool {
        self.source_table == table || self.target_table == table
    }

    pub fn is_self_referential(&self) -> bool {
        self.source_table == self.target_table
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{} -> {}.{}",
            self.source_table, self.source_key_field, self.target_table, self.target_key_field
        )
    }
}

/// Result of resolving a set of loaded tables
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub edges: BTreeSet<Edge>,
    /// Declarations populated by some record whose parent table is not loaded
    pub dangling: BTreeSet<RelationshipDeclaration>,
}

/// Resolve the edges realized by `tables`.
///
/// Each table is visited once and each record of it once per declaration,
/// so self-referential declarations need no special handling.
pub fn resolve(registry: &SchemaRegistry, tables: &BTreeMap<String, Table>) -> Resolution {
    let mut resolution = Resolution::default();

    for table in tables.values() {
        resolve_table(registry, table, tables, &mut resolution);
    }

    resolution
}

/// Resolve the declarations of one table's type into `resolution`
pub fn resolve_table(
    registry: &SchemaRegistry,
    table: &Table,
    tables: &BTreeMap<String, Table>,
    resolution: &mut Resolution,
) {
    for declaration in registry.declarations_for(table.resource_type()) {
        let populated = table
            .records()
            .iter()
            .any(|record| record.is_populated(&declaration.child_field));

        if !populated {
            continue;
        }

        if tables.contains_key(&declaration.parent_type) {
            resolution.edges.insert(Edge::from_declaration(declaration));
        } else {
            debug!(
                declaration = %declaration,
                "Relationship populated but parent table is not loaded"
            );
            resolution.dangling.insert(declaration.clone());
        }
    }
}
