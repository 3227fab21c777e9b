//! Entity graph assembly.
//!
//! The graph is the terminal, read-only artifact of a load: per-type tables
//! as nodes and realized relationships as edges. Every stored edge has both
//! endpoint tables in the graph.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use serde::Serialize;
use tracing::warn;

use crate::error::GraphError;
use crate::loader::table::Table;
use crate::resolver::Edge;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EntityGraph {
    tables: BTreeMap<String, Table>,
    edges: BTreeSet<Edge>,
}

/// An assembled graph and the edges left out of it
#[derive(Debug, Clone)]
pub struct Assembly {
    pub graph: EntityGraph,
    pub dropped_edges: Vec<Edge>,
}

/// Assemble tables and edges into an [`EntityGraph`].
///
/// Edges with an endpoint table outside `tables` are dropped and logged.
/// Assembly never fails.
pub fn assemble<I>(tables: BTreeMap<String, Table>, edges: I) -> Assembly
where
    I: IntoIterator<Item = Edge>,
{
    let mut kept = BTreeSet::new();
    let mut dropped_edges = Vec::new();

    for edge in edges {
        let missing = [&edge.source_table, &edge.target_table]
            .into_iter()
            .find(|table| !tables.contains_key(table.as_str()))
            .cloned();

        match missing {
            Some(table) => {
                warn!(edge = %edge, missing_table = %table, "Dropping edge to absent table");
                dropped_edges.push(edge);
            }
            None => {
                kept.insert(edge);
            }
        }
    }

    Assembly {
        graph: EntityGraph { tables, edges: kept },
        dropped_edges,
    }
}

impl EntityGraph {
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    pub fn contains_table(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.tables.values()
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.iter()
    }

    pub fn contains_edge(&self, edge: &Edge) -> bool {
        self.edges.contains(edge)
    }

    /// Edges whose parent side is `table`
    pub fn edges_from<'a>(&'a self, table: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |edge| edge.source_table == table)
    }

    /// Edges whose child side is `table`
    pub fn edges_into<'a>(&'a self, table: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |edge| edge.target_table == table)
    }

    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Total records across all tables
    pub fn record_count(&self) -> usize {
        self.tables.values().map(Table::len).sum()
    }

    /// Layer tables so that every parent comes in an earlier level than its
    /// children (Kahn's algorithm). Self-referential edges are ignored.
    pub fn processing_levels(&self) -> Result<Vec<Vec<String>>, GraphError> {
        let mut in_degree: BTreeMap<&str, usize> = self.tables.keys().map(|name| (name.as_str(), 0)).collect();
        let mut dependents: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();

        for edge in self.edges.iter().filter(|edge| !edge.is_self_referential()) {
            let children = dependents.entry(edge.source_table.as_str()).or_default();
            // Several edges between the same pair count once
            if children.insert(edge.target_table.as_str()) {
                if let Some(degree) = in_degree.get_mut(edge.target_table.as_str()) {
                    *degree += 1;
                }
            }
        }

        let mut queue: VecDeque<&str> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(name, _)| *name)
            .collect();

        let mut levels = Vec::new();
        let mut processed = 0;

        while !queue.is_empty() {
            let mut current_level = Vec::with_capacity(queue.len());

            for _ in 0..queue.len() {
                let Some(table) = queue.pop_front() else { break };
                current_level.push(table.to_string());
                processed += 1;

                for child in dependents.get(table).into_iter().flatten() {
                    if let Some(degree) = in_degree.get_mut(child) {
                        *degree -= 1;
                        if *degree == 0 {
                            queue.push_back(child);
                        }
                    }
                }
            }

            levels.push(current_level);
        }

        if processed != self.tables.len() {
            let cyclic = in_degree
                .into_iter()
                .filter(|(_, degree)| *degree > 0)
                .map(|(name, _)| name.to_string())
                .collect();
            return Err(GraphError::Cycle(cyclic));
        }

        Ok(levels)
    }
}
