//! Hand-off to an external feature-engineering implementation.
//!
//! The crate computes no features itself. A [`FeatureSynthesizer`] receives
//! the assembled graph, a target table and the cutoff times it owns, and
//! returns a feature matrix.

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::error::{Error, GraphError, Result};
use crate::graph::EntityGraph;
use crate::record::FieldValue;

/// Point in time up to which data for one target instance may be used
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CutoffTime {
    pub instance_id: FieldValue,
    pub time: NaiveDateTime,
    pub label: Option<FieldValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SynthesisRequest {
    pub target_table: String,
    pub cutoff_times: Vec<CutoffTime>,
}

impl SynthesisRequest {
    pub fn new(target_table: impl Into<String>) -> Self {
        Self {
            target_table: target_table.into(),
            cutoff_times: Vec::new(),
        }
    }

    pub fn with_cutoff_times(mut self, cutoff_times: Vec<CutoffTime>) -> Self {
        self.cutoff_times = cutoff_times;
        self
    }
}

/// Features per target instance, one row per instance
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FeatureMatrix {
    pub feature_names: Vec<String>,
    pub instance_ids: Vec<FieldValue>,
    pub rows: Vec<Vec<FieldValue>>,
}

impl FeatureMatrix {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Implemented by the feature-engineering collaborator
pub trait FeatureSynthesizer {
    fn synthesize(&self, graph: &EntityGraph, request: &SynthesisRequest) -> std::result::Result<FeatureMatrix, String>;
}

/// Hand the graph to `synthesizer` once the target table is known to exist
pub fn synthesize_features<S>(synthesizer: &S, graph: &EntityGraph, request: &SynthesisRequest) -> Result<FeatureMatrix>
where
    S: FeatureSynthesizer + ?Sized,
{
    if !graph.contains_table(&request.target_table) {
        return Err(GraphError::UnknownTable(request.target_table.clone()).into());
    }

    synthesizer.synthesize(graph, request).map_err(Error::Synthesis)
}
