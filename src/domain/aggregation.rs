//! Filtering policy for synthesized edges.
//!
//! The store does the heavy lifting (resolving every real edge to the nearest
//! visible ancestor of each endpoint and grouping). What it returns still has
//! to be cleaned against the view it is about to be installed into.

use crate::domain::edge::AggregatedEdge;
use crate::domain::view::ViewState;
use std::collections::HashSet;

/// Why a store result was rejected. Counted for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rejection {
    SelfLoop,
    Vertical,
    DuplicatesRealEdge,
    Detached,
    Empty,
    DuplicateId,
}

#[derive(Debug, Clone, Default)]
pub struct FilterReport {
    pub kept: usize,
    pub rejected: Vec<(String, Rejection)>,
}

/// Apply the aggregation policy to raw store results for `view`.
///
/// Drops self-loops, summaries joining a node to its visible direct parent or
/// child, summaries repeating a real edge that is already shown, summaries
/// with an endpoint outside the view and zero-weight entries.
pub fn filter_aggregates(
    raw: Vec<AggregatedEdge>,
    view: &ViewState,
) -> (Vec<AggregatedEdge>, FilterReport) {
    let real: HashSet<(&str, &str, &str)> = view
        .edges()
        .iter()
        .map(|e| (e.source_id.as_str(), e.target_id.as_str(), e.label.as_str()))
        .collect();

    let mut report = FilterReport::default();
    let mut seen = HashSet::new();
    let mut kept = Vec::new();

    for agg in raw {
        let agg = agg.normalized();
        let verdict = if agg.source == agg.target {
            Some(Rejection::SelfLoop)
        } else if !view.contains(&agg.source) || !view.contains(&agg.target) {
            Some(Rejection::Detached)
        } else if view.is_vertical(&agg.source, &agg.target) {
            Some(Rejection::Vertical)
        } else if real.contains(&(agg.source.as_str(), agg.target.as_str(), agg.label.as_str())) {
            Some(Rejection::DuplicatesRealEdge)
        } else if agg.weight == 0 {
            Some(Rejection::Empty)
        } else if !seen.insert(agg.id.clone()) {
            Some(Rejection::DuplicateId)
        } else {
            None
        };

        match verdict {
            Some(reason) => report.rejected.push((agg.id, reason)),
            None => kept.push(agg),
        }
    }

    report.kept = kept.len();
    (kept, report)
}
