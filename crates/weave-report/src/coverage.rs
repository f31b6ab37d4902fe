//! [MODULE K support] Coverage graph: the node/link set reached by one or
//! more iterations, plus per-state event-processed/raised counts (spec
//! §4.K, §3 "Coverage graph").
//!
//! Kept independent of `weave_actors`' `MachineId`/`StateId`/`EventKind`
//! types deliberately -- this crate only ever receives plain ids and
//! string labels, so the actor layer can feed it coverage without this
//! crate depending back on the actor/state-machine layer.

use rustc_hash::FxHashMap;
use weave_common::ids::{MachineId, StateId};

#[derive(Debug, Clone, serde::Serialize)]
pub struct NodeInfo {
    pub label: String,
    pub visits: u64,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct LinkInfo {
    pub event_kind: String,
    pub traversals: u64,
}

/// Nodes are `(machine, state)` pairs; links are `(src, dst, event-kind)`
/// triples, each carrying a traversal count (spec §4.K).
#[derive(Debug, Clone, Default)]
pub struct CoverageGraph {
    nodes: FxHashMap<(MachineId, StateId), NodeInfo>,
    links: FxHashMap<(StateId, StateId, String), LinkInfo>,
    processed: FxHashMap<(StateId, String), u64>,
    raised: FxHashMap<(StateId, String), u64>,
}

impl CoverageGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_state(&mut self, machine: MachineId, state: StateId, label: impl Into<String>) {
        let entry = self.nodes.entry((machine, state)).or_insert_with(|| NodeInfo { label: label.into(), visits: 0 });
        entry.visits += 1;
    }

    pub fn record_transition(&mut self, src: StateId, dst: StateId, event_kind: impl Into<String>) {
        let kind = event_kind.into();
        let entry = self
            .links
            .entry((src, dst, kind.clone()))
            .or_insert_with(|| LinkInfo { event_kind: kind, traversals: 0 });
        entry.traversals += 1;
    }

    pub fn record_processed(&mut self, state: StateId, event_kind: impl Into<String>) {
        *self.processed.entry((state, event_kind.into())).or_insert(0) += 1;
    }

    pub fn record_raised(&mut self, state: StateId, event_kind: impl Into<String>) {
        *self.raised.entry((state, event_kind.into())).or_insert(0) += 1;
    }

    pub fn nodes(&self) -> impl Iterator<Item = (&(MachineId, StateId), &NodeInfo)> {
        self.nodes.iter()
    }

    pub fn links(&self) -> impl Iterator<Item = (&(StateId, StateId, String), &LinkInfo)> {
        self.links.iter()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    pub fn events_processed(&self, state: StateId, event_kind: &str) -> u64 {
        self.processed.get(&(state, event_kind.to_string())).copied().unwrap_or(0)
    }

    pub fn events_raised(&self, state: StateId, event_kind: &str) -> u64 {
        self.raised.get(&(state, event_kind.to_string())).copied().unwrap_or(0)
    }

    fn processed_records(&self) -> Vec<ProcessedRecord> {
        self.processed
            .iter()
            .map(|((state, kind), count)| ProcessedRecord { state: state.as_u64(), event_kind: kind.clone(), count: *count })
            .collect()
    }

    fn raised_records(&self) -> Vec<RaisedRecord> {
        self.raised
            .iter()
            .map(|((state, kind), count)| RaisedRecord { state: state.as_u64(), event_kind: kind.clone(), count: *count })
            .collect()
    }

    /// Fold `other`'s counts into `self`, for merging per-iteration
    /// coverage into the run-wide graph (spec §4.K "merge across
    /// iterations into one report").
    pub fn merge(&mut self, other: &CoverageGraph) {
        for (key, info) in &other.nodes {
            let entry = self.nodes.entry(*key).or_insert_with(|| NodeInfo { label: info.label.clone(), visits: 0 });
            entry.visits += info.visits;
        }
        for (key, info) in &other.links {
            let entry = self
                .links
                .entry(key.clone())
                .or_insert_with(|| LinkInfo { event_kind: info.event_kind.clone(), traversals: 0 });
            entry.traversals += info.traversals;
        }
        for (key, count) in &other.processed {
            *self.processed.entry(key.clone()).or_insert(0) += count;
        }
        for (key, count) in &other.raised {
            *self.raised.entry(key.clone()).or_insert(0) += count;
        }
    }
}

#[derive(serde::Serialize)]
struct NodeRecord {
    machine: u64,
    state: u64,
    label: String,
    visits: u64,
}

#[derive(serde::Serialize)]
struct LinkRecord {
    src: u64,
    dst: u64,
    event_kind: String,
    traversals: u64,
}

#[derive(serde::Serialize)]
struct ProcessedRecord {
    state: u64,
    event_kind: String,
    count: u64,
}

#[derive(serde::Serialize)]
struct RaisedRecord {
    state: u64,
    event_kind: String,
    count: u64,
}

/// JSON has no notion of a tuple-keyed map, so this flattens each
/// `FxHashMap` into a record list rather than deriving `Serialize`
/// directly on the maps.
impl serde::Serialize for CoverageGraph {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let nodes: Vec<NodeRecord> = self
            .nodes
            .iter()
            .map(|((machine, state), info)| NodeRecord {
                machine: machine.as_u64(),
                state: state.as_u64(),
                label: info.label.clone(),
                visits: info.visits,
            })
            .collect();
        let links: Vec<LinkRecord> = self
            .links
            .iter()
            .map(|((src, dst, kind), info)| LinkRecord {
                src: src.as_u64(),
                dst: dst.as_u64(),
                event_kind: kind.clone(),
                traversals: info.traversals,
            })
            .collect();

        let mut state = serializer.serialize_struct("CoverageGraph", 4)?;
        state.serialize_field("nodes", &nodes)?;
        state.serialize_field("links", &links)?;
        state.serialize_field("processed", &self.processed_records())?;
        state.serialize_field("raised", &self.raised_records())?;
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_the_same_state_twice_accumulates_visits() {
        let mut graph = CoverageGraph::new();
        let machine = MachineId::next();
        let state = StateId::next();
        graph.record_state(machine, state, "idle");
        graph.record_state(machine, state, "idle");
        assert_eq!(graph.nodes().next().unwrap().1.visits, 2);
    }

    #[test]
    fn merge_sums_traversal_counts_across_iterations() {
        let mut a = CoverageGraph::new();
        let mut b = CoverageGraph::new();
        let (s1, s2) = (StateId::next(), StateId::next());
        a.record_transition(s1, s2, "go");
        b.record_transition(s1, s2, "go");
        a.merge(&b);
        assert_eq!(a.link_count(), 1);
        let (_, info) = a.links().next().unwrap();
        assert_eq!(info.traversals, 2);
    }
}
