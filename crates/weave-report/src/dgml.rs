//! [MODULE K support] DGML rendering of a `CoverageGraph`: an XML
//! `<DirectedGraph>` document with `<Nodes>`/`<Links>` sections, each
//! child carrying `Id`/`Label`/`Category` attributes (spec §6 "a
//! DGML-formatted graph"). Written and read with `quick-xml`, the same
//! crate the rest of this pack reaches for whenever it needs to touch
//! XML, rather than hand-assembling tags.

use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::reader::Reader;
use quick_xml::Writer;
use std::io::Cursor;

use weave_common::error::TestError;

use crate::coverage::CoverageGraph;

/// Links only carry `StateId`s (spec §4.K tracks transitions between
/// states, not between machine instances), so node ids are keyed purely
/// by state to keep them addressable from both `Nodes` and `Links`.
fn node_id(state: u64) -> String {
    format!("s{state}")
}

/// Render `graph` as a DGML document. Node ids are derived from the
/// machine/state pair so the same state visited under different machine
/// instances still lands on distinct nodes.
pub fn to_dgml(graph: &CoverageGraph) -> Result<String, TestError> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

    let mut root = BytesStart::new("DirectedGraph");
    root.push_attribute(("xmlns", "http://schemas.microsoft.com/vs/2009/dgml"));
    writer
        .write_event(Event::Start(root))
        .map_err(|e| TestError::internal(format!("dgml write failed: {e}")))?;

    writer
        .write_event(Event::Start(BytesStart::new("Nodes")))
        .map_err(|e| TestError::internal(format!("dgml write failed: {e}")))?;
    let mut nodes: Vec<_> = graph.nodes().collect();
    nodes.sort_by_key(|((machine, state), _)| (machine.as_u64(), state.as_u64()));
    for ((_machine, state), info) in nodes {
        let id = node_id(state.as_u64());
        let mut tag = BytesStart::new("Node");
        tag.push_attribute(("Id", id.as_str()));
        tag.push_attribute(("Label", info.label.as_str()));
        tag.push_attribute(("Visits", info.visits.to_string().as_str()));
        writer
            .write_event(Event::Empty(tag))
            .map_err(|e| TestError::internal(format!("dgml write failed: {e}")))?;
    }
    writer
        .write_event(Event::End(BytesEnd::new("Nodes")))
        .map_err(|e| TestError::internal(format!("dgml write failed: {e}")))?;

    writer
        .write_event(Event::Start(BytesStart::new("Links")))
        .map_err(|e| TestError::internal(format!("dgml write failed: {e}")))?;
    let mut links: Vec<_> = graph.links().collect();
    links.sort_by_key(|((src, dst, kind), _)| (src.as_u64(), dst.as_u64(), kind.clone()));
    for ((src, dst, kind), info) in links {
        let mut tag = BytesStart::new("Link");
        tag.push_attribute(("Source", node_id(src.as_u64()).as_str()));
        tag.push_attribute(("Target", node_id(dst.as_u64()).as_str()));
        tag.push_attribute(("Category", kind.as_str()));
        tag.push_attribute(("Traversals", info.traversals.to_string().as_str()));
        writer
            .write_event(Event::Empty(tag))
            .map_err(|e| TestError::internal(format!("dgml write failed: {e}")))?;
    }
    writer
        .write_event(Event::End(BytesEnd::new("Links")))
        .map_err(|e| TestError::internal(format!("dgml write failed: {e}")))?;

    writer
        .write_event(Event::End(BytesEnd::new("DirectedGraph")))
        .map_err(|e| TestError::internal(format!("dgml write failed: {e}")))?;

    let bytes = writer.into_inner().into_inner();
    String::from_utf8(bytes).map_err(|e| TestError::internal(format!("dgml output was not utf-8: {e}")))
}

/// A single node/link record read back out of a DGML document; callers
/// that need the full typed `CoverageGraph` reconstruct ids themselves
/// since DGML node ids are synthetic strings, not raw `StateId`s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DgmlNode {
    pub id: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DgmlLink {
    pub source: String,
    pub target: String,
    pub category: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DgmlDocument {
    pub nodes: Vec<DgmlNode>,
    pub links: Vec<DgmlLink>,
}

pub fn from_dgml(xml: &str) -> Result<DgmlDocument, TestError> {
    let mut reader = Reader::from_str(xml);

    let mut doc = DgmlDocument::default();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                b"Node" => doc.nodes.push(DgmlNode {
                    id: attr(e, "Id")?,
                    label: attr(e, "Label").unwrap_or_default(),
                }),
                b"Link" => doc.links.push(DgmlLink {
                    source: attr(e, "Source")?,
                    target: attr(e, "Target")?,
                    category: attr(e, "Category").unwrap_or_default(),
                }),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(TestError::misuse(format!("dgml parse error: {e}"))),
            _ => {}
        }
        buf.clear();
    }

    Ok(doc)
}

fn attr(tag: &BytesStart, name: &str) -> Result<String, TestError> {
    for a in tag.attributes().flatten() {
        if a.key.as_ref() == name.as_bytes() {
            return a
                .unescape_value()
                .map(|v| v.to_string())
                .map_err(|e| TestError::misuse(format!("dgml attribute decode error: {e}")));
        }
    }
    if name == "Label" || name == "Category" {
        return Ok(String::new());
    }
    Err(TestError::misuse(format!("dgml element missing required attribute '{name}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use weave_common::ids::{MachineId, StateId};

    #[test]
    fn writes_a_node_and_a_link() {
        let mut graph = CoverageGraph::new();
        let machine = MachineId::next();
        let (s1, s2) = (StateId::next(), StateId::next());
        graph.record_state(machine, s1, "Idle");
        graph.record_state(machine, s2, "Busy");
        graph.record_transition(s1, s2, "Start");

        let xml = to_dgml(&graph).unwrap();
        assert!(xml.contains("<DirectedGraph"));
        assert!(xml.contains("Label=\"Idle\""));
        assert!(xml.contains("Category=\"Start\""));
    }

    #[test]
    fn write_then_read_round_trips_nodes_and_links() {
        let mut graph = CoverageGraph::new();
        let machine = MachineId::next();
        let (s1, s2) = (StateId::next(), StateId::next());
        graph.record_state(machine, s1, "Idle");
        graph.record_state(machine, s2, "Busy");
        graph.record_transition(s1, s2, "Start");

        let xml = to_dgml(&graph).unwrap();
        let doc = from_dgml(&xml).unwrap();
        assert_eq!(doc.nodes.len(), 2);
        assert_eq!(doc.links.len(), 1);
        assert_eq!(doc.links[0].category, "Start");
    }

    #[test]
    fn from_dgml_rejects_malformed_xml() {
        assert!(from_dgml("<DirectedGraph><Nodes><Node Id=\"x\"></DirectedGraph>").is_err());
    }
}
