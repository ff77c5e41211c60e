//! Legacy XML import (C3 external interface): reads the
//! `CityTrafficSimulator` save format, version 8, via `roxmltree`. This
//! format is consumed only -- the kernel never writes it back out.
//!
//! Parsing follows `a-b-street-abstreet`'s `import_streets` crate's use of
//! `roxmltree` for flat, namespace-free XML. The element names (`Layout`,
//! `LineNode`, `hashcode`, `NodeConnection`, `startNodeHash`/`endNodeHash`,
//! `TrafficVolumes`, `StartPoints`/`DestinationPoints`, `BunchOfNodes`,
//! `nodeHashes`, `TrafficVolume`, `trafficVolumeCars`) and the
//! X-component-of-`inSlope` negation quirk on import are carried over
//! verbatim from `original_source/cts-core/src/network/network.cpp`'s
//! `importLegacyXml`, which spec.md's distillation only partially names.

use std::collections::HashMap;

use roxmltree::Document;

use crate::error::ImportError;
use crate::geom::Vec2;
use crate::network::{Network, NodeId};
use crate::traffic_manager::TrafficVolume;

const SUPPORTED_SAVE_VERSION: &str = "8";

pub struct ImportResult {
    pub network: Network,
    pub traffic_volumes: Vec<TrafficVolume>,
}

/// Parses a `CityTrafficSimulator` XML document, rejecting unknown save
/// versions or documents missing the `Layout` section, per spec.md's "silent
/// reject" contract for legacy data it cannot understand.
pub fn import_xml(xml: &str) -> Result<ImportResult, ImportError> {
    let doc = Document::parse(xml)?;
    let root = doc.root_element();
    if root.tag_name().name() != "CityTrafficSimulator" {
        return Err(ImportError::MissingSection("CityTrafficSimulator"));
    }

    let save_version = root.attribute("saveVersion").unwrap_or_default();
    if save_version != SUPPORTED_SAVE_VERSION {
        return Err(ImportError::UnsupportedVersion(save_version.to_string()));
    }

    let layout = root
        .children()
        .find(|n| n.has_tag_name("Layout"))
        .ok_or(ImportError::MissingSection("Layout"))?;

    let mut network = Network::new();
    let mut node_hashes: HashMap<i64, NodeId> = HashMap::new();

    for line_node in layout.children().filter(|n| n.has_tag_name("LineNode")) {
        let Some(hashcode) = child_i64(&line_node, "hashcode") else { continue };
        let position = child_vec2(&line_node, "position").unwrap_or(Vec2::ZERO);

        // The save format and the runtime representation disagree on
        // handedness for this one field -- only the X component flips.
        let mut in_slope = child_vec2(&line_node, "inSlope").unwrap_or(Vec2::new(0.0, -1.0));
        in_slope.x = -in_slope.x;
        let out_slope = child_vec2(&line_node, "outSlope").unwrap_or(Vec2::new(0.0, 1.0));

        let id = network.add_node(position, in_slope, out_slope);
        node_hashes.insert(hashcode, id);
    }

    for node_connection in layout.children().filter(|n| n.has_tag_name("NodeConnection")) {
        let (Some(start), Some(end)) = (
            child_i64(&node_connection, "startNodeHash").and_then(|h| node_hashes.get(&h)),
            child_i64(&node_connection, "endNodeHash").and_then(|h| node_hashes.get(&h)),
        ) else {
            continue;
        };
        if let Ok(cid) = network.add_connection(*start, *end) {
            if let Some(priority) = child_i64(&node_connection, "priority") {
                network.connection_mut(cid).unwrap().set_priority(priority as i32);
            }
            if let Some(velocity) = child_f64(&node_connection, "targetVelocity") {
                network.connection_mut(cid).unwrap().set_target_velocity(velocity);
            }
        }
    }

    let mut traffic_volumes = Vec::new();
    if let Some(volumes_section) = root.children().find(|n| n.has_tag_name("TrafficVolumes")) {
        let starts = bunch_of_nodes_map(&volumes_section, "StartPoints", &node_hashes);
        let destinations = bunch_of_nodes_map(&volumes_section, "DestinationPoints", &node_hashes);

        for volume_node in volumes_section.children().filter(|n| n.has_tag_name("TrafficVolume")) {
            let start = child_i64(&volume_node, "startHash").and_then(|h| starts.get(&h)).cloned().unwrap_or_default();
            let destination = child_i64(&volume_node, "destinationHash")
                .and_then(|h| destinations.get(&h))
                .cloned()
                .unwrap_or_default();
            let cars_per_hour = child_i64(&volume_node, "trafficVolumeCars").unwrap_or(0) as u32;
            traffic_volumes.push(TrafficVolume::new(start, destination, cars_per_hour));
        }
    }

    Ok(ImportResult { network, traffic_volumes })
}

/// Resolves a `StartPoints`/`DestinationPoints` section's `BunchOfNodes`
/// children (each a hash, title, and hashed node list) into a map from that
/// bunch's own hash to the concrete `NodeId`s it names.
fn bunch_of_nodes_map(
    volumes_section: &roxmltree::Node,
    section_tag: &str,
    node_hashes: &HashMap<i64, NodeId>,
) -> HashMap<i64, Vec<NodeId>> {
    let mut out = HashMap::new();
    let Some(section) = volumes_section.children().find(|n| n.has_tag_name(section_tag)) else {
        return out;
    };
    for bunch in section.children().filter(|n| n.has_tag_name("BunchOfNodes")) {
        let Some(hash) = child_i64(&bunch, "hashcode") else { continue };
        let nodes = bunch
            .children()
            .find(|n| n.has_tag_name("nodeHashes"))
            .into_iter()
            .flat_map(|n| n.children().filter(|c| c.has_tag_name("int")))
            .filter_map(|n| n.text().and_then(|t| t.trim().parse::<i64>().ok()))
            .filter_map(|h| node_hashes.get(&h).copied())
            .collect();
        out.insert(hash, nodes);
    }
    out
}

fn child_text<'a>(node: &'a roxmltree::Node, tag: &str) -> Option<&'a str> {
    node.children().find(|n| n.has_tag_name(tag))?.text()
}

fn child_i64(node: &roxmltree::Node, tag: &str) -> Option<i64> {
    child_text(node, tag)?.trim().parse().ok()
}

fn child_f64(node: &roxmltree::Node, tag: &str) -> Option<f64> {
    child_text(node, tag)?.trim().parse().ok()
}

fn child_vec2(node: &roxmltree::Node, tag: &str) -> Option<Vec2> {
    let parent = node.children().find(|n| n.has_tag_name(tag))?;
    let x = child_f64(&parent, "X")?;
    let y = child_f64(&parent, "Y")?;
    Some(Vec2::new(x, y))
}
