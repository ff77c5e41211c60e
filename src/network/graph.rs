//! Network (C3): owns every node, connection and intersection in one arena
//! and exposes cascading add/remove so that removing a node also removes its
//! incident connections, and removing a connection also removes it from
//! every `Intersection` it participated in.

use crate::curve::BezierCurve;
use crate::error::NetworkError;
use crate::geom::Vec2;

use super::connection::{Connection, ConnectionId};
use super::intersection::{self, Intersection, IntersectionDetectionConfig, IntersectionId};
use super::node::{Node, NodeId};

#[derive(Debug, Default)]
pub struct Network {
    nodes: Vec<Option<Node>>,
    connections: Vec<Option<Connection>>,
    intersections: Vec<Option<Intersection>>,
}

impl Network {
    pub fn new() -> Self {
        Network::default()
    }

    pub fn add_node(&mut self, position: Vec2, in_slope: Vec2, out_slope: Vec2) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Some(Node::new(id, position, in_slope, out_slope)));
        id
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0).and_then(|n| n.as_ref())
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0).and_then(|n| n.as_mut())
    }

    /// Removes a node and cascades into removing every connection incident
    /// to it (which in turn cascades into intersection membership).
    pub fn remove_node(&mut self, id: NodeId) -> Result<(), NetworkError> {
        let (incoming, outgoing) = {
            let node = self.node(id).ok_or(NetworkError::NodeNotFound)?;
            (node.incoming().to_vec(), node.outgoing().to_vec())
        };
        for c in incoming.into_iter().chain(outgoing) {
            let _ = self.remove_connection(c);
        }
        if let Some(slot) = self.nodes.get_mut(id.0) {
            *slot = None;
        }
        Ok(())
    }

    /// Builds a connection from `start` to `end` using the endpoints' slopes
    /// to derive Bezier handles, matching `Connection`'s constructor. Returns
    /// `DuplicateConnection` if one already exists between these nodes.
    pub fn add_connection(&mut self, start: NodeId, end: NodeId) -> Result<ConnectionId, NetworkError> {
        if self.node(start).is_none() || self.node(end).is_none() {
            return Err(NetworkError::NodeNotFound);
        }
        if self.node(start).unwrap().has_outgoing_to(end, self) {
            return Err(NetworkError::DuplicateConnection);
        }

        let (start_pos, start_slope) = {
            let n = self.node(start).unwrap();
            (n.position(), n.out_slope())
        };
        let (end_pos, end_slope) = {
            let n = self.node(end).unwrap();
            (n.position(), n.in_slope())
        };

        let curve = BezierCurve::from_endpoints(start_pos, start_slope, end_pos, end_slope);
        let id = ConnectionId(self.connections.len());
        self.connections.push(Some(Connection::new(id, start, end, curve)));

        self.node_mut(start).unwrap().add_outgoing(id);
        self.node_mut(end).unwrap().add_incoming(id);

        Ok(id)
    }

    pub fn connection(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.get(id.0).and_then(|c| c.as_ref())
    }

    pub fn connection_mut(&mut self, id: ConnectionId) -> Option<&mut Connection> {
        self.connections.get_mut(id.0).and_then(|c| c.as_mut())
    }

    /// Recomputes `connection`'s curve from its endpoints' current positions
    /// and slopes (`Connection::updateCurve`).
    pub fn update_curve(&mut self, id: ConnectionId) -> Result<(), NetworkError> {
        let (start, end) = {
            let c = self.connection(id).ok_or(NetworkError::ConnectionNotFound)?;
            (c.start(), c.end())
        };
        let (start_pos, start_slope) = {
            let n = self.node(start).ok_or(NetworkError::NodeNotFound)?;
            (n.position(), n.out_slope())
        };
        let (end_pos, end_slope) = {
            let n = self.node(end).ok_or(NetworkError::NodeNotFound)?;
            (n.position(), n.in_slope())
        };
        let curve = BezierCurve::from_endpoints(start_pos, start_slope, end_pos, end_slope);
        self.connection_mut(id).unwrap().set_curve(curve);
        Ok(())
    }

    /// Removes a connection. Since every `Intersection` is a fixed pairing of
    /// exactly two connections, a removed connection can't merely "leave" one
    /// -- every intersection it participated in is deleted outright, and the
    /// reciprocal `IntersectionRef` on the other side is cleaned up too.
    pub fn remove_connection(&mut self, id: ConnectionId) -> Result<(), NetworkError> {
        let (start, end, intersections) = {
            let c = self.connection(id).ok_or(NetworkError::ConnectionNotFound)?;
            (c.start(), c.end(), c.intersections().to_vec())
        };
        for r in intersections {
            if let Some(i) = self.intersection(r.intersection) {
                if let Some(other) = i.other_side(id) {
                    if let Some(oc) = self.connection_mut(other) {
                        oc.remove_intersection(r.intersection);
                    }
                }
            }
            if let Some(slot) = self.intersections.get_mut(r.intersection.0) {
                *slot = None;
            }
        }
        self.node_mut(start).map(|n| n.remove_outgoing(id));
        self.node_mut(end).map(|n| n.remove_incoming(id));
        if let Some(slot) = self.connections.get_mut(id.0) {
            *slot = None;
        }
        Ok(())
    }

    pub fn intersection(&self, id: IntersectionId) -> Option<&Intersection> {
        self.intersections.get(id.0).and_then(|i| i.as_ref())
    }

    pub fn intersection_mut(&mut self, id: IntersectionId) -> Option<&mut Intersection> {
        self.intersections.get_mut(id.0).and_then(|i| i.as_mut())
    }

    pub fn intersection_count(&self) -> usize {
        self.intersections.iter().flatten().count()
    }

    /// Rebuilds every intersection from scratch: every pair of connections
    /// that doesn't share an endpoint is bisected pairwise per spec.md
    /// section 4.3 (recursive bounding-box bisection tracking each curve's
    /// `[tStart, tEnd]` interval), emitting one `(tA, tB)` crossing candidate
    /// per leaf whose box has collapsed under `config.epsilon`. Candidates on
    /// the same connection pair are sorted by arc position on the `A` side
    /// and merged into one `Intersection` per run closer than
    /// `config.merge_distance` apart. Call after bulk network edits (e.g. XML
    /// import).
    pub fn detect_intersections(&mut self, config: &IntersectionDetectionConfig) {
        for slot in &mut self.intersections {
            *slot = None;
        }
        for c in self.connections.iter_mut().flatten() {
            c.clear_intersections();
        }

        let ids: Vec<ConnectionId> = self.connections.iter().flatten().map(|c| c.id()).collect();

        for (i, &a) in ids.iter().enumerate() {
            for &b in &ids[i + 1..] {
                let ca = self.connection(a).unwrap();
                let cb = self.connection(b).unwrap();
                if ca.start() == cb.start() || ca.end() == cb.end() {
                    continue;
                }
                if !ca.curve().bounds().intersects(&cb.curve().bounds()) {
                    continue;
                }

                let mut candidates = Vec::new();
                bisect_for_crossings(ca.curve(), (0.0, 1.0), cb.curve(), (0.0, 1.0), 0, config, &mut candidates);
                if candidates.is_empty() {
                    continue;
                }
                candidates.sort_by(|p, q| p.0.partial_cmp(&q.0).unwrap_or(std::cmp::Ordering::Equal));

                let avoid_blocking = ca.start() != cb.start() && ca.end() != cb.end();
                for run in merge_runs(&candidates, ca.curve(), config.merge_distance) {
                    let (t_a, t_b) = run;
                    let arc_a = ca.curve().time_to_arc_position(t_a);
                    let arc_b = cb.curve().time_to_arc_position(t_b);

                    let id = IntersectionId(self.intersections.len());
                    let mut intersection = Intersection::new(id, a, b, t_a, t_b, arc_a, arc_b, avoid_blocking);

                    let waiting_a = intersection::waiting_distance(ca.curve(), cb.curve(), arc_a, config);
                    let waiting_b = intersection::waiting_distance(cb.curve(), ca.curve(), arc_b, config);
                    intersection.set_waiting_distances(waiting_a, waiting_b);

                    self.intersections.push(Some(intersection));
                    self.connection_mut(a).unwrap().add_intersection(arc_a, id);
                    self.connection_mut(b).unwrap().add_intersection(arc_b, id);
                }
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.iter().flatten().count()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.iter().flatten().count()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().flatten()
    }

    pub fn connections(&self) -> impl Iterator<Item = &Connection> {
        self.connections.iter().flatten()
    }
}

/// Recursively bisects both curves (tracking each one's global `t` range
/// through `subdivide_at`) until both bounding boxes have collapsed under
/// `config.epsilon`, at which point the midpoint of the surviving `t` ranges
/// is recorded as one crossing candidate.
fn bisect_for_crossings(
    a: &BezierCurve,
    ta: (f64, f64),
    b: &BezierCurve,
    tb: (f64, f64),
    depth: u32,
    config: &IntersectionDetectionConfig,
    out: &mut Vec<(f64, f64)>,
) {
    const MAX_DEPTH: u32 = 24;

    let ba = a.bounds();
    let bb = b.bounds();
    if !ba.intersects(&bb) {
        return;
    }

    let a_small = (ba.max.x - ba.min.x).max(ba.max.y - ba.min.y) < config.epsilon;
    let b_small = (bb.max.x - bb.min.x).max(bb.max.y - bb.min.y) < config.epsilon;
    if depth >= MAX_DEPTH || (a_small && b_small) {
        out.push(((ta.0 + ta.1) * 0.5, (tb.0 + tb.1) * 0.5));
        return;
    }

    let t_mid_a = (ta.0 + ta.1) * 0.5;
    let t_mid_b = (tb.0 + tb.1) * 0.5;
    let (a1, a2) = a.subdivide_at(0.5);
    let (b1, b2) = b.subdivide_at(0.5);

    bisect_for_crossings(&a1, (ta.0, t_mid_a), &b1, (tb.0, t_mid_b), depth + 1, config, out);
    bisect_for_crossings(&a1, (ta.0, t_mid_a), &b2, (t_mid_b, tb.1), depth + 1, config, out);
    bisect_for_crossings(&a2, (t_mid_a, ta.1), &b1, (tb.0, t_mid_b), depth + 1, config, out);
    bisect_for_crossings(&a2, (t_mid_a, ta.1), &b2, (t_mid_b, tb.1), depth + 1, config, out);
}

/// Merges a `tA`-sorted list of `(tA, tB)` candidates into one `(tA, tB)` per
/// run of candidates whose arc position on `a` is closer than
/// `merge_distance` to its predecessor, each resolved to the run's average
/// `t`. A lone candidate is its own one-element run, for which "the midpoint
/// of the run" is simply itself.
fn merge_runs(candidates: &[(f64, f64)], a: &BezierCurve, merge_distance: f64) -> Vec<(f64, f64)> {
    let mut runs: Vec<Vec<(f64, f64)>> = Vec::new();
    let mut last_arc_position = f64::NEG_INFINITY;

    for &(t_a, t_b) in candidates {
        let arc_position = a.time_to_arc_position(t_a);
        if arc_position - last_arc_position <= merge_distance {
            if let Some(run) = runs.last_mut() {
                run.push((t_a, t_b));
                last_arc_position = arc_position;
                continue;
            }
        }
        runs.push(vec![(t_a, t_b)]);
        last_arc_position = arc_position;
    }

    runs.into_iter()
        .map(|run| {
            let n = run.len() as f64;
            let (sum_a, sum_b) = run.iter().fold((0.0, 0.0), |(sa, sb), &(ta, tb)| (sa + ta, sb + tb));
            (sum_a / n, sum_b / n)
        })
        .collect()
}
