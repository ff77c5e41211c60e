//! Node (C3): a point in the network with an in-slope and out-slope used to
//! derive Bezier handle directions for connections attached to it, matching
//! `original_source/cts-core/include/cts-core/network/node.h`.

use crate::geom::Vec2;
use super::connection::ConnectionId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub usize);

#[derive(Debug, Clone)]
pub struct Node {
    id: NodeId,
    position: Vec2,
    in_slope: Vec2,
    out_slope: Vec2,
    incoming: Vec<ConnectionId>,
    outgoing: Vec<ConnectionId>,
}

impl Node {
    pub(crate) fn new(id: NodeId, position: Vec2, in_slope: Vec2, out_slope: Vec2) -> Self {
        Node {
            id,
            position,
            in_slope,
            out_slope,
            incoming: Vec::new(),
            outgoing: Vec::new(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn in_slope(&self) -> Vec2 {
        self.in_slope
    }

    pub fn out_slope(&self) -> Vec2 {
        self.out_slope
    }

    pub fn incoming(&self) -> &[ConnectionId] {
        &self.incoming
    }

    pub fn outgoing(&self) -> &[ConnectionId] {
        &self.outgoing
    }

    pub(crate) fn add_incoming(&mut self, c: ConnectionId) {
        self.incoming.push(c);
    }

    pub(crate) fn add_outgoing(&mut self, c: ConnectionId) {
        self.outgoing.push(c);
    }

    pub(crate) fn remove_incoming(&mut self, c: ConnectionId) {
        self.incoming.retain(|&x| x != c);
    }

    pub(crate) fn remove_outgoing(&mut self, c: ConnectionId) {
        self.outgoing.retain(|&x| x != c);
    }

    /// `true` if this node already has an outgoing connection toward `other`,
    /// mirroring `Node::connectTo` returning null on a duplicate request --
    /// callers check this before building a new `Connection`.
    pub fn has_outgoing_to(&self, other: NodeId, network: &super::Network) -> bool {
        self.outgoing
            .iter()
            .filter_map(|&cid| network.connection(cid))
            .any(|c| c.end() == other)
    }
}
