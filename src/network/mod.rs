//! Road network (C3/C4): nodes, curved connections, intersections, and the
//! owning `Network` graph.
//!
//! Cross-references between nodes, connections and intersections are the
//! cyclic-reference problem the design notes call out. The teacher resolves
//! this with `IntMut<T>`/`WeakIntMut<T>` (`Arc<Mutex<T>>` handles). This
//! crate instead follows the design notes' own suggested alternative:
//! everything lives in one arena owned by `Network` and is referenced by a
//! small `Copy` index type (`NodeId`/`ConnectionId`/`IntersectionId`), which
//! sidesteps the cyclic-ownership problem entirely rather than papering over
//! it with runtime-checked shared mutability. See DESIGN.md.

mod node;
mod connection;
mod intersection;
mod graph;

pub use node::{Node, NodeId};
pub use connection::{Connection, ConnectionId, IntersectionRef};
pub use intersection::{CrossingInfo, Intersection, IntersectionDetectionConfig, IntersectionId, Side};
pub use graph::Network;
