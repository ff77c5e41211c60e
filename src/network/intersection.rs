//! Intersection (C4): a single logical crossing of exactly two connections,
//! identified by `(A, tA, B, tB)` per spec.md section 3. A connection that
//! crosses several other roads along its length holds one `Intersection` per
//! crossing, not one intersection shared by every road it ever meets --
//! `Connection::intersections()` is itself the position-sorted list spec.md
//! requires.
//!
//! The waiting-distance computation and `avoidBlocking` criterion are
//! grounded in `original_source/cts-core/src/network/intersection.cpp`. The
//! `CrossingInfo` bookkeeping (arrival time, remaining distance, blocking
//! interval, do-not-block back-propagation) has no counterpart in
//! `original_source` -- that file is an incomplete stub there -- so this is
//! built directly from the specification's prose.

use std::collections::HashMap;

use crate::vehicle::VehicleId;
use super::connection::ConnectionId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IntersectionId(pub usize);

/// Thresholds for intersection detection and waiting-distance computation.
/// Spec.md leaves these as hard-coded constants in the original; resolving
/// the open question by making them configurable fields instead.
#[derive(Debug, Clone, Copy)]
pub struct IntersectionDetectionConfig {
    /// Geometric threshold (curve units) below which a subdivided bounding
    /// box is treated as a single crossing point.
    pub epsilon: f64,
    /// Arc-distance threshold below which two crossing candidates on the
    /// same connection are merged into one intersection at their midpoint.
    pub merge_distance: f64,
    /// Step size (in curve arc-length units) used while walking outward from
    /// the crossing point to find the waiting distance.
    pub waiting_step: f64,
    /// Perpendicular clearance, in the same units, below which two curves at
    /// a given arc-length offset are considered to still be "too close".
    pub waiting_clearance: f64,
}

impl Default for IntersectionDetectionConfig {
    fn default() -> Self {
        IntersectionDetectionConfig {
            epsilon: 1.0,
            merge_distance: 42.0,
            waiting_step: 8.0,
            waiting_clearance: 22.0,
        }
    }
}

/// Which of the two connections a reference names -- `A` or `B` in the
/// `(A, tA, B, tB)` identification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    A,
    B,
}

/// Per-connection bookkeeping for one vehicle registered at an intersection
/// via `prepare()`.
#[derive(Debug, Clone, Copy)]
pub struct CrossingInfo {
    pub vehicle: VehicleId,
    pub connection: ConnectionId,
    /// Simulation time at which this vehicle first registered its arrival.
    pub original_arrival_time: f64,
    /// Distance (arc-length) remaining until the vehicle reaches the
    /// waiting point in front of the intersection.
    pub remaining_distance: f64,
    /// `(enter_time, exit_time)` this vehicle expects to occupy the
    /// intersection, used for priority arbitration against other registrants.
    pub blocking_interval: (f64, f64),
    /// `true` if this vehicle has decided to stop and wait in front of the
    /// intersection rather than attempt to cross.
    pub will_wait_in_front: bool,
}

/// A single logical crossing of connections `a` and `b` at curve times `t_a`
/// and `t_b` respectively.
#[derive(Debug, Clone)]
pub struct Intersection {
    id: IntersectionId,
    a: ConnectionId,
    b: ConnectionId,
    t_a: f64,
    t_b: f64,
    arc_position_a: f64,
    arc_position_b: f64,
    waiting_distance_a: f64,
    waiting_distance_b: f64,
    /// `true` iff `a` and `b` neither share a start node nor an end node --
    /// computed once at construction since the endpoints never change for a
    /// fixed pair of connections.
    avoid_blocking: bool,
    crossings_a: HashMap<VehicleId, CrossingInfo>,
    crossings_b: HashMap<VehicleId, CrossingInfo>,
}

impl Intersection {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        id: IntersectionId,
        a: ConnectionId,
        b: ConnectionId,
        t_a: f64,
        t_b: f64,
        arc_position_a: f64,
        arc_position_b: f64,
        avoid_blocking: bool,
    ) -> Self {
        Intersection {
            id,
            a,
            b,
            t_a,
            t_b,
            arc_position_a,
            arc_position_b,
            waiting_distance_a: 0.0,
            waiting_distance_b: 0.0,
            avoid_blocking,
            crossings_a: HashMap::new(),
            crossings_b: HashMap::new(),
        }
    }

    pub fn id(&self) -> IntersectionId {
        self.id
    }

    pub fn connections(&self) -> (ConnectionId, ConnectionId) {
        (self.a, self.b)
    }

    /// The other connection participating in this crossing, or `None` if
    /// `connection` is neither side (a programmer precondition violation).
    pub fn other_side(&self, connection: ConnectionId) -> Option<ConnectionId> {
        if connection == self.a {
            Some(self.b)
        } else if connection == self.b {
            Some(self.a)
        } else {
            None
        }
    }

    fn side_of(&self, connection: ConnectionId) -> Option<Side> {
        if connection == self.a {
            Some(Side::A)
        } else if connection == self.b {
            Some(Side::B)
        } else {
            None
        }
    }

    pub fn curve_time_on(&self, connection: ConnectionId) -> f64 {
        match self.side_of(connection) {
            Some(Side::A) => self.t_a,
            Some(Side::B) => self.t_b,
            None => {
                debug_assert!(false, "connection passed to intersection is neither side");
                0.0
            }
        }
    }

    pub fn arc_position_on(&self, connection: ConnectionId) -> f64 {
        match self.side_of(connection) {
            Some(Side::A) => self.arc_position_a,
            Some(Side::B) => self.arc_position_b,
            None => {
                debug_assert!(false, "connection passed to intersection is neither side");
                f64::NAN
            }
        }
    }

    pub fn waiting_distance_for(&self, connection: ConnectionId) -> f64 {
        match self.side_of(connection) {
            Some(Side::A) => self.waiting_distance_a,
            Some(Side::B) => self.waiting_distance_b,
            None => 0.0,
        }
    }

    pub(crate) fn set_waiting_distances(&mut self, a: f64, b: f64) {
        self.waiting_distance_a = a;
        self.waiting_distance_b = b;
    }

    /// Two connections should avoid blocking one another only when they
    /// genuinely cross paths at different endpoints -- sharing a start or
    /// end node means they merely merge/diverge, not conflict.
    pub fn avoid_blocking(&self) -> bool {
        self.avoid_blocking
    }

    /// Register (or refresh) `vehicle`'s intent to cross, as part of the
    /// prepare() phase. `connection` picks which side's map it lives in.
    pub fn register(&mut self, connection: ConnectionId, info: CrossingInfo) {
        match self.side_of(connection) {
            Some(Side::A) => {
                self.crossings_a.insert(info.vehicle, info);
            }
            Some(Side::B) => {
                self.crossings_b.insert(info.vehicle, info);
            }
            None => debug_assert!(false, "connection passed to intersection is neither side"),
        }
    }

    pub fn unregister(&mut self, connection: ConnectionId, vehicle: VehicleId) {
        let existed = match self.side_of(connection) {
            Some(Side::A) => self.crossings_a.remove(&vehicle).is_some(),
            Some(Side::B) => self.crossings_b.remove(&vehicle).is_some(),
            None => false,
        };
        debug_assert!(existed, "unregistering a vehicle not registered at this intersection");
    }

    pub fn registration(&self, connection: ConnectionId, vehicle: VehicleId) -> Option<&CrossingInfo> {
        match self.side_of(connection) {
            Some(Side::A) => self.crossings_a.get(&vehicle),
            Some(Side::B) => self.crossings_b.get(&vehicle),
            None => None,
        }
    }

    fn side_map(&self, side: Side) -> &HashMap<VehicleId, CrossingInfo> {
        match side {
            Side::A => &self.crossings_a,
            Side::B => &self.crossings_b,
        }
    }

    /// `I.computeInterferingVehicles(me, c)`: every registration on the side
    /// opposite `connection` whose blocking interval overlaps `interval` and
    /// that is not already committed to waiting in front.
    pub fn interfering_vehicles(
        &self,
        connection: ConnectionId,
        interval: (f64, f64),
    ) -> impl Iterator<Item = &CrossingInfo> {
        let opposite = match self.side_of(connection) {
            Some(Side::A) => Side::B,
            Some(Side::B) => Side::A,
            None => Side::A,
        };
        self.side_map(opposite)
            .values()
            .filter(move |info| !info.will_wait_in_front && intervals_overlap(interval, info.blocking_interval))
    }

    /// `true` if some registration on the opposite side of `connection` is
    /// already committed to crossing (`remaining_distance <= 0`, i.e. it is
    /// physically inside or past the waiting point) and its occupancy
    /// extends past `now`.
    pub fn has_committed_opposing_vehicle(&self, connection: ConnectionId, now: f64) -> bool {
        let opposite = match self.side_of(connection) {
            Some(Side::A) => Side::B,
            Some(Side::B) => Side::A,
            None => return false,
        };
        self.side_map(opposite)
            .values()
            .any(|info| info.remaining_distance <= 0.0 && info.blocking_interval.1 > now)
    }
}

fn intervals_overlap(a: (f64, f64), b: (f64, f64)) -> bool {
    a.0 < b.1 && b.0 < a.1
}

/// Walk outward in both directions from `crossing_point` along `curve`,
/// finding the furthest offset at which `curve` and `other` are still closer
/// than `config.waiting_clearance`, then return the max of the front/rear
/// walks. Matches the original's `Intersection::getWaitingDistance`.
pub(crate) fn waiting_distance(
    curve: &crate::curve::BezierCurve,
    other: &crate::curve::BezierCurve,
    crossing_point: f64,
    config: &IntersectionDetectionConfig,
) -> f64 {
    let walk = |direction: f64| -> f64 {
        let mut offset = 0.0;
        loop {
            let next_offset = offset + config.waiting_step;
            let position = crossing_point + direction * next_offset;
            if position < 0.0 || position > curve.length() {
                return offset;
            }
            let t = curve.arc_position_to_time(position);
            let point = curve.position_at_time(t);

            let closest = closest_distance_to_curve(point, other);
            if closest > config.waiting_clearance {
                return next_offset;
            }
            offset = next_offset;
        }
    };

    let front = walk(1.0);
    let rear = walk(-1.0);
    front.max(rear)
}

fn closest_distance_to_curve(point: crate::geom::Vec2, curve: &crate::curve::BezierCurve) -> f64 {
    const SAMPLES: usize = 16;
    let mut min = f64::INFINITY;
    for i in 0..=SAMPLES {
        let t = i as f64 / SAMPLES as f64;
        let p = curve.position_at_time(t);
        min = min.min(point.distance(p));
    }
    min
}
