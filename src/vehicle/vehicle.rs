//! Vehicle (C6): position/velocity state, the IDM car-following step, and
//! the intersection-crossing decision built from spec.md section 4.5/4.6
//! (no counterpart in `original_source`, whose `AbstractVehicle::think`/
//! `move` are unimplemented stubs).

use crate::network::{ConnectionId, CrossingInfo, IntersectionId, Network, NodeId};
use crate::routing::compute_route;
use super::driving_model::DrivingModel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VehicleId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VehicleState {
    Driving,
    WaitingAtIntersection,
    Retired,
}

/// The arc distance ahead of a vehicle's nose within which it searches for
/// leaders and upcoming intersections (spec.md section 4.5.1/4.5.2).
pub const LOOKAHEAD_DISTANCE: f64 = 768.0;

/// One entry in a vehicle's ordered, route-aligned registration list: which
/// intersection, on which of the vehicle's upcoming connections, at what arc
/// position along it, and how far ahead of the vehicle's nose that is as of
/// the last `prepare()` call.
#[derive(Debug, Clone, Copy)]
struct Registration {
    intersection: IntersectionId,
    connection: ConnectionId,
    arc_position: f64,
    distance_ahead: f64,
}

#[derive(Debug, Clone)]
pub struct Vehicle {
    id: VehicleId,
    model: DrivingModel,
    connection: ConnectionId,
    /// Arc-length position along `connection`'s curve (decimeters).
    position: f64,
    velocity: f64,
    target_velocity: f64,
    /// Bumper-to-bumper length, in the same arc units as `position`.
    length: f64,
    /// Remaining connections to traverse after the current one, nearest first.
    route: Vec<ConnectionId>,
    /// The set of nodes this vehicle would be satisfied arriving at; used
    /// to recompute `route` whenever it hands off to a new connection.
    /// Spec.md section 4.4 routes toward the nearest of these, not a single
    /// fixed node.
    destination: Vec<NodeId>,
    state: VehicleState,
    /// Upcoming intersections this vehicle has registered intent to cross,
    /// ordered by arc distance ahead of the nose -- spec.md section 4.5.2.
    registered: Vec<Registration>,
}

impl Vehicle {
    pub fn new(
        id: VehicleId,
        connection: ConnectionId,
        target_velocity: f64,
        length: f64,
        route: Vec<ConnectionId>,
        destination: Vec<NodeId>,
    ) -> Self {
        Vehicle {
            id,
            model: DrivingModel::default(),
            connection,
            position: 0.0,
            velocity: 0.0,
            target_velocity,
            length,
            route,
            destination,
            state: VehicleState::Driving,
            registered: Vec::new(),
        }
    }

    pub fn id(&self) -> VehicleId {
        self.id
    }

    pub fn connection(&self) -> ConnectionId {
        self.connection
    }

    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn velocity(&self) -> f64 {
        self.velocity
    }

    pub fn target_velocity(&self) -> f64 {
        self.target_velocity
    }

    pub fn length(&self) -> f64 {
        self.length
    }

    pub fn state(&self) -> VehicleState {
        self.state
    }

    pub fn remaining_route(&self) -> &[ConnectionId] {
        &self.route
    }

    /// Distance (in arc units) from the vehicle's nose to `(target_connection,
    /// target_position)`, walking forward through the current connection and
    /// then `route` in order. `None` if `target_connection` doesn't appear
    /// within the vehicle's current connection or route.
    fn distance_along_route(&self, network: &Network, target_connection: ConnectionId, target_position: f64) -> Option<f64> {
        if target_connection == self.connection {
            return Some(target_position - self.position);
        }
        let mut acc = network.connection(self.connection)?.length() - self.position;
        for &c in &self.route {
            if c == target_connection {
                return Some(acc + target_position);
            }
            acc += network.connection(c)?.length();
        }
        None
    }

    /// Every intersection reference within `budget` arc units ahead of the
    /// nose, walking the current connection and then `route` in order --
    /// the window `prepare()` re-aligns the registration list against.
    fn scan_window(&self, network: &Network, budget: f64) -> Vec<(ConnectionId, crate::network::IntersectionRef)> {
        let mut out = Vec::new();
        if let Some(conn) = network.connection(self.connection) {
            let hi = (self.position + budget).min(conn.length());
            for r in conn.intersections_in_range(self.position, hi) {
                out.push((self.connection, *r));
            }
        }
        let mut consumed = network.connection(self.connection).map(|c| c.length() - self.position).unwrap_or(0.0);
        for &c in &self.route {
            if consumed >= budget {
                break;
            }
            let Some(conn) = network.connection(c) else { break };
            let hi = (budget - consumed).min(conn.length());
            for r in conn.intersections_in_range(0.0, hi) {
                out.push((c, *r));
            }
            consumed += conn.length();
        }
        out
    }

    fn unregister(&self, network: &mut Network, reg: &Registration) {
        if let Some(i) = network.intersection_mut(reg.intersection) {
            if i.registration(reg.connection, self.id).is_some() {
                i.unregister(reg.connection, self.id);
            }
        }
    }

    /// Registration phase (the original's `prepare()`): re-aligns the
    /// registration list with the connections and intersections actually
    /// upcoming within `LOOKAHEAD_DISTANCE`, drops crossings now behind the
    /// vehicle's tail, marks ones currently straddling its body as actively
    /// blocked, and refreshes every live entry's `remainingDistance`/
    /// `blockingInterval`. Called once per tick before `think`/`apply_motion`.
    pub fn prepare(&mut self, network: &mut Network, now: f64) {
        let old = std::mem::take(&mut self.registered);
        let mut kept: Vec<Registration> = Vec::new();
        for mut reg in old {
            let Some(distance_ahead) = self.distance_along_route(network, reg.connection, reg.arc_position) else {
                self.unregister(network, &reg);
                continue;
            };
            let waiting = network.intersection(reg.intersection).map(|i| i.waiting_distance_for(reg.connection)).unwrap_or(0.0);
            if distance_ahead < -(self.length + waiting) {
                self.unregister(network, &reg);
                continue;
            }
            reg.distance_ahead = distance_ahead;
            kept.push(reg);
        }

        let expected = self.scan_window(network, LOOKAHEAD_DISTANCE);
        let common = kept
            .iter()
            .zip(expected.iter())
            .position(|(k, (c, r))| k.connection != *c || k.intersection != r.intersection)
            .unwrap_or(kept.len().min(expected.len()));

        for stale in kept.split_off(common) {
            self.unregister(network, &stale);
        }
        for &(conn, r) in &expected[common..] {
            let distance_ahead = self.distance_along_route(network, conn, r.arc_position).unwrap_or(0.0);
            kept.push(Registration {
                intersection: r.intersection,
                connection: conn,
                arc_position: r.arc_position,
                distance_ahead,
            });
        }

        for reg in &kept {
            let waiting = network.intersection(reg.intersection).map(|i| i.waiting_distance_for(reg.connection)).unwrap_or(0.0);
            let straddling = reg.distance_ahead <= 0.0 && reg.distance_ahead >= -self.length;
            let info = if straddling {
                let tail_past_crossing = -reg.distance_ahead;
                CrossingInfo {
                    vehicle: self.id,
                    connection: reg.connection,
                    original_arrival_time: now,
                    remaining_distance: 0.0,
                    blocking_interval: (0.0, now + self.arrival_time(tail_past_crossing)),
                    will_wait_in_front: false,
                }
            } else {
                let remaining_distance = (reg.distance_ahead - waiting).max(0.0);
                let enter = now + self.arrival_time(reg.distance_ahead - waiting);
                let exit = now + self.arrival_time(reg.distance_ahead + self.length + waiting);
                CrossingInfo {
                    vehicle: self.id,
                    connection: reg.connection,
                    original_arrival_time: now,
                    remaining_distance,
                    blocking_interval: (enter, exit),
                    will_wait_in_front: false,
                }
            };
            if let Some(i) = network.intersection_mut(reg.intersection) {
                i.register(reg.connection, info);
            }
        }

        self.registered = kept;
    }

    /// Integrates this vehicle's own free-flow acceleration forward from its
    /// current velocity in 1-second slices until the distance covered
    /// (converted from decimeter arc units to meters) reaches `distance`,
    /// returning the crossing time with a linear-interpolation correction
    /// within the final slice. `distance <= 0` returns `0`.
    fn arrival_time(&self, distance: f64) -> f64 {
        if distance <= 0.0 {
            return 0.0;
        }
        let target_meters = distance / 10.0;
        const SLICE: f64 = 1.0;
        const MAX_SLICES: u32 = 600;

        let mut v = self.velocity;
        let mut traveled = 0.0;
        for step in 0..MAX_SLICES {
            let a = self.model.acceleration_free(v, self.target_velocity.max(0.1));
            let next_v = (v + a * SLICE).max(0.0);
            let step_distance = (v + next_v) * 0.5 * SLICE;
            if traveled + step_distance >= target_meters {
                let remaining = target_meters - traveled;
                let frac = if step_distance > 0.0 { (remaining / step_distance).clamp(0.0, 1.0) } else { 0.0 };
                return step as f64 * SLICE + SLICE * frac;
            }
            traveled += step_distance;
            v = next_v;
        }
        MAX_SLICES as f64 * SLICE
    }

    /// Finds the nearest vehicle ahead within `budget` arc units of
    /// `(connection, offset)`, recursing into every outgoing connection of
    /// the end node once the current connection is exhausted (spec.md
    /// section 4.5.1's leader search, unconstrained by this vehicle's own
    /// route). Returns `(gap, leader_velocity)`.
    fn leader_ahead(
        &self,
        network: &Network,
        connection: ConnectionId,
        offset: f64,
        budget: f64,
        leader_velocity: &dyn Fn(VehicleId) -> f64,
        depth: u32,
    ) -> Option<(f64, f64)> {
        const MAX_DEPTH: u32 = 6;
        if budget <= 0.0 || depth > MAX_DEPTH {
            return None;
        }
        let conn = network.connection(connection)?;
        if let Some(ahead) = conn.find_vehicle_ahead(offset) {
            return Some((ahead.position - offset, leader_velocity(ahead.vehicle)));
        }

        let remaining_on_conn = conn.length() - offset;
        let next_budget = budget - remaining_on_conn;
        if next_budget <= 0.0 {
            return None;
        }
        let end = network.node(conn.end())?;
        let mut best: Option<(f64, f64)> = None;
        for &next in end.outgoing() {
            if let Some((gap, lv)) = self.leader_ahead(network, next, 0.0, next_budget, leader_velocity, depth + 1) {
                let total_gap = remaining_on_conn + gap;
                if best.map(|(bg, _)| total_gap < bg).unwrap_or(true) {
                    best = Some((total_gap, lv));
                }
            }
        }
        best
    }

    /// `true` if stopping at this vehicle's own comfortable follow distance
    /// would still leave its body straddling an `avoidBlocking` crossing
    /// close ahead (spec.md section 4.5.3's major-road wait condition).
    fn stop_point_straddles(&self, avoid_blocking: bool, distance_ahead: f64) -> bool {
        avoid_blocking && distance_ahead < self.model.min_distance
    }

    /// Walks the registration list backward from `stop_index`, pushing the
    /// virtual stop line to an earlier intersection whenever stopping at the
    /// current one would leave this vehicle's body still straddling it and
    /// that earlier intersection requires avoiding blocking (spec.md
    /// section 4.5.3's do-not-block back-propagation).
    fn back_propagate_stop_line(&self, network: &Network, mut stop_index: usize) -> usize {
        while stop_index > 0 {
            let candidate_index = stop_index - 1;
            let candidate = self.registered[candidate_index];
            let Some(prev_intersection) = network.intersection(candidate.intersection) else { break };
            if !prev_intersection.avoid_blocking() {
                break;
            }
            if let Some(info) = prev_intersection.registration(candidate.connection, self.id) {
                if info.remaining_distance <= 0.0 {
                    break;
                }
            }
            let stop_line = self.registered[stop_index];
            let straddle_extent = self.length + self.model.desired_gap(0.0, 0.0);
            if stop_line.distance_ahead - candidate.distance_ahead >= straddle_extent {
                break;
            }
            stop_index = candidate_index;
        }
        stop_index
    }

    fn mark_waiting_from(&self, network: &mut Network, from_index: usize) {
        for reg in &self.registered[from_index..] {
            if let Some(i) = network.intersection_mut(reg.intersection) {
                if let Some(mut info) = i.registration(reg.connection, self.id).copied() {
                    info.will_wait_in_front = true;
                    i.register(reg.connection, info);
                }
            }
        }
    }

    /// Intersection decision (spec.md section 4.5.3): walks the registration
    /// list in order and returns the distance to the nearest stop line this
    /// vehicle must wait behind, or `None` if no registered intersection
    /// currently constrains it.
    fn intersection_decision(&mut self, network: &mut Network) -> Option<f64> {
        for index in 0..self.registered.len() {
            let reg = self.registered[index];
            let Some(intersection) = network.intersection(reg.intersection) else { continue };
            let Some(my_info) = intersection.registration(reg.connection, self.id).copied() else { continue };
            if my_info.remaining_distance <= 0.0 {
                continue;
            }
            let Some(other_conn) = intersection.other_side(reg.connection) else { continue };
            let my_priority = network.connection(reg.connection).map(|c| c.priority()).unwrap_or(1);
            let other_priority = network.connection(other_conn).map(|c| c.priority()).unwrap_or(1);
            let interferers: Vec<CrossingInfo> =
                intersection.interfering_vehicles(reg.connection, my_info.blocking_interval).copied().collect();
            let avoid_blocking = intersection.avoid_blocking();

            let must_wait = match my_priority.cmp(&other_priority) {
                std::cmp::Ordering::Less => {
                    !interferers.is_empty() || self.stop_point_straddles(avoid_blocking, reg.distance_ahead)
                }
                std::cmp::Ordering::Equal => {
                    interferers.iter().any(|i| i.original_arrival_time < my_info.original_arrival_time || i.remaining_distance <= 0.0)
                }
                std::cmp::Ordering::Greater => interferers.iter().any(|i| i.remaining_distance <= 0.0),
            };

            if must_wait {
                let stop_index = self.back_propagate_stop_line(network, index);
                let stop_reg = self.registered[stop_index];
                let waiting = network.intersection(stop_reg.intersection).map(|i| i.waiting_distance_for(stop_reg.connection)).unwrap_or(0.0);
                self.mark_waiting_from(network, stop_index);
                return Some((stop_reg.distance_ahead - waiting).max(0.0));
            }
        }
        None
    }

    /// Car-following acceleration step (the original's `think()`): the final
    /// acceleration is the minimum of the leader-following term and the
    /// intersection-constrained term.
    pub fn think(&mut self, network: &mut Network, _dt: f64, leader_velocity: &dyn Fn(VehicleId) -> f64) -> f64 {
        let Some(conn) = network.connection(self.connection) else {
            return -self.model.max_deceleration;
        };
        let target = self.target_velocity.min(conn.target_velocity());

        let leader = self.leader_ahead(&*network, self.connection, self.position, LOOKAHEAD_DISTANCE, leader_velocity, 0);
        let leader_gap = leader.map(|(gap, lv)| (gap, self.velocity - lv));
        let accel_leader = self.model.acceleration(self.velocity, target, leader_gap);

        let accel_intersection = match self.intersection_decision(network) {
            Some(stop_distance) => {
                self.state = VehicleState::WaitingAtIntersection;
                self.model.acceleration(self.velocity, target, Some((stop_distance.max(0.1), self.velocity)))
            }
            None => {
                if self.state == VehicleState::WaitingAtIntersection {
                    self.state = VehicleState::Driving;
                }
                self.model.acceleration(self.velocity, target, None)
            }
        };

        accel_leader.min(accel_intersection)
    }

    /// Integrate velocity and position forward by `dt` given `acceleration`,
    /// handle handoff to the next connection in the route (recomputing the
    /// route from there to `destination`), and clear this vehicle's
    /// intersection registrations once it has actually crossed.
    pub fn apply_motion(&mut self, network: &mut Network, acceleration: f64, dt: f64) {
        self.velocity = (self.velocity + acceleration * dt).max(0.0);
        // The factor of 10 converts the velocity's m/s·s travel into the
        // decimeter arc units connections are measured in.
        let mut advance = self.velocity * dt * 10.0;

        loop {
            let length = match network.connection(self.connection) {
                Some(c) => c.length(),
                None => {
                    self.state = VehicleState::Retired;
                    return;
                }
            };
            let remaining = length - self.position;
            if advance < remaining {
                self.position += advance;
                break;
            }

            advance -= remaining;
            self.clear_all_registrations(network);
            network.connection_mut(self.connection).unwrap().remove_vehicle(self.id);

            match self.route.first().copied() {
                Some(next) => {
                    self.route.remove(0);
                    self.connection = next;
                    self.position = 0.0;
                    if let Some(start) = network.connection(next).map(|c| c.start()) {
                        self.route = compute_route(network, start, &self.destination, self.target_velocity);
                    }
                }
                None => {
                    self.state = VehicleState::Retired;
                    return;
                }
            }
        }

        network
            .connection_mut(self.connection)
            .unwrap()
            .update_vehicle_position(self.id, self.position);
    }

    fn clear_all_registrations(&mut self, network: &mut Network) {
        for reg in self.registered.drain(..) {
            if let Some(i) = network.intersection_mut(reg.intersection) {
                if i.registration(reg.connection, self.id).is_some() {
                    i.unregister(reg.connection, self.id);
                }
            }
        }
    }
}
