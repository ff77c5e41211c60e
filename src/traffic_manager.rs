//! TrafficManager (C7): owns every vehicle, spawns new ones according to
//! configured traffic volumes, and drives the per-tick
//! prepare/think/move/retire phases. Grounded in
//! `original_source/cts-core/include/cts-core/traffic/trafficmanager.h`.

use crate::network::{Network, NodeId};
use crate::randomizer::Randomizer;
use crate::routing::compute_route;
use crate::signal::Signal;
use crate::vehicle::{Vehicle, VehicleId, VehicleState};

/// Traffic density from a set of start nodes to a set of destination nodes.
/// Field names follow `TrafficVolume` (`carsPerHour`, `trucksPerHour`,
/// `busesPerHour`, `tramsPerHour`); only `cars_per_hour` drives spawning in
/// this core, the others are retained but unused (multi-class traffic is a
/// non-goal).
#[derive(Debug, Clone)]
pub struct TrafficVolume {
    pub start: Vec<NodeId>,
    pub destination: Vec<NodeId>,
    pub cars_per_hour: u32,
    pub trucks_per_hour: u32,
    pub buses_per_hour: u32,
    pub trams_per_hour: u32,
}

impl TrafficVolume {
    pub fn new(start: Vec<NodeId>, destination: Vec<NodeId>, cars_per_hour: u32) -> Self {
        TrafficVolume {
            start,
            destination,
            cars_per_hour,
            trucks_per_hour: 0,
            buses_per_hour: 0,
            trams_per_hour: 0,
        }
    }

    /// `trafficmanager.cpp:85-86`'s spawn roll: draw `nextInt(modulus)` with
    /// `modulus = ceil(3600 / (tick · carsPerHour))` and enqueue iff it comes
    /// up `0`. `None` when the volume has no cars configured -- it never
    /// spawns and the randomizer must not be consumed rolling for it.
    fn spawn_modulus(&self, dt: f64) -> Option<u64> {
        if self.cars_per_hour == 0 {
            return None;
        }
        Some((3600.0 / (dt * self.cars_per_hour as f64)).ceil().max(1.0) as u64)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct VehicleDefaults {
    pub target_velocity: f64,
    pub length: f64,
}

impl Default for VehicleDefaults {
    fn default() -> Self {
        // spec.md section 4.6's spawn scenario: IDM driving model, target
        // 42 m/s, length 40.
        VehicleDefaults { target_velocity: 42.0, length: 40.0 }
    }
}

pub struct TrafficManager {
    volumes: Vec<TrafficVolume>,
    vehicles: Vec<Option<Vehicle>>,
    /// Volumes that rolled a spawn this tick but whose start connection was
    /// occupied too close to the node to insert safely -- retained and
    /// retried on subsequent ticks rather than dropped, per spec.md's
    /// spawn-blockage handling.
    spawn_backlog: Vec<usize>,
    vehicle_defaults: VehicleDefaults,
    pub vehicle_spawned: Signal<VehicleId>,
    next_id: usize,
}

/// Spawn attempts retained in the backlog before the oldest is dropped,
/// resolving spec.md's open question about unbounded backlog growth under
/// sustained congestion.
const MAX_BACKLOG_AGE_TICKS: u32 = 200;

impl TrafficManager {
    pub fn new(vehicle_defaults: VehicleDefaults) -> Self {
        TrafficManager {
            volumes: Vec::new(),
            vehicles: Vec::new(),
            spawn_backlog: Vec::new(),
            vehicle_defaults,
            vehicle_spawned: Signal::new(),
            next_id: 0,
        }
    }

    pub fn add_volume(&mut self, volume: TrafficVolume) -> usize {
        self.volumes.push(volume);
        self.volumes.len() - 1
    }

    pub fn remove_volume(&mut self, index: usize) {
        if index < self.volumes.len() {
            self.volumes.remove(index);
        }
    }

    pub fn volumes(&self) -> &[TrafficVolume] {
        &self.volumes
    }

    pub fn vehicle(&self, id: VehicleId) -> Option<&Vehicle> {
        self.vehicles.get(id.0).and_then(|v| v.as_ref())
    }

    pub fn vehicles(&self) -> impl Iterator<Item = &Vehicle> {
        self.vehicles.iter().flatten()
    }

    pub fn vehicle_count(&self) -> usize {
        self.vehicles.iter().flatten().count()
    }

    /// Runs one simulation tick: registration, spawning, car-following
    /// decisions, motion integration, and retirement of vehicles that
    /// reached their destination.
    pub fn tick(&mut self, network: &mut Network, rng: &mut dyn Randomizer, now: f64, dt: f64) {
        self.prepare_phase(network, now);
        self.spawn_phase(network, rng, dt);
        let accelerations = self.think_phase(network, dt);
        self.move_phase(network, &accelerations, dt);
        self.retire_phase(network);
    }

    fn prepare_phase(&mut self, network: &mut Network, now: f64) {
        for vehicle in self.vehicles.iter_mut().flatten() {
            if vehicle.state() != VehicleState::Retired {
                vehicle.prepare(network, now);
            }
        }
    }

    fn think_phase(&mut self, network: &mut Network, dt: f64) -> Vec<(VehicleId, f64)> {
        let velocities: std::collections::HashMap<VehicleId, f64> = self
            .vehicles
            .iter()
            .flatten()
            .map(|v| (v.id(), v.velocity()))
            .collect();
        let leader_velocity = move |id: VehicleId| velocities.get(&id).copied().unwrap_or(0.0);

        self.vehicles
            .iter_mut()
            .flatten()
            .filter(|v| v.state() != VehicleState::Retired)
            .map(|v| (v.id(), v.think(network, dt, &leader_velocity)))
            .collect()
    }

    fn move_phase(&mut self, network: &mut Network, accelerations: &[(VehicleId, f64)], dt: f64) {
        for &(id, accel) in accelerations {
            if let Some(Some(vehicle)) = self.vehicles.get_mut(id.0) {
                vehicle.apply_motion(network, accel, dt);
            }
        }
    }

    fn retire_phase(&mut self, network: &mut Network) {
        for slot in self.vehicles.iter_mut() {
            let retire = matches!(slot, Some(v) if v.state() == VehicleState::Retired);
            if retire {
                if let Some(v) = slot.take() {
                    network.connection_mut(v.connection()).map(|c| c.remove_vehicle(v.id()));
                }
            }
        }
    }

    fn spawn_phase(&mut self, network: &mut Network, rng: &mut dyn Randomizer, dt: f64) {
        let mut retry_backlog = Vec::new();
        for &volume_index in &self.spawn_backlog {
            if !self.try_spawn_from_volume(network, volume_index, rng) {
                retry_backlog.push(volume_index);
            }
        }
        self.spawn_backlog = retry_backlog;
        if self.spawn_backlog.len() > MAX_BACKLOG_AGE_TICKS as usize {
            tracing::warn!(
                backlog_len = self.spawn_backlog.len(),
                "spawn backlog exceeds retention limit, dropping oldest entries"
            );
            let overflow = self.spawn_backlog.len() - MAX_BACKLOG_AGE_TICKS as usize;
            self.spawn_backlog.drain(0..overflow);
        }

        for index in 0..self.volumes.len() {
            let Some(modulus) = self.volumes[index].spawn_modulus(dt) else { continue };
            if rng.next_int(modulus) == 0 {
                if !self.try_spawn_from_volume(network, index, rng) {
                    self.spawn_backlog.push(index);
                }
            }
        }
    }

    fn try_spawn_from_volume(&mut self, network: &mut Network, volume_index: usize, rng: &mut dyn Randomizer) -> bool {
        let Some(volume) = self.volumes.get(volume_index) else { return true };
        if volume.start.is_empty() || volume.destination.is_empty() {
            return true;
        }

        let start_node = volume.start[rng.next_int(volume.start.len() as u64) as usize];
        let destinations = volume.destination.clone();

        let Some(node) = network.node(start_node) else { return true };
        let outgoing = node.outgoing().to_vec();
        if outgoing.is_empty() {
            return true;
        }

        // Required clearance from the node before a new vehicle can be
        // inserted safely, spec.md section 4.6: the new vehicle's own length
        // plus a fixed safety margin. `trafficmanager.cpp:102-114` bails out
        // (`canSpawn=false; break`) as soon as any outgoing connection is
        // blocked, so every one of them must be clear, not just one.
        let clearance = self.vehicle_defaults.length + 20.0;
        let all_clear = outgoing.iter().all(|&c| {
            network
                .connection(c)
                .map(|conn| {
                    conn.vehicles()
                        .iter()
                        .map(|v| v.position)
                        .fold(None, |acc: Option<f64>, p| Some(acc.map_or(p, |a: f64| a.min(p))))
                        .map(|closest| closest >= clearance)
                        .unwrap_or(true)
                })
                .unwrap_or(false)
        });
        if !all_clear {
            return false;
        }

        // Route from the start node itself -- the original constructs the
        // vehicle at the start node and lets routing choose the first hop,
        // rather than picking a connection before routing has a say.
        let route = compute_route(network, start_node, &destinations, self.vehicle_defaults.target_velocity);
        let Some(&first_connection) = route.first() else {
            // No path from this origin to any destination in the volume.
            return true;
        };
        let remaining_route = route[1..].to_vec();

        let id = VehicleId(self.next_id);
        self.next_id += 1;
        let vehicle = Vehicle::new(
            id,
            first_connection,
            self.vehicle_defaults.target_velocity,
            self.vehicle_defaults.length,
            remaining_route,
            destinations,
        );
        network
            .connection_mut(first_connection)
            .map(|c| c.update_vehicle_position(id, 0.0));

        if self.vehicles.len() <= id.0 {
            self.vehicles.resize_with(id.0 + 1, || None);
        }
        self.vehicles[id.0] = Some(vehicle);
        self.vehicle_spawned.emit(&id);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::Vec2;
    use crate::randomizer::Lcg;

    fn two_node_network() -> (Network, NodeId, NodeId) {
        let mut net = Network::new();
        let a = net.add_node(Vec2::new(0.0, 0.0), Vec2::new(0.0, -1.0), Vec2::new(1.0, 0.0));
        let b = net.add_node(Vec2::new(300.0, 0.0), Vec2::new(-1.0, 0.0), Vec2::new(0.0, 1.0));
        net.add_connection(a, b).unwrap();
        (net, a, b)
    }

    #[test]
    fn spawning_creates_a_vehicle_on_the_start_connection() {
        let (mut net, a, b) = two_node_network();
        let mut manager = TrafficManager::new(VehicleDefaults::default());
        manager.add_volume(TrafficVolume::new(vec![a], vec![b], 36_000));
        let mut rng = Lcg::new(1);

        for _ in 0..5 {
            manager.tick(&mut net, &mut rng, 0.0, 0.1);
        }

        assert!(manager.vehicle_count() > 0);
    }

    #[test]
    fn vehicles_retire_after_reaching_the_end_of_a_short_road() {
        let (mut net, a, b) = two_node_network();
        let mut manager = TrafficManager::new(VehicleDefaults::default());
        manager.add_volume(TrafficVolume::new(vec![a], vec![b], 3_600));
        let mut rng = Lcg::new(2);

        for i in 0..3000 {
            manager.tick(&mut net, &mut rng, i as f64 * 0.1, 0.1);
        }

        assert!(manager.next_id > manager.vehicle_count());
    }

    #[test]
    fn spawn_waits_until_every_outgoing_connection_is_clear() {
        // Two branches out of `a`; block one right at the node and leave the
        // other clear. A vehicle must not spawn until both are clear.
        let mut net = Network::new();
        let a = net.add_node(Vec2::new(0.0, 0.0), Vec2::new(0.0, -1.0), Vec2::new(1.0, 0.0));
        let b = net.add_node(Vec2::new(300.0, 50.0), Vec2::new(-1.0, 0.0), Vec2::new(0.0, 1.0));
        let c = net.add_node(Vec2::new(300.0, -50.0), Vec2::new(-1.0, 0.0), Vec2::new(0.0, 1.0));
        let blocked = net.add_connection(a, b).unwrap();
        net.add_connection(a, c).unwrap();

        // Park a vehicle right at the front of the `a->b` branch, well
        // within the clearance margin (length 40 + 20 = 60).
        net.connection_mut(blocked).unwrap().update_vehicle_position(VehicleId(999), 0.0);

        let mut manager = TrafficManager::new(VehicleDefaults::default());
        manager.add_volume(TrafficVolume::new(vec![a], vec![b, c], 36_000));
        let mut rng = Lcg::new(3);

        for i in 0..20 {
            manager.tick(&mut net, &mut rng, i as f64 * 0.1, 0.1);
        }

        assert_eq!(manager.vehicle_count(), 0, "a vehicle should not spawn while the blocked branch is still occupied");
    }

    #[test]
    fn spawn_follows_the_routed_first_hop_not_iteration_order() {
        // `a` branches to `via_slow` (a dead end away from the destination)
        // and `via_fast` (the only branch that actually reaches `dest`).
        // Spawning must follow the route, not whichever branch is iterated
        // first.
        let mut net = Network::new();
        let a = net.add_node(Vec2::new(0.0, 0.0), Vec2::new(0.0, -1.0), Vec2::new(1.0, 0.0));
        let via_slow = net.add_node(Vec2::new(100.0, -100.0), Vec2::new(-1.0, 0.0), Vec2::new(1.0, 0.0));
        let via_fast = net.add_node(Vec2::new(100.0, 100.0), Vec2::new(-1.0, 0.0), Vec2::new(1.0, 0.0));
        let dest = net.add_node(Vec2::new(200.0, 100.0), Vec2::new(-1.0, 0.0), Vec2::new(0.0, 1.0));
        let to_slow = net.add_connection(a, via_slow).unwrap();
        let to_fast = net.add_connection(a, via_fast).unwrap();
        net.add_connection(via_fast, dest).unwrap();

        let mut manager = TrafficManager::new(VehicleDefaults::default());
        manager.add_volume(TrafficVolume::new(vec![a], vec![dest], 36_000));
        let mut rng = Lcg::new(4);
        manager.tick(&mut net, &mut rng, 0.0, 0.1);

        assert_eq!(manager.vehicle_count(), 1);
        let vehicle = manager.vehicles().next().unwrap();
        assert_eq!(vehicle.connection(), to_fast);
        assert_ne!(vehicle.connection(), to_slow);
    }
}
