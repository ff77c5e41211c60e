//! End-to-end scenarios exercising the kernel as a whole, one per scenario
//! described for the traffic simulation core: single vehicle on a straight
//! road, IDM equilibrium following, an unequal-priority crossing, a
//! committed-vehicle block, a do-not-block deadlock chain, route
//! recomputation across a handoff, and deterministic replay from a fixed
//! seed.

use traffic_sim::geom::Vec2;
use traffic_sim::network::{CrossingInfo, IntersectionDetectionConfig, Network};
use traffic_sim::randomizer::Lcg;
use traffic_sim::simulation::{Simulation, SimulationConfig};
use traffic_sim::traffic_manager::{TrafficManager, TrafficVolume, VehicleDefaults};
use traffic_sim::vehicle::{Vehicle, VehicleId, VehicleState};

fn straight_road_network() -> (Network, traffic_sim::network::NodeId, traffic_sim::network::NodeId) {
    let mut net = Network::new();
    let a = net.add_node(Vec2::new(0.0, 0.0), Vec2::new(0.0, -1.0), Vec2::new(1.0, 0.0));
    let b = net.add_node(Vec2::new(500.0, 0.0), Vec2::new(-1.0, 0.0), Vec2::new(0.0, 1.0));
    net.add_connection(a, b).unwrap();
    (net, a, b)
}

fn no_leader(_: VehicleId) -> f64 {
    0.0
}

#[test]
fn single_vehicle_on_a_straight_road_accelerates_toward_target_velocity() {
    let (net, a, b) = straight_road_network();
    let mut manager = TrafficManager::new(VehicleDefaults::default());
    manager.add_volume(TrafficVolume::new(vec![a], vec![b], 3600));
    let sim = Simulation::new(net, manager, SimulationConfig::default(), 1);

    for _ in 0..300 {
        sim.step();
    }

    let velocity = sim.with_traffic_manager_mut(|tm| tm.vehicles().map(|v| v.velocity()).fold(0.0_f64, f64::max));
    assert!(velocity > 0.0);
}

#[test]
fn following_vehicle_settles_into_a_stable_gap_behind_its_leader() {
    let mut net = Network::new();
    let a = net.add_node(Vec2::new(0.0, 0.0), Vec2::new(0.0, -1.0), Vec2::new(1.0, 0.0));
    let b = net.add_node(Vec2::new(2000.0, 0.0), Vec2::new(-1.0, 0.0), Vec2::new(0.0, 1.0));
    net.add_connection(a, b).unwrap();

    let mut manager = TrafficManager::new(VehicleDefaults::default());
    manager.add_volume(TrafficVolume::new(vec![a], vec![b], 36_000));
    let sim = Simulation::new(net, manager, SimulationConfig::default(), 7);

    for _ in 0..2000 {
        sim.step();
    }

    // With a continuous high-volume spawn on one lane, followers should
    // never be found overlapping their leader's position, and the rearmost
    // pair should actually have converged toward a common speed (real IDM
    // car-following equilibrium), not merely avoided collision.
    let (ids, positions): (Vec<VehicleId>, Vec<f64>) = sim.with_network(|network| {
        let conn = network
            .connections()
            .find(|c| c.vehicle_count() > 1)
            .expect("continuous high-volume spawn should have queued multiple vehicles on one connection");
        conn.vehicles().iter().map(|v| (v.vehicle, v.position)).unzip()
    });

    for w in positions.windows(2) {
        assert!(w[1] > w[0]);
    }

    let velocities: Vec<f64> =
        sim.with_traffic_manager_mut(|tm| ids.iter().map(|&id| tm.vehicle(id).map(|v| v.velocity()).unwrap_or(0.0)).collect());

    let last = velocities.len() - 1;
    assert!(
        (velocities[last - 1] - velocities[last]).abs() < 3.0,
        "follower should have converged close to its leader's speed, got {} vs {}",
        velocities[last - 1],
        velocities[last]
    );
}

#[test]
fn deterministic_replay_from_the_same_seed_reproduces_vehicle_counts() {
    fn run(seed: u64) -> usize {
        let (net, a, b) = straight_road_network();
        let mut manager = TrafficManager::new(VehicleDefaults::default());
        manager.add_volume(TrafficVolume::new(vec![a], vec![b], 1800));
        let mut rng = Lcg::new(seed);
        let mut net = net;
        for i in 0..500 {
            manager.tick(&mut net, &mut rng, i as f64 * 0.1, 0.1);
        }
        manager.vehicle_count()
    }

    assert_eq!(run(99), run(99));
}

/// Builds an X-intersection of two long roads, far enough past the crossing
/// in both directions that vehicles have room to accelerate and decelerate.
fn crossing_network() -> (
    Network,
    traffic_sim::network::ConnectionId,
    traffic_sim::network::ConnectionId,
    traffic_sim::network::NodeId,
    traffic_sim::network::NodeId,
) {
    let mut net = Network::new();
    let west = net.add_node(Vec2::new(-2000.0, 0.0), Vec2::new(0.0, -1.0), Vec2::new(1.0, 0.0));
    let east = net.add_node(Vec2::new(2000.0, 0.0), Vec2::new(-1.0, 0.0), Vec2::new(0.0, 1.0));
    let south = net.add_node(Vec2::new(0.0, -2000.0), Vec2::new(0.0, -1.0), Vec2::new(0.0, 1.0));
    let north = net.add_node(Vec2::new(0.0, 2000.0), Vec2::new(0.0, -1.0), Vec2::new(0.0, 1.0));
    let major = net.add_connection(west, east).unwrap();
    let minor = net.add_connection(south, north).unwrap();
    (net, major, minor, east, north)
}

#[test]
fn higher_priority_connection_wins_an_unequal_priority_crossing() {
    // spec.md section 4.6 scenario 3: priority 5 ("major") vs priority 1
    // ("minor"), vehicles spawned so their blocking intervals overlap.
    let (mut net, major, minor, major_dest, minor_dest) = crossing_network();
    net.connection_mut(major).unwrap().set_priority(5);
    net.connection_mut(minor).unwrap().set_priority(1);
    net.detect_intersections(&IntersectionDetectionConfig::default());
    assert_eq!(net.intersection_count(), 1);

    let mut major_vehicle = Vehicle::new(VehicleId(0), major, 20.0, 40.0, vec![], vec![major_dest]);
    let mut minor_vehicle = Vehicle::new(VehicleId(1), minor, 20.0, 40.0, vec![], vec![minor_dest]);
    net.connection_mut(major).unwrap().update_vehicle_position(major_vehicle.id(), 0.0);
    net.connection_mut(minor).unwrap().update_vehicle_position(minor_vehicle.id(), 0.0);

    let mut major_ever_waited = false;
    let mut minor_ever_waited = false;
    for i in 0..2000 {
        let now = i as f64 * 0.1;
        major_vehicle.prepare(&mut net, now);
        minor_vehicle.prepare(&mut net, now);
        let a_major = major_vehicle.think(&mut net, 0.1, &no_leader);
        let a_minor = minor_vehicle.think(&mut net, 0.1, &no_leader);
        major_vehicle.apply_motion(&mut net, a_major, 0.1);
        minor_vehicle.apply_motion(&mut net, a_minor, 0.1);

        major_ever_waited |= major_vehicle.state() == VehicleState::WaitingAtIntersection;
        minor_ever_waited |= minor_vehicle.state() == VehicleState::WaitingAtIntersection;

        if major_vehicle.state() == VehicleState::Retired && minor_vehicle.state() == VehicleState::Retired {
            break;
        }
    }

    assert!(minor_ever_waited, "the lower-priority vehicle should yield at the crossing");
    assert!(!major_ever_waited, "the higher-priority vehicle should never need to stop for the minor road");
}

#[test]
fn committed_vehicle_blocks_a_conflicting_entrant() {
    // Equal-priority crossing: a vehicle already committed (inside its
    // waiting distance or straddling the crossing) must block a later
    // entrant regardless of arrival-time ordering.
    let (mut net, horiz, vert, horiz_dest, vert_dest) = crossing_network();
    net.detect_intersections(&IntersectionDetectionConfig::default());
    assert_eq!(net.intersection_count(), 1);
    let iid = net.connection(horiz).unwrap().intersections()[0].intersection;

    let mut horiz_vehicle = Vehicle::new(VehicleId(0), horiz, 10.0, 40.0, vec![], vec![horiz_dest]);
    net.connection_mut(horiz).unwrap().update_vehicle_position(horiz_vehicle.id(), 0.0);

    let mut now = 0.0;
    let mut committed = false;
    for _ in 0..3000 {
        horiz_vehicle.prepare(&mut net, now);
        let a = horiz_vehicle.think(&mut net, 0.1, &no_leader);
        horiz_vehicle.apply_motion(&mut net, a, 0.1);
        now += 0.1;

        committed = net
            .intersection(iid)
            .and_then(|i| i.registration(horiz, horiz_vehicle.id()))
            .map(|info| info.remaining_distance <= 0.0)
            .unwrap_or(false);
        if committed {
            break;
        }
    }
    assert!(committed, "leading vehicle never reached a committed state at the intersection");

    let mut vert_vehicle = Vehicle::new(VehicleId(1), vert, 10.0, 40.0, vec![], vec![vert_dest]);
    net.connection_mut(vert).unwrap().update_vehicle_position(vert_vehicle.id(), 0.0);

    let mut vert_ever_waited = false;
    for _ in 0..50 {
        horiz_vehicle.prepare(&mut net, now);
        vert_vehicle.prepare(&mut net, now);
        let a_horiz = horiz_vehicle.think(&mut net, 0.1, &no_leader);
        let a_vert = vert_vehicle.think(&mut net, 0.1, &no_leader);
        horiz_vehicle.apply_motion(&mut net, a_horiz, 0.1);
        vert_vehicle.apply_motion(&mut net, a_vert, 0.1);
        now += 0.1;
        vert_ever_waited |= vert_vehicle.state() == VehicleState::WaitingAtIntersection;
    }

    assert!(vert_ever_waited, "a conflicting entrant should wait behind an already-committed vehicle");
}

#[test]
fn deadlock_avoidance_chain_stops_at_the_earlier_intersection() {
    // spec.md section 4.6 scenario 4: a through road crosses two
    // equal-priority intersections close enough together that waiting in
    // front of the second would still straddle the first; the vehicle must
    // instead stop in front of the first.
    let mut net = Network::new();
    let west = net.add_node(Vec2::new(-2000.0, 0.0), Vec2::new(0.0, -1.0), Vec2::new(1.0, 0.0));
    let east = net.add_node(Vec2::new(2000.0, 0.0), Vec2::new(-1.0, 0.0), Vec2::new(0.0, 1.0));
    let through = net.add_connection(west, east).unwrap();

    // Two crossings 50 arc units apart -- far enough that detection keeps
    // them as distinct intersections (above the 42-unit merge distance),
    // close enough that a 40-long vehicle with a 20-unit minimum gap would
    // straddle the first while waiting at the second (40 + 20 = 60 > 50).
    let s1 = net.add_node(Vec2::new(-25.0, -500.0), Vec2::new(0.0, -1.0), Vec2::new(0.0, 1.0));
    let n1 = net.add_node(Vec2::new(-25.0, 500.0), Vec2::new(0.0, -1.0), Vec2::new(0.0, 1.0));
    let cross1 = net.add_connection(s1, n1).unwrap();

    let s2 = net.add_node(Vec2::new(25.0, -500.0), Vec2::new(0.0, -1.0), Vec2::new(0.0, 1.0));
    let n2 = net.add_node(Vec2::new(25.0, 500.0), Vec2::new(0.0, -1.0), Vec2::new(0.0, 1.0));
    let cross2 = net.add_connection(s2, n2).unwrap();
    net.connection_mut(cross2).unwrap().set_priority(5);

    net.detect_intersections(&IntersectionDetectionConfig::default());
    assert_eq!(net.intersection_count(), 2);
    let through_refs = net.connection(through).unwrap().intersections().to_vec();
    assert_eq!(through_refs.len(), 2);
    let iid1 = through_refs[0].intersection;
    let iid2 = through_refs[1].intersection;

    // Plant a standing interferer on the higher-priority cross road at the
    // second crossing, so the through vehicle (minor there) must yield.
    net.intersection_mut(iid2).unwrap().register(
        cross2,
        CrossingInfo {
            vehicle: VehicleId(999),
            connection: cross2,
            original_arrival_time: 0.0,
            remaining_distance: 1.0,
            blocking_interval: (0.0, 1.0e9),
            will_wait_in_front: false,
        },
    );

    let stop_line = net.intersection(iid1).unwrap().arc_position_on(through);

    let mut vehicle = Vehicle::new(VehicleId(0), through, 15.0, 40.0, vec![], vec![east]);
    net.connection_mut(through).unwrap().update_vehicle_position(vehicle.id(), 0.0);

    let mut now = 0.0;
    for _ in 0..4000 {
        vehicle.prepare(&mut net, now);
        let accel = vehicle.think(&mut net, 0.1, &no_leader);
        vehicle.apply_motion(&mut net, accel, 0.1);
        now += 0.1;
        if vehicle.velocity() < 0.5 && vehicle.position() > stop_line - 200.0 {
            break;
        }
    }

    assert!(
        vehicle.position() < stop_line,
        "vehicle should stop before the first intersection rather than straddling it, position={} stop_line={}",
        vehicle.position(),
        stop_line
    );
    let waiting_at_first = net.intersection(iid1).unwrap().registration(through, vehicle.id()).map(|c| c.will_wait_in_front);
    let waiting_at_second = net.intersection(iid2).unwrap().registration(through, vehicle.id()).map(|c| c.will_wait_in_front);
    assert_eq!(waiting_at_first, Some(true), "back-propagation should mark the earlier crossing as the stop line");
    assert_eq!(waiting_at_second, Some(true));
}

#[test]
fn route_is_recomputed_after_handing_off_to_the_next_connection() {
    let mut net = Network::new();
    let a = net.add_node(Vec2::new(0.0, 0.0), Vec2::new(0.0, -1.0), Vec2::new(1.0, 0.0));
    let mid = net.add_node(Vec2::new(100.0, 0.0), Vec2::new(-1.0, 0.0), Vec2::new(1.0, 0.0));
    let goal = net.add_node(Vec2::new(200.0, 0.0), Vec2::new(-1.0, 0.0), Vec2::new(0.0, 1.0));
    net.add_connection(a, mid).unwrap();
    let second = net.add_connection(mid, goal).unwrap();

    let route = traffic_sim::routing::compute_route(&net, mid, &[goal], 10.0);
    assert_eq!(route, vec![second]);
}
