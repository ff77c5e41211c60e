use traffic_sim::geom::Vec2;
use traffic_sim::network::Network;
use traffic_sim::routing::compute_route;

#[test]
fn prefers_the_faster_of_two_parallel_routes() {
    let mut net = Network::new();
    let start = net.add_node(Vec2::new(0.0, 0.0), Vec2::new(0.0, -1.0), Vec2::new(1.0, 0.0));
    let via_slow = net.add_node(Vec2::new(50.0, -20.0), Vec2::new(-1.0, 0.0), Vec2::new(1.0, 0.0));
    let via_fast = net.add_node(Vec2::new(50.0, 20.0), Vec2::new(-1.0, 0.0), Vec2::new(1.0, 0.0));
    let goal = net.add_node(Vec2::new(100.0, 0.0), Vec2::new(-1.0, 0.0), Vec2::new(0.0, 1.0));

    let slow1 = net.add_connection(start, via_slow).unwrap();
    net.add_connection(via_slow, goal).unwrap();
    net.connection_mut(slow1).unwrap().set_target_velocity(2.0);

    let fast1 = net.add_connection(start, via_fast).unwrap();
    net.add_connection(via_fast, goal).unwrap();
    net.connection_mut(fast1).unwrap().set_target_velocity(20.0);

    let route = compute_route(&net, start, &[goal], 20.0);
    assert_eq!(route.first().copied(), Some(fast1));
}
