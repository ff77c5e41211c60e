use traffic_sim::geom::Vec2;
use traffic_sim::network::Network;

#[test]
fn x_intersection_is_detected_between_two_unrelated_connections() {
    let mut net = Network::new();
    let west = net.add_node(Vec2::new(-50.0, 0.0), Vec2::new(0.0, -1.0), Vec2::new(1.0, 0.0));
    let east = net.add_node(Vec2::new(50.0, 0.0), Vec2::new(-1.0, 0.0), Vec2::new(0.0, 1.0));
    let south = net.add_node(Vec2::new(0.0, -50.0), Vec2::new(0.0, -1.0), Vec2::new(0.0, 1.0));
    let north = net.add_node(Vec2::new(0.0, 50.0), Vec2::new(0.0, -1.0), Vec2::new(0.0, 1.0));

    net.add_connection(west, east).unwrap();
    net.add_connection(south, north).unwrap();

    net.detect_intersections(&Default::default());

    let intersecting_conn = net.connections().find(|c| c.start() == west).unwrap();
    assert!(!intersecting_conn.intersections().is_empty());
}

#[test]
fn merging_connections_sharing_an_endpoint_are_not_treated_as_conflicting() {
    let mut net = Network::new();
    let a = net.add_node(Vec2::new(-50.0, -50.0), Vec2::new(0.0, -1.0), Vec2::new(1.0, 1.0));
    let b = net.add_node(Vec2::new(-50.0, 50.0), Vec2::new(-1.0, 0.0), Vec2::new(1.0, -1.0));
    let merge = net.add_node(Vec2::new(0.0, 0.0), Vec2::new(-1.0, 0.0), Vec2::new(1.0, 0.0));

    net.add_connection(a, merge).unwrap();
    net.add_connection(b, merge).unwrap();

    net.detect_intersections(&Default::default());

    assert!(net.connections().all(|c| c.intersections().is_empty()));
}
