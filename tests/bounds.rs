use traffic_sim::geom::{Bounds2, Vec2};

#[test]
fn union_covers_both_inputs() {
    let a = Bounds2::new(Vec2::new(0.0, 0.0), Vec2::new(10.0, 10.0));
    let b = Bounds2::new(Vec2::new(5.0, 5.0), Vec2::new(20.0, 20.0));
    let u = a.union(&b);
    assert!(u.contains(Vec2::new(0.0, 0.0)));
    assert!(u.contains(Vec2::new(20.0, 20.0)));
}

#[test]
fn disjoint_boxes_do_not_intersect() {
    let a = Bounds2::new(Vec2::new(0.0, 0.0), Vec2::new(5.0, 5.0));
    let b = Bounds2::new(Vec2::new(10.0, 10.0), Vec2::new(15.0, 15.0));
    assert!(!a.intersects(&b));
}

#[test]
fn touching_boxes_count_as_intersecting() {
    let a = Bounds2::new(Vec2::new(0.0, 0.0), Vec2::new(5.0, 5.0));
    let b = Bounds2::new(Vec2::new(5.0, 0.0), Vec2::new(10.0, 5.0));
    assert!(a.intersects(&b));
}

#[test]
fn default_bounds_is_empty_and_never_intersects() {
    let empty = Bounds2::default();
    let populated = Bounds2::new(Vec2::new(0.0, 0.0), Vec2::new(5.0, 5.0));
    assert!(!empty.contains(Vec2::new(0.0, 0.0)));
    assert!(!empty.intersects(&empty));
    assert!(!empty.intersects(&populated));
    assert!(!populated.intersects(&empty));
}

#[test]
fn from_points_builds_the_same_box_as_repeated_add_point() {
    let pts = [Vec2::new(1.0, -2.0), Vec2::new(-3.0, 4.0), Vec2::new(0.0, 0.0)];
    let bulk = Bounds2::from_points(&pts);
    let mut incremental = Bounds2::empty();
    for &p in &pts {
        incremental.extend(p);
    }
    assert_eq!(bulk, incremental);
}
