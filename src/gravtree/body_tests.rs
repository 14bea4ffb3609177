use crate::gravtree::{Bodies, BodyId};
use crate::utils::TreeError;

#[test]
fn test_spawn_assigns_increasing_ids() {
    let mut bodies = Bodies::new();
    let ids: Vec<BodyId> = (0..5)
        .map(|i| bodies.spawn(i as f64, 0.0, 1.0).expect("valid mass"))
        .collect();
    for pair in ids.windows(2) {
        assert!(pair[0] < pair[1], "ids must increase: {:?}", ids);
    }
    assert_eq!(bodies.len(), 5);
}

#[test]
fn test_ids_not_reused_after_despawn() {
    let mut bodies = Bodies::new();
    let a = bodies.spawn(0.0, 0.0, 1.0).unwrap();
    bodies.despawn(a);
    let b = bodies.spawn(0.0, 0.0, 1.0).unwrap();
    assert!(b > a);
    assert!(bodies.get(a).is_none());
    assert_eq!(bodies.len(), 1);
}

#[test]
fn test_spawn_rejects_bad_mass() {
    let mut bodies = Bodies::new();
    assert_eq!(bodies.spawn(0.0, 0.0, -1.0), Err(TreeError::InvalidMass));
    assert_eq!(bodies.spawn(0.0, 0.0, f64::NAN), Err(TreeError::InvalidMass));
    assert!(bodies.spawn(0.0, 0.0, 0.0).is_ok(), "massless bodies are allowed");
}

#[test]
fn test_new_body_is_at_rest_and_unindexed() {
    let mut bodies = Bodies::new();
    let id = bodies.spawn(1.0, 2.0, 3.0).unwrap();
    let body = bodies.body(id).unwrap();
    assert_eq!((body.x, body.y, body.m), (1.0, 2.0, 3.0));
    assert_eq!((body.vx, body.vy, body.fx, body.fy), (0.0, 0.0, 0.0, 0.0));
    assert!(body.leaf().is_none());
}

#[test]
fn test_unknown_body_error() {
    let mut bodies = Bodies::new();
    let id = bodies.spawn(0.0, 0.0, 1.0).unwrap();
    bodies.despawn(id);
    assert_eq!(bodies.body(id).err(), Some(TreeError::UnknownBody(id)));
    assert!(bodies.despawn(id).is_none());
    assert!(bodies.is_empty());
}

#[test]
fn test_iter_in_id_order() {
    let mut bodies = Bodies::new();
    let a = bodies.spawn(0.0, 0.0, 1.0).unwrap();
    let b = bodies.spawn(1.0, 0.0, 1.0).unwrap();
    let c = bodies.spawn(2.0, 0.0, 1.0).unwrap();
    bodies.despawn(b);
    assert_eq!(bodies.ids(), vec![a, c]);
}

#[test]
fn test_churn_keeps_only_live_bodies() {
    let mut bodies = Bodies::new();
    let mut last = None;
    for round in 0..1000 {
        let id = bodies.spawn(round as f64, 0.0, 1.0).unwrap();
        if let Some(previous) = last {
            assert!(id > previous);
            assert!(bodies.despawn(previous).is_some());
        }
        last = Some(id);
    }
    assert_eq!(bodies.len(), 1);
    assert_eq!(bodies.ids(), vec![BodyId(999)]);
    assert_eq!(bodies.iter().count(), 1);

    let extra = bodies.spawn(0.0, 0.0, 1.0).unwrap();
    assert_eq!(extra, BodyId(1000));
    assert_eq!(bodies.ids(), vec![BodyId(999), extra]);
}
