use approx::assert_relative_eq;

use crate::gravtree::{Quadrant, Rect, Simulation};
use crate::utils::{GravityConstants, TreeConfig, TreeError};

fn unit_sim(domain: Rect, config: TreeConfig) -> Simulation {
    Simulation::new(domain, config, GravityConstants::new(Some(1.0), None, None)).expect("valid simulation")
}

#[test]
fn test_add_body_inside_and_outside() {
    let mut sim = unit_sim(Rect::new(0.0, 0.0, 10.0, 10.0), TreeConfig::default());
    let id = sim.add_body(5.0, 5.0, 1.0).unwrap();
    assert!(sim.body(id).unwrap().leaf().is_some());

    let result = sim.add_body(10.0, 5.0, 1.0);
    assert!(matches!(result, Err(TreeError::OutsideDomain(_))));
    assert!(result.unwrap_err().is_recoverable());
    assert_eq!(sim.len(), 1);
    assert_eq!(sim.index.len(), 1);

    assert_eq!(sim.add_body(1.0, 1.0, -2.0), Err(TreeError::InvalidMass));
    assert_eq!(sim.len(), 1);
}

#[test]
fn test_pair_attracts_and_conserves_momentum() {
    let mut sim = unit_sim(Rect::new(-10.0, -10.0, 10.0, 10.0), TreeConfig::default());
    let a = sim.add_body(-1.0, 0.0, 1.0).unwrap();
    let b = sim.add_body(1.0, 0.5, 3.0).unwrap();
    sim.step(0.01).unwrap();

    let (a, b) = (sim.body(a).unwrap(), sim.body(b).unwrap());
    assert!(a.vx > 0.0 && a.vy > 0.0);
    assert!(b.vx < 0.0 && b.vy < 0.0);
    assert_relative_eq!(a.m * a.vx + b.m * b.vx, 0.0, epsilon = 1e-12);
    assert_relative_eq!(a.m * a.vy + b.m * b.vy, 0.0, epsilon = 1e-12);
    assert_relative_eq!(a.ax, a.fx / a.m);
}

#[test]
fn test_massless_body_does_not_accelerate() {
    let mut sim = unit_sim(Rect::new(0.0, 0.0, 10.0, 10.0), TreeConfig::default());
    let dust = sim.add_body(2.0, 2.0, 0.0).unwrap();
    sim.add_body(6.0, 3.0, 5.0).unwrap();
    sim.step(0.1).unwrap();
    let dust = sim.body(dust).unwrap();
    assert_eq!((dust.ax, dust.ay, dust.vx, dust.vy), (0.0, 0.0, 0.0, 0.0));
    assert_eq!((dust.x, dust.y), (2.0, 2.0));
}

#[test]
fn test_body_leaving_the_domain_is_dropped() {
    let mut sim = unit_sim(Rect::new(0.0, 0.0, 1.0, 1.0), TreeConfig::default());
    let id = sim.add_body(0.5, 0.5, 1.0).unwrap();
    sim.bodies.body_mut(id).unwrap().vx = 100.0;

    let dropped = sim.step(0.1).unwrap();
    assert_eq!(dropped, vec![id]);
    assert!(sim.body(id).is_none());
    assert!(sim.is_empty());
    assert!(sim.index.is_empty());
    sim.index.check_invariants(&sim.bodies).expect("invariants");
}

#[test]
fn test_crossing_a_leaf_boundary_reindexes() {
    let config = TreeConfig::new(None, None, Some(1), None).unwrap();
    let mut sim = unit_sim(Rect::new(0.0, 0.0, 2.0, 2.0), config);
    let id = sim.add_body(0.9, 0.5, 1.0).unwrap();
    let root = sim.index.root();
    let nw = sim.index.node(root).unwrap().child(Quadrant::Nw).unwrap();
    let ne = sim.index.node(root).unwrap().child(Quadrant::Ne).unwrap();
    assert_eq!(sim.body(id).unwrap().leaf(), Some(nw));

    sim.bodies.body_mut(id).unwrap().vx = 1.0;
    assert!(sim.step(0.2).unwrap().is_empty());

    let body = sim.body(id).unwrap();
    assert_relative_eq!(body.x, 1.1, epsilon = 1e-12);
    assert_eq!(body.leaf(), Some(ne));
    assert!(sim.index.node(nw).unwrap().bodies().is_empty());
    sim.index.check_invariants(&sim.bodies).expect("invariants");
}

#[test]
fn test_scatter_is_deterministic() {
    let domain = Rect::new(0.0, 0.0, 100.0, 100.0);
    let mut first = unit_sim(domain, TreeConfig::default());
    let mut second = unit_sim(domain, TreeConfig::default());
    first.scatter(50, 1.0..2.0, 42).unwrap();
    second.scatter(50, 1.0..2.0, 42).unwrap();

    let positions = |sim: &Simulation| -> Vec<(f64, f64, f64)> { sim.bodies.iter().map(|b| (b.x, b.y, b.m)).collect() };
    assert_eq!(positions(&first), positions(&second));

    let mut other = unit_sim(domain, TreeConfig::default());
    other.scatter(50, 1.0..2.0, 43).unwrap();
    assert_ne!(positions(&first), positions(&other));
}

#[test]
fn test_scatter_rejects_bad_mass_range() {
    let mut sim = unit_sim(Rect::new(0.0, 0.0, 1.0, 1.0), TreeConfig::default());
    assert_eq!(sim.scatter(3, -1.0..1.0, 0), Err(TreeError::InvalidMass));
    assert_eq!(sim.scatter(3, 2.0..2.0, 0), Err(TreeError::InvalidMass));
    assert!(sim.is_empty());
}

#[test]
fn test_many_steps_keep_the_tree_consistent() {
    let config = TreeConfig::new(Some(6), Some(3), None, None).unwrap();
    let mut sim = unit_sim(Rect::new(0.0, 0.0, 100.0, 100.0), config);
    sim.scatter(300, 0.5..1.5, 9).unwrap();

    let mut dropped = 0;
    for _ in 0..25 {
        dropped += sim.step(0.05).unwrap().len();
        sim.index.check_invariants(&sim.bodies).expect("invariants");
    }
    assert_eq!(sim.len() + dropped, 300);
    assert_eq!(sim.index.len(), sim.len());
}

#[test]
fn test_simulate_runs_are_reproducible() {
    let domain = Rect::new(-20.0, -20.0, 20.0, 20.0);
    let run = || {
        let mut sim = unit_sim(domain, TreeConfig::default());
        sim.scatter(80, 1.0..3.0, 5).unwrap();
        sim.simulate(10, 0.02).unwrap();
        sim.bodies.iter().map(|b| (b.id, b.x, b.y)).collect::<Vec<_>>()
    };
    assert_eq!(run(), run());
}

#[test]
fn test_remove_body() {
    let mut sim = unit_sim(Rect::new(0.0, 0.0, 4.0, 4.0), TreeConfig::default());
    let a = sim.add_body(1.0, 1.0, 2.0).unwrap();
    sim.add_body(3.0, 3.0, 4.0).unwrap();
    assert_relative_eq!(sim.total_mass(), 6.0);

    let removed = sim.remove_body(a).unwrap();
    assert_eq!(removed.id, a);
    assert_eq!(sim.len(), 1);
    assert_eq!(sim.index.len(), 1);
    assert_relative_eq!(sim.total_mass(), 4.0);
    assert_eq!(sim.remove_body(a).unwrap_err(), TreeError::UnknownBody(a));
}
