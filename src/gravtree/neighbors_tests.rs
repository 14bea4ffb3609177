use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::gravtree::{Bodies, Direction, NodeId, Quadrant, Rect, SpatialIndex};
use crate::utils::{NeighborRefinement, TreeConfig};

fn child(index: &SpatialIndex, node: NodeId, quadrant: Quadrant) -> NodeId {
    index.node(node).unwrap().child(quadrant).expect("node has children")
}

/// [0, 4) x [0, 4) with 17 bodies packed into the root's NW quadrant, so NW splits again.
fn nested_tree(refinement: NeighborRefinement) -> (Bodies, SpatialIndex) {
    let config = TreeConfig::default().with_neighbor_refinement(refinement);
    let mut bodies = Bodies::new();
    let mut index = SpatialIndex::new(Rect::new(0.0, 0.0, 4.0, 4.0), config).unwrap();
    for i in 0..17 {
        let x = 0.1 + (i % 5) as f64 * 0.4;
        let y = 0.1 + (i / 5) as f64 * 0.4;
        let id = bodies.spawn(x, y, 1.0).unwrap();
        assert!(index.insert(&mut bodies, id).unwrap());
    }
    assert_eq!(index.node_count(), 9);
    (bodies, index)
}

/// True if `a` and `b` share an edge segment of positive length on `a`'s `direction` side.
fn touches(a: &Rect, b: &Rect, direction: Direction) -> bool {
    let x_overlap = a.x0.max(b.x0) < a.x1.min(b.x1);
    let y_overlap = a.y0.max(b.y0) < a.y1.min(b.y1);
    match direction {
        Direction::North => b.y1 == a.y0 && x_overlap,
        Direction::South => b.y0 == a.y1 && x_overlap,
        Direction::West => b.x1 == a.x0 && y_overlap,
        Direction::East => b.x0 == a.x1 && y_overlap,
    }
}

#[test]
fn test_root_has_no_neighbors() {
    let index = SpatialIndex::new(Rect::new(0.0, 0.0, 1.0, 1.0), TreeConfig::default()).unwrap();
    let neighbors = index.neighbors(index.root()).unwrap();
    assert!(neighbors.all().is_empty());
    assert_eq!(index.quadrant_of(index.root()).unwrap(), None);
}

#[test]
fn test_siblings_after_one_split() {
    let config = TreeConfig::new(None, None, Some(1), None).unwrap();
    let index = SpatialIndex::new(Rect::new(0.0, 0.0, 2.0, 2.0), config).unwrap();
    let root = index.root();
    let nw = child(&index, root, Quadrant::Nw);

    let neighbors = index.neighbors(nw).unwrap();
    assert_eq!(neighbors.east, vec![child(&index, root, Quadrant::Ne)]);
    assert_eq!(neighbors.south, vec![child(&index, root, Quadrant::Sw)]);
    assert!(neighbors.north.is_empty());
    assert!(neighbors.west.is_empty());

    let se = child(&index, root, Quadrant::Se);
    let neighbors = index.neighbors(se).unwrap();
    assert_eq!(neighbors.north, vec![child(&index, root, Quadrant::Ne)]);
    assert_eq!(neighbors.west, vec![child(&index, root, Quadrant::Sw)]);
    assert_eq!(neighbors.all().len(), 2);
}

#[test]
fn test_quadrant_of_children() {
    let config = TreeConfig::new(None, None, Some(1), None).unwrap();
    let index = SpatialIndex::new(Rect::new(0.0, 0.0, 2.0, 2.0), config).unwrap();
    for q in Quadrant::ALL {
        let node = child(&index, index.root(), q);
        assert_eq!(index.quadrant_of(node).unwrap(), Some(q));
    }
}

#[test]
fn test_deep_leaf_sees_shallower_neighbors_across_the_boundary() {
    let (_, index) = nested_tree(NeighborRefinement::PathReplay);
    let root = index.root();
    let nw = child(&index, root, Quadrant::Nw);
    let nw_se = child(&index, nw, Quadrant::Se);

    let neighbors = index.neighbors(nw_se).unwrap();
    assert_eq!(neighbors.north, vec![child(&index, nw, Quadrant::Ne)]);
    assert_eq!(neighbors.west, vec![child(&index, nw, Quadrant::Sw)]);
    assert_eq!(neighbors.east, vec![child(&index, root, Quadrant::Ne)]);
    assert_eq!(neighbors.south, vec![child(&index, root, Quadrant::Sw)]);
}

#[test]
fn test_path_replay_stops_at_the_matching_depth() {
    let (_, index) = nested_tree(NeighborRefinement::PathReplay);
    let root = index.root();
    let ne = child(&index, root, Quadrant::Ne);
    let neighbors = index.neighbors(ne).unwrap();
    assert_eq!(neighbors.west, vec![child(&index, root, Quadrant::Nw)]);
}

#[test]
fn test_two_sublevels_refines_into_facing_children() {
    let (_, index) = nested_tree(NeighborRefinement::TwoSublevels);
    let root = index.root();
    let nw = child(&index, root, Quadrant::Nw);
    let ne = child(&index, root, Quadrant::Ne);
    let neighbors = index.neighbors(ne).unwrap();
    assert_eq!(
        neighbors.west,
        vec![child(&index, nw, Quadrant::Ne), child(&index, nw, Quadrant::Se)]
    );
    assert_eq!(neighbors.south, vec![child(&index, root, Quadrant::Se)]);
}

#[test]
fn test_neighbors_share_an_edge() {
    for refinement in [NeighborRefinement::PathReplay, NeighborRefinement::TwoSublevels] {
        let config = TreeConfig::new(Some(3), Some(1), None, None)
            .unwrap()
            .with_neighbor_refinement(refinement);
        let domain = Rect::new(0.0, 0.0, 64.0, 64.0);
        let mut bodies = Bodies::new();
        let mut index = SpatialIndex::new(domain, config).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..150 {
            // Cluster towards the NW corner so leaf sizes vary.
            let x = rng.random_range(0.0..64.0f64) * rng.random_range(0.1..1.0);
            let y = rng.random_range(0.0..64.0f64) * rng.random_range(0.1..1.0);
            let id = bodies.spawn(x, y, 1.0).unwrap();
            assert!(index.insert(&mut bodies, id).unwrap());
        }

        for leaf in index.leaves() {
            let rect = index.node(leaf).unwrap().rect;
            let neighbors = index.neighbors(leaf).unwrap();
            for direction in Direction::ALL {
                let found = neighbors.get(direction);
                let at_edge = match direction {
                    Direction::North => rect.y0 == domain.y0,
                    Direction::South => rect.y1 == domain.y1,
                    Direction::West => rect.x0 == domain.x0,
                    Direction::East => rect.x1 == domain.x1,
                };
                assert_eq!(found.is_empty(), at_edge, "{} {:?}", leaf, direction);
                for node in found {
                    assert_ne!(*node, leaf);
                    let other = index.node(*node).unwrap().rect;
                    assert!(
                        touches(&rect, &other, direction),
                        "{} is not a {:?} neighbor of {}",
                        node,
                        direction,
                        leaf
                    );
                }
            }
        }
    }
}
