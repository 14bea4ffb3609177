// demos/orbiting_cluster.rs

use gravtree::gravtree::{Rect, Simulation};
use gravtree::utils::{GravityConstants, TreeConfig, TreeError};

fn main() -> Result<(), TreeError> {
    env_logger::init();

    let constants = GravityConstants::new(Some(0.05), None, None);
    let mut sim = Simulation::new(Rect::new(-500.0, -500.0, 500.0, 500.0), TreeConfig::default(), constants)?;

    // A heavy body at the center with a cloud of light ones around it.
    let center = sim.add_body(0.0, 0.0, 5000.0)?;
    sim.scatter(2000, 0.5..2.0, 2024)?;

    println!("Initial state:");
    println!("Bodies: {}, total mass: {}", sim.len(), sim.total_mass());
    println!(
        "Nodes: {}, leaves: {}, deepest level: {}",
        sim.index.node_count(),
        sim.index.leaf_count(),
        sim.index.max_depth_reached()
    );

    let mut lost = 0;
    for round in 1..=10 {
        lost += sim.simulate(20, 0.01)?.len();
        let heavy = sim.body(center).ok_or(TreeError::UnknownBody(center))?;
        println!(
            "Round {:2}: {} bodies ({} lost), {} leaves, center at ({:.3}, {:.3})",
            round,
            sim.len(),
            lost,
            sim.index.leaf_count(),
            heavy.x,
            heavy.y
        );
    }

    sim.index.check_invariants(&sim.bodies)?;
    println!("\nTree is consistent after 200 steps");
    Ok(())
}
