//! A small driver around the spatial index: owns the bodies, advances them with explicit
//! Euler steps and keeps the index in sync as they move.
//!
//! # Example
//!
//! ```
//! use gravtree::gravtree::{Rect, Simulation};
//! use gravtree::utils::{GravityConstants, TreeConfig};
//!
//! let constants = GravityConstants::new(Some(1.0), None, None);
//! let mut sim = Simulation::new(Rect::new(-10.0, -10.0, 10.0, 10.0), TreeConfig::default(), constants)
//!     .expect("Failed to create simulation");
//!
//! let a = sim.add_body(-1.0, 0.0, 1.0).expect("inside the domain");
//! let b = sim.add_body(1.0, 0.5, 1.0).expect("inside the domain");
//! sim.step(0.01).expect("step failed");
//!
//! // The two bodies attract each other.
//! assert!(sim.body(a).unwrap().vx > 0.0);
//! assert!(sim.body(b).unwrap().vx < 0.0);
//! ```
use std::ops::Range;

use log::{debug, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::gravtree::{Bodies, Body, BodyId, Rect, SpatialIndex};
use crate::utils::{GravityConstants, TreeConfig, TreeError};

pub struct Simulation {
    pub bodies: Bodies,
    pub index: SpatialIndex,
    pub constants: GravityConstants,
}

impl Simulation {
    /// Creates an empty simulation over `domain`.
    ///
    /// # Errors
    ///
    /// Returns `TreeError::InvalidConfig` if `config` is rejected.
    pub fn new(domain: Rect, config: TreeConfig, constants: GravityConstants) -> Result<Self, TreeError> {
        Ok(Simulation {
            bodies: Bodies::new(),
            index: SpatialIndex::new(domain, config)?,
            constants,
        })
    }

    /// Creates a body at rest and indexes it.
    ///
    /// # Errors
    ///
    /// `TreeError::OutsideDomain` if the position is outside the domain (the body is
    /// discarded), `TreeError::InvalidMass` for a negative or non-finite mass.
    pub fn add_body(&mut self, x: f64, y: f64, m: f64) -> Result<BodyId, TreeError> {
        let id = self.bodies.spawn(x, y, m)?;
        if self.index.insert(&mut self.bodies, id)? {
            Ok(id)
        } else {
            self.bodies.despawn(id);
            Err(TreeError::OutsideDomain(id))
        }
    }

    /// Removes a body from the index and from the simulation.
    pub fn remove_body(&mut self, id: BodyId) -> Result<Body, TreeError> {
        if self.bodies.body(id)?.leaf().is_some() {
            self.index.remove(&mut self.bodies, id)?;
        }
        self.bodies.despawn(id).ok_or(TreeError::UnknownBody(id))
    }

    pub fn body(&self, id: BodyId) -> Option<&Body> {
        self.bodies.get(id)
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    pub fn total_mass(&self) -> f64 {
        self.bodies.iter().map(|b| b.m).sum()
    }

    /// Evaluates forces and advances every body by `dt`.
    ///
    /// A body about to leave its leaf is taken out of the index before it moves and put
    /// back afterwards. A body that leaves the domain is dropped from the simulation.
    /// Returns the ids of the dropped bodies.
    pub fn step(&mut self, dt: f64) -> Result<Vec<BodyId>, TreeError> {
        self.evaluate_forces()?;

        let massless = self.constants.massless_threshold;
        let mut dropped = Vec::new();
        for id in self.bodies.ids() {
            let body = self.bodies.body_mut(id)?;
            if body.m < massless {
                body.ax = 0.0;
                body.ay = 0.0;
            } else {
                body.ax = body.fx / body.m;
                body.ay = body.fy / body.m;
            }
            body.vx += dt * body.ax;
            body.vy += dt * body.ay;
            let (x, y) = (body.x + dt * body.vx, body.y + dt * body.vy);

            let Some(leaf) = body.leaf() else {
                body.x = x;
                body.y = y;
                continue;
            };

            if self.index.node(leaf)?.rect.contains(x, y) {
                let body = self.bodies.body_mut(id)?;
                body.x = x;
                body.y = y;
                self.index.invalidate_centroid(leaf);
                continue;
            }

            self.index.remove(&mut self.bodies, id)?;
            let body = self.bodies.body_mut(id)?;
            body.x = x;
            body.y = y;
            if !self.index.insert(&mut self.bodies, id)? {
                warn!("body {} left the domain at ({}, {}), dropping it", id, x, y);
                self.bodies.despawn(id);
                dropped.push(id);
            }
        }
        Ok(dropped)
    }

    /// Runs `steps` steps of size `dt`, returning every body dropped on the way.
    pub fn simulate(&mut self, steps: usize, dt: f64) -> Result<Vec<BodyId>, TreeError> {
        let mut dropped = Vec::new();
        for _ in 0..steps {
            dropped.extend(self.step(dt)?);
        }
        debug!("simulated {} steps, {} bodies left", steps, self.bodies.len());
        Ok(dropped)
    }

    #[cfg(feature = "parallel")]
    fn evaluate_forces(&mut self) -> Result<(), TreeError> {
        self.index.evaluate_forces_parallel(&mut self.bodies, &self.constants)
    }

    #[cfg(not(feature = "parallel"))]
    fn evaluate_forces(&mut self) -> Result<(), TreeError> {
        self.index.evaluate_forces(&mut self.bodies, &self.constants)
    }

    /// Adds `count` bodies at uniformly random positions in the domain, with masses drawn
    /// from `mass_range`. The same seed always gives the same bodies.
    pub fn scatter(&mut self, count: usize, mass_range: Range<f64>, seed: u64) -> Result<Vec<BodyId>, TreeError> {
        if mass_range.start < 0.0 || mass_range.is_empty() {
            return Err(TreeError::InvalidMass);
        }
        let domain = self.index.domain();
        let mut rng = StdRng::seed_from_u64(seed);
        let mut ids = Vec::with_capacity(count);
        for _ in 0..count {
            let x = rng.random_range(domain.x0..domain.x1);
            let y = rng.random_range(domain.y0..domain.y1);
            let m = rng.random_range(mass_range.clone());
            ids.push(self.add_body(x, y, m)?);
        }
        Ok(ids)
    }
}
