//! # Dot Evo - Neuroevolution of Foraging Agents
//!
//! A population of agents ("dots") moves on a 2D plane and forages for food.
//! Each agent is steered by a small feed-forward neural network whose weights
//! evolve across generations through a genetic algorithm.
//!
//! ## Features
//!
//! - Fixed-topology controllers (7 inputs, tanh hidden layer, 2 tanh outputs)
//! - Sparse mutation and two-point structured crossover
//! - Fitness-proportional selection with elitism
//! - Mutation rate that adapts to stagnation
//! - Reward shaping for approaching food, moving and avoiding edges
//! - Lineage ledger and per-generation CSV report
//! - Seedable random source for reproducible runs
//!
//! ## Core Modules
//!
//! - [`simulation::brain`] - Neural controller and genetic operators
//! - [`simulation::agent`] - Agent state, sensing and decisions
//! - [`simulation::world`] - Per-tick dynamics and generation turnover
//! - [`simulation::evolution`] - Selection, reproduction, mutation schedule
//! - [`simulation::control`] - Control surface and trigger scheduling

/// Core simulation logic and data structures.
pub mod simulation {
    /// Agents and their sensing/decision logic.
    pub mod agent;
    /// Neural network controller for agent movement.
    pub mod brain;
    /// Identity allocation and lineage ledger.
    pub mod context;
    /// Control surface and virtual clock.
    pub mod control;
    /// Error types.
    pub mod error;
    /// Diagnostic event stream.
    pub mod events;
    /// Selection, reproduction and adaptive mutation.
    pub mod evolution;
    /// Food items that agents can consume.
    pub mod food;
    /// Geometric utility functions for distance calculations.
    pub mod geometric_utils;
    /// Simulation parameters.
    pub mod params;
    /// CSV generation report.
    pub mod report;
    /// Spatial index over food positions.
    pub mod spatial;
    /// World state and per-tick update.
    pub mod world;
}

pub use simulation::control::{SharedSimulation, Simulation};
pub use simulation::error::SimError;
pub use simulation::params::Params;
