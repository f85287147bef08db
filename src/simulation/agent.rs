//! Agent state, sensing and movement decisions.
//!
//! An agent ("dot") carries a position, a speed, an energy reserve that doubles
//! as its fitness, and the neural controller that steers it.

use geo::Point;
use ndarray::Array1;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::brain::NeuralController;
use super::food::random_coord;
use super::geometric_utils::edge_distance;
use super::params::Params;

/// Unique agent identifier, allocated by [`super::context::SimulationContext`].
pub type AgentId = u64;

/// A simulated organism steered by a neural controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    /// Unique identifier for this agent.
    pub id: AgentId,
    /// Position in 2D space.
    pub pos: Point<f32>,
    /// Movement multiplier applied to the controller output.
    pub speed: f32,
    /// Current energy ("food eaten"). The agent dies at or below zero.
    pub energy: f32,
    /// Highest energy reached so far.
    pub peak_energy: f32,
    /// Neural network that controls movement.
    pub brain: NeuralController,
    /// Generation in which the agent was created.
    pub birth_generation: u32,
}

impl Agent {
    /// Creates an agent with the given controller.
    pub fn new(
        id: AgentId,
        pos: Point<f32>,
        speed: f32,
        brain: NeuralController,
        birth_generation: u32,
        energy: f32,
    ) -> Self {
        Self {
            id,
            pos,
            speed,
            energy,
            peak_energy: energy,
            brain,
            birth_generation,
        }
    }

    /// Creates an agent with a random position inside the movement box, a seed
    /// speed and a random controller.
    pub fn new_random<R: Rng + ?Sized>(
        id: AgentId,
        birth_generation: u32,
        params: &Params,
        rng: &mut R,
    ) -> Self {
        let (max_x, max_y) = params.max_position();
        let pos = Point::new(random_coord(max_x, rng), random_coord(max_y, rng));
        let speed = rng.random_range(params.seed_speed_min..=params.seed_speed_max);
        let brain = NeuralController::new_random(params.hidden_size, rng);
        Self::new(
            id,
            pos,
            speed,
            brain,
            birth_generation,
            params.initial_energy,
        )
    }

    /// Checks if the agent is alive.
    pub fn is_alive(&self) -> bool {
        self.energy > 0.0
    }

    /// Sets the energy and updates the high-water mark.
    pub fn set_energy(&mut self, energy: f32) {
        self.energy = energy;
        if self.energy > self.peak_energy {
            self.peak_energy = self.energy;
        }
    }

    /// Adds energy.
    pub fn gain_energy(&mut self, amount: f32) {
        self.set_energy(self.energy + amount);
    }

    /// Removes energy.
    pub fn consume_energy(&mut self, amount: f32) {
        self.set_energy(self.energy - amount);
    }

    /// Builds the seven sensory inputs.
    ///
    /// Layout: own position (normalized), target food position (normalized, or
    /// `(0.5, 0.5)` without food), energy level, local food density, and
    /// distance to the nearest edge relative to half the shorter side. The last
    /// three are capped at 1.
    pub fn sense(&self, target: Option<Point<f32>>, nearby_food: usize, params: &Params) -> Array1<f32> {
        let (food_x, food_y) = target
            .map(|food| (food.x() / params.width, food.y() / params.height))
            .unwrap_or((0.5, 0.5));

        let energy_level = (self.energy / params.energy_norm).clamp(0.0, 1.0);
        let density = (nearby_food as f32 / params.density_norm).min(1.0);
        let half_min_dim = params.width.min(params.height) / 2.0;
        let boundary = (edge_distance(self.pos, params.width, params.height) / half_min_dim).min(1.0);

        Array1::from_vec(vec![
            self.pos.x() / params.width,
            self.pos.y() / params.height,
            food_x,
            food_y,
            energy_level,
            density,
            boundary,
        ])
    }

    /// Asks the controller for a direction and scales it by speed.
    pub fn decide(&self, inputs: &Array1<f32>) -> (f32, f32) {
        let (dx, dy) = self.brain.forward(inputs);
        (dx * self.speed, dy * self.speed)
    }
}
