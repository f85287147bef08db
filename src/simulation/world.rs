//! The world: agents, food and the per-tick dynamics.
//!
//! Each tick every living agent senses, decides, moves, possibly eats its
//! target food, and receives reward shaping. Agents without energy are removed
//! at the end of the tick. After `steps_per_generation` ticks the terminal
//! population is handed to the [`EvolutionEngine`] and a new generation starts.

use geo::Point;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use super::agent::{Agent, AgentId};
use super::context::SimulationContext;
use super::error::{Result, SimError};
use super::events::{EventLog, SimulationEvent};
use super::evolution::EvolutionEngine;
use super::food::Food;
use super::geometric_utils::{clamp_to_box, distance, edge_distance};
use super::params::Params;
use super::report::{ReportRow, generation_rows};
use super::spatial::FoodField;

/// Read-only view of one agent for rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentView {
    /// Agent id.
    pub id: AgentId,
    /// Horizontal position.
    pub x: f32,
    /// Vertical position.
    pub y: f32,
    /// Current energy.
    pub energy: f32,
    /// Whether the agent is still alive.
    pub alive: bool,
}

/// Read-only snapshot of the world for a rendering collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Current generation.
    pub generation: u32,
    /// Tick within the generation.
    pub tick: u32,
    /// Live agents.
    pub agents: Vec<AgentView>,
    /// Food positions.
    pub food: Vec<(f32, f32)>,
}

/// Summary of a generation turnover.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationSummary {
    /// Index of the generation that just started.
    pub generation: u32,
    /// Highest energy in the finished generation (0 if it was extinct).
    pub best_fitness: f32,
    /// Size of the new population.
    pub population: usize,
    /// Mutation rate used to breed the new population.
    pub mutation_rate: f32,
    /// Whether the new population had to be randomly reseeded.
    pub reseeded: bool,
    /// Report rows for every agent ever created.
    pub rows: Vec<ReportRow>,
}

/// Result of advancing the world by one tick.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// The generation continues.
    Advanced,
    /// The tick completed a generation.
    GenerationEnded(GenerationSummary),
}

/// The simulated world and all per-run state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct World {
    /// Simulation parameters.
    pub params: Params,
    /// Living agents, in update order.
    pub agents: Vec<Agent>,
    /// Food on the board.
    pub food: FoodField,
    /// Generation bookkeeping and reproduction.
    pub engine: EvolutionEngine,
    /// Id allocator and lineage ledger.
    pub context: SimulationContext,
    /// Recent diagnostic events.
    pub events: EventLog,
    /// Best fitness of the most recently finished generation.
    pub best_fitness: f32,
}

impl World {
    /// Creates an empty world after validating `params`.
    pub fn new(params: Params) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            agents: Vec::new(),
            food: FoodField::new(),
            engine: EvolutionEngine::new(&params),
            context: SimulationContext::new(),
            events: EventLog::new(params.event_log_size),
            best_fitness: 0.0,
            params,
        })
    }

    /// Current generation.
    pub fn generation(&self) -> u32 {
        self.engine.generation()
    }

    /// Ticks elapsed in the current generation.
    pub fn tick_count(&self) -> u32 {
        self.engine.state.tick
    }

    /// Resets the run and seeds `population_size` random agents plus the
    /// central food cluster.
    ///
    /// The output biases of the seeded controllers are shifted by
    /// `initial_output_bias` so that the first generation starts moving.
    pub fn start<R: Rng + ?Sized>(&mut self, population_size: usize, rng: &mut R) -> Result<()> {
        if population_size == 0 {
            return Err(SimError::InvalidParams(
                "population_size must be positive".into(),
            ));
        }
        self.params.population_size = population_size;
        self.engine = EvolutionEngine::new(&self.params);
        self.context = SimulationContext::new();
        self.events.clear();
        self.best_fitness = 0.0;

        let mut agents = self.random_population(population_size, rng);
        for agent in &mut agents {
            agent.brain.shift_output_bias(self.params.initial_output_bias);
        }
        self.agents = agents;

        self.food.clear();
        self.seed_cluster(rng);

        info!(
            population = self.agents.len(),
            food = self.food.len(),
            "started simulation"
        );
        Ok(())
    }

    /// Creates `count` random agents born in the current generation and
    /// records them in the lineage ledger.
    pub fn random_population<R: Rng + ?Sized>(&mut self, count: usize, rng: &mut R) -> Vec<Agent> {
        let generation = self.generation();
        (0..count)
            .map(|_| {
                let agent =
                    Agent::new_random(self.context.allocate_id(), generation, &self.params, rng);
                self.context.register(&agent);
                agent
            })
            .collect()
    }

    /// Places `cluster_food` items around the world centre.
    pub fn seed_cluster<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let center = self.params.center();
        let spread = self.params.cluster_spread;
        self.food.extend(
            (0..self.params.cluster_food).map(|_| Food::new_near(center, spread, rng)),
        );
    }

    /// Scatters `count` food items over the whole world.
    pub fn add_food<R: Rng + ?Sized>(&mut self, count: usize, rng: &mut R) {
        let (width, height) = (self.params.width, self.params.height);
        self.food
            .extend((0..count).map(|_| Food::new_random(width, height, rng)));
        self.log(SimulationEvent::FoodAdded { count });
    }

    /// Food timer event: scatters a random amount of food.
    pub fn add_periodic_food<R: Rng + ?Sized>(&mut self, rng: &mut R) -> usize {
        let count =
            rng.random_range(self.params.periodic_food_min..=self.params.periodic_food_max);
        self.add_food(count, rng);
        count
    }

    /// Depletion timer event: every living agent loses `depletion_amount`.
    ///
    /// Agents that reach zero are removed at the end of the next tick.
    pub fn deplete(&mut self) -> usize {
        let amount = self.params.depletion_amount;
        let mut drained = 0;
        for agent in self.agents.iter_mut().filter(|agent| agent.is_alive()) {
            agent.consume_energy(amount);
            drained += 1;
        }
        self.log(SimulationEvent::FoodDepleted { agents: drained });
        drained
    }

    /// Advances the world by one tick.
    ///
    /// Every living agent senses, moves towards its controller's choice and
    /// is rewarded against the food that was nearest before the move. Agents
    /// left without energy are dropped at the end, and the last tick of a
    /// generation hands over to [`Self::end_generation`].
    ///
    /// # Arguments
    ///
    /// * `rng` - Random source used if the generation ends on this tick
    ///
    /// # Returns
    ///
    /// [`TickOutcome::GenerationEnded`] with the turnover summary on the last
    /// tick of a generation, [`TickOutcome::Advanced`] otherwise.
    pub fn tick<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<TickOutcome> {
        self.engine.state.tick += 1;
        let generation = self.engine.state.generation;
        let tick = self.engine.state.tick;

        let params = &self.params;
        let rewards = &params.rewards;
        let (max_x, max_y) = params.max_position();

        for agent in &mut self.agents {
            if !agent.is_alive() {
                continue;
            }

            let target = self.food.nearest(agent.pos)?;
            let nearby = self.food.count_within(agent.pos, params.density_radius)?;

            let old_pos = agent.pos;
            let inputs = agent.sense(target.map(|(_, food)| food.pos), nearby, params);
            let (dx, dy) = agent.decide(&inputs);
            agent.pos = clamp_to_box(
                Point::new(old_pos.x() + dx, old_pos.y() + dy),
                max_x,
                max_y,
            );

            if let Some((idx, food)) = target {
                let old_dist = distance(old_pos, food.pos);
                let new_dist = distance(agent.pos, food.pos);

                if new_dist < params.eat_radius {
                    agent.gain_energy(params.food_energy);
                    self.food.remove(idx);
                    self.events.log(
                        generation,
                        tick,
                        SimulationEvent::FoodConsumed {
                            agent_id: agent.id,
                            energy: agent.energy,
                        },
                    );
                }
                if new_dist < old_dist {
                    agent.gain_energy(rewards.approach_bonus);
                }
                if new_dist > rewards.far_distance {
                    agent.consume_energy(rewards.far_penalty);
                }
            }

            if distance(old_pos, agent.pos) > rewards.movement_threshold {
                agent.gain_energy(rewards.movement_bonus);
            }
            if edge_distance(agent.pos, params.width, params.height) < rewards.edge_distance {
                agent.consume_energy(rewards.edge_penalty);
            }
        }

        let (alive, dead): (Vec<Agent>, Vec<Agent>) = std::mem::take(&mut self.agents)
            .into_iter()
            .partition(Agent::is_alive);
        for agent in &dead {
            if self.context.record_death(agent) {
                self.events.log(
                    generation,
                    tick,
                    SimulationEvent::AgentDied {
                        agent_id: agent.id,
                        energy: agent.energy,
                    },
                );
            }
        }
        self.agents = alive;

        if tick >= self.params.steps_per_generation {
            return Ok(TickOutcome::GenerationEnded(self.end_generation(rng)?));
        }
        Ok(TickOutcome::Advanced)
    }

    /// Ends the current generation: evolves the live population, falls back to
    /// a random population on extinction, and reseeds the food cluster.
    pub fn end_generation<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<GenerationSummary> {
        let best_fitness = self
            .agents
            .iter()
            .map(|agent| agent.energy)
            .max_by(f32::total_cmp)
            .unwrap_or(0.0);

        self.engine.advance_generation();
        let generation = self.engine.generation();

        for agent in &self.agents {
            self.context.observe(agent);
        }
        let rows = generation_rows(
            &self.context,
            &self.agents,
            generation,
            self.params.steps_per_generation,
        );

        let terminal = std::mem::take(&mut self.agents);
        let mut next = self.engine.next_generation(
            terminal,
            &mut self.context,
            &mut self.events,
            &self.params,
            rng,
        )?;

        let reseeded = next.is_empty();
        if reseeded {
            next = self.random_population(self.params.population_size, rng);
            self.log(SimulationEvent::RandomReseed { count: next.len() });
        }
        self.agents = next;

        self.food.clear();
        self.seed_cluster(rng);
        self.best_fitness = best_fitness;

        self.log(SimulationEvent::GenerationEnded {
            generation,
            best_fitness,
            population: self.agents.len(),
        });
        info!(
            generation,
            best_fitness,
            population = self.agents.len(),
            reseeded,
            "generation ended"
        );

        Ok(GenerationSummary {
            generation,
            best_fitness,
            population: self.agents.len(),
            mutation_rate: self.engine.mutation_rate(),
            reseeded,
            rows,
        })
    }

    /// Read-only snapshot for rendering.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            generation: self.generation(),
            tick: self.tick_count(),
            agents: self
                .agents
                .iter()
                .map(|agent| AgentView {
                    id: agent.id,
                    x: agent.pos.x(),
                    y: agent.pos.y(),
                    energy: agent.energy,
                    alive: agent.is_alive(),
                })
                .collect(),
            food: self
                .food
                .items()
                .iter()
                .map(|food| (food.pos.x(), food.pos.y()))
                .collect(),
        }
    }

    /// Saves the world state to a JSON file.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Loads a world state from a JSON file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let world: World = serde_json::from_str(&json)?;
        world.params.validate()?;
        Ok(world)
    }

    fn log(&mut self, event: SimulationEvent) {
        let (generation, tick) = (self.engine.state.generation, self.engine.state.tick);
        self.events.log(generation, tick, event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn world() -> (World, ChaCha8Rng) {
        let mut rng = ChaCha8Rng::seed_from_u64(21);
        let mut world = World::new(Params::default()).unwrap();
        world.start(20, &mut rng).unwrap();
        (world, rng)
    }

    #[test]
    fn start_seeds_population_and_cluster() {
        let (world, _) = world();
        assert_eq!(world.agents.len(), 20);
        assert_eq!(world.food.len(), 50);
        assert_eq!(world.context.len(), 20);
        assert_eq!(world.generation(), 1);
        assert!(world.agents.iter().all(|a| a.birth_generation == 1));
    }

    #[test]
    fn start_rejects_empty_population() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let mut world = World::new(Params::default()).unwrap();
        assert!(world.start(0, &mut rng).is_err());
    }

    /// Keeps a single agent at `pos` whose controller always steers towards
    /// `(+speed, +speed)`, and removes all food.
    fn steered_world(pos: (f32, f32), speed: f32) -> (World, ChaCha8Rng) {
        let (mut world, rng) = world();
        world.agents.truncate(1);
        world.food.clear();

        let agent = &mut world.agents[0];
        agent.pos = Point::new(pos.0, pos.1);
        agent.speed = speed;
        agent.brain.hidden.weights.fill(0.0);
        agent.brain.hidden.biases.fill(0.0);
        agent.brain.output.weights.fill(0.0);
        agent.brain.output.biases.fill(10.0);
        (world, rng)
    }

    fn energy_delta(world: &mut World, rng: &mut ChaCha8Rng) -> f32 {
        let before = world.agents[0].energy;
        world.tick(rng).unwrap();
        world.agents[0].energy - before
    }

    #[test]
    fn eating_removes_food_and_rewards() {
        let (mut world, mut rng) = steered_world((400.0, 300.0), 0.5);
        world.food.push(Food::new(401.0, 300.0));

        // +3 for eating, +0.1 for getting closer
        let delta = energy_delta(&mut world, &mut rng);
        assert!(world.food.is_empty());
        assert!((delta - 3.1).abs() < 1e-4, "delta {delta}");
        assert!(world.events.contains(|e| matches!(e, SimulationEvent::FoodConsumed { .. })));
    }

    #[test]
    fn approach_bonus_alone() {
        let (mut world, mut rng) = steered_world((400.0, 300.0), 1.0);
        world.food.push(Food::new(450.0, 300.0));

        let delta = energy_delta(&mut world, &mut rng);
        assert!((delta - 0.1).abs() < 1e-5, "delta {delta}");
        assert_eq!(world.food.len(), 1);
    }

    #[test]
    fn far_penalty_alone() {
        // moving away from a target more than 100 units off
        let (mut world, mut rng) = steered_world((400.0, 300.0), 1.0);
        world.food.push(Food::new(200.0, 150.0));

        let delta = energy_delta(&mut world, &mut rng);
        assert!((delta + 0.01).abs() < 1e-5, "delta {delta}");
    }

    #[test]
    fn movement_bonus_alone() {
        let (mut world, mut rng) = steered_world((400.0, 300.0), 5.0);

        let delta = energy_delta(&mut world, &mut rng);
        assert!((delta - 0.1).abs() < 1e-5, "delta {delta}");
        let pos = world.agents[0].pos;
        assert!((pos.x() - 405.0).abs() < 1e-3 && (pos.y() - 305.0).abs() < 1e-3);
    }

    #[test]
    fn all_shaping_terms_in_one_tick() {
        // approach +0.1, far -0.01, moved +0.1, near edge -0.1
        let (mut world, mut rng) = steered_world((20.0, 20.0), 5.0);
        world.food.push(Food::new(700.0, 500.0));

        let delta = energy_delta(&mut world, &mut rng);
        assert!((delta - 0.09).abs() < 1e-5, "delta {delta}");
    }

    #[test]
    fn edge_penalty_applies_near_boundary() {
        let (mut world, mut rng) = world();
        world.agents.truncate(1);
        world.food.clear();

        let agent = &mut world.agents[0];
        agent.pos = Point::new(0.0, 0.0);
        agent.speed = 0.5;
        let before = agent.energy;

        world.tick(&mut rng).unwrap();
        let delta = world.agents[0].energy - before;
        assert!((delta + 0.1).abs() < 1e-5, "delta {delta}");
    }

    #[test]
    fn depletion_then_tick_removes_and_freezes() {
        let (mut world, mut rng) = world();
        world.agents.truncate(1);
        world.agents[0].set_energy(1.0);
        let id = world.agents[0].id;

        assert_eq!(world.deplete(), 1);
        assert_eq!(world.agents[0].energy, 0.0);

        world.tick(&mut rng).unwrap();
        assert!(world.agents.is_empty());
        let record = world.context.record(id).unwrap();
        assert_eq!(record.food_when_died, Some(0.0));
    }

    #[test]
    fn generation_turnover_resets_tick_and_food() {
        let params = Params {
            steps_per_generation: 5,
            ..Params::default()
        };
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let mut world = World::new(params).unwrap();
        world.start(20, &mut rng).unwrap();
        world.add_food(10, &mut rng);

        let mut ended = None;
        for _ in 0..5 {
            if let TickOutcome::GenerationEnded(summary) = world.tick(&mut rng).unwrap() {
                ended = Some(summary);
            }
        }

        let summary = ended.expect("generation should end on the fifth tick");
        assert_eq!(summary.generation, 2);
        assert_eq!(world.generation(), 2);
        assert_eq!(world.tick_count(), 0);
        assert_eq!(world.food.len(), 50);
        assert_eq!(world.agents.len(), 20);
        assert_eq!(summary.rows.len(), 20);
    }

    #[test]
    fn extinction_triggers_random_reseed() {
        let (mut world, mut rng) = world();
        world.agents.clear();

        let summary = world.end_generation(&mut rng).unwrap();
        assert!(summary.reseeded);
        assert_eq!(summary.best_fitness, 0.0);
        assert_eq!(world.agents.len(), 20);
        assert!(world.agents.iter().all(|a| a.birth_generation == 2));
        assert!(world.events.contains(|e| matches!(e, SimulationEvent::RandomReseed { count: 20 })));
        assert_eq!(world.context.len(), 40);
    }

    #[test]
    fn periodic_food_respects_bounds() {
        let (mut world, mut rng) = world();
        for _ in 0..20 {
            let before = world.food.len();
            let added = world.add_periodic_food(&mut rng);
            assert!((2..=5).contains(&added));
            assert_eq!(world.food.len(), before + added);
        }
    }

    #[test]
    fn snapshot_reflects_world() {
        let (world, _) = world();
        let snapshot = world.snapshot();
        assert_eq!(snapshot.agents.len(), 20);
        assert_eq!(snapshot.food.len(), 50);
        assert!(snapshot.agents.iter().all(|a| a.alive));
    }
}
