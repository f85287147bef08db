//! Generational selection and reproduction.
//!
//! At the end of every generation the [`EvolutionEngine`] ranks the terminal
//! population by energy, adapts its mutation rate, picks parents by
//! fitness-proportional selection, carries the elite over unchanged and fills
//! the rest of the next population with mutated crossover offspring.

use rand::Rng;
use rand::seq::index;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::agent::Agent;
use super::brain::NeuralController;
use super::context::SimulationContext;
use super::error::Result;
use super::events::{EventLog, SimulationEvent};
use super::params::Params;

/// Generation bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationState {
    /// Current generation index, starting at 1.
    pub generation: u32,
    /// Ticks elapsed in the current generation.
    pub tick: u32,
    /// Best fitness recorded so far; only replaced on improvement.
    pub last_best_fitness: f32,
    /// Consecutive generations without improvement.
    pub stagnation: u32,
    /// Mutation rate used for the next reproduction.
    pub mutation_rate: f32,
}

impl GenerationState {
    /// State of a fresh run.
    pub fn new(base_mutation_rate: f32) -> Self {
        Self {
            generation: 1,
            tick: 0,
            last_best_fitness: 0.0,
            stagnation: 0,
            mutation_rate: base_mutation_rate,
        }
    }
}

/// Parents drawn for one reproduction round.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    /// Indices into the population, possibly repeated.
    pub parents: Vec<usize>,
    /// `false` when no agent had positive energy and parents were sampled uniformly.
    pub roulette: bool,
}

/// Scans agents with positive energy in order and returns the first whose
/// cumulative energy reaches `draw`.
///
/// If rounding leaves `draw` above the total, the last positive agent wins.
pub fn roulette_pick(energies: &[f32], draw: f32) -> Option<usize> {
    let mut cumulative = 0.0;
    let mut last = None;
    for (i, &energy) in energies.iter().enumerate() {
        if energy > 0.0 {
            cumulative += energy;
            last = Some(i);
            if cumulative >= draw {
                return Some(i);
            }
        }
    }
    last
}

/// Fitness-proportional selection of `count` parents, with replacement.
///
/// Falls back to uniform sampling without replacement when the total positive
/// energy is not positive.
pub fn select_parents<R: Rng + ?Sized>(energies: &[f32], count: usize, rng: &mut R) -> Selection {
    let total: f32 = energies.iter().filter(|e| **e > 0.0).sum();
    if total <= 0.0 {
        let amount = count.min(energies.len());
        return Selection {
            parents: index::sample(rng, energies.len(), amount).into_vec(),
            roulette: false,
        };
    }

    let parents = (0..count)
        .filter_map(|_| roulette_pick(energies, rng.random_range(0.0..total)))
        .collect();
    Selection {
        parents,
        roulette: true,
    }
}

/// Population indices ordered by energy, highest first. Ties keep population order.
pub fn rank(population: &[Agent]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..population.len()).collect();
    order.sort_by(|&a, &b| population[b].energy.total_cmp(&population[a].energy));
    order
}

/// Produces successive generations from terminal populations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionEngine {
    /// Generation bookkeeping.
    pub state: GenerationState,
}

impl EvolutionEngine {
    /// Creates an engine positioned at generation 1.
    pub fn new(params: &Params) -> Self {
        Self {
            state: GenerationState::new(params.base_mutation_rate),
        }
    }

    /// Current generation index.
    pub fn generation(&self) -> u32 {
        self.state.generation
    }

    /// Mutation rate for the next reproduction.
    pub fn mutation_rate(&self) -> f32 {
        self.state.mutation_rate
    }

    /// Moves to the next generation and resets the tick counter.
    pub fn advance_generation(&mut self) {
        self.state.generation += 1;
        self.state.tick = 0;
    }

    /// Updates the stagnation counter with this generation's best fitness and
    /// adjusts the mutation rate.
    ///
    /// After more than `stagnation_limit` non-improving generations the rate
    /// grows without bound; otherwise it decays towards `base_mutation_rate`.
    pub fn adapt_mutation_rate(&mut self, best_fitness: f32, params: &Params) {
        let state = &mut self.state;
        if best_fitness <= state.last_best_fitness {
            state.stagnation += 1;
        } else {
            state.stagnation = 0;
            state.last_best_fitness = best_fitness;
        }

        if state.stagnation > params.stagnation_limit {
            state.mutation_rate += params.mutation_rate_increase;
        } else {
            state.mutation_rate =
                (state.mutation_rate - params.mutation_rate_decay).max(params.base_mutation_rate);
        }
    }

    /// Builds the next population from the terminal one.
    ///
    /// The elites are the top `elite_size` agents of the whole ranked
    /// population, not of the drawn parents, so no agent is carried twice.
    /// They are cloned as they are, keeping id, energy, position and
    /// `birth_generation`. Children fill the rest up to `population_size`.
    ///
    /// # Arguments
    ///
    /// * `population` - Terminal population of the finished generation
    /// * `context` - Id allocator and lineage ledger; every child is registered
    /// * `events` - Receives the mutation rate change and any fallback events
    /// * `params` - Simulation parameters
    /// * `rng` - Random source for selection, crossover and mutation
    ///
    /// # Returns
    ///
    /// The next population, elites first. It is empty when the population is
    /// extinct, and shorter than `population_size` if reproduction ran out of
    /// parents; the caller is expected to reseed an empty result.
    pub fn next_generation<R: Rng + ?Sized>(
        &mut self,
        population: Vec<Agent>,
        context: &mut SimulationContext,
        events: &mut EventLog,
        params: &Params,
        rng: &mut R,
    ) -> Result<Vec<Agent>> {
        let generation = self.state.generation;
        let tick = self.state.tick;

        let ranking = rank(&population);
        let best_fitness = ranking.first().map_or(0.0, |&i| population[i].energy);
        self.adapt_mutation_rate(best_fitness, params);
        events.log(
            generation,
            tick,
            SimulationEvent::MutationRateChanged {
                rate: self.state.mutation_rate,
                stagnation: self.state.stagnation,
            },
        );

        if population.is_empty() {
            events.log(generation, tick, SimulationEvent::EmptyPopulation);
            return Ok(Vec::new());
        }

        let requested = (params.elite_size * 2)
            .max(params.population_size / 2)
            .min(population.len());
        let energies: Vec<f32> = population.iter().map(|agent| agent.energy).collect();
        let selection = select_parents(&energies, requested, rng);
        if !selection.roulette {
            events.log(generation, tick, SimulationEvent::NoPositiveFitness);
        }

        let elite_count = params
            .elite_size
            .min(population.len())
            .min(params.population_size);
        let mut next: Vec<Agent> = ranking[..elite_count]
            .iter()
            .map(|&i| population[i].clone())
            .collect();

        let parents = &selection.parents;
        while next.len() < params.population_size {
            if parents.is_empty() {
                events.log(
                    generation,
                    tick,
                    SimulationEvent::NoParentsAvailable {
                        produced: next.len(),
                    },
                );
                break;
            }
            let parent_1 = &population[parents[rng.random_range(0..parents.len())]];
            let parent_2 = &population[parents[rng.random_range(0..parents.len())]];
            let child = self.breed(parent_1, parent_2, context, params, rng)?;
            next.push(child);
        }

        info!(
            generation,
            best_fitness,
            mutation_rate = self.state.mutation_rate,
            stagnation = self.state.stagnation,
            parents = parents.len(),
            elites = elite_count,
            population = next.len(),
            "reproduced generation"
        );

        Ok(next)
    }

    /// Crossover, mutation and speed perturbation for one child placed at the
    /// first parent's position.
    fn breed<R: Rng + ?Sized>(
        &self,
        parent_1: &Agent,
        parent_2: &Agent,
        context: &mut SimulationContext,
        params: &Params,
        rng: &mut R,
    ) -> Result<Agent> {
        let mut brain = NeuralController::crossover(&parent_1.brain, &parent_2.brain, rng)?;
        brain.mutate(self.state.mutation_rate, params.mutation_probability, rng);

        let jitter = rng.random_range(-params.speed_jitter..=params.speed_jitter);
        let speed = (parent_1.speed + jitter).clamp(params.min_speed, params.max_speed);

        let child = Agent::new(
            context.allocate_id(),
            parent_1.pos,
            speed,
            brain,
            self.state.generation,
            params.initial_energy,
        );
        context.register(&child);
        Ok(child)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn roulette_scans_in_order() {
        assert_eq!(roulette_pick(&[10.0, 30.0], 15.0), Some(1));
        assert_eq!(roulette_pick(&[10.0, 30.0], 10.0), Some(0));
        assert_eq!(roulette_pick(&[10.0, 30.0], 0.0), Some(0));
    }

    #[test]
    fn roulette_skips_non_positive_agents() {
        assert_eq!(roulette_pick(&[-2.0, 0.0, 4.0, 6.0], 1.0), Some(2));
        assert_eq!(roulette_pick(&[0.0, -1.0], 0.5), None);
        assert_eq!(roulette_pick(&[3.0, 0.0], 3.5), Some(0));
    }

    #[test]
    fn selection_falls_back_to_uniform_sampling() {
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let selection = select_parents(&[0.0, -1.0, 0.0, 0.0], 3, &mut rng);
        assert!(!selection.roulette);
        assert_eq!(selection.parents.len(), 3);

        let mut unique = selection.parents.clone();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(unique.len(), 3);
    }

    #[test]
    fn selection_never_picks_starving_agents() {
        let mut rng = ChaCha8Rng::seed_from_u64(10);
        let selection = select_parents(&[0.0, 5.0, -3.0, 1.0], 200, &mut rng);
        assert!(selection.roulette);
        assert_eq!(selection.parents.len(), 200);
        assert!(selection.parents.iter().all(|&i| i == 1 || i == 3));
        let heavy = selection.parents.iter().filter(|&&i| i == 1).count();
        assert!(heavy > 120, "heavy picked {heavy} times");
    }

    #[test]
    fn rank_orders_by_energy() {
        let params = Params::default();
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let population: Vec<Agent> = [3.0, 9.0, -1.0, 9.0]
            .iter()
            .enumerate()
            .map(|(i, &energy)| {
                let mut agent = Agent::new_random(i as u64, 1, &params, &mut rng);
                agent.energy = energy;
                agent
            })
            .collect();
        assert_eq!(rank(&population), vec![1, 3, 0, 2]);
    }

    #[test]
    fn mutation_rate_grows_only_after_stagnation_limit() {
        let params = Params::default();
        let mut engine = EvolutionEngine::new(&params);

        engine.adapt_mutation_rate(10.0, &params);
        assert_eq!(engine.state.stagnation, 0);
        assert_eq!(engine.mutation_rate(), params.base_mutation_rate);

        for expected_stagnation in 1..=3 {
            engine.adapt_mutation_rate(8.0, &params);
            assert_eq!(engine.state.stagnation, expected_stagnation);
            assert_eq!(engine.mutation_rate(), params.base_mutation_rate);
        }

        engine.adapt_mutation_rate(10.0, &params);
        assert!((engine.mutation_rate() - 0.15).abs() < 1e-6);
        engine.adapt_mutation_rate(2.0, &params);
        assert!((engine.mutation_rate() - 0.20).abs() < 1e-6);

        engine.adapt_mutation_rate(11.0, &params);
        assert_eq!(engine.state.stagnation, 0);
        assert_eq!(engine.state.last_best_fitness, 11.0);
        assert!((engine.mutation_rate() - 0.19).abs() < 1e-6);
    }

    #[test]
    fn empty_population_yields_empty_generation() {
        let params = Params::default();
        let mut engine = EvolutionEngine::new(&params);
        let mut context = SimulationContext::new();
        let mut events = EventLog::default();
        let mut rng = ChaCha8Rng::seed_from_u64(0);

        let next = engine
            .next_generation(Vec::new(), &mut context, &mut events, &params, &mut rng)
            .unwrap();
        assert!(next.is_empty());
        assert!(events.contains(|e| *e == SimulationEvent::EmptyPopulation));
        assert_eq!(engine.state.stagnation, 1);
    }

    #[test]
    fn zero_parent_target_yields_no_children() {
        let params = Params {
            population_size: 1,
            elite_size: 0,
            ..Params::default()
        };
        let mut engine = EvolutionEngine::new(&params);
        let mut context = SimulationContext::new();
        let mut events = EventLog::default();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let agent = Agent::new_random(context.allocate_id(), 1, &params, &mut rng);

        let next = engine
            .next_generation(vec![agent], &mut context, &mut events, &params, &mut rng)
            .unwrap();
        assert!(next.is_empty());
        assert!(events.contains(|e| matches!(e, SimulationEvent::NoParentsAvailable { .. })));
    }
}
