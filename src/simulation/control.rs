//! Control surface and trigger scheduling.
//!
//! [`Simulation`] is the single entry point for drivers. It owns the world, the
//! seeded random source, an optional CSV report and a virtual clock with three
//! independent timers: move (ticks), food addition and food depletion. Every
//! trigger runs to completion before the next one starts.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};

use super::agent::Agent;
use super::error::Result;
use super::events::LoggedEvent;
use super::food::Food;
use super::params::Params;
use super::report::GenerationReport;
use super::world::{GenerationSummary, Snapshot, TickOutcome, World};

/// The external triggers accepted by the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trigger {
    /// Advance one tick.
    Tick,
    /// Scatter periodic food.
    AddFood,
    /// Drain energy from every living agent.
    Deplete,
}

/// A repeating timer on the virtual clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timer {
    /// Period in milliseconds.
    pub interval_ms: u64,
    /// Absolute time of the next firing.
    pub next_due_ms: u64,
}

/// Virtual clock driving the three timers.
///
/// Timers fire in chronological order; simultaneous firings run tick first,
/// then food addition, then depletion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clock {
    /// Current virtual time in milliseconds.
    pub now_ms: u64,
    /// Move timer.
    pub tick: Option<Timer>,
    /// Food timer.
    pub food: Option<Timer>,
    /// Depletion timer.
    pub depletion: Option<Timer>,
}

impl Clock {
    /// (Re)starts the timer for `trigger`; an interval of 0 stops it.
    pub fn set(&mut self, trigger: Trigger, interval_ms: u64) {
        let timer = (interval_ms > 0).then(|| Timer {
            interval_ms,
            next_due_ms: self.now_ms + interval_ms,
        });
        *self.slot(trigger) = timer;
    }

    /// Removes the next trigger due at or before `until_ms` and moves the clock
    /// to its firing time.
    pub fn pop_due(&mut self, until_ms: u64) -> Option<Trigger> {
        let trigger = [Trigger::Tick, Trigger::AddFood, Trigger::Deplete]
            .into_iter()
            .filter_map(|trigger| {
                let timer = (*self.slot(trigger))?;
                (timer.next_due_ms <= until_ms).then_some((timer.next_due_ms, trigger))
            })
            .min_by_key(|&(due, _)| due)
            .map(|(_, trigger)| trigger)?;

        let timer = self.slot(trigger).as_mut()?;
        let due = timer.next_due_ms;
        timer.next_due_ms += timer.interval_ms;
        self.now_ms = due;
        Some(trigger)
    }

    fn slot(&mut self, trigger: Trigger) -> &mut Option<Timer> {
        match trigger {
            Trigger::Tick => &mut self.tick,
            Trigger::AddFood => &mut self.food,
            Trigger::Deplete => &mut self.depletion,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct SavedRun {
    seed: u64,
    clock: Clock,
    world: World,
}

/// Control surface over one simulation run.
pub struct Simulation {
    world: World,
    clock: Clock,
    seed: u64,
    rng: ChaCha8Rng,
    report: Option<GenerationReport>,
}

/// A simulation shared between threads. Holding the lock serializes ticks,
/// food additions and depletions.
pub type SharedSimulation = Arc<Mutex<Simulation>>;

impl Simulation {
    /// Creates an idle simulation whose random source is seeded with `seed`.
    pub fn with_seed(params: Params, seed: u64) -> Result<Self> {
        Ok(Self {
            world: World::new(params)?,
            clock: Clock::default(),
            seed,
            rng: ChaCha8Rng::seed_from_u64(seed),
            report: None,
        })
    }

    /// Writes a CSV row set to `path` at every generation end.
    pub fn with_report<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.report = Some(GenerationReport::new(path));
        self
    }

    /// Wraps the simulation for use from several threads.
    pub fn into_shared(self) -> SharedSimulation {
        Arc::new(Mutex::new(self))
    }

    /// Starts a run: seeds the population, the central food cluster and the
    /// initial scattered food, then starts the move timer and the food and
    /// depletion timers with their configured intervals.
    pub fn start(&mut self, population_size: usize) -> Result<()> {
        self.world.start(population_size, &mut self.rng)?;
        let initial_food = self.world.params.initial_food;
        self.world.add_food(initial_food, &mut self.rng);

        let params = &self.world.params;
        let (tick, food, depletion) = (
            params.tick_interval_ms,
            params.food_interval_ms,
            params.depletion_interval_ms,
        );
        self.clock.set(Trigger::Tick, tick);
        self.clock.set(Trigger::AddFood, food);
        self.clock.set(Trigger::Deplete, depletion);
        Ok(())
    }

    /// Scatters `count` food items immediately.
    pub fn add_food(&mut self, count: usize) {
        self.world.add_food(count, &mut self.rng);
    }

    /// Restarts the food timer; 0 stops it.
    pub fn set_food_timer(&mut self, interval_ms: u64) {
        self.clock.set(Trigger::AddFood, interval_ms);
    }

    /// Restarts the depletion timer; 0 stops it.
    pub fn set_depletion_timer(&mut self, interval_ms: u64) {
        self.clock.set(Trigger::Deplete, interval_ms);
    }

    /// Restarts the move timer; 0 pauses the simulation.
    pub fn set_tick_timer(&mut self, interval_ms: u64) {
        self.clock.set(Trigger::Tick, interval_ms);
    }

    /// Runs every trigger due within the next `elapsed_ms` milliseconds.
    ///
    /// Returns the summaries of all generations that ended in that window.
    pub fn advance(&mut self, elapsed_ms: u64) -> Result<Vec<GenerationSummary>> {
        let until = self.clock.now_ms + elapsed_ms;
        let mut ended = Vec::new();

        while let Some(trigger) = self.clock.pop_due(until) {
            if let Some(summary) = self.fire(trigger)? {
                ended.push(summary);
            }
        }
        self.clock.now_ms = until;
        Ok(ended)
    }

    /// Runs one trigger immediately, outside the clock.
    pub fn fire(&mut self, trigger: Trigger) -> Result<Option<GenerationSummary>> {
        match trigger {
            Trigger::Tick => self.tick(),
            Trigger::AddFood => {
                self.add_periodic_food();
                Ok(None)
            }
            Trigger::Deplete => {
                self.deplete();
                Ok(None)
            }
        }
    }

    /// Scatters the random amount of food a food timer event adds.
    pub fn add_periodic_food(&mut self) -> usize {
        self.world.add_periodic_food(&mut self.rng)
    }

    /// Drains every living agent once. Returns the number of agents drained.
    pub fn deplete(&mut self) -> usize {
        self.world.deplete()
    }

    /// Advances one tick, writing the report if a generation ended.
    pub fn tick(&mut self) -> Result<Option<GenerationSummary>> {
        match self.world.tick(&mut self.rng)? {
            TickOutcome::Advanced => Ok(None),
            TickOutcome::GenerationEnded(summary) => {
                if let Some(report) = &self.report {
                    report.append(&summary.rows)?;
                }
                Ok(Some(summary))
            }
        }
    }

    /// Current generation.
    pub fn generation(&self) -> u32 {
        self.world.generation()
    }

    /// Best fitness of the most recently finished generation.
    pub fn best_fitness(&self) -> f32 {
        self.world.best_fitness
    }

    /// Mutation rate for the next reproduction.
    pub fn mutation_rate(&self) -> f32 {
        self.world.engine.mutation_rate()
    }

    /// Living agents.
    pub fn agents(&self) -> &[Agent] {
        &self.world.agents
    }

    /// Food on the board.
    pub fn food(&self) -> &[Food] {
        self.world.food.items()
    }

    /// Recent diagnostic events, newest first.
    pub fn events(&self) -> &VecDeque<LoggedEvent> {
        self.world.events.events()
    }

    /// Read-only rendering snapshot.
    pub fn snapshot(&self) -> Snapshot {
        self.world.snapshot()
    }

    /// Simulation parameters.
    pub fn params(&self) -> &Params {
        &self.world.params
    }

    /// The underlying world.
    pub fn world(&self) -> &World {
        &self.world
    }

    /// The virtual clock.
    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    /// Seed of the random source.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Saves world, clock and seed as JSON. The random stream is not saved;
    /// a loaded run restarts it from the seed.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let saved = SavedRun {
            seed: self.seed,
            clock: self.clock.clone(),
            world: self.world.clone(),
        };
        std::fs::write(path, serde_json::to_string_pretty(&saved)?)?;
        Ok(())
    }

    /// Loads a run saved with [`Self::save_to_file`].
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let saved: SavedRun = serde_json::from_str(&json)?;
        saved.world.params.validate()?;
        Ok(Self {
            world: saved.world,
            clock: saved.clock,
            seed: saved.seed,
            rng: ChaCha8Rng::seed_from_u64(saved.seed),
            report: None,
        })
    }
}
