//! Diagnostic event stream.
//!
//! Non-fatal conditions (extinction, zero fitness, running out of parents) and
//! notable state changes are emitted as [`SimulationEvent`]s. They are traced
//! and kept in a bounded [`EventLog`] that a stats collaborator can poll.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use super::agent::AgentId;

/// Events emitted by the world and the evolution engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SimulationEvent {
    /// An agent reached its target food.
    FoodConsumed {
        /// ID of the agent that ate.
        agent_id: AgentId,
        /// Energy after eating.
        energy: f32,
    },
    /// An agent ran out of energy and left the live set.
    AgentDied {
        /// ID of the agent that died.
        agent_id: AgentId,
        /// Energy at the moment of death.
        energy: f32,
    },
    /// Scattered food was added.
    FoodAdded {
        /// Number of items added.
        count: usize,
    },
    /// A depletion event drained living agents.
    FoodDepleted {
        /// Number of agents drained.
        agents: usize,
    },
    /// The adaptive schedule produced a new mutation rate.
    MutationRateChanged {
        /// Rate used for the next generation.
        rate: f32,
        /// Consecutive generations without improvement.
        stagnation: u32,
    },
    /// The terminal population was empty.
    EmptyPopulation,
    /// No agent had positive energy; parents were sampled uniformly.
    NoPositiveFitness,
    /// Reproduction stopped early for lack of parents.
    NoParentsAvailable {
        /// Agents in the next generation so far.
        produced: usize,
    },
    /// The world replaced an empty generation with random agents.
    RandomReseed {
        /// Number of agents created.
        count: usize,
    },
    /// A generation finished and its successor was created.
    GenerationEnded {
        /// Index of the new generation.
        generation: u32,
        /// Highest energy in the finished generation.
        best_fitness: f32,
        /// Size of the new population.
        population: usize,
    },
}

impl SimulationEvent {
    /// Whether the event reports a degraded but recoverable condition.
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            SimulationEvent::EmptyPopulation
                | SimulationEvent::NoPositiveFitness
                | SimulationEvent::NoParentsAvailable { .. }
                | SimulationEvent::RandomReseed { .. }
        )
    }
}

/// An event stamped with the simulation time it occurred at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggedEvent {
    /// Generation the event belongs to.
    pub generation: u32,
    /// Tick within the generation.
    pub tick: u32,
    /// The event itself.
    pub event: SimulationEvent,
}

/// Event log that tracks recent simulation events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLog {
    /// Recent events, newest first
    events: VecDeque<LoggedEvent>,
    /// Maximum number of events to keep
    max_events: usize,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(64)
    }
}

impl EventLog {
    /// Creates a new event log with specified capacity
    pub fn new(max_events: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(max_events),
            max_events,
        }
    }

    /// Traces the event and adds it to the log.
    pub fn log(&mut self, generation: u32, tick: u32, event: SimulationEvent) {
        if event.is_warning() {
            tracing::warn!(generation, tick, ?event, "recoverable condition");
        } else {
            tracing::debug!(generation, tick, ?event, "simulation event");
        }

        self.events.push_front(LoggedEvent {
            generation,
            tick,
            event,
        });

        // Keep only the most recent events
        while self.events.len() > self.max_events {
            self.events.pop_back();
        }
    }

    /// Returns all events, newest first
    pub fn events(&self) -> &VecDeque<LoggedEvent> {
        &self.events
    }

    /// Returns whether any retained event satisfies `pred`.
    pub fn contains(&self, pred: impl Fn(&SimulationEvent) -> bool) -> bool {
        self.events.iter().any(|logged| pred(&logged.event))
    }

    /// Clears all events
    pub fn clear(&mut self) {
        self.events.clear();
    }
}
