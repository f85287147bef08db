//! Identity allocation and the lineage ledger.
//!
//! Every agent ever created gets an id from [`SimulationContext`] and a
//! [`LineageRecord`] that outlives the agent. The ledger is append-only: records
//! are never removed, and the terminal energy of a dead agent is frozen the
//! first time its death is observed.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::agent::{Agent, AgentId};

/// Historical record of one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineageRecord {
    /// Agent identifier.
    pub id: AgentId,
    /// Generation in which the agent was created.
    pub birth_generation: u32,
    /// Last observed energy.
    pub energy: f32,
    /// Highest observed energy.
    pub peak_energy: f32,
    /// Energy at death, set once.
    pub food_when_died: Option<f32>,
}

impl LineageRecord {
    fn from_agent(agent: &Agent) -> Self {
        Self {
            id: agent.id,
            birth_generation: agent.birth_generation,
            energy: agent.energy,
            peak_energy: agent.peak_energy,
            food_when_died: None,
        }
    }

    /// Whether a death has been recorded.
    pub fn has_died(&self) -> bool {
        self.food_when_died.is_some()
    }
}

/// Owns the id allocator and the id → lineage mapping.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimulationContext {
    next_id: AgentId,
    records: BTreeMap<AgentId, LineageRecord>,
}

impl SimulationContext {
    /// Creates an empty context whose first id is 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Hands out the next unique id.
    pub fn allocate_id(&mut self) -> AgentId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Adds a record for `agent` unless one exists.
    pub fn register(&mut self, agent: &Agent) {
        self.records
            .entry(agent.id)
            .or_insert_with(|| LineageRecord::from_agent(agent));
    }

    /// Refreshes the energy figures of a living agent's record.
    ///
    /// Records of dead agents are left untouched.
    pub fn observe(&mut self, agent: &Agent) {
        let record = self
            .records
            .entry(agent.id)
            .or_insert_with(|| LineageRecord::from_agent(agent));
        if record.has_died() {
            return;
        }
        record.energy = agent.energy;
        record.peak_energy = record.peak_energy.max(agent.peak_energy);
    }

    /// Records a death. Returns `false` if a death was already recorded, in
    /// which case nothing changes.
    pub fn record_death(&mut self, agent: &Agent) -> bool {
        self.observe(agent);
        match self.records.get_mut(&agent.id) {
            Some(record) if !record.has_died() => {
                record.food_when_died = Some(agent.energy);
                true
            }
            _ => false,
        }
    }

    /// Looks up a record.
    pub fn record(&self, id: AgentId) -> Option<&LineageRecord> {
        self.records.get(&id)
    }

    /// All records ordered by id.
    pub fn records(&self) -> impl Iterator<Item = &LineageRecord> {
        self.records.values()
    }

    /// Number of agents ever registered.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no agent was registered yet.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::params::Params;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn agent(ctx: &mut SimulationContext) -> Agent {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        Agent::new_random(ctx.allocate_id(), 1, &Params::default(), &mut rng)
    }

    #[test]
    fn ids_are_monotonic() {
        let mut ctx = SimulationContext::new();
        let ids: Vec<_> = (0..5).map(|_| ctx.allocate_id()).collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn death_is_frozen_once() {
        let mut ctx = SimulationContext::new();
        let mut a = agent(&mut ctx);
        ctx.register(&a);

        a.set_energy(0.0);
        assert!(ctx.record_death(&a));
        assert_eq!(ctx.record(a.id).unwrap().food_when_died, Some(0.0));

        a.set_energy(-3.0);
        assert!(!ctx.record_death(&a));
        ctx.observe(&a);
        let record = ctx.record(a.id).unwrap();
        assert_eq!(record.food_when_died, Some(0.0));
        assert_eq!(record.energy, 0.0);
    }

    #[test]
    fn observe_tracks_living_agents() {
        let mut ctx = SimulationContext::new();
        let mut a = agent(&mut ctx);
        ctx.register(&a);
        a.gain_energy(4.0);
        a.consume_energy(1.0);
        ctx.observe(&a);

        let record = ctx.record(a.id).unwrap();
        assert_eq!(record.energy, 8.0);
        assert_eq!(record.peak_energy, 9.0);
        assert_eq!(ctx.len(), 1);
    }
}
