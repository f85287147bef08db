use serde::{Deserialize, Serialize};
use std::path::Path;

use super::error::{Result, SimError};

/// Number of sensory inputs fed to every controller.
pub const INPUT_SIZE: usize = 7;
/// Number of controller outputs (`dx`, `dy`).
pub const OUTPUT_SIZE: usize = 2;

/// Energy adjustments applied after every move.
///
/// All values are added to (or subtracted from) the agent's energy and may fire
/// together in the same tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardShaping {
    /// Bonus when the agent got closer to its target food.
    pub approach_bonus: f32,
    /// Penalty when the target food is farther than `far_distance`.
    pub far_penalty: f32,
    /// Distance beyond which `far_penalty` applies.
    pub far_distance: f32,
    /// Bonus for covering more than `movement_threshold` units in one tick.
    pub movement_bonus: f32,
    /// Minimum displacement rewarded with `movement_bonus`.
    pub movement_threshold: f32,
    /// Penalty for ending a tick within `edge_distance` of a boundary.
    pub edge_penalty: f32,
    /// Distance to the nearest boundary that counts as "near the edge".
    pub edge_distance: f32,
}

impl Default for RewardShaping {
    fn default() -> Self {
        Self {
            approach_bonus: 0.1,
            far_penalty: 0.01,
            far_distance: 100.0,
            movement_bonus: 0.1,
            movement_threshold: 5.0,
            edge_penalty: 0.1,
            edge_distance: 50.0,
        }
    }
}

/// Simulation parameters that control world dynamics and evolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Params {
    /// Simulation area width.
    pub width: f32,
    /// Simulation area height.
    pub height: f32,
    /// Nominal number of agents per generation.
    pub population_size: usize,
    /// Number of top agents carried into the next generation unchanged.
    pub elite_size: usize,
    /// Hidden layer width of every controller.
    pub hidden_size: usize,
    /// Ticks per generation.
    pub steps_per_generation: u32,
    /// Initial mutation rate and its lower bound.
    pub base_mutation_rate: f32,
    /// Probability that a single weight is perturbed during mutation.
    pub mutation_probability: f32,
    /// Consecutive non-improving generations tolerated before the rate grows.
    pub stagnation_limit: u32,
    /// Mutation rate increase applied while stagnating.
    pub mutation_rate_increase: f32,
    /// Mutation rate decrease applied otherwise.
    pub mutation_rate_decay: f32,
    /// Energy of freshly created agents.
    pub initial_energy: f32,
    /// Lower speed bound.
    pub min_speed: f32,
    /// Upper speed bound.
    pub max_speed: f32,
    /// Lower speed bound for randomly seeded agents.
    pub seed_speed_min: f32,
    /// Upper speed bound for randomly seeded agents.
    pub seed_speed_max: f32,
    /// Maximum speed change between parent and child.
    pub speed_jitter: f32,
    /// Agent footprint reserved at the right and bottom edges.
    pub agent_size: f32,
    /// Distance at which an agent eats its target food.
    pub eat_radius: f32,
    /// Energy gained from one food item.
    pub food_energy: f32,
    /// Radius of the local food density sensor.
    pub density_radius: f32,
    /// Food count that saturates the density sensor.
    pub density_norm: f32,
    /// Energy that saturates the energy sensor.
    pub energy_norm: f32,
    /// Reward shaping table.
    pub rewards: RewardShaping,
    /// Food items placed near the centre at every generation start.
    pub cluster_food: usize,
    /// Half-width of the central food cluster.
    pub cluster_spread: f32,
    /// Scattered food items added when a run starts.
    pub initial_food: usize,
    /// Minimum items added per food timer event.
    pub periodic_food_min: usize,
    /// Maximum items added per food timer event.
    pub periodic_food_max: usize,
    /// Energy removed from every living agent per depletion event.
    pub depletion_amount: f32,
    /// Added to the output biases of the first population to get it moving.
    pub initial_output_bias: f32,
    /// Interval of the move timer in milliseconds.
    pub tick_interval_ms: u64,
    /// Interval of the food timer in milliseconds (0 disables it).
    pub food_interval_ms: u64,
    /// Interval of the depletion timer in milliseconds (0 disables it).
    pub depletion_interval_ms: u64,
    /// Number of diagnostic events retained in the event log.
    pub event_log_size: usize,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 600.0,
            population_size: 20,
            elite_size: 4,
            hidden_size: 8,
            steps_per_generation: 1000,
            base_mutation_rate: 0.1,
            mutation_probability: 0.1,
            stagnation_limit: 3,
            mutation_rate_increase: 0.05,
            mutation_rate_decay: 0.01,
            initial_energy: 5.0,
            min_speed: 0.5,
            max_speed: 5.0,
            seed_speed_min: 1.0,
            seed_speed_max: 3.0,
            speed_jitter: 0.5,
            agent_size: 10.0,
            eat_radius: 10.0,
            food_energy: 3.0,
            density_radius: 50.0,
            density_norm: 10.0,
            energy_norm: 10.0,
            rewards: RewardShaping::default(),
            cluster_food: 50,
            cluster_spread: 50.0,
            initial_food: 20,
            periodic_food_min: 2,
            periodic_food_max: 5,
            depletion_amount: 1.0,
            initial_output_bias: 0.2,
            tick_interval_ms: 100,
            food_interval_ms: 5000,
            depletion_interval_ms: 20000,
            event_log_size: 64,
        }
    }
}

impl Params {
    /// Loads parameters from a JSON file. Missing fields take their defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let params: Params = serde_json::from_str(&json)?;
        params.validate()?;
        Ok(params)
    }

    /// Saves parameters as pretty-printed JSON.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Checks that the parameters describe a runnable simulation.
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: String| Err(SimError::InvalidParams(msg));

        if self.width <= self.agent_size || self.height <= self.agent_size {
            return fail(format!(
                "world {}x{} is smaller than the agent footprint {}",
                self.width, self.height, self.agent_size
            ));
        }
        if self.population_size == 0 {
            return fail("population_size must be positive".into());
        }
        if self.elite_size > self.population_size {
            return fail(format!(
                "elite_size {} exceeds population_size {}",
                self.elite_size, self.population_size
            ));
        }
        if self.hidden_size < 2 {
            return fail(format!(
                "hidden_size must be at least 2, got {}",
                self.hidden_size
            ));
        }
        if self.steps_per_generation == 0 {
            return fail("steps_per_generation must be positive".into());
        }
        let negative = |value: f32| value.is_nan() || value < 0.0;
        if negative(self.base_mutation_rate) {
            return fail("base_mutation_rate must not be negative".into());
        }
        if !(0.0..=1.0).contains(&self.mutation_probability) {
            return fail("mutation_probability must lie in [0, 1]".into());
        }
        if negative(self.mutation_rate_increase) || negative(self.mutation_rate_decay) {
            return fail("mutation rate steps must not be negative".into());
        }
        if self.min_speed > self.max_speed || self.seed_speed_min > self.seed_speed_max {
            return fail("speed bounds are inverted".into());
        }
        if self.seed_speed_min < self.min_speed || self.seed_speed_max > self.max_speed {
            return fail(format!(
                "seed speed range [{}, {}] leaves [{}, {}]",
                self.seed_speed_min, self.seed_speed_max, self.min_speed, self.max_speed
            ));
        }
        if negative(self.speed_jitter) {
            return fail("speed_jitter must not be negative".into());
        }
        if self.periodic_food_min > self.periodic_food_max {
            return fail("periodic_food_min exceeds periodic_food_max".into());
        }
        if self.tick_interval_ms == 0 {
            return fail("tick_interval_ms must be positive".into());
        }
        Ok(())
    }

    /// Centre of the simulation area, rounded down to whole units.
    pub fn center(&self) -> (f32, f32) {
        ((self.width / 2.0).floor(), (self.height / 2.0).floor())
    }

    /// Largest coordinates an agent may occupy.
    pub fn max_position(&self) -> (f32, f32) {
        (self.width - self.agent_size, self.height - self.agent_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let params = Params::default();
        assert!(params.validate().is_ok());
        assert_eq!(params.population_size, 20);
        assert_eq!(params.elite_size, 4);
        assert_eq!(params.steps_per_generation, 1000);
    }

    #[test]
    fn rejects_single_hidden_neuron() {
        let params = Params {
            hidden_size: 1,
            ..Params::default()
        };
        assert!(matches!(params.validate(), Err(SimError::InvalidParams(_))));
    }

    #[test]
    fn rejects_oversized_elite() {
        let params = Params {
            elite_size: 21,
            ..Params::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn rejects_negative_speed_jitter() {
        for speed_jitter in [-0.1, f32::NAN] {
            let params = Params {
                speed_jitter,
                ..Params::default()
            };
            assert!(matches!(params.validate(), Err(SimError::InvalidParams(_))));
        }
    }

    #[test]
    fn rejects_negative_mutation_steps() {
        let increase = Params {
            mutation_rate_increase: -0.05,
            ..Params::default()
        };
        assert!(increase.validate().is_err());

        let decay = Params {
            mutation_rate_decay: -0.01,
            ..Params::default()
        };
        assert!(decay.validate().is_err());
    }

    #[test]
    fn seed_speeds_must_fit_speed_clamp() {
        let too_fast = Params {
            seed_speed_min: 6.0,
            seed_speed_max: 8.0,
            ..Params::default()
        };
        assert!(too_fast.validate().is_err());

        let too_slow = Params {
            seed_speed_min: 0.1,
            ..Params::default()
        };
        assert!(too_slow.validate().is_err());

        let at_bounds = Params {
            seed_speed_min: 0.5,
            seed_speed_max: 5.0,
            ..Params::default()
        };
        assert!(at_bounds.validate().is_ok());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let params: Params =
            serde_json::from_str(r#"{"population_size": 8, "rewards": {"edge_penalty": 0.5}}"#)
                .unwrap();
        assert_eq!(params.population_size, 8);
        assert_eq!(params.hidden_size, 8);
        assert_eq!(params.rewards.edge_penalty, 0.5);
        assert_eq!(params.rewards.approach_bonus, 0.1);
    }
}
