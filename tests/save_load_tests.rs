#![allow(missing_docs)]

use dot_evo::simulation::control::{SharedSimulation, Simulation};
use dot_evo::simulation::params::Params;
use dot_evo::simulation::world::World;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::thread;

fn create_test_params() -> Params {
    Params {
        steps_per_generation: 25,
        population_size: 8,
        elite_size: 2,
        ..Params::default()
    }
}

#[test]
fn test_world_round_trip() {
    let path = std::env::temp_dir().join(format!("dot_evo_world_{}.json", std::process::id()));
    let params = create_test_params();
    let mut world = World::new(params.clone()).unwrap();
    let mut rng = ChaCha8Rng::seed_from_u64(21);
    world.start(params.population_size, &mut rng).unwrap();
    for _ in 0..30 {
        world.tick(&mut rng).unwrap();
    }

    world.save_to_file(&path).unwrap();
    let loaded = World::load_from_file(&path).unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(loaded.params, world.params);
    assert_eq!(loaded.agents, world.agents);
    assert_eq!(loaded.food.items(), world.food.items());
    assert_eq!(loaded.engine.state, world.engine.state);
    assert_eq!(loaded.context.len(), world.context.len());
    assert_eq!(loaded.snapshot(), world.snapshot());
}

#[test]
fn test_loaded_world_keeps_running() {
    let path = std::env::temp_dir().join(format!("dot_evo_resume_{}.json", std::process::id()));
    let params = create_test_params();
    let mut sim = Simulation::with_seed(params.clone(), 5).unwrap();
    sim.start(params.population_size).unwrap();
    sim.advance(1_000).unwrap();

    sim.save_to_file(&path).unwrap();
    let mut loaded = Simulation::load_from_file(&path).unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(loaded.seed(), 5);
    assert_eq!(loaded.clock(), sim.clock());
    assert_eq!(loaded.snapshot(), sim.snapshot());

    // the spatial index is rebuilt lazily after loading
    let generation = loaded.generation();
    loaded.advance(5_000).unwrap();
    assert!(loaded.generation() > generation);
    assert_eq!(loaded.agents().len(), params.population_size);
}

#[test]
fn test_invalid_saved_params_rejected() {
    let path = std::env::temp_dir().join(format!("dot_evo_invalid_{}.json", std::process::id()));
    let mut world = World::new(create_test_params()).unwrap();
    world.params.hidden_size = 0;
    world.save_to_file(&path).unwrap();

    assert!(World::load_from_file(&path).is_err());
    std::fs::remove_file(&path).ok();
}

#[test]
fn test_shared_simulation_across_threads() {
    let params = create_test_params();
    let mut sim = Simulation::with_seed(params.clone(), 9).unwrap();
    sim.start(params.population_size).unwrap();
    let shared: SharedSimulation = sim.into_shared();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let shared = SharedSimulation::clone(&shared);
            thread::spawn(move || {
                for _ in 0..10 {
                    let mut sim = shared.lock().unwrap();
                    sim.advance(100).unwrap();
                    sim.add_food(1);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let sim = shared.lock().unwrap();
    assert_eq!(sim.clock().now_ms, 4_000);
    assert!(sim.generation() > 1);
    assert!(!sim.agents().is_empty());
}
