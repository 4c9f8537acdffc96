use criterion::{black_box, criterion_group, criterion_main, Criterion};
use sim_core::{ProductionStatus, ScenarioConfig};
use sim_runtime::SimulationEnvironment;

const SCENARIO: &str = r#"{
    "production_capacity_per_day": 2,
    "simulation_parameters": {"demand_mean": 4, "demand_variance": 2, "rng_seed": 42},
    "products": [
        {"id": 101, "name": "Board", "type": "raw"},
        {"id": 102, "name": "Casing", "type": "raw"},
        {"id": 1, "name": "Printer", "type": "finished",
         "bom": [{"material_id": 101, "quantity": 1}, {"material_id": 102, "quantity": 2}]}
    ],
    "suppliers": [
        {"id": 201, "name": "Boards", "supply_details": {"101": [12.5, 3]}},
        {"id": 202, "name": "Casings", "supply_details": {"102": [4, 1]}}
    ],
    "initial_inventory": [
        {"product_id": 101, "quantity": 1000},
        {"product_id": 102, "quantity": 2000}
    ]
}"#;

fn fresh_env() -> SimulationEnvironment {
    let initial = ScenarioConfig::from_json_str(SCENARIO)
        .and_then(|c| c.build())
        .unwrap();
    SimulationEnvironment::new(initial).unwrap()
}

fn release_all(env: &mut SimulationEnvironment) {
    let ids: Vec<_> = env
        .production_orders()
        .iter()
        .filter(|o| o.status() == ProductionStatus::Pending)
        .map(|o| o.id)
        .collect();
    for id in ids {
        let _ = env.release_order(id);
    }
}

fn bench_days(c: &mut Criterion) {
    c.bench_function("run_day", |b| {
        let mut env = fresh_env();
        b.iter(|| {
            release_all(&mut env);
            env.run_day();
        })
    });
    c.bench_function("plant 90 days", |b| {
        b.iter(|| {
            let mut env = fresh_env();
            for _ in 0..90 {
                release_all(&mut env);
                env.run_day();
            }
            black_box(env.snapshot())
        })
    });
}

criterion_group!(benches, bench_days);
criterion_main!(benches);
