#![deny(warnings)]

//! Headless CLI: load a scenario, run the plant for a number of days and
//! print KPIs.

use anyhow::{Context, Result};
use sim_ai::Policy;
use sim_runtime::SimulationEnvironment;
use std::fs;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

const DEFAULT_SCENARIO: &str = "assets/scenarios/baseline.yaml";
const DEFAULT_DAYS: u32 = 30;

#[derive(Debug, Default)]
struct Args {
    scenario: Option<String>,
    days: Option<u32>,
    seed: Option<u64>,
    auto: bool,
    events_out: Option<String>,
}

fn parse_args() -> Args {
    let mut args = Args::default();
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--scenario" | "--config" => args.scenario = it.next(),
            "--days" => args.days = it.next().and_then(|s| s.parse().ok()),
            "--seed" => args.seed = it.next().and_then(|s| s.parse().ok()),
            "--auto" => args.auto = true,
            "--events" => args.events_out = it.next(),
            _ => {}
        }
    }
    args
}

fn main() -> Result<()> {
    // Logging setup
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_max_level(Level::DEBUG)
        .init();

    let args = parse_args();
    info!(?args, "starting CLI");

    let path = args.scenario.as_deref().unwrap_or(DEFAULT_SCENARIO);
    let mut initial = sim_core::load_scenario(path)
        .with_context(|| format!("loading scenario {path}"))?;
    if let Some(seed) = args.seed {
        initial.params.rng_seed = seed;
    }
    let n_products = initial.catalog.len();
    let n_suppliers = initial.suppliers.len();

    let mut env = SimulationEnvironment::new(initial)?;
    let policy = Policy::default();
    let days = args.days.unwrap_or(DEFAULT_DAYS);
    for _ in 0..days {
        if args.auto {
            let plan = policy.decide(&env);
            sim_ai::apply(&mut env, &plan)?;
        }
        env.run_day();
    }

    if let Some(out) = &args.events_out {
        let json = serde_json::to_string_pretty(env.events())?;
        fs::write(out, json).with_context(|| format!("writing events to {out}"))?;
        info!(path = %out, events = env.events().len(), "event log written");
    }

    let snap = env.snapshot();
    println!(
        "Scenario OK | products: {} | suppliers: {} | policy: {}",
        n_products,
        n_suppliers,
        if args.auto { "auto" } else { "none" }
    );
    println!(
        "KPI | days: {} | pending: {} | released: {} | completed: {} | cancelled: {} | produced: {} | inv: {} | open POs: {} | spend: ${} | peak capacity: {}",
        snap.day,
        snap.pending,
        snap.released,
        snap.completed,
        snap.cancelled,
        snap.units_produced,
        snap.inventory_units,
        snap.open_purchases,
        snap.purchase_spend.round_dp(2),
        env.capacity_peak()
    );

    Ok(())
}
