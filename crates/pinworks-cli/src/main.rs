use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use pinworks_core::engine::Engine;
use pinworks_core::fixed::fixed64_to_f64;
use pinworks_core::id::ObjectRef;
use pinworks_data::{BuiltScenario, load_scenario};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "pinworks", about = "Headless runner for the Pinworks production line")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scenario for a fixed number of ticks.
    Run {
        /// Scenario file (.ron, .toml or .json).
        #[arg(long)]
        scenario: PathBuf,
        #[arg(long, default_value_t = 200)]
        ticks: u64,
        /// Print a status block every N ticks. 0 prints only the final state.
        #[arg(long, default_value_t = 50)]
        print_every: u64,
        /// Print the event log as the run goes.
        #[arg(long)]
        events: bool,
    },
    /// Run a scenario, then describe whatever occupies a grid cell.
    Inspect {
        #[arg(long)]
        scenario: PathBuf,
        #[arg(long, default_value_t = 0)]
        ticks: u64,
        #[arg(long, allow_negative_numbers = true)]
        x: i32,
        #[arg(long, allow_negative_numbers = true)]
        y: i32,
    },
    /// Run a scenario twice and compare state hashes tick by tick.
    CheckDeterminism {
        #[arg(long)]
        scenario: PathBuf,
        #[arg(long, default_value_t = 500)]
        ticks: u64,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .compact()
        .init();
}

fn load(path: &Path) -> Result<BuiltScenario> {
    load_scenario(path).with_context(|| format!("loading scenario {}", path.display()))
}

// ---------------------------------------------------------------------------
// Run loop
// ---------------------------------------------------------------------------

fn run(path: &Path, ticks: u64, print_every: u64, events: bool) -> Result<()> {
    let BuiltScenario {
        name, mut engine, ..
    } = load(path)?;
    tracing::info!(scenario = %name, ticks, "run starting");

    println!(
        "Starting '{name}': ticks={ticks} workers={} machines={} stockpiles={}",
        engine.worker_count(),
        engine.machine_count(),
        engine.stockpile_count(),
    );
    println!("{}", "-".repeat(72));

    let mut printed = engine.events().total_written();
    for _ in 0..ticks {
        engine
            .step()
            .with_context(|| format!("simulation faulted at tick {}", engine.tick()))?;

        if events {
            let fresh = (engine.events().total_written() - printed) as usize;
            let skip = engine.events().len().saturating_sub(fresh);
            for event in engine.events().iter().skip(skip) {
                println!("  {event}");
            }
            printed = engine.events().total_written();
        }
        if print_every > 0 && engine.tick() % print_every == 0 {
            print_status(&engine);
        }
    }

    println!("{}", "-".repeat(72));
    print_status(&engine);
    Ok(())
}

fn print_status(engine: &Engine) {
    println!("tick={:05} hash={:016x}", engine.tick(), engine.state_hash());
    for w in engine.snapshot_all_workers() {
        let carrying = w
            .carrying
            .map(|load| format!(" carrying {load}"))
            .unwrap_or_default();
        let job = w.job.map(|j| j.name()).unwrap_or("-");
        println!(
            "  worker ({:>3},{:>3}) {:<8} {job}{carrying}",
            w.position.x,
            w.position.y,
            w.status.name()
        );
    }
    for m in engine.snapshot_all_machines() {
        let kind = engine
            .catalog()
            .get_machine_type(m.machine_type)
            .map_or("?", |t| t.name.as_str());
        println!(
            "  {kind:<12} {:<16} progress={:.2} in={} out={}",
            m.state,
            fixed64_to_f64(m.progress),
            m.input_contents.len(),
            m.output_contents.len()
        );
    }
    for s in engine.snapshot_all_stockpiles() {
        if s.inventory.is_empty() {
            continue;
        }
        let stock: Vec<String> = s
            .inventory
            .iter()
            .map(|e| format!("{} x{}", e.material, e.quantity))
            .collect();
        println!(
            "  stockpile ({},{}) {}",
            s.position.x,
            s.position.y,
            stock.join(", ")
        );
    }
    println!(
        "  orders={} queued_jobs={}",
        engine.replenishment_orders().active_count(),
        engine.job_queue().len()
    );
}

// ---------------------------------------------------------------------------
// Inspect
// ---------------------------------------------------------------------------

fn inspect(path: &Path, ticks: u64, x: i32, y: i32) -> Result<()> {
    let mut built = load(path)?;
    built.engine.advance(ticks).context("running before inspection")?;
    let engine = &built.engine;

    match engine.object_at(x, y) {
        ObjectRef::Nothing => println!("({x},{y}): nothing"),
        ObjectRef::Worker(id) => {
            let Some(w) = engine.snapshot_worker(id) else {
                bail!("worker vanished");
            };
            let job = w.job.map(|j| j.name()).unwrap_or("nothing");
            println!("Worker {}, doing {job} for {}", ObjectRef::Worker(id), w.job_target);
            if let Some(load) = w.carrying {
                println!("  carrying {load}");
            }
        }
        ObjectRef::Machine(id) => {
            let Some(m) = engine.snapshot_machine(id) else {
                bail!("machine vanished");
            };
            let kind = engine
                .catalog()
                .get_machine_type(m.machine_type)
                .map_or("?", |t| t.name.as_str());
            println!("{kind} machine {}", ObjectRef::Machine(id));
            if let Some(recipe) = m.recipe.and_then(|r| engine.catalog().get_recipe(r)) {
                println!("  {} batch of {}", m.state, recipe.name);
            }
            if let Some(remaining) = m.remaining {
                println!("  {remaining} ticks left");
            }
            if let Some(pending) = m.pending_recipe.and_then(|r| engine.catalog().get_recipe(r)) {
                println!("  next: {}", pending.name);
            }
            if !m.accepts_recipe {
                println!("  recipe queue full");
            }
            for stack in &m.input_contents {
                println!("  in:  {stack}");
            }
            for stack in &m.output_contents {
                println!("  out: {stack}");
            }
        }
        ObjectRef::Stockpile(id) => {
            let Some(s) = engine.snapshot_stockpile(id) else {
                bail!("stockpile vanished");
            };
            println!("Stockpile {}", ObjectRef::Stockpile(id));
            for entry in &s.inventory {
                println!(
                    "  {} x{} ({} earmarked)",
                    entry.material, entry.quantity, entry.earmarked
                );
            }
            if !s.manifest.is_empty() {
                println!("  required:");
                for entry in &s.manifest {
                    let ordered = s
                        .on_order
                        .iter()
                        .find(|o| o.material == entry.material)
                        .map_or(0, |o| o.quantity);
                    println!(
                        "    {}: {} ({ordered} on order)",
                        entry.material, entry.quantity
                    );
                }
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Determinism check
// ---------------------------------------------------------------------------

fn check_determinism(path: &Path, ticks: u64) -> Result<()> {
    let mut a = load(path)?.engine;
    let mut b = load(path)?.engine;
    for _ in 0..ticks {
        a.step().context("first run faulted")?;
        b.step().context("second run faulted")?;
        if a.state_hash() != b.state_hash() {
            tracing::warn!(tick = a.tick(), "state hashes diverged");
            bail!(
                "runs diverged at tick {}: {:016x} != {:016x}",
                a.tick(),
                a.state_hash(),
                b.state_hash()
            );
        }
    }
    tracing::info!(ticks, "runs agree");
    println!("{ticks} ticks, final hash {:016x}", a.state_hash());
    Ok(())
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            scenario,
            ticks,
            print_every,
            events,
        } => run(&scenario, ticks, print_every, events),
        Commands::Inspect {
            scenario,
            ticks,
            x,
            y,
        } => inspect(&scenario, ticks, x, y),
        Commands::CheckDeterminism { scenario, ticks } => check_determinism(&scenario, ticks),
    }
}
